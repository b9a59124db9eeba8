//! Server configuration: a TOML file with `AGORA_*` environment
//! overrides, and CLI flags layered on top by `main`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use agora_protocol::DEFAULT_CREDENTIAL_TTL_SECS;

use crate::error::ServerError;

/// Runtime settings for the Agora server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the combined REST and realtime listener binds to.
    pub listen_addr: String,
    /// Ed25519 signing key location; created on first run.
    pub key_path: PathBuf,
    /// Optional JSON file of agendas loaded at startup.
    pub seed_path: Option<PathBuf>,
    /// Lifetime of credentials issued by `POST /api/session`.
    pub credential_ttl_secs: i64,
    /// Chat burst allowance per connection.
    pub chat_burst: u32,
    /// Steady-state chat rate per connection, messages per second.
    pub chat_refill_per_sec: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9470".to_string(),
            key_path: default_data_dir().join("server.key"),
            seed_path: None,
            credential_ttl_secs: DEFAULT_CREDENTIAL_TTL_SECS,
            chat_burst: 10,
            chat_refill_per_sec: 1.0,
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agora")
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agora")
        .join("server.toml")
}

impl ServerConfig {
    /// Load from `path` when given, else from the default location. An
    /// explicitly named file must exist; the default one may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };
        if !path.exists() {
            if required {
                return Err(ServerError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| ServerError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| ServerError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Overlay `AGORA_*` variables. `vars` abstracts the process
    /// environment so overrides stay testable.
    pub fn apply_overrides(
        &mut self,
        vars: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ServerError> {
        if let Some(addr) = vars("AGORA_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(path) = vars("AGORA_KEY_PATH") {
            self.key_path = PathBuf::from(path);
        }
        if let Some(path) = vars("AGORA_SEED_PATH") {
            self.seed_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = vars("AGORA_CREDENTIAL_TTL_SECS") {
            self.credential_ttl_secs = raw.parse().map_err(|_| {
                ServerError::Config(format!(
                    "AGORA_CREDENTIAL_TTL_SECS must be an integer, got {raw:?}"
                ))
            })?;
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<(), ServerError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }
}
