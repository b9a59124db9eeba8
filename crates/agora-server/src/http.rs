//! REST bootstrap API and the realtime upgrade endpoint.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use ed25519_dalek::{SigningKey, VerifyingKey};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use agora_core::{AgendaDirectory, AgendaLocks, CoreError, MemoryStore, VoteLedger};
use agora_protocol::{
    current_timestamp_secs, issue_credential, verify_credential, Identity, NewAgenda, UserId,
    UserProfile,
};

use crate::config::ServerConfig;
use crate::hub::BroadcastHub;
use crate::rooms::RoomRouter;
use crate::session;

/// Shared handles threaded through every handler and session.
#[derive(Clone)]
pub struct AppState {
    pub directory: AgendaDirectory<MemoryStore>,
    pub ledger: VoteLedger<MemoryStore>,
    pub hub: Arc<BroadcastHub>,
    pub rooms: Arc<RoomRouter>,
    pub signing_key: Arc<SigningKey>,
    pub verifying_key: VerifyingKey,
    pub credential_ttl_secs: i64,
    pub chat_burst: u32,
    pub chat_refill_per_sec: f64,
}

impl AppState {
    /// Wire up the store, ledger, hub, and the vote feed pump.
    pub fn new(signing_key: SigningKey, config: &ServerConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let locks = AgendaLocks::new();
        let (commits_tx, commits_rx) = tokio::sync::mpsc::unbounded_channel();
        let ledger = VoteLedger::new(store.clone(), locks.clone(), commits_tx);
        let directory = AgendaDirectory::new(store, locks);
        let hub = Arc::new(BroadcastHub::new());
        BroadcastHub::spawn_vote_feed(hub.clone(), commits_rx);

        let verifying_key = signing_key.verifying_key();
        Self {
            directory,
            ledger,
            hub,
            rooms: Arc::new(RoomRouter::new()),
            signing_key: Arc::new(signing_key),
            verifying_key,
            credential_ttl_secs: config.credential_ttl_secs,
            chat_burst: config.chat_burst,
            chat_refill_per_sec: config.chat_refill_per_sec,
        }
    }
}

/// Build the service router. CORS stays permissive so browser clients
/// can bootstrap from any origin.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/api/health", get(api_health))
        .route("/api/session", post(api_session))
        .route("/api/agendas", get(api_agendas).post(api_create_agenda))
        .route(
            "/api/agendas/:agenda_id",
            get(api_agenda).delete(api_delete_agenda),
        )
        .route("/api/agendas/:agenda_id/close", post(api_close_agenda))
        .route("/api/users", get(api_users))
        .route("/api/votes", get(api_votes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::run(socket, app))
}

async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "service": "agora-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn api_agendas(State(app): State<AppState>) -> Response {
    match app.directory.agenda_views(Utc::now()).await {
        Ok(views) => Json(views).into_response(),
        Err(err) => core_error_response(err),
    }
}

async fn api_agenda(
    State(app): State<AppState>,
    AxumPath(agenda_id): AxumPath<String>,
) -> Response {
    match app.directory.agenda_view(&agenda_id, Utc::now()).await {
        Ok(view) => Json(view).into_response(),
        Err(err) => core_error_response(err),
    }
}

async fn api_users(State(app): State<AppState>) -> Response {
    match app.directory.users().await {
        Ok(users) => Json(users).into_response(),
        Err(err) => core_error_response(err),
    }
}

async fn api_votes(State(app): State<AppState>) -> Response {
    match app.directory.votes().await {
        Ok(votes) => Json(votes).into_response(),
        Err(err) => core_error_response(err),
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest {
    /// Reusing an id keeps identity stable across reconnects.
    #[serde(default)]
    user_id: Option<String>,
    display_name: String,
}

/// Issue a signed credential for the realtime handshake and record the
/// user in the directory.
async fn api_session(State(app): State<AppState>, Json(req): Json<SessionRequest>) -> Response {
    let user_id = UserId::new(
        req.user_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
    );
    let credential = match issue_credential(
        &app.signing_key,
        user_id.clone(),
        &req.display_name,
        app.credential_ttl_secs,
        current_timestamp_secs(),
    ) {
        Ok(cred) => cred,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"ok": false, "error": err.to_string()})),
            )
                .into_response()
        }
    };
    let encoded = match credential.encode() {
        Ok(encoded) => encoded,
        Err(err) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"ok": false, "error": err.to_string()})),
            )
                .into_response()
        }
    };

    let profile = UserProfile {
        id: user_id.clone(),
        name: credential.display_name.clone(),
    };
    if let Err(err) = app.directory.register_user(profile).await {
        return core_error_response(err);
    }

    Json(serde_json::json!({
        "credential": encoded,
        "userId": user_id,
        "displayName": credential.display_name,
        "expiresAt": credential.expires_at,
    }))
    .into_response()
}

async fn api_create_agenda(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewAgenda>,
) -> Response {
    let identity = match bearer_identity(&app, &headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    match app.directory.create_agenda(req, &identity, Utc::now()).await {
        Ok(agenda) => (StatusCode::CREATED, Json(agenda)).into_response(),
        Err(err) => core_error_response(err),
    }
}

async fn api_close_agenda(
    State(app): State<AppState>,
    headers: HeaderMap,
    AxumPath(agenda_id): AxumPath<String>,
) -> Response {
    let identity = match bearer_identity(&app, &headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    match app
        .directory
        .close_agenda(&agenda_id, &identity.user_id)
        .await
    {
        Ok(agenda) => Json(agenda).into_response(),
        Err(err) => core_error_response(err),
    }
}

async fn api_delete_agenda(
    State(app): State<AppState>,
    headers: HeaderMap,
    AxumPath(agenda_id): AxumPath<String>,
) -> Response {
    let identity = match bearer_identity(&app, &headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    match app
        .directory
        .delete_agenda(&agenda_id, &identity.user_id)
        .await
    {
        Ok(removed_votes) => {
            Json(serde_json::json!({"ok": true, "removedVotes": removed_votes})).into_response()
        }
        Err(err) => core_error_response(err),
    }
}

/// Resolve the caller from an `Authorization: Bearer <credential>`
/// header using the same verification as the realtime handshake.
fn bearer_identity(app: &AppState, headers: &HeaderMap) -> Result<Identity, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or("");
    if token.is_empty() {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"ok": false, "error": "missing bearer credential"})),
        )
            .into_response());
    }
    verify_credential(token, &app.verifying_key, current_timestamp_secs()).map_err(|err| {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"ok": false, "error": err.to_string()})),
        )
            .into_response()
    })
}

fn core_error_response(err: CoreError) -> Response {
    let status = match &err {
        CoreError::AgendaNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::NotOpen { .. } => StatusCode::CONFLICT,
        CoreError::InvalidOption { .. } | CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Forbidden { .. } => StatusCode::FORBIDDEN,
        CoreError::Seed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CoreError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(serde_json::json!({"ok": false, "error": err.to_string()})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_protocol::crypto::generate_keypair;
    use axum::http::HeaderValue;

    fn test_state() -> AppState {
        AppState::new(generate_keypair(), &ServerConfig::default())
    }

    #[tokio::test]
    async fn test_bearer_identity_requires_header() {
        let app = test_state();
        let headers = HeaderMap::new();
        assert!(bearer_identity(&app, &headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_identity(&app, &headers).is_err());
    }

    #[tokio::test]
    async fn test_bearer_identity_rejects_garbage_token() {
        let app = test_state();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer deadbeef"),
        );
        assert!(bearer_identity(&app, &headers).is_err());
    }

    #[tokio::test]
    async fn test_bearer_identity_resolves_issued_credential() {
        let app = test_state();
        let credential = issue_credential(
            &app.signing_key,
            UserId::from("u1"),
            "Alice",
            600,
            current_timestamp_secs(),
        )
        .unwrap();
        let encoded = credential.encode().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {encoded}")).unwrap(),
        );

        let identity = bearer_identity(&app, &headers).unwrap();
        assert_eq!(identity.user_id.as_str(), "u1");
        assert_eq!(identity.display_name, "Alice");
    }

    #[tokio::test]
    async fn test_core_errors_map_to_http_statuses() {
        use agora_core::StoreError;
        use agora_protocol::AgendaStatus;

        let cases = [
            (
                core_error_response(CoreError::AgendaNotFound("a1".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                core_error_response(CoreError::NotOpen {
                    agenda_id: "a1".into(),
                    status: AgendaStatus::Pending,
                }),
                StatusCode::CONFLICT,
            ),
            (
                core_error_response(CoreError::Validation("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                core_error_response(CoreError::Forbidden {
                    user_id: "u1".into(),
                    agenda_id: "a1".into(),
                }),
                StatusCode::FORBIDDEN,
            ),
            (
                core_error_response(CoreError::Store(StoreError::Unavailable("down".into()))),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (response, expected) in cases {
            assert_eq!(response.status(), expected);
        }
    }
}
