//! Agora Core - agenda lifecycle, vote admission, and storage seam
//!
//! The synchronization heart of the service: the pure lifecycle engine
//! that classifies an agenda at a point in time, the vote ledger that
//! serializes cap checks and upserts per agenda, and the directory that
//! serves read views and owns agenda authoring. All durable access goes
//! through the `Store` trait; `MemoryStore` is the bundled backend.

pub mod directory;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod store;

pub use directory::AgendaDirectory;
pub use error::CoreError;
pub use ledger::{AgendaLocks, VoteLedger};
pub use lifecycle::status_at;
pub use store::{MemoryStore, Store, StoreError, StoreFuture};
