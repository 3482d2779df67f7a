//! Protocol repository and its durable form.
//!
//! # Architecture
//!
//! ```text
//! ProtocolStore (owned, injected into the coordinator)
//! ├── protocols / participants / branches / merges   (keyed maps)
//! ├── revisions / phases                              (per-protocol lists)
//! └── audit_log                                       (append-only)
//!
//! versioning   increment_version, generate_id
//! persistence  save_state / load_state -> LoadedState { store, warnings }
//! ```

pub mod persistence;
mod store;
pub mod versioning;

pub use persistence::{
    LoadWarning, LoadedState, PersistenceError, from_document, json_kind, load_state,
    save_state, to_document,
};
pub use store::{ProtocolStore, StoreError, StoreStats};
pub use versioning::{FALLBACK_VERSION, generate_id, increment_version};
