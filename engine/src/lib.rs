//! Protocol lifecycle engine.
//!
//! # Architecture
//!
//! ```text
//! LifecycleCoordinator (owns a ProtocolStore, a Clock, CoordinatorSettings)
//! ├── clarify -> ideate -> map_workflow -> draft_protocol
//! ├── revision / fork_protocol / merge_protocol
//! └── get_protocol_evolution / get_decision_log
//!
//! surface   Operation + invoke: JSON argument maps in, JSON values out
//! shared    SharedCoordinator: Arc<RwLock<_>>, single writer
//! config    ~/.accord/config.toml + ACCORD_STATE_PATH
//! ```

pub mod clock;
pub mod config;
mod coordinator;
mod error;
pub mod shared;
pub mod surface;

pub use clock::{Clock, SteppingClock, SystemClock};
pub use config::{AccordConfig, ConfigError};
pub use coordinator::{
    ClarifiedContext, Complexity, CoordinatorSettings, DEFAULT_FOCUS_AREAS,
    DEFAULT_MERGE_STRATEGY, DEFAULT_UNITS_PER_PHASE, Idea, IdeationResults, LifecycleCoordinator,
    MergeSummary, ParticipantSpec, PhaseDependency, ProtocolDraft, ProtocolEvolution,
    ProtocolStep, RevisionChanges, RevisionSummary, SYSTEM_AUTHOR, WorkflowMapping,
};
pub use error::{EngineError, ErrorKind};
pub use shared::SharedCoordinator;
pub use surface::{Operation, invoke};

pub use accord_store::{LoadWarning, ProtocolStore};
