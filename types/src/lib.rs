//! Core domain types for Accord.
//!
//! Pure data: protocols, participants, phases, history records and the closed
//! variant enums they carry. No IO, no async, no invariants that span more
//! than one record (those live in `accord-store`).

mod ids;
mod protocol;
mod record;
mod variant;

pub use ids::{BranchId, MergeId, RevisionId};
pub use protocol::{INITIAL_VERSION, Metadata, Participant, Phase, Protocol};
pub use record::{AuditAction, AuditEntry, Branch, FieldChange, Merge, Revision};
pub use variant::{
    CollaborationMode, InvalidVariant, ParticipantRole, ProtocolScope, ProtocolType, VariantKind,
};

/// Wall-clock instant attached to every record.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
