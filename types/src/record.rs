//! Append-only history records: revisions, branches, merges, audit entries.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{BranchId, MergeId, RevisionId, Timestamp};

/// Before/after values of one field touched by a revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: Value,
    pub to: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    pub protocol_name: String,
    pub description: String,
    pub author: String,
    pub rationale: String,
    pub timestamp: Timestamp,
    pub previous_version: String,
    /// Version the protocol carries after this revision.
    pub version: String,
    #[serde(default)]
    pub diff: BTreeMap<String, FieldChange>,
}

/// A fork of a protocol.
///
/// The clone lives in the store under [`Branch::protocol_name`]. `active`
/// only ever goes from `true` to `false`, through [`Branch::deactivate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub parent: String,
    pub name: String,
    pub created_by: String,
    pub created_at: Timestamp,
    pub purpose: String,
    active: bool,
}

impl Branch {
    #[must_use]
    pub fn new(
        id: BranchId,
        parent: impl Into<String>,
        name: impl Into<String>,
        created_by: impl Into<String>,
        created_at: Timestamp,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            id,
            parent: parent.into(),
            name: name.into(),
            created_by: created_by.into(),
            created_at,
            purpose: purpose.into(),
            active: true,
        }
    }

    /// Store key of the cloned protocol owned by a branch.
    #[must_use]
    pub fn clone_name(parent: &str, branch_name: &str) -> String {
        format!("{parent}_{branch_name}")
    }

    #[must_use]
    pub fn protocol_name(&self) -> String {
        Self::clone_name(&self.parent, &self.name)
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Returns `false` if the branch was already inactive.
    pub fn deactivate(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merge {
    pub id: MergeId,
    pub source_branch: BranchId,
    pub target: String,
    pub merged_by: String,
    pub merged_at: Timestamp,
    pub strategy: String,
    #[serde(default)]
    pub conflicts_resolved: Vec<String>,
    pub resulting_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ParticipantRegistered,
    ContextClarified,
    IdeationRecorded,
    WorkflowMapped,
    ProtocolDrafted,
    ProtocolRevised,
    ProtocolForked,
    ProtocolMerged,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AuditAction::ParticipantRegistered => "participant_registered",
            AuditAction::ContextClarified => "context_clarified",
            AuditAction::IdeationRecorded => "ideation_recorded",
            AuditAction::WorkflowMapped => "workflow_mapped",
            AuditAction::ProtocolDrafted => "protocol_drafted",
            AuditAction::ProtocolRevised => "protocol_revised",
            AuditAction::ProtocolForked => "protocol_forked",
            AuditAction::ProtocolMerged => "protocol_merged",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub protocol_name: Option<String>,
    pub author: String,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub details: String,
}

impl AuditEntry {
    #[must_use]
    pub fn new(
        action: AuditAction,
        protocol_name: Option<&str>,
        author: impl Into<String>,
        timestamp: Timestamp,
        details: impl Into<String>,
    ) -> Self {
        Self {
            action,
            protocol_name: protocol_name.map(ToString::to_string),
            author: author.into(),
            timestamp,
            details: details.into(),
        }
    }

    #[must_use]
    pub fn concerns(&self, protocol_name: &str) -> bool {
        self.protocol_name.as_deref() == Some(protocol_name)
    }
}
