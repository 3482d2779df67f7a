//! In-memory protocol repository.
//!
//! The store is purely structural: it knows nothing about workflow stages.
//! It does own the cross-record invariants, and every mutator checks them
//! before touching state:
//!
//! - protocol names are unique
//! - a protocol's patch component never decreases
//! - a branch is deactivated at most once
//! - the audit log is append-only
//!
//! A violated invariant is reported as a [`StoreError`]; the store is left
//! exactly as it was before the call.

use std::collections::BTreeMap;

use thiserror::Error;

use accord_types::{
    AuditEntry, Branch, BranchId, Merge, MergeId, Participant, Phase, Protocol, Revision,
};

use crate::versioning::patch_component;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("protocol '{0}' not found")]
    ProtocolNotFound(String),
    #[error("participant '{0}' not found")]
    ParticipantNotFound(String),
    #[error("branch '{0}' not found")]
    BranchNotFound(BranchId),
    #[error("protocol '{0}' already exists")]
    DuplicateProtocol(String),
    #[error("branch id '{0}' already exists")]
    DuplicateBranch(BranchId),
    #[error("merge id '{0}' already exists")]
    DuplicateMerge(MergeId),
    #[error("branch '{0}' has already been merged")]
    AlreadyMerged(BranchId),
    #[error("version of '{protocol}' cannot go from {current} to {proposed}")]
    VersionRegression {
        protocol: String,
        current: String,
        proposed: String,
    },
}

impl StoreError {
    /// True for lookups of something that does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ProtocolNotFound(_)
                | StoreError::ParticipantNotFound(_)
                | StoreError::BranchNotFound(_)
        )
    }
}

fn check_monotonic(protocol: &str, current: &str, proposed: &str) -> Result<(), StoreError> {
    if let (Some(cur), Some(next)) = (patch_component(current), patch_component(proposed))
        && next < cur
    {
        return Err(StoreError::VersionRegression {
            protocol: protocol.to_string(),
            current: current.to_string(),
            proposed: proposed.to_string(),
        });
    }
    Ok(())
}

/// Entity counts, mostly for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub protocols: usize,
    pub participants: usize,
    pub revisions: usize,
    pub branches: usize,
    pub merges: usize,
    pub audit_entries: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtocolStore {
    pub(crate) protocols: BTreeMap<String, Protocol>,
    pub(crate) participants: BTreeMap<String, Participant>,
    pub(crate) revisions: BTreeMap<String, Vec<Revision>>,
    pub(crate) branches: BTreeMap<BranchId, Branch>,
    pub(crate) merges: BTreeMap<MergeId, Merge>,
    pub(crate) phases: BTreeMap<String, Vec<Phase>>,
    pub(crate) audit_log: Vec<AuditEntry>,
}

impl ProtocolStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
            && self.participants.is_empty()
            && self.branches.is_empty()
            && self.merges.is_empty()
            && self.phases.is_empty()
            && self.audit_log.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            protocols: self.protocols.len(),
            participants: self.participants.len(),
            revisions: self.revisions.values().map(Vec::len).sum(),
            branches: self.branches.len(),
            merges: self.merges.len(),
            audit_entries: self.audit_log.len(),
        }
    }

    // ── Protocols ────────────────────────────────────────────

    #[must_use]
    pub fn protocol(&self, name: &str) -> Option<&Protocol> {
        self.protocols.get(name)
    }

    #[must_use]
    pub fn contains_protocol(&self, name: &str) -> bool {
        self.protocols.contains_key(name)
    }

    pub fn protocols(&self) -> impl Iterator<Item = &Protocol> {
        self.protocols.values()
    }

    pub fn insert_protocol(&mut self, protocol: Protocol) -> Result<(), StoreError> {
        if self.protocols.contains_key(&protocol.name) {
            return Err(StoreError::DuplicateProtocol(protocol.name));
        }
        tracing::debug!(protocol = %protocol.name, version = %protocol.version, "Protocol inserted");
        self.protocols.insert(protocol.name.clone(), protocol);
        Ok(())
    }

    /// Replace a stored protocol with an edited copy.
    ///
    /// The stored `created_at` always wins over whatever the copy carries.
    pub fn update_protocol(&mut self, mut protocol: Protocol) -> Result<(), StoreError> {
        let Some(existing) = self.protocols.get_mut(&protocol.name) else {
            return Err(StoreError::ProtocolNotFound(protocol.name));
        };
        check_monotonic(&protocol.name, &existing.version, &protocol.version)?;

        protocol.created_at = existing.created_at;
        tracing::debug!(
            protocol = %protocol.name,
            from = %existing.version,
            to = %protocol.version,
            "Protocol updated"
        );
        *existing = protocol;
        Ok(())
    }

    // ── Participants ─────────────────────────────────────────

    #[must_use]
    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Insert or overwrite by id. Returns the record that was replaced.
    pub fn upsert_participant(&mut self, participant: Participant) -> Option<Participant> {
        self.participants.insert(participant.id.clone(), participant)
    }

    pub fn record_contribution(
        &mut self,
        participant_id: &str,
        reference: impl Into<String>,
    ) -> Result<(), StoreError> {
        let participant = self
            .participants
            .get_mut(participant_id)
            .ok_or_else(|| StoreError::ParticipantNotFound(participant_id.to_string()))?;
        participant.contributions.push(reference.into());
        Ok(())
    }

    // ── Phases ───────────────────────────────────────────────

    #[must_use]
    pub fn phases(&self, protocol_name: &str) -> &[Phase] {
        self.phases.get(protocol_name).map_or(&[], Vec::as_slice)
    }

    /// Phases are not history: a new mapping replaces the old list wholesale.
    pub fn replace_phases(&mut self, protocol_name: &str, phases: Vec<Phase>) -> Vec<Phase> {
        self.phases
            .insert(protocol_name.to_string(), phases)
            .unwrap_or_default()
    }

    // ── Revisions ────────────────────────────────────────────

    #[must_use]
    pub fn revisions(&self, protocol_name: &str) -> &[Revision] {
        self.revisions.get(protocol_name).map_or(&[], Vec::as_slice)
    }

    pub fn append_revision(&mut self, revision: Revision) -> Result<(), StoreError> {
        if !self.protocols.contains_key(&revision.protocol_name) {
            return Err(StoreError::ProtocolNotFound(revision.protocol_name));
        }
        let history = self
            .revisions
            .entry(revision.protocol_name.clone())
            .or_default();
        if let Some(last) = history.last() {
            check_monotonic(&revision.protocol_name, &last.version, &revision.version)?;
        }
        history.push(revision);
        Ok(())
    }

    // ── Branches ─────────────────────────────────────────────

    #[must_use]
    pub fn branch(&self, id: &BranchId) -> Option<&Branch> {
        self.branches.get(id)
    }

    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.values()
    }

    /// Branches forked from `parent`, oldest first.
    #[must_use]
    pub fn branches_of(&self, parent: &str) -> Vec<&Branch> {
        let mut branches: Vec<&Branch> = self
            .branches
            .values()
            .filter(|branch| branch.parent == parent)
            .collect();
        branches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        branches
    }

    pub fn insert_branch(&mut self, branch: Branch) -> Result<(), StoreError> {
        if !self.protocols.contains_key(&branch.parent) {
            return Err(StoreError::ProtocolNotFound(branch.parent));
        }
        if self.branches.contains_key(&branch.id) {
            return Err(StoreError::DuplicateBranch(branch.id));
        }
        self.branches.insert(branch.id.clone(), branch);
        Ok(())
    }

    pub fn deactivate_branch(&mut self, id: &BranchId) -> Result<(), StoreError> {
        let branch = self
            .branches
            .get_mut(id)
            .ok_or_else(|| StoreError::BranchNotFound(id.clone()))?;
        if branch.deactivate() {
            Ok(())
        } else {
            Err(StoreError::AlreadyMerged(id.clone()))
        }
    }

    // ── Merges ───────────────────────────────────────────────

    pub fn merges(&self) -> impl Iterator<Item = &Merge> {
        self.merges.values()
    }

    /// Merges that landed in `target`, oldest first.
    #[must_use]
    pub fn merges_into(&self, target: &str) -> Vec<&Merge> {
        let mut merges: Vec<&Merge> = self
            .merges
            .values()
            .filter(|merge| merge.target == target)
            .collect();
        merges.sort_by(|a, b| a.merged_at.cmp(&b.merged_at).then(a.id.cmp(&b.id)));
        merges
    }

    pub fn insert_merge(&mut self, merge: Merge) -> Result<(), StoreError> {
        if !self.branches.contains_key(&merge.source_branch) {
            return Err(StoreError::BranchNotFound(merge.source_branch));
        }
        if !self.protocols.contains_key(&merge.target) {
            return Err(StoreError::ProtocolNotFound(merge.target));
        }
        if self.merges.contains_key(&merge.id) {
            return Err(StoreError::DuplicateMerge(merge.id));
        }
        self.merges.insert(merge.id.clone(), merge);
        Ok(())
    }

    // ── Audit log ────────────────────────────────────────────

    pub fn append_audit(&mut self, entry: AuditEntry) {
        self.audit_log.push(entry);
    }

    #[must_use]
    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit_log
    }
}
