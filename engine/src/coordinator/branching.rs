use serde::{Deserialize, Serialize};

use accord_store::{StoreError, generate_id, increment_version};
use accord_types::{AuditAction, Branch, BranchId, Merge, MergeId, Protocol, Timestamp};

use super::{LifecycleCoordinator, named};
use crate::error::EngineError;

const BRANCH_VERSION_SUFFIX: &str = "_branch";
pub(crate) const PURPOSE_CONFLICT: &str = "purpose_conflict_resolved";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub merge_id: MergeId,
    pub source_branch: BranchId,
    pub target: String,
    pub conflicts_resolved: Vec<String>,
    pub merge_strategy: String,
    pub new_version: String,
    pub merged_at: Timestamp,
}

impl LifecycleCoordinator {
    /// Fork `protocol_name` into a clone named `{protocol_name}_{branch_name}`.
    ///
    /// The clone keeps the parent's type, scope and metadata. Its version is
    /// the parent's with a `_branch` suffix, which the versioning rules treat
    /// as unparseable, so the clone's first revision lands on `1.0.1`.
    pub fn fork_protocol(
        &mut self,
        protocol_name: &str,
        branch_name: &str,
        created_by: &str,
        purpose: &str,
    ) -> Result<BranchId, EngineError> {
        let parent = self
            .store
            .protocol(protocol_name)
            .cloned()
            .ok_or_else(|| EngineError::ProtocolNotFound(protocol_name.to_string()))?;
        let branch_name = named(branch_name)
            .ok_or_else(|| EngineError::invalid_argument("branch_name", "must not be empty"))?;

        let clone_name = Branch::clone_name(&parent.name, branch_name);
        if self.store.contains_protocol(&clone_name) {
            return Err(StoreError::DuplicateProtocol(clone_name).into());
        }

        let now = self.now();
        let id = BranchId::new(generate_id(&[branch_name], now));
        if self.store.branch(&id).is_some() {
            return Err(StoreError::DuplicateBranch(id).into());
        }

        let clone = Protocol::new(
            &clone_name,
            parent.protocol_type,
            format!("{} (branch of {})", parent.purpose, parent.name),
            parent.scope,
            now,
        )
        .with_version(format!("{}{BRANCH_VERSION_SUFFIX}", parent.version))
        .with_metadata(parent.metadata.clone());

        self.store.insert_protocol(clone)?;
        self.store.insert_branch(Branch::new(
            id.clone(),
            &parent.name,
            branch_name,
            created_by,
            now,
            purpose,
        ))?;

        self.audit(
            AuditAction::ProtocolForked,
            Some(&parent.name),
            created_by,
            now,
            format!("branch {id} ({clone_name}): {purpose}"),
        );
        self.credit(created_by, id.as_str());
        self.autosave()?;
        Ok(id)
    }

    /// Merge a branch's clone back into `target_protocol_name`.
    ///
    /// Checks run in order: branch exists, branch active, target exists,
    /// clone exists. A differing purpose is resolved by concatenation.
    pub fn merge_protocol(
        &mut self,
        branch_id: &BranchId,
        target_protocol_name: &str,
        merged_by: &str,
        strategy: Option<&str>,
    ) -> Result<MergeSummary, EngineError> {
        let branch = self
            .store
            .branch(branch_id)
            .cloned()
            .ok_or_else(|| EngineError::BranchNotFound(branch_id.clone()))?;
        if !branch.is_active() {
            return Err(EngineError::AlreadyMerged(branch_id.clone()));
        }
        let target = self
            .store
            .protocol(target_protocol_name)
            .cloned()
            .ok_or_else(|| EngineError::ProtocolNotFound(target_protocol_name.to_string()))?;
        let clone_name = branch.protocol_name();
        let source = self
            .store
            .protocol(&clone_name)
            .cloned()
            .ok_or(EngineError::ProtocolNotFound(clone_name))?;

        let now = self.now();
        let merge_id = MergeId::new(generate_id(
            &[branch_id.as_str(), target_protocol_name],
            now,
        ));
        if self.store.merges().any(|merge| merge.id == merge_id) {
            return Err(StoreError::DuplicateMerge(merge_id).into());
        }

        let strategy = strategy
            .and_then(named)
            .unwrap_or(&self.settings.default_strategy)
            .to_string();
        let new_version = increment_version(&target.version);
        let mut updated = target.clone().with_version(&new_version);
        let mut conflicts_resolved = Vec::new();
        if source.purpose != target.purpose {
            updated.purpose = format!("{} | {}", target.purpose, source.purpose);
            conflicts_resolved.push(PURPOSE_CONFLICT.to_string());
        }

        self.store.update_protocol(updated)?;
        self.store.insert_merge(Merge {
            id: merge_id.clone(),
            source_branch: branch_id.clone(),
            target: target_protocol_name.to_string(),
            merged_by: merged_by.to_string(),
            merged_at: now,
            strategy: strategy.clone(),
            conflicts_resolved: conflicts_resolved.clone(),
            resulting_version: new_version.clone(),
        })?;
        self.store.deactivate_branch(branch_id)?;

        self.audit(
            AuditAction::ProtocolMerged,
            Some(target_protocol_name),
            merged_by,
            now,
            format!(
                "branch {branch_id} merged ({strategy}), {} -> {new_version}",
                target.version
            ),
        );
        self.credit(merged_by, merge_id.as_str());
        self.autosave()?;

        Ok(MergeSummary {
            merge_id,
            source_branch: branch_id.clone(),
            target: target_protocol_name.to_string(),
            conflicts_resolved,
            merge_strategy: strategy,
            new_version,
            merged_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use accord_types::{ProtocolScope, ProtocolType};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    fn seeded() -> LifecycleCoordinator {
        let mut store = accord_store::ProtocolStore::new();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut metadata = accord_types::Metadata::new();
        metadata.insert("domain".into(), json!("etl"));
        store
            .insert_protocol(
                Protocol::new("p", ProtocolType::Social, "share", ProtocolScope::Pilot, at)
                    .with_version("1.0.2")
                    .with_metadata(metadata),
            )
            .unwrap();
        LifecycleCoordinator::new(store)
    }

    #[test]
    fn fork_clones_parent() {
        let mut coordinator = seeded();
        let id = coordinator
            .fork_protocol("p", "experimental", "ana", "try things")
            .unwrap();

        let branch = coordinator.store().branch(&id).unwrap();
        assert!(branch.is_active());
        assert_eq!(branch.parent, "p");
        assert_eq!(branch.purpose, "try things");

        let clone = coordinator.store().protocol("p_experimental").unwrap();
        assert_eq!(clone.version, "1.0.2_branch");
        assert_eq!(clone.purpose, "share (branch of p)");
        assert_eq!(clone.protocol_type, ProtocolType::Social);
        assert_eq!(clone.scope, ProtocolScope::Pilot);
        assert_eq!(clone.metadata.get("domain"), Some(&json!("etl")));
        assert_eq!(id.as_str().len(), 12);
    }

    #[test]
    fn fork_rejects_missing_parent_blank_name_and_reused_name() {
        let mut coordinator = seeded();
        let err = coordinator.fork_protocol("nope", "b", "ana", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = coordinator.fork_protocol("p", "  ", "ana", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        coordinator.fork_protocol("p", "b", "ana", "").unwrap();
        let err = coordinator.fork_protocol("p", "b", "ana", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(coordinator.store().branches().count(), 1);
    }

    #[test]
    fn merge_resolves_purpose_and_deactivates() {
        let mut coordinator = seeded();
        let id = coordinator.fork_protocol("p", "exp", "ana", "").unwrap();

        let summary = coordinator.merge_protocol(&id, "p", "bo", None).unwrap();

        assert_eq!(summary.new_version, "1.0.3");
        assert_eq!(summary.merge_strategy, "recursive");
        assert_eq!(summary.conflicts_resolved, [PURPOSE_CONFLICT]);
        let target = coordinator.store().protocol("p").unwrap();
        assert_eq!(target.purpose, "share | share (branch of p)");
        assert!(!coordinator.store().branch(&id).unwrap().is_active());
        assert_eq!(coordinator.store().merges_into("p").len(), 1);
    }

    #[test]
    fn merge_without_purpose_drift_has_no_conflicts() {
        let mut coordinator = seeded();
        let id = coordinator.fork_protocol("p", "exp", "ana", "").unwrap();
        let summary = coordinator
            .merge_protocol(&id, "p_exp", "bo", Some("ours"))
            .unwrap();
        assert!(summary.conflicts_resolved.is_empty());
        assert_eq!(summary.merge_strategy, "ours");
        // "1.0.2_branch" does not parse
        assert_eq!(summary.new_version, "1.0.1");
    }

    #[test]
    fn second_merge_is_rejected() {
        let mut coordinator = seeded();
        let id = coordinator.fork_protocol("p", "exp", "ana", "").unwrap();
        coordinator.merge_protocol(&id, "p", "bo", None).unwrap();

        let err = coordinator.merge_protocol(&id, "p", "bo", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyMerged);
        assert_eq!(coordinator.store().protocol("p").unwrap().version, "1.0.3");
    }

    #[test]
    fn merge_check_order() {
        let mut coordinator = seeded();
        let err = coordinator
            .merge_protocol(&BranchId::new("missing"), "nope", "bo", None)
            .unwrap_err();
        assert!(matches!(err, EngineError::BranchNotFound(_)));

        let id = coordinator.fork_protocol("p", "exp", "ana", "").unwrap();
        let err = coordinator.merge_protocol(&id, "nope", "bo", None).unwrap_err();
        assert!(matches!(err, EngineError::ProtocolNotFound(name) if name == "nope"));
        assert!(coordinator.store().branch(&id).unwrap().is_active());
    }
}
