use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use accord_store::{generate_id, increment_version};
use accord_types::{
    AuditAction, FieldChange, Metadata, ProtocolScope, Revision, RevisionId, Timestamp,
};

use super::LifecycleCoordinator;
use crate::error::EngineError;

/// Field overrides carried by a revision. Absent fields stay as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ProtocolScope>,
    /// Shallow-merged into the protocol's metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl RevisionChanges {
    /// Read overrides out of a loose change map, validating every field.
    ///
    /// Unknown keys are ignored.
    pub fn from_map(changes: &Map<String, Value>) -> Result<Self, EngineError> {
        let mut parsed = Self::default();
        for (key, value) in changes {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "description" => parsed.description = Some(expect_string(key, value)?),
                "purpose" => parsed.purpose = Some(expect_string(key, value)?),
                "scope" => {
                    parsed.scope = Some(ProtocolScope::parse(&expect_string(key, value)?)?);
                }
                "metadata" => {
                    let Value::Object(map) = value else {
                        return Err(EngineError::invalid_argument(key, "expected an object"));
                    };
                    parsed.metadata = Some(map.clone());
                }
                other => tracing::debug!(key = other, "Ignoring unknown revision field"),
            }
        }
        Ok(parsed)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.purpose.is_none() && self.scope.is_none() && self.metadata.is_none()
    }
}

fn expect_string(key: &str, value: &Value) -> Result<String, EngineError> {
    value
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| EngineError::invalid_argument(key, "expected a string"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionSummary {
    pub revision_id: RevisionId,
    pub protocol_name: String,
    pub previous_version: String,
    pub new_version: String,
    pub changes_applied: Vec<String>,
    pub author: String,
    pub timestamp: Timestamp,
}

impl LifecycleCoordinator {
    /// Apply `changes` to a stored protocol and bump its patch version.
    pub fn revision(
        &mut self,
        protocol_name: &str,
        changes: &RevisionChanges,
        author: &str,
        rationale: &str,
    ) -> Result<RevisionSummary, EngineError> {
        let current = self
            .store
            .protocol(protocol_name)
            .cloned()
            .ok_or_else(|| EngineError::ProtocolNotFound(protocol_name.to_string()))?;

        let now = self.now();
        let new_version = increment_version(&current.version);
        let mut updated = current.clone().with_version(&new_version);
        let mut diff = BTreeMap::new();
        let mut changes_applied = Vec::new();

        if let Some(purpose) = &changes.purpose {
            diff.insert(
                "purpose".to_string(),
                FieldChange {
                    from: Value::String(current.purpose.clone()),
                    to: Value::String(purpose.clone()),
                },
            );
            updated.purpose.clone_from(purpose);
            changes_applied.push("purpose".to_string());
        }
        if let Some(scope) = changes.scope {
            diff.insert(
                "scope".to_string(),
                FieldChange {
                    from: Value::String(current.scope.to_string()),
                    to: Value::String(scope.to_string()),
                },
            );
            updated.scope = scope;
            changes_applied.push("scope".to_string());
        }
        if let Some(patch) = &changes.metadata {
            updated.merge_metadata(patch);
            diff.insert(
                "metadata".to_string(),
                FieldChange {
                    from: Value::Object(current.metadata.clone()),
                    to: Value::Object(updated.metadata.clone()),
                },
            );
            changes_applied.push("metadata".to_string());
        }
        diff.insert(
            "version".to_string(),
            FieldChange {
                from: Value::String(current.version.clone()),
                to: Value::String(new_version.clone()),
            },
        );

        let description = match &changes.description {
            Some(description) => description.clone(),
            None if changes_applied.is_empty() => "Version bump".to_string(),
            None => format!("Updated {}", changes_applied.join(", ")),
        };
        let revision = Revision {
            id: RevisionId::new(generate_id(&[protocol_name, &new_version, author], now)),
            protocol_name: protocol_name.to_string(),
            description: description.clone(),
            author: author.to_string(),
            rationale: rationale.to_string(),
            timestamp: now,
            previous_version: current.version.clone(),
            version: new_version.clone(),
            diff,
        };
        let revision_id = revision.id.clone();

        self.store.update_protocol(updated)?;
        self.store.append_revision(revision)?;
        self.audit(
            AuditAction::ProtocolRevised,
            Some(protocol_name),
            author,
            now,
            format!("{} -> {new_version}: {description}", current.version),
        );
        self.credit(author, revision_id.as_str());
        self.autosave()?;

        Ok(RevisionSummary {
            revision_id,
            protocol_name: protocol_name.to_string(),
            previous_version: current.version,
            new_version,
            changes_applied,
            author: author.to_string(),
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use accord_types::{Participant, ParticipantRole, Protocol, ProtocolType};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn seeded() -> LifecycleCoordinator {
        let mut store = accord_store::ProtocolStore::new();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store
            .insert_protocol(Protocol::new(
                "p",
                ProtocolType::Technical,
                "old purpose",
                ProtocolScope::Narrow,
                at,
            ))
            .unwrap();
        store.upsert_participant(Participant::new("ana", ParticipantRole::Reviewer, "", at));
        LifecycleCoordinator::new(store)
    }

    #[test]
    fn parses_change_map() {
        let changes = RevisionChanges::from_map(&object(json!({
            "description": "Widen scope",
            "scope": "BROAD",
            "metadata": {"owner": "ana"},
            "unrelated": 1
        })))
        .unwrap();
        assert_eq!(changes.scope, Some(ProtocolScope::Broad));
        assert_eq!(changes.description.as_deref(), Some("Widen scope"));
        assert!(changes.purpose.is_none());
        assert!(!changes.is_empty());
    }

    #[test]
    fn rejects_bad_scope_and_types() {
        let err = RevisionChanges::from_map(&object(json!({"scope": "vast"}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidVariant);

        let err = RevisionChanges::from_map(&object(json!({"metadata": [1]}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn revision_applies_overrides_and_bumps_version() {
        let mut coordinator = seeded();
        let changes = RevisionChanges {
            purpose: Some("new purpose".into()),
            scope: Some(ProtocolScope::Pilot),
            ..RevisionChanges::default()
        };

        let summary = coordinator.revision("p", &changes, "ana", "pilot first").unwrap();

        assert_eq!(summary.previous_version, "1.0.0");
        assert_eq!(summary.new_version, "1.0.1");
        assert_eq!(summary.changes_applied, ["purpose", "scope"]);

        let stored = coordinator.store().protocol("p").unwrap();
        assert_eq!(stored.purpose, "new purpose");
        assert_eq!(stored.scope, ProtocolScope::Pilot);
        assert_eq!(stored.version, "1.0.1");

        let revisions = coordinator.store().revisions("p");
        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0].rationale, "pilot first");
        assert_eq!(revisions[0].description, "Updated purpose, scope");
        assert_eq!(revisions[0].diff["scope"].from, json!("narrow"));
        assert_eq!(revisions[0].diff["version"].to, json!("1.0.1"));

        let ana = coordinator.store().participant("ana").unwrap();
        assert_eq!(ana.contributions, [summary.revision_id.as_str()]);
    }

    #[test]
    fn metadata_is_shallow_merged() {
        let mut coordinator = seeded();
        let first = RevisionChanges {
            metadata: Some(object(json!({"owner": "ana", "tags": ["a"]}))),
            ..RevisionChanges::default()
        };
        coordinator.revision("p", &first, "ana", "").unwrap();
        let second = RevisionChanges {
            metadata: Some(object(json!({"tags": ["b"]}))),
            ..RevisionChanges::default()
        };
        coordinator.revision("p", &second, "ana", "").unwrap();

        let metadata = &coordinator.store().protocol("p").unwrap().metadata;
        assert_eq!(metadata.get("owner"), Some(&json!("ana")));
        assert_eq!(metadata.get("tags"), Some(&json!(["b"])));
    }

    #[test]
    fn empty_changes_still_bump() {
        let mut coordinator = seeded();
        let summary = coordinator
            .revision("p", &RevisionChanges::default(), "bo", "")
            .unwrap();
        assert!(summary.changes_applied.is_empty());
        assert_eq!(coordinator.store().revisions("p")[0].description, "Version bump");
        // bo is not a registered participant
        assert!(coordinator.store().participant("bo").is_none());
    }

    #[test]
    fn unknown_protocol_is_not_found() {
        let mut coordinator = seeded();
        let err = coordinator
            .revision("missing", &RevisionChanges::default(), "ana", "")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(coordinator.store().audit_log().is_empty());
    }
}
