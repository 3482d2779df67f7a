//! State document persistence.
//!
//! The whole store is written as one pretty-printed JSON object:
//!
//! ```text
//! {
//!   "protocols":    { name -> Protocol },
//!   "participants": { id -> Participant },
//!   "revisions":    { protocol name -> [Revision] },
//!   "branches":     { branch id -> Branch },
//!   "merges":       { merge id -> Merge },
//!   "phases":       { protocol name -> [Phase] },
//!   "audit_log":    [AuditEntry]
//! }
//! ```
//!
//! Loading is tolerant: every record is reconstructed on its own, and one
//! that fails to decode (or breaks a store invariant) is skipped and reported
//! as a [`LoadWarning`]. Only a document that is not a JSON object at all is
//! rejected. Saving is strict and propagates every failure.
//!
//! Writes are plain `fs::write`; there is no journal or temp-file swap.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use accord_types::{
    AuditEntry, Branch, BranchId, Merge, MergeId, Participant, Phase, Protocol, Revision,
};

use crate::store::{ProtocolStore, StoreError};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read state document {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write state document {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to encode state document: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed state document ({origin}): {reason}")]
    Malformed { origin: String, reason: String },
}

/// One record (or section) that could not be restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadWarning {
    pub section: &'static str,
    /// Map key or array index of the skipped record; empty for a whole section.
    pub key: String,
    pub message: String,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}: {}", self.section, self.message)
        } else {
            write!(f, "{}[{}]: {}", self.section, self.key, self.message)
        }
    }
}

#[derive(Debug, Default)]
pub struct LoadedState {
    pub store: ProtocolStore,
    pub warnings: Vec<LoadWarning>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    protocols: &'a BTreeMap<String, Protocol>,
    participants: &'a BTreeMap<String, Participant>,
    revisions: &'a BTreeMap<String, Vec<Revision>>,
    branches: &'a BTreeMap<BranchId, Branch>,
    merges: &'a BTreeMap<MergeId, Merge>,
    phases: &'a BTreeMap<String, Vec<Phase>>,
    audit_log: &'a [AuditEntry],
}

impl<'a> From<&'a ProtocolStore> for DocumentRef<'a> {
    fn from(store: &'a ProtocolStore) -> Self {
        Self {
            protocols: &store.protocols,
            participants: &store.participants,
            revisions: &store.revisions,
            branches: &store.branches,
            merges: &store.merges,
            phases: &store.phases,
            audit_log: &store.audit_log,
        }
    }
}

pub fn to_document(store: &ProtocolStore) -> Result<Value, PersistenceError> {
    serde_json::to_value(DocumentRef::from(store)).map_err(PersistenceError::Encode)
}

pub fn save_state(store: &ProtocolStore, path: &Path) -> Result<(), PersistenceError> {
    let bytes =
        serde_json::to_vec_pretty(&DocumentRef::from(store)).map_err(PersistenceError::Encode)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    let stats = store.stats();
    tracing::info!(
        path = %path.display(),
        protocols = stats.protocols,
        revisions = stats.revisions,
        branches = stats.branches,
        "State saved"
    );
    Ok(())
}

/// Load a state document. A missing or blank file is an empty store.
pub fn load_state(path: &Path) -> Result<LoadedState, PersistenceError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No state document, starting empty");
            return Ok(LoadedState::default());
        }
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if content.trim().is_empty() {
        return Ok(LoadedState::default());
    }

    let document: Value =
        serde_json::from_str(&content).map_err(|err| PersistenceError::Malformed {
            origin: path.display().to_string(),
            reason: err.to_string(),
        })?;
    let loaded = from_document(&document)?;

    let stats = loaded.store.stats();
    tracing::info!(
        path = %path.display(),
        protocols = stats.protocols,
        revisions = stats.revisions,
        branches = stats.branches,
        skipped = loaded.warnings.len(),
        "State loaded"
    );
    Ok(loaded)
}

/// Rebuild a store from an already-parsed document.
pub fn from_document(document: &Value) -> Result<LoadedState, PersistenceError> {
    let root = match document {
        Value::Null => return Ok(LoadedState::default()),
        Value::Object(root) => root,
        other => {
            return Err(PersistenceError::Malformed {
                origin: "document".to_string(),
                reason: format!("expected a JSON object, found {}", json_kind(other)),
            });
        }
    };

    let mut loader = Loader::default();

    // Order matters: branches need their parent protocol, merges need their
    // branch and target.
    for (key, value) in loader.object_section(root, "protocols") {
        if let Some(protocol) = loader.decode::<Protocol>("protocols", key, value)
            && loader.keyed("protocols", key, key, &protocol.name)
        {
            let result = loader.store.insert_protocol(protocol);
            loader.check("protocols", key, result);
        }
    }

    for (key, value) in loader.object_section(root, "participants") {
        if let Some(participant) = loader.decode::<Participant>("participants", key, value)
            && loader.keyed("participants", key, key, &participant.id)
        {
            loader.store.upsert_participant(participant);
        }
    }

    for (key, value) in loader.object_section(root, "phases") {
        if let Some(phases) = loader.decode::<Vec<Phase>>("phases", key, value) {
            loader.store.replace_phases(key, phases);
        }
    }

    for (key, value) in loader.object_section(root, "revisions") {
        let Some(items) = loader.array_entry("revisions", key, value) else {
            continue;
        };
        for (index, item) in items.iter().enumerate() {
            let item_key = format!("{key}.{index}");
            if let Some(revision) = loader.decode::<Revision>("revisions", &item_key, item)
                && loader.keyed("revisions", &item_key, key, &revision.protocol_name)
            {
                let result = loader.store.append_revision(revision);
                loader.check("revisions", &item_key, result);
            }
        }
    }

    for (key, value) in loader.object_section(root, "branches") {
        if let Some(branch) = loader.decode::<Branch>("branches", key, value)
            && loader.keyed("branches", key, key, branch.id.as_str())
        {
            let result = loader.store.insert_branch(branch);
            loader.check("branches", key, result);
        }
    }

    for (key, value) in loader.object_section(root, "merges") {
        if let Some(merge) = loader.decode::<Merge>("merges", key, value)
            && loader.keyed("merges", key, key, merge.id.as_str())
        {
            let result = loader.store.insert_merge(merge);
            loader.check("merges", key, result);
        }
    }

    match root.get("audit_log") {
        None | Some(Value::Null) => {}
        Some(Value::Array(entries)) => {
            for (index, value) in entries.iter().enumerate() {
                if let Some(entry) = loader.decode::<AuditEntry>("audit_log", &index.to_string(), value)
                {
                    loader.store.append_audit(entry);
                }
            }
        }
        Some(other) => loader.warn(
            "audit_log",
            "",
            format!("expected an array, found {}", json_kind(other)),
        ),
    }

    Ok(LoadedState {
        store: loader.store,
        warnings: loader.warnings,
    })
}

#[derive(Default)]
struct Loader {
    store: ProtocolStore,
    warnings: Vec<LoadWarning>,
}

impl Loader {
    fn warn(&mut self, section: &'static str, key: &str, message: String) {
        tracing::warn!(section, key, "Skipping record while loading state: {message}");
        self.warnings.push(LoadWarning {
            section,
            key: key.to_string(),
            message,
        });
    }

    fn object_section<'a>(
        &mut self,
        root: &'a Map<String, Value>,
        section: &'static str,
    ) -> Vec<(&'a String, &'a Value)> {
        match root.get(section) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => map.iter().collect(),
            Some(other) => {
                self.warn(
                    section,
                    "",
                    format!("expected an object, found {}", json_kind(other)),
                );
                Vec::new()
            }
        }
    }

    fn array_entry<'a>(
        &mut self,
        section: &'static str,
        key: &str,
        value: &'a Value,
    ) -> Option<&'a Vec<Value>> {
        if let Value::Array(items) = value {
            Some(items)
        } else {
            self.warn(
                section,
                key,
                format!("expected an array, found {}", json_kind(value)),
            );
            None
        }
    }

    fn decode<T: DeserializeOwned>(
        &mut self,
        section: &'static str,
        key: &str,
        value: &Value,
    ) -> Option<T> {
        match T::deserialize(value) {
            Ok(record) => Some(record),
            Err(err) => {
                self.warn(section, key, err.to_string());
                None
            }
        }
    }

    /// The map key a record is filed under must agree with the record itself.
    fn keyed(
        &mut self,
        section: &'static str,
        key: &str,
        filed_under: &str,
        record_key: &str,
    ) -> bool {
        if filed_under == record_key {
            true
        } else {
            self.warn(
                section,
                key,
                format!("filed under '{filed_under}' but record names '{record_key}'"),
            );
            false
        }
    }

    fn check(&mut self, section: &'static str, key: &str, result: Result<(), StoreError>) {
        if let Err(err) = result {
            self.warn(section, key, err.to_string());
        }
    }
}

/// Article-prefixed JSON type name for error messages ("an array").
#[must_use]
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
