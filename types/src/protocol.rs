//! Protocol, participant and phase records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ParticipantRole, ProtocolScope, ProtocolType, Timestamp};

/// Open key/value metadata attached to a protocol.
pub type Metadata = Map<String, Value>;

/// Version every freshly drafted protocol starts at.
pub const INITIAL_VERSION: &str = "1.0.0";

/// A named, versioned lifecycle artifact.
///
/// `name` is the store key and never changes. `created_at` is fixed at
/// construction; the store keeps the original value on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub name: String,
    #[serde(rename = "type")]
    pub protocol_type: ProtocolType,
    pub purpose: String,
    pub scope: ProtocolScope,
    pub version: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Protocol {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        protocol_type: ProtocolType,
        purpose: impl Into<String>,
        scope: ProtocolScope,
        created_at: Timestamp,
    ) -> Self {
        Self {
            name: name.into(),
            protocol_type,
            purpose: purpose.into(),
            scope,
            version: INITIAL_VERSION.to_string(),
            created_at,
            metadata: Metadata::new(),
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Shallow merge: top-level keys in `patch` replace existing keys.
    pub fn merge_metadata(&mut self, patch: &Metadata) {
        for (key, value) in patch {
            self.metadata.insert(key.clone(), value.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub role: ParticipantRole,
    #[serde(default)]
    pub expertise: String,
    /// References to ideas or revisions this participant contributed, in order.
    #[serde(default)]
    pub contributions: Vec<String>,
    pub registered_at: Timestamp,
}

impl Participant {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        role: ParticipantRole,
        expertise: impl Into<String>,
        registered_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            expertise: expertise.into(),
            contributions: Vec::new(),
            registered_at,
        }
    }
}

/// One stage of a mapped workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub result: Map<String, Value>,
}

impl Phase {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            success_criteria: Vec::new(),
            completed: false,
            result: Map::new(),
        }
    }
}
