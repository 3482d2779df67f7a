use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use accord_types::{AuditAction, Metadata, Protocol};

use super::{ClarifiedContext, LifecycleCoordinator, SYSTEM_AUTHOR, WorkflowMapping};
use crate::error::EngineError;

const TOP_RISKS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    /// Bucket by the total number of success criteria across all steps.
    #[must_use]
    pub const fn from_criteria_count(count: usize) -> Self {
        match count {
            0..10 => Complexity::Low,
            10..20 => Complexity::Medium,
            _ => Complexity::High,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStep {
    pub number: usize,
    pub name: String,
    pub description: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub success_criteria: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDraft {
    pub protocol: Protocol,
    pub steps: Vec<ProtocolStep>,
    pub participants: Vec<String>,
    pub outstanding_issues: Vec<String>,
    pub complexity: Complexity,
    /// False when the draft had no name and was not stored.
    pub registered: bool,
}

fn steps(mapping: &WorkflowMapping) -> Vec<ProtocolStep> {
    mapping
        .phases
        .iter()
        .enumerate()
        .map(|(index, phase)| ProtocolStep {
            number: index + 1,
            name: phase.name.clone(),
            description: phase.description.clone(),
            inputs: phase.inputs.clone(),
            outputs: phase.outputs.clone(),
            success_criteria: phase.success_criteria.clone(),
        })
        .collect()
}

fn outstanding_issues(context: &ClarifiedContext, mapping: &WorkflowMapping) -> Vec<String> {
    let mut issues = Vec::new();
    if context.name().is_none() {
        issues.push("Protocol name is missing".to_string());
    }
    if context.participants.is_empty() {
        issues.push("No participants assigned".to_string());
    }
    issues.extend(mapping.risk_factors.iter().take(TOP_RISKS).cloned());
    issues
}

fn draft_metadata(context: &ClarifiedContext, mapping: &WorkflowMapping) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("domain".into(), Value::String(context.domain.clone()));
    metadata.insert(
        "collaboration_mode".into(),
        Value::String(context.collaboration_mode.to_string()),
    );
    metadata.insert("participants".into(), json!(context.participant_ids()));
    metadata.insert("goals".into(), json!(context.clarified_goals));
    metadata.insert(
        "estimated_duration".into(),
        json!(mapping.estimated_duration),
    );
    metadata
}

impl LifecycleCoordinator {
    /// Turn a mapped workflow into a protocol at version 1.0.0.
    ///
    /// A named draft whose name is already taken fails with a conflict and
    /// leaves the stored protocol untouched.
    pub fn draft_protocol(
        &mut self,
        context: &ClarifiedContext,
        mapping: &WorkflowMapping,
    ) -> Result<ProtocolDraft, EngineError> {
        let now = self.now();
        let protocol = Protocol::new(
            context.protocol_name.trim(),
            context.protocol_type,
            &context.purpose,
            context.scope,
            now,
        )
        .with_metadata(draft_metadata(context, mapping));

        let mut draft = ProtocolDraft {
            protocol,
            steps: steps(mapping),
            participants: context.participant_ids(),
            outstanding_issues: outstanding_issues(context, mapping),
            complexity: Complexity::from_criteria_count(mapping.total_criteria()),
            registered: false,
        };

        let Some(name) = context.name() else {
            tracing::debug!("Draft has no name; returned without registering");
            return Ok(draft);
        };

        self.store.insert_protocol(draft.protocol.clone())?;
        draft.registered = true;
        self.audit(
            AuditAction::ProtocolDrafted,
            Some(name),
            SYSTEM_AUTHOR,
            now,
            format!(
                "{} step(s), complexity {}",
                draft.steps.len(),
                draft.complexity
            ),
        );
        self.autosave()?;
        Ok(draft)
    }
}
