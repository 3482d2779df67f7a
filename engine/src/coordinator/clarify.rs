use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use accord_types::{
    AuditAction, CollaborationMode, Participant, ParticipantRole, ProtocolScope, ProtocolType,
};

use super::{LifecycleCoordinator, SYSTEM_AUTHOR, named};
use crate::error::EngineError;

const DEFAULT_DOMAIN: &str = "general";

const QUESTION_NAME: &str = "What should this protocol be called?";
const QUESTION_PURPOSE: &str = "What is the primary purpose of this protocol?";
const QUESTION_PARTICIPANTS: &str = "Who will participate in this protocol, and in which roles?";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSpec {
    pub id: String,
    #[serde(default)]
    pub role: ParticipantRole,
    #[serde(default)]
    pub expertise: String,
}

/// Normalized output of the clarify stage; the input of every later stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifiedContext {
    #[serde(default)]
    pub protocol_name: String,
    #[serde(default)]
    pub protocol_type: ProtocolType,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub scope: ProtocolScope,
    #[serde(default)]
    pub participants: Vec<ParticipantSpec>,
    #[serde(default)]
    pub collaboration_mode: CollaborationMode,
    #[serde(default)]
    pub open_questions: Vec<String>,
    #[serde(default)]
    pub clarified_goals: Vec<String>,
}

impl ClarifiedContext {
    /// Protocol name if one was given.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        named(&self.protocol_name)
    }

    #[must_use]
    pub fn participant_ids(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.id.clone()).collect()
    }
}

fn text(context: &Map<String, Value>, keys: &[&str]) -> Result<Option<String>, EngineError> {
    for key in keys {
        match context.get(*key) {
            None | Some(Value::Null) => {}
            Some(Value::String(value)) => {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    return Ok(Some(trimmed.to_string()));
                }
            }
            Some(_) => return Err(EngineError::invalid_argument(*key, "expected a string")),
        }
    }
    Ok(None)
}

fn variant<T>(
    context: &Map<String, Value>,
    keys: &[&str],
    parse: fn(&str) -> Result<T, accord_types::InvalidVariant>,
) -> Result<Option<T>, EngineError> {
    match text(context, keys)? {
        Some(raw) => Ok(Some(parse(&raw)?)),
        None => Ok(None),
    }
}

fn string_list(context: &Map<String, Value>, key: &str) -> Result<Vec<String>, EngineError> {
    match context.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(single)) => Ok(named(single).map(str::to_string).into_iter().collect()),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => named(s).map(|s| Ok(s.to_string())),
                _ => Some(Err(EngineError::invalid_argument(
                    key,
                    "expected a list of strings",
                ))),
            })
            .collect(),
        Some(_) => Err(EngineError::invalid_argument(
            key,
            "expected a list of strings",
        )),
    }
}

fn participant_spec(index: usize, item: &Value) -> Result<ParticipantSpec, EngineError> {
    let arg = || format!("participants[{index}]");
    match item {
        Value::String(id) => {
            let id = named(id).ok_or_else(|| EngineError::invalid_argument(arg(), "empty id"))?;
            Ok(ParticipantSpec {
                id: id.to_string(),
                role: ParticipantRole::default(),
                expertise: String::new(),
            })
        }
        Value::Object(fields) => {
            let id = text(fields, &["id", "name"])?
                .ok_or_else(|| EngineError::invalid_argument(arg(), "missing id"))?;
            let role = variant(fields, &["role"], ParticipantRole::parse)?.unwrap_or_default();
            let expertise = text(fields, &["expertise"])?.unwrap_or_default();
            Ok(ParticipantSpec {
                id,
                role,
                expertise,
            })
        }
        _ => Err(EngineError::invalid_argument(
            arg(),
            "expected an id string or an object",
        )),
    }
}

fn participant_specs(context: &Map<String, Value>) -> Result<Vec<ParticipantSpec>, EngineError> {
    match context.get("participants") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| participant_spec(index, item))
            .collect(),
        Some(_) => Err(EngineError::invalid_argument(
            "participants",
            "expected a list",
        )),
    }
}

impl LifecycleCoordinator {
    /// Normalize a raw caller context and register its participants.
    ///
    /// All fields are validated before anything is written, so a bad role or
    /// scope token registers nobody.
    pub fn clarify_context(
        &mut self,
        context: &Map<String, Value>,
    ) -> Result<ClarifiedContext, EngineError> {
        let protocol_name = text(context, &["name", "protocol_name"])?;
        let purpose = text(context, &["purpose"])?;
        let domain = text(context, &["domain"])?.unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
        let protocol_type =
            variant(context, &["type", "protocol_type"], ProtocolType::parse)?.unwrap_or_default();
        let scope = variant(context, &["scope"], ProtocolScope::parse)?.unwrap_or_default();
        let collaboration_mode =
            variant(context, &["collaboration_mode"], CollaborationMode::parse)?
                .unwrap_or_default();
        let participants = participant_specs(context)?;
        let goals = string_list(context, "goals")?;
        let author = text(context, &["author"])?.unwrap_or_else(|| SYSTEM_AUTHOR.to_string());

        let mut open_questions = Vec::new();
        if protocol_name.is_none() {
            open_questions.push(QUESTION_NAME.to_string());
        }
        if purpose.is_none() {
            open_questions.push(QUESTION_PURPOSE.to_string());
        }
        if participants.is_empty() {
            open_questions.push(QUESTION_PARTICIPANTS.to_string());
        }

        let clarified_goals = if goals.is_empty() {
            purpose
                .as_deref()
                .map(|purpose| vec![format!("Achieve: {purpose}")])
                .unwrap_or_default()
        } else {
            goals
        };

        let now = self.now();
        for spec in &participants {
            let participant = Participant::new(&spec.id, spec.role, &spec.expertise, now);
            if self.store.upsert_participant(participant).is_some() {
                tracing::debug!(participant = %spec.id, "Participant re-registered");
            }
            self.audit(
                AuditAction::ParticipantRegistered,
                protocol_name.as_deref(),
                &author,
                now,
                format!("{} registered as {}", spec.id, spec.role),
            );
        }

        let clarified = ClarifiedContext {
            protocol_name: protocol_name.unwrap_or_default(),
            protocol_type,
            purpose: purpose.unwrap_or_default(),
            domain,
            scope,
            participants,
            collaboration_mode,
            open_questions,
            clarified_goals,
        };

        self.audit(
            AuditAction::ContextClarified,
            clarified.name(),
            &author,
            now,
            format!(
                "{} participant(s), {} open question(s)",
                clarified.participants.len(),
                clarified.open_questions.len()
            ),
        );
        self.autosave()?;
        Ok(clarified)
    }
}
