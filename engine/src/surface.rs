//! Name-addressed dispatch over loosely structured JSON arguments.
//!
//! Callers that only speak JSON (the CLI's `call` command, prompt-driven
//! front ends) pick an [`Operation`] by token and pass an argument object.
//! The typed coordinator method runs and its result comes back as JSON.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use accord_types::{
    BranchId, CollaborationMode, InvalidVariant, ParticipantRole, ProtocolScope, ProtocolType,
};

use crate::coordinator::{
    ClarifiedContext, IdeationResults, LifecycleCoordinator, RevisionChanges, SYSTEM_AUTHOR,
    WorkflowMapping,
};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ClarifyContext,
    Ideate,
    MapWorkflow,
    DraftProtocol,
    Revision,
    ForkProtocol,
    MergeProtocol,
    GetProtocolEvolution,
    GetDecisionLog,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::ClarifyContext,
        Operation::Ideate,
        Operation::MapWorkflow,
        Operation::DraftProtocol,
        Operation::Revision,
        Operation::ForkProtocol,
        Operation::MergeProtocol,
        Operation::GetProtocolEvolution,
        Operation::GetDecisionLog,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::ClarifyContext => "clarify_context",
            Operation::Ideate => "ideate",
            Operation::MapWorkflow => "map_workflow",
            Operation::DraftProtocol => "draft_protocol",
            Operation::Revision => "revision",
            Operation::ForkProtocol => "fork_protocol",
            Operation::MergeProtocol => "merge_protocol",
            Operation::GetProtocolEvolution => "get_protocol_evolution",
            Operation::GetDecisionLog => "get_decision_log",
        }
    }

    /// Whether the operation only reads committed state.
    #[must_use]
    pub const fn is_query(self) -> bool {
        matches!(
            self,
            Operation::GetProtocolEvolution | Operation::GetDecisionLog
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| EngineError::UnknownOperation(token.to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ClarifyArgs {
    context: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct IdeateArgs {
    context: Option<ClarifiedContext>,
    focus_areas: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct MapWorkflowArgs {
    context: Option<ClarifiedContext>,
    ideation_results: Option<IdeationResults>,
}

#[derive(Debug, Default, Deserialize)]
struct DraftArgs {
    context: Option<ClarifiedContext>,
    workflow_mapping: Option<WorkflowMapping>,
}

#[derive(Debug, Default, Deserialize)]
struct RevisionArgs {
    protocol_name: Option<String>,
    #[serde(default)]
    changes: Map<String, Value>,
    author: Option<String>,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Default, Deserialize)]
struct ForkArgs {
    protocol_name: Option<String>,
    branch_name: Option<String>,
    created_by: Option<String>,
    #[serde(default)]
    purpose: String,
}

#[derive(Debug, Default, Deserialize)]
struct MergeArgs {
    branch_id: Option<String>,
    target_protocol_name: Option<String>,
    merged_by: Option<String>,
    strategy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProtocolArgs {
    protocol_name: Option<String>,
}

fn token<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

/// First unrecognized variant token in a `context` argument, if any.
///
/// serde flattens the token enums' errors into strings, so decode failures
/// are re-checked here to keep their kind.
fn context_variant_error(args: &Map<String, Value>) -> Option<InvalidVariant> {
    let context = args.get("context")?.as_object()?;
    token(context, "protocol_type")
        .and_then(|raw| ProtocolType::parse(raw).err())
        .or_else(|| token(context, "scope").and_then(|raw| ProtocolScope::parse(raw).err()))
        .or_else(|| {
            token(context, "collaboration_mode").and_then(|raw| CollaborationMode::parse(raw).err())
        })
        .or_else(|| {
            context
                .get("participants")
                .and_then(Value::as_array)?
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|participant| token(participant, "role"))
                .find_map(|raw| ParticipantRole::parse(raw).err())
        })
}

fn parse<T: DeserializeOwned>(op: Operation, args: &Map<String, Value>) -> Result<T, EngineError> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|err| {
        match context_variant_error(args) {
            Some(invalid) => EngineError::InvalidVariant(invalid),
            None => EngineError::invalid_argument(op.as_str(), err.to_string()),
        }
    })
}

fn required<T>(name: &str, value: Option<T>) -> Result<T, EngineError> {
    value.ok_or_else(|| EngineError::MissingArgument(name.to_string()))
}

fn author(value: Option<String>) -> String {
    value
        .filter(|author| !author.trim().is_empty())
        .unwrap_or_else(|| SYSTEM_AUTHOR.to_string())
}

/// Run `op` against `coordinator` with a JSON argument object.
///
/// `clarify_context` takes its raw context under `context`, or the whole
/// argument object when that key is absent.
pub fn invoke(
    coordinator: &mut LifecycleCoordinator,
    op: Operation,
    args: &Map<String, Value>,
) -> Result<Value, EngineError> {
    tracing::debug!(operation = %op, "Invoking operation");
    let result = match op {
        Operation::ClarifyContext => {
            let parsed: ClarifyArgs = parse(op, args)?;
            let context = parsed.context.unwrap_or_else(|| args.clone());
            serde_json::to_value(coordinator.clarify_context(&context)?)?
        }
        Operation::Ideate => {
            let parsed: IdeateArgs = parse(op, args)?;
            let context = required("context", parsed.context)?;
            serde_json::to_value(coordinator.ideate(&context, parsed.focus_areas.as_deref())?)?
        }
        Operation::MapWorkflow => {
            let parsed: MapWorkflowArgs = parse(op, args)?;
            let context = required("context", parsed.context)?;
            let ideation = required("ideation_results", parsed.ideation_results)?;
            serde_json::to_value(coordinator.map_workflow(&context, &ideation)?)?
        }
        Operation::DraftProtocol => {
            let parsed: DraftArgs = parse(op, args)?;
            let context = required("context", parsed.context)?;
            let mapping = required("workflow_mapping", parsed.workflow_mapping)?;
            serde_json::to_value(coordinator.draft_protocol(&context, &mapping)?)?
        }
        Operation::Revision => {
            let parsed: RevisionArgs = parse(op, args)?;
            let name = required("protocol_name", parsed.protocol_name)?;
            let changes = RevisionChanges::from_map(&parsed.changes)?;
            let summary = coordinator.revision(
                &name,
                &changes,
                &author(parsed.author),
                &parsed.rationale,
            )?;
            serde_json::to_value(summary)?
        }
        Operation::ForkProtocol => {
            let parsed: ForkArgs = parse(op, args)?;
            let name = required("protocol_name", parsed.protocol_name)?;
            let branch_name = required("branch_name", parsed.branch_name)?;
            let id = coordinator.fork_protocol(
                &name,
                &branch_name,
                &author(parsed.created_by),
                &parsed.purpose,
            )?;
            json!({ "branch_id": id })
        }
        Operation::MergeProtocol => {
            let parsed: MergeArgs = parse(op, args)?;
            let branch_id = BranchId::new(required("branch_id", parsed.branch_id)?);
            let target = required("target_protocol_name", parsed.target_protocol_name)?;
            let summary = coordinator.merge_protocol(
                &branch_id,
                &target,
                &author(parsed.merged_by),
                parsed.strategy.as_deref(),
            )?;
            serde_json::to_value(summary)?
        }
        Operation::GetProtocolEvolution | Operation::GetDecisionLog => {
            query(coordinator, op, args)?
        }
    };
    Ok(result)
}

/// Read-only counterpart of [`invoke`] for the query operations.
///
/// Mutating operations are rejected with an invalid-argument error.
pub fn query(
    coordinator: &LifecycleCoordinator,
    op: Operation,
    args: &Map<String, Value>,
) -> Result<Value, EngineError> {
    match op {
        Operation::GetProtocolEvolution => {
            let parsed: ProtocolArgs = parse(op, args)?;
            let name = required("protocol_name", parsed.protocol_name)?;
            Ok(serde_json::to_value(
                coordinator.get_protocol_evolution(&name)?,
            )?)
        }
        Operation::GetDecisionLog => {
            let parsed: ProtocolArgs = parse(op, args)?;
            Ok(serde_json::to_value(
                coordinator.get_decision_log(parsed.protocol_name.as_deref()),
            )?)
        }
        _ => Err(EngineError::invalid_argument(
            op.as_str(),
            "not a read-only operation",
        )),
    }
}
