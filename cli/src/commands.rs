use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use accord_engine::{
    AccordConfig, LifecycleCoordinator, LoadWarning, Operation, RevisionChanges, SYSTEM_AUTHOR,
    invoke,
};
use accord_store::json_kind;
use accord_types::{BranchId, ProtocolScope};

#[derive(Debug, Parser)]
#[command(name = "accord", version, about = "Create, revise, fork and merge protocols")]
pub struct Cli {
    /// State document to load and save. Overrides ACCORD_STATE_PATH and config.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Clarify, ideate, map and draft a protocol from a JSON context file
    Draft {
        /// Context object as JSON ("-" reads stdin)
        context: PathBuf,
        /// Focus areas for ideation (repeatable)
        #[arg(long = "focus")]
        focus_areas: Vec<String>,
    },
    /// Record a revision and bump the patch version
    Revise {
        protocol: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
        #[arg(long)]
        scope: Option<String>,
        #[arg(long, default_value = SYSTEM_AUTHOR)]
        author: String,
        #[arg(long, default_value = "")]
        rationale: String,
    },
    /// Fork a protocol into a named branch
    Fork {
        protocol: String,
        branch: String,
        #[arg(long = "by", default_value = SYSTEM_AUTHOR)]
        created_by: String,
        #[arg(long, default_value = "")]
        purpose: String,
    },
    /// Merge a branch back into a target protocol
    Merge {
        branch_id: String,
        target: String,
        #[arg(long = "by", default_value = SYSTEM_AUTHOR)]
        merged_by: String,
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Show a protocol's history
    Evolution {
        protocol: String,
        /// Print the full record as JSON instead of the diagram
        #[arg(long)]
        json: bool,
    },
    /// Print the decision log, optionally for one protocol
    Log { protocol: Option<String> },
    /// Invoke any operation by name with a JSON argument object
    Call {
        operation: String,
        /// Argument object as JSON ("-" reads stdin); empty when omitted
        args: Option<PathBuf>,
    },
}

impl Command {
    fn mutates(&self) -> bool {
        match self {
            Command::Evolution { .. } | Command::Log { .. } => false,
            Command::Call { operation, .. } => {
                !matches!(operation.parse::<Operation>(), Ok(op) if op.is_query())
            }
            _ => true,
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_object(path: &Path) -> Result<Map<String, Value>> {
    let raw = read_source(path)?;
    match serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?
    {
        Value::Object(map) => Ok(map),
        other => bail!(
            "{} must contain a JSON object, found {}",
            path.display(),
            json_kind(&other)
        ),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Skipped records are not kept anywhere, so the next save loses them.
fn skipped_notice(warning: &LoadWarning, mutates: bool) -> String {
    let fate = if mutates {
        "this command will save the state without it"
    } else {
        "it will be dropped on the next save"
    };
    format!("warning: skipped {warning}; {fate}")
}

fn resolve_state_path(cli_state: Option<PathBuf>, config: &AccordConfig) -> Result<PathBuf> {
    cli_state
        .or_else(|| config.state_path())
        .ok_or_else(|| anyhow!("no state path: pass --state or set ACCORD_STATE_PATH"))
}

pub fn execute(cli: Cli, config: &AccordConfig) -> Result<()> {
    let state_path = resolve_state_path(cli.state, config)?;
    // With autosave on, each stage writes the document itself, so a command
    // that fails part-way keeps the stages it completed.
    let settings = config.coordinator_settings(Some(state_path.clone()));
    let autosaving = settings.autosave_path.is_some();
    let mut coordinator = LifecycleCoordinator::default().with_settings(settings);

    let warnings = coordinator
        .load_state(&state_path)
        .with_context(|| format!("failed to load state from {}", state_path.display()))?;
    let mutates = cli.cmd.mutates();
    for warning in &warnings {
        eprintln!("{}", skipped_notice(warning, mutates));
    }

    run_command(&mut coordinator, cli.cmd)?;

    if mutates && !autosaving {
        coordinator
            .save_state(&state_path)
            .with_context(|| format!("failed to save state to {}", state_path.display()))?;
    }
    Ok(())
}

fn run_command(coordinator: &mut LifecycleCoordinator, cmd: Command) -> Result<()> {
    match cmd {
        Command::Draft {
            context,
            focus_areas,
        } => {
            let raw = read_object(&context)?;
            let clarified = coordinator.clarify_context(&raw)?;
            let focus = (!focus_areas.is_empty()).then_some(focus_areas.as_slice());
            let ideas = coordinator.ideate(&clarified, focus)?;
            let mapping = coordinator.map_workflow(&clarified, &ideas)?;
            let draft = coordinator.draft_protocol(&clarified, &mapping)?;
            if !draft.registered {
                eprintln!("warning: draft has no name and was not stored");
            }
            print_json(&draft)
        }
        Command::Revise {
            protocol,
            description,
            purpose,
            scope,
            author,
            rationale,
        } => {
            let changes = RevisionChanges {
                description,
                purpose,
                scope: scope.as_deref().map(ProtocolScope::parse).transpose()?,
                metadata: None,
            };
            if changes.is_empty() {
                eprintln!("note: no field changes given; recording a version bump");
            }
            print_json(&coordinator.revision(&protocol, &changes, &author, &rationale)?)
        }
        Command::Fork {
            protocol,
            branch,
            created_by,
            purpose,
        } => {
            let id = coordinator.fork_protocol(&protocol, &branch, &created_by, &purpose)?;
            print_json(&serde_json::json!({ "branch_id": id }))
        }
        Command::Merge {
            branch_id,
            target,
            merged_by,
            strategy,
        } => {
            let summary = coordinator.merge_protocol(
                &BranchId::new(branch_id),
                &target,
                &merged_by,
                strategy.as_deref(),
            )?;
            print_json(&summary)
        }
        Command::Evolution { protocol, json } => {
            let evolution = coordinator.get_protocol_evolution(&protocol)?;
            if json {
                print_json(&evolution)
            } else {
                println!("{}", evolution.diagram);
                Ok(())
            }
        }
        Command::Log { protocol } => print_json(&coordinator.get_decision_log(protocol.as_deref())),
        Command::Call { operation, args } => {
            let op: Operation = operation.parse()?;
            let args = match args {
                Some(path) => read_object(&path)?,
                None => Map::new(),
            };
            print_json(&invoke(coordinator, op, &args)?)
        }
    }
}
