//! The lifecycle coordinator.
//!
//! One `impl LifecycleCoordinator` is spread across the stage modules:
//!
//! ```text
//! clarify    clarify_context               -> ClarifiedContext
//! ideate     ideate                        -> IdeationResults
//! workflow   map_workflow                  -> WorkflowMapping
//! draft      draft_protocol                -> ProtocolDraft
//! revision   revision                      -> RevisionSummary
//! branching  fork_protocol, merge_protocol -> BranchId, MergeSummary
//! query      get_protocol_evolution, get_decision_log
//! ```
//!
//! Stages do not guard their ordering. Each one validates its own inputs,
//! commits to the store, appends to the audit log, and autosaves when a path
//! is configured. A failure part-way through a stage leaves earlier commits
//! of that stage in place.

mod branching;
mod clarify;
mod draft;
mod ideate;
mod query;
mod revision;
mod workflow;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use accord_store::{LoadWarning, ProtocolStore, load_state, save_state};
use accord_types::{AuditAction, AuditEntry, Timestamp};

use crate::clock::{Clock, SystemClock};
use crate::error::EngineError;

pub use branching::MergeSummary;
pub use clarify::{ClarifiedContext, ParticipantSpec};
pub use draft::{Complexity, ProtocolDraft, ProtocolStep};
pub use ideate::{DEFAULT_FOCUS_AREAS, Idea, IdeationResults};
pub use query::ProtocolEvolution;
pub use revision::{RevisionChanges, RevisionSummary};
pub use workflow::{PhaseDependency, WorkflowMapping};

pub const DEFAULT_MERGE_STRATEGY: &str = "recursive";
pub const DEFAULT_UNITS_PER_PHASE: u32 = 5;

/// Author recorded for stage entries when the caller names nobody.
pub const SYSTEM_AUTHOR: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub default_strategy: String,
    pub units_per_phase: u32,
    /// Where to write the state document after each mutating stage.
    pub autosave_path: Option<PathBuf>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            default_strategy: DEFAULT_MERGE_STRATEGY.to_string(),
            units_per_phase: DEFAULT_UNITS_PER_PHASE,
            autosave_path: None,
        }
    }
}

pub struct LifecycleCoordinator {
    store: ProtocolStore,
    clock: Arc<dyn Clock>,
    settings: CoordinatorSettings,
}

impl std::fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("stats", &self.store.stats())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Default for LifecycleCoordinator {
    fn default() -> Self {
        Self::new(ProtocolStore::new())
    }
}

impl LifecycleCoordinator {
    #[must_use]
    pub fn new(store: ProtocolStore) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            settings: CoordinatorSettings::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn store(&self) -> &ProtocolStore {
        &self.store
    }

    #[must_use]
    pub fn into_store(self) -> ProtocolStore {
        self.store
    }

    #[must_use]
    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    // ── Persistence ──────────────────────────────────────────

    pub fn save_state(&self, path: &Path) -> Result<(), EngineError> {
        save_state(&self.store, path)?;
        Ok(())
    }

    /// Replace the in-memory store with the document at `path`.
    ///
    /// Records that fail to load are skipped and returned as warnings.
    pub fn load_state(&mut self, path: &Path) -> Result<Vec<LoadWarning>, EngineError> {
        let loaded = load_state(path)?;
        self.store = loaded.store;
        Ok(loaded.warnings)
    }

    fn autosave(&self) -> Result<(), EngineError> {
        if let Some(path) = &self.settings.autosave_path {
            save_state(&self.store, path)?;
        }
        Ok(())
    }

    // ── Shared helpers ───────────────────────────────────────

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn audit(
        &mut self,
        action: AuditAction,
        protocol_name: Option<&str>,
        author: &str,
        timestamp: Timestamp,
        details: impl Into<String>,
    ) {
        let entry = AuditEntry::new(action, protocol_name, author, timestamp, details);
        tracing::debug!(
            action = %entry.action,
            protocol = entry.protocol_name.as_deref().unwrap_or("-"),
            author = %entry.author,
            "Audit entry appended"
        );
        self.store.append_audit(entry);
    }

    /// Append `reference` to a participant's contributions if `author` is one.
    fn credit(&mut self, author: &str, reference: &str) {
        if self.store.participant(author).is_some()
            && let Err(err) = self.store.record_contribution(author, reference)
        {
            tracing::warn!("Failed to credit {author} with {reference}: {err}");
        }
    }
}

/// `Some(name)` unless the name is blank.
fn named(name: &str) -> Option<&str> {
    let trimmed = name.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
