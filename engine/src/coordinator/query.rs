use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use accord_types::{AuditEntry, Branch, Merge, Revision};

use super::LifecycleCoordinator;
use crate::error::EngineError;

const DIAGRAM_REVISIONS: usize = 3;
const DIAGRAM_BRANCHES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolEvolution {
    pub protocol_name: String,
    pub current_version: String,
    pub revisions: Vec<Revision>,
    pub branches: Vec<Branch>,
    pub merges: Vec<Merge>,
    pub diagram: String,
}

/// The last `limit` items, plus how many were left out.
fn tail<T>(items: &[T], limit: usize) -> (&[T], usize) {
    let skipped = items.len().saturating_sub(limit);
    (&items[skipped..], skipped)
}

fn render_diagram(
    name: &str,
    version: &str,
    revisions: &[Revision],
    branches: &[Branch],
    merges: &[Merge],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{name} v{version}");

    let _ = writeln!(out, "  revisions ({}):", revisions.len());
    let (shown, skipped) = tail(revisions, DIAGRAM_REVISIONS);
    if skipped > 0 {
        let _ = writeln!(out, "    ... {skipped} earlier");
    }
    for revision in shown {
        let _ = writeln!(
            out,
            "    {} -> {}  {} ({})",
            revision.previous_version, revision.version, revision.description, revision.author
        );
    }

    let _ = writeln!(out, "  branches ({}):", branches.len());
    let (shown, skipped) = tail(branches, DIAGRAM_BRANCHES);
    if skipped > 0 {
        let _ = writeln!(out, "    ... {skipped} earlier");
    }
    for branch in shown {
        let state = if branch.is_active() { "active" } else { "merged" };
        let _ = writeln!(out, "    {} -> {} [{state}]", branch.name, branch.protocol_name());
    }

    let _ = write!(out, "  merges ({})", merges.len());
    out
}

impl LifecycleCoordinator {
    pub fn get_protocol_evolution(
        &self,
        protocol_name: &str,
    ) -> Result<ProtocolEvolution, EngineError> {
        let protocol = self
            .store
            .protocol(protocol_name)
            .ok_or_else(|| EngineError::ProtocolNotFound(protocol_name.to_string()))?;

        let revisions = self.store.revisions(protocol_name).to_vec();
        let branches: Vec<Branch> = self
            .store
            .branches_of(protocol_name)
            .into_iter()
            .cloned()
            .collect();
        let merges: Vec<Merge> = self
            .store
            .merges_into(protocol_name)
            .into_iter()
            .cloned()
            .collect();
        let diagram = render_diagram(
            protocol_name,
            &protocol.version,
            &revisions,
            &branches,
            &merges,
        );

        Ok(ProtocolEvolution {
            protocol_name: protocol_name.to_string(),
            current_version: protocol.version.clone(),
            revisions,
            branches,
            merges,
            diagram,
        })
    }

    /// Owned copy of the audit log, optionally narrowed to one protocol.
    #[must_use]
    pub fn get_decision_log(&self, protocol_name: Option<&str>) -> Vec<AuditEntry> {
        let log = self.store.audit_log();
        match protocol_name {
            Some(name) => log.iter().filter(|e| e.concerns(name)).cloned().collect(),
            None => log.to_vec(),
        }
    }
}
