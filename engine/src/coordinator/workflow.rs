use serde::{Deserialize, Serialize};

use accord_types::{AuditAction, Phase};

use super::{ClarifiedContext, IdeationResults, LifecycleCoordinator, SYSTEM_AUTHOR};
use crate::error::EngineError;

/// Ideas pulled from each relevant theme into a phase's criteria.
const IDEAS_PER_THEME: usize = 3;
const MAX_PHASES: usize = 5;
const MAX_CRITERIA_PER_PHASE: usize = 5;

struct PhaseTemplate {
    name: &'static str,
    description: &'static str,
    inputs: &'static [&'static str],
    outputs: &'static [&'static str],
    criteria: &'static [&'static str],
    themes: &'static [&'static str],
}

const PHASE_TEMPLATES: [PhaseTemplate; 4] = [
    PhaseTemplate {
        name: "initialization",
        description: "Establish scope and gather requirements",
        inputs: &["context", "participants"],
        outputs: &["requirements", "roles"],
        criteria: &["Participants confirmed", "Requirements documented"],
        themes: &["requirements"],
    },
    PhaseTemplate {
        name: "execution",
        description: "Carry out the planned work",
        inputs: &["requirements", "roles"],
        outputs: &["deliverables"],
        criteria: &["Planned tasks completed"],
        themes: &["strategies", "features"],
    },
    PhaseTemplate {
        name: "validation",
        description: "Check deliverables against agreed constraints",
        inputs: &["deliverables"],
        outputs: &["validation_report"],
        criteria: &["Deliverables reviewed", "Constraints satisfied"],
        themes: &["constraints"],
    },
    PhaseTemplate {
        name: "finalization",
        description: "Approve and publish the protocol",
        inputs: &["validation_report"],
        outputs: &["final_protocol"],
        criteria: &["Approval recorded"],
        themes: &[],
    },
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDependency {
    pub phase: String,
    pub depends_on: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowMapping {
    #[serde(default)]
    pub protocol_name: String,
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub dependencies: Vec<PhaseDependency>,
    /// In abstract units, `units_per_phase` per phase.
    #[serde(default)]
    pub estimated_duration: u32,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

impl WorkflowMapping {
    #[must_use]
    pub fn total_criteria(&self) -> usize {
        self.phases.iter().map(|p| p.success_criteria.len()).sum()
    }
}

fn build_phase(template: &PhaseTemplate, ideation: &IdeationResults) -> Phase {
    let mut phase = Phase::new(template.name, template.description);
    phase.inputs = strings(template.inputs);
    phase.outputs = strings(template.outputs);
    phase.success_criteria = strings(template.criteria);
    for theme in template.themes {
        phase.success_criteria.extend(
            ideation
                .cluster(theme)
                .iter()
                .take(IDEAS_PER_THEME)
                .map(|idea| format!("Addressed: {}", idea.text)),
        );
    }
    phase
}

fn dependencies(phases: &[Phase]) -> Vec<PhaseDependency> {
    phases
        .windows(2)
        .map(|pair| PhaseDependency {
            phase: pair[1].name.clone(),
            depends_on: pair[0].name.clone(),
        })
        .collect()
}

fn risk_factors(phases: &[Phase]) -> Vec<String> {
    let mut risks = Vec::new();
    if phases.len() > MAX_PHASES {
        risks.push(format!(
            "Workflow has {} phases; coordination overhead grows with each one",
            phases.len()
        ));
    }
    for phase in phases {
        let count = phase.success_criteria.len();
        if count > MAX_CRITERIA_PER_PHASE {
            risks.push(format!(
                "Phase '{}' has {count} success criteria and may be hard to close",
                phase.name
            ));
        }
    }
    risks
}

impl LifecycleCoordinator {
    /// Map the four standard phases, enriched with clustered ideas.
    ///
    /// When the context names a protocol, its stored phase list is replaced.
    pub fn map_workflow(
        &mut self,
        context: &ClarifiedContext,
        ideation: &IdeationResults,
    ) -> Result<WorkflowMapping, EngineError> {
        let phases: Vec<Phase> = PHASE_TEMPLATES
            .iter()
            .map(|template| build_phase(template, ideation))
            .collect();
        let units = self.settings.units_per_phase;
        let phase_count = u32::try_from(phases.len()).unwrap_or(u32::MAX);

        let mapping = WorkflowMapping {
            protocol_name: context.protocol_name.clone(),
            dependencies: dependencies(&phases),
            estimated_duration: units.saturating_mul(phase_count),
            risk_factors: risk_factors(&phases),
            phases,
        };

        if let Some(name) = context.name() {
            let replaced = self.store.replace_phases(name, mapping.phases.clone());
            if !replaced.is_empty() {
                tracing::debug!(
                    protocol = name,
                    previous = replaced.len(),
                    "Replaced mapped phases"
                );
            }
        }

        let now = self.now();
        self.audit(
            AuditAction::WorkflowMapped,
            context.name(),
            SYSTEM_AUTHOR,
            now,
            format!(
                "{} phase(s), {} risk factor(s)",
                mapping.phases.len(),
                mapping.risk_factors.len()
            ),
        );
        self.autosave()?;
        Ok(mapping)
    }
}
