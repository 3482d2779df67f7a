use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use accord_types::AuditAction;

use super::{ClarifiedContext, LifecycleCoordinator, SYSTEM_AUTHOR};
use crate::error::EngineError;

pub const DEFAULT_FOCUS_AREAS: [&str; 4] = ["requirements", "strategies", "features", "constraints"];

const FALLBACK_PURPOSE: &str = "the protocol";

/// Idea templates. `{domain}` and `{purpose}` are substituted.
const IDEA_TEMPLATES: [&str; 7] = [
    "Gather {domain} requirements for {purpose}",
    "List non-functional requirements such as reliability and security",
    "Compare delivery strategies for {purpose}",
    "Use incremental rollout strategies with review checkpoints",
    "Prioritize the core features {domain} practitioners rely on",
    "Document budget and schedule constraints early",
    "Review regulatory constraints that apply to {domain}",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdeationResults {
    #[serde(default)]
    pub protocol_name: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    #[serde(default)]
    pub raw_ideas: Vec<Idea>,
    /// Focus area -> ideas whose text mentions it. An idea may sit in several.
    #[serde(default)]
    pub clusters: BTreeMap<String, Vec<Idea>>,
    /// One empty slot per clarified participant, filled in by callers.
    #[serde(default)]
    pub participant_contributions: BTreeMap<String, Vec<String>>,
}

impl IdeationResults {
    /// Ideas clustered under `theme`, empty if the theme was not a focus area.
    #[must_use]
    pub fn cluster(&self, theme: &str) -> &[Idea] {
        self.clusters.get(theme).map_or(&[], Vec::as_slice)
    }
}

fn generate_ideas(domain: &str, purpose: &str) -> Vec<Idea> {
    let purpose = if purpose.trim().is_empty() {
        FALLBACK_PURPOSE
    } else {
        purpose.trim()
    };
    IDEA_TEMPLATES
        .iter()
        .enumerate()
        .map(|(index, template)| Idea {
            id: format!("idea_{}", index + 1),
            text: template
                .replace("{domain}", domain)
                .replace("{purpose}", purpose),
        })
        .collect()
}

fn cluster_ideas(ideas: &[Idea], focus_areas: &[String]) -> BTreeMap<String, Vec<Idea>> {
    focus_areas
        .iter()
        .map(|area| {
            let keyword = area.to_lowercase();
            let matching = ideas
                .iter()
                .filter(|idea| idea.text.to_lowercase().contains(&keyword))
                .cloned()
                .collect();
            (area.clone(), matching)
        })
        .collect()
}

fn normalize_focus_areas(focus_areas: Option<&[String]>) -> Vec<String> {
    let mut areas: Vec<String> = focus_areas
        .unwrap_or_default()
        .iter()
        .map(|area| area.trim().to_lowercase())
        .filter(|area| !area.is_empty())
        .collect();
    let mut seen = BTreeSet::new();
    areas.retain(|area| seen.insert(area.clone()));
    if areas.is_empty() {
        DEFAULT_FOCUS_AREAS.iter().map(ToString::to_string).collect()
    } else {
        areas
    }
}

impl LifecycleCoordinator {
    /// Generate the fixed idea set for a clarified context and cluster it.
    pub fn ideate(
        &mut self,
        context: &ClarifiedContext,
        focus_areas: Option<&[String]>,
    ) -> Result<IdeationResults, EngineError> {
        let focus_areas = normalize_focus_areas(focus_areas);
        let raw_ideas = generate_ideas(&context.domain, &context.purpose);
        let clusters = cluster_ideas(&raw_ideas, &focus_areas);
        let participant_contributions = context
            .participants
            .iter()
            .map(|participant| (participant.id.clone(), Vec::new()))
            .collect();

        let results = IdeationResults {
            protocol_name: context.protocol_name.clone(),
            focus_areas,
            raw_ideas,
            clusters,
            participant_contributions,
        };

        let now = self.now();
        self.audit(
            AuditAction::IdeationRecorded,
            context.name(),
            SYSTEM_AUTHOR,
            now,
            format!(
                "{} idea(s) across {} focus area(s)",
                results.raw_ideas.len(),
                results.focus_areas.len()
            ),
        );
        self.autosave()?;
        Ok(results)
    }
}
