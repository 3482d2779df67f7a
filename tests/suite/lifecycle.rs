//! End-to-end lifecycle behavior through the public engine API.

use serde_json::json;

use accord_engine::{
    Complexity, ErrorKind, Operation, RevisionChanges, SharedCoordinator, invoke,
};
use accord_types::{AuditAction, CollaborationMode, ParticipantRole, ProtocolScope};

use crate::common::{coordinator, draft, object, pipeline_context};

#[test]
fn drafting_registers_protocol_participants_and_phases() {
    let mut coordinator = coordinator();
    let drafted = draft(&mut coordinator, pipeline_context());

    assert!(drafted.registered);
    assert_eq!(drafted.steps.len(), 4);
    assert_eq!(drafted.steps[0].name, "initialization");
    assert_eq!(drafted.complexity, Complexity::Medium);
    assert!(drafted.outstanding_issues.is_empty());

    let store = coordinator.store();
    let protocol = store.protocol("data-pipeline").unwrap();
    assert_eq!(protocol.version, "1.0.0");
    assert_eq!(protocol.scope, ProtocolScope::Broad);
    assert_eq!(
        protocol.metadata.get("collaboration_mode"),
        Some(&json!(CollaborationMode::Asynchronous.as_str()))
    );
    assert_eq!(store.phases("data-pipeline").len(), 4);
    assert_eq!(
        store.participant("cy").unwrap().role,
        ParticipantRole::Contributor
    );
}

#[test]
fn full_evolution_scenario() {
    let mut coordinator = coordinator();
    draft(&mut coordinator, pipeline_context());

    for author in ["ana", "bo"] {
        coordinator
            .revision(
                "data-pipeline",
                &RevisionChanges::default(),
                author,
                "tighten",
            )
            .unwrap();
    }
    let branch = coordinator
        .fork_protocol("data-pipeline", "experimental", "cy", "streaming ingest")
        .unwrap();
    let merged = coordinator
        .merge_protocol(&branch, "data-pipeline", "ana", None)
        .unwrap();

    assert_eq!(merged.new_version, "1.0.3");
    assert_eq!(merged.conflicts_resolved, ["purpose_conflict_resolved"]);

    let evolution = coordinator.get_protocol_evolution("data-pipeline").unwrap();
    assert_eq!(evolution.current_version, "1.0.3");
    assert_eq!(evolution.revisions.len(), 2);
    assert_eq!(evolution.branches.len(), 1);
    assert_eq!(evolution.merges.len(), 1);
    assert!(!evolution.branches[0].is_active());

    let log = coordinator.get_decision_log(Some("data-pipeline"));
    assert_eq!(log.last().unwrap().action, AuditAction::ProtocolMerged);
}

#[test]
fn diagram_keeps_only_recent_history() {
    let mut coordinator = coordinator();
    draft(&mut coordinator, pipeline_context());
    for _ in 0..5 {
        coordinator
            .revision("data-pipeline", &RevisionChanges::default(), "ana", "")
            .unwrap();
    }
    for name in ["a", "b", "c"] {
        coordinator
            .fork_protocol("data-pipeline", name, "ana", "")
            .unwrap();
    }

    let diagram = coordinator
        .get_protocol_evolution("data-pipeline")
        .unwrap()
        .diagram;
    assert_eq!(diagram.matches(" -> 1.0.").count(), 3);
    assert_eq!(diagram.matches("[active]").count(), 2);
    assert!(diagram.contains("... 2 earlier"));
    assert!(diagram.contains("... 1 earlier"));
    assert!(!diagram.contains("a -> data-pipeline_a"));
}

#[test]
fn branch_clone_evolves_independently() {
    let mut coordinator = coordinator();
    draft(&mut coordinator, pipeline_context());
    coordinator
        .fork_protocol("data-pipeline", "exp", "ana", "")
        .unwrap();

    let summary = coordinator
        .revision(
            "data-pipeline_exp",
            &RevisionChanges {
                scope: Some(ProtocolScope::Pilot),
                ..RevisionChanges::default()
            },
            "ana",
            "",
        )
        .unwrap();
    assert_eq!(summary.previous_version, "1.0.0_branch");
    assert_eq!(summary.new_version, "1.0.1");
    assert_eq!(
        coordinator.store().protocol("data-pipeline").unwrap().scope,
        ProtocolScope::Broad
    );
}

#[test]
fn errors_carry_their_kind() {
    let mut coordinator = coordinator();
    let err = coordinator
        .revision("ghost", &RevisionChanges::default(), "ana", "")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = coordinator
        .clarify_context(&object(json!({"type": "mystical"})))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidVariant);
    assert!(err.to_string().contains("mystical"));

    draft(&mut coordinator, pipeline_context());
    let branch = coordinator
        .fork_protocol("data-pipeline", "exp", "ana", "")
        .unwrap();
    coordinator
        .merge_protocol(&branch, "data-pipeline", "ana", None)
        .unwrap();
    let err = coordinator
        .merge_protocol(&branch, "data-pipeline", "ana", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyMerged);
}

#[test]
fn surface_and_shared_handle_agree() {
    let shared = SharedCoordinator::new(coordinator());
    shared.write(|coordinator| {
        draft(coordinator, pipeline_context());
    });

    let revised = shared
        .invoke(
            Operation::Revision,
            &object(json!({"protocol_name": "data-pipeline", "changes": {"scope": "narrow"}})),
        )
        .unwrap();
    assert_eq!(revised["new_version"], "1.0.1");

    let direct = shared.write(|coordinator| {
        invoke(
            coordinator,
            Operation::GetDecisionLog,
            &object(json!({"protocol_name": "data-pipeline"})),
        )
        .unwrap()
    });
    let via_read = shared
        .invoke(
            Operation::GetDecisionLog,
            &object(json!({"protocol_name": "data-pipeline"})),
        )
        .unwrap();
    assert_eq!(direct, via_read);
}
