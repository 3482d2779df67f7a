//! State document round trips and tolerant loading.

use std::fs;

use serde_json::{Value, json};
use tempfile::tempdir;

use accord_engine::{ErrorKind, LifecycleCoordinator, RevisionChanges};

use crate::common::{coordinator, draft, pipeline_context};

fn seeded_document() -> Value {
    let mut coordinator = coordinator();
    draft(&mut coordinator, pipeline_context());
    coordinator
        .revision("data-pipeline", &RevisionChanges::default(), "ana", "")
        .unwrap();
    let branch = coordinator
        .fork_protocol("data-pipeline", "exp", "bo", "")
        .unwrap();
    coordinator
        .merge_protocol(&branch, "data-pipeline", "ana", None)
        .unwrap();
    accord_store::to_document(coordinator.store()).unwrap()
}

#[test]
fn document_has_every_section() {
    let document = seeded_document();
    let root = document.as_object().unwrap();
    let mut keys: Vec<&str> = root.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        [
            "audit_log",
            "branches",
            "merges",
            "participants",
            "phases",
            "protocols",
            "revisions"
        ]
    );
    assert_eq!(
        document["protocols"]["data-pipeline"]["version"],
        json!("1.0.2")
    );
}

#[test]
fn corrupt_records_are_skipped_with_warnings() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("protocols.json");

    let mut document = seeded_document();
    document["participants"]["bo"]["role"] = json!("wizard");
    document["branches"]["orphan"] = json!({
        "id": "orphan",
        "parent": "missing-protocol",
        "name": "x",
        "created_by": "ana",
        "created_at": "2024-06-01T08:00:00Z",
        "purpose": "",
        "active": true
    });
    fs::write(&path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();

    let mut reloaded = LifecycleCoordinator::default();
    let warnings = reloaded.load_state(&path).unwrap();

    let skipped: Vec<String> = warnings.iter().map(ToString::to_string).collect();
    assert_eq!(warnings.len(), 2, "{skipped:?}");
    assert!(skipped.iter().any(|w| w.starts_with("participants[bo]")));
    assert!(skipped.iter().any(|w| w.starts_with("branches[orphan]")));

    let store = reloaded.store();
    assert!(store.participant("bo").is_none());
    assert!(store.participant("ana").is_some());
    assert_eq!(store.protocol("data-pipeline").unwrap().version, "1.0.2");
    assert_eq!(store.merges().count(), 1);
}

#[test]
fn non_object_document_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("protocols.json");

    fs::write(&path, "[]").unwrap();
    let err = LifecycleCoordinator::default().load_state(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedState);

    fs::write(&path, "{ not json").unwrap();
    let err = LifecycleCoordinator::default().load_state(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedState);
}

#[test]
fn missing_or_blank_file_is_an_empty_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");

    let mut coordinator = coordinator();
    draft(&mut coordinator, pipeline_context());
    let warnings = coordinator.load_state(&path).unwrap();
    assert!(warnings.is_empty());
    assert!(coordinator.store().is_empty());

    fs::write(&path, "  \n").unwrap();
    assert!(coordinator.load_state(&path).unwrap().is_empty());
    assert!(coordinator.store().is_empty());
}

#[test]
fn saved_state_reloads_identically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("protocols.json");

    let mut original = coordinator();
    draft(&mut original, pipeline_context());
    original
        .fork_protocol("data-pipeline", "exp", "ana", "try it")
        .unwrap();
    original.save_state(&path).unwrap();

    let mut reloaded = LifecycleCoordinator::default();
    assert!(reloaded.load_state(&path).unwrap().is_empty());
    assert_eq!(reloaded.store(), original.store());
    assert_eq!(
        reloaded.get_decision_log(None),
        original.get_decision_log(None)
    );
}
