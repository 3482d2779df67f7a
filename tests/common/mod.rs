//! Shared test utilities and fixtures

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::{Map, Value, json};

use accord_engine::{LifecycleCoordinator, ProtocolDraft, SteppingClock};

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Coordinator whose clock starts at 2024-06-01T08:00:00Z and ticks one
/// second per call.
pub fn coordinator() -> LifecycleCoordinator {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    LifecycleCoordinator::default().with_clock(Arc::new(SteppingClock::new(
        start,
        Duration::seconds(1),
    )))
}

pub fn pipeline_context() -> Value {
    json!({
        "name": "data-pipeline",
        "type": "technical",
        "scope": "broad",
        "purpose": "Move data reliably",
        "domain": "etl",
        "collaboration_mode": "asynchronous",
        "participants": [
            {"id": "ana", "role": "initiator", "expertise": "ingest"},
            {"id": "bo", "role": "reviewer"},
            "cy"
        ],
        "goals": ["Nightly loads finish by 06:00"]
    })
}

/// Run clarify -> ideate -> map -> draft.
pub fn draft(coordinator: &mut LifecycleCoordinator, context: Value) -> ProtocolDraft {
    let clarified = coordinator.clarify_context(&object(context)).unwrap();
    let ideas = coordinator.ideate(&clarified, None).unwrap();
    let mapping = coordinator.map_workflow(&clarified, &ideas).unwrap();
    coordinator.draft_protocol(&clarified, &mapping).unwrap()
}
