//! Fail-closed behavior: collaborator outages degrade inside their phase,
//! the pipeline always completes, and nothing ever defaults to allowed on
//! internal error.

mod common;

use std::sync::Arc;

use medgate_engine::SecurityEvaluator;
use medgate_types::{Operation, PolicyDecision, SecurityConfig, UserRole};

use common::{clean_context, CollectingSink, ErroringPolicy, FixedPolicy, FlakyStore};

#[tokio::test]
async fn policy_engine_outage_denies_with_review_requirement() {
    let store = Arc::new(FlakyStore::default());
    let sink = Arc::new(CollectingSink::default());
    let eval = SecurityEvaluator::new(
        store.clone(),
        Arc::new(ErroringPolicy),
        sink,
        SecurityConfig::default(),
    );

    let ctx = clean_context("dr-lee", UserRole::Doctor);
    let verdict = eval
        .evaluate_access(&ctx, "patients", Operation::Select, None, None)
        .await;

    assert!(!verdict.granted);
    assert_eq!(verdict.reason, "RLS evaluation error");
    assert!(verdict
        .requirements
        .contains(&"Manual security review required".to_string()));

    // The denial was still audited.
    let rows = store.appended();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].granted);
}

#[tokio::test]
async fn storage_read_outage_degrades_pattern_analysis() {
    let store = Arc::new(FlakyStore {
        fail_count: true,
        fail_recent: true,
        ..Default::default()
    });
    let sink = Arc::new(CollectingSink::default());
    let eval = SecurityEvaluator::new(
        store.clone(),
        Arc::new(FixedPolicy(PolicyDecision::allow())),
        sink,
        SecurityConfig::default(),
    );

    let ctx = clean_context("dr-lee", UserRole::Doctor);
    let verdict = eval
        .evaluate_access(&ctx, "patients", Operation::Select, None, None)
        .await;

    // The evaluation completed with the documented fallbacks: pattern
    // score 50, burst sub-score 20.
    assert!(verdict.granted);
    assert_eq!(verdict.security_score, 50);
    assert_eq!(verdict.threat_level, 30);

    let rows = store.appended();
    let pattern = rows[0].metadata.pattern.as_ref().unwrap();
    assert_eq!(pattern.anomalies, vec!["Pattern analysis failed".to_string()]);
    assert_eq!(rows[0].metadata.threat.as_ref().unwrap().frequency_score, 20);
}

#[tokio::test]
async fn total_storage_outage_still_returns_a_verdict() {
    let store = Arc::new(FlakyStore {
        fail_count: true,
        fail_recent: true,
        fail_append: true,
        ..Default::default()
    });
    let sink = Arc::new(CollectingSink::default());
    let eval = SecurityEvaluator::new(
        store,
        Arc::new(FixedPolicy(PolicyDecision::allow())),
        sink,
        SecurityConfig::default(),
    );

    let ctx = clean_context("dr-lee", UserRole::Doctor);
    let verdict = eval
        .evaluate_access(&ctx, "patients", Operation::Select, None, None)
        .await;

    // No panic, no error: a concrete verdict with degraded scores.
    assert!(verdict.granted);
    assert_eq!(verdict.security_score, 50);
}

#[tokio::test]
async fn scores_stay_in_bounds_under_extremes() {
    // Everything hostile at once: unknown IP and heavy recent history.
    let store = Arc::new(FlakyStore::default());
    let sink = Arc::new(CollectingSink::default());
    let eval = SecurityEvaluator::new(
        store.clone(),
        Arc::new(FixedPolicy(PolicyDecision::allow())),
        sink,
        SecurityConfig::default(),
    );

    for _ in 0..120 {
        let filler = clean_context("dr-lee", UserRole::Doctor);
        eval.evaluate_access(&filler, "medical_records", Operation::Select, None, None)
            .await;
    }

    let ctx = medgate_types::SecurityContext::new(
        "dr-lee",
        UserRole::Doctor,
        "clinic-1",
        "sess-1",
    )
    .with_emergency_access(true);
    let verdict = eval
        .evaluate_access(&ctx, "billing_records", Operation::Select, None, None)
        .await;

    assert!(verdict.security_score <= 100);
    assert!(verdict.threat_level <= 100);
    // Frequency, sequence, and role penalties stack to a score of 5; the
    // floor denies and the override cannot climb over it.
    assert!(!verdict.granted);
    assert!(verdict.reason.starts_with("Security score"));
}

#[tokio::test]
async fn incomplete_identity_is_refused_and_audited() {
    let store = Arc::new(FlakyStore::default());
    let sink = Arc::new(CollectingSink::default());
    let eval = SecurityEvaluator::new(
        store.clone(),
        Arc::new(FixedPolicy(PolicyDecision::allow())),
        sink,
        SecurityConfig::default(),
    );

    let ctx = medgate_types::SecurityContext::new("", UserRole::Doctor, "clinic-1", "sess-1");
    let verdict = eval
        .evaluate_access(&ctx, "patients", Operation::Select, None, None)
        .await;

    assert!(!verdict.granted);
    assert_eq!(store.appended().len(), 1);
}
