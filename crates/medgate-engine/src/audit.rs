//! Phase 7: audit logging and alert dispatch.
//!
//! Always runs, with the final verdict, whatever happened upstream. The
//! append is best-effort: a failed write is logged and the already-computed
//! decision stands. High-threat and denied evaluations additionally push
//! their alerts through the configured sink.

use tracing::{error, warn};

use medgate_types::{
    AccessVerdict, AlertKind, AlertSink, AuditMetadata, AuditRecord, AuditStore, Operation,
    SecurityAlert, SecurityContext, Severity, ThresholdConfig,
};

/// Persist one evaluation and dispatch its alerts when the outcome
/// warrants attention.
#[allow(clippy::too_many_arguments)]
pub async fn record_evaluation(
    store: &dyn AuditStore,
    sink: &dyn AlertSink,
    config: &ThresholdConfig,
    context: &SecurityContext,
    table_name: &str,
    operation: Operation,
    record_id: Option<&str>,
    verdict: &AccessVerdict,
    metadata: AuditMetadata,
) {
    let record = AuditRecord::from_verdict(context, table_name, operation, record_id, verdict, metadata);

    if let Err(e) = store.append(&record).await {
        // The verdict is already final; a lost row is a logged degradation,
        // not a reason to block or revisit the response.
        error!(
            user = %context.user_id,
            table = table_name,
            error = %e,
            "audit append failed, decision stands"
        );
    }

    if verdict.threat_level > config.alert_threat_level || !verdict.granted {
        dispatch_alerts(sink, context, verdict).await;
    }
}

async fn dispatch_alerts(sink: &dyn AlertSink, context: &SecurityContext, verdict: &AccessVerdict) {
    if verdict.alerts.is_empty() && !verdict.granted {
        // A plain policy denial raised no alert of its own; the channel
        // still gets to see every denial.
        let alert = SecurityAlert::new(
            AlertKind::AccessViolation,
            Severity::Medium,
            format!("Access denied: {}", verdict.reason),
            context,
            "access denied",
        );
        if let Err(e) = sink.dispatch(&alert).await {
            warn!(user = %context.user_id, error = %e, "alert dispatch failed");
        }
        return;
    }

    for alert in &verdict.alerts {
        if let Err(e) = sink.dispatch(alert).await {
            warn!(user = %context.user_id, kind = %alert.kind, error = %e, "alert dispatch failed");
        }
    }
}
