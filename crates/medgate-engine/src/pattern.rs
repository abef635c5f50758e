//! Phase 2: access-pattern analysis.
//!
//! Starts from a perfect security score of 100 and subtracts penalties for
//! high-frequency access, suspicious sensitive-table sequences, role/table
//! inconsistency, and source-IP drift. Storage failures degrade to a
//! moderate fallback score instead of erroring out.

use std::time::Duration;

use tracing::warn;

use medgate_types::{
    AuditStore, MedgateError, Operation, PatternBreakdown, SecurityConfig, SecurityContext,
};

/// Analyze one request's access pattern.
pub async fn analyze_access_patterns(
    store: &dyn AuditStore,
    config: &SecurityConfig,
    context: &SecurityContext,
    table_name: &str,
    operation: Operation,
) -> PatternBreakdown {
    match analyze_inner(store, config, context, table_name, operation).await {
        Ok(breakdown) => breakdown,
        Err(e) => {
            warn!(user = %context.user_id, error = %e, "pattern analysis degraded");
            PatternBreakdown {
                score: config.pattern.fallback_score,
                anomalies: vec!["Pattern analysis failed".to_string()],
            }
        }
    }
}

async fn analyze_inner(
    store: &dyn AuditStore,
    config: &SecurityConfig,
    context: &SecurityContext,
    table_name: &str,
    operation: Operation,
) -> Result<PatternBreakdown, MedgateError> {
    let pattern = &config.pattern;
    let mut score = 100u8;
    let mut anomalies: Vec<String> = Vec::new();

    // High-frequency access within the short window.
    let count = store
        .count_recent(
            &context.user_id,
            &context.clinic_id,
            Duration::from_secs(pattern.frequency_window_secs),
        )
        .await?;
    if count > pattern.frequency_max_requests {
        score = score.saturating_sub(pattern.frequency_penalty);
        anomalies.push("High-frequency access detected".to_string());
    }

    let recent = store
        .recent_for_user(&context.user_id, pattern.sequence_depth)
        .await?;

    // Sensitive-table sequence: a sensitive read in the recent window
    // followed by another sensitive-table access looks like scraping.
    if config.is_sensitive_table(table_name)
        && recent.iter().any(|record| {
            record.operation == Operation::Select && config.is_sensitive_table(&record.table_name)
        })
    {
        score = score.saturating_sub(pattern.sensitive_sequence_penalty);
        anomalies.push("Unusual sensitive-table access sequence".to_string());
    }

    // Role/table consistency against the configured matrix.
    if !config.matrix_allows(context.user_role, operation, table_name) {
        score = score.saturating_sub(pattern.role_mismatch_penalty);
        anomalies.push(format!(
            "Role {} does not normally {} {}",
            context.user_role, operation, table_name
        ));
    }

    // Source-IP drift against the immediately preceding access. Drift
    // requires a recorded IP on both sides.
    if let (Some(previous_ip), Some(current_ip)) = (
        recent.first().and_then(|record| record.ip_address.as_deref()),
        context.ip_address,
    ) {
        if previous_ip != current_ip.to_string() {
            score = score.saturating_sub(pattern.ip_drift_penalty);
            anomalies.push("IP address changed since previous access".to_string());
        }
    }

    Ok(PatternBreakdown { score, anomalies })
}
