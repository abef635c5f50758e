//! Audit records, reporting views, and the append-only store interface.
//!
//! Every evaluation — granted or denied, successful or erroring — produces
//! exactly one [`AuditRecord`]. The store is append-only with at-least-once
//! write semantics: duplicate rows under retry are acceptable, lost rows
//! are a logged degradation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::SecurityAlert;
use crate::context::{Operation, SecurityContext, UserRole};
use crate::verdict::AccessVerdict;
use crate::MedgateError;

/// Threat-scorer sub-scores recorded for one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreatBreakdown {
    pub ip_score: u8,
    pub frequency_score: u8,
    pub time_score: u8,
    pub total: u8,
}

/// Pattern-analyzer outcome recorded for one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternBreakdown {
    pub score: u8,
    pub anomalies: Vec<String>,
}

/// Row-level policy outcome recorded for one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyBreakdown {
    pub allowed: bool,
    pub reason: Option<String>,
    pub audit_required: bool,
    pub emergency_access: bool,
    pub conditions: Vec<String>,
}

/// Header-compliance outcome recorded for one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeaderBreakdown {
    pub missing: Vec<String>,
    pub modifier: i8,
}

/// Failure tag attached when the evaluation pipeline itself errored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationFailure {
    SecurityEvaluationFailure { message: String },
}

/// Structured metadata stored alongside each audit row.
///
/// A closed set of per-phase breakdowns instead of a free-form blob, so
/// report consumers never do stringly-typed lookups.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditMetadata {
    /// Wall-clock duration of the evaluation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat: Option<ThreatBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PatternBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HeaderBreakdown>,
    /// Alerts raised during the evaluation, copied by value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<SecurityAlert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<EvaluationFailure>,
    /// Sanitized request body supplied by the caller, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<serde_json::Value>,
}

/// One row of the append-only audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_role: UserRole,
    pub clinic_id: String,
    pub operation: Operation,
    pub table_name: String,
    pub record_id: Option<String>,
    pub granted: bool,
    pub reason: String,
    pub security_score: u8,
    pub threat_level: u8,
    pub session_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub emergency_access: bool,
    pub metadata: AuditMetadata,
}

impl AuditRecord {
    /// Build the audit row for a finished evaluation.
    pub fn from_verdict(
        context: &SecurityContext,
        table_name: &str,
        operation: Operation,
        record_id: Option<&str>,
        verdict: &AccessVerdict,
        metadata: AuditMetadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: context.user_id.clone(),
            user_role: context.user_role,
            clinic_id: context.clinic_id.clone(),
            operation,
            table_name: table_name.to_string(),
            record_id: record_id.map(str::to_string),
            granted: verdict.granted,
            reason: verdict.reason.clone(),
            security_score: verdict.security_score,
            threat_level: verdict.threat_level,
            session_id: context.session_id.clone(),
            ip_address: context.ip_address.map(|ip| ip.to_string()),
            user_agent: context.user_agent.clone(),
            emergency_access: context.emergency_access,
            metadata,
        }
    }
}

/// Per-user aggregation over the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSecuritySummary {
    pub user_id: String,
    pub total_evaluations: u64,
    pub denied_count: u64,
    pub average_security_score: f64,
    pub average_threat_level: f64,
    pub emergency_access_count: u64,
    pub last_access: Option<DateTime<Utc>>,
    /// Reasons of the most recent denials, newest first (at most 5).
    pub recent_denial_reasons: Vec<String>,
}

/// Filter for [`AuditStore::security_report`]. All fields optional;
/// `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub clinic_id: Option<String>,
    /// Threat level above which a row counts as high-threat (default 70).
    pub threat_threshold: Option<u8>,
}

/// Aggregated view over the audit rows matching a [`ReportFilter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityReport {
    pub total_evaluations: u64,
    pub granted_count: u64,
    pub denied_count: u64,
    pub denial_rate: f64,
    pub average_security_score: f64,
    pub average_threat_level: f64,
    pub high_threat_count: u64,
    pub emergency_access_count: u64,
    /// Evaluation counts per operation.
    pub operations: Vec<(String, u64)>,
    /// Top 3 UTC hours by denied count: (hour, denied).
    pub peak_threat_hours: Vec<(u8, u64)>,
    pub earliest_entry: Option<DateTime<Utc>>,
    pub latest_entry: Option<DateTime<Utc>>,
}

/// Append-only audit storage plus the read queries the scorers and the
/// reporting surface need.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append one audit row. At-least-once; never read back for the
    /// decision path.
    async fn append(&self, record: &AuditRecord) -> Result<(), MedgateError>;

    /// Count rows for `user_id` within `clinic_id` newer than `window` ago.
    async fn count_recent(
        &self,
        user_id: &str,
        clinic_id: &str,
        window: Duration,
    ) -> Result<u64, MedgateError>;

    /// The most recent rows for `user_id`, newest first, at most `limit`.
    async fn recent_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, MedgateError>;

    /// Aggregate one user's history into a summary.
    async fn user_security_summary(
        &self,
        user_id: &str,
    ) -> Result<UserSecuritySummary, MedgateError>;

    /// Aggregate the rows matching `filter` into a report.
    async fn security_report(&self, filter: &ReportFilter)
        -> Result<SecurityReport, MedgateError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> AuditRecord {
        let ctx = SecurityContext::new("user-1", UserRole::Doctor, "clinic-1", "sess-1")
            .with_ip("192.168.1.10".parse().unwrap());
        let verdict = AccessVerdict {
            granted: true,
            reason: "Access granted by row-level policy".into(),
            security_score: 85,
            threat_level: 10,
            requirements: vec!["Audit logging required".into()],
            alerts: Vec::new(),
        };
        AuditRecord::from_verdict(
            &ctx,
            "patients",
            Operation::Select,
            Some("rec-42"),
            &verdict,
            AuditMetadata::default(),
        )
    }

    #[test]
    fn record_copies_verdict_and_context() {
        let record = sample_record();
        assert!(record.granted);
        assert_eq!(record.security_score, 85);
        assert_eq!(record.threat_level, 10);
        assert_eq!(record.table_name, "patients");
        assert_eq!(record.record_id.as_deref(), Some("rec-42"));
        assert_eq!(record.ip_address.as_deref(), Some("192.168.1.10"));
    }

    #[test]
    fn metadata_serializes_compactly_when_empty() {
        let json = serde_json::to_string(&AuditMetadata::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn evaluation_failure_wire_format() {
        let failure = EvaluationFailure::SecurityEvaluationFailure {
            message: "phase panicked".into(),
        };
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("SECURITY_EVALUATION_FAILURE"));
        let back: EvaluationFailure = serde_json::from_str(&json).unwrap();
        assert_eq!(back, failure);
    }

    #[test]
    fn record_serialization_roundtrip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
