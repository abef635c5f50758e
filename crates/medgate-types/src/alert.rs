//! Security alerts raised during evaluation and the sink that delivers them.
//!
//! Alerts are append-only observations: phases attach them to the verdict,
//! the audit sink copies them into the audit record's metadata, and
//! high-risk evaluations additionally push them through an [`AlertSink`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::SecurityContext;
use crate::MedgateError;

/// The category of a security alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    AccessViolation,
    ThreatDetected,
    SuspiciousPattern,
    EmergencyAccess,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AlertKind::AccessViolation => "ACCESS_VIOLATION",
            AlertKind::ThreatDetected => "THREAT_DETECTED",
            AlertKind::SuspiciousPattern => "SUSPICIOUS_PATTERN",
            AlertKind::EmergencyAccess => "EMERGENCY_ACCESS",
        };
        write!(f, "{name}")
    }
}

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{name}")
    }
}

/// Structured payload attached to an alert, one variant per origin phase.
///
/// A closed union instead of a free-form map so consumers get
/// compile-time guarantees about what each alert kind carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum AlertDetails {
    /// Threat-scorer sub-scores at the time the alert fired.
    ThreatAssessment {
        ip_score: u8,
        frequency_score: u8,
        time_score: u8,
        recent_access_count: u64,
    },
    /// Pattern-analyzer outcome.
    PatternAnalysis { score: u8, anomalies: Vec<String> },
    /// Row-level policy engine outcome.
    PolicyResult {
        allowed: bool,
        audit_required: bool,
        conditions: Vec<String>,
    },
    /// Header-compliance check outcome.
    HeaderCheck { missing: Vec<String>, modifier: i8 },
    /// The decision that an emergency override replaced.
    EmergencyOverride {
        prior_granted: bool,
        prior_reason: String,
        security_score: u8,
        threat_level: u8,
    },
}

/// A typed security event raised during one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityAlert {
    /// Unique id for this alert instance.
    pub id: Uuid,
    /// What kind of event this is.
    pub kind: AlertKind,
    /// How urgent it is.
    pub severity: Severity,
    /// Free-text description.
    pub description: String,
    /// Requesting user (copied from the originating context).
    pub user_id: String,
    /// Tenant clinic (copied from the originating context).
    pub clinic_id: String,
    /// Session the request belonged to.
    pub session_id: String,
    /// When the alert was raised.
    pub timestamp: DateTime<Utc>,
    /// Structured per-phase payload, when available.
    pub details: Option<AlertDetails>,
    /// What the evaluator did in response.
    pub action_taken: String,
}

impl SecurityAlert {
    /// Create an alert bound to the originating context.
    pub fn new(
        kind: AlertKind,
        severity: Severity,
        description: impl Into<String>,
        context: &SecurityContext,
        action_taken: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            description: description.into(),
            user_id: context.user_id.clone(),
            clinic_id: context.clinic_id.clone(),
            session_id: context.session_id.clone(),
            timestamp: Utc::now(),
            details: None,
            action_taken: action_taken.into(),
        }
    }

    pub fn with_details(mut self, details: AlertDetails) -> Self {
        self.details = Some(details);
        self
    }
}

/// Delivery channel for high-risk alerts.
///
/// Implementations: console logging, webhook POST, or anything a
/// deployment plugs in (pager, SIEM). Dispatch failures are surfaced as
/// errors but callers treat them as best-effort.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn dispatch(&self, alert: &SecurityAlert) -> Result<(), MedgateError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UserRole;

    fn sample_context() -> SecurityContext {
        SecurityContext::new("user-9", UserRole::Doctor, "clinic-3", "sess-7")
    }

    #[test]
    fn alert_copies_context_identity() {
        let ctx = sample_context();
        let alert = SecurityAlert::new(
            AlertKind::ThreatDetected,
            Severity::High,
            "suspicious source address",
            &ctx,
            "access evaluation continued",
        );
        assert_eq!(alert.user_id, "user-9");
        assert_eq!(alert.clinic_id, "clinic-3");
        assert_eq!(alert.session_id, "sess-7");
        assert!(alert.details.is_none());
    }

    #[test]
    fn alert_details_roundtrip() {
        let ctx = sample_context();
        let alert = SecurityAlert::new(
            AlertKind::SuspiciousPattern,
            Severity::Medium,
            "pattern anomaly",
            &ctx,
            "score reduced",
        )
        .with_details(AlertDetails::PatternAnalysis {
            score: 45,
            anomalies: vec!["High-frequency access detected".into()],
        });

        let json = serde_json::to_string(&alert).unwrap();
        let back: SecurityAlert = serde_json::from_str(&json).unwrap();
        assert_eq!(back, alert);
        assert!(json.contains("\"phase\":\"pattern_analysis\""));
        assert!(json.contains("SUSPICIOUS_PATTERN"));
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn kind_display_matches_wire_names() {
        assert_eq!(AlertKind::AccessViolation.to_string(), "ACCESS_VIOLATION");
        assert_eq!(AlertKind::EmergencyAccess.to_string(), "EMERGENCY_ACCESS");
    }
}
