//! The access verdict accumulated across evaluation phases.

use serde::{Deserialize, Serialize};

use crate::alert::SecurityAlert;

/// The result of one security evaluation.
///
/// Starts from [`AccessVerdict::baseline`] and is folded through the
/// evaluation phases, each taking the verdict by value and returning an
/// updated one. The final value is returned to the caller verbatim and
/// copied into the audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessVerdict {
    /// Whether access is granted.
    pub granted: bool,
    /// Human-readable explanation of the decision.
    pub reason: String,
    /// 0-100, higher = behavior more consistent with expectations.
    pub security_score: u8,
    /// 0-100, higher = riskier.
    pub threat_level: u8,
    /// Follow-up obligations attached to the decision.
    pub requirements: Vec<String>,
    /// Alerts raised while evaluating.
    pub alerts: Vec<SecurityAlert>,
}

impl AccessVerdict {
    /// The neutral starting point of the pipeline: nothing granted yet,
    /// full security score, zero threat.
    pub fn baseline() -> Self {
        Self {
            granted: false,
            reason: String::new(),
            security_score: 100,
            threat_level: 0,
            requirements: Vec::new(),
            alerts: Vec::new(),
        }
    }

    /// A denial with the given reason, keeping default scores.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            reason: reason.into(),
            ..Self::baseline()
        }
    }

    /// The fail-closed verdict returned when the evaluation pipeline
    /// itself errors: hard deny, worst possible scores.
    pub fn system_failure() -> Self {
        Self {
            granted: false,
            reason: "Security system error - access denied".to_string(),
            security_score: 0,
            threat_level: 100,
            requirements: Vec::new(),
            alerts: Vec::new(),
        }
    }

    pub fn with_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirements.push(requirement.into());
        self
    }

    pub fn with_alert(mut self, alert: SecurityAlert) -> Self {
        self.alerts.push(alert);
        self
    }

    /// Apply a penalty to the security score, flooring at zero.
    pub fn penalize_security(mut self, penalty: u8) -> Self {
        self.security_score = self.security_score.saturating_sub(penalty);
        self
    }

    /// Raise the threat level, capping at 100.
    pub fn raise_threat(mut self, amount: u8) -> Self {
        self.threat_level = self.threat_level.saturating_add(amount).min(100);
        self
    }
}
