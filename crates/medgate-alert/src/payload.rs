//! Webhook JSON payload construction.
//!
//! Builds the JSON body POSTed to webhook URLs when an alert is
//! dispatched. The payload is self-describing (includes a version field)
//! and includes a pre-formatted `text` field for direct use in chat
//! messages.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use medgate_types::{AlertDetails, AlertKind, SecurityAlert, Severity};

/// Top-level webhook payload sent to alert endpoints.
#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    /// Payload schema version (currently "1").
    pub version: &'static str,
    /// Whether this is a test/connectivity-check payload.
    pub test: bool,
    /// The alert being delivered.
    pub alert: AlertInfo,
    /// Who the alert is about.
    pub context: ContextInfo,
    /// Pre-formatted human-readable summary.
    pub text: String,
}

/// The alert itself.
#[derive(Debug, Serialize)]
pub struct AlertInfo {
    /// Unique ID for this dispatch.
    pub id: String,
    /// Alert ID as raised during evaluation.
    pub alert_id: Uuid,
    pub kind: AlertKind,
    pub severity: Severity,
    pub description: String,
    pub fired_at: DateTime<Utc>,
    pub details: Option<AlertDetails>,
    pub action_taken: String,
}

/// The requester the alert concerns.
#[derive(Debug, Serialize)]
pub struct ContextInfo {
    pub user_id: String,
    pub clinic_id: String,
    pub session_id: String,
}

/// Build a webhook payload for an alert.
pub fn build_payload(alert: &SecurityAlert, test: bool) -> WebhookPayload {
    let text = format!(
        "[{severity}] {kind} {clinic}/{user}: {description} -- {action}",
        severity = alert.severity,
        kind = alert.kind,
        clinic = alert.clinic_id,
        user = alert.user_id,
        description = alert.description,
        action = alert.action_taken,
    );

    WebhookPayload {
        version: "1",
        test,
        alert: AlertInfo {
            id: Uuid::new_v4().to_string(),
            alert_id: alert.id,
            kind: alert.kind,
            severity: alert.severity,
            description: alert.description.clone(),
            fired_at: Utc::now(),
            details: alert.details.clone(),
            action_taken: alert.action_taken.clone(),
        },
        context: ContextInfo {
            user_id: alert.user_id.clone(),
            clinic_id: alert.clinic_id.clone(),
            session_id: alert.session_id.clone(),
        },
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medgate_types::{SecurityContext, UserRole};

    fn sample_alert() -> SecurityAlert {
        let ctx = SecurityContext::new("dr-lee", UserRole::Doctor, "clinic-7", "sess-3");
        SecurityAlert::new(
            AlertKind::EmergencyAccess,
            Severity::High,
            "Emergency access granted",
            &ctx,
            "access granted with enhanced monitoring",
        )
        .with_details(AlertDetails::EmergencyOverride {
            prior_granted: false,
            prior_reason: "No policy grants doctor SELECT access to billing_records".into(),
            security_score: 70,
            threat_level: 20,
        })
    }

    #[test]
    fn payload_has_correct_structure() {
        let alert = sample_alert();
        let payload = build_payload(&alert, false);

        assert_eq!(payload.version, "1");
        assert!(!payload.test);
        assert_eq!(payload.alert.alert_id, alert.id);
        assert_eq!(payload.alert.kind, AlertKind::EmergencyAccess);
        assert_eq!(payload.context.user_id, "dr-lee");
        assert_eq!(payload.context.clinic_id, "clinic-7");
    }

    #[test]
    fn payload_text_format() {
        let payload = build_payload(&sample_alert(), false);
        assert!(payload.text.starts_with("[HIGH] EMERGENCY_ACCESS"));
        assert!(payload.text.contains("clinic-7/dr-lee"));
        assert!(payload.text.contains("Emergency access granted"));
    }

    #[test]
    fn payload_serializes_to_json() {
        let payload = build_payload(&sample_alert(), true);
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"version\":\"1\""));
        assert!(json.contains("\"test\":true"));
        assert!(json.contains("EMERGENCY_ACCESS"));
        assert!(json.contains("emergency_override"));
    }
}
