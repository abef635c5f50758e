//! Console alert sink: severity-mapped structured logging.

use async_trait::async_trait;
use tracing::{error, info, warn};

use medgate_types::{AlertSink, MedgateError, SecurityAlert, Severity};

/// Writes alerts to the process log at a level matching their severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

#[async_trait]
impl AlertSink for ConsoleSink {
    async fn dispatch(&self, alert: &SecurityAlert) -> Result<(), MedgateError> {
        match alert.severity {
            Severity::Critical | Severity::High => error!(
                kind = %alert.kind,
                severity = %alert.severity,
                user = %alert.user_id,
                clinic = %alert.clinic_id,
                action = %alert.action_taken,
                "{}",
                alert.description
            ),
            Severity::Medium => warn!(
                kind = %alert.kind,
                severity = %alert.severity,
                user = %alert.user_id,
                clinic = %alert.clinic_id,
                action = %alert.action_taken,
                "{}",
                alert.description
            ),
            Severity::Low => info!(
                kind = %alert.kind,
                severity = %alert.severity,
                user = %alert.user_id,
                clinic = %alert.clinic_id,
                action = %alert.action_taken,
                "{}",
                alert.description
            ),
        }
        Ok(())
    }
}
