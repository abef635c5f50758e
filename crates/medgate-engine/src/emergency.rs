//! Phase 5: emergency override.
//!
//! Break-the-glass handling for requester-asserted emergencies. Two gates
//! must both pass: the request must be read-only (GET), and the requester's
//! role must be on the configured allow-list. A passing override turns a
//! denial into a grant, never the reverse; the overridden decision is kept
//! in the alert detail for the post-access review.

use tracing::{info, warn};

use medgate_types::{
    AccessVerdict, AlertDetails, AlertKind, EmergencyConfig, RequestMethod, SecurityAlert,
    SecurityContext, Severity,
};

const OVERRIDE_REASON: &str = "Emergency access granted - enhanced monitoring active";
const REQ_POST_ACCESS_REVIEW: &str = "Mandatory post-access review";

/// Apply the emergency-override gates to the verdict.
///
/// Callers invoke this only when `context.emergency_access` is set; a
/// context without the flag passes through untouched.
pub fn apply_emergency_override(
    config: &EmergencyConfig,
    context: &SecurityContext,
    verdict: AccessVerdict,
) -> AccessVerdict {
    if !context.emergency_access {
        return verdict;
    }

    // Gate 1: justification. Emergency access is read-only.
    if context.request_method != RequestMethod::Get {
        warn!(
            user = %context.user_id,
            method = %context.request_method,
            "emergency override refused: non-GET request"
        );
        return verdict.with_alert(SecurityAlert::new(
            AlertKind::AccessViolation,
            Severity::High,
            format!(
                "Emergency access rejected - {} request is not read-only",
                context.request_method
            ),
            context,
            "emergency override refused",
        ));
    }

    // Gate 2: privilege. Only clinical/administrative roles may break the
    // glass.
    if !config.allowed_roles.contains(&context.user_role) {
        warn!(
            user = %context.user_id,
            role = %context.user_role,
            "emergency override refused: role not authorized"
        );
        return verdict.with_alert(SecurityAlert::new(
            AlertKind::AccessViolation,
            Severity::High,
            format!(
                "Emergency access rejected - role {} is not authorized for override",
                context.user_role
            ),
            context,
            "emergency override refused",
        ));
    }

    info!(
        user = %context.user_id,
        role = %context.user_role,
        prior_granted = verdict.granted,
        "emergency override granted"
    );

    let alert = SecurityAlert::new(
        AlertKind::EmergencyAccess,
        Severity::High,
        "Emergency access granted",
        context,
        "access granted with enhanced monitoring",
    )
    .with_details(AlertDetails::EmergencyOverride {
        prior_granted: verdict.granted,
        prior_reason: verdict.reason.clone(),
        security_score: verdict.security_score,
        threat_level: verdict.threat_level,
    });

    let mut verdict = verdict
        .with_alert(alert)
        .with_requirement(REQ_POST_ACCESS_REVIEW);
    verdict.granted = true;
    verdict.reason = OVERRIDE_REASON.to_string();
    verdict
}
