//! Phase 3: row-level policy evaluation.
//!
//! Delegates to the injected `RowPolicyEngine` and folds its decision into
//! the verdict. An engine failure fails closed: denial plus a manual
//! review requirement, never a propagated error.

use tracing::warn;

use medgate_types::{
    AccessVerdict, Operation, PolicyBreakdown, PolicyRequest, RowPolicyEngine, SecurityContext,
};

/// Requirement attached when the engine asks for audit logging.
const REQ_AUDIT: &str = "Audit logging required";
/// Requirement attached when the engine recognizes emergency access.
const REQ_EMERGENCY_REVIEW: &str = "Emergency access review required";
/// Requirement attached when the engine itself failed.
const REQ_MANUAL_REVIEW: &str = "Manual security review required";

/// The policy phase's contribution to the verdict.
pub struct PolicyOutcome {
    pub verdict: AccessVerdict,
    pub breakdown: PolicyBreakdown,
}

/// Evaluate the row-level policy and fold the decision into the verdict.
pub async fn apply_policy(
    engine: &dyn RowPolicyEngine,
    context: &SecurityContext,
    table_name: &str,
    operation: Operation,
    record_id: Option<&str>,
    mut verdict: AccessVerdict,
) -> PolicyOutcome {
    let request = PolicyRequest::from_context(context, table_name, operation, record_id);

    match engine.evaluate(&request).await {
        Ok(decision) => {
            verdict.granted = decision.allowed;
            verdict.reason = decision.reason.clone().unwrap_or_else(|| {
                if decision.allowed {
                    "Access granted by row-level policy".to_string()
                } else {
                    "Access denied by row-level policy".to_string()
                }
            });
            if decision.audit_required {
                verdict.requirements.push(REQ_AUDIT.to_string());
            }
            if decision.emergency_access {
                verdict.requirements.push(REQ_EMERGENCY_REVIEW.to_string());
            }
            verdict
                .requirements
                .extend(decision.conditions.iter().cloned());

            PolicyOutcome {
                verdict,
                breakdown: PolicyBreakdown {
                    allowed: decision.allowed,
                    reason: decision.reason,
                    audit_required: decision.audit_required,
                    emergency_access: decision.emergency_access,
                    conditions: decision.conditions,
                },
            }
        }
        Err(e) => {
            warn!(user = %context.user_id, error = %e, "row-level policy engine failed, failing closed");
            verdict.granted = false;
            verdict.reason = "RLS evaluation error".to_string();
            verdict.requirements.push(REQ_MANUAL_REVIEW.to_string());

            PolicyOutcome {
                verdict,
                breakdown: PolicyBreakdown {
                    allowed: false,
                    reason: Some(e.to_string()),
                    audit_required: false,
                    emergency_access: false,
                    conditions: Vec::new(),
                },
            }
        }
    }
}
