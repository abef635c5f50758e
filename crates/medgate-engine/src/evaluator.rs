//! The seven-phase evaluation orchestrator.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use medgate_types::{
    AccessVerdict, AlertSink, AuditMetadata, AuditStore, EvaluationFailure, MedgateError,
    Operation, ReportFilter, RowPolicyEngine, SecurityConfig, SecurityContext, SecurityReport,
    UserSecuritySummary,
};

use crate::headers::{HeaderAdvisor, StandardHeaderAdvisor};
use crate::threat::{IpReputationProvider, PrefixIpReputation};
use crate::{audit, emergency, headers, pattern, policy, threat, threshold};

/// Evaluates access requests against the full security pipeline.
///
/// One instance serves arbitrarily many concurrent evaluations; all state
/// lives in the injected collaborators. The entry point
/// [`evaluate_access`](Self::evaluate_access) is infallible by design:
/// every internal error becomes a denial, and every evaluation leaves an
/// audit row behind.
pub struct SecurityEvaluator {
    store: Arc<dyn AuditStore>,
    policy: Arc<dyn RowPolicyEngine>,
    alerts: Arc<dyn AlertSink>,
    header_advisor: Box<dyn HeaderAdvisor>,
    ip_reputation: Box<dyn IpReputationProvider>,
    config: SecurityConfig,
}

impl SecurityEvaluator {
    /// Create an evaluator over the given collaborators.
    ///
    /// Uses the standard header advisor and the prefix IP-reputation
    /// heuristic; swap either with the `with_*` builders.
    pub fn new(
        store: Arc<dyn AuditStore>,
        policy: Arc<dyn RowPolicyEngine>,
        alerts: Arc<dyn AlertSink>,
        config: SecurityConfig,
    ) -> Self {
        let ip_reputation = Box::new(PrefixIpReputation::from_config(&config.ip_scoring));
        Self {
            store,
            policy,
            alerts,
            header_advisor: Box::new(StandardHeaderAdvisor),
            ip_reputation,
            config,
        }
    }

    pub fn with_header_advisor(mut self, advisor: Box<dyn HeaderAdvisor>) -> Self {
        self.header_advisor = advisor;
        self
    }

    pub fn with_ip_reputation(mut self, provider: Box<dyn IpReputationProvider>) -> Self {
        self.ip_reputation = provider;
        self
    }

    /// Evaluate one access request and return the verdict.
    ///
    /// Never errors and never panics on collaborator failure: upstream
    /// dependency failures degrade inside their phase, and anything that
    /// escapes phase-local recovery is converted into a hard denial here.
    /// Exactly one audit row is attempted per call, carrying the final
    /// decision, whether the pipeline succeeded or not.
    pub async fn evaluate_access(
        &self,
        context: &SecurityContext,
        table_name: &str,
        operation: Operation,
        record_id: Option<&str>,
        request_data: Option<serde_json::Value>,
    ) -> AccessVerdict {
        let started = Instant::now();
        debug!(
            user = %context.user_id,
            clinic = %context.clinic_id,
            table = table_name,
            operation = %operation,
            "evaluating access request"
        );

        let (verdict, mut metadata) = if !context.is_complete() || table_name.is_empty() {
            (
                AccessVerdict::denied("Evaluation refused - incomplete request identity"),
                AuditMetadata::default(),
            )
        } else {
            match self
                .evaluate_inner(context, table_name, operation, record_id)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        user = %context.user_id,
                        table = table_name,
                        error = %e,
                        "security evaluation failed, denying access"
                    );
                    failure_outcome(&e)
                }
            }
        };

        metadata.duration_ms = Some(started.elapsed().as_millis() as u64);
        metadata.alerts = verdict.alerts.clone();
        metadata.request_data = request_data;

        audit::record_evaluation(
            self.store.as_ref(),
            self.alerts.as_ref(),
            &self.config.thresholds,
            context,
            table_name,
            operation,
            record_id,
            &verdict,
            metadata,
        )
        .await;

        info!(
            user = %context.user_id,
            table = table_name,
            granted = verdict.granted,
            security_score = verdict.security_score,
            threat_level = verdict.threat_level,
            "access evaluation complete"
        );
        verdict
    }

    /// Phases 1-6. The phases themselves recover from collaborator
    /// failures; an `Err` here means something escaped that recovery, and
    /// the caller converts it into the fail-closed verdict.
    async fn evaluate_inner(
        &self,
        context: &SecurityContext,
        table_name: &str,
        operation: Operation,
        record_id: Option<&str>,
    ) -> Result<(AccessVerdict, AuditMetadata), MedgateError> {
        let mut metadata = AuditMetadata::default();
        let mut verdict = AccessVerdict::baseline();

        // Phase 1: threat assessment.
        let threat = threat::assess_threats(
            self.store.as_ref(),
            self.ip_reputation.as_ref(),
            &self.config,
            context,
        )
        .await;
        verdict.threat_level = threat.breakdown.total;
        verdict.alerts.extend(threat.alerts);
        metadata.threat = Some(threat.breakdown);

        // Phase 2: access-pattern analysis.
        let pattern = pattern::analyze_access_patterns(
            self.store.as_ref(),
            &self.config,
            context,
            table_name,
            operation,
        )
        .await;
        verdict.security_score = pattern.score;
        metadata.pattern = Some(pattern);

        // Phase 3: row-level policy.
        let outcome = policy::apply_policy(
            self.policy.as_ref(),
            context,
            table_name,
            operation,
            record_id,
            verdict,
        )
        .await;
        verdict = outcome.verdict;
        metadata.policy = Some(outcome.breakdown);

        // Phase 4: header compliance.
        let outcome = headers::apply_header_compliance(
            self.header_advisor.as_ref(),
            &self.config,
            context,
            verdict,
        );
        verdict = outcome.verdict;
        metadata.headers = Some(outcome.breakdown);

        // Phase 5: emergency override, only when asserted.
        if context.emergency_access {
            verdict = emergency::apply_emergency_override(&self.config.emergency, context, verdict);
        }

        // Phase 6: hard thresholds. Runs after the override: emergency
        // access overrides a policy denial but not the score/threat floor.
        verdict = threshold::apply_thresholds(&self.config.thresholds, verdict);

        Ok((verdict, metadata))
    }

    /// Aggregate one user's audit history.
    pub async fn user_security_summary(
        &self,
        user_id: &str,
    ) -> Result<UserSecuritySummary, MedgateError> {
        self.store.user_security_summary(user_id).await
    }

    /// Aggregate the audit rows matching `filter`.
    pub async fn security_report(
        &self,
        filter: &ReportFilter,
    ) -> Result<SecurityReport, MedgateError> {
        self.store.security_report(filter).await
    }
}

/// The fail-closed conversion: hard-deny verdict plus metadata tagging the
/// failure for the audit row.
fn failure_outcome(error: &MedgateError) -> (AccessVerdict, AuditMetadata) {
    let metadata = AuditMetadata {
        error_type: Some(EvaluationFailure::SecurityEvaluationFailure {
            message: error.to_string(),
        }),
        ..Default::default()
    };
    (AccessVerdict::system_failure(), metadata)
}
