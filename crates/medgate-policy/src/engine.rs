//! The grant-rule policy engine.
//!
//! Wraps a [`RuleSet`] behind a single `evaluate()` that maps a normalized
//! policy request to a decision. Internal errors never escape: the public
//! evaluation converts them into deny decisions.

use std::path::Path;

use async_trait::async_trait;

use medgate_types::{MedgateError, PolicyDecision, PolicyRequest, RowPolicyEngine};

use crate::builtin::DEFAULT_RULES;
use crate::rules::{RuleScope, RuleSet};

/// A row-level policy engine evaluating requests against grant rules.
pub struct GrantPolicyEngine {
    ruleset: RuleSet,
}

impl GrantPolicyEngine {
    /// Create an engine by loading all `.toml` rule files from `policy_dir`.
    ///
    /// If the directory does not exist or contains no rule files, the
    /// engine falls back to the built-in [`DEFAULT_RULES`].
    pub fn new(policy_dir: &Path) -> Result<Self, MedgateError> {
        let ruleset = load_rules_from_dir(policy_dir)?;
        Ok(Self { ruleset })
    }

    /// Create an engine from a TOML ruleset string.
    ///
    /// Useful for testing or when rules are not stored on disk.
    pub fn from_toml(rules: &str) -> Result<Self, MedgateError> {
        Ok(Self {
            ruleset: RuleSet::from_toml(rules)?,
        })
    }

    /// Create an engine from an already-parsed ruleset.
    pub fn from_ruleset(ruleset: RuleSet) -> Self {
        Self { ruleset }
    }

    /// Reload rules from the given directory, replacing the current ruleset.
    pub fn reload(&mut self, policy_dir: &Path) -> Result<(), MedgateError> {
        self.ruleset = load_rules_from_dir(policy_dir)?;
        Ok(())
    }

    /// Evaluate a request against the loaded rules.
    ///
    /// Never errors out: malformed requests produce deny decisions.
    pub fn decide(&self, request: &PolicyRequest) -> PolicyDecision {
        match self.decide_inner(request) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(user = %request.user_id, error = %e, "policy evaluation failed");
                PolicyDecision::deny(format!("policy evaluation error: {e}"))
            }
        }
    }

    /// Inner evaluation that can return errors, keeping the public API clean.
    fn decide_inner(&self, request: &PolicyRequest) -> Result<PolicyDecision, MedgateError> {
        if request.user_id.is_empty() || request.clinic_id.is_empty() {
            return Err(MedgateError::PolicyError(
                "request missing user or clinic identity".to_string(),
            ));
        }
        if request.table_name.is_empty() {
            return Err(MedgateError::PolicyError(
                "request missing table name".to_string(),
            ));
        }

        let Some(rule) = self.ruleset.find_covering(request) else {
            return Ok(PolicyDecision::deny(format!(
                "No policy grants {} {} access to {}",
                request.user_role, request.operation, request.table_name
            )));
        };

        let mut decision = PolicyDecision::allow()
            .with_condition(format!("Access limited to clinic {}", request.clinic_id));

        if rule.scope == RuleScope::OwnRecords {
            match request.record_id.as_deref() {
                // Row-targeted request: the requester must own the row.
                Some(record_id) if record_id != request.user_id => {
                    return Ok(PolicyDecision::deny(
                        "Access denied - requester does not own this record",
                    ));
                }
                _ => {
                    decision = decision.with_condition("Access restricted to own records");
                }
            }
        }

        if request.operation.is_write()
            || self.ruleset.audit_tables.contains(&request.table_name)
        {
            decision = decision.with_audit_required();
        }
        decision.emergency_access = request.emergency_access;

        Ok(decision)
    }
}

#[async_trait]
impl RowPolicyEngine for GrantPolicyEngine {
    async fn evaluate(&self, request: &PolicyRequest) -> Result<PolicyDecision, MedgateError> {
        Ok(self.decide(request))
    }
}

/// Load all `.toml` rule files from a directory into one merged ruleset.
///
/// Falls back to [`DEFAULT_RULES`] if the directory does not exist or
/// contains no rule files.
fn load_rules_from_dir(dir: &Path) -> Result<RuleSet, MedgateError> {
    if !dir.exists() || !dir.is_dir() {
        tracing::info!(path = %dir.display(), "policy directory not found, using default ruleset");
        return RuleSet::from_toml(DEFAULT_RULES);
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| MedgateError::PolicyError(format!("failed to read policy directory: {e}")))?;

    let mut merged = RuleSet::default();
    let mut loaded = 0usize;

    for entry in entries {
        let entry = entry
            .map_err(|e| MedgateError::PolicyError(format!("failed to read directory entry: {e}")))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                MedgateError::PolicyError(format!(
                    "failed to read rule file '{}': {e}",
                    path.display()
                ))
            })?;
            merged.merge(RuleSet::from_toml(&content)?);
            loaded += 1;
        }
    }

    if loaded == 0 {
        tracing::info!(path = %dir.display(), "no .toml rule files found, using default ruleset");
        return RuleSet::from_toml(DEFAULT_RULES);
    }

    Ok(merged)
}
