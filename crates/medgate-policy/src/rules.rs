//! Grant rules and the TOML ruleset they are loaded from.

use serde::{Deserialize, Serialize};

use medgate_types::{MedgateError, Operation, PolicyRequest, UserRole};

/// How far a grant reaches within the requester's clinic.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Rows belonging to the requester's clinic. The tenant boundary;
    /// every rule is at least this narrow.
    #[default]
    Clinic,
    /// Only rows the requester owns (patient-portal access).
    OwnRecords,
}

/// One role → operations → tables grant.
///
/// `"*"` in `tables` matches any table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrantRule {
    pub role: UserRole,
    pub operations: Vec<Operation>,
    pub tables: Vec<String>,
    #[serde(default)]
    pub scope: RuleScope,
}

impl GrantRule {
    /// Whether this rule covers the request's role, operation, and table.
    pub fn covers(&self, request: &PolicyRequest) -> bool {
        self.role == request.user_role
            && self.operations.contains(&request.operation)
            && self
                .tables
                .iter()
                .any(|t| t == "*" || t == &request.table_name)
    }
}

/// A parsed collection of grant rules plus the tables whose access always
/// requires audit logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleSet {
    #[serde(default)]
    pub audit_tables: Vec<String>,
    #[serde(default)]
    pub rules: Vec<GrantRule>,
}

impl RuleSet {
    /// Parse a ruleset from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, MedgateError> {
        toml::from_str(content)
            .map_err(|e| MedgateError::PolicyError(format!("failed to parse ruleset: {e}")))
    }

    /// Merge another ruleset into this one. Rules accumulate; audit
    /// tables are deduplicated.
    pub fn merge(&mut self, other: RuleSet) {
        for table in other.audit_tables {
            if !self.audit_tables.contains(&table) {
                self.audit_tables.push(table);
            }
        }
        self.rules.extend(other.rules);
    }

    /// The first rule covering the request, if any.
    pub fn find_covering(&self, request: &PolicyRequest) -> Option<&GrantRule> {
        self.rules.iter().find(|rule| rule.covers(request))
    }
}
