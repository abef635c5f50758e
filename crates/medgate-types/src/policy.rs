//! The row-level policy engine interface and its request/decision types.

use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{Operation, SecurityContext, UserRole};
use crate::MedgateError;

/// The normalized context handed to the row-level policy engine.
///
/// Deliberately flat: engines should not need to understand the full
/// [`SecurityContext`], only the fields policy rules key on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyRequest {
    pub user_id: String,
    pub user_role: UserRole,
    pub clinic_id: String,
    pub professional_id: Option<String>,
    pub emergency_access: bool,
    pub access_time: DateTime<Utc>,
    pub ip_address: Option<IpAddr>,
    pub table_name: String,
    pub operation: Operation,
    pub record_id: Option<String>,
}

impl PolicyRequest {
    /// Normalize a [`SecurityContext`] plus target resource into a request.
    pub fn from_context(
        context: &SecurityContext,
        table_name: &str,
        operation: Operation,
        record_id: Option<&str>,
    ) -> Self {
        Self {
            user_id: context.user_id.clone(),
            user_role: context.user_role,
            clinic_id: context.clinic_id.clone(),
            professional_id: context.professional_id.clone(),
            emergency_access: context.emergency_access,
            access_time: context.timestamp,
            ip_address: context.ip_address,
            table_name: table_name.to_string(),
            operation,
            record_id: record_id.map(str::to_string),
        }
    }
}

/// What the policy engine decided for one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyDecision {
    pub allowed: bool,
    /// Engine-supplied explanation; the evaluator substitutes a generic
    /// reason when absent.
    pub reason: Option<String>,
    /// Whether this access must be audit-logged (always true in practice
    /// for writes and sensitive tables).
    pub audit_required: bool,
    /// Whether the engine recognized an emergency-access request.
    pub emergency_access: bool,
    /// Extra conditions the grant is subject to, verbatim.
    pub conditions: Vec<String>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            audit_required: false,
            emergency_access: false,
            conditions: Vec::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            audit_required: false,
            emergency_access: false,
            conditions: Vec::new(),
        }
    }

    pub fn with_audit_required(mut self) -> Self {
        self.audit_required = true;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }
}

/// A row-level policy engine.
///
/// The evaluator treats the engine as an external collaborator: a returned
/// `Err` is converted into a fail-closed denial, never propagated.
#[async_trait]
pub trait RowPolicyEngine: Send + Sync {
    async fn evaluate(&self, request: &PolicyRequest) -> Result<PolicyDecision, MedgateError>;
}
