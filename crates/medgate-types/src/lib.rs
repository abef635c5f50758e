//! Core types shared across all medgate crates.
//!
//! Defines the security context, verdicts, alerts, audit records,
//! configuration, error types, and the port traits implemented by the
//! ledger, policy, and alert crates.

pub mod alert;
pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod policy;
pub mod verdict;

pub use alert::{AlertDetails, AlertKind, AlertSink, SecurityAlert, Severity};
pub use audit::{
    AuditMetadata, AuditRecord, AuditStore, EvaluationFailure, HeaderBreakdown, PatternBreakdown,
    PolicyBreakdown, ReportFilter, SecurityReport, ThreatBreakdown, UserSecuritySummary,
};
pub use config::{
    AccessGrant, BurstConfig, EmergencyConfig, HeaderConfig, IpScoringConfig, PatternConfig,
    SecurityConfig, ThresholdConfig, TimeOfDayConfig,
};
pub use context::{Operation, RequestMethod, SecurityContext, UserRole};
pub use error::MedgateError;
pub use policy::{PolicyDecision, PolicyRequest, RowPolicyEngine};
pub use verdict::AccessVerdict;
