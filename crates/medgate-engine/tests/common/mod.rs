//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use medgate_alert::ConsoleSink;
use medgate_engine::SecurityEvaluator;
use medgate_ledger::SqliteAuditStore;
use medgate_policy::builtin::DEFAULT_RULES;
use medgate_policy::GrantPolicyEngine;
use medgate_types::{
    AlertSink, AuditRecord, AuditStore, MedgateError, PolicyDecision, PolicyRequest, ReportFilter,
    RowPolicyEngine, SecurityAlert, SecurityConfig, SecurityContext, SecurityReport, UserRole,
    UserSecuritySummary,
};

/// Open an in-memory audit store.
pub fn open_test_store() -> Arc<SqliteAuditStore> {
    Arc::new(SqliteAuditStore::open_in_memory().expect("should open in-memory audit store"))
}

/// The default grant-rule policy engine.
pub fn default_policy() -> Arc<GrantPolicyEngine> {
    Arc::new(GrantPolicyEngine::from_toml(DEFAULT_RULES).expect("should parse builtin rules"))
}

/// A full evaluator over real collaborators: SQLite store, grant-rule
/// policy, console alerts.
pub fn full_evaluator(store: Arc<SqliteAuditStore>) -> SecurityEvaluator {
    SecurityEvaluator::new(
        store,
        default_policy(),
        Arc::new(ConsoleSink),
        SecurityConfig::default(),
    )
}

/// A business-hours request from a private clinic address.
pub fn clean_context(user_id: &str, role: UserRole) -> SecurityContext {
    SecurityContext::new(user_id, role, "clinic-1", "sess-1")
        .with_timestamp(Utc.with_ymd_and_hms(2026, 8, 7, 10, 30, 0).unwrap())
        .with_ip("192.168.1.20".parse().unwrap())
        .with_user_agent("medgate-tests/0.1")
}

/// A policy engine double returning a fixed decision.
pub struct FixedPolicy(pub PolicyDecision);

#[async_trait]
impl RowPolicyEngine for FixedPolicy {
    async fn evaluate(&self, _request: &PolicyRequest) -> Result<PolicyDecision, MedgateError> {
        Ok(self.0.clone())
    }
}

/// A policy engine double that always errors.
pub struct ErroringPolicy;

#[async_trait]
impl RowPolicyEngine for ErroringPolicy {
    async fn evaluate(&self, _request: &PolicyRequest) -> Result<PolicyDecision, MedgateError> {
        Err(MedgateError::PolicyError("engine unavailable".into()))
    }
}

/// An alert sink recording every dispatched alert.
#[derive(Default)]
pub struct CollectingSink {
    dispatched: Mutex<Vec<SecurityAlert>>,
}

impl CollectingSink {
    pub fn alerts(&self) -> Vec<SecurityAlert> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for CollectingSink {
    async fn dispatch(&self, alert: &SecurityAlert) -> Result<(), MedgateError> {
        self.dispatched.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// An audit store whose read and write paths fail on demand, recording
/// appends that do go through.
#[derive(Default)]
pub struct FlakyStore {
    pub fail_count: bool,
    pub fail_recent: bool,
    pub fail_append: bool,
    pub appended: Mutex<Vec<AuditRecord>>,
}

impl FlakyStore {
    pub fn appended(&self) -> Vec<AuditRecord> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditStore for FlakyStore {
    async fn append(&self, record: &AuditRecord) -> Result<(), MedgateError> {
        if self.fail_append {
            return Err(MedgateError::LedgerError("append unavailable".into()));
        }
        self.appended.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn count_recent(
        &self,
        _user_id: &str,
        _clinic_id: &str,
        _window: Duration,
    ) -> Result<u64, MedgateError> {
        if self.fail_count {
            return Err(MedgateError::LedgerError("count unavailable".into()));
        }
        Ok(self.appended.lock().unwrap().len() as u64)
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, MedgateError> {
        if self.fail_recent {
            return Err(MedgateError::LedgerError("history unavailable".into()));
        }
        let appended = self.appended.lock().unwrap();
        Ok(appended
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn user_security_summary(
        &self,
        _user_id: &str,
    ) -> Result<UserSecuritySummary, MedgateError> {
        Err(MedgateError::LedgerError("not supported".into()))
    }

    async fn security_report(
        &self,
        _filter: &ReportFilter,
    ) -> Result<SecurityReport, MedgateError> {
        Err(MedgateError::LedgerError("not supported".into()))
    }
}
