//! The medgate security evaluation pipeline.
//!
//! [`SecurityEvaluator`] turns one [`SecurityContext`] plus a target
//! table/operation into one `AccessVerdict` by folding the verdict through
//! seven phases: threat assessment, pattern analysis, row-level policy
//! evaluation, header-compliance scoring, emergency override, final
//! thresholding, and audit logging. The pipeline fails closed: no internal
//! error surfaces to the caller as anything but a denial.
//!
//! [`SecurityContext`]: medgate_types::SecurityContext

pub mod audit;
pub mod emergency;
pub mod evaluator;
pub mod headers;
pub mod pattern;
pub mod policy;
pub mod threat;
pub mod threshold;

pub use evaluator::SecurityEvaluator;
pub use headers::{HeaderAdvisor, StandardHeaderAdvisor};
pub use threat::{IpReputationProvider, PrefixIpReputation};

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use medgate_types::{
        AlertSink, AuditRecord, AuditStore, MedgateError, ReportFilter, SecurityAlert,
        SecurityReport, UserSecuritySummary,
    };

    /// An in-memory audit store double with scriptable failures.
    #[derive(Default)]
    pub struct StubStore {
        pub count: u64,
        pub fail_count: bool,
        pub recent: Vec<AuditRecord>,
        pub fail_recent: bool,
        pub fail_append: bool,
        pub appended: Mutex<Vec<AuditRecord>>,
    }

    impl StubStore {
        pub fn with_count(count: u64) -> Self {
            Self {
                count,
                ..Default::default()
            }
        }

        pub fn appended_records(&self) -> Vec<AuditRecord> {
            self.appended.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AuditStore for StubStore {
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
            Ok(self.count)
        }

        async fn recent_for_user(
            &self,
            _user_id: &str,
            limit: usize,
        ) -> Result<Vec<AuditRecord>, MedgateError> {
            if self.fail_recent {
                return Err(MedgateError::LedgerError("history unavailable".into()));
            }
            Ok(self.recent.iter().take(limit).cloned().collect())
        }

        async fn user_security_summary(
            &self,
            _user_id: &str,
        ) -> Result<UserSecuritySummary, MedgateError> {
            Err(MedgateError::LedgerError("not supported by stub".into()))
        }

        async fn security_report(
            &self,
            _filter: &ReportFilter,
        ) -> Result<SecurityReport, MedgateError> {
            Err(MedgateError::LedgerError("not supported by stub".into()))
        }
    }

    /// An alert sink double recording what was dispatched.
    #[derive(Default)]
    pub struct StubSink {
        pub fail: bool,
        pub dispatched: Mutex<Vec<SecurityAlert>>,
    }

    impl StubSink {
        pub fn dispatched_alerts(&self) -> Vec<SecurityAlert> {
            self.dispatched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AlertSink for StubSink {
        async fn dispatch(&self, alert: &SecurityAlert) -> Result<(), MedgateError> {
            if self.fail {
                return Err(MedgateError::AlertError("sink unavailable".into()));
            }
            self.dispatched.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    /// Build an audit record for seeding `StubStore::recent`.
    pub fn history_record(
        table: &str,
        operation: medgate_types::Operation,
        ip: Option<&str>,
    ) -> AuditRecord {
        use medgate_types::{
            AccessVerdict, AuditMetadata, SecurityContext, UserRole,
        };
        let mut ctx = SecurityContext::new("user-1", UserRole::Doctor, "clinic-1", "sess-1");
        if let Some(ip) = ip {
            ctx = ctx.with_ip(ip.parse().unwrap());
        }
        AuditRecord::from_verdict(
            &ctx,
            table,
            operation,
            None,
            &AccessVerdict {
                granted: true,
                reason: "ok".into(),
                security_score: 90,
                threat_level: 10,
                requirements: Vec::new(),
                alerts: Vec::new(),
            },
            AuditMetadata::default(),
        )
    }
}
