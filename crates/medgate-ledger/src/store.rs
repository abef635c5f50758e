/// SqliteAuditStore: SQLite-backed append-only audit log.
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::info;

use medgate_types::{
    AuditRecord, AuditStore, MedgateError, ReportFilter, SecurityReport, UserSecuritySummary,
};

/// An append-only audit store backed by SQLite.
///
/// The connection is guarded by a mutex so one store handle can be shared
/// (`Arc<dyn AuditStore>`) across concurrent evaluations; every query is
/// short and the decision path issues at most three of them per request.
pub struct SqliteAuditStore {
    pub(crate) conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    /// Open (or create) the audit log at the given path.
    ///
    /// Enables WAL mode and creates the `rls_audit_log` table and indices
    /// if they do not exist.
    pub fn open(path: &Path) -> Result<Self, MedgateError> {
        let conn = Connection::open(path)
            .map_err(|e| MedgateError::LedgerError(format!("failed to open database: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| MedgateError::LedgerError(format!("failed to set WAL mode: {e}")))?;

        Self::init_schema(&conn)?;

        info!(path = %path.display(), "audit store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store. Used by tests and ephemeral deployments.
    pub fn open_in_memory() -> Result<Self, MedgateError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MedgateError::LedgerError(format!("failed to open database: {e}")))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), MedgateError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS rls_audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                record_uuid TEXT NOT NULL UNIQUE,
                timestamp TEXT NOT NULL,
                user_id TEXT NOT NULL,
                user_role TEXT NOT NULL,
                clinic_id TEXT NOT NULL,
                operation TEXT NOT NULL,
                table_name TEXT NOT NULL,
                record_id TEXT,
                granted INTEGER NOT NULL,
                reason TEXT NOT NULL,
                security_score INTEGER NOT NULL,
                threat_level INTEGER NOT NULL,
                session_id TEXT NOT NULL,
                ip_address TEXT,
                user_agent TEXT,
                emergency_access INTEGER NOT NULL,
                metadata TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON rls_audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_user ON rls_audit_log(user_id);
            CREATE INDEX IF NOT EXISTS idx_audit_clinic ON rls_audit_log(clinic_id);
            CREATE INDEX IF NOT EXISTS idx_audit_granted ON rls_audit_log(granted);",
        )
        .map_err(|e| MedgateError::LedgerError(format!("failed to create schema: {e}")))
    }

    /// Append one record. Synchronous inner of [`AuditStore::append`].
    pub fn append_record(&self, record: &AuditRecord) -> Result<(), MedgateError> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| MedgateError::LedgerError(format!("failed to serialize metadata: {e}")))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO rls_audit_log (
                record_uuid, timestamp, user_id, user_role, clinic_id, operation,
                table_name, record_id, granted, reason, security_score, threat_level,
                session_id, ip_address, user_agent, emergency_access, metadata
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                record.id.to_string(),
                record.timestamp.to_rfc3339(),
                record.user_id,
                record.user_role.to_string(),
                record.clinic_id,
                record.operation.to_string(),
                record.table_name,
                record.record_id,
                record.granted as i64,
                record.reason,
                record.security_score as i64,
                record.threat_level as i64,
                record.session_id,
                record.ip_address,
                record.user_agent,
                record.emergency_access as i64,
                metadata,
            ],
        )
        .map_err(|e| MedgateError::LedgerError(format!("failed to insert record: {e}")))?;

        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, MedgateError> {
        self.conn
            .lock()
            .map_err(|_| MedgateError::LedgerError("audit store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn append(&self, record: &AuditRecord) -> Result<(), MedgateError> {
        self.append_record(record)
    }

    async fn count_recent(
        &self,
        user_id: &str,
        clinic_id: &str,
        window: Duration,
    ) -> Result<u64, MedgateError> {
        let window = chrono::Duration::from_std(window)
            .map_err(|e| MedgateError::LedgerError(format!("invalid count window: {e}")))?;
        self.count_since(user_id, clinic_id, Utc::now() - window)
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, MedgateError> {
        self.recent_records(user_id, limit)
    }

    async fn user_security_summary(
        &self,
        user_id: &str,
    ) -> Result<UserSecuritySummary, MedgateError> {
        self.summarize_user(user_id)
    }

    async fn security_report(
        &self,
        filter: &ReportFilter,
    ) -> Result<SecurityReport, MedgateError> {
        self.compute_report(filter)
    }
}
