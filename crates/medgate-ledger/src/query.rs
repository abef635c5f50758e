/// Read queries used by the threat scorer and pattern analyzer.
use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use medgate_types::{AuditMetadata, AuditRecord, MedgateError};

use crate::store::SqliteAuditStore;

impl SqliteAuditStore {
    /// Count rows for `user_id` within `clinic_id` at or after `cutoff`.
    pub fn count_since(
        &self,
        user_id: &str,
        clinic_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, MedgateError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COUNT(*) FROM rls_audit_log
             WHERE user_id = ?1 AND clinic_id = ?2 AND timestamp >= ?3",
            params![user_id, clinic_id, cutoff.to_rfc3339()],
            |row| row.get::<_, i64>(0),
        )
        .map(|c| c as u64)
        .map_err(|e| MedgateError::LedgerError(format!("count_since failed: {e}")))
    }

    /// The most recent rows for `user_id`, newest first, at most `limit`.
    pub fn recent_records(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, MedgateError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT record_uuid, timestamp, user_id, user_role, clinic_id, operation,
                        table_name, record_id, granted, reason, security_score, threat_level,
                        session_id, ip_address, user_agent, emergency_access, metadata
                 FROM rls_audit_log WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| MedgateError::LedgerError(format!("recent_records prepare failed: {e}")))?;

        let rows = stmt
            .query_map(params![user_id, limit as i64], row_to_record)
            .map_err(|e| MedgateError::LedgerError(format!("recent_records failed: {e}")))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| MedgateError::LedgerError(format!("recent_records read failed: {e}")))
    }
}

/// Map a SQLite row to an AuditRecord.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditRecord> {
    Ok(AuditRecord {
        id: row
            .get::<_, String>(0)
            .map(|s| Uuid::parse_str(&s).unwrap())?,
        timestamp: row
            .get::<_, String>(1)
            .map(|s| DateTime::parse_from_rfc3339(&s).unwrap().into())?,
        user_id: row.get(2)?,
        user_role: row.get::<_, String>(3).map(|s| s.parse().unwrap())?,
        clinic_id: row.get(4)?,
        operation: row.get::<_, String>(5).map(|s| s.parse().unwrap())?,
        table_name: row.get(6)?,
        record_id: row.get(7)?,
        granted: row.get::<_, i64>(8)? != 0,
        reason: row.get(9)?,
        security_score: row.get::<_, i64>(10)? as u8,
        threat_level: row.get::<_, i64>(11)? as u8,
        session_id: row.get(12)?,
        ip_address: row.get(13)?,
        user_agent: row.get(14)?,
        emergency_access: row.get::<_, i64>(15)? != 0,
        metadata: row
            .get::<_, String>(16)
            .map(|s| serde_json::from_str::<AuditMetadata>(&s).unwrap_or_default())?,
    })
}
