//! Read-only reporting aggregations over the audit log.
//!
//! These views carry no invariant beyond "reflects whatever is in the
//! store for the given filters": score averages, denial rates, and the
//! hourly threat breakdown used by compliance dashboards.

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, OptionalExtension};

use medgate_types::{MedgateError, ReportFilter, SecurityReport, UserSecuritySummary};

use crate::store::SqliteAuditStore;

/// Default threat level above which a row counts as high-threat.
const DEFAULT_THREAT_THRESHOLD: u8 = 70;

/// How many recent denial reasons a user summary carries.
const RECENT_DENIALS: usize = 5;

/// How many peak hours a report lists.
const PEAK_HOURS: usize = 3;

impl SqliteAuditStore {
    /// Aggregate one user's history into a [`UserSecuritySummary`].
    pub fn summarize_user(&self, user_id: &str) -> Result<UserSecuritySummary, MedgateError> {
        let conn = self.lock()?;

        let (total, denied, avg_score, avg_threat, emergency, last_access) = conn
            .query_row(
                "SELECT COUNT(*),
                        SUM(CASE WHEN granted = 0 THEN 1 ELSE 0 END),
                        AVG(security_score),
                        AVG(threat_level),
                        SUM(CASE WHEN emergency_access != 0 THEN 1 ELSE 0 END),
                        MAX(timestamp)
                 FROM rls_audit_log WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .map_err(|e| MedgateError::LedgerError(format!("user summary query failed: {e}")))?;

        let mut stmt = conn
            .prepare(
                "SELECT reason FROM rls_audit_log
                 WHERE user_id = ?1 AND granted = 0 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| MedgateError::LedgerError(format!("denial query prepare failed: {e}")))?;
        let reasons = stmt
            .query_map(params![user_id, RECENT_DENIALS as i64], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| MedgateError::LedgerError(format!("denial query failed: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MedgateError::LedgerError(format!("denial query read failed: {e}")))?;

        Ok(UserSecuritySummary {
            user_id: user_id.to_string(),
            total_evaluations: total as u64,
            denied_count: denied.unwrap_or(0) as u64,
            average_security_score: avg_score.unwrap_or(0.0),
            average_threat_level: avg_threat.unwrap_or(0.0),
            emergency_access_count: emergency.unwrap_or(0) as u64,
            last_access: parse_stored_timestamp(last_access),
            recent_denial_reasons: reasons,
        })
    }

    /// Aggregate the rows matching `filter` into a [`SecurityReport`].
    pub fn compute_report(&self, filter: &ReportFilter) -> Result<SecurityReport, MedgateError> {
        let threshold = filter.threat_threshold.unwrap_or(DEFAULT_THREAT_THRESHOLD);
        let conn = self.lock()?;

        // Totals.
        let (where_clause, mut totals_params, next_idx) = filter_fragment(filter, 1);
        totals_params.push(Box::new(threshold as i64));
        let sql = format!(
            "SELECT COUNT(*),
                    SUM(CASE WHEN granted != 0 THEN 1 ELSE 0 END),
                    AVG(security_score),
                    AVG(threat_level),
                    SUM(CASE WHEN threat_level > ?{next_idx} THEN 1 ELSE 0 END),
                    SUM(CASE WHEN emergency_access != 0 THEN 1 ELSE 0 END),
                    MIN(timestamp),
                    MAX(timestamp)
             FROM rls_audit_log{where_clause}"
        );
        let (total, granted, avg_score, avg_threat, high_threat, emergency, earliest, latest) =
            conn.query_row(
                &sql,
                rusqlite::params_from_iter(totals_params.iter().map(|p| p.as_ref())),
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| MedgateError::LedgerError(format!("report totals query failed: {e}")))?
            .unwrap_or((0, None, None, None, None, None, None, None));

        let total = total as u64;
        let granted_count = granted.unwrap_or(0) as u64;
        let denied_count = total - granted_count;

        // Per-operation counts.
        let (where_clause, op_params, _) = filter_fragment(filter, 1);
        let sql = format!(
            "SELECT operation, COUNT(*) FROM rls_audit_log{where_clause}
             GROUP BY operation ORDER BY COUNT(*) DESC"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| MedgateError::LedgerError(format!("operation query prepare failed: {e}")))?;
        let operations = stmt
            .query_map(
                rusqlite::params_from_iter(op_params.iter().map(|p| p.as_ref())),
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)),
            )
            .map_err(|e| MedgateError::LedgerError(format!("operation query failed: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MedgateError::LedgerError(format!("operation query read failed: {e}")))?;

        // Peak threat hours: top UTC hours by denied count.
        let (where_clause, hour_params, _) = filter_fragment(filter, 1);
        let denied_clause = if where_clause.is_empty() {
            " WHERE granted = 0".to_string()
        } else {
            format!("{where_clause} AND granted = 0")
        };
        let sql = format!(
            "SELECT CAST(strftime('%H', timestamp) AS INTEGER) AS hour, COUNT(*)
             FROM rls_audit_log{denied_clause}
             GROUP BY hour ORDER BY COUNT(*) DESC, hour ASC LIMIT {PEAK_HOURS}"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| MedgateError::LedgerError(format!("peak hours prepare failed: {e}")))?;
        let peak_threat_hours = stmt
            .query_map(
                rusqlite::params_from_iter(hour_params.iter().map(|p| p.as_ref())),
                |row| Ok((row.get::<_, i64>(0)? as u8, row.get::<_, i64>(1)? as u64)),
            )
            .map_err(|e| MedgateError::LedgerError(format!("peak hours query failed: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MedgateError::LedgerError(format!("peak hours read failed: {e}")))?;

        Ok(SecurityReport {
            total_evaluations: total,
            granted_count,
            denied_count,
            denial_rate: if total > 0 {
                denied_count as f64 / total as f64
            } else {
                0.0
            },
            average_security_score: avg_score.unwrap_or(0.0),
            average_threat_level: avg_threat.unwrap_or(0.0),
            high_threat_count: high_threat.unwrap_or(0) as u64,
            emergency_access_count: emergency.unwrap_or(0) as u64,
            operations,
            peak_threat_hours,
            earliest_entry: parse_stored_timestamp(earliest),
            latest_entry: parse_stored_timestamp(latest),
        })
    }
}

/// Build a WHERE clause and positional parameters from a report filter.
///
/// Placeholders are numbered starting at `first_idx`; the third element of
/// the return value is the next free placeholder index.
fn filter_fragment(
    filter: &ReportFilter,
    first_idx: usize,
) -> (String, Vec<Box<dyn ToSql>>, usize) {
    let mut conditions: Vec<String> = Vec::new();
    let mut sql_params: Vec<Box<dyn ToSql>> = Vec::new();
    let mut idx = first_idx;

    if let Some(ref start) = filter.start {
        conditions.push(format!("timestamp >= ?{idx}"));
        sql_params.push(Box::new(start.to_rfc3339()));
        idx += 1;
    }
    if let Some(ref end) = filter.end {
        conditions.push(format!("timestamp <= ?{idx}"));
        sql_params.push(Box::new(end.to_rfc3339()));
        idx += 1;
    }
    if let Some(ref clinic_id) = filter.clinic_id {
        conditions.push(format!("clinic_id = ?{idx}"));
        sql_params.push(Box::new(clinic_id.clone()));
        idx += 1;
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (where_clause, sql_params, idx)
}

fn parse_stored_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use medgate_types::{
        AccessVerdict, AuditMetadata, AuditRecord, Operation, SecurityContext, UserRole,
    };

    fn record(
        user: &str,
        clinic: &str,
        granted: bool,
        threat: u8,
        score: u8,
        hour: u32,
    ) -> AuditRecord {
        let ctx = SecurityContext::new(user, UserRole::Doctor, clinic, "sess-1");
        let verdict = AccessVerdict {
            granted,
            reason: if granted { "ok" } else { "policy denied" }.into(),
            security_score: score,
            threat_level: threat,
            requirements: Vec::new(),
            alerts: Vec::new(),
        };
        let mut rec = AuditRecord::from_verdict(
            &ctx,
            "patients",
            Operation::Select,
            None,
            &verdict,
            AuditMetadata::default(),
        );
        rec.timestamp = Utc.with_ymd_and_hms(2026, 8, 7, hour, 30, 0).unwrap();
        rec
    }

    #[test]
    fn user_summary_totals_and_averages() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        store.append_record(&record("u1", "c1", true, 10, 90, 9)).unwrap();
        store.append_record(&record("u1", "c1", false, 60, 40, 10)).unwrap();
        store.append_record(&record("u2", "c1", true, 10, 80, 11)).unwrap();

        let summary = store.summarize_user("u1").unwrap();
        assert_eq!(summary.total_evaluations, 2);
        assert_eq!(summary.denied_count, 1);
        assert!((summary.average_security_score - 65.0).abs() < 0.01);
        assert!((summary.average_threat_level - 35.0).abs() < 0.01);
        assert_eq!(summary.recent_denial_reasons, vec!["policy denied".to_string()]);
        assert!(summary.last_access.is_some());
    }

    #[test]
    fn user_summary_empty_history() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        let summary = store.summarize_user("nobody").unwrap();
        assert_eq!(summary.total_evaluations, 0);
        assert_eq!(summary.denied_count, 0);
        assert_eq!(summary.average_security_score, 0.0);
        assert!(summary.last_access.is_none());
        assert!(summary.recent_denial_reasons.is_empty());
    }

    #[test]
    fn report_counts_and_denial_rate() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        store.append_record(&record("u1", "c1", true, 10, 90, 9)).unwrap();
        store.append_record(&record("u1", "c1", false, 85, 20, 23)).unwrap();
        store.append_record(&record("u2", "c1", false, 75, 25, 23)).unwrap();
        store.append_record(&record("u3", "c1", true, 5, 95, 14)).unwrap();

        let report = store.compute_report(&ReportFilter::default()).unwrap();
        assert_eq!(report.total_evaluations, 4);
        assert_eq!(report.granted_count, 2);
        assert_eq!(report.denied_count, 2);
        assert!((report.denial_rate - 0.5).abs() < 0.01);
        // threat 85 and 75 both exceed the default threshold of 70.
        assert_eq!(report.high_threat_count, 2);
        assert!(report.earliest_entry.is_some());
        assert!(report.latest_entry.is_some());
    }

    #[test]
    fn report_filters_by_clinic() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        store.append_record(&record("u1", "c1", true, 10, 90, 9)).unwrap();
        store.append_record(&record("u2", "c2", false, 85, 20, 10)).unwrap();

        let filter = ReportFilter {
            clinic_id: Some("c1".into()),
            ..Default::default()
        };
        let report = store.compute_report(&filter).unwrap();
        assert_eq!(report.total_evaluations, 1);
        assert_eq!(report.denied_count, 0);
    }

    #[test]
    fn report_peak_threat_hours_top_three() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        // 3 denials at 23:00, 2 at 02:00, 1 at 14:00, 1 at 09:00.
        for _ in 0..3 {
            store.append_record(&record("u1", "c1", false, 80, 20, 23)).unwrap();
        }
        for _ in 0..2 {
            store.append_record(&record("u1", "c1", false, 80, 20, 2)).unwrap();
        }
        store.append_record(&record("u1", "c1", false, 80, 20, 14)).unwrap();
        store.append_record(&record("u1", "c1", false, 80, 20, 9)).unwrap();
        // Grants never count toward peak hours.
        store.append_record(&record("u1", "c1", true, 10, 90, 11)).unwrap();

        let report = store.compute_report(&ReportFilter::default()).unwrap();
        assert_eq!(report.peak_threat_hours.len(), 3);
        assert_eq!(report.peak_threat_hours[0], (23, 3));
        assert_eq!(report.peak_threat_hours[1], (2, 2));
        // Hours 9 and 14 tie at one denial; the lower hour wins the slot.
        assert_eq!(report.peak_threat_hours[2], (9, 1));
    }

    #[test]
    fn report_empty_store() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        let report = store.compute_report(&ReportFilter::default()).unwrap();
        assert_eq!(report.total_evaluations, 0);
        assert_eq!(report.denial_rate, 0.0);
        assert!(report.operations.is_empty());
        assert!(report.peak_threat_hours.is_empty());
    }

    #[test]
    fn report_custom_threat_threshold() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        store.append_record(&record("u1", "c1", true, 50, 90, 9)).unwrap();
        store.append_record(&record("u1", "c1", true, 60, 90, 9)).unwrap();

        let filter = ReportFilter {
            threat_threshold: Some(40),
            ..Default::default()
        };
        let report = store.compute_report(&filter).unwrap();
        assert_eq!(report.high_threat_count, 2);
    }
}
