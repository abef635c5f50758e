//! Scoring and threshold configuration for the evaluation pipeline.
//!
//! Every heuristic constant the evaluator uses — IP reputation scores,
//! burst windows, penalty magnitudes, the role/table access matrix, the
//! hard decision thresholds — lives here as data, loaded from TOML or
//! built from [`SecurityConfig::default`]. Operators tune thresholds
//! without code changes.

use serde::{Deserialize, Serialize};

use crate::context::{Operation, UserRole};
use crate::MedgateError;

/// IP reputation contribution to the threat level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpScoringConfig {
    /// Contribution of a private/internal source address.
    pub private_score: u8,
    /// Contribution of a public (or unknown) source address.
    pub public_score: u8,
    /// Sub-score above which a THREAT_DETECTED alert fires.
    pub alert_threshold: u8,
}

impl Default for IpScoringConfig {
    fn default() -> Self {
        Self {
            private_score: 10,
            public_score: 30,
            alert_threshold: 70,
        }
    }
}

/// Access-frequency burst detection for the threat scorer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BurstConfig {
    /// Lookback window in seconds.
    pub window_secs: u64,
    /// Request count above which the burst score applies.
    pub max_requests: u64,
    /// Threat contribution of a detected burst.
    pub score: u8,
    /// Contribution assumed when the count query fails.
    pub fallback_score: u8,
    /// Sub-score above which a SUSPICIOUS_PATTERN alert fires.
    pub alert_threshold: u8,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            window_secs: 300,
            max_requests: 20,
            score: 60,
            fallback_score: 20,
            alert_threshold: 60,
        }
    }
}

/// Time-of-day anomaly scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeOfDayConfig {
    /// First hour (inclusive, UTC) of the business-hours window.
    pub day_start_hour: u32,
    /// First hour (exclusive, UTC) after the business-hours window.
    pub day_end_hour: u32,
    /// Threat contribution of an off-hours request.
    pub off_hours_score: u8,
    /// Contribution when the hour falls outside any known window.
    pub fallback_score: u8,
    /// Sub-score above which a SUSPICIOUS_PATTERN alert fires.
    pub alert_threshold: u8,
}

impl Default for TimeOfDayConfig {
    fn default() -> Self {
        Self {
            day_start_hour: 6,
            day_end_hour: 22,
            off_hours_score: 30,
            fallback_score: 80,
            alert_threshold: 80,
        }
    }
}

/// Pattern-analyzer windows and penalties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternConfig {
    /// Lookback window in seconds for the high-frequency check.
    pub frequency_window_secs: u64,
    /// Request count above which the frequency penalty applies.
    pub frequency_max_requests: u64,
    pub frequency_penalty: u8,
    /// How many recent accesses the sequence check inspects.
    pub sequence_depth: usize,
    pub sensitive_sequence_penalty: u8,
    pub role_mismatch_penalty: u8,
    pub ip_drift_penalty: u8,
    /// Score reported when storage fails mid-analysis.
    pub fallback_score: u8,
    /// Tables whose repeated reads indicate scraping.
    pub sensitive_tables: Vec<String>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            frequency_window_secs: 60,
            frequency_max_requests: 50,
            frequency_penalty: 30,
            sequence_depth: 10,
            sensitive_sequence_penalty: 25,
            role_mismatch_penalty: 40,
            ip_drift_penalty: 20,
            fallback_score: 50,
            sensitive_tables: vec![
                "medical_records".into(),
                "patient_diagnosis".into(),
                "billing_records".into(),
            ],
        }
    }
}

/// One row of the role/operation/table access matrix.
///
/// `"*"` in `tables` matches any table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessGrant {
    pub role: UserRole,
    pub operation: Operation,
    pub tables: Vec<String>,
}

/// Emergency-override privilege configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmergencyConfig {
    /// Roles permitted to invoke the emergency-access path.
    pub allowed_roles: Vec<UserRole>,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            allowed_roles: vec![UserRole::Doctor, UserRole::Admin, UserRole::ClinicAdmin],
        }
    }
}

/// Header-compliance scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeaderConfig {
    /// Header names (lowercase) that must be present in the advisor's
    /// recommendation.
    pub required: Vec<String>,
    /// Security-score penalty per missing header.
    pub missing_penalty: u8,
    /// Cap on the total header penalty.
    pub max_penalty: u8,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            required: vec![
                "content-security-policy".into(),
                "strict-transport-security".into(),
                "x-content-type-options".into(),
                "x-frame-options".into(),
            ],
            missing_penalty: 10,
            max_penalty: 50,
        }
    }
}

/// Hard decision thresholds applied after every other phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdConfig {
    /// Security score below which access is always denied.
    pub min_security_score: u8,
    /// Threat level above which access is always denied.
    pub max_threat_level: u8,
    /// Threat level above which the audit sink dispatches alerts.
    pub alert_threat_level: u8,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_security_score: 30,
            max_threat_level: 80,
            alert_threat_level: 70,
        }
    }
}

/// Top-level evaluator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityConfig {
    #[serde(default)]
    pub ip_scoring: IpScoringConfig,
    #[serde(default)]
    pub burst: BurstConfig,
    #[serde(default)]
    pub time_of_day: TimeOfDayConfig,
    #[serde(default)]
    pub pattern: PatternConfig,
    #[serde(default)]
    pub emergency: EmergencyConfig,
    #[serde(default)]
    pub headers: HeaderConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    /// Role/operation/table consistency matrix used by the pattern
    /// analyzer. Not an authorization source; the policy engine decides
    /// grants, this only scores behavioral consistency.
    #[serde(default = "default_access_matrix")]
    pub access_matrix: Vec<AccessGrant>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            ip_scoring: IpScoringConfig::default(),
            burst: BurstConfig::default(),
            time_of_day: TimeOfDayConfig::default(),
            pattern: PatternConfig::default(),
            emergency: EmergencyConfig::default(),
            headers: HeaderConfig::default(),
            thresholds: ThresholdConfig::default(),
            access_matrix: default_access_matrix(),
        }
    }
}

impl SecurityConfig {
    /// Parse a configuration from a TOML string. Missing sections fall
    /// back to their defaults.
    pub fn from_toml(content: &str) -> Result<Self, MedgateError> {
        toml::from_str(content).map_err(|e| MedgateError::ConfigError(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, MedgateError> {
        toml::to_string_pretty(self).map_err(|e| MedgateError::ConfigError(e.to_string()))
    }

    /// Whether the access matrix has an entry permitting this
    /// role/operation/table combination.
    pub fn matrix_allows(&self, role: UserRole, operation: Operation, table: &str) -> bool {
        self.access_matrix.iter().any(|grant| {
            grant.role == role
                && grant.operation == operation
                && grant.tables.iter().any(|t| t == "*" || t == table)
        })
    }

    /// Whether the table is in the configured sensitive set.
    pub fn is_sensitive_table(&self, table: &str) -> bool {
        self.pattern.sensitive_tables.iter().any(|t| t == table)
    }
}

fn default_access_matrix() -> Vec<AccessGrant> {
    use Operation::*;
    use UserRole::*;

    let grant = |role, operation, tables: &[&str]| AccessGrant {
        role,
        operation,
        tables: tables.iter().map(|t| t.to_string()).collect(),
    };

    vec![
        grant(
            Doctor,
            Select,
            &["patients", "medical_records", "patient_diagnosis", "appointments"],
        ),
        grant(Doctor, Insert, &["medical_records", "patient_diagnosis", "appointments"]),
        grant(Doctor, Update, &["medical_records", "patient_diagnosis", "appointments"]),
        grant(Nurse, Select, &["patients", "medical_records", "appointments"]),
        grant(Nurse, Insert, &["appointments"]),
        grant(Nurse, Update, &["appointments"]),
        grant(Receptionist, Select, &["patients", "appointments"]),
        grant(Receptionist, Insert, &["patients", "appointments"]),
        grant(Receptionist, Update, &["appointments"]),
        grant(ClinicAdmin, Select, &["patients", "appointments", "billing_records", "professionals"]),
        grant(ClinicAdmin, Insert, &["professionals"]),
        grant(ClinicAdmin, Update, &["professionals", "appointments", "billing_records"]),
        grant(Patient, Select, &["appointments"]),
        grant(Admin, Select, &["*"]),
        grant(Admin, Insert, &["*"]),
        grant(Admin, Update, &["*"]),
        grant(Admin, Delete, &["*"]),
    ]
}
