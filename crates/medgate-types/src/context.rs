//! The per-request security context evaluated by the engine.
//!
//! A [`SecurityContext`] identifies the requester, the request, and its
//! network provenance. It is constructed fresh for every inbound request
//! and never persisted directly; audit records and alerts copy the fields
//! they need.

use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::MedgateError;

/// Clinic staff and patient roles recognized by the access matrix and the
/// emergency-override allow-list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Doctor,
    Nurse,
    Admin,
    ClinicAdmin,
    Receptionist,
    Patient,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UserRole::Doctor => "doctor",
            UserRole::Nurse => "nurse",
            UserRole::Admin => "admin",
            UserRole::ClinicAdmin => "clinic_admin",
            UserRole::Receptionist => "receptionist",
            UserRole::Patient => "patient",
        };
        write!(f, "{name}")
    }
}

impl FromStr for UserRole {
    type Err = MedgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "doctor" => Ok(UserRole::Doctor),
            "nurse" => Ok(UserRole::Nurse),
            "admin" => Ok(UserRole::Admin),
            "clinic_admin" => Ok(UserRole::ClinicAdmin),
            "receptionist" => Ok(UserRole::Receptionist),
            "patient" => Ok(UserRole::Patient),
            other => Err(MedgateError::ConfigError(format!("unknown role: {other}"))),
        }
    }
}

/// The database operation being guarded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl Operation {
    /// Whether this operation mutates data.
    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::Select)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Select => "SELECT",
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Operation {
    type Err = MedgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SELECT" => Ok(Operation::Select),
            "INSERT" => Ok(Operation::Insert),
            "UPDATE" => Ok(Operation::Update),
            "DELETE" => Ok(Operation::Delete),
            other => Err(MedgateError::ConfigError(format!(
                "unknown operation: {other}"
            ))),
        }
    }
}

/// HTTP method of the inbound request, used by the emergency-override
/// justification gate (read-only emergency access only).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl std::fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Patch => "PATCH",
            RequestMethod::Delete => "DELETE",
        };
        write!(f, "{name}")
    }
}

impl FromStr for RequestMethod {
    type Err = MedgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(RequestMethod::Get),
            "POST" => Ok(RequestMethod::Post),
            "PUT" => Ok(RequestMethod::Put),
            "PATCH" => Ok(RequestMethod::Patch),
            "DELETE" => Ok(RequestMethod::Delete),
            other => Err(MedgateError::ConfigError(format!(
                "unknown request method: {other}"
            ))),
        }
    }
}

/// Everything the evaluator knows about one inbound request.
///
/// Immutable for the duration of an evaluation. The mandatory identity
/// fields go through [`SecurityContext::new`]; request and provenance
/// details are attached with the `with_*` builders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityContext {
    /// The requesting user.
    pub user_id: String,
    /// The requester's role within the clinic.
    pub user_role: UserRole,
    /// The tenant clinic the request is scoped to.
    pub clinic_id: String,
    /// Professional record id, when the requester is clinical staff.
    pub professional_id: Option<String>,
    /// HTTP method of the inbound request.
    pub request_method: RequestMethod,
    /// Path of the inbound request.
    pub request_path: String,
    /// When the request was received.
    pub timestamp: DateTime<Utc>,
    /// The authenticated session.
    pub session_id: String,
    /// Source IP, when known.
    pub ip_address: Option<IpAddr>,
    /// User agent string, when known.
    pub user_agent: Option<String>,
    /// Requester-asserted emergency access (break-the-glass).
    pub emergency_access: bool,
}

impl SecurityContext {
    /// Create a context with the mandatory identity fields.
    ///
    /// Defaults: `GET /`, current time, no provenance, no emergency flag.
    pub fn new(
        user_id: impl Into<String>,
        user_role: UserRole,
        clinic_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_role,
            clinic_id: clinic_id.into(),
            professional_id: None,
            request_method: RequestMethod::Get,
            request_path: "/".to_string(),
            timestamp: Utc::now(),
            session_id: session_id.into(),
            ip_address: None,
            user_agent: None,
            emergency_access: false,
        }
    }

    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.request_method = method;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.request_path = path.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip_address = Some(ip);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_professional_id(mut self, professional_id: impl Into<String>) -> Self {
        self.professional_id = Some(professional_id.into());
        self
    }

    pub fn with_emergency_access(mut self, emergency: bool) -> Self {
        self.emergency_access = emergency;
        self
    }

    /// Whether the mandatory identity fields are populated.
    pub fn is_complete(&self) -> bool {
        !self.user_id.is_empty() && !self.clinic_id.is_empty() && !self.session_id.is_empty()
    }
}
