//! Built-in rulesets used when no policy directory is configured.

/// Deny everything. The fallback for hardened deployments that want every
/// grant spelled out in policy files.
pub const DEFAULT_DENY: &str = "rules = []";

/// The default clinic ruleset: clinical staff read/write within their
/// role's remit, patients read their own records, admins are unrestricted.
pub const DEFAULT_RULES: &str = r#"
audit_tables = ["medical_records", "patient_diagnosis", "billing_records"]

[[rules]]
role = "doctor"
operations = ["SELECT", "INSERT", "UPDATE"]
tables = ["patients", "medical_records", "patient_diagnosis", "appointments"]

[[rules]]
role = "nurse"
operations = ["SELECT"]
tables = ["patients", "medical_records", "appointments"]

[[rules]]
role = "nurse"
operations = ["INSERT", "UPDATE"]
tables = ["appointments"]

[[rules]]
role = "receptionist"
operations = ["SELECT", "INSERT"]
tables = ["patients", "appointments"]

[[rules]]
role = "receptionist"
operations = ["UPDATE"]
tables = ["appointments"]

[[rules]]
role = "clinic_admin"
operations = ["SELECT"]
tables = ["patients", "appointments", "billing_records", "professionals"]

[[rules]]
role = "clinic_admin"
operations = ["INSERT", "UPDATE"]
tables = ["professionals", "appointments", "billing_records"]

[[rules]]
role = "patient"
operations = ["SELECT"]
tables = ["appointments", "medical_records"]
scope = "own_records"

[[rules]]
role = "admin"
operations = ["SELECT", "INSERT", "UPDATE", "DELETE"]
tables = ["*"]
"#;
