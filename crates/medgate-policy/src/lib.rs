//! Grant-rule row-level policy engine.
//!
//! [`GrantPolicyEngine`] implements the `RowPolicyEngine` port with a flat
//! ruleset: role → operations → tables grants, clinic-scoped by default,
//! optionally restricted to the requester's own records. Rules load from
//! TOML files in a policy directory, falling back to the built-in defaults
//! when the directory is missing or empty.

pub mod builtin;
pub mod engine;
pub mod rules;

pub use engine::GrantPolicyEngine;
pub use rules::{GrantRule, RuleScope, RuleSet};
