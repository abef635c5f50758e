//! Phase 4: header-compliance scoring.
//!
//! Asks the injected [`HeaderAdvisor`] what security headers the response
//! should carry and penalizes the security score for each required header
//! the recommendation is missing, up to a configured cap. An advisor
//! failure is neutral: no penalty, no propagated error.

use std::collections::HashMap;
use std::collections::HashSet;

use tracing::warn;

use medgate_types::{
    AccessVerdict, HeaderBreakdown, MedgateError, SecurityConfig, SecurityContext,
};

/// Security-header recommendation generator.
///
/// An external collaborator in production deployments; the default
/// [`StandardHeaderAdvisor`] emits a fixed baseline set.
pub trait HeaderAdvisor: Send + Sync {
    /// Recommended response headers for this request, keyed by header name.
    fn recommend(&self, context: &SecurityContext)
        -> Result<HashMap<String, String>, MedgateError>;
}

/// Emits the standard hardening baseline for every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardHeaderAdvisor;

impl HeaderAdvisor for StandardHeaderAdvisor {
    fn recommend(
        &self,
        _context: &SecurityContext,
    ) -> Result<HashMap<String, String>, MedgateError> {
        let headers = [
            ("content-security-policy", "default-src 'self'"),
            ("strict-transport-security", "max-age=31536000; includeSubDomains"),
            ("x-content-type-options", "nosniff"),
            ("x-frame-options", "DENY"),
            ("referrer-policy", "strict-origin-when-cross-origin"),
        ];
        Ok(headers
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

/// The header phase's contribution to the verdict.
pub struct HeaderOutcome {
    pub verdict: AccessVerdict,
    pub breakdown: HeaderBreakdown,
}

/// Score the advisor's recommendation against the required header set and
/// fold the penalty into the verdict.
pub fn apply_header_compliance(
    advisor: &dyn HeaderAdvisor,
    config: &SecurityConfig,
    context: &SecurityContext,
    verdict: AccessVerdict,
) -> HeaderOutcome {
    let recommended: HashSet<String> = match advisor.recommend(context) {
        Ok(headers) => headers.keys().map(|name| name.to_ascii_lowercase()).collect(),
        Err(e) => {
            warn!(user = %context.user_id, error = %e, "header advisor failed, skipping compliance check");
            return HeaderOutcome {
                verdict,
                breakdown: HeaderBreakdown {
                    missing: Vec::new(),
                    modifier: 0,
                },
            };
        }
    };

    let missing: Vec<String> = config
        .headers
        .required
        .iter()
        .filter(|name| !recommended.contains(&name.to_ascii_lowercase()))
        .cloned()
        .collect();

    let penalty = (missing.len() as u32 * config.headers.missing_penalty as u32)
        .min(config.headers.max_penalty as u32) as u8;

    HeaderOutcome {
        verdict: verdict.penalize_security(penalty),
        breakdown: HeaderBreakdown {
            missing,
            modifier: -(penalty as i8),
        },
    }
}
