//! Phase 6: final thresholding.
//!
//! The last word on the decision: hard floors on the security score and
//! ceilings on the threat level that no upstream phase, including the
//! emergency override, can climb over.

use medgate_types::{AccessVerdict, ThresholdConfig};

/// Enforce the hard score/threat thresholds on an otherwise-final verdict.
pub fn apply_thresholds(config: &ThresholdConfig, verdict: AccessVerdict) -> AccessVerdict {
    if verdict.security_score < config.min_security_score {
        let mut verdict = verdict;
        verdict.granted = false;
        verdict.reason = format!(
            "Security score {} below minimum threshold {}",
            verdict.security_score, config.min_security_score
        );
        return verdict;
    }

    if verdict.threat_level > config.max_threat_level {
        let mut verdict = verdict;
        verdict.granted = false;
        verdict.reason = format!(
            "Threat level {} above maximum threshold {}",
            verdict.threat_level, config.max_threat_level
        );
        return verdict;
    }

    verdict
}
