//! Phase 1: threat assessment.
//!
//! Produces a 0-100 threat level from three additive sub-scores: source IP
//! reputation, access-frequency bursts, and time-of-day anomalies. Each
//! sub-score can raise an alert when it crosses its configured threshold.

use std::net::IpAddr;
use std::time::Duration;

use chrono::Timelike;
use tracing::warn;

use medgate_types::{
    AlertDetails, AlertKind, AuditStore, IpScoringConfig, SecurityAlert, SecurityConfig,
    SecurityContext, Severity, ThreatBreakdown,
};

/// Source-address reputation strategy.
///
/// The default prefix heuristic is deliberately coarse; deployments with a
/// threat-intel feed implement this trait over it.
pub trait IpReputationProvider: Send + Sync {
    /// Threat contribution of the request's source address.
    fn score(&self, ip: Option<IpAddr>) -> u8;
}

/// Scores private/internal address space low and everything else —
/// including requests with no recorded source — at the public rate.
pub struct PrefixIpReputation {
    private_score: u8,
    public_score: u8,
}

impl PrefixIpReputation {
    pub fn from_config(config: &IpScoringConfig) -> Self {
        Self {
            private_score: config.private_score,
            public_score: config.public_score,
        }
    }
}

impl IpReputationProvider for PrefixIpReputation {
    fn score(&self, ip: Option<IpAddr>) -> u8 {
        match ip {
            Some(ip) if is_internal(ip) => self.private_score,
            // Unknown provenance must not look safer than a known-private
            // address.
            _ => self.public_score,
        }
    }
}

/// RFC1918, loopback, link-local, and IPv6 unique-local space.
fn is_internal(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

/// The threat phase's contribution to the verdict.
pub struct ThreatAssessment {
    pub breakdown: ThreatBreakdown,
    pub alerts: Vec<SecurityAlert>,
}

/// Assess the threat level of one request.
///
/// Storage failures degrade the frequency sub-score to its configured
/// fallback; this phase never errors out.
pub async fn assess_threats(
    store: &dyn AuditStore,
    reputation: &dyn IpReputationProvider,
    config: &SecurityConfig,
    context: &SecurityContext,
) -> ThreatAssessment {
    let ip_score = reputation.score(context.ip_address);

    let mut recent_access_count = 0u64;
    let frequency_score = match store
        .count_recent(
            &context.user_id,
            &context.clinic_id,
            Duration::from_secs(config.burst.window_secs),
        )
        .await
    {
        Ok(count) => {
            recent_access_count = count;
            if count > config.burst.max_requests {
                config.burst.score
            } else {
                0
            }
        }
        Err(e) => {
            warn!(user = %context.user_id, error = %e, "burst count query failed, using fallback score");
            config.burst.fallback_score
        }
    };

    let hour = context.timestamp.hour();
    let tod = &config.time_of_day;
    let time_score = if (tod.day_start_hour..tod.day_end_hour).contains(&hour) {
        0
    } else if hour >= tod.day_end_hour || hour < tod.day_start_hour {
        tod.off_hours_score
    } else {
        // Only reachable when the configured windows leave a gap.
        tod.fallback_score
    };

    let total =
        (ip_score as u16 + frequency_score as u16 + time_score as u16).min(100) as u8;
    let breakdown = ThreatBreakdown {
        ip_score,
        frequency_score,
        time_score,
        total,
    };

    let mut alerts = Vec::new();
    let details = AlertDetails::ThreatAssessment {
        ip_score,
        frequency_score,
        time_score,
        recent_access_count,
    };
    if ip_score > config.ip_scoring.alert_threshold {
        alerts.push(
            SecurityAlert::new(
                AlertKind::ThreatDetected,
                Severity::High,
                "Source IP reputation exceeds alert threshold",
                context,
                "threat level raised",
            )
            .with_details(details.clone()),
        );
    }
    if frequency_score > config.burst.alert_threshold {
        alerts.push(
            SecurityAlert::new(
                AlertKind::SuspiciousPattern,
                Severity::Medium,
                "Access-frequency burst exceeds alert threshold",
                context,
                "threat level raised",
            )
            .with_details(details.clone()),
        );
    }
    if time_score > config.time_of_day.alert_threshold {
        alerts.push(
            SecurityAlert::new(
                AlertKind::SuspiciousPattern,
                Severity::Medium,
                "Access at an unaccounted-for hour",
                context,
                "threat level raised",
            )
            .with_details(details),
        );
    }

    ThreatAssessment { breakdown, alerts }
}
