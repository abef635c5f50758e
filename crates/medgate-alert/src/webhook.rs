//! Webhook alert sink with per-kind cooldown.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use medgate_types::{AlertKind, AlertSink, MedgateError, SecurityAlert};

use crate::payload;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Dispatches alerts as HTTP POSTs to a configured webhook URL.
///
/// Repeated alerts of the same kind inside the cooldown window are
/// suppressed (the evaluation already recorded them in the audit log;
/// the webhook is a notification channel, not a second ledger).
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    cooldown: Duration,
    /// Per-kind cooldown tracking: kind -> last dispatch time.
    last_fired: Mutex<HashMap<AlertKind, Instant>>,
}

impl WebhookSink {
    /// Create a sink posting to `url` with the default timeout and cooldown.
    pub fn new(url: impl Into<String>) -> Result<Self, MedgateError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| MedgateError::AlertError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            cooldown: DEFAULT_COOLDOWN,
            last_fired: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Whether an alert of this kind is still inside the cooldown window.
    /// Updates the window start when the answer is no.
    fn in_cooldown(&self, kind: AlertKind) -> bool {
        let mut last_fired = match self.last_fired.lock() {
            Ok(guard) => guard,
            // A poisoned map only loses cooldown state; dispatch anyway.
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(last) = last_fired.get(&kind) {
            if last.elapsed() < self.cooldown {
                return true;
            }
        }
        last_fired.insert(kind, Instant::now());
        false
    }

    /// Send a test payload to verify connectivity.
    pub async fn send_test(&self, alert: &SecurityAlert) -> Result<u16, MedgateError> {
        let payload = payload::build_payload(alert, true);
        let resp = self.post(&payload).await?;
        let status = resp.status().as_u16();
        if resp.status().is_success() {
            Ok(status)
        } else {
            Err(MedgateError::AlertError(format!(
                "webhook returned HTTP {status}"
            )))
        }
    }

    async fn post(
        &self,
        payload: &payload::WebhookPayload,
    ) -> Result<reqwest::Response, MedgateError> {
        self.client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("User-Agent", "medgate-alert/0.1")
            .json(payload)
            .send()
            .await
            .map_err(|e| MedgateError::AlertError(format!("webhook request failed: {e}")))
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn dispatch(&self, alert: &SecurityAlert) -> Result<(), MedgateError> {
        if self.in_cooldown(alert.kind) {
            debug!(kind = %alert.kind, "alert kind in cooldown, skipping webhook");
            return Ok(());
        }

        let payload = payload::build_payload(alert, false);
        let resp = self.post(&payload).await?;

        let status = resp.status();
        if status.is_success() {
            info!(kind = %alert.kind, status = status.as_u16(), "alert webhook dispatched");
            Ok(())
        } else {
            warn!(kind = %alert.kind, status = status.as_u16(), "alert webhook returned non-success");
            Err(MedgateError::AlertError(format!(
                "webhook returned HTTP {}",
                status.as_u16()
            )))
        }
    }
}
