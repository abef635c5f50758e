//! Alert delivery for medgate security events.
//!
//! Implements the `AlertSink` port twice:
//!
//! - [`ConsoleSink`]: severity-mapped structured logging, the default for
//!   development and single-node deployments
//! - [`WebhookSink`]: HTTP POST with per-kind cooldown, for chat rooms,
//!   pagers, or SIEM ingestion
//!
//! [`payload`] builds the versioned JSON body webhooks receive.

pub mod console;
pub mod payload;
pub mod webhook;

pub use console::ConsoleSink;
pub use webhook::WebhookSink;
