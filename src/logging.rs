//! Structured logging for the swap coordinator.
//!
//! JSON output in production, pretty text in development, plus a
//! dedicated security-event path (`target: "swap::security"`) for
//! protocol-safety incidents — nonce reuse, signature verification
//! failures — that must be greppable independent of ordinary swap
//! progress logs.

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::CoordinatorConfig;

/// Application log level, mapped from [`CoordinatorConfig::log_level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// Event categories for structured logging.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Swap,
    Signing,
    Chain,
    Security,
    System,
}

/// A structured log event, serialized to JSON regardless of whether the
/// subscriber itself is in JSON or pretty mode — this lets a single
/// `tracing::info!("{}", event.to_json())` call carry structured fields
/// even under the pretty-text formatter used in development.
#[derive(Debug, Serialize)]
pub struct LogEvent {
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: format!("{:?}", level).to_uppercase(),
            category,
            message: message.into(),
            trade_id: None,
            data: None,
        }
    }

    pub fn with_trade_id(mut self, trade_id: impl Into<String>) -> Self {
        self.trade_id = Some(trade_id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"error\":\"log serialization failed\",\"message\":\"{}\"}}", self.message))
    }
}

/// Log a nonce-reuse or signature-verification incident. Always a warning
/// or above, regardless of the configured log level, since these indicate
/// either a bug in this crate or a misbehaving counterparty.
pub fn log_security_event(event_type: &str, trade_id: &str, details: serde_json::Value) {
    let event = LogEvent::new(LogLevel::Warn, EventCategory::Security, event_type)
        .with_trade_id(trade_id)
        .with_data(details);
    tracing::warn!(target: "swap::security", "{}", event.to_json());
}

/// Log a swap lifecycle transition (offer received, funded, completed, ...).
pub fn log_swap_event(message: &str, trade_id: &str, data: serde_json::Value) {
    let event = LogEvent::new(LogLevel::Info, EventCategory::Swap, message)
        .with_trade_id(trade_id)
        .with_data(data);
    tracing::info!(target: "swap::lifecycle", "{}", event.to_json());
}

/// Logging initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

/// Initialize the global tracing subscriber. JSON layer for production
/// (mainnet), pretty layer otherwise — mirrors the network-gated format
/// choice in [`CoordinatorConfig`].
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let level_str = format!("{:?}", level).to_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("swap_coordinator={level_str}")));

    if json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );
        subscriber.try_init().map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );
        subscriber.try_init().map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from a loaded [`CoordinatorConfig`].
pub fn init_from_config(config: &CoordinatorConfig) -> Result<(), LoggingError> {
    let level = LogLevel::from(config.log_level.as_str());
    init_logging(level, config.log_json)
}
