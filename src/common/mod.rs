//! Common utilities and types shared across rsgroup

pub mod audit;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod utils;

pub use audit::{AuditEntry, AuditEventType, AuditLogger};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_tracing;
pub use metrics::METRICS;
pub use utils::{parse_duration, parse_servers, timestamp_now_millis, ServerId};
