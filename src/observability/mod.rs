//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events, inside the request span (trace_id, span_id)
//!
//! logging.rs routes them to:
//!     → stdout (text or JSON)
//!     → rolling log files (optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every log line via the context span
//! - `RUST_LOG` wins over the configured level

pub mod log;
pub mod logging;

pub use logging::{init, LogGuard, LoggingError};
