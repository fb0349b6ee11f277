//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, tower-http layers, graceful shutdown)
//!     → access_log.rs / cors.rs (cross-cutting layers)
//!     → route.rs (route table → axum Router)
//!     → wrapper.rs (context, login, handler, panic recovery)
//!     → envelope.rs (JSON envelope) or a file / raw body
//!     → Send to client
//! ```

pub mod access_log;
pub mod cors;
pub mod envelope;
pub mod path;
pub mod route;
pub mod server;
mod wrapper;

use axum::http::HeaderName;

pub use envelope::{Envelope, EnvelopeStyle};
pub use route::{ContentType, Handler, HandlerFuture, LoginChecker, Route, RouteError, Web};
pub use server::{HttpServer, ServerError};

/// Response header carrying the request id; read from requests as the parent id.
///
/// Clients know it as `trace-Id`; header names are case-insensitive.
pub const TRACE_ID: HeaderName = HeaderName::from_static("trace-id");
