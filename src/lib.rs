//! API component library.
//!
//! Uniform request contexts, multi-source request decoding, coded errors,
//! structured logging and a declarative route table on top of axum.

pub mod config;
pub mod context;
pub mod decode;
pub mod errors;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use context::{BackgroundContext, Context, Contexts, RequestContext};
pub use decode::Decode;
pub use errors::{ApiError, ErrorFactory};
pub use http::{ContentType, EnvelopeStyle, HttpServer, Route, Web};
pub use lifecycle::Shutdown;
