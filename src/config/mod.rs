//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! AppConfig::default()        (lowest priority)
//!     → config file (TOML)     loader.rs, first match in search dirs
//!     → environment variables  loader.rs, automatic or bound names
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_file, ConfigError, ConfigLoader};
pub use schema::{AppConfig, CorsConfig, LogConfig, LogFormat, LogRotation, ServerConfig};
pub use validation::{validate_config, ValidationError};
