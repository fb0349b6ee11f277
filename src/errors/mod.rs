//! Error codes with caller capture.
//!
//! # Data Flow
//! ```text
//! handler / context
//!     → ApiError (code, message, optional source, caller)
//!     → http::envelope (retcode + message written as JSON)
//!     → response record log (code, message, raw error, caller)
//! ```
//!
//! # Design Decisions
//! - Constructors are `#[track_caller]` so the recorded location is the user's call site
//! - Messages for well-known codes come from the registry, not from call sites
//! - A backtrace is captured as well; it is only populated when `RUST_BACKTRACE` asks for it

pub mod code;
pub mod factory;
pub mod registry;

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;

pub use factory::{CodedError, ErrorFactory};
pub use registry::{RegistryError, DEFAULT_LANG};

/// Boxed error used as the wrapped source of an [`ApiError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

const RAW_ERROR_SEPARATOR: &str = "|";

/// Error returned by handlers and context operations.
#[derive(Debug)]
pub struct ApiError {
    code: i32,
    message: String,
    source: Option<BoxError>,
    callers: Vec<&'static Location<'static>>,
    backtrace: Backtrace,
}

impl ApiError {
    /// Create an error with an explicit message.
    #[track_caller]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            callers: vec![Location::caller()],
            backtrace: Backtrace::capture(),
        }
    }

    /// Create an error whose message is the registered template for `code`,
    /// filled with `args`.
    #[track_caller]
    pub fn from_code(code: i32, args: &[&dyn fmt::Display]) -> Self {
        let template = registry::lookup(DEFAULT_LANG, code);
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        Self::new(code, registry::render(&template, &args))
    }

    /// Create an error from preformatted arguments.
    #[track_caller]
    pub fn message_of(code: i32, args: fmt::Arguments<'_>) -> Self {
        Self::new(code, args.to_string())
    }

    /// Attach the underlying error.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Record an additional frame, e.g. when an error is passed through a wrapper.
    #[track_caller]
    pub fn traced(mut self) -> Self {
        self.callers.push(Location::caller());
        self
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Display text of the wrapped error, or an empty string.
    pub fn raw_error_string(&self) -> String {
        self.source.as_ref().map(|e| e.to_string()).unwrap_or_default()
    }

    /// Recorded call sites as `path/to/file.rs:line`, innermost first.
    ///
    /// Paths are trimmed to their last four components.
    pub fn caller(&self) -> Vec<String> {
        self.callers
            .iter()
            .map(|loc| format!("{}:{}", trim_path(loc.file(), 4), loc.line()))
            .collect()
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(source) = &self.source {
            let raw = source.to_string();
            if raw != self.message {
                write!(f, "{}raw_error:{}", RAW_ERROR_SEPARATOR, raw)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Keep the last `keep` components of a source path.
pub(crate) fn trim_path(file: &str, keep: usize) -> String {
    let separator = if file.contains('\\') { '\\' } else { '/' };
    let parts: Vec<&str> = file.split(separator).collect();
    let start = parts.len().saturating_sub(keep);
    parts[start..].join(&separator.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_new_error() {
        let err = ApiError::new(400, "Bad request");
        assert_eq!(err.code(), 400);
        assert_eq!(err.message(), "Bad request");
        assert_eq!(err.raw_error_string(), "");
        assert_eq!(err.to_string(), "Bad request");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_from_code_uses_registered_template() {
        let err = ApiError::from_code(code::FILE_NOT_FOUND, &[&"report.csv"]);
        assert_eq!(err.message(), "file not found. file name: report.csv");
    }

    #[test]
    fn test_from_unknown_code_is_empty() {
        let err = ApiError::from_code(424_242, &[&"x"]);
        assert_eq!(err.message(), "");
    }

    #[test]
    fn test_display_includes_raw_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = ApiError::from_code(code::RAW_ERR_WRAP, &[&io]);
        let err = err.with_source(io);
        assert_eq!(err.raw_error_string(), "disk gone");
        assert_eq!(err.to_string(), "raw error wrap: disk gone|raw_error:disk gone");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_display_skips_raw_error_equal_to_message() {
        let err = ApiError::new(1, "boom").with_source("boom");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.raw_error_string(), "boom");
    }

    #[test]
    fn test_message_of() {
        let err = ApiError::message_of(7, format_args!("user {} missing", 42));
        assert_eq!(err.message(), "user 42 missing");
    }

    #[test]
    fn test_caller_points_at_call_site() {
        let err = ApiError::new(-1, "app error");
        let callers = err.caller();
        assert_eq!(callers.len(), 1);
        assert!(callers[0].starts_with("src/errors/mod.rs:"), "{}", callers[0]);

        let err = err.traced();
        assert_eq!(err.caller().len(), 2);
    }

    #[test]
    fn test_trim_path() {
        assert_eq!(trim_path("/a/b/c/d/e/f.rs", 4), "c/d/e/f.rs");
        assert_eq!(trim_path("d/f.rs", 4), "d/f.rs");
        assert_eq!(trim_path("f.rs", 4), "f.rs");
    }
}
