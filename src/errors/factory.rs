//! Error construction helpers exposed through the context.

use std::fmt;

use axum::http::StatusCode;

use crate::errors::{code, ApiError, BoxError};

/// An error that already knows its code and user-facing message.
pub trait CodedError {
    fn code(&self) -> i32;
    fn message(&self) -> String;
}

impl CodedError for ApiError {
    fn code(&self) -> i32 {
        ApiError::code(self)
    }

    fn message(&self) -> String {
        ApiError::message(self).to_string()
    }
}

/// Builds [`ApiError`]s; obtained from `Context::errors()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorFactory;

impl ErrorFactory {
    /// Registered message for `code`; `err` is kept as the source only.
    #[track_caller]
    pub fn error<E>(&self, code: i32, err: E) -> ApiError
    where
        E: Into<BoxError>,
    {
        ApiError::from_code(code, &[]).with_source(err)
    }

    /// Registered message for `code` filled with `args`. No source is kept;
    /// use [`errorf_with`](Self::errorf_with) to keep one.
    #[track_caller]
    pub fn errorf(&self, code: i32, args: &[&dyn fmt::Display]) -> ApiError {
        ApiError::from_code(code, args)
    }

    /// Like [`errorf`](Self::errorf), keeping `err` as the source so it
    /// shows up as `raw_error` in the response record.
    #[track_caller]
    pub fn errorf_with<E>(&self, code: i32, err: E, args: &[&dyn fmt::Display]) -> ApiError
    where
        E: Into<BoxError>,
    {
        ApiError::from_code(code, args).with_source(err)
    }

    /// Pass an explicit message through unchanged.
    #[track_caller]
    pub fn new_error(&self, code: i32, message: impl Into<String>) -> ApiError {
        ApiError::new(code, message)
    }

    /// Adopt an arbitrary error.
    ///
    /// An `ApiError` is returned as is; anything else is wrapped as
    /// [`code::RAW_ERR_WRAP`].
    #[track_caller]
    pub fn legacy_wrap(&self, err: BoxError) -> ApiError {
        self.legacy_wrap_code(code::RAW_ERR_WRAP, err)
    }

    /// Like [`legacy_wrap`](Self::legacy_wrap) with a caller-chosen code.
    #[track_caller]
    pub fn legacy_wrap_code(&self, code: i32, err: BoxError) -> ApiError {
        match err.downcast::<ApiError>() {
            Ok(api) => *api,
            Err(err) => {
                let text = err.to_string();
                ApiError::from_code(code, &[&text]).with_source(err)
            }
        }
    }

    /// Keep the code and message of an error that carries its own.
    #[track_caller]
    pub fn from_coded(&self, err: &dyn CodedError) -> ApiError {
        ApiError::new(err.code(), err.message())
    }

    /// Map an HTTP status onto an error code.
    #[track_caller]
    pub fn from_status(&self, status: StatusCode) -> ApiError {
        ApiError::new(
            i32::from(status.as_u16()),
            status.canonical_reason().unwrap_or_default(),
        )
    }
}
