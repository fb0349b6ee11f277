//! Well-known error codes.
//!
//! Each code has a default message template registered under the
//! `default` language; `{}` placeholders are filled positionally.

/// Generic failure used when a handler error carries no code of its own.
pub const INTERNAL: i32 = -1;

/// Request body decode error. Template: `request body decode error. err: {}`
pub const JSON_DECODE: i32 = 1000;

/// Mapper error. Template: `mapper error. action: {}, err: {}`
pub const MAPPER_ACTION: i32 = 1002;

/// File not found. Template: `file not found. file name: {}`
pub const FILE_NOT_FOUND: i32 = 1003;

/// Raw error wrap. Template: `raw error wrap: {}`
pub const RAW_ERR_WRAP: i32 = 1004;

/// Login required. Template: `login required. err: {}`
pub const LOGIN_REQUIRED: i32 = 1005;

pub(crate) const DEFAULT_MESSAGES: &[(i32, &str)] = &[
    (JSON_DECODE, "request body decode error. err: {}"),
    (MAPPER_ACTION, "mapper error. action: {}, err: {}"),
    (FILE_NOT_FOUND, "file not found. file name: {}"),
    (RAW_ERR_WRAP, "raw error wrap: {}"),
    (LOGIN_REQUIRED, "login required. err: {}"),
];
