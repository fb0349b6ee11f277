//! Route path handling.
//!
//! # Responsibilities
//! - Join a root prefix and a route path into one clean path
//! - Translate `:name` / `*rest` segments into axum's `{name}` / `{*rest}`
//! - Reject patterns axum would refuse or that clash with an earlier route
//!
//! # Design Decisions
//! - Matching itself is left to axum; this module only normalizes patterns
//! - Two patterns that differ only in parameter names are a conflict
//! - A parameter and a catch-all at the same depth, under the same prefix, are a conflict

use std::collections::HashSet;

use crate::http::route::RouteError;

/// Join `root` and `path` the way `path.Join` does: duplicate slashes
/// collapse, `.` disappears and `..` pops a segment. Always absolute.
pub fn join(root: &str, path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in root.split('/').chain(path.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Axum form of a route pattern.
pub(crate) fn to_axum(path: &str) -> Result<String, RouteError> {
    let invalid = |reason: &str| RouteError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let segments: Vec<&str> = path.split('/').skip(1).collect();
    let mut names = HashSet::new();
    let mut out = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let param = if let Some(name) = segment.strip_prefix(':') {
            Some((name, false))
        } else if let Some(name) = segment.strip_prefix('*') {
            Some((name, true))
        } else if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            match inner.strip_prefix('*') {
                Some(name) => Some((name, true)),
                None => Some((inner, false)),
            }
        } else {
            None
        };

        match param {
            Some((name, catch_all)) => {
                if name.is_empty() {
                    return Err(invalid("empty parameter name"));
                }
                if !names.insert(name) {
                    return Err(invalid("duplicate parameter name"));
                }
                if catch_all && i + 1 != segments.len() {
                    return Err(invalid("catch-all must be the last segment"));
                }
                out.push(if catch_all {
                    format!("{{*{}}}", name)
                } else {
                    format!("{{{}}}", name)
                });
            }
            None => {
                if segment.contains(['{', '}']) {
                    return Err(invalid("unbalanced braces"));
                }
                out.push((*segment).to_string());
            }
        }
    }
    Ok(format!("/{}", out.join("/")))
}

/// Pattern with parameter names erased; equal shapes match the same requests.
pub(crate) fn shape(axum_path: &str) -> String {
    axum_path
        .split('/')
        .map(|segment| {
            if segment.starts_with("{*") {
                "{*}"
            } else if segment.starts_with('{') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// True when axum would refuse to register both patterns.
pub(crate) fn conflicts(a: &str, b: &str) -> bool {
    let a = shape(a);
    let b = shape(b);
    if a == b {
        return true;
    }
    // First differing segment decides
    match a.split('/').zip(b.split('/')).find(|(x, y)| x != y) {
        Some((x, y)) => matches!((x, y), ("{}", "{*}") | ("{*}", "{}")),
        None => false,
    }
}
