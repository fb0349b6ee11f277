use axum::http::HeaderMap;

use crate::context::{ids, Context, Scope};

/// Context for work that is not tied to an HTTP request: background jobs,
/// startup tasks, tests.
#[derive(Debug, Clone)]
pub struct BackgroundContext {
    scope: Scope,
    headers: HeaderMap,
}

impl BackgroundContext {
    /// New context with a fresh request id.
    pub fn new() -> Self {
        Self::with_request_id(ids::new_request_id())
    }

    /// New context continuing an existing request id, e.g. one read from a queue message.
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            scope: Scope::new(request_id.into()),
            headers: HeaderMap::new(),
        }
    }
}

impl Default for BackgroundContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Context for BackgroundContext {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    fn with_scope(&self, scope: Scope) -> Self {
        Self {
            scope,
            headers: self.headers.clone(),
        }
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}
