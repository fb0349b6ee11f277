//! Per-context identity, cancellation and typed values.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::context::ids;

/// State every context carries, independent of any request.
///
/// Derived scopes get a child cancellation token: cancelling a parent
/// cancels its children, never the other way round.
#[derive(Clone, Debug)]
pub struct Scope {
    pub(crate) request_id: String,
    pub(crate) span_id: String,
    pub(crate) token: CancellationToken,
    pub(crate) deadline: Option<Instant>,
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Scope {
    pub(crate) fn new(request_id: String) -> Self {
        Self {
            request_id,
            span_id: String::new(),
            token: CancellationToken::new(),
            deadline: None,
            values: HashMap::new(),
        }
    }

    pub(crate) fn derive(&self) -> Self {
        Self {
            token: self.token.child_token(),
            ..self.clone()
        }
    }

    pub(crate) fn sub(&self, suffix: &str) -> Self {
        Self {
            request_id: ids::sub_id(&self.request_id, suffix),
            ..self.derive()
        }
    }

    pub(crate) fn with_span_id(&self, span_id: String) -> Self {
        Self {
            span_id,
            ..self.derive()
        }
    }

    /// Move the deadline forward to `now + timeout` unless an earlier one is set.
    pub(crate) fn shorten_deadline(&mut self, timeout: Duration) {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(current) if current < candidate => current,
            _ => candidate,
        });
    }

    pub(crate) fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub(crate) async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    pub(crate) fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub(crate) fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.values
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }
}
