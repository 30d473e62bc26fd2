//! Request-scoped context.
//!
//! A [`Context`] travels down the middleware chain next to the request. It
//! carries the path parameters the router extracted, an optional deadline
//! (see [`middleware::timeout`](crate::middleware::timeout)) and a type map
//! for values that middleware wants to hand to later units.
//!
//! Cloning is cheap. A unit that wants downstream units to see a new value
//! inserts it into its own copy and passes that copy to `next.run(..)`.

use std::fmt;
use std::sync::Arc;

use http::Extensions;
use tokio::time::Instant;

/// Path parameters extracted by the router, in pattern order.
///
/// For a route `/users/{id}`, a request to `/users/42` yields `id = "42"`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Why a context is done.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ContextError {
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// The per-request context handed to every middleware unit and handler.
#[derive(Clone, Default)]
pub struct Context {
    params: Arc<Params>,
    deadline: Option<Instant>,
    extensions: Extensions,
}

impl Context {
    pub fn new(params: Params) -> Self {
        Self { params: Arc::new(params), deadline: None, extensions: Extensions::new() }
    }

    /// Returns a named path parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    // ── Cancellation ─────────────────────────────────────────────────────────

    /// Derives a context that is done at `deadline`, or earlier if this
    /// context already has a sooner deadline.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self { deadline: Some(deadline), ..self.clone() }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Some` once the context is done. Handlers doing long work should check
    /// this (or await [`done`](Self::done)) and return early.
    pub fn err(&self) -> Option<ContextError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves when the context is done. Never resolves without a deadline.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    // ── Request-scoped values ────────────────────────────────────────────────

    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions.insert(value)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("params", &self.params)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
