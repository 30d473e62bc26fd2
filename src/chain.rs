//! Middleware units and the chain that runs them.
//!
//! A chain is an ordered, immutable list of units. Running position `i`
//! calls unit `i` with a [`Next`] bound to position `i + 1`. The unit decides
//! whether the rest of the chain runs at all: calling `next.run(..)`
//! continues, returning without calling it short-circuits. That is how auth
//! checks, preflight answers and fatal errors stop a request.
//!
//! ```text
//! chain.run(ctx, res, req)
//!   └─ unit 0 ── next.run ─▶ unit 1 ── next.run ─▶ … ─▶ terminal adapter (Halt)
//!                     │
//!                     └─ returns Halt without calling next → units 2.. never run
//! ```
//!
//! Running past the end, or an empty chain, returns [`Flow::Halt`] and touches
//! nothing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::request::Request;
use crate::writer::ResponseWriter;

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` let tokio move the future across worker threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// The continue signal a unit hands back up the chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
    Continue,
    Halt,
}

impl Flow {
    pub fn is_continue(self) -> bool {
        self == Self::Continue
    }
}

impl From<bool> for Flow {
    fn from(cont: bool) -> Self {
        if cont { Self::Continue } else { Self::Halt }
    }
}

impl From<Flow> for bool {
    fn from(flow: Flow) -> bool {
        flow.is_continue()
    }
}

// ── Middleware ────────────────────────────────────────────────────────────────

/// One unit of a chain.
///
/// Implemented automatically for any function with the signature
///
/// ```text
/// async fn name(ctx: Context, res: ResponseWriter, req: Request, next: Next) -> Flow
/// ```
///
/// Implement it by hand for middleware that carries configuration, such as
/// [`Recoverer`](crate::middleware::Recoverer).
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, ctx: Context, res: ResponseWriter, req: Request, next: Next) -> BoxFuture<Flow>;

    /// Erases the concrete type so units of different types share one chain.
    fn into_middleware(self) -> BoxedMiddleware
    where
        Self: Sized,
    {
        Arc::new(self)
    }
}

/// A type-erased unit shared by every route whose chain contains it.
pub type BoxedMiddleware = Arc<dyn Middleware>;

impl<F, Fut> Middleware for F
where
    F: Fn(Context, ResponseWriter, Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Flow> + Send + 'static,
{
    fn call(&self, ctx: Context, res: ResponseWriter, req: Request, next: Next) -> BoxFuture<Flow> {
        Box::pin((self)(ctx, res, req, next))
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An ordered, immutable sequence of units.
#[derive(Clone, Default)]
pub struct Chain {
    units: Arc<[BoxedMiddleware]>,
}

impl Chain {
    pub fn new(units: Vec<BoxedMiddleware>) -> Self {
        Self { units: units.into() }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Runs the chain from its first unit.
    pub fn run(&self, ctx: Context, res: ResponseWriter, req: Request) -> BoxFuture<Flow> {
        Next { units: Arc::clone(&self.units), pos: 0 }.run(ctx, res, req)
    }
}

impl FromIterator<BoxedMiddleware> for Chain {
    fn from_iter<I: IntoIterator<Item = BoxedMiddleware>>(iter: I) -> Self {
        Self { units: iter.into_iter().collect() }
    }
}

/// The remainder of a chain, handed to the unit currently running.
pub struct Next {
    units: Arc<[BoxedMiddleware]>,
    pos: usize,
}

impl Next {
    /// Runs the next unit. Past the end this is a no-op returning `Halt`.
    pub fn run(self, ctx: Context, res: ResponseWriter, req: Request) -> BoxFuture<Flow> {
        match self.units.get(self.pos).cloned() {
            Some(unit) => {
                let next = Next { units: self.units, pos: self.pos + 1 };
                unit.call(ctx, res, req, next)
            }
            None => Box::pin(async { Flow::Halt }),
        }
    }

    /// Units left after the one currently running.
    pub fn remaining(&self) -> usize {
        self.units.len().saturating_sub(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use parking_lot::Mutex;

    use super::*;

    fn recording_unit(log: Arc<Mutex<Vec<usize>>>, id: usize, cont: bool) -> BoxedMiddleware {
        (move |ctx: Context, res: ResponseWriter, req: Request, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(id);
                if cont { next.run(ctx, res, req).await } else { Flow::Halt }
            }
        })
        .into_middleware()
    }

    #[tokio::test]
    async fn empty_chain_halts_without_writing() {
        let res = ResponseWriter::new();
        let flow = Chain::default().run(Context::default(), res.clone(), Request::default()).await;
        assert_eq!(flow, Flow::Halt);
        assert!(!res.is_committed());
        assert!(res.headers().is_empty());
    }

    #[tokio::test]
    async fn halting_unit_stops_the_chain() {
        for n in 1..6 {
            for k in 0..n {
                let log = Arc::new(Mutex::new(Vec::new()));
                let chain: Chain = (0..n)
                    .map(|i| recording_unit(Arc::clone(&log), i, i < k))
                    .collect();

                chain.run(Context::default(), ResponseWriter::new(), Request::default()).await;

                let ran = log.lock().clone();
                assert_eq!(ran, (0..=k).collect::<Vec<_>>(), "n={n} k={k}");
            }
        }
    }

    #[tokio::test]
    async fn continuing_past_the_end_halts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = Chain::new(vec![recording_unit(Arc::clone(&log), 0, true)]);
        let flow = chain.run(Context::default(), ResponseWriter::new(), Request::default()).await;
        assert_eq!(flow, Flow::Halt);
        assert_eq!(*log.lock(), vec![0]);
    }

    #[tokio::test]
    async fn upstream_writes_are_visible_downstream() {
        async fn mark(ctx: Context, res: ResponseWriter, req: Request, next: Next) -> Flow {
            res.write_header(StatusCode::ACCEPTED);
            next.run(ctx, res, req).await
        }
        async fn check(_: Context, res: ResponseWriter, _: Request, next: Next) -> Flow {
            assert_eq!(res.status(), Some(StatusCode::ACCEPTED));
            assert_eq!(next.remaining(), 0);
            Flow::Continue
        }

        let chain = Chain::new(vec![mark.into_middleware(), check.into_middleware()]);
        let flow = chain.run(Context::default(), ResponseWriter::new(), Request::default()).await;
        assert_eq!(flow, Flow::Continue);
    }

    #[test]
    fn flow_converts_from_bool() {
        assert_eq!(Flow::from(true), Flow::Continue);
        assert_eq!(Flow::from(false), Flow::Halt);
        assert!(bool::from(Flow::Continue));
    }
}
