//! Request deadlines.

use std::time::Duration;

use http::StatusCode;
use tokio::time::Instant;
use tracing::debug;

use crate::chain::{BoxFuture, Flow, Middleware, Next};
use crate::context::Context;
use crate::request::Request;
use crate::writer::ResponseWriter;

/// Cancels the context after a timeout and answers `504 Gateway Timeout`.
///
/// Enforcement is cooperative. Downstream units see the deadline through
/// [`Context::done`] and [`Context::err`] and are expected to stop; a unit
/// that ignores it keeps running and the request completes when it returns.
/// At the deadline the `504` is committed and the writer sealed, so anything
/// the handler writes afterwards is dropped.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use seed::{middleware, Context, Request, Response, Router, StatusCode};
///
/// async fn slow(ctx: Context, _req: Request) -> Response {
///     tokio::select! {
///         () = ctx.done() => Response::status(StatusCode::GATEWAY_TIMEOUT),
///         () = tokio::time::sleep(Duration::from_secs(10)) => Response::text("done"),
///     }
/// }
///
/// let mut router = Router::new();
/// router.use_middleware(middleware::timeout(Duration::from_secs(2)));
/// router.get("/slow", slow);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Timeout {
    timeout: Duration,
}

impl Timeout {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Middleware for Timeout {
    fn call(&self, ctx: Context, res: ResponseWriter, req: Request, next: Next) -> BoxFuture<Flow> {
        let deadline = Instant::now() + self.timeout;
        let ctx = ctx.with_deadline(deadline);
        Box::pin(async move {
            let run = next.run(ctx, res.clone(), req);
            tokio::pin!(run);
            tokio::select! {
                // A handler that finishes exactly at the deadline still times out.
                biased;

                () = tokio::time::sleep_until(deadline) => {
                    debug!("request deadline exceeded");
                    res.write_header(StatusCode::GATEWAY_TIMEOUT);
                    res.seal();
                    run.await
                }
                flow = &mut run => flow,
            }
        })
    }
}

/// Timeout middleware. See [`Timeout`].
pub fn timeout(timeout: Duration) -> Timeout {
    Timeout::new(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;

    fn chain(unit: crate::chain::BoxedMiddleware) -> Chain {
        Chain::new(vec![timeout(Duration::from_secs(1)).into_middleware(), unit])
    }

    #[tokio::test(start_paused = true)]
    async fn cooperative_handler_gets_a_504() {
        async fn slow(ctx: Context, res: ResponseWriter, _: Request, _: Next) -> Flow {
            ctx.done().await;
            assert!(ctx.err().is_some());
            res.write_header(StatusCode::OK);
            res.write(b"too late");
            Flow::Halt
        }
        let res = ResponseWriter::new();
        chain(slow.into_middleware()).run(Context::default(), res.clone(), Request::default()).await;

        assert_eq!(res.status(), Some(StatusCode::GATEWAY_TIMEOUT));
        assert_eq!(res.bytes_written(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_handler_is_untouched() {
        async fn fast(ctx: Context, res: ResponseWriter, _: Request, _: Next) -> Flow {
            assert!(ctx.deadline().is_some());
            res.write(b"ok");
            Flow::Halt
        }
        let res = ResponseWriter::new();
        chain(fast.into_middleware()).run(Context::default(), res.clone(), Request::default()).await;

        assert_eq!(res.status(), Some(StatusCode::OK));
        assert_eq!(res.bytes_written(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn handler_ignoring_the_deadline_still_finishes() {
        async fn stubborn(_: Context, res: ResponseWriter, _: Request, _: Next) -> Flow {
            tokio::time::sleep(Duration::from_secs(3)).await;
            res.write(b"ignored");
            Flow::Continue
        }
        let res = ResponseWriter::new();
        let flow = chain(stubborn.into_middleware()).run(Context::default(), res.clone(), Request::default()).await;

        assert_eq!(flow, Flow::Continue);
        assert_eq!(res.status(), Some(StatusCode::GATEWAY_TIMEOUT));
        assert_eq!(res.bytes_written(), 0);
    }
}
