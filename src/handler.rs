//! Business handlers and their place at the end of a route chain.
//!
//! Every route ends in exactly one handler: an async fn taking the request
//! [`Context`] and [`Request`] and returning anything [`IntoResponse`].
//! Routes with different handler types share one table, so each handler is
//! boxed behind [`ErasedHandler`] when it is registered:
//!
//! ```text
//! router.get("/users/{id}", show_user)
//!   show_user.into_boxed_handler()     Arc<AsyncHandler<show_user>>
//!   Terminal(boxed)                    appended after the scope's middleware
//!
//! per request
//!   Terminal::call -> boxed.call(ctx, req) -> BoxFuture<Response>
//!   response.write_to(&writer), then Flow::Halt
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::chain::{BoxFuture, Flow, Middleware, Next};
use crate::context::Context;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::writer::ResponseWriter;

/// Object-safe face of a handler. Public only because [`Handler`] names it.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: Context, req: Request) -> BoxFuture<Response>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Anything the router accepts as the last step of a route.
///
/// Satisfied by every `Fn(Context, Request) -> impl Future<Output = impl IntoResponse>`,
/// async fns and closures alike. It cannot be implemented by hand.
pub trait Handler: sealed::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod sealed {
    pub trait Sealed {}
}

impl<F, Fut, Out> sealed::Sealed for F
where
    F: Fn(Context, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoResponse + Send + 'static,
{
}

impl<F, Fut, Out> Handler for F
where
    F: Fn(Context, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(AsyncHandler(self))
    }
}

struct AsyncHandler<F>(F);

impl<F, Fut, Out> ErasedHandler for AsyncHandler<F>
where
    F: Fn(Context, Request) -> Fut + Send + Sync,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoResponse + Send + 'static,
{
    fn call(&self, ctx: Context, req: Request) -> BoxFuture<Response> {
        let pending = (self.0)(ctx, req);
        Box::pin(async move { pending.await.into_response() })
    }
}

/// Last unit of every route chain. Runs the handler, writes what it returned,
/// and halts.
pub(crate) struct Terminal(pub(crate) BoxedHandler);

impl Middleware for Terminal {
    fn call(&self, ctx: Context, res: ResponseWriter, req: Request, _next: Next) -> BoxFuture<Flow> {
        let pending = self.0.call(ctx, req);
        Box::pin(async move {
            pending.await.write_to(&res);
            Flow::Halt
        })
    }
}
