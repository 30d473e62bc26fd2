//! Built-in middleware.
//!
//! Every unit here is an ordinary [`Middleware`]: pass it to
//! [`Router::use_middleware`](crate::Router::use_middleware), to a group, or
//! to a single route with [`Router::handle_with`](crate::Router::handle_with).
//!
//! Order matters. A typical stack:
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use seed::{middleware, Router};
//!
//! let mut router = Router::new();
//! router
//!     .use_middleware(middleware::real_ip)
//!     .use_middleware(middleware::logger())
//!     .use_middleware(middleware::recoverer())
//!     .use_middleware(middleware::timeout(Duration::from_secs(30)))
//!     .use_middleware(middleware::cors);
//! ```

mod cors;
mod logger;
mod real_ip;
mod recover;
mod timeout;

pub use cors::{cors, CORS_HEADERS};
pub use logger::{
    log_entry, logger, with_log_entry, DefaultLogFormatter, LogEntry, LogFormatter, RequestLogger,
};
pub use real_ip::real_ip;
pub use recover::{recoverer, Recoverer};
pub use timeout::{timeout, Timeout};

use crate::chain::{BoxFuture, Flow, Middleware, Next};
use crate::context::Context;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::writer::ResponseWriter;

/// Adapts a plain handler into a middleware unit: the handler's response is
/// written, then the chain continues.
///
/// Useful for units that only ever add something to the response, such as a
/// fixed header set or a banner, without caring about `next`.
pub fn from_handler(handler: impl Handler) -> impl Middleware {
    HandlerUnit(handler.into_boxed_handler())
}

struct HandlerUnit(BoxedHandler);

impl Middleware for HandlerUnit {
    fn call(&self, ctx: Context, res: ResponseWriter, req: Request, next: Next) -> BoxFuture<Flow> {
        let fut = self.0.call(ctx.clone(), req.clone());
        Box::pin(async move {
            fut.await.write_to(&res);
            next.run(ctx, res, req).await
        })
    }
}
