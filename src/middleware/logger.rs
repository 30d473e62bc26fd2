//! Per-request access logging.
//!
//! [`RequestLogger`] asks its [`LogFormatter`] for a [`LogEntry`], attaches
//! the entry to the [`Context`], runs the rest of the chain and finally
//! reports status, bytes and elapsed time to the entry.
//!
//! Put the logger before [`Recoverer`](super::Recoverer): the recoverer
//! hands panic diagnostics to the entry it finds in the context, and the
//! logger then records the `500` it wrote.
//!
//! ```rust,no_run
//! use seed::{middleware, Router};
//!
//! let mut router = Router::new();
//! router
//!     .use_middleware(middleware::logger())
//!     .use_middleware(middleware::recoverer());
//! ```

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{HeaderMap, StatusCode};
use tracing::{error, info, warn};

use crate::chain::{BoxFuture, Flow, Middleware, Next};
use crate::context::Context;
use crate::request::Request;
use crate::stack;
use crate::writer::ResponseWriter;

/// Starts a [`LogEntry`] for each request.
pub trait LogFormatter: Send + Sync + 'static {
    fn new_log_entry(&self, req: &Request) -> Arc<dyn LogEntry>;
}

/// Records the outcome of one request.
pub trait LogEntry: Send + Sync + 'static {
    /// Called once the chain returned.
    fn write(&self, status: StatusCode, bytes: usize, headers: &HeaderMap, elapsed: Duration);

    /// Called by the recoverer when the chain panicked.
    fn panic(&self, payload: &str, stack: &str);
}

#[derive(Clone)]
struct EntrySlot(Arc<dyn LogEntry>);

/// The log entry attached to this request, if a logger runs upstream.
pub fn log_entry(ctx: &Context) -> Option<Arc<dyn LogEntry>> {
    ctx.get::<EntrySlot>().map(|slot| Arc::clone(&slot.0))
}

/// Attaches `entry` to the context handed downstream.
pub fn with_log_entry(ctx: &mut Context, entry: Arc<dyn LogEntry>) {
    ctx.insert(EntrySlot(entry));
}

// ── Middleware ────────────────────────────────────────────────────────────────

/// Logging middleware with a custom formatter.
pub struct RequestLogger<F> {
    formatter: Arc<F>,
}

impl<F: LogFormatter> RequestLogger<F> {
    pub fn new(formatter: F) -> Self {
        Self { formatter: Arc::new(formatter) }
    }
}

impl<F: LogFormatter> Middleware for RequestLogger<F> {
    fn call(&self, mut ctx: Context, res: ResponseWriter, req: Request, next: Next) -> BoxFuture<Flow> {
        let entry = self.formatter.new_log_entry(&req);
        with_log_entry(&mut ctx, Arc::clone(&entry));
        Box::pin(async move {
            let started = Instant::now();
            let flow = next.run(ctx, res.clone(), req).await;
            let status = res.status().unwrap_or(StatusCode::OK);
            entry.write(status, res.bytes_written(), &res.headers(), started.elapsed());
            flow
        })
    }
}

/// Logging middleware with the [`DefaultLogFormatter`].
pub fn logger() -> RequestLogger<DefaultLogFormatter> {
    RequestLogger::new(DefaultLogFormatter::default())
}

// ── Default formatter ─────────────────────────────────────────────────────────

/// Emits one `tracing` event per request, at `info` for 1xx–3xx, `warn` for
/// 4xx and `error` for 5xx. Panics are pretty-printed to standard error.
#[derive(Clone, Copy, Debug)]
pub struct DefaultLogFormatter {
    color: bool,
}

impl DefaultLogFormatter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl Default for DefaultLogFormatter {
    fn default() -> Self {
        Self { color: io::stderr().is_terminal() }
    }
}

impl LogFormatter for DefaultLogFormatter {
    fn new_log_entry(&self, req: &Request) -> Arc<dyn LogEntry> {
        Arc::new(DefaultLogEntry {
            method: req.method().to_string(),
            uri: req.uri().to_string(),
            version: req.version(),
            from: req.client_ip().map(|ip| ip.to_string()).unwrap_or_default(),
            color: self.color,
        })
    }
}

struct DefaultLogEntry {
    method: String,
    uri: String,
    version: http::Version,
    from: String,
    color: bool,
}

impl LogEntry for DefaultLogEntry {
    fn write(&self, status: StatusCode, bytes: usize, _headers: &HeaderMap, elapsed: Duration) {
        let (method, uri, from) = (&self.method, &self.uri, &self.from);
        let (code, version) = (status.as_u16(), self.version);
        match code {
            500.. => error!(method, uri, ?version, from, status = code, bytes, ?elapsed, "request"),
            400.. => warn!(method, uri, ?version, from, status = code, bytes, ?elapsed, "request"),
            _ => info!(method, uri, ?version, from, status = code, bytes, ?elapsed, "request"),
        }
    }

    fn panic(&self, payload: &str, stack: &str) {
        error!(method = %self.method, uri = %self.uri, panic = payload, "handler panicked");
        if let Err(e) = stack::print_pretty_stack(&mut io::stderr().lock(), payload, stack, self.color) {
            error!("writing panic trace failed: {e}");
        }
    }
}
