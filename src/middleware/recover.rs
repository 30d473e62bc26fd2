//! Panic recovery.
//!
//! [`Recoverer`] runs the rest of the chain inside a fault boundary. When a
//! unit panics, it logs the panic and a pretty backtrace, answers
//! `500 Internal Server Error`, and halts. The server keeps serving.
//!
//! Two things are not recovered:
//!
//! - The [`AbortHandler`](crate::fault::AbortHandler) sentinel is re-raised
//!   untouched and never logged, so the connection is dropped without a reply.
//! - A response that some unit already committed keeps its status: the `500`
//!   is a no-op then. Register the recoverer before anything that writes.
//!
//! When a [`LogEntry`](super::LogEntry) is attached to the context (a
//! [`logger`](super::logger) runs upstream), the diagnostics go to the entry.
//! Otherwise the recoverer pretty-prints them to its own sink, standard error
//! by default.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use http::StatusCode;
use parking_lot::Mutex;
use tracing::error;

use crate::chain::{BoxFuture, Flow, Middleware, Next};
use crate::context::Context;
use crate::fault::{self, HandlerFault};
use crate::request::Request;
use crate::stack;
use crate::writer::ResponseWriter;

use super::logger::log_entry;

type ErrorSink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Panic-recovery middleware.
///
/// ```rust
/// use seed::middleware::Recoverer;
///
/// // Default: pretty traces on standard error, colored on a terminal.
/// let recoverer = Recoverer::new();
///
/// // Custom sink, no color.
/// let recoverer = Recoverer::new().writer(std::io::sink()).color(false);
/// ```
#[derive(Clone)]
pub struct Recoverer {
    sink: ErrorSink,
    color: bool,
}

impl Recoverer {
    pub fn new() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(io::stderr()))),
            color: io::stderr().is_terminal(),
        }
    }

    /// Where panic traces go when no log entry is attached.
    pub fn writer(mut self, w: impl Write + Send + 'static) -> Self {
        self.sink = Arc::new(Mutex::new(Box::new(w)));
        self
    }

    pub fn color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn report(&self, ctx: &Context, fault: &HandlerFault) {
        let payload = fault.message();
        let stack = fault.stack().unwrap_or_default();

        if let Some(entry) = log_entry(ctx) {
            entry.panic(&payload, stack);
            return;
        }

        error!(panic = %payload, location = fault.location().unwrap_or("unknown"), "recovered from panic");
        let mut sink = self.sink.lock();
        if let Err(e) = stack::print_pretty_stack(&mut **sink, &payload, stack, self.color) {
            error!("writing panic trace failed: {e}");
        }
    }
}

impl Default for Recoverer {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Recoverer {
    fn call(&self, ctx: Context, res: ResponseWriter, req: Request, next: Next) -> BoxFuture<Flow> {
        let this = self.clone();
        Box::pin(async move {
            match fault::catch(next.run(ctx.clone(), res.clone(), req)).await {
                Ok(flow) => flow,
                Err(fault) if fault.is_abort() => fault.resume(),
                Err(fault) => {
                    this.report(&ctx, &fault);
                    res.write_header(StatusCode::INTERNAL_SERVER_ERROR);
                    Flow::Halt
                }
            }
        })
    }
}

/// Recovery middleware with default settings.
pub fn recoverer() -> Recoverer {
    Recoverer::new()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::HeaderMap;

    use super::*;
    use crate::chain::Chain;
    use crate::middleware::logger::{with_log_entry, LogEntry};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    async fn explode(_: Context, _: ResponseWriter, _: Request, _: Next) -> Flow {
        panic!("handler exploded");
    }

    fn chain_with(recoverer: Recoverer, unit: crate::chain::BoxedMiddleware) -> Chain {
        Chain::new(vec![recoverer.into_middleware(), unit])
    }

    #[tokio::test]
    async fn panic_becomes_a_500_and_a_trace() {
        let buf = SharedBuf::default();
        let res = ResponseWriter::new();
        let chain = chain_with(Recoverer::new().writer(buf.clone()).color(false), explode.into_middleware());

        let flow = chain.run(Context::default(), res.clone(), Request::default()).await;

        assert_eq!(flow, Flow::Halt);
        assert_eq!(res.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(buf.text().contains(" panic: handler exploded"));
    }

    #[tokio::test]
    async fn normal_completion_is_untouched() {
        async fn ok(_: Context, res: ResponseWriter, _: Request, _: Next) -> Flow {
            res.write_header(StatusCode::CREATED);
            Flow::Continue
        }
        let buf = SharedBuf::default();
        let res = ResponseWriter::new();
        let chain = chain_with(Recoverer::new().writer(buf.clone()), ok.into_middleware());

        let flow = chain.run(Context::default(), res.clone(), Request::default()).await;

        assert_eq!(flow, Flow::Continue);
        assert_eq!(res.status(), Some(StatusCode::CREATED));
        assert!(buf.text().is_empty());
    }

    #[tokio::test]
    async fn committed_status_survives_a_late_panic() {
        async fn write_then_explode(_: Context, res: ResponseWriter, _: Request, _: Next) -> Flow {
            res.write(b"partial");
            panic!("too late");
        }
        let res = ResponseWriter::new();
        let chain = chain_with(Recoverer::new().writer(io::sink()), write_then_explode.into_middleware());

        chain.run(Context::default(), res.clone(), Request::default()).await;

        assert_eq!(res.status(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn abort_sentinel_is_reraised_unlogged() {
        async fn hang_up(_: Context, _: ResponseWriter, _: Request, _: Next) -> Flow {
            fault::abort();
        }
        let buf = SharedBuf::default();
        let res = ResponseWriter::new();
        let chain = chain_with(Recoverer::new().writer(buf.clone()), hang_up.into_middleware());

        let outcome = fault::catch(chain.run(Context::default(), res.clone(), Request::default())).await;

        assert!(outcome.unwrap_err().is_abort());
        assert!(!res.is_committed());
        assert!(buf.text().is_empty());
    }

    #[tokio::test]
    async fn diagnostics_go_to_the_attached_log_entry() {
        #[derive(Default)]
        struct Entry(Mutex<Vec<String>>);
        impl LogEntry for Arc<Entry> {
            fn write(&self, _: StatusCode, _: usize, _: &HeaderMap, _: Duration) {}
            fn panic(&self, payload: &str, _: &str) {
                self.0.lock().push(payload.to_owned());
            }
        }

        let entry = Arc::new(Entry::default());
        let mut ctx = Context::default();
        with_log_entry(&mut ctx, Arc::new(Arc::clone(&entry)));

        let buf = SharedBuf::default();
        let res = ResponseWriter::new();
        let chain = chain_with(Recoverer::new().writer(buf.clone()), explode.into_middleware());
        chain.run(ctx, res.clone(), Request::default()).await;

        assert_eq!(*entry.0.lock(), vec!["handler exploded".to_owned()]);
        assert!(buf.text().is_empty());
        assert_eq!(res.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
