//! Fault boundary: turns a panic inside a future into a value.
//!
//! [`catch`] polls a future under `catch_unwind`. If a poll panics, the
//! future resolves to `Err(HandlerFault)` carrying the payload, the panic
//! location and the backtrace captured at the panic site.
//!
//! # Capturing the backtrace
//!
//! By the time `catch_unwind` returns, the stack has already unwound. The
//! backtrace therefore has to be taken inside the panic hook. [`catch`]
//! installs (once, process-wide) a hook that, while a boundary is polling on
//! the current thread, captures the backtrace into a thread-local slot and
//! stays quiet. Outside a boundary it defers to the previously installed hook,
//! so ordinary panics still print as usual.
//!
//! # The abort sentinel
//!
//! [`abort`] panics with [`AbortHandler`]. It means "drop this connection
//! without answering". The hook never prints it, and the recovery middleware
//! re-raises it with [`HandlerFault::resume`] instead of answering `500`.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context as TaskContext, Poll};

/// Sentinel panic payload: abort the connection silently.
#[derive(Clone, Copy, Debug)]
pub struct AbortHandler;

impl fmt::Display for AbortHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("seed: abort handler")
    }
}

/// Aborts the current request. The connection is dropped without a response
/// and nothing is logged.
pub fn abort() -> ! {
    panic::panic_any(AbortHandler)
}

/// A panic caught by a fault boundary.
pub struct HandlerFault {
    payload: Box<dyn Any + Send>,
    location: Option<String>,
    stack: Option<String>,
}

impl HandlerFault {
    /// `true` for the [`AbortHandler`] sentinel.
    pub fn is_abort(&self) -> bool {
        self.payload.is::<AbortHandler>()
    }

    /// Best-effort rendering of the panic payload.
    pub fn message(&self) -> String {
        payload_message(self.payload.as_ref())
    }

    /// `file:line:col` of the panic, when the hook saw it.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Backtrace text captured at the panic site, when the hook saw it.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    pub fn payload(&self) -> &(dyn Any + Send) {
        self.payload.as_ref()
    }

    /// Continues unwinding with the original payload. The panic hook does not
    /// run again.
    pub fn resume(self) -> ! {
        panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFault")
            .field("message", &self.message())
            .field("location", &self.location)
            .field("abort", &self.is_abort())
            .finish_non_exhaustive()
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(e) = payload.downcast_ref::<Box<dyn std::error::Error + Send + Sync>>() {
        e.to_string()
    } else if let Some(a) = payload.downcast_ref::<AbortHandler>() {
        a.to_string()
    } else {
        "Box<dyn Any>".to_owned()
    }
}

// ── Boundary ─────────────────────────────────────────────────────────────────

/// Runs `fut` inside a fault boundary.
pub fn catch<F: Future>(fut: F) -> CatchFault<F> {
    install_hook();
    CatchFault { inner: Box::pin(fut) }
}

/// Future returned by [`catch`].
pub struct CatchFault<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for CatchFault<F> {
    type Output = Result<F::Output, HandlerFault>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let _capturing = Capturing::enter();
        let inner = self.inner.as_mut();
        match panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(out)) => Poll::Ready(Ok(out)),
            Err(payload) => {
                let captured = CAPTURED.with(|slot| slot.borrow_mut().take());
                let (location, stack) = captured.unzip();
                Poll::Ready(Err(HandlerFault { payload, location: location.flatten(), stack }))
            }
        }
    }
}

// ── Panic hook ───────────────────────────────────────────────────────────────

thread_local! {
    /// Number of boundaries currently polling on this thread.
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    /// (location, backtrace) of the last panic seen inside a boundary.
    static CAPTURED: RefCell<Option<(Option<String>, String)>> = const { RefCell::new(None) };
}

struct Capturing;

impl Capturing {
    fn enter() -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        Capturing
    }
}

impl Drop for Capturing {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get() - 1));
    }
}

fn install_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().is::<AbortHandler>() {
                return;
            }
            if DEPTH.with(Cell::get) > 0 {
                let location = info.location().map(ToString::to_string);
                let stack = Backtrace::force_capture().to_string();
                CAPTURED.with(|slot| *slot.borrow_mut() = Some((location, stack)));
                return;
            }
            previous(info);
        }));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_normal_output() {
        let out = catch(async { 7 }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn converts_panics_into_faults() {
        let fault = catch(async { panic!("boom {}", 42); }).await.unwrap_err();
        assert!(!fault.is_abort());
        assert_eq!(fault.message(), "boom 42");
        assert!(fault.location().unwrap().contains("fault.rs"));
        assert!(fault.stack().is_some());
    }

    #[tokio::test]
    async fn catches_panics_after_a_suspension_point() {
        let fault = catch(async {
            tokio::task::yield_now().await;
            None::<u8>.expect("value present")
        })
        .await
        .unwrap_err();
        assert_eq!(fault.message(), "value present");
    }

    #[tokio::test]
    async fn recognizes_the_abort_sentinel() {
        let fault = catch(async { abort(); }).await.unwrap_err();
        assert!(fault.is_abort());
    }

    #[tokio::test]
    async fn resume_keeps_the_original_payload() {
        let inner = catch(async { abort(); });
        let outer = catch(async move {
            if let Err(fault) = inner.await {
                fault.resume();
            }
        });
        let fault: HandlerFault = outer.await.unwrap_err();
        assert!(fault.is_abort());
    }

    #[test]
    fn renders_common_payloads() {
        assert_eq!(payload_message(&"static"), "static");
        assert_eq!(payload_message(&String::from("owned")), "owned");
        assert_eq!(payload_message(&5_u32), "Box<dyn Any>");
    }
}
