//! Pretty-printer for panic backtraces.
//!
//! A raw backtrace is mostly noise: the capture machinery and the panic
//! runtime sit on top, the executor and the connection plumbing at the
//! bottom. [`PrettyStack`] keeps the part between the panic entry point and
//! the outermost frame, puts the frame that panicked first, and decorates
//! every line so the culprit stands out:
//!
//! ```text
//!
//!  panic: called `Option::unwrap()` on a `None` value
//!
//!  -> app::handlers::create_user
//!  ->   ./src/handlers.rs:42:17
//!
//!     seed::handler::AsyncHandler<F>::call::{{closure}}
//!       ./src/handler.rs:98:34
//! ```
//!
//! Input is the text form of [`std::backtrace::Backtrace`]:
//!
//! ```text
//!   12: app::handlers::create_user
//!              at ./src/handlers.rs:42:17
//! ```

use std::io::{self, Write};

/// Symbols that mark the entry into the panic runtime. Everything from the
/// first one of these (scanning from the outermost frame) inwards is dropped.
const PANIC_ENTRY: &[&str] = &[
    "core::panicking::panic",
    "core::panicking::assert_failed",
    "std::panicking::begin_panic",
    "std::panic::panic_any",
    "core::option::unwrap_failed",
    "core::option::expect_failed",
    "core::result::unwrap_failed",
];

#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("not a source location line: `{0}`")]
    SourceLine(String),
    #[error("not a frame line: `{0}`")]
    FrameLine(String),
}

// ── Colors ────────────────────────────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const B_RED: &str = "\x1b[1;31m";
const B_GREEN: &str = "\x1b[1;32m";
const N_YELLOW: &str = "\x1b[33m";
const B_BLUE: &str = "\x1b[1;34m";
const B_MAGENTA: &str = "\x1b[1;35m";
const B_CYAN: &str = "\x1b[1;36m";
const B_WHITE: &str = "\x1b[1;37m";

// ── PrettyStack ───────────────────────────────────────────────────────────────

/// Backtrace decorator. See the module docs for the output shape.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrettyStack {
    color: bool,
}

impl PrettyStack {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Decorates `stack` under a header line showing `payload`.
    pub fn format(&self, stack: &str, payload: &str) -> Result<Vec<u8>, StackError> {
        let mut out = String::new();
        out.push('\n');
        self.paint(&mut out, B_CYAN, " panic: ");
        self.paint(&mut out, B_BLUE, payload);
        out.push_str("\n \n");

        let mut frame: Option<usize> = None;
        for line in user_frames(stack) {
            let trimmed = line.trim();
            if let Some(location) = trimmed.strip_prefix("at ") {
                self.decorate_source_line(&mut out, location, frame.unwrap_or(0))?;
            } else if let Some(symbol) = frame_symbol(trimmed) {
                let num = frame.map_or(0, |n| n + 1);
                frame = Some(num);
                self.decorate_frame_line(&mut out, trimmed, symbol, num)?;
            } else {
                out.push_str("    ");
                out.push_str(trimmed);
                out.push('\n');
            }
        }
        Ok(out.into_bytes())
    }

    /// `module::path::function` → module path, then the function name.
    fn decorate_frame_line(
        &self,
        out: &mut String,
        line: &str,
        symbol: &str,
        num: usize,
    ) -> Result<(), StackError> {
        if symbol.is_empty() {
            return Err(StackError::FrameLine(line.to_owned()));
        }
        let split = symbol.rfind("::").map_or(0, |i| i + 2);
        let (module, function) = symbol.split_at(split);

        let (module_color, function_color) = if num == 0 {
            self.paint(out, B_RED, " -> ");
            (B_MAGENTA, B_RED)
        } else {
            out.push_str("    ");
            (N_YELLOW, B_GREEN)
        };
        self.paint(out, module_color, module);
        self.paint(out, function_color, function);
        out.push('\n');
        Ok(())
    }

    /// `dir/file.rs:line:col` → directory, file name, then `:line:col`.
    fn decorate_source_line(&self, out: &mut String, location: &str, num: usize) -> Result<(), StackError> {
        let mut parts = location.rsplitn(3, ':');
        let (Some(col), Some(line), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(StackError::SourceLine(location.to_owned()));
        };
        if col.parse::<u32>().is_err() || line.parse::<u32>().is_err() {
            return Err(StackError::SourceLine(location.to_owned()));
        }
        let split = path.rfind(['/', '\\']).map_or(0, |i| i + 1);
        let (dir, file) = path.split_at(split);

        let (file_color, line_color) = if num == 0 {
            self.paint(out, B_RED, " ->   ");
            (B_RED, B_MAGENTA)
        } else {
            out.push_str("      ");
            (B_CYAN, B_GREEN)
        };
        self.paint(out, B_WHITE, dir);
        self.paint(out, file_color, file);
        self.paint(out, line_color, &format!(":{line}:{col}"));
        if num == 0 {
            out.push('\n');
        }
        out.push('\n');
        Ok(())
    }

    fn paint(&self, out: &mut String, color: &str, text: &str) {
        if self.color {
            out.push_str(color);
            out.push_str(text);
            out.push_str(RESET);
        } else {
            out.push_str(text);
        }
    }
}

/// Lines between the panic entry point and the outermost frame, in capture
/// order (innermost first). Blank lines are dropped.
///
/// Scans from the end. When a panic-entry frame is found, it is dropped
/// together with its own location lines, and scanning stops. A stack without
/// any panic-entry frame is kept whole. Standard library frames left on top
/// (slice indexing, `RefCell` borrows) are then skipped up to the first frame
/// of application code, unless nothing else remains.
fn user_frames(stack: &str) -> Vec<&str> {
    let lines: Vec<&str> = stack.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut kept: Vec<&str> = Vec::new();

    for line in lines.iter().rev() {
        let trimmed = line.trim();
        let symbol = frame_symbol(trimmed).unwrap_or(trimmed);
        if PANIC_ENTRY.iter().any(|marker| symbol.starts_with(marker)) {
            while kept.last().is_some_and(|l| l.trim_start().starts_with("at ")) {
                kept.pop();
            }
            break;
        }
        kept.push(line);
    }

    kept.reverse();
    let first_app_frame = kept
        .iter()
        .position(|line| frame_symbol(line.trim()).is_some_and(|symbol| !is_library(symbol)));
    match first_app_frame {
        Some(start) => kept.split_off(start),
        None => kept,
    }
}

/// `core`, `alloc` and `std` symbols, including trait impls written
/// `<alloc::vec::Vec<T> as core::ops::Index<I>>::index`.
fn is_library(symbol: &str) -> bool {
    let path = symbol.strip_prefix('<').unwrap_or(symbol);
    ["core::", "alloc::", "std::"].iter().any(|krate| path.starts_with(krate))
}

/// The symbol of a `N: symbol` frame line.
fn frame_symbol(line: &str) -> Option<&str> {
    let (index, symbol) = line.split_once(':')?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(symbol.trim())
}

/// Writes the decorated `stack` to `w`. If the stack cannot be decorated, the
/// raw stack is written unmodified instead so no diagnostic is lost.
pub fn print_pretty_stack(
    w: &mut dyn Write,
    payload: &str,
    stack: &str,
    color: bool,
) -> io::Result<()> {
    match PrettyStack::new(color).format(stack, payload) {
        Ok(out) => w.write_all(&out),
        Err(e) => {
            tracing::debug!("stack decoration failed, writing raw stack: {e}");
            writeln!(w, "panic: {payload}")?;
            w.write_all(stack.as_bytes())
        }
    }?;
    w.flush()
}
