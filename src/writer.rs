//! The response sink shared by every unit of one request's chain.
//!
//! Handlers usually never touch this directly: they return a
//! [`Response`](crate::Response) and the terminal adapter writes it here.
//! Middleware uses it to add headers before calling `next`, or to inspect the
//! outcome afterwards (status, bytes written).
//!
//! # Write rules
//!
//! - The first status write wins. Later [`write_header`](ResponseWriter::write_header)
//!   calls are dropped.
//! - Writing body bytes commits `200 OK` if no status was written yet.
//! - Header edits after the status is committed are dropped.
//! - Once [sealed](ResponseWriter::seal) (a timeout already answered), every
//!   write is dropped.
//!
//! Nothing reaches the socket until the chain returns; the writer buffers.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use parking_lot::Mutex;
use tracing::debug;

#[derive(Default)]
struct Sink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    sealed: bool,
}

/// Handle to one request's response. Clones share the same sink.
#[derive(Clone, Default)]
pub struct ResponseWriter {
    inner: Arc<Mutex<Sink>>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits `status`. Returns `false` when a status was already committed
    /// or the writer is sealed, in which case nothing changes.
    pub fn write_header(&self, status: StatusCode) -> bool {
        let mut sink = self.inner.lock();
        if sink.sealed || sink.status.is_some() {
            debug!(%status, committed = ?sink.status, "superfluous status write dropped");
            return false;
        }
        sink.status = Some(status);
        true
    }

    /// Appends body bytes, committing `200 OK` first if needed. Returns the
    /// number of bytes accepted.
    pub fn write(&self, bytes: &[u8]) -> usize {
        let mut sink = self.inner.lock();
        if sink.sealed {
            return 0;
        }
        sink.status.get_or_insert(StatusCode::OK);
        sink.body.extend_from_slice(bytes);
        bytes.len()
    }

    /// Sets a header, replacing existing values. Dropped after commit.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        self.edit_headers(|headers| {
            headers.insert(name, value);
        });
    }

    /// Adds a header value next to existing ones. Dropped after commit.
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.edit_headers(|headers| {
            headers.append(name, value);
        });
    }

    pub fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.inner.lock().headers.get(name).cloned()
    }

    /// Snapshot of the current headers.
    pub fn headers(&self) -> HeaderMap {
        self.inner.lock().headers.clone()
    }

    /// The committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.inner.lock().status
    }

    pub fn is_committed(&self) -> bool {
        self.inner.lock().status.is_some()
    }

    pub fn bytes_written(&self) -> usize {
        self.inner.lock().body.len()
    }

    /// Drops every write from now on.
    pub(crate) fn seal(&self) {
        self.inner.lock().sealed = true;
    }

    fn edit_headers(&self, edit: impl FnOnce(&mut HeaderMap)) {
        let mut sink = self.inner.lock();
        if sink.sealed || sink.status.is_some() {
            debug!("header edit after commit dropped");
            return;
        }
        edit(&mut sink.headers);
    }

    /// Drains the sink into the response hyper sends. An uncommitted writer
    /// answers `200 OK` with an empty body.
    pub(crate) fn take_response(&self) -> http::Response<Full<Bytes>> {
        let mut sink = self.inner.lock();
        let status = sink.status.unwrap_or(StatusCode::OK);
        let body = std::mem::take(&mut sink.body).freeze();
        let headers = std::mem::take(&mut sink.headers);
        drop(sink);

        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use http::header::CONTENT_TYPE;

    use super::*;

    #[test]
    fn first_status_write_wins() {
        let res = ResponseWriter::new();
        assert!(res.write_header(StatusCode::CREATED));
        assert!(!res.write_header(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(res.status(), Some(StatusCode::CREATED));
    }

    #[test]
    fn body_write_commits_ok() {
        let res = ResponseWriter::new();
        assert_eq!(res.write(b"hello"), 5);
        assert_eq!(res.status(), Some(StatusCode::OK));
        assert!(!res.write_header(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(res.bytes_written(), 5);
    }

    #[test]
    fn header_edits_after_commit_are_dropped() {
        let res = ResponseWriter::new();
        res.set_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        res.write_header(StatusCode::OK);
        res.set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert_eq!(res.header(&CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[test]
    fn sealed_writer_drops_everything() {
        let res = ResponseWriter::new();
        res.write_header(StatusCode::GATEWAY_TIMEOUT);
        res.seal();
        assert_eq!(res.write(b"late"), 0);
        assert_eq!(res.bytes_written(), 0);

        let response = res.take_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn clones_share_the_sink() {
        let res = ResponseWriter::new();
        let other = res.clone();
        other.write(b"abc");
        assert_eq!(res.bytes_written(), 3);
    }

    #[test]
    fn uncommitted_writer_answers_ok() {
        let response = ResponseWriter::new().take_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
