//! What a handler hands back, and how it lands in the [`ResponseWriter`].
//!
//! Handlers return a [`Response`] (or anything [`IntoResponse`]). Nothing is
//! sent until the route's terminal unit calls [`Response::write_to`], so a
//! middleware that already committed a status keeps it.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use serde::Serialize;
use tracing::error;

use crate::writer::ResponseWriter;

const JSON: &str = "application/json; charset=utf-8";
const TEXT: &str = "text/plain; charset=utf-8";

/// Media types accepted by [`ResponseBuilder::bytes`].
pub enum ContentType {
    Csv,
    /// Server-sent events.
    EventStream,
    FormData,
    Html,
    Json,
    /// Raw bytes, downloads.
    OctetStream,
    Text,
    Xml,
}

impl ContentType {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData => "application/x-www-form-urlencoded",
            Self::Html => "text/html; charset=utf-8",
            Self::Json => JSON,
            Self::OctetStream => "application/octet-stream",
            Self::Text => TEXT,
            Self::Xml => "application/xml",
        }
    }
}

/// A complete answer: status, headers and body.
///
/// ```rust
/// use seed::{ContentType, Response, StatusCode};
///
/// let ok = Response::text("pong");
/// let gone = Response::status(StatusCode::GONE);
/// let created = Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/orders/7")
///     .json(r#"{"order":7}"#);
/// let feed = Response::builder().bytes(ContentType::Xml, "<rss/>");
/// # let _ = (ok, gone, created, feed);
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) body: Bytes,
    pub(crate) headers: Vec<(HeaderName, HeaderValue)>,
    pub(crate) status: StatusCode,
}

impl Response {
    /// `200` carrying already-encoded JSON.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// Encodes `value` as JSON under `status`. Encoding failures are logged
    /// and turn into a bare `500`.
    pub fn json_value<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(encoded) => Self::builder().status(status).json(encoded),
            Err(e) => {
                error!("response serialization failed: {e}");
                Self::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// `200` plain text.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Just a status line, empty body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Bytes::new(), headers: Vec::new(), status: code }
    }

    /// Starts at `200` with no extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Copies this response into `res`.
    ///
    /// A `content-type` already present on `res` wins over ours. Once `res` is
    /// committed, our status and headers are ignored by the writer.
    pub fn write_to(self, res: &ResponseWriter) {
        let typed_upstream = res.header(&CONTENT_TYPE).is_some();
        for (name, value) in self.headers {
            if typed_upstream && name == CONTENT_TYPE {
                continue;
            }
            res.append_header(name, value);
        }
        res.write_header(self.status);
        if !self.body.is_empty() {
            res.write(&self.body);
        }
    }
}

/// Accumulates status and headers; a body method produces the [`Response`].
pub struct ResponseBuilder {
    headers: Vec<(HeaderName, HeaderValue)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Header names and values that fail to parse are logged and left out.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            _ => error!(name, value, "invalid response header skipped"),
        }
        self
    }

    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.with_body(JSON, body.into())
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.with_body(TEXT, Bytes::from(body.into()))
    }

    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.with_body(content_type.as_str(), body.into())
    }

    /// For `204`, redirects and other bodiless answers.
    pub fn no_body(self) -> Response {
        Response { body: Bytes::new(), headers: self.headers, status: self.status }
    }

    fn with_body(self, content_type: &'static str, body: Bytes) -> Response {
        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        headers.push((CONTENT_TYPE, HeaderValue::from_static(content_type)));
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}

/// Turns a handler's return value into a [`Response`].
///
/// Implement it for domain types so handlers can return them as is:
///
/// ```rust
/// use seed::{IntoResponse, Response, StatusCode};
///
/// struct Created(u64);
///
/// impl IntoResponse for Created {
///     fn into_response(self) -> Response {
///         Response::json_value(StatusCode::CREATED, &serde_json::json!({ "id": self.0 }))
///     }
/// }
/// ```
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        Response::status(self)
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        Response::status(StatusCode::OK)
    }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for Result<T, E> {
    fn into_response(self) -> Response {
        self.map_or_else(E::into_response, T::into_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_value_serializes_with_status() {
        let res = Response::json_value(StatusCode::CREATED, &serde_json::json!({"id": 1}));
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.body(), br#"{"id":1}"#);
    }

    #[test]
    fn write_to_keeps_an_upstream_content_type() {
        let res = ResponseWriter::new();
        res.set_header(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        Response::text("hi").write_to(&res);

        assert_eq!(res.header(&CONTENT_TYPE).unwrap(), "text/html");
        assert_eq!(res.status(), Some(StatusCode::OK));
        assert_eq!(res.bytes_written(), 2);
    }

    #[test]
    fn write_to_respects_an_earlier_commit() {
        let res = ResponseWriter::new();
        res.write_header(StatusCode::GATEWAY_TIMEOUT);
        Response::builder().status(StatusCode::CREATED).header("location", "/x").no_body().write_to(&res);

        assert_eq!(res.status(), Some(StatusCode::GATEWAY_TIMEOUT));
        assert!(res.header(&http::header::LOCATION).is_none());
    }

    #[test]
    fn builder_skips_invalid_headers() {
        let res = Response::builder().header("bad header", "v").header("x-ok", "1").no_body();
        assert_eq!(res.headers.len(), 1);
    }

    #[test]
    fn result_picks_the_matching_side() {
        let ok: Result<&'static str, StatusCode> = Ok("fine");
        let err: Result<&'static str, StatusCode> = Err(StatusCode::CONFLICT);
        assert_eq!(ok.into_response().status_code(), StatusCode::OK);
        assert_eq!(err.into_response().status_code(), StatusCode::CONFLICT);
    }
}
