//! Incoming HTTP request type.

use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use http::header::{HeaderMap, CONTENT_TYPE};
use http::request::Parts;
use http::{Method, Uri};
use serde::de::DeserializeOwned;
use url::form_urlencoded;

/// An incoming HTTP request with its body already read.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) parts: Parts,
    pub(crate) body: Bytes,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) client_ip: Option<IpAddr>,
}

impl Request {
    pub(crate) fn new(parts: Parts, body: Bytes, remote_addr: Option<SocketAddr>) -> Self {
        Self { parts, body, remote_addr, client_ip: None }
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn version(&self) -> http::Version { self.parts.version }

    /// Header lookup. Names are case-insensitive; non-UTF-8 values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Like [`header`](Self::header), falling back to `default`.
    pub fn header_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.header(name).unwrap_or(default)
    }

    /// First value of a query-string parameter, percent-decoded.
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.parts.uri.query()?;
        first_pair(query.as_bytes(), name)
    }

    /// Like [`query`](Self::query), returning `default` when the parameter is
    /// missing or empty.
    pub fn query_or(&self, name: &str, default: &str) -> String {
        non_empty_or(self.query(name), default)
    }

    /// First value of a form field from an `application/x-www-form-urlencoded`
    /// body. Other content types never match.
    pub fn post_form(&self, name: &str) -> Option<String> {
        let is_form = self
            .header(CONTENT_TYPE.as_str())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if !is_form {
            return None;
        }
        first_pair(&self.body, name)
    }

    pub fn post_form_or(&self, name: &str, default: &str) -> String {
        non_empty_or(self.post_form(name), default)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Peer address of the connection, when served from a socket.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// The client's address: the one set by a proxy-aware middleware such as
    /// [`middleware::real_ip`](crate::middleware::real_ip), otherwise the
    /// peer address.
    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip.or_else(|| self.remote_addr.map(|a| a.ip()))
    }

    pub fn set_client_ip(&mut self, ip: IpAddr) {
        self.client_ip = Some(ip);
    }
}

impl Default for Request {
    fn default() -> Self {
        let (parts, ()) = http::Request::new(()).into_parts();
        Self::new(parts, Bytes::new(), None)
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body, None)
    }
}

fn first_pair(encoded: &[u8], name: &str) -> Option<String> {
    form_urlencoded::parse(encoded)
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, content_type: Option<&str>, body: &'static [u8]) -> Request {
        let mut builder = http::Request::builder().method("POST").uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        builder.body(Bytes::from_static(body)).unwrap().into()
    }

    #[test]
    fn query_parameters_are_decoded() {
        let req = request("/search?q=hello%20world&page=", None, b"");
        assert_eq!(req.query("q").as_deref(), Some("hello world"));
        assert_eq!(req.query("page").as_deref(), Some(""));
        assert_eq!(req.query_or("page", "1"), "1");
        assert_eq!(req.query("missing"), None);
    }

    #[test]
    fn form_fields_require_form_content_type() {
        let form = request("/", Some("application/x-www-form-urlencoded"), b"name=alice&age=30");
        assert_eq!(form.post_form("name").as_deref(), Some("alice"));
        assert_eq!(form.post_form_or("nick", "anon"), "anon");

        let json = request("/", Some("application/json"), b"name=alice");
        assert_eq!(json.post_form("name"), None);
    }

    #[test]
    fn json_body() {
        #[derive(serde::Deserialize)]
        struct Item {
            id: u32,
        }
        let req = request("/", Some("application/json"), br#"{"id":7}"#);
        assert_eq!(req.json::<Item>().unwrap().id, 7);
    }

    #[test]
    fn client_ip_prefers_override() {
        let mut req = Request::default();
        req.remote_addr = Some("10.0.0.1:5555".parse().unwrap());
        assert_eq!(req.client_ip(), Some("10.0.0.1".parse().unwrap()));
        req.set_client_ip("203.0.113.7".parse().unwrap());
        assert_eq!(req.client_ip(), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = request("/", Some("text/plain"), b"");
        assert_eq!(req.header("Content-Type"), Some("text/plain"));
        assert_eq!(req.header_or("x-missing", "none"), "none");
    }
}
