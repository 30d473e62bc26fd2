//! JSON envelope for business results.
//!
//! Transport status and business status are decoupled: every envelope goes
//! out as `200 OK`, and the outcome lives in the `code` field.
//!
//! ```text
//! {"code":0,"msg":"success","data":{…}}        ← Ok(data)
//! {"code":4001,"msg":"user not found","data":null}  ← Err(render::Error)
//! ```
//!
//! ```rust
//! use seed::{render, Context, Request, Response};
//!
//! async fn get_user(ctx: Context, _req: Request) -> Response {
//!     let found = ctx.param("id") == Some("1");
//!     render::json(if found {
//!         Ok(serde_json::json!({"id": 1}))
//!     } else {
//!         Err(render::Error::with_code("user not found", 4001))
//!     })
//! }
//! ```

use http::StatusCode;
use serde::Serialize;

use crate::response::{IntoResponse, Response};

/// A business error: a non-zero code and a message for the client.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{msg}")]
pub struct Error {
    code: i64,
    msg: String,
}

impl Error {
    /// Error with the default code `1`.
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_code(msg, 1)
    }

    pub fn with_code(msg: impl Into<String>, code: i64) -> Self {
        Self { code, msg: msg.into() }
    }

    pub fn code(&self) -> i64 { self.code }
    pub fn msg(&self) -> &str { &self.msg }
}

/// Returning a bare business error from a handler renders its envelope.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        json::<()>(Err(self))
    }
}

/// The wire shape of every rendered result.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: i64,
    pub msg: String,
    pub data: Option<T>,
}

impl<T> From<Result<T, Error>> for Envelope<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(data) => Self { code: 0, msg: "success".to_owned(), data: Some(data) },
            Err(e) => Self { code: e.code, msg: e.msg, data: None },
        }
    }
}

/// Renders `result` as a JSON envelope with HTTP status `200`.
pub fn json<T: Serialize>(result: Result<T, Error>) -> Response {
    Response::json_value(StatusCode::OK, &Envelope::from(result))
}
