//! Permissive CORS headers.

use http::header::{
    HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};

use crate::chain::{Flow, Next};
use crate::context::Context;
use crate::request::Request;
use crate::writer::ResponseWriter;

/// The headers every response gets from [`cors`], and that the default
/// not-found handler sends with a preflight answer.
pub const CORS_HEADERS: [(HeaderName, HeaderValue); 4] = [
    (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
    (ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET,POST,PUT,DELETE,OPTIONS,PATCH,HEAD")),
    (ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*")),
    (ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true")),
];

/// Adds the permissive CORS headers, then continues.
pub async fn cors(ctx: Context, res: ResponseWriter, req: Request, next: Next) -> Flow {
    for (name, value) in CORS_HEADERS {
        res.append_header(name, value);
    }
    next.run(ctx, res, req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Chain, Middleware};

    #[tokio::test]
    async fn adds_headers_and_continues() {
        let res = ResponseWriter::new();
        let flow = Chain::new(vec![cors.into_middleware()])
            .run(Context::default(), res.clone(), Request::default())
            .await;

        assert_eq!(flow, Flow::Halt);
        assert_eq!(res.header(&ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(
            res.header(&ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "GET,POST,PUT,DELETE,OPTIONS,PATCH,HEAD"
        );
        assert_eq!(res.header(&ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
    }
}
