//! # seed
//!
//! The request-processing core of an HTTP server: route composition with
//! groups, short-circuiting middleware chains, and panic recovery with
//! readable backtraces. Transport is hyper (HTTP/1.1 and HTTP/2).
//!
//! ## The pieces
//!
//! - [`Router`]: registers routes, groups and middleware, then freezes into
//!   a [`RouteTable`].
//! - [`Chain`] / [`Next`]: ordered middleware units. A unit continues by
//!   calling `next.run(..)` and stops the request by not calling it.
//! - [`middleware`]: recovery, request logging, timeouts, CORS, real client IP.
//! - [`Server`]: accept loop, graceful shutdown, optional TLS.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use seed::{middleware, render, Context, Request, Response, Server, StatusCode};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct User { id: u64, name: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), seed::Error> {
//!     let mut server = Server::bind("0.0.0.0:3000");
//!     let router = server.router();
//!     router
//!         .use_middleware(middleware::logger())
//!         .use_middleware(middleware::recoverer());
//!     router.group("/v1", |r| {
//!         r.get("/users/{id}", get_user);
//!         r.post("/users", create_user);
//!     });
//!     server.run().await
//! }
//!
//! async fn get_user(ctx: Context, _req: Request) -> Response {
//!     let result = match ctx.param("id").and_then(|id| id.parse().ok()) {
//!         Some(id) => Ok(User { id, name: "alice".into() }),
//!         None => Err(render::Error::with_code("no such user", 404)),
//!     };
//!     render::json(result)
//! }
//!
//! async fn create_user(_ctx: Context, req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/v1/users/99")
//!         .json(r#"{"id":99}"#)
//! }
//! ```

mod chain;
mod config;
mod context;
mod error;
mod files;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
#[cfg(feature = "tls")]
mod tls;
mod writer;

pub mod fault;
pub mod middleware;
pub mod path;
pub mod render;
pub mod stack;

pub use chain::{BoxFuture, BoxedMiddleware, Chain, Flow, Middleware, Next};
pub use config::{ServerConfig, TlsConfig};
pub use context::{Context, ContextError, Params};
pub use error::Error;
pub use handler::Handler;
pub use method::{Method, ANY};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::{RouteTable, Router, DEFAULT_MAX_BODY_SIZE, DEFAULT_METHOD_SEPARATOR};
pub use server::{Server, ShutdownHandle};
pub use writer::ResponseWriter;

pub use http::StatusCode;
