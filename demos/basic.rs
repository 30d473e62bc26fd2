//! A small JSON API with groups, middleware and panic recovery.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/v1/users/42
//!   curl -X POST http://localhost:3000/v1/users -d '{"name":"alice"}'
//!   curl -H 'authorization: Bearer admin' http://localhost:3000/v1/admin/stats
//!   curl http://localhost:3000/v1/admin/stats            # 401
//!   curl http://localhost:3000/v1/boom                   # 500, trace on stderr
//!   curl -X OPTIONS -i http://localhost:3000/anything    # 204 preflight

use std::time::Duration;

use seed::{
    middleware, render, Context, Flow, Middleware, Next, Request, Response, ResponseWriter, Server,
    ServerConfig, StatusCode,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), seed::Error> {
    tracing_subscriber::fmt::init();

    let mut server = Server::with_config(ServerConfig::from_env()?);
    let router = server.router();
    router
        .use_middleware(middleware::real_ip)
        .use_middleware(middleware::logger())
        .use_middleware(middleware::recoverer())
        .use_middleware(middleware::cors);

    router.group_with(
        "/v1",
        |r| {
            r.get("/users/{id}", get_user);
            r.post("/users", create_user);
            r.get("/boom", boom);
            r.group_with(
                "/admin",
                |r| {
                    r.get("/stats", stats);
                },
                [require_admin.into_middleware()],
            );
        },
        [middleware::timeout(Duration::from_secs(5)).into_middleware()],
    );

    server.run().await
}

async fn require_admin(ctx: Context, res: ResponseWriter, req: Request, next: Next) -> Flow {
    if req.header("authorization") != Some("Bearer admin") {
        res.write_header(StatusCode::UNAUTHORIZED);
        return Flow::Halt;
    }
    next.run(ctx, res, req).await
}

async fn get_user(ctx: Context, _req: Request) -> Response {
    render::json(match ctx.param("id").and_then(|id| id.parse().ok()) {
        Some(id) => Ok(User { id, name: "alice".to_owned() }),
        None => Err(render::Error::with_code("user id must be a number", 4001)),
    })
}

async fn create_user(_ctx: Context, req: Request) -> Response {
    match req.json::<NewUser>() {
        Ok(new) => Response::json_value(StatusCode::CREATED, &User { id: 99, name: new.name }),
        Err(e) => render::json::<()>(Err(render::Error::new(e.to_string()))),
    }
}

async fn stats(ctx: Context, _req: Request) -> Response {
    tokio::select! {
        () = ctx.done() => Response::status(StatusCode::GATEWAY_TIMEOUT),
        () = tokio::time::sleep(Duration::from_millis(50)) => Response::text("all good"),
    }
}

async fn boom(_ctx: Context, _req: Request) -> Response {
    let missing: Option<&str> = None;
    Response::text(missing.unwrap())
}
