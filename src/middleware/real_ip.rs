use std::net::IpAddr;

use crate::chain::{Flow, Next};
use crate::context::Context;
use crate::request::Request;
use crate::writer::ResponseWriter;

/// Sets [`Request::client_ip`] from the proxy headers.
///
/// Takes the first non-empty one of `True-Client-IP`, `X-Real-IP` and the
/// first entry of `X-Forwarded-For`. If that value is not an IP address the
/// peer address is kept; later headers are not consulted.
/// Only use this behind a proxy that sets these headers; otherwise clients
/// can claim any address.
pub async fn real_ip(ctx: Context, res: ResponseWriter, mut req: Request, next: Next) -> Flow {
    if let Some(ip) = forwarded_ip(&req) {
        req.set_client_ip(ip);
    }
    next.run(ctx, res, req).await
}

fn forwarded_ip(req: &Request) -> Option<IpAddr> {
    let candidates = [
        req.header("true-client-ip"),
        req.header("x-real-ip"),
        req.header("x-forwarded-for").and_then(|v| v.split(',').next()),
    ];
    let chosen = candidates.into_iter().flatten().map(str::trim).find(|v| !v.is_empty())?;
    chosen.parse().ok()
}
