//! Access log middleware: one line when a request arrives, one when it leaves.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::Response;

pub async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    tracing::info!(method = %method, path = %path, remote = %remote, "[REQUEST]");

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        remote = %remote,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "[RESPONSE]"
    );
    response
}
