//! End-to-end tests against a live server on an ephemeral port.

use std::time::Duration;

use api_component::config::{CorsConfig, ServerConfig};
use api_component::context::{Contexts, RequestContext};
use api_component::errors::ApiError;
use api_component::{HttpServer, Web};
use serde_json::json;

mod common;

async fn ping(ctx: RequestContext) -> Result<(), ApiError> {
    ctx.set_data("pong")
}

async fn slow(ctx: RequestContext) -> Result<(), ApiError> {
    tokio::time::sleep(Duration::from_millis(200)).await;
    ctx.set_data("done")
}

fn server(config: ServerConfig) -> HttpServer {
    let mut web = Web::new("/v1");
    web.route(web.get("/ping").no_login().handler(ping));
    web.route(web.get("/slow").no_login().handler(slow));

    let mut server = HttpServer::new("test-server").with_config(config);
    server.register(web);
    server
}

#[tokio::test]
async fn test_serves_envelope_over_tcp() {
    let (addr, shutdown, handle) = common::spawn_server(server(ServerConfig::default())).await;

    let response = reqwest::get(format!("http://{}/v1/ping", addr)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get("trace-id")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|id| id.starts_with("svc:")));
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"retcode": 0, "message": "", "data": "pong"}));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_graceful_shutdown_finishes_in_flight_request() {
    let (addr, shutdown, handle) = common::spawn_server(server(ServerConfig::default())).await;

    let in_flight = tokio::spawn(async move {
        reqwest::get(format!("http://{}/v1/slow", addr))
            .await
            .unwrap()
            .json::<serde_json::Value>()
            .await
            .unwrap()
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.trigger();

    let body = in_flight.await.unwrap();
    assert_eq!(body["data"], "done");
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_cors_headers_when_enabled() {
    let config = ServerConfig {
        cors: CorsConfig {
            enable_cors: true,
            allowed_domains: vec!["https://app.example.com".into()],
            allowed_methods: vec!["GET".into()],
            allowed_headers: vec!["content-type".into()],
            cookies_allowed: true,
        },
        ..ServerConfig::default()
    };
    let (addr, shutdown, handle) = common::spawn_server(server(config)).await;

    let response = reqwest::Client::new()
        .get(format!("http://{}/v1/ping", addr))
        .header("origin", "https://app.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://app.example.com"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_write_timeout() {
    let config = ServerConfig {
        write_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let mut web = Web::new("");
    web.route(web.get("/stuck").no_login().handler(|_ctx: RequestContext| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Ok::<(), ApiError>(())
    }));
    let mut server = HttpServer::new("timeout").with_config(config);
    server.register(web);
    let (addr, shutdown, handle) = common::spawn_server(server).await;

    let response = reqwest::get(format!("http://{}/stuck", addr)).await.unwrap();
    assert_eq!(response.status(), 408);

    shutdown.trigger();
    handle.await.unwrap();
}
