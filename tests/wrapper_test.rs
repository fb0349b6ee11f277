//! Route table and wrapper behaviour, driven through the full router.

use std::collections::HashMap;

use api_component::context::{Context, Contexts, RequestContext};
use api_component::errors::{code, ApiError};
use api_component::http::route::DEFAULT_BODY_LIMIT;
use api_component::{ContentType, Decode, EnvelopeStyle, Web};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

mod common;

async fn hello(ctx: RequestContext) -> Result<(), ApiError> {
    ctx.set_data(&json!({"hello": "world"}))
}

async fn fail_with_data(ctx: RequestContext) -> Result<(), ApiError> {
    ctx.set_data(&json!({"partial": true}))?;
    Err(ApiError::new(2001, "order closed"))
}

async fn boom(_ctx: RequestContext) -> Result<(), ApiError> {
    panic!("something broke");
}

async fn echo_params(ctx: RequestContext) -> Result<(), ApiError> {
    let params: HashMap<String, String> = ctx.path_parameters().clone();
    ctx.set_data(&json!({
        "params": params,
        "route": ctx.selected_route_path(),
        "method": ctx.request().method.as_str(),
    }))
}

async fn paged(ctx: RequestContext) -> Result<(), ApiError> {
    ctx.set_data(&vec![1, 2, 3])?;
    ctx.set_page_response(&json!({"total": 3}))?;
    ctx.add_response_header("x-served-by", "paged")
}

async fn download(ctx: RequestContext) -> Result<(), ApiError> {
    ctx.set_response_file("report.csv", "a,b\n1,2\n");
    Ok(())
}

async fn raw_default(ctx: RequestContext) -> Result<(), ApiError> {
    ctx.set_raw_response("", "key: value\n");
    Ok(())
}

async fn raw_explicit(ctx: RequestContext) -> Result<(), ApiError> {
    ctx.set_raw_response("text/plain", "plain");
    Ok(())
}

async fn need_token(ctx: RequestContext) -> Result<(), ApiError> {
    if ctx.headers().contains_key(header::AUTHORIZATION) {
        Ok(())
    } else {
        Err(ctx.errors().errorf(code::LOGIN_REQUIRED, &[&"no token"]))
    }
}

#[derive(Debug, Deserialize, Validate)]
struct Order {
    id: u64,
    #[validate(range(min = 1))]
    quantity: u32,
    #[serde(default)]
    note: String,
}

impl Decode for Order {}

async fn create_order(ctx: RequestContext) -> Result<(), ApiError> {
    let order: Order = ctx.decode()?;
    ctx.set_data(&json!({"id": order.id, "quantity": order.quantity, "note": order.note}))
}

fn web() -> Web {
    let mut web = Web::new("/api");
    web.login_checker(need_token);
    let routes = vec![
        web.get("/hello").no_login().handler(hello),
        web.get("/private").handler(hello),
        web.get("/fail").no_login().handler(fail_with_data),
        web.get("/boom").no_login().handler(boom),
        web.get("/paged").no_login().handler(paged),
        web.get("/download").no_login().handler(download),
        web.get("/raw").no_login().produces(ContentType::YAML).handler(raw_default),
        web.get("/raw/plain").no_login().handler(raw_explicit),
        web.post("/orders/:id").no_login().handler(create_order),
        web.get("/items/:id/parts/{part}").no_login().handler(echo_params),
        web.get("/files/*rest").no_login().handler(echo_params),
    ];
    for route in routes {
        web.route(route);
    }
    web
}

#[tokio::test]
async fn test_success_envelope_and_trace_id() {
    let router = common::router(web());
    let reply = common::get(&router, "/api/hello").await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json(),
        json!({"retcode": 0, "message": "", "data": {"hello": "world"}})
    );
    let trace_id = reply.headers["trace-id"].to_str().unwrap();
    assert!(trace_id.starts_with("svc:"));
}

#[tokio::test]
async fn test_incoming_trace_id_is_not_reused() {
    let router = common::router(web());
    let request = Request::get("/api/hello")
        .header("trace-Id", "svc:upstream")
        .body(Body::empty())
        .unwrap();
    let reply = common::send(&router, request).await;
    let trace_id = reply.headers["trace-id"].to_str().unwrap();
    assert_ne!(trace_id, "svc:upstream");
}

#[tokio::test]
async fn test_handler_error_keeps_data() {
    let router = common::router(web());
    let reply = common::get(&router, "/api/fail").await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json(),
        json!({"retcode": 2001, "message": "order closed", "data": {"partial": true}})
    );
}

#[tokio::test]
async fn test_login_gating() {
    let router = common::router(web());

    let reply = common::get(&router, "/api/private").await;
    let body = reply.json();
    assert_eq!(body["retcode"], code::LOGIN_REQUIRED);
    assert_eq!(body["message"], "login required. err: no token");
    assert_eq!(body["data"], serde_json::Value::Null);

    let request = Request::get("/api/private")
        .header(header::AUTHORIZATION, "Bearer t")
        .body(Body::empty())
        .unwrap();
    let reply = common::send(&router, request).await;
    assert_eq!(reply.json()["retcode"], 0);

    // no_login routes skip the checker
    let reply = common::get(&router, "/api/hello").await;
    assert_eq!(reply.json()["retcode"], 0);
}

#[tokio::test]
async fn test_panic_becomes_500() {
    let router = common::router(web());
    let reply = common::get(&router, "/api/boom").await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json(), json!("something broke"));
    assert!(reply.headers.contains_key("trace-id"));

    // The router still serves afterwards.
    let reply = common::get(&router, "/api/hello").await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_extra_fields_and_headers() {
    let router = common::router(web());
    let reply = common::get(&router, "/api/paged").await;

    assert_eq!(
        reply.json(),
        json!({"retcode": 0, "message": "", "data": [1, 2, 3], "page": {"total": 3}})
    );
    assert_eq!(reply.headers["x-served-by"], "paged");
}

#[tokio::test]
async fn test_file_download() {
    let router = common::router(web());
    let reply = common::get(&router, "/api/download").await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=report.csv"
    );
    assert_eq!(reply.headers[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(reply.headers[header::CONTENT_LENGTH], "8");
    assert_eq!(&reply.body[..], b"a,b\n1,2\n");
}

#[tokio::test]
async fn test_raw_response_content_type() {
    let router = common::router(web());

    let reply = common::get(&router, "/api/raw").await;
    assert_eq!(reply.headers[header::CONTENT_TYPE], "application/x-yaml");
    assert_eq!(reply.headers[header::CONTENT_LENGTH], "11");
    assert_eq!(&reply.body[..], b"key: value\n");

    let reply = common::get(&router, "/api/raw/plain").await;
    assert_eq!(reply.headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(&reply.body[..], b"plain");
}

#[tokio::test]
async fn test_decode_precedence_through_router() {
    let router = common::router(web());
    let request = Request::post("/api/orders/9?note=from-query&quantity=5")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"id": 1, "quantity": 2}"#))
        .unwrap();
    let reply = common::send(&router, request).await;

    assert_eq!(
        reply.json()["data"],
        json!({"id": 9, "quantity": 2, "note": "from-query"})
    );
}

#[tokio::test]
async fn test_decode_failure_envelope() {
    let router = common::router(web());
    let request = Request::post("/api/orders/9")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"quantity": 0}"#))
        .unwrap();
    let reply = common::send(&router, request).await;

    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["retcode"], code::JSON_DECODE);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("request body decode error. err: "));
}

#[tokio::test]
async fn test_path_parameters() {
    let router = common::router(web());

    let reply = common::get(&router, "/api/items/7/parts/wheel%20left").await;
    assert_eq!(
        reply.json()["data"],
        json!({
            "params": {"id": "7", "part": "wheel left"},
            "route": "/api/items/:id/parts/{part}",
            "method": "GET",
        })
    );

    let reply = common::get(&router, "/api/files/a/b/c.txt").await;
    assert_eq!(reply.json()["data"]["params"]["rest"], "a/b/c.txt");
}

#[tokio::test]
async fn test_every_method_is_routed() {
    async fn method_name(ctx: RequestContext) -> Result<(), ApiError> {
        ctx.set_data(ctx.request().method.as_str())
    }

    let mut web = Web::new("");
    let routes = vec![
        web.get("/m"),
        web.post("/m"),
        web.put("/m"),
        web.delete("/m"),
        web.patch("/m"),
        web.options("/m"),
    ];
    for route in routes {
        web.route(route.no_login().handler(method_name));
    }
    let router = common::router(web);

    for method in [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::OPTIONS,
    ] {
        let request = Request::builder()
            .method(method.clone())
            .uri("/m")
            .body(Body::empty())
            .unwrap();
        let reply = common::send(&router, request).await;
        assert_eq!(reply.json()["data"], method.as_str());
    }
}

#[tokio::test]
async fn test_code_envelope_style() {
    let mut web = web();
    web.envelope_style(EnvelopeStyle::Code);
    let router = common::router(web);

    let reply = common::get(&router, "/api/fail").await;
    assert_eq!(
        reply.json(),
        json!({"code": 2001, "message": "order closed", "data": {"partial": true}})
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let router = common::router(web());
    let reply = common::get(&router, "/api/nope").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_body_over_limit_is_decode_error() {
    let router = web().into_router().unwrap();

    let chunk = vec![b'a'; 64 * 1024];
    let chunks = DEFAULT_BODY_LIMIT / chunk.len() + 1;
    let stream = futures_util::stream::iter(
        (0..chunks).map(move |_| Ok::<_, std::io::Error>(chunk.clone())),
    );
    let request = Request::post("/api/orders/9")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from_stream(stream))
        .unwrap();
    let reply = common::send(&router, request).await;

    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["retcode"], code::JSON_DECODE);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("request body decode error. err: read request body: "));
    assert_eq!(body["data"], serde_json::Value::Null);
    assert!(reply.headers["trace-id"].to_str().unwrap().starts_with("svc:"));
}
