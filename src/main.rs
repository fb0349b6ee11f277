//! Demo service built on the api-component library.
//!
//! # Routes
//!
//! ```text
//! GET    /api/health              no login   envelope with a static payload
//! GET    /api/version             no login   raw YAML body
//! GET    /api/users               login      query params + page extra field
//! POST   /api/users               login      auto-decoded, validated body
//! GET    /api/users/:id           login      path parameter
//! GET    /api/users/:id/export    login      file download
//! ```
//!
//! Requests to login routes must send `Authorization: Bearer <token>`.

use std::path::PathBuf;

use api_component::config::{load_config, validate_config, ConfigLoader};
use api_component::errors::code;
use api_component::{
    observability, ApiError, ContentType, Context, Contexts, Decode, HttpServer, RequestContext, Web,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Parser)]
#[command(name = "api-component")]
#[command(about = "Demo API service", long_about = None)]
struct Cli {
    /// Config file name, without the `.toml` extension.
    #[arg(short, long, default_value = "api-component")]
    config: String,

    /// Directory to search for the config file; repeatable.
    #[arg(long = "config-dir")]
    config_dirs: Vec<PathBuf>,

    /// Override `server.port`.
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Validate)]
struct ListUsers {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    #[validate(range(max = 100))]
    size: u32,
}

impl Decode for ListUsers {
    fn set_defaults(&mut self) {
        if self.size == 0 {
            self.size = 20;
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
struct CreateUser {
    #[validate(length(min = 1, max = 64))]
    name: String,
    #[validate(email)]
    email: String,
    #[serde(default)]
    tenant: String,
}

impl Decode for CreateUser {
    fn header_fields() -> &'static [(&'static str, &'static str)] {
        &[("x-tenant", "tenant")]
    }
}

#[derive(Debug, Serialize)]
struct User {
    id: u64,
    name: String,
}

async fn health(ctx: RequestContext) -> Result<(), ApiError> {
    ctx.set_data(&serde_json::json!({ "status": "ok" }))
}

async fn version(ctx: RequestContext) -> Result<(), ApiError> {
    let body = format!("name: api-component\nversion: {}\n", env!("CARGO_PKG_VERSION"));
    ctx.set_raw_response("", body);
    Ok(())
}

async fn list_users(ctx: RequestContext) -> Result<(), ApiError> {
    let query: ListUsers = ctx.decode()?;
    let users: Vec<User> = (0..query.size.min(3))
        .map(|i| User {
            id: u64::from(query.page) * u64::from(query.size) + u64::from(i) + 1,
            name: format!("user-{}", i + 1),
        })
        .collect();
    ctx.set_data(&users)?;
    ctx.set_page_response(&serde_json::json!({ "page": query.page, "size": query.size }))
}

async fn create_user(ctx: RequestContext) -> Result<(), ApiError> {
    let input: CreateUser = ctx.decode()?;
    ctx.span().in_scope(|| {
        tracing::info!(name = %input.name, email = %input.email, tenant = %input.tenant, "Creating user");
    });
    ctx.set_data(&User { id: 1, name: input.name })
}

async fn get_user(ctx: RequestContext) -> Result<(), ApiError> {
    let id: u64 = ctx
        .path_parameter("id")
        .unwrap_or_default()
        .parse()
        .map_err(|e| ctx.errors().legacy_wrap_code(code::JSON_DECODE, Box::new(e)))?;
    ctx.set_data(&User {
        id,
        name: format!("user-{}", id),
    })
}

async fn export_user(ctx: RequestContext) -> Result<(), ApiError> {
    let id = ctx.path_parameter("id").unwrap_or_default();
    let csv = format!("id,name\n{},user-{}\n", id, id);
    ctx.set_response_file(&format!("user-{}.csv", id), csv);
    Ok(())
}

async fn check_login(ctx: RequestContext) -> Result<(), ApiError> {
    let token = ctx
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    if token.is_empty() {
        return Err(ctx.errors().errorf(code::LOGIN_REQUIRED, &[&"missing bearer token"]));
    }
    Ok(())
}

fn routes() -> Web {
    let mut web = Web::new("/api");
    web.login_checker(check_login);

    let health = web.get("/health").no_login().handler(health);
    let version = web
        .get("/version")
        .no_login()
        .produces(ContentType::YAML)
        .handler(version);
    let list = web.get("/users").handler(list_users);
    let create = web.post("/users").handler(create_user);
    let get = web.get("/users/:id").handler(get_user);
    let export = web.get("/users/:id/export").handler(export_user);

    web.route(health)
        .route(version)
        .route(list)
        .route(create)
        .route(get)
        .route(export);
    web
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 1. Configuration
    let mut loader = ConfigLoader::new(&cli.config).env_prefix("API");
    if !cli.config_dirs.is_empty() {
        loader = loader.dirs(cli.config_dirs.clone());
    }
    let mut config = load_config(&loader)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("invalid config: {}", error);
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    // 2. Logging
    let _guard = observability::init(&cli.config, &config.log)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.server.bind_address(),
        envelope = ?config.server.envelope,
        "api-component starting"
    );

    // 3. Routes and server
    let mut server = HttpServer::new(cli.config.as_str()).with_config(config.server);
    server.register(routes());
    server.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
