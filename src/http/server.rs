//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router from every registered [`Web`]
//! - Wire up middleware (access log, CORS, timeouts, body limit, tracing)
//! - Bind server to listener
//! - Drain in-flight requests on shutdown, bounded by the shutdown timeout

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::{
    limit::RequestBodyLimitLayer,
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

use crate::config::{LogConfig, ServerConfig};
use crate::http::access_log::access_log;
use crate::http::cors;
use crate::http::route::{self, RouteError, RouterSettings, Web};
use crate::lifecycle::shutdown_signal;
use crate::observability::{self, LogGuard, LoggingError};

/// Name used when none is given.
pub const DEFAULT_SERVER_NAME: &str = "default-api-server";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// HTTP server hosting one or more route tables.
#[derive(Debug)]
pub struct HttpServer {
    name: String,
    config: ServerConfig,
    log_config: Option<LogConfig>,
    webs: Vec<Web>,
}

impl HttpServer {
    /// Server with default settings: port 8080, 10 s read/write timeouts,
    /// 5 s shutdown timeout. An empty name becomes [`DEFAULT_SERVER_NAME`].
    pub fn new(name: impl Into<String>) -> Self {
        let mut server = Self {
            name: String::new(),
            config: ServerConfig::default(),
            log_config: None,
            webs: Vec::new(),
        };
        server.set_name(name);
        server
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Logging installed by [`run`](Self::run).
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = Some(log_config);
        self
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.name = if name.is_empty() {
            DEFAULT_SERVER_NAME.to_string()
        } else {
            name
        };
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn register(&mut self, web: Web) -> &mut Self {
        self.webs.push(web);
        self
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Result<Router, RouteError> {
        let settings = RouterSettings {
            envelope: self.config.envelope,
            body_limit: self.config.max_body_bytes,
        };

        let mut resolved = Vec::new();
        for web in &self.webs {
            resolved.extend(web.clone().resolve(settings)?);
        }

        let mut router = route::assemble(resolved)?
            .layer(RequestBodyLimitLayer::new(self.config.max_body_bytes))
            .layer(RequestBodyTimeoutLayer::new(Duration::from_secs(
                self.config.read_timeout_secs,
            )))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.write_timeout_secs)));
        if let Some(cors) = cors::layer(&self.config.cors) {
            router = router.layer(cors);
        }
        Ok(router
            .layer(axum::middleware::from_fn(access_log))
            .layer(TraceLayer::new_for_http()))
    }

    /// Install logging, bind the configured address and serve until
    /// Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        let _guard = match &self.log_config {
            Some(log_config) => match observability::init(&self.name, log_config) {
                Ok(guard) => guard,
                Err(LoggingError::Init(_)) => {
                    tracing::warn!("Logging already initialized; keeping the existing subscriber");
                    LogGuard::default()
                }
                Err(e) => return Err(e.into()),
            },
            None => LogGuard::default(),
        };

        let listener = TcpListener::bind(self.config.bind_address()).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves.
    ///
    /// In-flight requests get the configured shutdown timeout to finish.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router()?;
        let addr = listener.local_addr()?;
        tracing::info!(
            server = %self.name,
            address = %addr,
            "HTTP server starting"
        );

        let draining = Arc::new(Notify::new());
        let notify = Arc::clone(&draining);
        let server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            notify.notify_one();
        })
        .into_future();

        let grace = Duration::from_secs(self.config.shutdown_timeout_secs);
        tokio::select! {
            result = server => result?,
            _ = async {
                draining.notified().await;
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!(
                    server = %self.name,
                    timeout_secs = grace.as_secs(),
                    "Shutdown timeout elapsed; dropping open connections"
                );
            }
        }

        tracing::info!(server = %self.name, "HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let server = HttpServer::new("");
        assert_eq!(server.name(), DEFAULT_SERVER_NAME);
        assert_eq!(server.config().port, 8080);
        assert_eq!(server.config().read_timeout_secs, 10);
        assert_eq!(server.config().write_timeout_secs, 10);
        assert_eq!(server.config().shutdown_timeout_secs, 5);
    }

    #[test]
    fn test_set_name() {
        let mut server = HttpServer::new("orders");
        assert_eq!(server.name(), "orders");
        server.set_name("billing");
        assert_eq!(server.name(), "billing");
    }

    #[test]
    fn test_router_reports_route_errors() {
        let mut server = HttpServer::new("svc");
        let mut web = Web::new("/api");
        let route = web.get("/x");
        web.route(route);
        server.register(web);
        assert!(matches!(server.router(), Err(RouteError::MissingHandler { .. })));
    }
}
