//! Declarative route table.
//!
//! # Responsibilities
//! - Describe routes as (method, path, handler, login requirement, content type)
//! - Group routes under a root prefix ([`Web`])
//! - Turn a [`Web`] into an axum [`Router`] whose handlers run through the wrapper
//!
//! # Design Decisions
//! - Routes require login unless marked [`Route::no_login`]
//! - A route without a handler is a registration error, not a runtime 404
//! - Routes on the same path share one axum `MethodRouter`

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::Method;
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;

use crate::context::RequestContext;
use crate::errors::ApiError;
use crate::http::envelope::EnvelopeStyle;
use crate::http::path;
use crate::http::wrapper::{self, Endpoint};

/// Default bound on the buffered request body.
pub const DEFAULT_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Boxed future returned by [`Handler::call`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), ApiError>> + Send>>;

/// Request handler.
///
/// Implemented for every `async fn(RequestContext) -> Result<(), ApiError>`.
/// Results go into the context (`set_data`, `set_response_file`, ...), the
/// return value only reports failure.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ApiError>> + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> HandlerFuture {
        Box::pin(self(ctx))
    }
}

/// Login check run before handlers of routes that need login.
pub type LoginChecker = Arc<dyn Handler>;

/// Media types a route can declare with [`Route::produces`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentType(&'static str);

impl ContentType {
    pub const JSON: ContentType = ContentType("application/json");
    pub const XML: ContentType = ContentType("application/xml");
    pub const ZIP: ContentType = ContentType("application/zip");
    pub const OCTET_STREAM: ContentType = ContentType("application/octet-stream");
    pub const PROTOBUF: ContentType = ContentType("application/x-protobuf");
    pub const MSGPACK: ContentType = ContentType("application/x-msgpack");
    pub const YAML: ContentType = ContentType("application/x-yaml");
    pub const TOML: ContentType = ContentType("application/toml");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::JSON
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route {method} {path} has no handler")]
    MissingHandler { method: Method, path: String },

    #[error("invalid route path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("route {method} {path} is registered twice")]
    Duplicate { method: Method, path: String },

    #[error("route `{path}` conflicts with `{existing}`")]
    Conflict { path: String, existing: String },

    #[error("method {0} cannot be routed")]
    UnsupportedMethod(Method),
}

/// One entry of the route table.
#[derive(Clone)]
pub struct Route {
    method: Method,
    path: String,
    no_login: bool,
    handler: Option<Arc<dyn Handler>>,
    produces: ContentType,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            no_login: false,
            handler: None,
            produces: ContentType::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    pub fn options(path: impl Into<String>) -> Self {
        Self::new(Method::OPTIONS, path)
    }

    /// Skip the login checker for this route.
    pub fn no_login(mut self) -> Self {
        self.no_login = true;
        self
    }

    pub fn need_login(mut self) -> Self {
        self.no_login = false;
        self
    }

    pub fn handler<H: Handler>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Content type of raw responses that do not set their own.
    pub fn produces(mut self, content_type: ContentType) -> Self {
        self.produces = content_type;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_login_required(&self) -> bool {
        !self.no_login
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    pub fn content_type(&self) -> ContentType {
        self.produces
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("login_required", &self.is_login_required())
            .field("has_handler", &self.has_handler())
            .field("produces", &self.produces)
            .finish()
    }
}

/// Settings the wrapper needs that come from the server rather than the route table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RouterSettings {
    pub(crate) envelope: EnvelopeStyle,
    pub(crate) body_limit: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            envelope: EnvelopeStyle::default(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// A group of routes under a common root.
#[derive(Clone, Default)]
pub struct Web {
    root: String,
    routes: Vec<Route>,
    login_checker: Option<LoginChecker>,
    envelope: Option<EnvelopeStyle>,
}

impl Web {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn root(&mut self, root: impl Into<String>) -> &mut Self {
        self.root = root.into();
        self
    }

    pub fn root_path(&self) -> &str {
        &self.root
    }

    pub fn get(&self, path: impl Into<String>) -> Route {
        Route::get(path)
    }

    pub fn post(&self, path: impl Into<String>) -> Route {
        Route::post(path)
    }

    pub fn put(&self, path: impl Into<String>) -> Route {
        Route::put(path)
    }

    pub fn delete(&self, path: impl Into<String>) -> Route {
        Route::delete(path)
    }

    pub fn patch(&self, path: impl Into<String>) -> Route {
        Route::patch(path)
    }

    pub fn head(&self, path: impl Into<String>) -> Route {
        Route::head(path)
    }

    pub fn options(&self, path: impl Into<String>) -> Route {
        Route::options(path)
    }

    /// Add a route to the table.
    pub fn route(&mut self, route: Route) -> &mut Self {
        self.routes.push(route);
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Checker run before every handler of a route that needs login.
    pub fn login_checker<H: Handler>(&mut self, checker: H) -> &mut Self {
        self.login_checker = Some(Arc::new(checker));
        self
    }

    /// Envelope style for this group, overriding the server's.
    pub fn envelope_style(&mut self, style: EnvelopeStyle) -> &mut Self {
        self.envelope = Some(style);
        self
    }

    /// Router with default settings.
    pub fn into_router(self) -> Result<Router, RouteError> {
        assemble(self.resolve(RouterSettings::default())?)
    }

    /// Resolve every route into an endpoint, in registration order.
    pub(crate) fn resolve(self, settings: RouterSettings) -> Result<Vec<Resolved>, RouteError> {
        let envelope = self.envelope.unwrap_or(settings.envelope);

        let mut resolved = Vec::with_capacity(self.routes.len());
        for route in self.routes {
            let full_path = path::join(&self.root, &route.path);
            let axum_path = path::to_axum(&full_path)?;

            let handler = route.handler.ok_or_else(|| RouteError::MissingHandler {
                method: route.method.clone(),
                path: full_path.clone(),
            })?;
            let filter = MethodFilter::try_from(route.method.clone())
                .map_err(|_| RouteError::UnsupportedMethod(route.method.clone()))?;

            let need_login = !route.no_login;
            resolved.push(Resolved {
                axum_path,
                filter,
                endpoint: Endpoint {
                    method: route.method,
                    route_path: full_path,
                    handler,
                    need_login,
                    login_checker: self.login_checker.clone().filter(|_| need_login),
                    produces: route.produces,
                    envelope,
                    body_limit: settings.body_limit,
                },
            });
        }
        Ok(resolved)
    }
}

/// A route ready to be mounted.
pub(crate) struct Resolved {
    axum_path: String,
    filter: MethodFilter,
    endpoint: Endpoint,
}

/// Mount resolved routes on one router.
///
/// Routes on the same path share one `MethodRouter`; the same method twice
/// on a path, or two patterns matching the same requests, are rejected.
pub(crate) fn assemble(resolved: Vec<Resolved>) -> Result<Router, RouteError> {
    // 1. Group by path, in registration order
    let mut groups: Vec<(String, Vec<(MethodFilter, Endpoint)>)> = Vec::new();
    for Resolved {
        axum_path,
        filter,
        endpoint,
    } in resolved
    {
        let index = match groups.iter().position(|(p, _)| *p == axum_path) {
            Some(index) => index,
            None => {
                if let Some((existing, _)) = groups.iter().find(|(p, _)| path::conflicts(p, &axum_path)) {
                    return Err(RouteError::Conflict {
                        path: endpoint.route_path,
                        existing: existing.clone(),
                    });
                }
                groups.push((axum_path, Vec::new()));
                groups.len() - 1
            }
        };

        let group = &mut groups[index].1;
        if group.iter().any(|(_, e)| e.method == endpoint.method) {
            return Err(RouteError::Duplicate {
                method: endpoint.method,
                path: endpoint.route_path,
            });
        }

        tracing::info!(
            method = %endpoint.method,
            path = %endpoint.route_path,
            login_required = endpoint.need_login,
            "Registered route"
        );
        group.push((filter, endpoint));
    }

    // 2. One MethodRouter per path
    let mut router = Router::new();
    for (axum_path, endpoints) in groups {
        let method_router = endpoints
            .into_iter()
            .fold(MethodRouter::new(), |methods, (filter, endpoint)| {
                let endpoint = Arc::new(endpoint);
                methods.on(filter, move |request: Request| {
                    wrapper::dispatch(Arc::clone(&endpoint), request)
                })
            });
        router = router.route(&axum_path, method_router);
    }
    Ok(router)
}

impl fmt::Debug for Web {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Web")
            .field("root", &self.root)
            .field("routes", &self.routes)
            .field("login_checker", &self.login_checker.is_some())
            .field("envelope", &self.envelope)
            .finish()
    }
}
