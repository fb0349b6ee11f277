//! CORS layer built from [`CorsConfig`].

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};

use crate::config::CorsConfig;

const WILDCARD: &str = "*";

/// `None` when CORS is disabled.
///
/// With cookies allowed, wildcards are answered by mirroring the request,
/// since browsers refuse `*` together with credentials. Entries that do
/// not parse are skipped; config validation reports them.
pub fn layer(config: &CorsConfig) -> Option<CorsLayer> {
    if !config.enable_cors {
        return None;
    }
    let credentials = config.cookies_allowed;

    let origin = if config.allowed_domains.iter().any(|d| d == WILDCARD) {
        if credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::from(Any)
        }
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_domains
            .iter()
            .filter_map(|d| HeaderValue::from_str(d).ok())
            .collect();
        AllowOrigin::list(origins)
    };

    let methods = if config.allowed_methods.is_empty() || config.allowed_methods.iter().any(|m| m == WILDCARD) {
        if credentials {
            AllowMethods::mirror_request()
        } else {
            AllowMethods::from(Any)
        }
    } else {
        let methods: Vec<Method> = config
            .allowed_methods
            .iter()
            .filter_map(|m| m.to_uppercase().parse().ok())
            .collect();
        AllowMethods::list(methods)
    };

    let headers = if config.allowed_headers.iter().any(|h| h == WILDCARD) {
        if credentials {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::from(Any)
        }
    } else {
        let headers: Vec<HeaderName> = config
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        AllowHeaders::list(headers)
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(credentials),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app(config: &CorsConfig) -> Router {
        let router = Router::new().route("/", get(|| async { "ok" }));
        match layer(config) {
            Some(cors) => router.layer(cors),
            None => router,
        }
    }

    fn config(domains: &[&str], cookies: bool) -> CorsConfig {
        CorsConfig {
            enable_cors: true,
            allowed_headers: vec!["Content-Type".into()],
            allowed_methods: vec!["GET".into(), "POST".into()],
            allowed_domains: domains.iter().map(|d| d.to_string()).collect(),
            cookies_allowed: cookies,
        }
    }

    async fn allow_origin(router: Router, origin: &str) -> Option<String> {
        let request = Request::builder()
            .uri("/")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[test]
    fn test_disabled() {
        assert!(layer(&CorsConfig::default()).is_none());
    }

    #[tokio::test]
    async fn test_listed_origin() {
        let router = app(&config(&["https://a.example"], true));
        assert_eq!(
            allow_origin(router.clone(), "https://a.example").await.as_deref(),
            Some("https://a.example")
        );
        assert_eq!(allow_origin(router, "https://b.example").await, None);
    }

    #[tokio::test]
    async fn test_wildcard_origin() {
        let router = app(&config(&["*"], false));
        assert_eq!(allow_origin(router, "https://b.example").await.as_deref(), Some("*"));
    }

    #[tokio::test]
    async fn test_preflight() {
        let router = app(&config(&["https://a.example"], true));
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/")
            .header(header::ORIGIN, "https://a.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert!(headers[header::ACCESS_CONTROL_ALLOW_METHODS]
            .to_str()
            .unwrap()
            .contains("POST"));
    }
}
