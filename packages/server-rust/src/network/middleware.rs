//! Transport middleware wrapped around the query routes.

use std::time::Duration;

use axum::extract::Request;
use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Span};

use super::config::NetworkConfig;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// How long browsers may cache a CORS preflight answer.
const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(600);

/// Wraps `router` in the HTTP middleware, from the outside in:
///
/// 1. a caller-supplied `x-request-id` is kept, otherwise a UUID is assigned
/// 2. the id is echoed on every response, timeouts included
/// 3. one `http_request` span per request, tagged with the id
/// 4. gzip for large result pages
/// 5. CORS for the configured origins, read-only methods
/// 6. `408` once `request_timeout` elapses
pub fn with_http_layers<S>(router: Router<S>, config: &NetworkConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // Router::layer wraps what is already there, so the innermost layer comes first.
    router
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(cors_layer(&config.cors_origins))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

fn request_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id,
    )
}

/// `"*"` allows any origin; otherwise each parseable origin is allow-listed
/// and the rest are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::HEAD])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .max_age(PREFLIGHT_MAX_AGE)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    fn app(config: &NetworkConfig) -> Router {
        let router = Router::new()
            .route("/fast", get(|| async { "ok" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    "late"
                }),
            );
        with_http_layers(router, config)
    }

    fn header_value<'a>(response: &'a axum::response::Response, name: &str) -> Option<&'a str> {
        response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn request_id_is_assigned_or_echoed() {
        let app = app(&NetworkConfig::default());

        let response = app
            .clone()
            .oneshot(Request::get("/fast").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let assigned = header_value(&response, REQUEST_ID_HEADER).unwrap();
        assert_eq!(assigned.len(), 36);

        let response = app
            .oneshot(
                Request::get("/fast")
                    .header(REQUEST_ID_HEADER, "trace-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(header_value(&response, REQUEST_ID_HEADER), Some("trace-42"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_request_times_out_with_408() {
        let app = app(&NetworkConfig {
            request_timeout: Duration::from_millis(50),
            ..NetworkConfig::default()
        });

        let response = app
            .oneshot(
                Request::get("/slow")
                    .header(REQUEST_ID_HEADER, "slow-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(header_value(&response, REQUEST_ID_HEADER), Some("slow-1"));
    }

    #[tokio::test]
    async fn cors_allows_listed_origin_and_exposes_request_id() {
        let app = app(&NetworkConfig {
            cors_origins: vec!["https://shop.example.com".into(), "not a url\n".into()],
            ..NetworkConfig::default()
        });

        let response = app
            .clone()
            .oneshot(
                Request::get("/fast")
                    .header(header::ORIGIN, "https://shop.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            header_value(&response, "access-control-allow-origin"),
            Some("https://shop.example.com")
        );
        assert!(header_value(&response, "access-control-expose-headers")
            .unwrap()
            .contains(REQUEST_ID_HEADER));

        let preflight = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/fast")
                    .header(header::ORIGIN, "https://elsewhere.example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(header_value(&preflight, "access-control-allow-origin"), None);
    }
}
