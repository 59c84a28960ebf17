//! Route configuration and setup

use crate::handlers;
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use flipfile_core::Config;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes.
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;

    // Conversion routes are throttled; meta and download routes are not.
    let convert_routes = Router::new()
        .route("/convert/pdf-to-word", post(handlers::convert::pdf_to_word))
        .route("/convert/word-to-pdf", post(handlers::convert::word_to_pdf))
        .route("/convert/merge-pdf", post(handlers::convert::merge_pdf))
        .route(
            "/convert/pdf-to-images",
            post(handlers::convert::pdf_to_images),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let open_routes = Router::new()
        .route("/", get(handlers::meta::root))
        .route("/health", get(handlers::meta::health_check))
        .route("/download/{filename}", get(handlers::download::download));

    // A merge can carry up to ten files plus multipart framing.
    let body_limit = config.max_file_size_bytes() * 10 + 1024 * 1024;

    let app = open_routes
        .merge(convert_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
    };

    Ok(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ConversionService;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use flipfile_convert::CapabilitySet;
    use flipfile_infra::{RateLimiter, StorageJanitor};
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn test_app(root: &std::path::Path) -> Router {
        let config = Config::from_env().unwrap();
        let janitor = StorageJanitor::new(root).await.unwrap();
        let capabilities = CapabilitySet::assume_all();
        let conversions = ConversionService::new(
            janitor.clone(),
            capabilities.clone(),
            HashMap::new(),
            1024 * 1024,
            Duration::from_secs(3600),
        );
        let state = Arc::new(AppState {
            config: config.clone(),
            capabilities,
            janitor,
            limiter: Arc::new(RateLimiter::new(100, Duration::from_secs(60))),
            conversions,
        });
        setup_routes(&config, state).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_banner() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path()).await;

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert!(json.get("message").is_some());
    }

    #[tokio::test]
    async fn test_health_reports_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path()).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert!(json["dependencies"]["pdf_write"].as_bool().is_some());
        assert!(json.get("timestamp").is_some());
        assert!(json.get("version").is_some());
    }

    #[tokio::test]
    async fn test_download_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path()).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/download/..%2F..%2Fetc%2Fpasswd")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path()).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/download/no-such-file.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = body_json(response).await;
        assert_eq!(json["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_download_serves_persisted_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path()).await;

        std::fs::write(dir.path().join("ready.pdf"), b"%PDF-stub").unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/download/ready.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/pdf"
        );
        assert!(response
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("attachment"));
    }

    #[tokio::test]
    async fn test_convert_without_driver_is_503() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path()).await;

        // No drivers registered in the test state, so the route must refuse.
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"file\"; filename=\"a.pdf\"\r\n",
            "Content-Type: application/pdf\r\n\r\n",
            "%PDF-stub\r\n",
            "--XBOUNDARY--\r\n"
        );
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/convert/pdf-to-word")
                    .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unavailable_route_refuses_without_spending_rate_budget() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_env().unwrap();
        let janitor = StorageJanitor::new(dir.path()).await.unwrap();
        let capabilities = CapabilitySet::assume_all().without_rasterizer();
        let conversions = ConversionService::new(
            janitor.clone(),
            capabilities.clone(),
            HashMap::new(),
            1024 * 1024,
            Duration::from_secs(3600),
        );
        let state = Arc::new(AppState {
            config: config.clone(),
            capabilities,
            janitor,
            limiter: Arc::new(RateLimiter::new(1, Duration::from_secs(60))),
            conversions,
        });
        let app = setup_routes(&config, state).unwrap();

        let request = |uri: &str| {
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
                .header("content-type", "multipart/form-data; boundary=X")
                .body(Body::from("--X--\r\n"))
                .unwrap()
        };

        // Repeated hits on the disabled route stay 503, never 429.
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request("/convert/pdf-to-images"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }

        // The budget of one is still unspent for an available route.
        let response = app.oneshot(request("/convert/merge-pdf")).await.unwrap();
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_rate_limit_denies_after_budget() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_env().unwrap();
        let janitor = StorageJanitor::new(dir.path()).await.unwrap();
        let capabilities = CapabilitySet::assume_all();
        let conversions = ConversionService::new(
            janitor.clone(),
            capabilities.clone(),
            HashMap::new(),
            1024 * 1024,
            Duration::from_secs(3600),
        );
        let state = Arc::new(AppState {
            config: config.clone(),
            capabilities,
            janitor,
            limiter: Arc::new(RateLimiter::new(1, Duration::from_secs(60))),
            conversions,
        });
        let app = setup_routes(&config, state).unwrap();

        let request = || {
            Request::builder()
                .method("POST")
                .uri("/convert/merge-pdf")
                .header("x-forwarded-for", "203.0.113.5, 10.0.0.1")
                .header("content-type", "multipart/form-data; boundary=X")
                .body(Body::from("--X--\r\n"))
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_ne!(first.status(), StatusCode::TOO_MANY_REQUESTS);

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().get("Retry-After").is_some());
    }
}
