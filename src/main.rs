//! Reftree - HTTP service turning flat document records into nested trees.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use reftree::config::ServiceConfig;
use reftree::{convert_input_with, convert_validated, validate_value, ConvertOptions, Error, Input};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<ServiceConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "reftree=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;
    info!("Loaded config: {:?}", config);

    let bind_addr = config.bind_addr.clone();
    let app = router(config);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(config: ServiceConfig) -> Router {
    let body_limit = config.max_body_bytes;
    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .route("/health", get(health))
        .route("/convert", post(convert))
        .route("/validate", post(validate))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Convert flat input documents into nested output.
async fn convert(State(state): State<AppState>, Json(input): Json<Input>) -> Response {
    convert_response(&input, &state.config)
}

/// Check an arbitrary JSON body against the output shape.
async fn validate(Json(body): Json<serde_json::Value>) -> Response {
    match validate_value(&body) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(violation) => {
            info!("Rejected output: {}", violation);
            (StatusCode::UNPROCESSABLE_ENTITY, Json(violation)).into_response()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Conversion stays synchronous; the response is built before returning.
fn convert_response(input: &Input, config: &ServiceConfig) -> Response {
    let options = ConvertOptions {
        max_depth: config.max_depth,
    };
    if !config.validate_output {
        return Json(convert_input_with(input, &options)).into_response();
    }

    match convert_validated(input, &options) {
        Ok(output) => Json(output).into_response(),
        Err(Error::Schema(violation)) => {
            error!("Converted output failed validation: {}", violation);
            (StatusCode::INTERNAL_SERVER_ERROR, violation.to_string()).into_response()
        }
        Err(e) => {
            error!("Conversion failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const INPUT: &str = include_str!("../fixtures/input.json");

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(ServiceConfig::default())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_convert_fixture() {
        let response = router(ServiceConfig::default())
            .oneshot(post_json("/convert", INPUT))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["documents"][0]["entities"].as_array().unwrap().len(), 14);
        assert_eq!(body["documents"][0]["annotations"].as_array().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_convert_reports_invalid_output() {
        let input = r#"{"documents": [{"id": "d1", "annotations": [{"id": "a1", "entityId": "ghost", "value": 1}]}]}"#;

        let response = router(ServiceConfig::default())
            .oneshot(post_json("/convert", input))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let unchecked = ServiceConfig {
            validate_output: false,
            ..ServiceConfig::default()
        };
        let response = router(unchecked)
            .oneshot(post_json("/convert", input))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_validate_endpoint() {
        let response = router(ServiceConfig::default())
            .oneshot(post_json("/validate", r#"{"documents": []}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router(ServiceConfig::default())
            .oneshot(post_json("/validate", r#"{"documents": [{"id": ""}]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["path"], "$.documents[0].id");
    }

    #[tokio::test]
    async fn test_convert_deep_chain() {
        let entities: Vec<serde_json::Value> = (0..5_000)
            .map(|i| {
                let refs: Vec<String> = if i == 0 { vec![] } else { vec![format!("e{}", i - 1)] };
                serde_json::json!({ "id": format!("e{}", i), "name": format!("e{}", i), "type": "REGEX", "class": "ENTITY", "refs": refs })
            })
            .collect();
        let body = serde_json::json!({ "documents": [{ "id": "deep", "entities": entities }] });
        let config = ServiceConfig {
            max_depth: 16,
            ..ServiceConfig::default()
        };

        let response = router(config)
            .oneshot(post_json("/convert", &body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["documents"][0]["entities"].as_array().unwrap().len(), 5_000);
    }
}
