mod error;
mod lookup;

use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use ensrainbow_core::LookupService;

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub lookup: LookupService,
    /// Reported by `/v1/version`.
    pub version: &'static str,
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState) -> Router {
    // Read-only API, so any origin may call it.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/health", get(health))
        .route("/v1/heal/{labelhash}", get(lookup::heal))
        .route("/v1/labels/count", get(lookup::count))
        .route("/v1/version", get(lookup::version))
        .fallback(route_not_found)
        .layer(cors)
        .with_state(Arc::new(state))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn route_not_found() -> error::AppError {
    error::AppError::NotFound("API route not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use ensrainbow_core::codec::{RainbowReader, RainbowWriter};
    use ensrainbow_core::{
        ingest, labelhash, LabelDb, LabelRecord, LabelSetHeader, LabelSetSink,
    };
    use tower::ServiceExt;

    fn test_router(labels: &[&str]) -> (tempfile::TempDir, Router) {
        let tmp = tempfile::tempdir().expect("tempdir must be created");
        let db = LabelDb::create(tmp.path().join("data")).expect("store must be created");

        if !labels.is_empty() {
            let header = LabelSetHeader::new("subgraph", 0);
            let mut writer =
                RainbowWriter::new(Vec::new(), &header).expect("header must encode");
            for label in labels {
                writer
                    .write_record(&LabelRecord::from_label(*label))
                    .expect("record must encode");
            }
            let bytes = writer.into_inner();
            let mut reader = RainbowReader::new(bytes.as_slice()).expect("header must decode");
            ingest(&db, &mut reader).expect("label set 0 must ingest");
        }

        let state = AppState {
            lookup: LookupService::new(Arc::new(db)),
            version: "0.0.0-test",
        };
        (tmp, build_router(state))
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request must build"),
            )
            .await
            .expect("router should serve request");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("response body must be readable");
        let json = serde_json::from_slice(&bytes).expect("response body must be valid JSON");
        (status, json)
    }

    #[tokio::test]
    async fn heal_known_labelhash_returns_label() {
        let (_tmp, router) = test_router(&["vitalik", "ethereum"]);
        let (status, json) =
            get_json(router, &format!("/v1/heal/{}", labelhash("vitalik"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            serde_json::json!({ "status": "success", "label": "vitalik" })
        );
    }

    #[tokio::test]
    async fn heal_unknown_labelhash_returns_404() {
        let (_tmp, router) = test_router(&["vitalik"]);
        let (status, json) =
            get_json(router, &format!("/v1/heal/{}", labelhash("nonexistent"))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            json,
            serde_json::json!({
                "status": "error",
                "error": "Label not found",
                "errorCode": 404,
            })
        );
    }

    #[tokio::test]
    async fn heal_short_labelhash_returns_400_naming_expected_length() {
        let (_tmp, router) = test_router(&["vitalik"]);
        let (status, json) = get_json(router, "/v1/heal/0x1234567890").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errorCode"], 400);
        let message = json["error"].as_str().expect("error must be a string");
        assert!(message.contains("66"), "unexpected message: {message}");
    }

    #[tokio::test]
    async fn count_reports_records_and_rfc3339_timestamp() {
        let (_tmp, router) = test_router(&["vitalik", "ethereum"]);
        let (status, json) = get_json(router, "/v1/labels/count").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["count"], 2);
        let timestamp = json["timestamp"].as_str().expect("timestamp must be a string");
        assert!(time::OffsetDateTime::parse(
            timestamp,
            &time::format_description::well_known::Rfc3339
        )
        .is_ok());
    }

    #[tokio::test]
    async fn count_on_empty_store_is_a_server_error() {
        let (_tmp, router) = test_router(&[]);
        let (status, json) = get_json(router, "/v1/labels/count").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["status"], "error");
        assert_eq!(json["errorCode"], 500);
    }

    #[tokio::test]
    async fn version_reports_applied_label_set() {
        let (_tmp, router) = test_router(&["vitalik"]);
        let (status, json) = get_json(router, "/v1/version").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            serde_json::json!({
                "status": "success",
                "versionInfo": {
                    "version": "0.0.0-test",
                    "schemaVersion": ensrainbow_core::store::SCHEMA_VERSION,
                    "namespace": "subgraph",
                    "highestLabelSetVersion": 0,
                }
            })
        );
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (_tmp, router) = test_router(&[]);
        let (status, json) = get_json(router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn unknown_route_returns_json_404() {
        let (_tmp, router) = test_router(&[]);
        let (status, json) = get_json(router, "/v1/does-not-exist").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            json.get("error").and_then(serde_json::Value::as_str),
            Some("API route not found")
        );
    }
}
