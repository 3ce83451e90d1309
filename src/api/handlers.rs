//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::AppState;
use super::types::{ErrorResponse, TelemetryQuery};

fn error(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

/// `GET /reports` → 200 + comparison report JSON
pub async fn get_reports(State(state): State<Arc<AppState>>) -> Response {
    Json(&state.report).into_response()
}

/// Returns one algorithm's tick records, optionally filtered by tick range.
///
/// `GET /telemetry/{algorithm}` → 200 + records
/// `GET /telemetry/{algorithm}?from=N&to=M` → inclusive range
/// `GET /telemetry/{algorithm}?from=10&to=5` → 400
/// unknown algorithm → 404
pub async fn get_telemetry(
    State(state): State<Arc<AppState>>,
    Path(algorithm): Path<String>,
    Query(query): Query<TelemetryQuery>,
) -> Response {
    let (from, to) = match query.bounds() {
        Ok(b) => b,
        Err(msg) => return error(StatusCode::BAD_REQUEST, msg),
    };
    let Some(trace) = state.report.trace(&algorithm) else {
        return error(
            StatusCode::NOT_FOUND,
            format!("no algorithm named \"{algorithm}\""),
        );
    };
    let records: Vec<_> = trace
        .iter()
        .filter(|r| r.tick >= from && r.tick <= to)
        .collect();
    Json(records).into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::config::ScenarioConfig;
    use crate::runner::{RunOptions, run_comparison};

    fn make_test_state() -> Arc<AppState> {
        let mut cfg = ScenarioConfig::standard();
        cfg.simulation.duration_ticks = 24;
        let report = run_comparison(&cfg, &RunOptions::default()).unwrap();
        Arc::new(AppState { report })
    }

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let app = router(make_test_state());
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn reports_returns_200() {
        let (status, json) = get("/reports").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reports"].as_array().map(Vec::len), Some(4));
        assert!(json.get("scenario").is_some());
        assert_eq!(json["baseline"], "Always-On");
    }

    #[tokio::test]
    async fn telemetry_returns_all_ticks() {
        let (status, json) = get("/telemetry/Always-On").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().map(Vec::len), Some(24));
    }

    #[tokio::test]
    async fn telemetry_range_query() {
        let (status, json) = get("/telemetry/NAHEO-Controller?from=5&to=10").await;
        assert_eq!(status, StatusCode::OK);
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 6); // ticks 5..=10
        assert_eq!(rows[0]["tick"], 5);
        assert_eq!(rows[5]["tick"], 10);
        assert!(rows[0]["diagnostics"].is_object());
    }

    #[tokio::test]
    async fn telemetry_invalid_range_returns_400() {
        let (status, json) = get("/telemetry/Always-On?from=10&to=5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn unknown_algorithm_returns_404() {
        let (status, json) = get("/telemetry/nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("nobody"));
    }
}
