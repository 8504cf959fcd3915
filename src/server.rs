//! REST API surface over the audit engine.

use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::audit::{run_gke_audit, run_schema_audits, run_sql_audit};
use crate::baseline::BaselineSet;
use crate::config::Config;
use crate::report::{DriftReport, SchemaAuditReport};

#[derive(Clone)]
struct ApiState {
    config: Config,
    baselines: BaselineSet,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

pub async fn run_server(config: Config, baselines: BaselineSet, addr: SocketAddr) -> Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = ApiState { config, baselines };
    let app = Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/baselines", get(baseline_summary))
        .route("/api/report/sql", get(sql_report))
        .route("/api/report/gke", get(gke_report))
        .route("/api/report/schema", get(schema_report))
        .layer(cors)
        .with_state(state);

    info!("starting drift-sentinel API on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> &'static str {
    "drift-sentinel API"
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
struct BaselineSummary {
    name: String,
    kind: &'static str,
    filter_labels: usize,
}

async fn baseline_summary(State(state): State<ApiState>) -> Json<ApiResponse<Vec<BaselineSummary>>> {
    let mut summaries = Vec::new();
    for baseline in &state.baselines.sql {
        summaries.push(BaselineSummary {
            name: baseline.name.clone(),
            kind: "sql",
            filter_labels: baseline.filter_labels.len(),
        });
    }
    for baseline in &state.baselines.gke {
        summaries.push(BaselineSummary {
            name: baseline.name.clone(),
            kind: "gke",
            filter_labels: baseline.filter_labels.len(),
        });
    }
    for audit in &state.baselines.schema {
        summaries.push(BaselineSummary {
            name: audit.name.clone(),
            kind: "schema",
            filter_labels: 0,
        });
    }
    ok(summaries)
}

async fn sql_report(State(state): State<ApiState>) -> ApiResult<DriftReport> {
    let report = run_sql_audit(&state.config, &state.baselines, None)
        .await
        .map_err(ApiError::internal)?;
    Ok(ok(report))
}

async fn gke_report(State(state): State<ApiState>) -> ApiResult<DriftReport> {
    let report = run_gke_audit(&state.config, &state.baselines, None)
        .await
        .map_err(ApiError::internal)?;
    Ok(ok(report))
}

async fn schema_report(State(state): State<ApiState>) -> Json<ApiResponse<SchemaAuditReport>> {
    let report = run_schema_audits(&state.config, &state.baselines, None).await;
    ok(report)
}
