//! HTTP boundary — multipart CSV upload, async analysis, and polling for
//! results. A single in-memory [`DashMap`] registry tracks one entry per
//! analysis id; the graph projection used by the `/graph` endpoint is cached
//! alongside the result once analysis completes.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::graph::{Graph, GraphData};
use crate::ingest;
use crate::scoring::{self, AnalysisResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisStatusResponse {
    pub analysis_id: String,
    pub status: AnalysisStatus,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub analysis_id: String,
    pub status: AnalysisStatus,
    pub message: String,
}

struct AnalysisEntry {
    status: AnalysisStatus,
    error: Option<String>,
    result: Option<AnalysisResult>,
    graph_data: Option<GraphData>,
}

#[derive(Clone)]
pub struct AppState {
    analyses: Arc<DashMap<String, AnalysisEntry>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            analyses: Arc::new(DashMap::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/analyze", axum::routing::post(analyze_upload))
        .route("/api/v1/analysis/:id", get(get_analysis))
        .route("/api/v1/analysis/:id/download", get(download_analysis))
        .route("/api/v1/analysis/:id/graph", get(get_graph))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(Duration::from_secs(120))),
        )
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: message.into() })).into_response()
}

fn not_found(message: impl Into<String>) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorBody { error: message.into() })).into_response()
}

async fn analyze_upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut filename = String::new();
    let mut bytes: Vec<u8> = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => return bad_request(format!("malformed upload: {e}")),
        };
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or_default().to_string();
            bytes = match field.bytes().await {
                Ok(b) => b.to_vec(),
                Err(e) => return bad_request(format!("could not read upload: {e}")),
            };
        }
    }

    if let Err(e) = ingest::validate_upload(&filename, bytes.len()) {
        return bad_request(e.to_string());
    }

    let analysis_id = Uuid::new_v4().to_string();
    state.analyses.insert(
        analysis_id.clone(),
        AnalysisEntry {
            status: AnalysisStatus::Processing,
            error: None,
            result: None,
            graph_data: None,
        },
    );

    let task_state = state.clone();
    let task_id = analysis_id.clone();
    tokio::spawn(async move {
        let join_state = task_state.clone();
        let join_id = task_id.clone();
        if let Err(join_err) = tokio::task::spawn_blocking(move || run_analysis(task_state, task_id, bytes)).await {
            if let Some(mut entry) = join_state.analyses.get_mut(&join_id) {
                entry.status = AnalysisStatus::Failed;
                entry.error = Some(format!("analysis task panicked: {join_err}"));
            }
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            analysis_id,
            status: AnalysisStatus::Processing,
            message: "upload accepted, analysis is running".to_string(),
        }),
    )
        .into_response()
}

fn run_analysis(state: AppState, analysis_id: String, bytes: Vec<u8>) {
    let outcome = ingest::table_from_csv(&bytes).map(|table| {
        let graph = Graph::build(&table);
        let result = scoring::analyze(&table);
        let scores = result
            .suspicious_accounts
            .iter()
            .map(|s| (s.account.clone(), s.suspicion_score))
            .collect();
        let ring_map = result
            .suspicious_accounts
            .iter()
            .map(|s| (s.account.clone(), s.ring_ids.clone()))
            .collect();
        let pattern_map = result
            .suspicious_accounts
            .iter()
            .map(|s| (s.account.clone(), s.detected_patterns.clone()))
            .collect();
        let graph_data = graph.to_graph_data(&scores, &ring_map, &pattern_map);
        (result, graph_data)
    });

    if let Some(mut entry) = state.analyses.get_mut(&analysis_id) {
        match outcome {
            Ok((result, graph_data)) => {
                entry.status = AnalysisStatus::Completed;
                entry.result = Some(result);
                entry.graph_data = Some(graph_data);
            }
            Err(e) => {
                entry.status = AnalysisStatus::Failed;
                entry.error = Some(e.to_string());
            }
        }
    }
}

async fn get_analysis(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.analyses.get(&id) {
        Some(entry) => Json(AnalysisStatusResponse {
            analysis_id: id,
            status: entry.status,
            result: entry.result.clone(),
            error: entry.error.clone(),
        })
        .into_response(),
        None => not_found(format!("no analysis with id {id}")),
    }
}

async fn download_analysis(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(entry) = state.analyses.get(&id) else {
        return not_found(format!("no analysis with id {id}"));
    };
    let Some(result) = entry.result.clone() else {
        return bad_request("analysis is not complete yet");
    };
    let body = match serde_json::to_vec_pretty(&result) {
        Ok(b) => b,
        Err(e) => return bad_request(format!("could not serialize analysis: {e}")),
    };
    let filename = format!("fraud_analysis_{id}_{}.json", Utc::now().format("%Y%m%dT%H%M%SZ"));
    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

async fn get_graph(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.analyses.get(&id) {
        Some(entry) if entry.status == AnalysisStatus::Completed => {
            Json(entry.graph_data.clone()).into_response()
        }
        Some(_) => bad_request("analysis is not complete yet"),
        None => not_found(format!("no analysis with id {id}")),
    }
}
