//! API route handlers
//!
//! Thin adapters between HTTP and the orchestrator:
//! - analyze a single observation (400 invalid input, 422 fatal run)
//! - analyze a batch sequentially
//! - health and effective configuration

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::config::PipelineConfig;
use crate::pipeline::{Orchestrator, OrchestratorStats, PipelineError, PipelineState};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

impl ApiState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

// ============================================================================
// Request / response bodies
// ============================================================================

/// One engine snapshot: 24 readings (3 operating settings + 21 sensors).
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub values: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub observations: Vec<Vec<f64>>,
}

/// Outcome of one batch entry.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchItem {
    Completed { index: usize, result: Box<PipelineState> },
    Invalid { index: usize, error: String },
    Fatal { index: usize, error: String, partial: Box<PipelineState> },
    Cancelled { index: usize, error: String },
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub items: Vec<BatchItem>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub models: Vec<String>,
    pub similarity_index: &'static str,
    pub narrative_backend: &'static str,
    pub stats: OrchestratorStats,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/analyze
pub async fn analyze(State(state): State<ApiState>, Json(req): Json<AnalyzeRequest>) -> Response {
    match state.orchestrator.run_raw(&req.values).await {
        Ok(result) => ApiResponse::ok(result),
        Err(PipelineError::Validation(e)) => ApiErrorResponse::bad_request(e.to_string()),
        Err(PipelineError::Fatal { stage, cause, partial }) => {
            let message = format!("{stage} stage failed: {cause}");
            let details = serde_json::json!({
                "stage": stage,
                "cause": cause,
                "partial": partial,
            });
            ApiErrorResponse::unprocessable("PIPELINE_FATAL", message, details)
        }
        Err(e @ PipelineError::Cancelled { .. }) => ApiErrorResponse::service_unavailable(e.to_string()),
    }
}

/// POST /api/v1/analyze/batch
///
/// Observations run one after another; a failing entry never aborts the batch.
pub async fn analyze_batch(State(state): State<ApiState>, Json(req): Json<BatchRequest>) -> Response {
    let total = req.observations.len();
    let mut items = Vec::with_capacity(total);

    for (index, values) in req.observations.iter().enumerate() {
        let item = match state.orchestrator.run_raw(values).await {
            Ok(result) => BatchItem::Completed {
                index,
                result: Box::new(result),
            },
            Err(PipelineError::Validation(e)) => BatchItem::Invalid {
                index,
                error: e.to_string(),
            },
            Err(PipelineError::Fatal { stage, cause, partial }) => BatchItem::Fatal {
                index,
                error: format!("{stage} stage failed: {cause}"),
                partial,
            },
            Err(e @ PipelineError::Cancelled { .. }) => BatchItem::Cancelled {
                index,
                error: e.to_string(),
            },
        };
        items.push(item);
    }

    let completed = items
        .iter()
        .filter(|i| matches!(i, BatchItem::Completed { .. }))
        .count();
    if completed < total {
        warn!(total, completed, "Batch finished with failed entries");
    } else {
        info!(total, "Batch complete");
    }

    ApiResponse::ok(BatchSummary {
        total,
        completed,
        failed: total - completed,
        items,
    })
}

/// GET /api/v1/health
pub async fn health(State(state): State<ApiState>) -> Response {
    let orch = &state.orchestrator;
    ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        models: orch.model_ids().to_vec(),
        similarity_index: orch.index_name(),
        narrative_backend: orch.narrator_name(),
        stats: orch.stats(),
    })
}

/// GET /api/v1/config
pub async fn get_config(State(state): State<ApiState>) -> Response {
    let config: &PipelineConfig = state.orchestrator.config();
    ApiResponse::ok(config)
}
