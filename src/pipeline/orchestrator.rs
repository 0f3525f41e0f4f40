//! Orchestrator - fixed-order execution of the five diagnosis stages
//!
//! ```text
//! SensorObservation
//!   → Prediction → Diagnosis → Risk → Scheduling → Explanation
//!   → PipelineState (all five slots populated)
//! ```
//!
//! The orchestrator owns no per-run state: each run gets a fresh
//! `PipelineState`. After every stage it records a journal entry and checks
//! the outcome. A fatal outcome stops the run and hands the partial state
//! back inside `PipelineError::Fatal`. The orchestrator never retries.

use super::state::{
    FatalCause, PipelineError, PipelineResult, PipelineState, StageName, StageOutcome,
    StageRecord, StageStatus,
};
use crate::agents::{self, Stage};
use crate::config::PipelineConfig;
use crate::context::{signature_len, InMemoryIndex, IndexError, SimilarityIndex};
use crate::llm::{self, NarrativeError, NarrativeGenerator};
use crate::models::{ModelError, ModelRegistry};
use crate::types::{SensorObservation, OBSERVATION_LEN};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Failure to assemble the production collaborators from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("model registry: {0}")]
    Models(#[from] ModelError),

    #[error("similarity index: {0}")]
    Index(#[from] IndexError),

    #[error("narrative backend: {0}")]
    Narrative(#[from] NarrativeError),
}

/// Run counters
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OrchestratorStats {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_degraded: u64,
    pub runs_failed: u64,
    pub runs_cancelled: u64,
}

pub struct Orchestrator {
    config: Arc<PipelineConfig>,
    stages: Vec<Box<dyn Stage>>,
    model_ids: Vec<String>,
    index_name: &'static str,
    narrator_name: &'static str,
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    runs_degraded: AtomicU64,
    runs_failed: AtomicU64,
    runs_cancelled: AtomicU64,
}

impl Orchestrator {
    /// Build with explicitly injected collaborators.
    pub fn new(
        config: Arc<PipelineConfig>,
        registry: ModelRegistry,
        index: Arc<dyn SimilarityIndex>,
        narrator: Arc<dyn NarrativeGenerator>,
    ) -> Self {
        let model_ids = registry.model_ids();
        let index_name = index.index_name();
        let narrator_name = narrator.backend_name();
        let stages = agents::default_stages(config.clone(), registry, index, narrator);
        Self::with_stages(config, stages, model_ids, index_name, narrator_name)
    }

    fn with_stages(
        config: Arc<PipelineConfig>,
        stages: Vec<Box<dyn Stage>>,
        model_ids: Vec<String>,
        index_name: &'static str,
        narrator_name: &'static str,
    ) -> Self {
        Self {
            config,
            stages,
            model_ids,
            index_name,
            narrator_name,
            runs_started: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_degraded: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            runs_cancelled: AtomicU64::new(0),
        }
    }

    /// Build the production collaborators described by the configuration:
    /// one HTTP model per `[[models]]` entry, the case library from
    /// `similarity.cases_path` (empty without one), and the `[narrative]` backend.
    pub fn from_config(config: Arc<PipelineConfig>) -> Result<Self, SetupError> {
        let registry = ModelRegistry::from_config(&config)?;
        let dimension = signature_len(OBSERVATION_LEN);
        let index: Arc<dyn SimilarityIndex> = match &config.similarity.cases_path {
            Some(path) => Arc::new(InMemoryIndex::load_from_file(path, dimension)?),
            None => {
                warn!("No similarity.cases_path configured, historical case library is empty");
                Arc::new(InMemoryIndex::with_dimension(dimension))
            }
        };
        let narrator = llm::from_config(&config.narrative)?;

        info!(
            models = registry.len(),
            index = index.index_name(),
            cases = index.case_count(),
            narrative = narrator.backend_name(),
            "Orchestrator ready"
        );
        Ok(Self::new(config, registry, index, narrator))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model_ids(&self) -> &[String] {
        &self.model_ids
    }

    pub fn index_name(&self) -> &'static str {
        self.index_name
    }

    pub fn narrator_name(&self) -> &'static str {
        self.narrator_name
    }

    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_degraded: self.runs_degraded.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_cancelled: self.runs_cancelled.load(Ordering::Relaxed),
        }
    }

    /// Run the five stages over a validated observation.
    pub async fn run(&self, observation: SensorObservation) -> PipelineResult {
        self.execute(observation, None).await
    }

    /// Validate raw readings, then run. Malformed input never reaches a stage.
    pub async fn run_raw(&self, values: &[f64]) -> PipelineResult {
        let observation = SensorObservation::new(values)?;
        self.run(observation).await
    }

    /// Run with cooperative cancellation. When `cancel` fires, the in-flight
    /// stage future is dropped (cancelling its external calls) and no state
    /// is returned.
    pub async fn run_with_cancel(
        &self,
        observation: SensorObservation,
        cancel: CancellationToken,
    ) -> PipelineResult {
        self.execute(observation, Some(&cancel)).await
    }

    async fn execute(
        &self,
        observation: SensorObservation,
        cancel: Option<&CancellationToken>,
    ) -> PipelineResult {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        let mut state = PipelineState::new(observation);
        let run_started = Instant::now();

        for stage in &self.stages {
            let name = stage.name();
            let started = Instant::now();

            let outcome = match cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        () = token.cancelled() => None,
                        outcome = stage.run(&mut state) => Some(outcome),
                    }
                }
                None => Some(stage.run(&mut state).await),
            };
            let Some(outcome) = outcome else {
                self.runs_cancelled.fetch_add(1, Ordering::Relaxed);
                warn!(run_id = %state.run_id, stage = %name, "Pipeline cancelled");
                return Err(PipelineError::Cancelled { stage: name });
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match outcome {
                StageOutcome::Completed => {
                    state.record(StageRecord {
                        stage: name,
                        status: StageStatus::Completed,
                        notes: Vec::new(),
                        elapsed_ms,
                    });
                }
                StageOutcome::Degraded(notes) => {
                    warn!(run_id = %state.run_id, stage = %name, notes = ?notes, "Stage degraded");
                    state.record(StageRecord {
                        stage: name,
                        status: StageStatus::Degraded,
                        notes,
                        elapsed_ms,
                    });
                }
                StageOutcome::Fatal(cause) => {
                    return Err(self.fail(state, name, cause, elapsed_ms));
                }
            }
        }

        if !state.is_complete() {
            let cause = FatalCause::contract("run finished with unpopulated result slots");
            return Err(self.fail(state, StageName::Explanation, cause, 0));
        }

        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        if state.is_degraded() {
            self.runs_degraded.fetch_add(1, Ordering::Relaxed);
        }
        info!(
            run_id = %state.run_id,
            elapsed_ms = run_started.elapsed().as_millis() as u64,
            degraded = state.is_degraded(),
            "Pipeline complete"
        );
        Ok(state)
    }

    fn fail(
        &self,
        mut state: PipelineState,
        stage: StageName,
        cause: FatalCause,
        elapsed_ms: u64,
    ) -> PipelineError {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        error!(run_id = %state.run_id, stage = %stage, cause = %cause, "Pipeline aborted");
        state.record(StageRecord {
            stage,
            status: StageStatus::Fatal,
            notes: vec![cause.to_string()],
            elapsed_ms,
        });
        PipelineError::Fatal {
            stage,
            cause,
            partial: Box::new(state),
        }
    }
}
