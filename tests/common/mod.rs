//! Shared stub collaborators for integration tests.
//!
//! None of these contact a real backend.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use turbofan_diag::config::defaults::NOMINAL_CHANNELS;
use turbofan_diag::config::PipelineConfig;
use turbofan_diag::context::{IndexError, SimilarityIndex};
use turbofan_diag::llm::{NarrativeError, NarrativeGenerator};
use turbofan_diag::models::{ModelError, ModelPredictor, ModelRegistry};
use turbofan_diag::pipeline::Orchestrator;
use turbofan_diag::types::{HistoricalCase, PredictionResult, SensorObservation};

// ============================================================================
// Models
// ============================================================================

enum Behaviour {
    Answer { rul: f64, failure_probability: f64 },
    Fail,
    Hang(Duration),
}

pub struct StubModel {
    id: String,
    behaviour: Behaviour,
    component_probs: Option<BTreeMap<String, f64>>,
}

impl StubModel {
    pub fn answering(id: &str, rul: f64, failure_probability: f64) -> Arc<dyn ModelPredictor> {
        Arc::new(Self {
            id: id.to_string(),
            behaviour: Behaviour::Answer { rul, failure_probability },
            component_probs: None,
        })
    }

    pub fn with_components(
        id: &str,
        rul: f64,
        failure_probability: f64,
        probs: &[(&str, f64)],
    ) -> Arc<dyn ModelPredictor> {
        Arc::new(Self {
            id: id.to_string(),
            behaviour: Behaviour::Answer { rul, failure_probability },
            component_probs: Some(probs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()),
        })
    }

    pub fn failing(id: &str) -> Arc<dyn ModelPredictor> {
        Arc::new(Self {
            id: id.to_string(),
            behaviour: Behaviour::Fail,
            component_probs: None,
        })
    }

    pub fn hanging(id: &str, delay: Duration) -> Arc<dyn ModelPredictor> {
        Arc::new(Self {
            id: id.to_string(),
            behaviour: Behaviour::Hang(delay),
            component_probs: None,
        })
    }
}

#[async_trait]
impl ModelPredictor for StubModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn predict(&self, _observation: &SensorObservation) -> Result<PredictionResult, ModelError> {
        match self.behaviour {
            Behaviour::Answer { rul, failure_probability } => Ok(PredictionResult {
                model_id: self.id.clone(),
                rul,
                failure_probability,
                component_probs: self.component_probs.clone(),
            }),
            Behaviour::Fail => Err(ModelError::Transport("connection refused".to_string())),
            Behaviour::Hang(delay) => {
                tokio::time::sleep(delay).await;
                Err(ModelError::Transport("woke up too late".to_string()))
            }
        }
    }
}

// ============================================================================
// Similarity index
// ============================================================================

/// Returns a fixed case list, or a fixed error, optionally after a delay.
pub struct StaticIndex {
    cases: Result<Vec<HistoricalCase>, IndexError>,
    delay: Option<Duration>,
}

impl StaticIndex {
    pub fn empty() -> Arc<dyn SimilarityIndex> {
        Arc::new(Self {
            cases: Ok(Vec::new()),
            delay: None,
        })
    }

    pub fn with_cases(cases: &[(&str, f64)]) -> Arc<dyn SimilarityIndex> {
        let cases = cases
            .iter()
            .map(|(label, distance)| HistoricalCase {
                signature: Vec::new(),
                component_label: (*label).to_string(),
                distance: *distance,
            })
            .collect();
        Arc::new(Self {
            cases: Ok(cases),
            delay: None,
        })
    }

    pub fn broken() -> Arc<dyn SimilarityIndex> {
        Arc::new(Self {
            cases: Err(IndexError::Unavailable("case store offline".to_string())),
            delay: None,
        })
    }

    /// Answers with one HPC case, but only after `delay`.
    pub fn hanging(delay: Duration) -> Arc<dyn SimilarityIndex> {
        Arc::new(Self {
            cases: Ok(vec![HistoricalCase {
                signature: Vec::new(),
                component_label: "HPC".to_string(),
                distance: 0.1,
            }]),
            delay: Some(delay),
        })
    }
}

#[async_trait]
impl SimilarityIndex for StaticIndex {
    async fn nearest(&self, _signature: &[f64], k: usize) -> Result<Vec<HistoricalCase>, IndexError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.cases
            .as_ref()
            .map(|cases| cases.iter().take(k).cloned().collect())
            .map_err(Clone::clone)
    }

    fn index_name(&self) -> &'static str {
        "static"
    }

    fn case_count(&self) -> usize {
        self.cases.as_ref().map_or(0, Vec::len)
    }
}

// ============================================================================
// Narrative backend
// ============================================================================

/// Plays back a script of responses, one per call; repeats the last entry.
pub struct ScriptedNarrator {
    script: Mutex<Vec<Result<String, NarrativeError>>>,
    calls: AtomicU32,
}

impl ScriptedNarrator {
    pub fn new(script: Vec<Result<String, NarrativeError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NarrativeGenerator for ScriptedNarrator {
    async fn generate(&self, _prompt: &str) -> Result<String, NarrativeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script
                .first()
                .cloned()
                .unwrap_or(Err(NarrativeError::Empty))
        }
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Every channel at its nominal value.
pub fn nominal_values() -> Vec<f64> {
    NOMINAL_CHANNELS.iter().map(|(_, nominal, _)| *nominal).collect()
}

pub fn nominal_observation() -> SensorObservation {
    SensorObservation::new(&nominal_values()).unwrap()
}

/// Short timeouts, no diagnosis reasoning (keeps narrator call counts exact).
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.timeouts.model_ms = 100;
    config.timeouts.similarity_ms = 100;
    config.timeouts.narrative_ms = 100;
    config.diagnosis.llm_reasoning = false;
    config
}

pub fn orchestrator(
    config: PipelineConfig,
    models: Vec<Arc<dyn ModelPredictor>>,
    index: Arc<dyn SimilarityIndex>,
    narrator: Arc<dyn NarrativeGenerator>,
) -> Orchestrator {
    let registry = ModelRegistry::new(models, config.timeouts.model()).unwrap();
    Orchestrator::new(Arc::new(config), registry, index, narrator)
}

pub fn healthy_models() -> Vec<Arc<dyn ModelPredictor>> {
    vec![
        StubModel::answering("fd001", 150.0, 0.05),
        StubModel::answering("fd002", 140.0, 0.04),
        StubModel::answering("fd003", 160.0, 0.06),
    ]
}
