//! Regime Models
//!
//! Each predictor wraps one trained model (one per operating regime /
//! fault-mode dataset). The registry fans a single observation out to all of
//! them concurrently, bounds every call with a timeout, and sanitises what
//! comes back before anything downstream sees it.

use crate::config::PipelineConfig;
use crate::types::{normalize_component_label, ModelFailure, PredictionResult, SensorObservation};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

mod http;

pub use http::HttpModel;

/// Why a single model produced no usable prediction, or could not be registered.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid output: {0}")]
    InvalidOutput(String),

    #[error("duplicate model id '{0}'")]
    DuplicateId(String),
}

/// A trained remaining-useful-life model.
#[async_trait]
pub trait ModelPredictor: Send + Sync {
    /// Stable identifier, e.g. `fd001`
    fn model_id(&self) -> &str;

    /// Predict RUL, failure probability and (optionally) component probabilities.
    async fn predict(&self, observation: &SensorObservation) -> Result<PredictionResult, ModelError>;
}

/// The set of models consulted by the prediction stage.
#[derive(Clone)]
pub struct ModelRegistry {
    models: Vec<Arc<dyn ModelPredictor>>,
    timeout: Duration,
}

impl ModelRegistry {
    /// Model ids key the ensemble, so they must be unique.
    pub fn new(models: Vec<Arc<dyn ModelPredictor>>, timeout: Duration) -> Result<Self, ModelError> {
        let mut seen = BTreeSet::new();
        for model in &models {
            if !seen.insert(model.model_id()) {
                return Err(ModelError::DuplicateId(model.model_id().to_string()));
            }
        }
        Ok(Self { models, timeout })
    }

    /// One `HttpModel` per `[[models]]` entry.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ModelError> {
        let models = config
            .models
            .iter()
            .map(|m| {
                HttpModel::new(&m.id, &m.endpoint, config.timeouts.model())
                    .map(|model| Arc::new(model) as Arc<dyn ModelPredictor>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(models, config.timeouts.model())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.models.iter().map(|m| m.model_id().to_string()).collect()
    }

    /// Query every model concurrently.
    ///
    /// Returns the sanitised successes keyed by model id, and one
    /// `ModelFailure` per model that errored, timed out, or returned
    /// unusable output. Never fails as a whole.
    pub async fn predict_all(
        &self,
        observation: &SensorObservation,
    ) -> (BTreeMap<String, PredictionResult>, Vec<ModelFailure>) {
        let timeout_ms = self.timeout.as_millis() as u64;
        let calls = self.models.iter().map(|model| async move {
            let outcome = match tokio::time::timeout(self.timeout, model.predict(observation)).await {
                Ok(result) => result.and_then(|r| sanitize_prediction(model.model_id(), r)),
                Err(_) => Err(ModelError::Timeout(timeout_ms)),
            };
            (model.model_id().to_string(), outcome)
        });

        let mut successes = BTreeMap::new();
        let mut failures = Vec::new();
        for (model_id, outcome) in join_all(calls).await {
            match outcome {
                Ok(result) => {
                    debug!(model = %model_id, rul = result.rul, p = result.failure_probability, "Model prediction");
                    successes.insert(model_id, result);
                }
                Err(e) => {
                    warn!(model = %model_id, error = %e, "Model excluded from ensemble");
                    failures.push(ModelFailure {
                        model_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        (successes, failures)
    }
}

/// Enforce output invariants on a raw model answer.
///
/// - non-finite RUL or probability, or probability outside [0, 1]: rejected
/// - negative RUL: clamped to 0
/// - component labels normalised; labels that collide after normalisation
///   keep the larger probability; an invalid component map is dropped
pub fn sanitize_prediction(
    model_id: &str,
    mut result: PredictionResult,
) -> Result<PredictionResult, ModelError> {
    if !result.rul.is_finite() {
        return Err(ModelError::InvalidOutput(format!("non-finite RUL {}", result.rul)));
    }
    let p = result.failure_probability;
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(ModelError::InvalidOutput(format!("failure probability {p} outside [0, 1]")));
    }
    if result.rul < 0.0 {
        warn!(model = model_id, rul = result.rul, "Negative RUL clamped to 0");
        result.rul = 0.0;
    }

    if let Some(probs) = result.component_probs.take() {
        let valid = !probs.is_empty()
            && probs.values().all(|v| v.is_finite() && (0.0..=1.0).contains(v));
        if valid {
            let mut merged: BTreeMap<String, f64> = BTreeMap::new();
            for (label, v) in probs {
                let normalised = normalize_component_label(&label);
                match merged.get_mut(&normalised) {
                    Some(existing) => {
                        warn!(model = model_id, label = %normalised, "Component label reported twice, keeping the larger probability");
                        *existing = existing.max(v);
                    }
                    None => {
                        merged.insert(normalised, v);
                    }
                }
            }
            result.component_probs = Some(merged);
        } else {
            warn!(model = model_id, "Dropping invalid component probabilities");
        }
    }

    result.model_id = model_id.to_string();
    Ok(result)
}
