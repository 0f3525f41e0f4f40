//! Prediction Stage - concurrent regime-model ensemble
//!
//! All registered models are queried in parallel; the stage waits for every
//! call to finish or time out before writing the ensemble. A failed model is
//! excluded from the averages and listed in `failed_models`. The run stops
//! only when no model answered.

use super::{written, Stage};
use crate::models::ModelRegistry;
use crate::pipeline::{FatalCause, PipelineState, StageName, StageOutcome};
use crate::types::EnsembleSummary;
use async_trait::async_trait;
use tracing::{error, info};

pub struct PredictionStage {
    registry: ModelRegistry,
}

impl PredictionStage {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Stage for PredictionStage {
    fn name(&self) -> StageName {
        StageName::Prediction
    }

    async fn run(&self, state: &mut PipelineState) -> StageOutcome {
        let (successes, failures) = self.registry.predict_all(state.observation()).await;

        let notes: Vec<String> = failures
            .iter()
            .map(|f| format!("model {} excluded: {}", f.model_id, f.reason))
            .collect();

        let Some(ensemble) = EnsembleSummary::from_results(successes, failures.clone()) else {
            error!(attempted = self.registry.len(), "No model produced a prediction");
            return StageOutcome::Fatal(FatalCause::AllModelsFailed {
                attempted: self.registry.len(),
                failures,
            });
        };

        info!(
            avg_rul = ensemble.avg_rul,
            avg_p = ensemble.avg_failure_probability,
            models = ensemble.available_models(),
            failed = ensemble.failed_models.len(),
            "Ensemble prediction"
        );

        written(state.set_ensemble(ensemble), notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelError, ModelPredictor};
    use crate::types::{PredictionResult, SensorObservation};
    use std::sync::Arc;
    use std::time::Duration;

    struct Broken(&'static str);

    #[async_trait]
    impl ModelPredictor for Broken {
        fn model_id(&self) -> &str {
            self.0
        }

        async fn predict(&self, _obs: &SensorObservation) -> Result<PredictionResult, ModelError> {
            Err(ModelError::Transport("connection refused".to_string()))
        }
    }

    struct Fixed(&'static str, f64);

    #[async_trait]
    impl ModelPredictor for Fixed {
        fn model_id(&self) -> &str {
            self.0
        }

        async fn predict(&self, _obs: &SensorObservation) -> Result<PredictionResult, ModelError> {
            Ok(PredictionResult {
                model_id: self.0.to_string(),
                rul: self.1,
                failure_probability: 0.1,
                component_probs: None,
            })
        }
    }

    fn state() -> PipelineState {
        PipelineState::new(SensorObservation::new(&[0.0; 24]).unwrap())
    }

    #[tokio::test]
    async fn test_all_models_failed_is_fatal() {
        let registry = ModelRegistry::new(
            vec![Arc::new(Broken("fd001")), Arc::new(Broken("fd002"))],
            Duration::from_millis(100),
        )
        .unwrap();
        let mut s = state();
        let outcome = PredictionStage::new(registry).run(&mut s).await;
        match outcome {
            StageOutcome::Fatal(FatalCause::AllModelsFailed { attempted, failures }) => {
                assert_eq!(attempted, 2);
                assert_eq!(failures.len(), 2);
            }
            other => panic!("expected fatal, got {other:?}"),
        }
        assert!(s.ensemble().is_none());
    }

    #[tokio::test]
    async fn test_partial_failure_is_degraded() {
        let registry = ModelRegistry::new(
            vec![
                Arc::new(Fixed("fd001", 90.0)),
                Arc::new(Broken("fd002")),
                Arc::new(Fixed("fd003", 70.0)),
            ],
            Duration::from_millis(100),
        )
        .unwrap();
        let mut s = state();
        let outcome = PredictionStage::new(registry).run(&mut s).await;
        assert!(matches!(outcome, StageOutcome::Degraded(ref notes) if notes[0].contains("fd002")));
        assert_eq!(s.require_ensemble().unwrap().avg_rul, 80.0);
    }
}
