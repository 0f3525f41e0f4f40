//! Pipeline stages for turbofan health diagnosis
//!
//! ## Stages (fixed order)
//!
//! 1. **Prediction** - concurrent fan-out to the regime models, ensemble summary
//! 2. **Diagnosis** - anomaly extraction, similarity vote, optional causal reasoning
//! 3. **Risk** - weighted risk score and level
//! 4. **Scheduling** - maintenance window, actions and timeline
//! 5. **Explanation** - narrative report with template fallback
//!
//! Each stage implements the `Stage` trait: it reads the slots written by
//! earlier stages, writes its own slot, and reports a `StageOutcome`.

pub mod prediction;
pub mod diagnosis;
pub mod risk;
pub mod scheduling;
pub mod explanation;
pub mod templates;

pub use prediction::PredictionStage;
pub use diagnosis::DiagnosisStage;
pub use risk::RiskStage;
pub use scheduling::SchedulingStage;
pub use explanation::ExplanationStage;

use crate::config::PipelineConfig;
use crate::context::SimilarityIndex;
use crate::llm::NarrativeGenerator;
use crate::models::ModelRegistry;
use crate::pipeline::{PipelineState, StageName, StageOutcome};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for pipeline stages
///
/// A stage never returns an error: collaborator failures are absorbed into a
/// fallback value (`Degraded`) or reported as `Fatal`.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    async fn run(&self, state: &mut PipelineState) -> StageOutcome;
}

/// Create the five stages in execution order
pub fn default_stages(
    config: Arc<PipelineConfig>,
    registry: ModelRegistry,
    index: Arc<dyn SimilarityIndex>,
    narrator: Arc<dyn NarrativeGenerator>,
) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(PredictionStage::new(registry)),
        Box::new(DiagnosisStage::new(config.clone(), index, narrator.clone())),
        Box::new(RiskStage::new(config.clone())),
        Box::new(SchedulingStage::new(config.clone())),
        Box::new(ExplanationStage::new(config, narrator)),
    ]
}

/// Turn a slot write into an outcome, mapping a double write to `Fatal`.
pub(crate) fn written(result: Result<(), crate::pipeline::FatalCause>, notes: Vec<String>) -> StageOutcome {
    match result {
        Err(cause) => StageOutcome::Fatal(cause),
        Ok(()) if notes.is_empty() => StageOutcome::Completed,
        Ok(()) => StageOutcome::Degraded(notes),
    }
}
