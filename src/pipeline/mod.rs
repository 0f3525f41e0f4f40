//! Diagnosis Pipeline Module
//!
//! ## Five-Stage Pipeline
//!
//! ```text
//! STAGE 1: Prediction   - fan-out to RUL models, ensemble summary (fatal if none answer)
//! STAGE 2: Diagnosis    - anomalies, signature, similarity vote, optional reasoning
//! STAGE 3: Risk         - weighted score, level, factors, justification
//! STAGE 4: Scheduling   - window, actions, timeline, rationale
//! STAGE 5: Explanation  - narrative report, template fallback
//! ```
//!
//! Stages communicate only through `PipelineState`. Each result slot is
//! written once, by its owning stage.

mod orchestrator;
mod state;

pub use orchestrator::{Orchestrator, OrchestratorStats, SetupError};
pub use state::*;
