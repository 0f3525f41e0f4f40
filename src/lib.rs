//! Turbofan Diagnostics: multi-stage engine health diagnosis
//!
//! One sensor snapshot flows through five stages in a fixed order:
//!
//! - **Prediction**: RUL and failure probability from every regime model, fused into an ensemble
//! - **Diagnosis**: anomalous channels and the most likely failing component
//! - **Risk**: weighted risk score and LOW / MEDIUM / HIGH level
//! - **Scheduling**: maintenance window, actions and timeline
//! - **Explanation**: narrative report, with a deterministic template fallback
//!
//! The [`pipeline::Orchestrator`] drives the stages; external collaborators
//! (models, similarity index, narrative backend) sit behind traits so they
//! can be swapped for stubs.

pub mod agents;
pub mod api;
pub mod config;
pub mod context;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod types;

pub use config::PipelineConfig;
pub use pipeline::{Orchestrator, PipelineError, PipelineResult, PipelineState};
pub use types::{
    DiagnosisResult, EnsembleSummary, FinalReport, MaintenanceSchedule, RiskAssessment,
    RiskLevel, SensorObservation,
};
