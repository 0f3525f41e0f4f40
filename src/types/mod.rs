//! Shared data structures for the turbofan diagnosis pipeline
//!
//! - Input: `SensorObservation` (24 validated channels)
//! - Prediction: `PredictionResult` per model, `EnsembleSummary`
//! - Diagnosis: `Anomaly`, `HistoricalCase`, `DiagnosisResult`
//! - Risk: `RiskAssessment`
//! - Scheduling: `MaintenanceSchedule`
//! - Explanation: `FinalReport`

mod observation;
mod prediction;
mod diagnosis;
mod risk;
mod schedule;

pub use observation::*;
pub use prediction::*;
pub use diagnosis::*;
pub use risk::*;
pub use schedule::*;
