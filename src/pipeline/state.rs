//! Shared per-run state threaded through the five stages
//!
//! One `PipelineState` is created per run, mutated in place by each stage in
//! sequence and returned (whole or partial) to the caller. It is never shared
//! between runs.
//!
//! Each result slot is written exactly once by its owning stage. Later stages
//! read earlier slots through the `require_*` accessors, which turn a missing
//! slot into a `ContractViolation` instead of a panic.

use crate::types::{
    DiagnosisResult, EnsembleSummary, FinalReport, MaintenanceSchedule, ModelFailure,
    ObservationError, RiskAssessment, SensorObservation,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Stage identity and outcomes
// ============================================================================

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Prediction,
    Diagnosis,
    Risk,
    Scheduling,
    Explanation,
}

impl StageName {
    pub const ORDER: [StageName; 5] = [
        StageName::Prediction,
        StageName::Diagnosis,
        StageName::Risk,
        StageName::Scheduling,
        StageName::Explanation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StageName::Prediction => "prediction",
            StageName::Diagnosis => "diagnosis",
            StageName::Risk => "risk",
            StageName::Scheduling => "scheduling",
            StageName::Explanation => "explanation",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a run had to stop.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FatalCause {
    #[error("all {attempted} models failed")]
    AllModelsFailed {
        attempted: usize,
        failures: Vec<ModelFailure>,
    },

    /// A stage found an earlier stage's slot empty, or a slot written twice.
    #[error("contract violation: {detail}")]
    ContractViolation { detail: String },
}

impl FatalCause {
    pub fn contract(detail: impl Into<String>) -> Self {
        FatalCause::ContractViolation { detail: detail.into() }
    }
}

/// What a stage reports back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Slot written, no collaborator failed
    Completed,
    /// Slot written with a fallback value; notes describe what was absorbed
    Degraded(Vec<String>),
    /// Run must stop
    Fatal(FatalCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Degraded,
    Fatal,
}

/// Journal entry for one executed stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage: StageName,
    pub status: StageStatus,
    pub notes: Vec<String>,
    pub elapsed_ms: u64,
}

// ============================================================================
// Errors
// ============================================================================

/// Structured failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed observation; no stage ran
    #[error("invalid observation: {0}")]
    Validation(#[from] ObservationError),

    /// A stage failed fatally; `partial` holds everything produced before it
    #[error("{stage} stage failed: {cause}")]
    Fatal {
        stage: StageName,
        cause: FatalCause,
        partial: Box<PipelineState>,
    },

    /// The caller cancelled the run; completed results were discarded
    #[error("pipeline cancelled during {stage} stage")]
    Cancelled { stage: StageName },
}

pub type PipelineResult = Result<PipelineState, PipelineError>;

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    observation: SensorObservation,
    ensemble: Option<EnsembleSummary>,
    diagnosis: Option<DiagnosisResult>,
    risk: Option<RiskAssessment>,
    schedule: Option<MaintenanceSchedule>,
    report: Option<FinalReport>,
    journal: Vec<StageRecord>,
}

macro_rules! slot {
    ($field:ident, $ty:ty, $get:ident, $require:ident, $set:ident) => {
        pub fn $get(&self) -> Option<&$ty> {
            self.$field.as_ref()
        }

        /// Read a slot an earlier stage must have written.
        pub fn $require(&self) -> Result<&$ty, FatalCause> {
            self.$field
                .as_ref()
                .ok_or_else(|| FatalCause::contract(concat!(stringify!($field), " not populated")))
        }

        /// Write the slot. Each slot is written once per run.
        pub fn $set(&mut self, value: $ty) -> Result<(), FatalCause> {
            if self.$field.is_some() {
                return Err(FatalCause::contract(concat!(stringify!($field), " already populated")));
            }
            self.$field = Some(value);
            Ok(())
        }
    };
}

impl PipelineState {
    pub fn new(observation: SensorObservation) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            observation,
            ensemble: None,
            diagnosis: None,
            risk: None,
            schedule: None,
            report: None,
            journal: Vec::new(),
        }
    }

    pub fn observation(&self) -> &SensorObservation {
        &self.observation
    }

    slot!(ensemble, EnsembleSummary, ensemble, require_ensemble, set_ensemble);
    slot!(diagnosis, DiagnosisResult, diagnosis, require_diagnosis, set_diagnosis);
    slot!(risk, RiskAssessment, risk, require_risk, set_risk);
    slot!(schedule, MaintenanceSchedule, schedule, require_schedule, set_schedule);
    slot!(report, FinalReport, report, require_report, set_report);

    pub fn journal(&self) -> &[StageRecord] {
        &self.journal
    }

    pub(crate) fn record(&mut self, record: StageRecord) {
        self.journal.push(record);
    }

    /// True when every result slot is populated.
    pub fn is_complete(&self) -> bool {
        self.ensemble.is_some()
            && self.diagnosis.is_some()
            && self.risk.is_some()
            && self.schedule.is_some()
            && self.report.is_some()
    }

    /// Whether any stage absorbed a collaborator failure.
    pub fn is_degraded(&self) -> bool {
        self.journal.iter().any(|r| r.status == StageStatus::Degraded)
    }
}
