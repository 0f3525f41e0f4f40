//! Risk stage types

use serde::{Deserialize, Serialize};

/// Categorical risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
}

impl RiskLevel {
    /// Closed-open bands: `[0, medium_cut)` LOW, `[medium_cut, high_cut)` MEDIUM, `[high_cut, 1]` HIGH.
    pub fn from_score(score: f64, medium_cut: f64, high_cut: f64) -> Self {
        if score >= high_cut {
            RiskLevel::High
        } else if score >= medium_cut {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Named contributors to a risk assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskFactor {
    CriticalFailureProbability,
    HighFailureProbability,
    CriticalRul,
    LowRul,
    ModelDisagreement,
    LowDiagnosticConfidence,
    NormalOperation,
}

impl std::fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskFactor::CriticalFailureProbability => "CRITICAL_FAILURE_PROBABILITY",
            RiskFactor::HighFailureProbability => "HIGH_FAILURE_PROBABILITY",
            RiskFactor::CriticalRul => "CRITICAL_RUL",
            RiskFactor::LowRul => "LOW_RUL",
            RiskFactor::ModelDisagreement => "MODEL_DISAGREEMENT",
            RiskFactor::LowDiagnosticConfidence => "LOW_DIAGNOSTIC_CONFIDENCE",
            RiskFactor::NormalOperation => "NORMAL_OPERATION",
        };
        f.write_str(s)
    }
}

/// Output of the risk stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Combined score in [0, 1]
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub avg_rul: f64,
    pub avg_failure_probability: f64,
    pub risk_factors: Vec<RiskFactor>,
    pub justification: String,
}

impl RiskAssessment {
    pub fn has_factor(&self, factor: RiskFactor) -> bool {
        self.risk_factors.contains(&factor)
    }
}
