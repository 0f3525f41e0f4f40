//! Diagnosis stage types: anomalies, historical cases, and the diagnosis result

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel component when no evidence points anywhere specific.
pub const GENERAL_COMPONENT: &str = "General";

/// Reason attached to a degraded diagnosis.
pub const DIAGNOSIS_UNAVAILABLE: &str = "diagnosis unavailable";

/// Map classifier class ids to component names.
///
/// The component classifier emits `0`/`1`/`2` for Healthy/HPC/Fan; any other
/// label is passed through trimmed.
pub fn normalize_component_label(label: &str) -> String {
    match label.trim() {
        "0" => "Healthy".to_string(),
        "1" => "HPC".to_string(),
        "2" => "Fan".to_string(),
        other => other.to_string(),
    }
}

/// A past failure signature returned by the similarity index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalCase {
    pub signature: Vec<f64>,
    pub component_label: String,
    /// Distance from the query signature (>= 0)
    pub distance: f64,
}

/// Direction of a sensor deviation from its nominal baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationDirection {
    Elevated,
    Depressed,
}

impl std::fmt::Display for DeviationDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviationDirection::Elevated => write!(f, "elevated"),
            DeviationDirection::Depressed => write!(f, "depressed"),
        }
    }
}

/// One sensor channel outside its nominal band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub channel: usize,
    /// Human label, e.g. "sensor 7"
    pub label: String,
    pub value: f64,
    pub nominal: f64,
    /// Normalised deviation in units of the channel spread (signed)
    pub deviation_sigma: f64,
    pub direction: DeviationDirection,
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.label, self.direction)
    }
}

/// Where the probable component came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosisSource {
    /// Distance-weighted vote over nearest historical cases
    SimilarityVote,
    /// No cases; the ensemble's component classifier supplied the label
    ModelComponentProbs,
    /// Neither history nor classifier available
    Fallback,
}

/// Output of the diagnosis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub probable_component: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub anomalies: Vec<Anomaly>,
    /// Causal explanation from the narrative backend, when it answered
    pub reason: Option<String>,
    pub source: DiagnosisSource,
    /// Cases the vote was taken over
    pub similar_cases: Vec<HistoricalCase>,
    /// Component probabilities of the classifier-equipped model, if any
    pub component_probabilities: Option<BTreeMap<String, f64>>,
}

impl DiagnosisResult {
    /// Degraded result used when the similarity search itself failed.
    pub fn unavailable(anomalies: Vec<Anomaly>) -> Self {
        Self {
            probable_component: GENERAL_COMPONENT.to_string(),
            confidence: 0.0,
            anomalies,
            reason: Some(DIAGNOSIS_UNAVAILABLE.to_string()),
            source: DiagnosisSource::Fallback,
            similar_cases: Vec::new(),
            component_probabilities: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_component_label() {
        assert_eq!(normalize_component_label("0"), "Healthy");
        assert_eq!(normalize_component_label(" 1 "), "HPC");
        assert_eq!(normalize_component_label("2"), "Fan");
        assert_eq!(normalize_component_label("LPT"), "LPT");
    }

    #[test]
    fn test_anomaly_display() {
        let a = Anomaly {
            channel: 9,
            label: "sensor 7".to_string(),
            value: 560.0,
            nominal: 553.37,
            deviation_sigma: 7.5,
            direction: DeviationDirection::Elevated,
        };
        assert_eq!(a.to_string(), "sensor 7 elevated");
    }

    #[test]
    fn test_unavailable_is_general_with_zero_confidence() {
        let d = DiagnosisResult::unavailable(Vec::new());
        assert_eq!(d.probable_component, GENERAL_COMPONENT);
        assert_eq!(d.confidence, 0.0);
        assert_eq!(d.reason.as_deref(), Some(DIAGNOSIS_UNAVAILABLE));
        assert_eq!(d.source, DiagnosisSource::Fallback);
    }
}
