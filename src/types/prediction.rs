//! Prediction stage outputs: per-model results and the ensemble summary

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Output of one regime model for one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub model_id: String,
    /// Remaining useful life in cycles (>= 0)
    pub rul: f64,
    /// Probability of failure within the model's horizon, in [0, 1]
    pub failure_probability: f64,
    /// Per-component failure probabilities, only exposed by classifier-equipped models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_probs: Option<BTreeMap<String, f64>>,
}

impl PredictionResult {
    /// Most probable component and its probability, if the model exposes component probabilities.
    pub fn top_component(&self) -> Option<(&str, f64)> {
        self.component_probs.as_ref()?.iter().fold(None, |best, (label, &p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ => Some((label.as_str(), p)),
        })
    }
}

/// A model excluded from the ensemble, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFailure {
    pub model_id: String,
    pub reason: String,
}

/// Ensemble view over the models that answered.
///
/// Derived once by the prediction stage; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSummary {
    /// Arithmetic mean RUL over available models
    pub avg_rul: f64,
    /// Mean failure probability over available models
    pub avg_failure_probability: f64,
    /// Highest failure probability reported by any available model
    pub max_failure_probability: f64,
    /// Population standard deviation of RUL across available models
    pub rul_std_dev: f64,
    pub per_model: BTreeMap<String, PredictionResult>,
    /// Models that failed or timed out and were excluded from the averages
    pub failed_models: Vec<ModelFailure>,
}

impl EnsembleSummary {
    /// Combine available results. Returns `None` when no model answered.
    pub fn from_results(
        per_model: BTreeMap<String, PredictionResult>,
        failed_models: Vec<ModelFailure>,
    ) -> Option<Self> {
        if per_model.is_empty() {
            return None;
        }

        let ruls: Vec<f64> = per_model.values().map(|r| r.rul).collect();
        let probs: Vec<f64> = per_model.values().map(|r| r.failure_probability).collect();

        let rul_std_dev = if ruls.len() > 1 {
            ruls.iter().population_std_dev()
        } else {
            0.0
        };

        Some(Self {
            avg_rul: ruls.iter().mean(),
            avg_failure_probability: probs.iter().mean(),
            max_failure_probability: probs.iter().copied().fold(0.0, f64::max),
            rul_std_dev,
            per_model,
            failed_models,
        })
    }

    /// Number of models that contributed to the averages.
    pub fn available_models(&self) -> usize {
        self.per_model.len()
    }

    /// The single most probable component across all models exposing
    /// component probabilities, with the id of the model that reported it.
    pub fn most_probable_component(&self) -> Option<(&str, &str, f64)> {
        self.per_model
            .values()
            .filter_map(|r| r.top_component().map(|(label, p)| (r.model_id.as_str(), label, p)))
            .fold(None, |best, candidate| match best {
                Some((_, _, bp)) if bp >= candidate.2 => best,
                _ => Some(candidate),
            })
    }

    /// Component probability map of the model that reported the most probable component.
    pub fn component_probabilities(&self) -> Option<&BTreeMap<String, f64>> {
        let (model_id, _, _) = self.most_probable_component()?;
        self.per_model.get(model_id)?.component_probs.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, rul: f64, p: f64) -> PredictionResult {
        PredictionResult {
            model_id: id.to_string(),
            rul,
            failure_probability: p,
            component_probs: None,
        }
    }

    fn summary(results: Vec<PredictionResult>) -> EnsembleSummary {
        let map = results.into_iter().map(|r| (r.model_id.clone(), r)).collect();
        EnsembleSummary::from_results(map, Vec::new()).unwrap()
    }

    #[test]
    fn test_averages() {
        let s = summary(vec![
            result("fd001", 120.0, 0.1),
            result("fd002", 90.0, 0.2),
            result("fd003", 60.0, 0.6),
        ]);
        assert!((s.avg_rul - 90.0).abs() < 1e-9);
        assert!((s.avg_failure_probability - 0.3).abs() < 1e-9);
        assert!((s.max_failure_probability - 0.6).abs() < 1e-9);
        assert!((s.rul_std_dev - 24.494_897_427_831_78).abs() < 1e-6);
    }

    #[test]
    fn test_empty_has_no_summary() {
        assert!(EnsembleSummary::from_results(BTreeMap::new(), Vec::new()).is_none());
    }

    #[test]
    fn test_single_model_has_zero_spread() {
        let s = summary(vec![result("fd001", 42.0, 0.5)]);
        assert_eq!(s.rul_std_dev, 0.0);
        assert_eq!(s.available_models(), 1);
    }

    #[test]
    fn test_most_probable_component() {
        let mut fd003 = result("fd003", 50.0, 0.4);
        fd003.component_probs = Some(BTreeMap::from([
            ("HPC".to_string(), 0.7),
            ("Fan".to_string(), 0.2),
            ("Healthy".to_string(), 0.1),
        ]));
        let s = summary(vec![result("fd001", 80.0, 0.1), fd003]);

        let (model, label, p) = s.most_probable_component().unwrap();
        assert_eq!(model, "fd003");
        assert_eq!(label, "HPC");
        assert!((p - 0.7).abs() < 1e-12);
        assert_eq!(s.component_probabilities().map(BTreeMap::len), Some(3));
    }

    #[test]
    fn test_no_component_probs() {
        let s = summary(vec![result("fd001", 80.0, 0.1)]);
        assert!(s.most_probable_component().is_none());
        assert!(s.component_probabilities().is_none());
    }
}
