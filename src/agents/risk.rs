//! Risk Stage - weighted risk score and categorical level
//!
//! ```text
//! score = w_rul * (1 - min(avg_rul / horizon, 1))
//!       + w_p   * avg_failure_probability
//!       + w_u   * (1 - diagnosis.confidence)
//! ```
//!
//! Pure computation. Missing or non-finite upstream values are a contract
//! violation, not a runtime condition.

use super::{written, Stage};
use crate::config::defaults::{
    CRITICAL_FAILURE_PROBABILITY, CRITICAL_RUL_CYCLES, HIGH_FAILURE_PROBABILITY,
    LOW_DIAGNOSTIC_CONFIDENCE, LOW_RUL_CYCLES, MODEL_AGREEMENT_STD_CYCLES,
};
use crate::config::{PipelineConfig, RiskConfig};
use crate::pipeline::{FatalCause, PipelineState, StageName, StageOutcome};
use crate::types::{
    DiagnosisResult, EnsembleSummary, PredictionResult, RiskAssessment, RiskFactor, RiskLevel,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct RiskStage {
    config: Arc<PipelineConfig>,
}

impl RiskStage {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for RiskStage {
    fn name(&self) -> StageName {
        StageName::Risk
    }

    async fn run(&self, state: &mut PipelineState) -> StageOutcome {
        let assessment = match (state.require_ensemble(), state.require_diagnosis()) {
            (Ok(ensemble), Ok(diagnosis)) => assess(&self.config.risk, ensemble, diagnosis),
            (Err(cause), _) | (_, Err(cause)) => Err(cause),
        };
        let assessment = match assessment {
            Ok(a) => a,
            Err(cause) => return StageOutcome::Fatal(cause),
        };

        info!(
            score = assessment.risk_score,
            level = %assessment.risk_level,
            factors = assessment.risk_factors.len(),
            "Risk assessed"
        );

        written(state.set_risk(assessment), Vec::new())
    }
}

/// RUL term: 1 at zero RUL, falling linearly to 0 at the horizon.
pub fn rul_pressure(avg_rul: f64, horizon: f64) -> f64 {
    1.0 - (avg_rul / horizon).clamp(0.0, 1.0)
}

/// Combined risk score in [0, 1].
pub fn risk_score(config: &RiskConfig, avg_rul: f64, avg_failure_probability: f64, confidence: f64) -> f64 {
    let score = config.rul_weight * rul_pressure(avg_rul, config.rul_horizon_cycles)
        + config.failure_probability_weight * avg_failure_probability
        + config.diagnosis_uncertainty_weight * (1.0 - confidence);
    score.clamp(0.0, 1.0)
}

/// Build the assessment from validated upstream slots.
pub fn assess(
    config: &RiskConfig,
    ensemble: &EnsembleSummary,
    diagnosis: &DiagnosisResult,
) -> Result<RiskAssessment, FatalCause> {
    let inputs = [
        ("avg_rul", ensemble.avg_rul),
        ("avg_failure_probability", ensemble.avg_failure_probability),
        ("diagnosis.confidence", diagnosis.confidence),
    ];
    if let Some((name, value)) = inputs.iter().find(|(_, v)| !v.is_finite()) {
        return Err(FatalCause::contract(format!("{name} is not finite ({value})")));
    }
    if !(0.0..=1.0).contains(&diagnosis.confidence) {
        return Err(FatalCause::contract(format!(
            "diagnosis.confidence {} outside [0, 1]",
            diagnosis.confidence
        )));
    }

    let score = risk_score(
        config,
        ensemble.avg_rul,
        ensemble.avg_failure_probability,
        diagnosis.confidence,
    );
    let level = RiskLevel::from_score(score, config.medium_cut, config.high_cut);
    let factors = risk_factors(config, ensemble, diagnosis.confidence);

    Ok(RiskAssessment {
        risk_score: score,
        risk_level: level,
        avg_rul: ensemble.avg_rul,
        avg_failure_probability: ensemble.avg_failure_probability,
        justification: justification(config, level, ensemble, diagnosis),
        risk_factors: factors,
    })
}

fn risk_factors(config: &RiskConfig, ensemble: &EnsembleSummary, confidence: f64) -> Vec<RiskFactor> {
    let mut factors = Vec::new();
    let p = ensemble.max_failure_probability;

    if p > CRITICAL_FAILURE_PROBABILITY {
        factors.push(RiskFactor::CriticalFailureProbability);
    } else if p > HIGH_FAILURE_PROBABILITY {
        factors.push(RiskFactor::HighFailureProbability);
    }

    if ensemble.avg_rul < CRITICAL_RUL_CYCLES {
        factors.push(RiskFactor::CriticalRul);
    } else if ensemble.avg_rul < LOW_RUL_CYCLES {
        factors.push(RiskFactor::LowRul);
    }

    if ensemble.rul_std_dev > config.disagreement_std_cycles {
        factors.push(RiskFactor::ModelDisagreement);
    }

    if confidence < LOW_DIAGNOSTIC_CONFIDENCE {
        factors.push(RiskFactor::LowDiagnosticConfidence);
    }

    if factors.is_empty() {
        factors.push(RiskFactor::NormalOperation);
    }
    factors
}

fn justification(
    config: &RiskConfig,
    level: RiskLevel,
    ensemble: &EnsembleSummary,
    diagnosis: &DiagnosisResult,
) -> String {
    let mut parts = Vec::new();

    if ensemble.max_failure_probability > HIGH_FAILURE_PROBABILITY {
        parts.push(format!(
            "High failure probability detected ({:.1}%)",
            ensemble.max_failure_probability * 100.0
        ));
    }

    if ensemble.avg_rul < LOW_RUL_CYCLES {
        parts.push(format!("Critical RUL threshold reached ({:.0} cycles)", ensemble.avg_rul));
    } else if ensemble.avg_rul < config.rul_horizon_cycles {
        parts.push(format!("RUL below horizon ({:.0} cycles)", ensemble.avg_rul));
    } else {
        parts.push(format!("RUL within acceptable range ({:.0} cycles)", ensemble.avg_rul));
    }

    if ensemble.available_models() > 1 {
        if ensemble.rul_std_dev < MODEL_AGREEMENT_STD_CYCLES {
            parts.push("All models show strong agreement".to_string());
        } else if ensemble.rul_std_dev > config.disagreement_std_cycles {
            let by_rul = |a: &&PredictionResult, b: &&PredictionResult| a.rul.total_cmp(&b.rul);
            let low = ensemble.per_model.values().min_by(by_rul);
            let high = ensemble.per_model.values().max_by(by_rul);
            if let (Some(low), Some(high)) = (low, high) {
                parts.push(format!(
                    "Significant model disagreement ({} predicts {:.0}, {} predicts {:.0})",
                    low.model_id, low.rul, high.model_id, high.rul
                ));
            }
        }
    }

    if diagnosis.confidence < LOW_DIAGNOSTIC_CONFIDENCE {
        parts.push(format!(
            "Low diagnostic confidence for {} ({:.0}%)",
            diagnosis.probable_component,
            diagnosis.confidence * 100.0
        ));
    }

    format!("{level} risk: {}.", parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiagnosisSource;
    use std::collections::BTreeMap;

    fn ensemble(ruls: &[f64], p: f64) -> EnsembleSummary {
        let per_model = ruls
            .iter()
            .enumerate()
            .map(|(i, &rul)| {
                let id = format!("fd00{}", i + 1);
                (
                    id.clone(),
                    PredictionResult {
                        model_id: id,
                        rul,
                        failure_probability: p,
                        component_probs: None,
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        EnsembleSummary::from_results(per_model, Vec::new()).unwrap()
    }

    fn diagnosis(confidence: f64) -> DiagnosisResult {
        DiagnosisResult {
            probable_component: "HPC".to_string(),
            confidence,
            anomalies: Vec::new(),
            reason: None,
            source: DiagnosisSource::SimilarityVote,
            similar_cases: Vec::new(),
            component_probabilities: None,
        }
    }

    #[test]
    fn test_healthy_engine_is_low() {
        let a = assess(&RiskConfig::default(), &ensemble(&[150.0, 140.0, 160.0], 0.02), &diagnosis(0.9)).unwrap();
        assert_eq!(a.risk_level, RiskLevel::Low);
        assert_eq!(a.risk_factors, vec![RiskFactor::NormalOperation]);
        assert!(a.justification.starts_with("LOW risk:"));
    }

    #[test]
    fn test_near_failure_is_high() {
        let a = assess(&RiskConfig::default(), &ensemble(&[10.0, 12.0, 8.0], 0.9), &diagnosis(0.8)).unwrap();
        assert_eq!(a.risk_level, RiskLevel::High);
        assert!(a.has_factor(RiskFactor::CriticalFailureProbability));
        assert!(a.has_factor(RiskFactor::CriticalRul));
    }

    #[test]
    fn test_score_monotone_in_failure_probability() {
        let config = RiskConfig::default();
        let mut last = -1.0;
        for step in 0..=20 {
            let p = f64::from(step) / 20.0;
            let score = risk_score(&config, 55.0, p, 0.4);
            assert!(score >= last, "score decreased at p={p}");
            last = score;
        }
    }

    #[test]
    fn test_score_clipped_to_unit_interval() {
        let config = RiskConfig::default();
        assert!(risk_score(&config, 0.0, 1.0, 0.0) <= 1.0);
        assert!(risk_score(&config, 1e9, 0.0, 1.0) >= 0.0);
        assert_eq!(rul_pressure(250.0, 100.0), 0.0);
        assert_eq!(rul_pressure(0.0, 100.0), 1.0);
    }

    #[test]
    fn test_model_disagreement_factor() {
        let a = assess(&RiskConfig::default(), &ensemble(&[20.0, 150.0, 90.0], 0.1), &diagnosis(0.9)).unwrap();
        assert!(a.has_factor(RiskFactor::ModelDisagreement));
        assert!(a.justification.contains("fd001 predicts 20"));
    }

    #[test]
    fn test_low_confidence_factor() {
        let a = assess(&RiskConfig::default(), &ensemble(&[150.0], 0.01), &diagnosis(0.0)).unwrap();
        assert!(a.has_factor(RiskFactor::LowDiagnosticConfidence));
        assert!(!a.has_factor(RiskFactor::NormalOperation));
    }

    #[test]
    fn test_non_finite_input_is_contract_violation() {
        let mut e = ensemble(&[100.0], 0.1);
        e.avg_rul = f64::NAN;
        assert!(matches!(
            assess(&RiskConfig::default(), &e, &diagnosis(0.5)),
            Err(FatalCause::ContractViolation { .. })
        ));
    }
}
