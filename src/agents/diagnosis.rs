//! Diagnosis Stage - failure localisation
//!
//! 1. Anomaly extraction: sensor channels whose deviation from the nominal
//!    baseline exceeds the channel threshold (in spreads)
//! 2. Similarity lookup: k nearest historical failure signatures
//! 3. Distance-weighted vote over the cases' component labels
//! 4. Optional causal explanation from the narrative backend
//!
//! With no cases, the ensemble's component classifier supplies the label;
//! with neither, the result is "General" at confidence 0. A failed or
//! timed-out index lookup degrades the result instead of stopping the run.

use super::{written, Stage};
use crate::config::{defaults::VOTE_DISTANCE_EPSILON, ChannelBaseline, PipelineConfig};
use crate::context::{build_signature, SimilarityIndex};
use crate::llm::{sanitize_generated, NarrativeError, NarrativeGenerator};
use crate::pipeline::{PipelineState, StageName, StageOutcome};
use crate::types::{
    Anomaly, DeviationDirection, DiagnosisResult, DiagnosisSource, EnsembleSummary,
    HistoricalCase, SensorObservation, GENERAL_COMPONENT, OPERATING_SETTINGS,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const REASONING_PROMPT: &str = r#"A turbofan engine snapshot was diagnosed from sensor deviations and similar historical failures.

### PROBABLE COMPONENT
{component} (confidence {confidence}%)

### ANOMALOUS CHANNELS
{anomalies}

### NEAREST HISTORICAL CASES
{cases}

### INSTRUCTIONS
In two or three sentences, explain the most likely physical cause linking these
deviations to the component. Plain text only. No markdown. No preamble."#;

pub struct DiagnosisStage {
    config: Arc<PipelineConfig>,
    index: Arc<dyn SimilarityIndex>,
    narrator: Arc<dyn NarrativeGenerator>,
}

impl DiagnosisStage {
    pub fn new(
        config: Arc<PipelineConfig>,
        index: Arc<dyn SimilarityIndex>,
        narrator: Arc<dyn NarrativeGenerator>,
    ) -> Self {
        Self {
            config,
            index,
            narrator,
        }
    }

    /// Nearest cases, or the reason the lookup failed.
    async fn lookup(&self, signature: &[f64]) -> Result<Vec<HistoricalCase>, String> {
        let timeouts = &self.config.timeouts;
        let k = self.config.diagnosis.top_k;
        let cases = match tokio::time::timeout(timeouts.similarity(), self.index.nearest(signature, k)).await {
            Ok(Ok(cases)) => cases,
            Ok(Err(e)) => return Err(format!("similarity search failed: {e}")),
            Err(_) => {
                return Err(format!(
                    "similarity search timed out after {} ms",
                    timeouts.similarity_ms
                ))
            }
        };

        let max_distance = self.config.diagnosis.max_distance.unwrap_or(f64::INFINITY);
        Ok(cases
            .into_iter()
            .filter(|c| c.distance.is_finite() && c.distance >= 0.0 && c.distance <= max_distance)
            .take(k)
            .collect())
    }

    /// Ask the narrative backend for a causal explanation.
    async fn explain(&self, result: &DiagnosisResult) -> Result<String, NarrativeError> {
        let anomalies = if result.anomalies.is_empty() {
            "none".to_string()
        } else {
            result
                .anomalies
                .iter()
                .map(|a| {
                    format!(
                        "- {} ({:+.1} sigma, value {:.2}, nominal {:.2})",
                        a, a.deviation_sigma, a.value, a.nominal
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        let cases = if result.similar_cases.is_empty() {
            "none".to_string()
        } else {
            result
                .similar_cases
                .iter()
                .map(|c| format!("- {} at distance {:.3}", c.component_label, c.distance))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = REASONING_PROMPT
            .replace("{component}", &result.probable_component)
            .replace("{confidence}", &format!("{:.0}", result.confidence * 100.0))
            .replace("{anomalies}", &anomalies)
            .replace("{cases}", &cases);

        let timeout = self.config.timeouts.narrative();
        let text = tokio::time::timeout(timeout, self.narrator.generate(&prompt))
            .await
            .map_err(|_| NarrativeError::Timeout(self.config.timeouts.narrative_ms))??;
        sanitize_generated(&text).ok_or(NarrativeError::Empty)
    }
}

#[async_trait]
impl Stage for DiagnosisStage {
    fn name(&self) -> StageName {
        StageName::Diagnosis
    }

    async fn run(&self, state: &mut PipelineState) -> StageOutcome {
        let ensemble = match state.require_ensemble() {
            Ok(e) => e.clone(),
            Err(cause) => return StageOutcome::Fatal(cause),
        };
        let channels = &self.config.sensors.channels;
        let anomalies = detect_anomalies(state.observation(), channels);
        let signature = build_signature(
            state.observation(),
            channels,
            &ensemble,
            self.config.risk.rul_horizon_cycles,
        );

        let mut notes = Vec::new();
        let cases = match self.lookup(&signature).await {
            Ok(cases) => Some(cases),
            Err(reason) => {
                warn!(reason = %reason, "Similarity lookup failed, degrading diagnosis");
                notes.push(reason);
                None
            }
        };
        let index_failed = cases.is_none();

        let mut result = localise(&ensemble, anomalies, cases);
        debug!(source = ?result.source, component = %result.probable_component, "Diagnosis localised");

        // An unavailable diagnosis has nothing for the backend to reason about.
        let unavailable = index_failed && result.source == DiagnosisSource::Fallback;
        if self.config.diagnosis.llm_reasoning && !unavailable {
            match self.explain(&result).await {
                Ok(reason) => result.reason = Some(reason),
                Err(NarrativeError::Unavailable(e)) => {
                    debug!(error = %e, "Diagnosis reasoning skipped");
                }
                Err(e) => {
                    warn!(error = %e, backend = self.narrator.backend_name(), "Diagnosis reasoning failed");
                    notes.push(format!("diagnosis reasoning unavailable: {e}"));
                }
            }
        }

        info!(
            component = %result.probable_component,
            confidence = result.confidence,
            anomalies = result.anomalies.len(),
            cases = result.similar_cases.len(),
            "Diagnosis complete"
        );

        written(state.set_diagnosis(result), notes)
    }
}

/// Channels outside their nominal band. Operating settings and constant
/// channels (zero spread) are never reported.
pub fn detect_anomalies(observation: &SensorObservation, baselines: &[ChannelBaseline]) -> Vec<Anomaly> {
    observation
        .readings()
        .iter()
        .zip(baselines)
        .enumerate()
        .skip(OPERATING_SETTINGS)
        .filter(|(_, (_, b))| b.spread > 0.0)
        .filter_map(|(channel, (&value, b))| {
            let z = (value - b.nominal) / b.spread;
            (z.abs() > b.threshold_sigma).then(|| Anomaly {
                channel,
                label: SensorObservation::channel_label(channel),
                value,
                nominal: b.nominal,
                deviation_sigma: z,
                direction: if z > 0.0 {
                    DeviationDirection::Elevated
                } else {
                    DeviationDirection::Depressed
                },
            })
        })
        .collect()
}

/// Inverse-distance weighted vote over case labels.
///
/// Returns the winning label and its share of the total weight. Ties on
/// weight go to the label with the smaller total distance, then to the
/// lexically smaller label.
pub fn weighted_vote(cases: &[HistoricalCase]) -> Option<(String, f64)> {
    let mut tally: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for case in cases {
        let entry = tally.entry(case.component_label.as_str()).or_insert((0.0, 0.0));
        entry.0 += 1.0 / (case.distance + VOTE_DISTANCE_EPSILON);
        entry.1 += case.distance;
    }

    let total: f64 = tally.values().map(|(w, _)| w).sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    // BTreeMap iteration is lexical, so keeping the first of equals keeps the smaller label.
    let mut best: Option<(&str, f64, f64)> = None;
    for (&label, &(weight, distance)) in &tally {
        best = match best {
            None => Some((label, weight, distance)),
            Some((_, bw, bd)) => {
                let tol = 1e-12 * bw.max(weight);
                if weight > bw + tol || ((weight - bw).abs() <= tol && distance < bd) {
                    Some((label, weight, distance))
                } else {
                    best
                }
            }
        };
    }

    best.map(|(label, weight, _)| (label.to_string(), (weight / total).clamp(0.0, 1.0)))
}

/// Pick the probable component from the evidence at hand.
///
/// `cases` is `None` when the similarity lookup failed.
fn localise(
    ensemble: &EnsembleSummary,
    anomalies: Vec<Anomaly>,
    cases: Option<Vec<HistoricalCase>>,
) -> DiagnosisResult {
    let component_probabilities = ensemble.component_probabilities().cloned();
    let classifier = ensemble
        .most_probable_component()
        .map(|(_, label, p)| (label.to_string(), p));

    let from_classifier = |anomalies: Vec<Anomaly>, similar_cases: Vec<HistoricalCase>| {
        classifier.clone().map(|(label, p)| DiagnosisResult {
            probable_component: label,
            confidence: p.clamp(0.0, 1.0),
            anomalies,
            reason: None,
            source: DiagnosisSource::ModelComponentProbs,
            similar_cases,
            component_probabilities: component_probabilities.clone(),
        })
    };

    match cases {
        None => from_classifier(anomalies.clone(), Vec::new())
            .unwrap_or_else(|| DiagnosisResult::unavailable(anomalies)),
        Some(cases) => match weighted_vote(&cases) {
            Some((label, confidence)) => DiagnosisResult {
                probable_component: label,
                confidence,
                anomalies,
                reason: None,
                source: DiagnosisSource::SimilarityVote,
                similar_cases: cases,
                component_probabilities: component_probabilities.clone(),
            },
            None => from_classifier(anomalies.clone(), cases).unwrap_or_else(|| DiagnosisResult {
                probable_component: GENERAL_COMPONENT.to_string(),
                confidence: 0.0,
                anomalies,
                reason: None,
                source: DiagnosisSource::Fallback,
                similar_cases: Vec::new(),
                component_probabilities: None,
            }),
        },
    }
}
