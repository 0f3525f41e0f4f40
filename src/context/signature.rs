//! Failure signatures: the query vector used for historical-case search
//!
//! A signature is the per-channel deviation profile of one observation (in
//! units of channel spread) followed by two ensemble features, scaled to unit
//! length so distances compare shape rather than magnitude.

use crate::config::ChannelBaseline;
use crate::types::{EnsembleSummary, SensorObservation};

/// Signature length: one z-score per channel plus RUL fraction and failure probability.
pub fn signature_len(channels: usize) -> usize {
    channels + 2
}

/// Deviation of each channel from its nominal value, in spreads.
///
/// Channels with zero spread are constant in the nominal fleet and always score 0.
pub fn channel_z_scores(observation: &SensorObservation, baselines: &[ChannelBaseline]) -> Vec<f64> {
    observation
        .readings()
        .iter()
        .zip(baselines)
        .map(|(&value, b)| {
            if b.spread > 0.0 {
                (value - b.nominal) / b.spread
            } else {
                0.0
            }
        })
        .collect()
}

/// Build the L2-normalised failure signature.
pub fn build_signature(
    observation: &SensorObservation,
    baselines: &[ChannelBaseline],
    ensemble: &EnsembleSummary,
    rul_horizon_cycles: f64,
) -> Vec<f64> {
    let mut signature = channel_z_scores(observation, baselines);
    signature.push((ensemble.avg_rul / rul_horizon_cycles).min(1.0));
    signature.push(ensemble.avg_failure_probability);
    l2_normalize(&mut signature);
    signature
}

/// Scale in place to unit length. An all-zero vector is left as is.
pub fn l2_normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}
