//! Sensor snapshot input
//!
//! A `SensorObservation` is the validated 24-channel reading consumed by every
//! stage. Channels follow the CMAPSS layout: three operating settings followed
//! by sensors 1-21.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of channels in one observation (3 operating settings + 21 sensors).
pub const OBSERVATION_LEN: usize = 24;

/// Number of leading channels that are operating settings rather than sensors.
pub const OPERATING_SETTINGS: usize = 3;

/// Rejection reasons for a raw observation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("expected {expected} sensor readings, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("reading at channel {index} is not finite ({value})")]
    NonFinite { index: usize, value: f64 },
}

/// Validated, immutable 24-channel sensor snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SensorObservation {
    readings: [f64; OBSERVATION_LEN],
}

impl SensorObservation {
    /// Validate raw readings: exactly 24 values, all finite.
    pub fn new(values: &[f64]) -> Result<Self, ObservationError> {
        if values.len() != OBSERVATION_LEN {
            return Err(ObservationError::WrongLength {
                expected: OBSERVATION_LEN,
                actual: values.len(),
            });
        }

        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ObservationError::NonFinite { index, value });
        }

        let mut readings = [0.0; OBSERVATION_LEN];
        readings.copy_from_slice(values);
        Ok(Self { readings })
    }

    pub fn readings(&self) -> &[f64] {
        &self.readings
    }

    /// Reading at a channel index, `None` when out of range.
    pub fn channel(&self, index: usize) -> Option<f64> {
        self.readings.get(index).copied()
    }

    /// Display label for a channel: `setting N` for the first three, `sensor N` after.
    pub fn channel_label(index: usize) -> String {
        if index < OPERATING_SETTINGS {
            format!("setting {}", index + 1)
        } else {
            format!("sensor {}", index - OPERATING_SETTINGS + 1)
        }
    }
}

impl TryFrom<Vec<f64>> for SensorObservation {
    type Error = ObservationError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(&values)
    }
}

impl<'de> Deserialize<'de> for SensorObservation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let values = Vec::<f64>::deserialize(deserializer)?;
        Self::new(&values).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_24_finite_values() {
        let obs = SensorObservation::new(&[1.0; 24]).unwrap();
        assert_eq!(obs.readings().len(), 24);
        assert_eq!(obs.channel(23), Some(1.0));
        assert_eq!(obs.channel(24), None);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = SensorObservation::new(&[0.0; 21]).unwrap_err();
        assert_eq!(err, ObservationError::WrongLength { expected: 24, actual: 21 });
    }

    #[test]
    fn test_rejects_nan_and_infinity() {
        let mut values = vec![0.0; 24];
        values[5] = f64::NAN;
        assert!(matches!(
            SensorObservation::new(&values),
            Err(ObservationError::NonFinite { index: 5, .. })
        ));

        values[5] = 0.0;
        values[17] = f64::NEG_INFINITY;
        assert!(matches!(
            SensorObservation::new(&values),
            Err(ObservationError::NonFinite { index: 17, .. })
        ));
    }

    #[test]
    fn test_channel_labels() {
        assert_eq!(SensorObservation::channel_label(0), "setting 1");
        assert_eq!(SensorObservation::channel_label(3), "sensor 1");
        assert_eq!(SensorObservation::channel_label(9), "sensor 7");
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<SensorObservation, _> = serde_json::from_str(&format!("{:?}", vec![2.5; 24]));
        assert!(ok.is_ok());

        let short: Result<SensorObservation, _> = serde_json::from_str("[1.0, 2.0]");
        assert!(short.is_err());
    }
}
