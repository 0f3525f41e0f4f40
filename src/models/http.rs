//! HTTP model client: one regime model served behind a JSON endpoint

use super::{ModelError, ModelPredictor};
use crate::types::{PredictionResult, SensorObservation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Serialize)]
struct PredictRequest<'a> {
    model_id: &'a str,
    observation: &'a [f64],
}

#[derive(Deserialize)]
struct PredictResponse {
    rul: f64,
    failure_probability: f64,
    #[serde(default)]
    component_probs: Option<BTreeMap<String, f64>>,
}

/// Model served over HTTP.
///
/// `POST {endpoint}` with `{"model_id": ..., "observation": [24 floats]}`,
/// answered by `{"rul": .., "failure_probability": .., "component_probs": {..}?}`.
#[derive(Clone)]
pub struct HttpModel {
    http: reqwest::Client,
    model_id: String,
    endpoint: String,
}

impl HttpModel {
    pub fn new(model_id: &str, endpoint: &str, timeout: Duration) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            model_id: model_id.to_string(),
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl ModelPredictor for HttpModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn predict(&self, observation: &SensorObservation) -> Result<PredictionResult, ModelError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&PredictRequest {
                model_id: &self.model_id,
                observation: observation.readings(),
            })
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ModelError::Transport(format!("server returned status {status}")));
        }

        let body: PredictResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::InvalidOutput(e.to_string()))?;

        Ok(PredictionResult {
            model_id: self.model_id.clone(),
            rul: body.rul,
            failure_probability: body.failure_probability,
            component_probs: body.component_probs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_without_component_probs() {
        let body: PredictResponse =
            serde_json::from_str(r#"{"rul": 112.5, "failure_probability": 0.04}"#).unwrap();
        assert!(body.component_probs.is_none());
        assert_eq!(body.rul, 112.5);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let model = HttpModel::new("fd001", "http://127.0.0.1:1/predict", Duration::from_millis(200)).unwrap();
        let obs = SensorObservation::new(&[0.0; 24]).unwrap();
        let err = model.predict(&obs).await.unwrap_err();
        assert!(matches!(err, ModelError::Transport(_)));
    }
}
