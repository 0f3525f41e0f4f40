//! Similarity index: nearest historical failure cases for a signature
//!
//! - `InMemoryIndex`: brute-force Euclidean scan over cases held in RAM,
//!   optionally loaded from a JSON file at startup
//! - `NoOpIndex`: always empty (deployments without a case library)
//!
//! The linear scan is O(n) per query, which is fast for a few thousand cases.

use crate::types::{normalize_component_label, HistoricalCase};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum IndexError {
    #[error("signature has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("signature contains non-finite values")]
    NonFinite,

    #[error("similarity search timed out after {0} ms")]
    Timeout(u64),

    #[error("failed to load cases from {p}: {reason}", p = .path.display())]
    Load { path: PathBuf, reason: String },

    #[error("index unavailable: {0}")]
    Unavailable(String),
}

/// Nearest-neighbour lookup over labelled historical failures.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Up to `k` cases ordered by ascending distance.
    async fn nearest(&self, signature: &[f64], k: usize) -> Result<Vec<HistoricalCase>, IndexError>;

    /// Name for logging and health checks
    fn index_name(&self) -> &'static str;

    /// Number of stored cases
    fn case_count(&self) -> usize;
}

/// Index that never returns cases.
pub struct NoOpIndex;

#[async_trait]
impl SimilarityIndex for NoOpIndex {
    async fn nearest(&self, _signature: &[f64], _k: usize) -> Result<Vec<HistoricalCase>, IndexError> {
        Ok(Vec::new())
    }

    fn index_name(&self) -> &'static str {
        "NoOp"
    }

    fn case_count(&self) -> usize {
        0
    }
}

/// One labelled case as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCase {
    pub signature: Vec<f64>,
    pub component_label: String,
}

/// In-memory case library with linear-scan search.
///
/// Every stored case and every query must have the index dimension. An
/// index built with `new` takes its dimension from the first accepted case.
pub struct InMemoryIndex {
    dimension: Option<usize>,
    cases: RwLock<Vec<StoredCase>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            dimension: None,
            cases: RwLock::new(Vec::new()),
        }
    }

    /// Empty index that only accepts signatures of length `dimension`.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            cases: RwLock::new(Vec::new()),
        }
    }

    /// Build from cases. Cases that fail validation (non-finite values, or a
    /// length different from the first accepted case) are skipped.
    pub fn from_cases(cases: Vec<StoredCase>) -> Self {
        Self::new().populate(cases)
    }

    /// Build from cases, skipping any whose length is not `dimension`.
    pub fn from_cases_with_dimension(dimension: usize, cases: Vec<StoredCase>) -> Self {
        Self::with_dimension(dimension).populate(cases)
    }

    fn populate(self, cases: Vec<StoredCase>) -> Self {
        let mut skipped = 0usize;
        for case in cases {
            if let Err(e) = self.insert(case) {
                debug!(error = %e, "Skipping historical case");
                skipped += 1;
            }
        }
        if skipped > 0 {
            warn!(skipped, kept = self.case_count(), "Skipped invalid historical cases");
        }
        self
    }

    /// Load a JSON array of `{"signature": [..], "component_label": ".."}`.
    /// Cases whose signature length is not `dimension` are skipped.
    pub fn load_from_file(path: &Path, dimension: usize) -> Result<Self, IndexError> {
        let load_err = |reason: String| IndexError::Load {
            path: path.to_path_buf(),
            reason,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let cases: Vec<StoredCase> =
            serde_json::from_str(&contents).map_err(|e| load_err(e.to_string()))?;
        let index = Self::from_cases_with_dimension(dimension, cases);
        info!(path = %path.display(), cases = index.case_count(), dimension, "Loaded historical failure cases");
        Ok(index)
    }

    fn expected_dimension(&self, store: &[StoredCase]) -> Option<usize> {
        self.dimension.or_else(|| store.first().map(|c| c.signature.len()))
    }

    /// Add a case. All cases must share the index dimension.
    pub fn insert(&self, mut case: StoredCase) -> Result<(), IndexError> {
        if case.signature.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::NonFinite);
        }
        let mut store = self.cases.write().map_err(|_| poisoned())?;
        if let Some(expected) = self.expected_dimension(&store) {
            if expected != case.signature.len() {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: case.signature.len(),
                });
            }
        }
        case.component_label = normalize_component_label(&case.component_label);
        store.push(case);
        Ok(())
    }

    /// Brute-force k-nearest search.
    fn search(&self, signature: &[f64], k: usize) -> Result<Vec<HistoricalCase>, IndexError> {
        if signature.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::NonFinite);
        }
        let store = self.cases.read().map_err(|_| poisoned())?;
        if let Some(expected) = self.expected_dimension(&store) {
            if expected != signature.len() {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: signature.len(),
                });
            }
        }

        let mut scored: Vec<(f64, &StoredCase)> = store
            .iter()
            .map(|case| (euclidean(signature, &case.signature), case))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let results: Vec<HistoricalCase> = scored
            .into_iter()
            .take(k)
            .map(|(distance, case)| HistoricalCase {
                signature: case.signature.clone(),
                component_label: case.component_label.clone(),
                distance,
            })
            .collect();

        debug!(k, found = results.len(), "Similarity search");
        Ok(results)
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimilarityIndex for InMemoryIndex {
    async fn nearest(&self, signature: &[f64], k: usize) -> Result<Vec<HistoricalCase>, IndexError> {
        self.search(signature, k)
    }

    fn index_name(&self) -> &'static str {
        "InMemory"
    }

    fn case_count(&self) -> usize {
        self.cases.read().map(|c| c.len()).unwrap_or(0)
    }
}

fn poisoned() -> IndexError {
    IndexError::Unavailable("case store lock poisoned".to_string())
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(sig: &[f64], label: &str) -> StoredCase {
        StoredCase {
            signature: sig.to_vec(),
            component_label: label.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_index() {
        let index = InMemoryIndex::new();
        assert!(index.nearest(&[1.0, 0.0], 3).await.unwrap().is_empty());
        assert_eq!(index.case_count(), 0);
    }

    #[tokio::test]
    async fn test_nearest_orders_by_distance() {
        let index = InMemoryIndex::from_cases(vec![
            case(&[0.0, 1.0], "Fan"),
            case(&[1.0, 0.0], "HPC"),
            case(&[0.7, 0.7], "HPC"),
        ]);

        let hits = index.nearest(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].component_label, "HPC");
        assert_eq!(hits[0].distance, 0.0);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_k_larger_than_library() {
        let index = InMemoryIndex::from_cases(vec![case(&[1.0], "Fan")]);
        assert_eq!(index.nearest(&[0.0], 10).await.unwrap().len(), 1);
    }

    #[test]
    fn test_insert_rejects_dimension_mismatch() {
        let index = InMemoryIndex::from_cases(vec![case(&[1.0, 2.0], "Fan")]);
        let err = index.insert(case(&[1.0], "HPC")).unwrap_err();
        assert_eq!(err, IndexError::DimensionMismatch { expected: 2, actual: 1 });
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let index = InMemoryIndex::from_cases(vec![case(&[1.0, 2.0], "Fan")]);
        assert!(index.nearest(&[1.0], 1).await.is_err());
    }

    #[test]
    fn test_from_cases_skips_mismatched() {
        let index = InMemoryIndex::from_cases(vec![
            case(&[1.0, 0.0], "HPC"),
            case(&[1.0], "Fan"),
            case(&[f64::NAN, 0.0], "Fan"),
            case(&[0.0, 1.0], "Fan"),
        ]);
        assert_eq!(index.case_count(), 2);
    }

    #[test]
    fn test_labels_normalised_on_insert() {
        let index = InMemoryIndex::from_cases(vec![case(&[1.0], "2")]);
        let hits = index.search(&[1.0], 1).unwrap();
        assert_eq!(hits[0].component_label, "Fan");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.json");
        std::fs::write(
            &path,
            r#"[{"signature": [0.6, 0.8], "component_label": "HPC"}]"#,
        )
        .unwrap();
        let index = InMemoryIndex::load_from_file(&path, 2).unwrap();
        assert_eq!(index.case_count(), 1);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            InMemoryIndex::load_from_file(&path, 2),
            Err(IndexError::Load { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_first_case_does_not_poison_library() {
        let hpc = [0.1; 26];
        let index = InMemoryIndex::from_cases_with_dimension(
            26,
            vec![
                case(&[1.0, 0.0, 0.0], "Fan"),
                case(&hpc, "HPC"),
                case(&hpc, "HPC"),
                case(&hpc, "1"),
            ],
        );
        assert_eq!(index.case_count(), 3);

        let hits = index.nearest(&hpc, 5).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|c| c.component_label == "HPC"));
    }

    #[tokio::test]
    async fn test_fixed_dimension_rejects_queries_before_any_insert() {
        let index = InMemoryIndex::with_dimension(4);
        assert_eq!(
            index.nearest(&[1.0, 0.0], 3).await.unwrap_err(),
            IndexError::DimensionMismatch { expected: 4, actual: 2 }
        );
        assert!(index.insert(case(&[1.0; 3], "Fan")).is_err());
        assert!(index.insert(case(&[1.0; 4], "Fan")).is_ok());
    }

    #[test]
    fn test_load_from_file_skips_wrong_dimension_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.json");
        std::fs::write(
            &path,
            r#"[
                {"signature": [1.0, 0.0, 0.0], "component_label": "Fan"},
                {"signature": [0.6, 0.8], "component_label": "HPC"},
                {"signature": [0.8, 0.6], "component_label": "2"}
            ]"#,
        )
        .unwrap();
        let index = InMemoryIndex::load_from_file(&path, 2).unwrap();
        assert_eq!(index.case_count(), 2);
    }

    #[tokio::test]
    async fn test_noop_index() {
        let index = NoOpIndex;
        assert!(index.nearest(&[1.0], 5).await.unwrap().is_empty());
        assert_eq!(index.index_name(), "NoOp");
    }
}
