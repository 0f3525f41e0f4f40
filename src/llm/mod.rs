//! Narrative Backend Module
//!
//! Provides a unified interface for the text generators used by the
//! diagnosis reasoning step and the final report.
//!
//! ## Backends
//!
//! - **OpenAiCompatibleGenerator**: any `/v1/chat/completions` server
//!   (hosted API, vLLM, llama.cpp server, Ollama)
//! - **DisabledGenerator**: always unavailable; the pipeline falls back to
//!   template text

use crate::config::{NarrativeBackendKind, NarrativeConfig};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

mod openai;

pub use openai::OpenAiCompatibleGenerator;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NarrativeError {
    #[error("narrative generation timed out after {0} ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned an empty response")]
    Empty,

    #[error("backend rejected the request: {0}")]
    Rejected(String),

    #[error("narrative backend unavailable: {0}")]
    Unavailable(String),
}

impl NarrativeError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NarrativeError::Timeout(_) | NarrativeError::Transport(_) | NarrativeError::Empty
        )
    }
}

/// Unified trait for narrative backends
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Generate text from a prompt
    async fn generate(&self, prompt: &str) -> Result<String, NarrativeError>;

    /// Get the backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Backend used when no generator is configured.
pub struct DisabledGenerator;

#[async_trait]
impl NarrativeGenerator for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, NarrativeError> {
        Err(NarrativeError::Unavailable("narrative backend disabled".to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "disabled"
    }
}

/// Construct the backend selected in `[narrative]`.
pub fn from_config(config: &NarrativeConfig) -> Result<Arc<dyn NarrativeGenerator>, NarrativeError> {
    match config.backend {
        NarrativeBackendKind::Disabled => Ok(Arc::new(DisabledGenerator)),
        NarrativeBackendKind::Openai => Ok(Arc::new(OpenAiCompatibleGenerator::from_config(config)?)),
    }
}

#[allow(clippy::expect_used)]
fn code_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("static code fence pattern")
    })
}

/// Strip markdown code fences and surrounding whitespace from generated text.
///
/// Returns `None` when nothing but whitespace remains.
pub fn sanitize_generated(text: &str) -> Option<String> {
    let stripped = code_fence_re().replace_all(text, "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(NarrativeError::Timeout(100).is_transient());
        assert!(NarrativeError::Empty.is_transient());
        assert!(NarrativeError::Transport("reset".into()).is_transient());
        assert!(!NarrativeError::Rejected("401".into()).is_transient());
        assert!(!NarrativeError::Unavailable("off".into()).is_transient());
    }

    #[test]
    fn test_sanitize_strips_fences() {
        let raw = "```markdown\nEXECUTIVE SUMMARY\nEngine healthy.\n```\n";
        assert_eq!(
            sanitize_generated(raw).as_deref(),
            Some("EXECUTIVE SUMMARY\nEngine healthy.")
        );
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize_generated("  \n```\n```  "), None);
        assert_eq!(sanitize_generated(""), None);
    }

    #[tokio::test]
    async fn test_disabled_generator() {
        let backend = DisabledGenerator;
        let err = backend.generate("hello").await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(backend.backend_name(), "disabled");
    }

    #[test]
    fn test_from_config_disabled_by_default() {
        let backend = from_config(&NarrativeConfig::default()).unwrap();
        assert_eq!(backend.backend_name(), "disabled");
    }
}
