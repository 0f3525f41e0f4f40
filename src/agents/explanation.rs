//! Explanation Stage - narrative report
//!
//! Builds a prompt from every upstream result and asks the narrative backend
//! for a report. Transient failures (timeout, transport error, empty answer)
//! are retried up to `explanation.max_attempts` in total; anything else, or
//! running out of attempts, falls back to the deterministic template. Never
//! fatal unless upstream slots are missing.

use super::templates::{analysis_context, template_narrative, ReportInputs};
use super::{written, Stage};
use crate::config::PipelineConfig;
use crate::llm::{sanitize_generated, NarrativeError, NarrativeGenerator};
use crate::pipeline::{FatalCause, PipelineState, StageName, StageOutcome};
use crate::types::{FinalReport, RiskLevel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

const REPORT_PROMPT: &str = r#"You are an expert predictive maintenance analyst for a turbofan engine fleet.
Generate a professional diagnostic report based on the following analysis data.

### ANALYSIS DATA
{context}

### INSTRUCTIONS
1. Write an Executive Summary.
2. Provide a Detailed Analysis of the findings, explaining root causes and risk factors.
3. Outline a clear Maintenance Action Plan.
4. Use a professional, authoritative, yet helpful tone.
5. Use clear headings ("Executive Summary", "Technical Analysis", "Recommendations") and bullet points.
6. Do NOT use markdown code blocks. Return plain formatted text.
{urgency}"#;

const URGENCY_LINE: &str = "7. The risk is HIGH: emphasise the urgency of the maintenance action.";

pub struct ExplanationStage {
    config: Arc<PipelineConfig>,
    narrator: Arc<dyn NarrativeGenerator>,
}

/// Result of the generate-and-retry loop.
struct Attempts {
    narrative: Option<String>,
    attempts: u32,
    errors: Vec<NarrativeError>,
}

impl ExplanationStage {
    pub fn new(config: Arc<PipelineConfig>, narrator: Arc<dyn NarrativeGenerator>) -> Self {
        Self { config, narrator }
    }

    async fn attempt(&self, prompt: &str) -> Result<String, NarrativeError> {
        let timeouts = &self.config.timeouts;
        let text = tokio::time::timeout(timeouts.narrative(), self.narrator.generate(prompt))
            .await
            .map_err(|_| NarrativeError::Timeout(timeouts.narrative_ms))??;
        sanitize_generated(&text).ok_or(NarrativeError::Empty)
    }

    async fn generate(&self, prompt: &str) -> Attempts {
        let max_attempts = self.config.explanation.max_attempts.max(1);
        let mut errors = Vec::new();
        let mut attempts = 0;

        while attempts < max_attempts {
            attempts += 1;
            match self.attempt(prompt).await {
                Ok(narrative) => {
                    return Attempts {
                        narrative: Some(narrative),
                        attempts,
                        errors,
                    }
                }
                Err(e) => {
                    let transient = e.is_transient();
                    debug!(attempt = attempts, error = %e, transient, "Narrative attempt failed");
                    errors.push(e);
                    if !transient {
                        break;
                    }
                }
            }
        }

        Attempts {
            narrative: None,
            attempts,
            errors,
        }
    }
}

#[async_trait]
impl Stage for ExplanationStage {
    fn name(&self) -> StageName {
        StageName::Explanation
    }

    async fn run(&self, state: &mut PipelineState) -> StageOutcome {
        let (context, fallback, level) = match inputs(state) {
            Ok(inputs) => (
                analysis_context(&inputs),
                template_narrative(&inputs),
                inputs.risk.risk_level,
            ),
            Err(cause) => return StageOutcome::Fatal(cause),
        };

        let prompt = build_prompt(&context, level);
        let report_id = report_id(state.started_at, &context);
        let outcome = self.generate(&prompt).await;

        let mut notes = Vec::new();
        let report = match outcome.narrative {
            Some(narrative) => FinalReport {
                narrative,
                generated: true,
                attempts: outcome.attempts,
                report_id,
                generated_at: Utc::now(),
            },
            None => {
                // A disabled backend is a configuration choice, not a degraded run.
                let disabled = matches!(outcome.errors.as_slice(), [NarrativeError::Unavailable(_)]);
                if !disabled {
                    let last = outcome
                        .errors
                        .last()
                        .map_or_else(|| "no attempt made".to_string(), ToString::to_string);
                    warn!(
                        attempts = outcome.attempts,
                        error = %last,
                        backend = self.narrator.backend_name(),
                        "Narrative generation failed, using template"
                    );
                    notes.push(format!(
                        "narrative generation failed after {} attempt(s): {}",
                        outcome.attempts, last
                    ));
                }
                FinalReport {
                    narrative: fallback,
                    generated: false,
                    attempts: if disabled { 0 } else { outcome.attempts },
                    report_id,
                    generated_at: Utc::now(),
                }
            }
        };

        info!(
            report_id = %report.report_id,
            generated = report.generated,
            attempts = report.attempts,
            "Report ready"
        );

        written(state.set_report(report), notes)
    }
}

fn inputs(state: &PipelineState) -> Result<ReportInputs<'_>, FatalCause> {
    Ok(ReportInputs {
        ensemble: state.require_ensemble()?,
        diagnosis: state.require_diagnosis()?,
        risk: state.require_risk()?,
        schedule: state.require_schedule()?,
    })
}

pub fn build_prompt(context: &str, level: RiskLevel) -> String {
    let urgency = if level == RiskLevel::High { URGENCY_LINE } else { "" };
    REPORT_PROMPT
        .replace("{context}", context)
        .replace("{urgency}", urgency)
        .trim_end()
        .to_string()
}

/// `RPT-<yyyymmddHHMMSS>-<first 8 hex digits of md5(context)>`
pub fn report_id(at: DateTime<Utc>, context: &str) -> String {
    let digest = format!("{:x}", md5::compute(context.as_bytes()));
    format!("RPT-{}-{}", at.format("%Y%m%d%H%M%S"), &digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_report_id_format() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 8, 30, 5).unwrap();
        let id = report_id(at, "context");
        assert!(id.starts_with("RPT-20261016083005-"));
        assert_eq!(id.len(), "RPT-20261016083005-".len() + 8);
        assert_eq!(id, report_id(at, "context"));
        assert_ne!(id, report_id(at, "other context"));
    }

    #[test]
    fn test_prompt_urgency_only_for_high_risk() {
        assert!(build_prompt("ctx", RiskLevel::High).contains("emphasise the urgency"));
        assert!(!build_prompt("ctx", RiskLevel::Medium).contains("urgency"));
        assert!(build_prompt("ctx", RiskLevel::Low).contains("### ANALYSIS DATA\nctx"));
    }
}
