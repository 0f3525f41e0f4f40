//! Template-based report text
//!
//! `analysis_context` renders every upstream result as plain-text sections.
//! It is both the context handed to the narrative backend and the body of the
//! fallback report used when the backend is unavailable, timed out, or
//! returned nothing usable.

use crate::types::{DiagnosisResult, EnsembleSummary, MaintenanceSchedule, RiskAssessment};

/// Borrowed view of the populated result slots.
pub struct ReportInputs<'a> {
    pub ensemble: &'a EnsembleSummary,
    pub diagnosis: &'a DiagnosisResult,
    pub risk: &'a RiskAssessment,
    pub schedule: &'a MaintenanceSchedule,
}

/// Executive summary block.
pub fn summary(inputs: &ReportInputs<'_>) -> String {
    format!(
        "RISK LEVEL: {}\n\
         Component Analysis: {} (confidence {:.1}%)\n\
         Remaining Useful Life: {:.0} cycles\n\
         Maintenance Window: {} (priority {})\n\
         Recommendation: {}",
        inputs.risk.risk_level,
        inputs.diagnosis.probable_component,
        inputs.diagnosis.confidence * 100.0,
        inputs.risk.avg_rul,
        inputs.schedule.maintenance_window,
        inputs.schedule.priority,
        inputs.schedule.rationale,
    )
}

/// Structured sections covering prediction, diagnosis, risk and schedule.
pub fn analysis_context(inputs: &ReportInputs<'_>) -> String {
    let ReportInputs {
        ensemble,
        diagnosis,
        risk,
        schedule,
    } = inputs;

    let mut lines = vec![
        "=== EXECUTIVE SUMMARY ===".to_string(),
        summary(inputs),
        String::new(),
        "=== PREDICTIVE ANALYSIS ===".to_string(),
        format!("Ensemble RUL Estimate: {:.0} cycles", ensemble.avg_rul),
        format!("Average Failure Probability: {:.1}%", ensemble.avg_failure_probability * 100.0),
        format!("Maximum Failure Probability: {:.1}%", ensemble.max_failure_probability * 100.0),
        format!("RUL Spread Across Models: {:.1} cycles", ensemble.rul_std_dev),
        String::new(),
        "=== MODEL PREDICTIONS ===".to_string(),
    ];
    for (model_id, p) in &ensemble.per_model {
        lines.push(format!(
            "{}: RUL={:.0}, P(failure)={:.1}%",
            model_id.to_uppercase(),
            p.rul,
            p.failure_probability * 100.0
        ));
    }
    for failed in &ensemble.failed_models {
        lines.push(format!("{}: unavailable ({})", failed.model_id.to_uppercase(), failed.reason));
    }

    lines.push(String::new());
    lines.push("=== DIAGNOSTIC FINDINGS ===".to_string());
    lines.push(format!("Identified Component: {}", diagnosis.probable_component));
    lines.push(format!("Diagnostic Confidence: {:.1}%", diagnosis.confidence * 100.0));
    lines.push(format!(
        "Reasoning: {}",
        diagnosis.reason.as_deref().unwrap_or("No diagnostic reasoning available")
    ));
    if diagnosis.anomalies.is_empty() {
        lines.push("Anomalous Channels: none".to_string());
    } else {
        let listed: Vec<String> = diagnosis
            .anomalies
            .iter()
            .map(|a| format!("{} ({:+.1} sigma)", a, a.deviation_sigma))
            .collect();
        lines.push(format!("Anomalous Channels: {}", listed.join(", ")));
    }

    if let Some(probs) = &diagnosis.component_probabilities {
        let mut sorted: Vec<(&String, &f64)> = probs.iter().collect();
        sorted.sort_by(|a, b| b.1.total_cmp(a.1));
        lines.push(String::new());
        lines.push("=== COMPONENT PROBABILITIES ===".to_string());
        for (component, p) in sorted {
            lines.push(format!("  {}: {:.1}%", component, p * 100.0));
        }
    }

    lines.push(String::new());
    lines.push("=== RISK FACTORS ===".to_string());
    lines.push(format!("Risk Score: {:.2}", risk.risk_score));
    let factors: Vec<String> = risk.risk_factors.iter().map(ToString::to_string).collect();
    lines.push(format!("Factors: {}", factors.join(", ")));
    lines.push(risk.justification.clone());

    lines.push(String::new());
    lines.push("=== MAINTENANCE ACTION PLAN ===".to_string());
    lines.push(format!("Priority Level: {}", schedule.priority));
    lines.push(format!("Maintenance Window: {}", schedule.maintenance_window));
    lines.push(format!("Target Date: {}", schedule.timeline.target.format("%Y-%m-%d %H:%M")));
    lines.push(format!("Deadline: {}", schedule.timeline.deadline.format("%Y-%m-%d %H:%M")));
    lines.push(format!(
        "Buffer: {} cycles (estimated RUL at maintenance {:.0})",
        schedule.timeline.buffer_cycles, schedule.timeline.estimated_rul_at_maintenance
    ));
    lines.push(String::new());
    lines.push("=== ACTIONABLE RECOMMENDATIONS ===".to_string());
    for (i, action) in schedule.recommended_actions.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, action));
    }

    if !diagnosis.similar_cases.is_empty() {
        lines.push(String::new());
        lines.push("=== HISTORICAL INSIGHTS ===".to_string());
        lines.push(format!("Found {} similar failure patterns:", diagnosis.similar_cases.len()));
        for (i, case) in diagnosis.similar_cases.iter().take(3).enumerate() {
            lines.push(format!(
                "  {}. {} failure (distance {:.3})",
                i + 1,
                case.component_label,
                case.distance
            ));
        }
    }

    lines.join("\n")
}

/// Deterministic report used when no narrative was generated.
pub fn template_narrative(inputs: &ReportInputs<'_>) -> String {
    format!(
        "TURBOFAN ENGINE HEALTH REPORT (template)\n\n{}",
        analysis_context(inputs)
    )
}
