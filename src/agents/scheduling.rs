//! Scheduling Stage - maintenance window, actions and timeline
//!
//! | Risk   | Window    | Target / deadline | Buffer (cycles)      |
//! |--------|-----------|-------------------|----------------------|
//! | HIGH   | IMMEDIATE | +24 h / +48 h     | min(10, 20% of RUL)  |
//! | MEDIUM | SOON      | +7 d / +14 d      | min(20, 30% of RUL)  |
//! | LOW    | ROUTINE   | +30 d / +60 d     | min(40, 40% of RUL)  |
//!
//! Actions come from the `(risk_level, component)` rule table, falling back
//! to the generic per-level list for unrecognised components.

use super::{written, Stage};
use crate::config::PipelineConfig;
use crate::pipeline::{PipelineState, StageName, StageOutcome};
use crate::types::{
    MaintenanceSchedule, MaintenanceTimeline, MaintenanceWindow, RiskAssessment, RiskFactor,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::info;

const DISAGREEMENT_NOTE: &str = "Note: Model disagreement detected - consider additional diagnostics";

pub struct SchedulingStage {
    config: Arc<PipelineConfig>,
}

impl SchedulingStage {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for SchedulingStage {
    fn name(&self) -> StageName {
        StageName::Scheduling
    }

    async fn run(&self, state: &mut PipelineState) -> StageOutcome {
        let schedule = match (state.require_risk(), state.require_diagnosis()) {
            (Ok(risk), Ok(diagnosis)) => plan(&self.config, risk, &diagnosis.probable_component, state.started_at),
            (Err(cause), _) | (_, Err(cause)) => return StageOutcome::Fatal(cause),
        };

        info!(
            window = %schedule.maintenance_window,
            priority = schedule.priority,
            actions = schedule.recommended_actions.len(),
            "Maintenance scheduled"
        );

        written(state.set_schedule(schedule), Vec::new())
    }
}

/// Build the schedule for an assessment. Deterministic for a given `now`.
pub fn plan(
    config: &PipelineConfig,
    risk: &RiskAssessment,
    component: &str,
    now: DateTime<Utc>,
) -> MaintenanceSchedule {
    let window = MaintenanceWindow::for_risk(risk.risk_level);

    let mut actions = config.scheduling.actions_for(risk.risk_level, component);
    if risk.has_factor(RiskFactor::ModelDisagreement) {
        actions.push(DISAGREEMENT_NOTE.to_string());
    }

    MaintenanceSchedule {
        maintenance_window: window,
        recommended_actions: actions,
        priority: window.priority(),
        timeline: timeline(window, risk.avg_rul, now),
        rationale: rationale(window, risk, component),
    }
}

pub fn timeline(window: MaintenanceWindow, avg_rul: f64, now: DateTime<Utc>) -> MaintenanceTimeline {
    let (target, deadline, cap, fraction) = match window {
        MaintenanceWindow::Immediate => (Duration::hours(24), Duration::hours(48), 10.0, 0.2),
        MaintenanceWindow::Soon => (Duration::days(7), Duration::days(14), 20.0, 0.3),
        MaintenanceWindow::Routine => (Duration::days(30), Duration::days(60), 40.0, 0.4),
    };
    let rul = avg_rul.max(0.0);
    let buffer = (rul * fraction).floor().min(cap);

    MaintenanceTimeline {
        target: now + target,
        deadline: now + deadline,
        buffer_cycles: buffer as u32,
        estimated_rul_at_maintenance: (rul - buffer).max(0.0),
    }
}

fn rationale(window: MaintenanceWindow, risk: &RiskAssessment, component: &str) -> String {
    let level = risk.risk_level;
    let rul = risk.avg_rul;
    match window {
        MaintenanceWindow::Immediate => format!(
            "{level} risk assessment requires immediate attention. Component '{component}' \
             showing signs of imminent failure with RUL of {rul:.0} cycles. \
             Schedule maintenance within 24-48 hours to prevent unplanned downtime."
        ),
        MaintenanceWindow::Soon => format!(
            "{level} risk assessment suggests proactive maintenance. Component '{component}' \
             degradation detected with RUL of {rul:.0} cycles. \
             Schedule maintenance within 1-2 weeks to optimize maintenance costs."
        ),
        MaintenanceWindow::Routine => format!(
            "{level} risk assessment indicates normal operation. Component '{component}' \
             operating within normal parameters (RUL: {rul:.0} cycles). \
             Schedule maintenance during next routine maintenance window."
        ),
    }
}
