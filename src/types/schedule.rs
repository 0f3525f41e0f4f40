//! Scheduling and reporting stage types

use super::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How soon maintenance should happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaintenanceWindow {
    Routine,
    Soon,
    Immediate,
}

impl MaintenanceWindow {
    pub fn for_risk(level: RiskLevel) -> Self {
        match level {
            RiskLevel::High => MaintenanceWindow::Immediate,
            RiskLevel::Medium => MaintenanceWindow::Soon,
            RiskLevel::Low => MaintenanceWindow::Routine,
        }
    }

    /// 1 = highest, 3 = lowest
    pub fn priority(self) -> u8 {
        match self {
            MaintenanceWindow::Immediate => 1,
            MaintenanceWindow::Soon => 2,
            MaintenanceWindow::Routine => 3,
        }
    }
}

impl std::fmt::Display for MaintenanceWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaintenanceWindow::Routine => write!(f, "ROUTINE"),
            MaintenanceWindow::Soon => write!(f, "SOON"),
            MaintenanceWindow::Immediate => write!(f, "IMMEDIATE"),
        }
    }
}

/// Calendar targets for the recommended window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceTimeline {
    pub target: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// Safety margin in cycles kept between maintenance and predicted end of life
    pub buffer_cycles: u32,
    pub estimated_rul_at_maintenance: f64,
}

/// Output of the scheduling stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceSchedule {
    pub maintenance_window: MaintenanceWindow,
    pub recommended_actions: Vec<String>,
    pub priority: u8,
    pub timeline: MaintenanceTimeline,
    pub rationale: String,
}

/// Output of the explanation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub narrative: String,
    /// True when the narrative backend produced the text, false for the template
    pub generated: bool,
    /// Backend attempts made (0 when the backend was not consulted)
    pub attempts: u32,
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_mapping() {
        assert_eq!(MaintenanceWindow::for_risk(RiskLevel::High), MaintenanceWindow::Immediate);
        assert_eq!(MaintenanceWindow::for_risk(RiskLevel::Medium), MaintenanceWindow::Soon);
        assert_eq!(MaintenanceWindow::for_risk(RiskLevel::Low), MaintenanceWindow::Routine);
    }

    #[test]
    fn test_priority_order() {
        assert!(MaintenanceWindow::Immediate.priority() < MaintenanceWindow::Soon.priority());
        assert!(MaintenanceWindow::Soon.priority() < MaintenanceWindow::Routine.priority());
    }
}
