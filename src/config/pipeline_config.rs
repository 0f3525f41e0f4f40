//! Pipeline Configuration - every tunable of the diagnosis pipeline as TOML
//!
//! Each struct implements `Default` with the built-in constants from
//! `defaults`, so a missing file or a partial file behaves predictably.

use super::defaults::*;
use crate::types::{RiskLevel, OBSERVATION_LEN};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "TURBOFAN_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "turbofan.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration, loaded once before any pipeline run and immutable during runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub sensors: SensorConfig,

    #[serde(default)]
    pub diagnosis: DiagnosisConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub scheduling: SchedulingConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub explanation: ExplanationConfig,

    /// Regime models, one entry per predictor
    #[serde(default = "default_models")]
    pub models: Vec<ModelEndpoint>,

    #[serde(default)]
    pub similarity: SimilarityConfig,

    #[serde(default)]
    pub narrative: NarrativeConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sensors: SensorConfig::default(),
            diagnosis: DiagnosisConfig::default(),
            risk: RiskConfig::default(),
            scheduling: SchedulingConfig::default(),
            timeouts: TimeoutConfig::default(),
            explanation: ExplanationConfig::default(),
            models: default_models(),
            similarity: SimilarityConfig::default(),
            narrative: NarrativeConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$TURBOFAN_CONFIG`
    /// 2. `./turbofan.toml`
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded pipeline config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded pipeline config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&contents)
            .map_err(|e| match e {
                ConfigError::ParseStr(inner) => ConfigError::Parse(path.to_path_buf(), inner),
                other => other,
            })?;
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(ConfigError::ParseStr)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all values for internal consistency, collecting every problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        // Sensors
        let channels = &self.sensors.channels;
        if channels.len() != OBSERVATION_LEN {
            errors.push(format!(
                "sensors.channels must list exactly {} channels, got {}",
                OBSERVATION_LEN,
                channels.len()
            ));
        }
        for (i, ch) in channels.iter().enumerate() {
            if !ch.nominal.is_finite() || !ch.spread.is_finite() || !ch.threshold_sigma.is_finite() {
                errors.push(format!("sensors.channels[{i}] ({}): values must be finite", ch.name));
                continue;
            }
            if ch.spread < 0.0 {
                errors.push(format!("sensors.channels[{i}] ({}): spread must be >= 0", ch.name));
            }
            if ch.threshold_sigma <= 0.0 {
                errors.push(format!("sensors.channels[{i}] ({}): threshold_sigma must be > 0", ch.name));
            }
        }

        // Diagnosis
        if self.diagnosis.top_k == 0 {
            errors.push("diagnosis.top_k must be > 0".to_string());
        }
        if let Some(d) = self.diagnosis.max_distance {
            if !d.is_finite() || d <= 0.0 {
                errors.push(format!("diagnosis.max_distance must be a positive finite number, got {d}"));
            }
        }

        // Risk
        let r = &self.risk;
        let weights = [r.rul_weight, r.failure_probability_weight, r.diagnosis_uncertainty_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            errors.push("risk weights must be finite and >= 0".to_string());
        } else {
            let sum: f64 = weights.iter().sum();
            if (sum - 1.0).abs() > 1e-6 {
                errors.push(format!("risk weights must sum to 1.0, got {sum:.4}"));
            }
        }
        if !(r.medium_cut > 0.0 && r.medium_cut < r.high_cut && r.high_cut < 1.0) {
            errors.push(format!(
                "risk cut points must satisfy 0 < medium_cut ({}) < high_cut ({}) < 1",
                r.medium_cut, r.high_cut
            ));
        }
        if !r.rul_horizon_cycles.is_finite() || r.rul_horizon_cycles <= 0.0 {
            errors.push("risk.rul_horizon_cycles must be > 0".to_string());
        }
        if !r.disagreement_std_cycles.is_finite() || r.disagreement_std_cycles < 0.0 {
            errors.push("risk.disagreement_std_cycles must be >= 0".to_string());
        }

        // Scheduling
        for (i, rule) in self.scheduling.rules.iter().enumerate() {
            if rule.component.trim().is_empty() {
                errors.push(format!("scheduling.rules[{i}]: component must not be empty"));
            }
            if rule.actions.is_empty() {
                errors.push(format!("scheduling.rules[{i}]: actions must not be empty"));
            }
        }
        let g = &self.scheduling.generic;
        if g.low.is_empty() || g.medium.is_empty() || g.high.is_empty() {
            errors.push("scheduling.generic must define actions for low, medium and high".to_string());
        }

        // Timeouts
        let t = &self.timeouts;
        if t.model_ms == 0 || t.similarity_ms == 0 || t.narrative_ms == 0 {
            errors.push("timeouts must all be > 0 ms".to_string());
        }

        // Explanation
        if self.explanation.max_attempts == 0 {
            errors.push("explanation.max_attempts must be >= 1".to_string());
        }

        // Models
        if self.models.is_empty() {
            errors.push("at least one [[models]] entry is required".to_string());
        }
        let mut seen = HashSet::new();
        for m in &self.models {
            if !seen.insert(m.id.as_str()) {
                errors.push(format!("duplicate model id '{}'", m.id));
            }
        }

        // Narrative
        let n = &self.narrative;
        if n.backend == NarrativeBackendKind::Openai && n.endpoint.trim().is_empty() {
            errors.push("narrative.endpoint is required for the openai backend".to_string());
        }
        if !n.temperature.is_finite() || !(0.0..=2.0).contains(&n.temperature) {
            errors.push(format!("narrative.temperature must be within [0, 2], got {}", n.temperature));
        }

        if self.server.max_concurrent_runs == 0 {
            errors.push("server.max_concurrent_runs must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({path}): {1}", path = .0.display())]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({path}): {1}", path = .0.display())]
    Parse(PathBuf, toml::de::Error),

    #[error("Config parse error: {0}")]
    ParseStr(toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed:\n  - {joined}", joined = .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sensors
// ============================================================================

/// Nominal baseline and anomaly threshold for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelBaseline {
    pub name: String,
    pub nominal: f64,
    /// Standard deviation of the healthy fleet; 0 disables scoring for the channel
    pub spread: f64,
    #[serde(default = "default_threshold_sigma")]
    pub threshold_sigma: f64,
}

fn default_threshold_sigma() -> f64 {
    DEFAULT_THRESHOLD_SIGMA
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelBaseline>,
}

fn default_channels() -> Vec<ChannelBaseline> {
    NOMINAL_CHANNELS
        .iter()
        .map(|&(name, nominal, spread)| ChannelBaseline {
            name: name.to_string(),
            nominal,
            spread,
            threshold_sigma: DEFAULT_THRESHOLD_SIGMA,
        })
        .collect()
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self { channels: default_channels() }
    }
}

// ============================================================================
// Diagnosis
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisConfig {
    /// Nearest cases requested from the similarity index
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Cases farther than this are ignored in the vote
    #[serde(default)]
    pub max_distance: Option<f64>,

    /// Ask the narrative backend for a short causal explanation
    #[serde(default = "default_true")]
    pub llm_reasoning: bool,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_true() -> bool {
    true
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_distance: None,
            llm_reasoning: true,
        }
    }
}

// ============================================================================
// Risk
// ============================================================================

/// `score = rul_weight * f(avg_rul) + failure_probability_weight * p + diagnosis_uncertainty_weight * (1 - confidence)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_rul_weight")]
    pub rul_weight: f64,
    #[serde(default = "default_fp_weight")]
    pub failure_probability_weight: f64,
    #[serde(default = "default_uncertainty_weight")]
    pub diagnosis_uncertainty_weight: f64,
    #[serde(default = "default_rul_horizon")]
    pub rul_horizon_cycles: f64,
    #[serde(default = "default_medium_cut")]
    pub medium_cut: f64,
    #[serde(default = "default_high_cut")]
    pub high_cut: f64,
    #[serde(default = "default_disagreement")]
    pub disagreement_std_cycles: f64,
}

fn default_rul_weight() -> f64 { DEFAULT_RUL_WEIGHT }
fn default_fp_weight() -> f64 { DEFAULT_FAILURE_PROBABILITY_WEIGHT }
fn default_uncertainty_weight() -> f64 { DEFAULT_DIAGNOSIS_UNCERTAINTY_WEIGHT }
fn default_rul_horizon() -> f64 { DEFAULT_RUL_HORIZON_CYCLES }
fn default_medium_cut() -> f64 { DEFAULT_MEDIUM_CUT }
fn default_high_cut() -> f64 { DEFAULT_HIGH_CUT }
fn default_disagreement() -> f64 { DEFAULT_DISAGREEMENT_STD_CYCLES }

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            rul_weight: default_rul_weight(),
            failure_probability_weight: default_fp_weight(),
            diagnosis_uncertainty_weight: default_uncertainty_weight(),
            rul_horizon_cycles: default_rul_horizon(),
            medium_cut: default_medium_cut(),
            high_cut: default_high_cut(),
            disagreement_std_cycles: default_disagreement(),
        }
    }
}

// ============================================================================
// Scheduling
// ============================================================================

/// Actions for one (risk level, component) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRule {
    pub risk_level: RiskLevel,
    pub component: String,
    pub actions: Vec<String>,
}

/// Per-level actions used when no rule matches the component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericActions {
    pub low: Vec<String>,
    pub medium: Vec<String>,
    pub high: Vec<String>,
}

impl GenericActions {
    pub fn for_level(&self, level: RiskLevel) -> &[String] {
        match level {
            RiskLevel::Low => &self.low,
            RiskLevel::Medium => &self.medium,
            RiskLevel::High => &self.high,
        }
    }
}

impl Default for GenericActions {
    fn default() -> Self {
        Self {
            high: strings(&[
                "Inspect {component} immediately for signs of failure",
                "Prepare replacement parts and tooling",
                "Schedule skilled technician availability",
                "Consider taking unit offline if failure risk is critical",
                "Document all observations for failure analysis",
            ]),
            medium: strings(&[
                "Order replacement parts for {component}",
                "Schedule maintenance during next available window",
                "Monitor sensor readings for any rapid degradation",
                "Prepare maintenance procedures and safety protocols",
            ]),
            low: strings(&[
                "Include {component} inspection in next routine maintenance",
                "Continue normal monitoring schedule",
                "Update maintenance records",
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_rules")]
    pub rules: Vec<ActionRule>,
    #[serde(default)]
    pub generic: GenericActions,
}

impl SchedulingConfig {
    /// Actions for a (level, component) pair with `{component}` substituted.
    ///
    /// Component matching is case-insensitive; unknown components get the
    /// generic actions for the level.
    pub fn actions_for(&self, level: RiskLevel, component: &str) -> Vec<String> {
        let matched = self
            .rules
            .iter()
            .find(|r| r.risk_level == level && r.component.eq_ignore_ascii_case(component.trim()));

        let templates = match matched {
            Some(rule) => rule.actions.as_slice(),
            None => self.generic.for_level(level),
        };

        templates
            .iter()
            .map(|a| a.replace("{component}", component))
            .collect()
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            generic: GenericActions::default(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn rule(risk_level: RiskLevel, component: &str, actions: &[&str]) -> ActionRule {
    ActionRule {
        risk_level,
        component: component.to_string(),
        actions: strings(actions),
    }
}

fn default_rules() -> Vec<ActionRule> {
    vec![
        rule(RiskLevel::High, "HPC", &[
            "Perform borescope inspection of HPC stages for blade erosion and tip clearance loss",
            "Review HPC outlet temperature (sensor 3) and static pressure (sensor 11) trends",
            "Prepare HPC module replacement or blade repair kit",
            "Restrict engine to reduced thrust until inspection is complete",
        ]),
        rule(RiskLevel::Medium, "HPC", &[
            "Schedule HPC borescope inspection at the next available window",
            "Plan an on-wing compressor wash to recover HPC efficiency",
            "Monitor sensor 3, sensor 11 and sensor 12 for accelerating drift",
        ]),
        rule(RiskLevel::Low, "HPC", &[
            "Include HPC borescope in the next routine inspection",
            "Continue trending HPC outlet temperature and pressure",
        ]),
        rule(RiskLevel::High, "Fan", &[
            "Inspect fan blades for foreign-object damage and leading-edge erosion",
            "Check fan speed (sensor 8) and bypass ratio (sensor 15) against baseline",
            "Prepare fan blade replacement and balancing equipment",
            "Consider removing engine from service pending fan inspection",
        ]),
        rule(RiskLevel::Medium, "Fan", &[
            "Schedule fan blade inspection and rebalancing",
            "Monitor fan speed and bypass ratio for further deviation",
            "Order fan blade set and balance weights",
        ]),
        rule(RiskLevel::Low, "Fan", &[
            "Include fan visual inspection in the next routine maintenance",
            "Continue monitoring the fan speed trend",
        ]),
        rule(RiskLevel::Low, "Healthy", &[
            "No component-specific action required",
            "Continue normal monitoring schedule",
        ]),
    ]
}

// ============================================================================
// Timeouts
// ============================================================================

/// Per-call timeouts for external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_model_ms")]
    pub model_ms: u64,
    #[serde(default = "default_similarity_ms")]
    pub similarity_ms: u64,
    #[serde(default = "default_narrative_ms")]
    pub narrative_ms: u64,
}

fn default_model_ms() -> u64 { DEFAULT_MODEL_TIMEOUT_MS }
fn default_similarity_ms() -> u64 { DEFAULT_SIMILARITY_TIMEOUT_MS }
fn default_narrative_ms() -> u64 { DEFAULT_NARRATIVE_TIMEOUT_MS }

impl TimeoutConfig {
    pub fn model(&self) -> Duration {
        Duration::from_millis(self.model_ms)
    }
    pub fn similarity(&self) -> Duration {
        Duration::from_millis(self.similarity_ms)
    }
    pub fn narrative(&self) -> Duration {
        Duration::from_millis(self.narrative_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            model_ms: default_model_ms(),
            similarity_ms: default_similarity_ms(),
            narrative_ms: default_narrative_ms(),
        }
    }
}

// ============================================================================
// Explanation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationConfig {
    /// Total narrative attempts, including the first call
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
}

fn default_attempts() -> u32 {
    DEFAULT_NARRATIVE_ATTEMPTS
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self { max_attempts: default_attempts() }
    }
}

// ============================================================================
// Collaborator endpoints
// ============================================================================

/// One regime model served over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEndpoint {
    pub id: String,
    pub endpoint: String,
}

fn default_models() -> Vec<ModelEndpoint> {
    ["fd001", "fd002", "fd003"]
        .iter()
        .enumerate()
        .map(|(i, id)| ModelEndpoint {
            id: (*id).to_string(),
            endpoint: format!("http://127.0.0.1:{}/predict", 9001 + i),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SimilarityConfig {
    /// JSON file of historical failure cases; the index starts empty without it
    #[serde(default)]
    pub cases_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeBackendKind {
    #[default]
    Disabled,
    /// Any OpenAI-compatible `/v1/chat/completions` endpoint
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    #[serde(default)]
    pub backend: NarrativeBackendKind,
    #[serde(default = "default_narrative_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_narrative_model")]
    pub model: String,
    /// Environment variable holding the API key (never stored in the file)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_narrative_endpoint() -> String {
    "http://127.0.0.1:8000/v1/chat/completions".to_string()
}
fn default_narrative_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "NARRATIVE_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f64 {
    0.3
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            backend: NarrativeBackendKind::default(),
            endpoint: default_narrative_endpoint(),
            model: default_narrative_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,
    #[serde(default = "default_max_runs")]
    pub max_concurrent_runs: usize,
}

fn default_server_addr() -> String {
    DEFAULT_SERVER_ADDR.to_string()
}
fn default_max_runs() -> usize {
    DEFAULT_MAX_CONCURRENT_RUNS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            max_concurrent_runs: default_max_runs(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn validation_errors(config: &PipelineConfig) -> Vec<String> {
        match config.validate() {
            Err(ConfigError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn test_default_config_validates() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok(), "{:?}", config.validate());
        assert_eq!(config.sensors.channels.len(), 24);
        assert_eq!(config.models.len(), 3);
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.diagnosis.top_k, DEFAULT_TOP_K);
        assert_eq!(config.risk.medium_cut, DEFAULT_MEDIUM_CUT);
        assert_eq!(config.explanation.max_attempts, 2);
        assert_eq!(config.narrative.backend, NarrativeBackendKind::Disabled);
    }

    #[test]
    fn test_partial_toml_override() {
        let toml = r#"
            [diagnosis]
            top_k = 9

            [risk]
            rul_weight = 0.4
            failure_probability_weight = 0.4

            [[models]]
            id = "fd001"
            endpoint = "http://models:9001/predict"
        "#;
        let config = PipelineConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.diagnosis.top_k, 9);
        assert!((config.risk.rul_weight - 0.4).abs() < 1e-12);
        assert!((config.risk.diagnosis_uncertainty_weight - 0.2).abs() < 1e-12);
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.timeouts.model_ms, DEFAULT_MODEL_TIMEOUT_MS);
    }

    #[test]
    fn test_validation_catches_bad_weights() {
        let mut config = PipelineConfig::default();
        config.risk.rul_weight = 0.9;
        let errors = validation_errors(&config);
        assert!(errors.iter().any(|e| e.contains("sum to 1.0")));
    }

    #[test]
    fn test_validation_catches_inverted_cuts() {
        let mut config = PipelineConfig::default();
        config.risk.medium_cut = 0.7;
        config.risk.high_cut = 0.5;
        let errors = validation_errors(&config);
        assert!(errors.iter().any(|e| e.contains("cut points")));
    }

    #[test]
    fn test_validation_catches_channel_count_and_zero_k() {
        let mut config = PipelineConfig::default();
        config.sensors.channels.truncate(20);
        config.diagnosis.top_k = 0;
        config.explanation.max_attempts = 0;
        let errors = validation_errors(&config);
        assert_eq!(errors.len(), 3, "{errors:?}");
    }

    #[test]
    fn test_validation_catches_duplicate_models() {
        let mut config = PipelineConfig::default();
        config.models[1].id = "fd001".to_string();
        let errors = validation_errors(&config);
        assert!(errors.iter().any(|e| e.contains("duplicate model id 'fd001'")));
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = PipelineConfig::default();
        let text = config.to_toml().unwrap();
        let back = PipelineConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.scheduling.rules.len(), config.scheduling.rules.len());
        assert_eq!(back.sensors.channels[9].name, config.sensors.channels[9].name);
    }

    #[test]
    fn test_actions_for_known_component() {
        let scheduling = SchedulingConfig::default();
        let actions = scheduling.actions_for(RiskLevel::High, "hpc");
        assert!(actions[0].contains("borescope"));
    }

    #[test]
    fn test_actions_for_unknown_component_uses_generic() {
        let scheduling = SchedulingConfig::default();
        let actions = scheduling.actions_for(RiskLevel::Medium, "LPT");
        assert_eq!(actions[0], "Order replacement parts for LPT");
        assert_eq!(actions.len(), scheduling.generic.medium.len());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turbofan.toml");
        std::fs::write(&path, "[timeouts]\nnarrative_ms = 500\n").unwrap();

        let config = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(config.timeouts.narrative(), Duration::from_millis(500));

        std::fs::write(&path, "[timeouts\n").unwrap();
        assert!(matches!(
            PipelineConfig::load_from_file(&path),
            Err(ConfigError::Parse(..))
        ));
    }
}
