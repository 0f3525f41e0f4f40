//! System-wide default constants.
//!
//! Grouped by pipeline stage. Every value here can be overridden from
//! `turbofan.toml`; these are what applies when no file is present.

// ============================================================================
// Sensors
// ============================================================================

/// Anomaly threshold in units of channel spread.
pub const DEFAULT_THRESHOLD_SIGMA: f64 = 3.0;

/// Nominal baseline per channel: (name, mean, standard deviation).
///
/// CMAPSS FD001 healthy-fleet statistics. A zero spread marks a channel that
/// is constant in the nominal fleet; such channels are never scored.
pub const NOMINAL_CHANNELS: [(&str, f64, f64); 24] = [
    ("op_setting_1", 0.0, 0.0022),
    ("op_setting_2", 0.0, 0.0003),
    ("op_setting_3", 100.0, 0.0),
    ("T2 fan inlet temperature", 518.67, 0.0),
    ("T24 LPC outlet temperature", 642.68, 0.50),
    ("T30 HPC outlet temperature", 1590.52, 6.13),
    ("T50 LPT outlet temperature", 1408.93, 9.00),
    ("P2 fan inlet pressure", 14.62, 0.0),
    ("P15 bypass-duct pressure", 21.61, 0.0014),
    ("P30 HPC outlet pressure", 553.37, 0.885),
    ("Nf physical fan speed", 2388.10, 0.071),
    ("Nc physical core speed", 9065.24, 22.08),
    ("epr engine pressure ratio", 1.30, 0.0),
    ("Ps30 HPC outlet static pressure", 47.54, 0.267),
    ("phi fuel flow ratio", 521.41, 0.738),
    ("NRf corrected fan speed", 2388.10, 0.072),
    ("NRc corrected core speed", 8143.75, 19.08),
    ("BPR bypass ratio", 8.442, 0.0375),
    ("farB burner fuel-air ratio", 0.03, 0.0),
    ("htBleed bleed enthalpy", 393.21, 1.549),
    ("Nf_dmd demanded fan speed", 2388.0, 0.0),
    ("PCNfR_dmd demanded corrected fan speed", 100.0, 0.0),
    ("W31 HPT coolant bleed", 38.82, 0.181),
    ("W32 LPT coolant bleed", 23.29, 0.108),
];

// ============================================================================
// Diagnosis
// ============================================================================

/// Nearest historical cases consulted per diagnosis.
pub const DEFAULT_TOP_K: usize = 5;

/// Added to case distances before inversion so exact matches stay finite.
pub const VOTE_DISTANCE_EPSILON: f64 = 1e-6;

// ============================================================================
// Risk
// ============================================================================

pub const DEFAULT_RUL_WEIGHT: f64 = 0.5;
pub const DEFAULT_FAILURE_PROBABILITY_WEIGHT: f64 = 0.3;
pub const DEFAULT_DIAGNOSIS_UNCERTAINTY_WEIGHT: f64 = 0.2;

/// RUL at or beyond which the RUL term contributes nothing (cycles).
pub const DEFAULT_RUL_HORIZON_CYCLES: f64 = 100.0;

pub const DEFAULT_MEDIUM_CUT: f64 = 0.33;
pub const DEFAULT_HIGH_CUT: f64 = 0.66;

/// RUL standard deviation across models above which they "disagree" (cycles).
pub const DEFAULT_DISAGREEMENT_STD_CYCLES: f64 = 30.0;

/// RUL standard deviation below which the models are reported as agreeing (cycles).
pub const MODEL_AGREEMENT_STD_CYCLES: f64 = 10.0;

// Risk factor thresholds
pub const CRITICAL_FAILURE_PROBABILITY: f64 = 0.7;
pub const HIGH_FAILURE_PROBABILITY: f64 = 0.5;
pub const CRITICAL_RUL_CYCLES: f64 = 20.0;
pub const LOW_RUL_CYCLES: f64 = 30.0;
pub const LOW_DIAGNOSTIC_CONFIDENCE: f64 = 0.3;

// ============================================================================
// Timeouts
// ============================================================================

pub const DEFAULT_MODEL_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_SIMILARITY_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_NARRATIVE_TIMEOUT_MS: u64 = 15_000;

// ============================================================================
// Explanation
// ============================================================================

/// Narrative attempts per report: the first call plus one retry.
pub const DEFAULT_NARRATIVE_ATTEMPTS: u32 = 2;

// ============================================================================
// Server
// ============================================================================

pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";

/// Simultaneous pipeline runs accepted by the HTTP layer.
pub const DEFAULT_MAX_CONCURRENT_RUNS: usize = 16;
