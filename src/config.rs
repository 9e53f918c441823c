//! Engine-wide settings (spec §6 flag table).
//!
//! Grounded on `lib.rs`'s `ProveParams`/`VerifyParams` (plain `Clone` config
//! structs threaded through the engine) and `bin/prover.rs`'s hand-rolled
//! `parse_flag`/`parse_bool`/`parse_u64` helpers — the CLI options parser
//! itself is out of scope per spec §1, so this module only defines the
//! settings object and the small conversion helpers a caller needs; it does
//! not implement `clap`-style argument grammar or `--help` text.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which consensus rule-set family to emulate (spec §6 `--sigversion`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigVersion {
    #[default]
    Base,
    WitnessV0,
    Tapscript,
}

/// Engine-wide settings: one field per documented flag (spec §6), with
/// `Default` matching the documented defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub z3_enabled: bool,
    pub is_elements: bool,
    pub sigversion: SigVersion,
    pub is_incomplete_script: bool,
    pub is_miner: bool,

    pub minimaldata_flag: bool,
    pub minimaldata_flag_strict: bool,
    pub minimalif_flag: bool,
    pub strictenc_flag: bool,
    pub low_s_flag: bool,
    pub nullfail_flag: bool,
    pub nulldummy_flag: bool,
    pub cleanstack_flag: bool,
    pub witness_pubkeytype_flag: bool,
    pub discourage_upgradeable_pubkey_type_flag: bool,

    pub produce_model_values: bool,
    pub produce_model_values_for: Option<String>,
    pub report_model_value_sizes: bool,
    pub sort_model_values: bool,

    pub max_samples_for_dynamic_stack_access: usize,
    pub points_of_interest: Vec<PointOfInterest>,

    pub check_always_true_enforcements: bool,
    pub mark_path_local_always_true_enforcements: bool,
    pub hide_always_true_enforcements: bool,

    pub solver_timeout_seconds: f64,
    pub solver_increasing_timeout_multiplier: f64,
    pub solver_increasing_timeout_max: f64,
    pub max_solver_tries: u32,
    pub exit_on_solver_result_unknown: bool,

    pub use_parallel_solving: bool,
    pub parallel_solving_num_processes: usize,

    pub use_z3_incremental_mode: bool,
    pub disable_z3_randomization: bool,
    pub do_progressive_z3_checks: bool,
    pub all_z3_assertions_are_tracked_assertions: bool,
    pub disable_error_code_tracking_with_z3: bool,
    pub z3_debug: bool,

    pub tag_data_with_position: bool,
    pub tag_enforcements_with_position: bool,
    pub use_deterministic_arguments_order: bool,

    pub skip_immediately_failed_branches_on: Option<String>,
    pub assume_no_160bit_hash_collisions: bool,

    pub comment_marker: String,
    pub restrict_data_reference_names: bool,

    pub max_tx_size: u64,
    pub max_num_inputs: u32,
    pub max_num_outputs: u32,

    pub explicitly_enabled_opcodes: Vec<String>,

    pub log_progress: bool,
    pub log_solving_attempts: bool,
    pub log_solving_attempts_to_stderr: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            z3_enabled: false,
            is_elements: false,
            sigversion: SigVersion::Base,
            is_incomplete_script: false,
            is_miner: false,

            minimaldata_flag: true,
            minimaldata_flag_strict: false,
            minimalif_flag: false,
            strictenc_flag: false,
            low_s_flag: false,
            nullfail_flag: false,
            nulldummy_flag: false,
            cleanstack_flag: true,
            witness_pubkeytype_flag: false,
            discourage_upgradeable_pubkey_type_flag: false,

            produce_model_values: false,
            produce_model_values_for: None,
            report_model_value_sizes: false,
            sort_model_values: false,

            max_samples_for_dynamic_stack_access: 16,
            points_of_interest: Vec::new(),

            check_always_true_enforcements: false,
            mark_path_local_always_true_enforcements: false,
            hide_always_true_enforcements: false,

            solver_timeout_seconds: 5.0,
            solver_increasing_timeout_multiplier: 2.0,
            solver_increasing_timeout_max: 60.0,
            max_solver_tries: 3,
            exit_on_solver_result_unknown: false,

            use_parallel_solving: false,
            parallel_solving_num_processes: num_cpus_fallback(),

            use_z3_incremental_mode: false,
            disable_z3_randomization: false,
            do_progressive_z3_checks: false,
            all_z3_assertions_are_tracked_assertions: false,
            disable_error_code_tracking_with_z3: false,
            z3_debug: false,

            tag_data_with_position: false,
            tag_enforcements_with_position: false,
            use_deterministic_arguments_order: true,

            skip_immediately_failed_branches_on: None,
            assume_no_160bit_hash_collisions: false,

            comment_marker: "//".to_string(),
            restrict_data_reference_names: false,

            max_tx_size: 1_000_000,
            max_num_inputs: 1_000,
            max_num_outputs: 1_000,

            explicitly_enabled_opcodes: Vec::new(),

            log_progress: false,
            log_solving_attempts: false,
            log_solving_attempts_to_stderr: false,
        }
    }
}

/// How strictly pure-arithmetic/logic operands (spec §4.2) must be encoded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MinimalDataMode {
    /// Neither flag set: operands are interned as-is, no constraint published.
    Off,
    /// `--minimaldata-flag`: a non-minimal literal publishes an equality
    /// constraint against its canonical re-encoding instead of failing.
    Enforce,
    /// `--minimaldata-flag-strict`: a non-minimal literal is a hard failure.
    Strict,
}

/// `--minimaldata-flag-strict` takes precedence over `--minimaldata-flag`.
pub fn minimaldata_mode(settings: &Settings) -> MinimalDataMode {
    if settings.minimaldata_flag_strict {
        MinimalDataMode::Strict
    } else if settings.minimaldata_flag {
        MinimalDataMode::Enforce
    } else {
        MinimalDataMode::Off
    }
}

/// Parse a `--produce-model-values-for` spec: `pattern` or `pattern:count`
/// (defaulting the sample count to 2, the smallest useful distinct-values run).
pub fn parse_model_value_spec(s: &str) -> Result<(String, usize), SettingsError> {
    match s.split_once(':') {
        Some((pat, n)) => {
            let count = n.trim().parse::<usize>().map_err(|_| SettingsError::InvalidModelValueSpec(s.to_string()))?;
            Ok((pat.trim().to_string(), count))
        }
        None => Ok((s.trim().to_string(), 2)),
    }
}

/// A `--points-of-interest` entry: either a specific pc, or `*` for all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PointOfInterest {
    All,
    Pc(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid boolean flag value {0:?}")]
    InvalidBool(String),
    #[error("invalid numeric flag value {0:?}")]
    InvalidNumber(String),
    #[error("invalid --sigversion value {0:?} (expected base|witness_v0|tapscript)")]
    InvalidSigVersion(String),
    #[error("invalid --points-of-interest entry {0:?}")]
    InvalidPointOfInterest(String),
    #[error("invalid --produce-model-values-for spec {0:?} (expected pattern or pattern:count)")]
    InvalidModelValueSpec(String),
}

/// Parse a boolean flag value the way `bin/prover.rs::parse_bool` does.
pub fn parse_bool(s: &str) -> Result<bool, SettingsError> {
    match s {
        "1" | "true" | "True" | "TRUE" | "yes" | "y" => Ok(true),
        "0" | "false" | "False" | "FALSE" | "no" | "n" => Ok(false),
        other => Err(SettingsError::InvalidBool(other.to_string())),
    }
}

pub fn parse_sigversion(s: &str) -> Result<SigVersion, SettingsError> {
    match s {
        "base" => Ok(SigVersion::Base),
        "witness_v0" => Ok(SigVersion::WitnessV0),
        "tapscript" => Ok(SigVersion::Tapscript),
        other => Err(SettingsError::InvalidSigVersion(other.to_string())),
    }
}

pub fn parse_points_of_interest(s: &str) -> Result<Vec<PointOfInterest>, SettingsError> {
    if s.trim() == "*" {
        return Ok(vec![PointOfInterest::All]);
    }
    s.split(',')
        .map(|tok| {
            tok.trim()
                .parse::<usize>()
                .map(PointOfInterest::Pc)
                .map_err(|_| SettingsError::InvalidPointOfInterest(tok.to_string()))
        })
        .collect()
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let s = Settings::default();
        assert!(!s.z3_enabled);
        assert!(s.cleanstack_flag);
        assert!(s.minimaldata_flag);
        assert_eq!(s.max_samples_for_dynamic_stack_access, 16);
    }

    #[test]
    fn parse_bool_accepts_documented_spellings() {
        for s in ["1", "true", "True", "yes", "y"] {
            assert_eq!(parse_bool(s), Ok(true));
        }
        for s in ["0", "false", "no", "n"] {
            assert_eq!(parse_bool(s), Ok(false));
        }
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn points_of_interest_star_means_all() {
        assert_eq!(parse_points_of_interest("*"), Ok(vec![PointOfInterest::All]));
        assert_eq!(parse_points_of_interest("1,3,7"), Ok(vec![PointOfInterest::Pc(1), PointOfInterest::Pc(3), PointOfInterest::Pc(7)]));
    }

    #[test]
    fn minimaldata_strict_takes_precedence_over_plain() {
        let mut s = Settings::default();
        s.minimaldata_flag = true;
        s.minimaldata_flag_strict = true;
        assert_eq!(minimaldata_mode(&s), MinimalDataMode::Strict);
        s.minimaldata_flag_strict = false;
        assert_eq!(minimaldata_mode(&s), MinimalDataMode::Enforce);
        s.minimaldata_flag = false;
        assert_eq!(minimaldata_mode(&s), MinimalDataMode::Off);
    }

    #[test]
    fn model_value_spec_defaults_count_to_two() {
        assert_eq!(parse_model_value_spec("wit0"), Ok(("wit0".to_string(), 2)));
        assert_eq!(parse_model_value_spec("wit*:5"), Ok(("wit*".to_string(), 5)));
        assert!(parse_model_value_spec("wit0:x").is_err());
    }
}
