//! CLI entry point.
//!
//! Grounded on `bin/prover.rs`'s `fn main() -> anyhow::Result<()>` shape:
//! hand-rolled `--flag value`/`--flag=value` parsing (no `clap`, per spec §1
//! leaving the CLI surface out of the engineering focus), one positional
//! input path (or stdin), and a final summary printed to stdout.

#![forbid(unsafe_code)]

use std::io::Read;
use std::path::PathBuf;

use bsst::config::{self, PointOfInterest, Settings};
use bsst::{run, Report};

fn main() -> anyhow::Result<()> {
    let mut settings = Settings::default();
    let mut input_path: Option<PathBuf> = None;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        let (flag, inline_value) = split_flag(&args[i]);
        let flag = flag.to_string();
        let inline_value = inline_value.map(str::to_string);

        match flag.as_str() {
            "--z3" => settings.z3_enabled = parse_bool_flag(inline_value.as_deref())?,
            "--elements" => settings.is_elements = parse_bool_flag(inline_value.as_deref())?,
            "--sigversion" => settings.sigversion = config::parse_sigversion(&next_value(&args, &mut i, &flag, inline_value)?)?,
            "--incomplete-script" => settings.is_incomplete_script = parse_bool_flag(inline_value.as_deref())?,
            "--miner" => settings.is_miner = parse_bool_flag(inline_value.as_deref())?,
            "--minimaldata-flag" => settings.minimaldata_flag = parse_bool_flag(inline_value.as_deref())?,
            "--minimaldata-flag-strict" => settings.minimaldata_flag_strict = parse_bool_flag(inline_value.as_deref())?,
            "--minimalif-flag" => settings.minimalif_flag = parse_bool_flag(inline_value.as_deref())?,
            "--strictenc-flag" => settings.strictenc_flag = parse_bool_flag(inline_value.as_deref())?,
            "--low-s-flag" => settings.low_s_flag = parse_bool_flag(inline_value.as_deref())?,
            "--nullfail-flag" => settings.nullfail_flag = parse_bool_flag(inline_value.as_deref())?,
            "--nulldummy-flag" => settings.nulldummy_flag = parse_bool_flag(inline_value.as_deref())?,
            "--cleanstack-flag" => settings.cleanstack_flag = parse_bool_flag(inline_value.as_deref())?,
            "--witness-pubkeytype-flag" => settings.witness_pubkeytype_flag = parse_bool_flag(inline_value.as_deref())?,
            "--discourage-upgradeable-pubkeytype-flag" => {
                settings.discourage_upgradeable_pubkey_type_flag = parse_bool_flag(inline_value.as_deref())?
            }
            "--produce-model-values" => settings.produce_model_values = parse_bool_flag(inline_value.as_deref())?,
            "--produce-model-values-for" => settings.produce_model_values_for = Some(next_value(&args, &mut i, &flag, inline_value)?),
            "--report-model-value-sizes" => settings.report_model_value_sizes = parse_bool_flag(inline_value.as_deref())?,
            "--sort-model-values" => settings.sort_model_values = parse_bool_flag(inline_value.as_deref())?,
            "--max-samples-for-dynamic-stack-access" => {
                settings.max_samples_for_dynamic_stack_access = next_value(&args, &mut i, &flag, inline_value)?.parse()?
            }
            "--points-of-interest" => settings.points_of_interest = parse_points_of_interest(&next_value(&args, &mut i, &flag, inline_value)?)?,
            "--check-always-true-enforcements" => settings.check_always_true_enforcements = parse_bool_flag(inline_value.as_deref())?,
            "--mark-path-local-always-true-enforcements" => {
                settings.mark_path_local_always_true_enforcements = parse_bool_flag(inline_value.as_deref())?
            }
            "--hide-always-true-enforcements" => settings.hide_always_true_enforcements = parse_bool_flag(inline_value.as_deref())?,
            "--solver-timeout-seconds" => settings.solver_timeout_seconds = next_value(&args, &mut i, &flag, inline_value)?.parse()?,
            "--solver-increasing-timeout-multiplier" => {
                settings.solver_increasing_timeout_multiplier = next_value(&args, &mut i, &flag, inline_value)?.parse()?
            }
            "--solver-increasing-timeout-max" => settings.solver_increasing_timeout_max = next_value(&args, &mut i, &flag, inline_value)?.parse()?,
            "--max-solver-tries" => settings.max_solver_tries = next_value(&args, &mut i, &flag, inline_value)?.parse()?,
            "--exit-on-solver-result-unknown" => settings.exit_on_solver_result_unknown = parse_bool_flag(inline_value.as_deref())?,
            "--use-parallel-solving" => settings.use_parallel_solving = parse_bool_flag(inline_value.as_deref())?,
            "--parallel-solving-num-processes" => {
                settings.parallel_solving_num_processes = next_value(&args, &mut i, &flag, inline_value)?.parse()?
            }
            "--use-z3-incremental-mode" => settings.use_z3_incremental_mode = parse_bool_flag(inline_value.as_deref())?,
            "--disable-z3-randomization" => settings.disable_z3_randomization = parse_bool_flag(inline_value.as_deref())?,
            "--do-progressive-z3-checks" => settings.do_progressive_z3_checks = parse_bool_flag(inline_value.as_deref())?,
            "--all-z3-assertions-are-tracked-assertions" => {
                settings.all_z3_assertions_are_tracked_assertions = parse_bool_flag(inline_value.as_deref())?
            }
            "--disable-error-code-tracking-with-z3" => {
                settings.disable_error_code_tracking_with_z3 = parse_bool_flag(inline_value.as_deref())?
            }
            "--z3-debug" => settings.z3_debug = parse_bool_flag(inline_value.as_deref())?,
            "--tag-data-with-position" => settings.tag_data_with_position = parse_bool_flag(inline_value.as_deref())?,
            "--tag-enforcements-with-position" => settings.tag_enforcements_with_position = parse_bool_flag(inline_value.as_deref())?,
            "--use-deterministic-arguments-order" => settings.use_deterministic_arguments_order = parse_bool_flag(inline_value.as_deref())?,
            "--skip-immediately-failed-branches-on" => {
                settings.skip_immediately_failed_branches_on = Some(next_value(&args, &mut i, &flag, inline_value)?)
            }
            "--assume-no-160bit-hash-collisions" => settings.assume_no_160bit_hash_collisions = parse_bool_flag(inline_value.as_deref())?,
            "--comment-marker" => settings.comment_marker = next_value(&args, &mut i, &flag, inline_value)?,
            "--restrict-data-reference-names" => settings.restrict_data_reference_names = parse_bool_flag(inline_value.as_deref())?,
            "--max-tx-size" => settings.max_tx_size = next_value(&args, &mut i, &flag, inline_value)?.parse()?,
            "--max-num-inputs" => settings.max_num_inputs = next_value(&args, &mut i, &flag, inline_value)?.parse()?,
            "--max-num-outputs" => settings.max_num_outputs = next_value(&args, &mut i, &flag, inline_value)?.parse()?,
            "--explicitly-enabled-opcodes" => {
                settings.explicitly_enabled_opcodes =
                    next_value(&args, &mut i, &flag, inline_value)?.split(',').map(|s| s.trim().to_ascii_uppercase()).collect()
            }
            "--log-progress" => settings.log_progress = parse_bool_flag(inline_value.as_deref())?,
            "--log-solving-attempts" => settings.log_solving_attempts = parse_bool_flag(inline_value.as_deref())?,
            "--log-solving-attempts-to-stderr" => settings.log_solving_attempts_to_stderr = parse_bool_flag(inline_value.as_deref())?,
            "--settings-json" => settings = serde_json::from_str(&next_value(&args, &mut i, &flag, inline_value)?)?,
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            other if !other.starts_with('-') => input_path = Some(PathBuf::from(other)),
            other => anyhow::bail!("unrecognized flag {other}"),
        }
        i += 1;
    }

    init_logging(&settings);

    let source = match input_path {
        Some(path) => std::fs::read_to_string(&path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let report: Report = run(&source, &settings)?;
    print!("{report}");
    if report.paths.iter().all(|p| p.failed()) {
        std::process::exit(1);
    }
    Ok(())
}

fn split_flag(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once('=') {
        Some((flag, value)) => (flag, Some(value)),
        None => (arg, None),
    }
}

fn parse_bool_flag(inline_value: Option<&str>) -> anyhow::Result<bool> {
    match inline_value {
        Some(v) => Ok(config::parse_bool(v)?),
        None => Ok(true),
    }
}

/// Resolve a flag's value: the inline `--flag=value` form if present,
/// otherwise the next positional argument.
fn next_value(args: &[String], i: &mut usize, flag: &str, inline_value: Option<String>) -> anyhow::Result<String> {
    if let Some(v) = inline_value {
        return Ok(v);
    }
    *i += 1;
    args.get(*i).cloned().ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))
}

fn parse_points_of_interest(s: &str) -> anyhow::Result<Vec<PointOfInterest>> {
    Ok(config::parse_points_of_interest(s)?)
}

fn init_logging(settings: &Settings) {
    use tracing_subscriber::EnvFilter;
    if !settings.log_progress && !settings.log_solving_attempts {
        return;
    }
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let writer_stderr = settings.log_solving_attempts_to_stderr;
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if writer_stderr {
        subscriber.with_writer(std::io::stderr).init();
    } else {
        subscriber.init();
    }
}

fn print_help() {
    println!("bsst [OPTIONS] [SCRIPT_FILE]");
    println!();
    println!("Traces a stack-based transaction script over every feasible control-flow path.");
    println!("With no SCRIPT_FILE, reads the script from stdin.");
    println!();
    println!("See SPEC_FULL.md for the full flag table (--sigversion, --z3, --cleanstack-flag, ...).");
}
