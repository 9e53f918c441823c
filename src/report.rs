//! Report composition (spec §4.8, §6 nine-section format).
//!
//! Grounded on `bin/prover.rs`'s `ProofHeader`/summary-printing tail end: a
//! plain struct assembled once tracing finishes, then rendered by a single
//! `Display` impl so the CLI binary has nothing to do but print it.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::fmt;

use crate::config::{self, Settings};
use crate::context::{BranchStep, EnforcementFlags, ExecContext, Failure};
use crate::smt;
use crate::token::{ScriptToken, TokenKind};
use crate::value::{ScriptNum, Value, ValueStore};

/// An enforcement rendered for display: the predicate text, its position,
/// and the tautology markers computed against the live store (spec §4.3
/// `<*>`/`{*}`).
pub struct RenderedEnforcement {
    pub rendered: String,
    pub position: usize,
    pub flags: EnforcementFlags,
}

/// An unconsumed value rendered for display.
pub struct RenderedUnused {
    pub producer_pc: usize,
    pub line: u32,
    pub rendered: String,
}

/// Solver-sampled distinct satisfying values for one witness on one path
/// (spec §4.8, §8 S6, glossary "Model value").
pub struct ModelValueSample {
    pub witness: u32,
    pub label: String,
    pub values: Vec<i128>,
    pub size: Option<usize>,
}

/// One explored, sealed path (spec §3: forked context, run to completion).
pub struct PathReport {
    pub branch_trail: Vec<BranchStep>,
    pub enforcements: Vec<RenderedEnforcement>,
    pub unused_values: Vec<RenderedUnused>,
    pub witnesses_used: usize,
    pub witness_aliases: HashMap<u32, String>,
    pub model_values: Vec<ModelValueSample>,
    pub final_stack: Vec<String>,
    pub warnings: Vec<String>,
    pub failures: Vec<Failure>,
    pub data_refs: HashMap<String, String>,
    pub points_of_interest: Vec<(usize, String)>,
}

impl PathReport {
    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }

    fn label(&self) -> String {
        if self.branch_trail.is_empty() {
            "<root>".to_string()
        } else {
            self.branch_trail.iter().map(|b| format!("{}@{}:{}", b.opcode, b.position, b.label)).collect::<Vec<_>>().join(" / ")
        }
    }
}

/// The full trace result (spec §4.8): every explored path plus the
/// bookkeeping the reporter needs to render all nine sections.
pub struct Report {
    pub decoded_script: Vec<String>,
    pub pruned_notes: Vec<String>,
    pub paths: Vec<PathReport>,
    pub model_values_enabled: bool,
}

pub(crate) fn build(tokens: &[ScriptToken], store: &mut ValueStore, settings: &Settings, paths: Vec<ExecContext>, pruned_notes: Vec<String>) -> Report {
    let decoded_script = tokens.iter().map(render_token).collect();
    let rendered_paths = paths.into_iter().map(|ctx| build_path(store, settings, ctx)).collect();
    Report { decoded_script, pruned_notes, paths: rendered_paths, model_values_enabled: settings.produce_model_values }
}

fn build_path(store: &mut ValueStore, settings: &Settings, ctx: ExecContext) -> PathReport {
    let mut enforcements: Vec<RenderedEnforcement> = ctx
        .enforcements
        .iter()
        .map(|e| {
            let mut flags = e.flags;
            if settings.check_always_true_enforcements {
                flags.always_true = smt::is_tautology(store, settings, &[], e.predicate).unwrap_or(false);
            }
            if settings.mark_path_local_always_true_enforcements {
                flags.path_local_always_true = smt::is_tautology(store, settings, &ctx.path_condition, e.predicate).unwrap_or(false);
            }
            RenderedEnforcement { rendered: store.display(e.predicate, settings.tag_data_with_position), position: e.position, flags }
        })
        .collect();
    if settings.hide_always_true_enforcements {
        enforcements.retain(|e| !e.flags.always_true);
    }
    let unused_values = ctx
        .unused_values()
        .into_iter()
        .map(|(_, entry)| RenderedUnused {
            producer_pc: entry.position,
            line: entry.line,
            rendered: store.display(entry.value, settings.tag_data_with_position),
        })
        .collect();
    let data_refs = ctx.data_refs.iter().map(|(name, &id)| (name.clone(), store.display(id, settings.tag_data_with_position))).collect();
    let final_stack = ctx.stack.iter().map(|&id| store.display(id, settings.tag_data_with_position)).collect();
    let model_values = compute_model_values(store, settings, &ctx);
    let witnesses_used = ctx.witness_used();
    PathReport {
        branch_trail: ctx.branch_trail,
        enforcements,
        unused_values,
        witnesses_used,
        witness_aliases: ctx.witness_aliases,
        model_values,
        final_stack,
        warnings: ctx.warnings,
        failures: ctx.failures,
        data_refs,
        points_of_interest: ctx.points_of_interest,
    }
}

/// Sample solver-backed model values for every witness matching
/// `--produce-model-values-for` (spec §8 S6), gated entirely on
/// `produce_model_values` so a disabled flag costs nothing.
fn compute_model_values(store: &mut ValueStore, settings: &Settings, ctx: &ExecContext) -> Vec<ModelValueSample> {
    if !settings.produce_model_values {
        return Vec::new();
    }
    let (pattern, count) = match &settings.produce_model_values_for {
        Some(spec) => config::parse_model_value_spec(spec).unwrap_or_else(|_| ("*".to_string(), 2)),
        None => ("*".to_string(), 2),
    };
    let mut samples = Vec::new();
    for index in 0..ctx.witness_used() as u32 {
        let label = format!("wit{index}");
        if !glob_match(&pattern, &label) {
            continue;
        }
        let alias = ctx.witness_aliases.get(&index).cloned();
        let witness_id = store.intern(Value::Witness { index, alias: alias.clone() });
        let values = smt::sample_witness_values(store, settings, &ctx.path_condition, witness_id, count).unwrap_or_default();
        if values.is_empty() {
            continue;
        }
        let size = if settings.report_model_value_sizes { values.iter().map(|&v| ScriptNum(v).encode().len()).max() } else { None };
        let display_label = alias.map(|a| format!("{a}<wit{index}>")).unwrap_or(label);
        samples.push(ModelValueSample { witness: index, label: display_label, values, size });
    }
    if settings.sort_model_values {
        samples.sort_by_key(|s| s.witness);
    }
    samples
}

/// Simple `*`-wildcard glob match for `--produce-model-values-for` patterns
/// (e.g. `wit*` or `wit0`), no other glob metacharacters supported.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn helper(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => helper(&p[1..], t) || (!t.is_empty() && helper(p, &t[1..])),
            Some(&c) => !t.is_empty() && t[0] == c && helper(&p[1..], &t[1..]),
        }
    }
    helper(pattern.as_bytes(), text.as_bytes())
}

fn render_token(tok: &ScriptToken) -> String {
    match &tok.kind {
        TokenKind::Op(word) => format!("{}: {}", tok.pc, word),
        TokenKind::Placeholder(name) => format!("{}: ${}", tok.pc, name),
        TokenKind::Push(bytes) => {
            let rendered = if bytes.0.is_empty() {
                "0".to_string()
            } else {
                match ScriptNum::decode(&bytes.0) {
                    Ok(n) => n.0.to_string(),
                    Err(_) => format!("x('{}')", hex::encode(&bytes.0)),
                }
            };
            format!("{}: {}", tok.pc, rendered)
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== Decoded script ==")?;
        for line in &self.decoded_script {
            writeln!(f, "{line}")?;
        }

        if !self.pruned_notes.is_empty() {
            writeln!(f, "\n== Note: unexplored paths ==")?;
            for note in &self.pruned_notes {
                writeln!(f, "{note}")?;
            }
        }

        writeln!(f, "\n== Valid paths ==")?;
        for (i, p) in self.paths.iter().enumerate() {
            writeln!(f, "path {i} [{}]: {}", p.label(), if p.failed() { "FAILED" } else { "OK" })?;
        }

        writeln!(f, "\n== Enforced constraints per path ==")?;
        for (i, p) in self.paths.iter().enumerate() {
            writeln!(f, "path {i}:")?;
            for e in &p.enforcements {
                let marker = if e.flags.always_true { "<*>" } else if e.flags.path_local_always_true { "{*}" } else { "" };
                writeln!(f, "  @{} {}{}", e.position, marker, e.rendered)?;
            }
        }

        writeln!(f, "\n== Unused values ==")?;
        for (i, p) in self.paths.iter().enumerate() {
            if p.unused_values.is_empty() {
                continue;
            }
            writeln!(f, "path {i}:")?;
            for u in &p.unused_values {
                writeln!(f, "  @{} (line {}) {}", u.producer_pc, u.line, u.rendered)?;
            }
        }

        if self.model_values_enabled {
            writeln!(f, "\n== Witness usage and model values ==")?;
            for (i, p) in self.paths.iter().enumerate() {
                writeln!(f, "path {i}: {} witness(es) referenced", p.witnesses_used)?;
                let mut aliases: Vec<_> = p.witness_aliases.iter().collect();
                aliases.sort_by_key(|(idx, _)| **idx);
                for (idx, alias) in aliases {
                    writeln!(f, "  wit{idx} = {alias}")?;
                }
                for mv in &p.model_values {
                    let values = mv.values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                    match mv.size {
                        Some(size) => writeln!(f, "  {} model values: {{{values}}} Size={size}", mv.label)?,
                        None => writeln!(f, "  {} model values: {{{values}}}", mv.label)?,
                    }
                }
            }
        } else {
            writeln!(f, "\n== Witness usage and stack contents ==")?;
            for (i, p) in self.paths.iter().enumerate() {
                writeln!(f, "path {i}: {} witness(es) referenced", p.witnesses_used)?;
                let mut aliases: Vec<_> = p.witness_aliases.iter().collect();
                aliases.sort_by_key(|(idx, _)| **idx);
                for (idx, alias) in aliases {
                    writeln!(f, "  wit{idx} = {alias}")?;
                }
                writeln!(f, "  stack: [{}]", p.final_stack.join(", "))?;
            }
        }

        writeln!(f, "\n== Warnings per path ==")?;
        for (i, p) in self.paths.iter().enumerate() {
            for w in &p.warnings {
                writeln!(f, "path {i}: {w}")?;
            }
        }

        writeln!(f, "\n== Failures per path ==")?;
        for (i, p) in self.paths.iter().enumerate() {
            for failure in &p.failures {
                writeln!(f, "path {i}: {} @{} (line {})", failure.kind, failure.position, failure.line)?;
            }
        }

        writeln!(f, "\n== Data references ==")?;
        for (i, p) in self.paths.iter().enumerate() {
            if p.data_refs.is_empty() {
                continue;
            }
            writeln!(f, "path {i}:")?;
            let mut refs: Vec<_> = p.data_refs.iter().collect();
            refs.sort_by_key(|(name, _)| name.clone());
            for (name, rendered) in refs {
                writeln!(f, "  &{name} = {rendered}")?;
            }
        }

        if self.paths.iter().any(|p| !p.points_of_interest.is_empty()) {
            writeln!(f, "\n== Points of interest ==")?;
            for (i, p) in self.paths.iter().enumerate() {
                for (pc, stack) in &p.points_of_interest {
                    writeln!(f, "path {i} @{pc}: [{stack}]")?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;
    use crate::explorer::trace_script;

    #[test]
    fn report_renders_all_sections_without_panicking() {
        let settings = Settings::default();
        let tokens = tokenize("1 2 ADD 3 EQUAL", &settings).unwrap();
        let report = trace_script(&tokens, &settings).unwrap();
        let rendered = report.to_string();
        assert!(rendered.contains("Decoded script"));
        assert!(rendered.contains("Valid paths"));
    }

    #[test]
    fn hide_always_true_enforcements_filters_them_out() {
        let mut settings = Settings::default();
        settings.check_always_true_enforcements = true;
        settings.hide_always_true_enforcements = true;
        let tokens = tokenize("1 VERIFY 1", &settings).unwrap();
        let report = trace_script(&tokens, &settings).unwrap();
        assert!(report.paths[0].enforcements.is_empty());
    }

    #[test]
    #[cfg(feature = "z3-backend")]
    fn within_on_an_empty_stack_samples_model_values_for_its_materialized_witness() {
        let mut settings = Settings::default();
        settings.z3_enabled = true;
        settings.cleanstack_flag = false;
        settings.is_incomplete_script = true;
        settings.produce_model_values = true;
        settings.produce_model_values_for = Some("wit0:2".to_string());
        settings.report_model_value_sizes = true;
        let tokens = tokenize("1 3 WITHIN VERIFY", &settings).unwrap();
        let report = trace_script(&tokens, &settings).unwrap();
        assert_eq!(report.paths.len(), 1);
        let path = &report.paths[0];
        assert!(!path.failed());
        let mv = path.model_values.iter().find(|m| m.witness == 0).expect("wit0 model values sampled");
        let mut values = mv.values.clone();
        values.sort();
        assert_eq!(values, vec![1, 2]);
        assert_eq!(mv.size, Some(1));
    }

    #[test]
    fn witness_usage_section_falls_back_to_stack_contents_when_model_values_disabled() {
        let settings = Settings::default();
        let tokens = tokenize("1 2 ADD", &settings).unwrap();
        let report = trace_script(&tokens, &settings).unwrap();
        let rendered = report.to_string();
        assert!(rendered.contains("Witness usage and stack contents"));
        assert!(!rendered.contains("Witness usage and model values"));
    }
}
