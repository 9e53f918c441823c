//! Path tree exploration: branch fork/merge and dynamic stack access fanout
//! (spec §4.3, §4.4).
//!
//! Grounded on `scheduler.rs`'s five-phase orchestration: a driver that owns
//! traversal order and delegates the actual per-step work to a pure
//! collaborator (`transfer::apply_opcode`), the way the scheduler owns phase
//! sequencing and delegates row evaluation to `air.rs`. Here the "phases" are
//! linear-scan / branch-fork / dynamic-fanout / feasibility-prune / finalize,
//! repeated per live path until the path tree is exhausted.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use thiserror::Error;

use crate::assert::{self, AssertError};
use crate::config::Settings;
use crate::context::{BranchStep, ExecContext};
use crate::opcode::Opcode;
use crate::plugin::PluginRegistry;
use crate::report::{self, Report};
use crate::smt::{self, SatOutcome, SolverError};
use crate::token::{Directive, LexError, ScriptToken, TokenKind};
use crate::transfer::{self, Step};
use crate::value::{OpTag, ScriptNum, Value, ValueId, ValueStore};

#[derive(Debug, Error)]
pub enum TraceError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Assert(#[from] AssertError),
    #[error("unbalanced IF/ELSE/ENDIF control flow at token position {0}")]
    UnbalancedControlFlow(usize),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

struct IfBlock {
    else_pc: Option<usize>,
    endif_pc: usize,
}

struct Blocks {
    if_blocks: HashMap<usize, IfBlock>,
    else_jump: HashMap<usize, usize>,
}

fn build_blocks(tokens: &[ScriptToken]) -> Result<Blocks, TraceError> {
    let mut open: Vec<(usize, Option<usize>)> = Vec::new();
    let mut if_blocks = HashMap::new();
    let mut else_jump = HashMap::new();
    for (pc, tok) in tokens.iter().enumerate() {
        if let TokenKind::Op(word) = &tok.kind {
            match Opcode::parse(word) {
                Some(Opcode::If) | Some(Opcode::NotIf) => open.push((pc, None)),
                Some(Opcode::Else) => {
                    let top = open.last_mut().ok_or(TraceError::UnbalancedControlFlow(pc))?;
                    top.1 = Some(pc);
                }
                Some(Opcode::EndIf) => {
                    let (if_pc, else_pc) = open.pop().ok_or(TraceError::UnbalancedControlFlow(pc))?;
                    if let Some(e) = else_pc {
                        else_jump.insert(e, pc + 1);
                    }
                    if_blocks.insert(if_pc, IfBlock { else_pc, endif_pc: pc });
                }
                _ => {}
            }
        }
    }
    if let Some((pc, _)) = open.first() {
        return Err(TraceError::UnbalancedControlFlow(*pc));
    }
    Ok(Blocks { if_blocks, else_jump })
}

/// Trace a tokenized script with no plugins registered — the common case.
pub fn trace_script(tokens: &[ScriptToken], settings: &Settings) -> Result<Report, TraceError> {
    trace_script_with_plugins(tokens, settings, &PluginRegistry::new())
}

/// Trace a tokenized script, dispatching into `plugins` at every documented
/// hook point (spec §4.7).
pub fn trace_script_with_plugins(tokens: &[ScriptToken], settings: &Settings, plugins: &PluginRegistry) -> Result<Report, TraceError> {
    let blocks = build_blocks(tokens)?;
    let mut store = ValueStore::new();
    let mut leaves = Vec::new();
    let mut pruned = Vec::new();
    explore(tokens, settings, plugins, &blocks, &mut store, ExecContext::new(), &mut leaves, &mut pruned)?;
    Ok(report::build(tokens, &mut store, settings, leaves, pruned))
}

/// Whether `ctx`'s accumulated path condition is still feasible. A no-op
/// (always feasible) unless both `z3-enabled` and
/// `do-progressive-z3-checks` are set (spec §4.6): feasibility pruning is
/// opt-in work, not a default cost every path pays.
fn feasible(store: &ValueStore, settings: &Settings, ctx: &ExecContext) -> Result<bool, TraceError> {
    if !settings.z3_enabled || !settings.do_progressive_z3_checks {
        return Ok(true);
    }
    let outcome = smt::check_sat(store, settings, &ctx.path_condition)?;
    Ok(!matches!(outcome, SatOutcome::Unsat))
}

fn finalize(ctx: &mut ExecContext, store: &mut ValueStore, settings: &Settings) {
    if settings.is_incomplete_script {
        let pending: Vec<usize> = ctx.unused_values().into_iter().map(|(key, _)| key).collect();
        for key in pending {
            ctx.observe(key);
        }
        return;
    }
    // A stack shallower than required at script end is no different from
    // underflow mid-script: the missing items are witnesses nobody read yet.
    ctx.ensure_depth(store, 1);
    if settings.cleanstack_flag && ctx.stack.len() != 1 {
        ctx.fail("check_cleanstack_invalid");
        return;
    }
    let top = *ctx.stack.last().unwrap();
    let top_pc = ctx.top_provenance().unwrap();
    let pred = store.intern_op(OpTag::Bool, vec![top], settings.use_deterministic_arguments_order);
    let position = ctx.pc;
    ctx.publish(pred, position);
    ctx.observe(top_pc);
    if !settings.cleanstack_flag {
        let rest: Vec<usize> = ctx.unused_values().into_iter().map(|(pc, _)| pc).collect();
        for pc in rest {
            ctx.observe(pc);
        }
    }
}

fn apply_directives(tok: &ScriptToken, ctx: &mut ExecContext, store: &mut ValueStore, plugins: &PluginRegistry) -> Result<(), TraceError> {
    for directive in &tok.directives {
        match directive {
            Directive::DataRefBind(name) => match ctx.stack.last().copied() {
                Some(top) => {
                    ctx.data_refs.insert(name.clone(), top);
                }
                None => ctx.warnings.push(format!("warn_data_ref_bind_on_empty_stack({name})")),
            },
            Directive::NameAlias { witness, alias } => {
                ctx.witness_aliases.insert(*witness, alias.clone());
            }
            Directive::Assert { size, target, expr } => {
                let parsed = assert::parse_expr(expr)?;
                let target_id = match target {
                    Some(raw) => assert::resolve_target(store, ctx, raw),
                    None => ctx.stack.last().copied(),
                };
                match target_id {
                    Some(t) => assert::apply_assert(store, ctx, t, *size, &parsed, tok.pc),
                    None => ctx.warnings.push(format!("warn_unresolved_assert_target_at_line_{}", tok.line)),
                }
            }
            Directive::Assume { size, name, expr } => {
                let parsed = assert::parse_expr(expr)?;
                let target_id = store.intern(Value::Placeholder(name.clone()));
                assert::apply_assume(store, ctx, target_id, *size, &parsed);
            }
            Directive::Plugin { name, body } => {
                if !plugins.dispatch_comment(name, body, ctx, store) {
                    ctx.warnings.push(format!("warn_unclaimed_plugin_directive({name})"));
                }
            }
        }
    }
    Ok(())
}

/// Ask the solver whether `target` can still take a value other than the
/// `cap` literals already sampled for it (spec §4.4 step 3): assert the path
/// predicate plus a disequality per sampled value, and see whether that's
/// still satisfiable. Without Z3 (`static_check`'s `Equal` arm bails the
/// moment either side isn't a `Literal`) this always reports "yes, more may
/// exist" — the same conservative answer the old unconditional-truncation
/// code gave, just derived instead of hardcoded.
fn more_values_may_exist(store: &mut ValueStore, settings: &Settings, path_condition: &[ValueId], target: ValueId, cap: usize) -> Result<bool, TraceError> {
    let mut assertions = path_condition.to_vec();
    for candidate in 0..cap {
        let lit = store.intern(Value::Literal(ScriptNum(candidate as i128).encode()));
        let eq = store.intern_op(OpTag::Equal, vec![target, lit], settings.use_deterministic_arguments_order);
        let neq = store.intern_op(OpTag::Not, vec![eq], settings.use_deterministic_arguments_order);
        assertions.push(neq);
    }
    let outcome = smt::check_sat(store, settings, &assertions)?;
    Ok(!matches!(outcome, SatOutcome::Unsat))
}

/// Fork CHECKMULTISIG's signature count over `0..=num_keys` once the key
/// count is pinned (spec §8 S3) — an exhaustive enumeration, not a sampled
/// one, since `num_keys` already bounds it to a small finite range.
#[allow(clippy::too_many_arguments)]
fn fork_checkmultisig_numsigs(
    tokens: &[ScriptToken],
    settings: &Settings,
    plugins: &PluginRegistry,
    blocks: &Blocks,
    store: &mut ValueStore,
    ctx: &ExecContext,
    opcode_pc: usize,
    line: u32,
    num_keys: usize,
    num_keys_val: ValueId,
    pubkeys: &[ValueId],
    num_sigs_val: ValueId,
    verify: bool,
    leaves: &mut Vec<ExecContext>,
    pruned: &mut Vec<String>,
) -> Result<(), TraceError> {
    for candidate in 0..=num_keys {
        let mut child = ctx.clone();
        let count_lit = store.intern(Value::Literal(ScriptNum(candidate as i128).encode()));
        let eq = store.intern_op(OpTag::Equal, vec![num_sigs_val, count_lit], settings.use_deterministic_arguments_order);
        child.path_condition.push(eq);
        transfer::finish_checkmultisig(&mut child, store, settings, opcode_pc, line, num_keys_val, pubkeys, num_sigs_val, candidate, verify);
        if !child.sealed {
            child.pc = opcode_pc + 1;
        }
        let pos = child.pc;
        if feasible(store, settings, &child)? {
            explore(tokens, settings, plugins, blocks, store, child, leaves, pruned)?;
        } else {
            pruned.push(format!("infeasible dynamic-index sample pruned before position {pos}"));
        }
    }
    Ok(())
}

fn record_point_of_interest(ctx: &mut ExecContext, store: &ValueStore, settings: &Settings) {
    use crate::config::PointOfInterest;
    let matched = settings.points_of_interest.iter().any(|p| matches!(p, PointOfInterest::All) || matches!(p, PointOfInterest::Pc(pc) if *pc == ctx.pc));
    if !matched {
        return;
    }
    let rendered = ctx.stack.iter().map(|&id| store.display(id, settings.tag_data_with_position)).collect::<Vec<_>>().join(", ");
    ctx.points_of_interest.push((ctx.pc, rendered));
}

#[allow(clippy::too_many_arguments)]
fn explore(
    tokens: &[ScriptToken],
    settings: &Settings,
    plugins: &PluginRegistry,
    blocks: &Blocks,
    store: &mut ValueStore,
    mut ctx: ExecContext,
    leaves: &mut Vec<ExecContext>,
    pruned: &mut Vec<String>,
) -> Result<(), TraceError> {
    loop {
        if ctx.sealed {
            plugins.post_finalize(&mut ctx);
            leaves.push(ctx);
            return Ok(());
        }
        if ctx.pc >= tokens.len() {
            plugins.pre_finalize(&mut ctx, store);
            finalize(&mut ctx, store, settings);
            plugins.post_finalize(&mut ctx);
            leaves.push(ctx);
            return Ok(());
        }

        record_point_of_interest(&mut ctx, store, settings);
        let tok = &tokens[ctx.pc];
        ctx.line = tok.line;
        if settings.log_progress {
            tracing::trace!(pc = ctx.pc, line = ctx.line, stack_depth = ctx.stack.len(), "stepping");
        }

        match &tok.kind {
            TokenKind::Push(bytes) => {
                let id = store.intern(Value::Literal(bytes.0.clone()));
                ctx.push(id, ctx.pc, ctx.line);
                plugins.notify_pushdata(&mut ctx, id);
                ctx.pc += 1;
                apply_directives(tok, &mut ctx, store, plugins)?;
            }
            TokenKind::Placeholder(name) => {
                let id = store.intern(Value::Placeholder(name.clone()));
                ctx.push(id, ctx.pc, ctx.line);
                ctx.pc += 1;
                apply_directives(tok, &mut ctx, store, plugins)?;
            }
            TokenKind::Op(word) => {
                let opcode = match Opcode::parse(word) {
                    Some(Opcode::Else) => {
                        let target = *blocks.else_jump.get(&ctx.pc).ok_or(TraceError::UnbalancedControlFlow(ctx.pc))?;
                        ctx.pc = target;
                        apply_directives(tok, &mut ctx, store, plugins)?;
                        continue;
                    }
                    Some(Opcode::EndIf) => {
                        ctx.pc += 1;
                        apply_directives(tok, &mut ctx, store, plugins)?;
                        continue;
                    }
                    Some(op) => op,
                    None if settings.explicitly_enabled_opcodes.iter().any(|w| w == word) => Opcode::Custom(word.clone()),
                    None => {
                        ctx.fail(format!("unknown_opcode_{}", word.to_ascii_lowercase()));
                        apply_directives(tok, &mut ctx, store, plugins)?;
                        continue;
                    }
                };

                // `bsst-name-alias` pre-declares a name for a witness the opcode about to
                // run may materialize; every other directive reads a value the opcode
                // produces, so it is applied after (see the `apply_directives` calls
                // below). Applying name-alias early is what lets spec §8 S1's alias show
                // up inline in the formula, not just in the separate witness listing.
                for directive in &tok.directives {
                    if let Directive::NameAlias { witness, alias } = directive {
                        ctx.witness_aliases.insert(*witness, alias.clone());
                    }
                }

                let opcode_pc = ctx.pc;
                let run_builtin = plugins.pre_opcode(&mut ctx, store, &opcode);
                let step = if run_builtin { transfer::apply_opcode(&mut ctx, store, settings, &opcode) } else { Step::Done };
                plugins.post_opcode(&mut ctx, store, &opcode);

                match step {
                    Step::Done => {
                        if !ctx.sealed {
                            ctx.pc = opcode_pc + 1;
                        }
                        apply_directives(tok, &mut ctx, store, plugins)?;
                    }
                    Step::If { cond } => {
                        apply_directives(tok, &mut ctx, store, plugins)?;
                        let block = blocks.if_blocks.get(&opcode_pc).ok_or(TraceError::UnbalancedControlFlow(opcode_pc))?;
                        let not_cond = store.intern_op(OpTag::Not, vec![cond], settings.use_deterministic_arguments_order);
                        let false_target = block.else_pc.map(|e| e + 1).unwrap_or(block.endif_pc + 1);
                        let then_target = opcode_pc + 1;

                        let mut then_ctx = ctx.clone();
                        then_ctx.path_condition.push(cond);
                        then_ctx.pc = then_target;
                        then_ctx.branch_trail.push(BranchStep { opcode: format!("{opcode:?}"), position: opcode_pc, label: "then".to_string() });

                        let mut else_ctx = ctx;
                        else_ctx.path_condition.push(not_cond);
                        else_ctx.pc = false_target;
                        else_ctx.branch_trail.push(BranchStep { opcode: format!("{opcode:?}"), position: opcode_pc, label: "else".to_string() });

                        for child in [then_ctx, else_ctx] {
                            let pos = child.pc;
                            if feasible(store, settings, &child)? {
                                explore(tokens, settings, plugins, blocks, store, child, leaves, pruned)?;
                            } else {
                                pruned.push(format!("infeasible branch pruned before position {pos}"));
                            }
                        }
                        return Ok(());
                    }
                    Step::IfDup { cond, top, producer_pc, line } => {
                        apply_directives(tok, &mut ctx, store, plugins)?;
                        let not_cond = store.intern_op(OpTag::Not, vec![cond], settings.use_deterministic_arguments_order);
                        let next_pc = opcode_pc + 1;

                        let mut dup_ctx = ctx.clone();
                        dup_ctx.path_condition.push(cond);
                        dup_ctx.push(top, producer_pc, line);
                        dup_ctx.pc = next_pc;

                        let mut skip_ctx = ctx;
                        skip_ctx.path_condition.push(not_cond);
                        skip_ctx.pc = next_pc;

                        for child in [dup_ctx, skip_ctx] {
                            let pos = child.pc;
                            if feasible(store, settings, &child)? {
                                explore(tokens, settings, plugins, blocks, store, child, leaves, pruned)?;
                            } else {
                                pruned.push(format!("infeasible branch pruned before position {pos}"));
                            }
                        }
                        return Ok(());
                    }
                    Step::DynamicPick { index, is_roll } => {
                        apply_directives(tok, &mut ctx, store, plugins)?;
                        // The main stack is witness-backed (spec §2/§3), so a dynamic index
                        // is never bounded by the *current* physical depth — every depth up
                        // to the sample cap is a reachable candidate, and there's always one
                        // more beyond it unless the solver can prove otherwise.
                        let cap = settings.max_samples_for_dynamic_stack_access.max(1);
                        let line = ctx.line;
                        let opcode_label = if is_roll { "ROLL" } else { "PICK" };
                        let more_exist = more_values_may_exist(store, settings, &ctx.path_condition, index, cap)?;
                        for depth in 0..cap {
                            let mut child = ctx.clone();
                            let depth_lit = store.intern(Value::Literal(ScriptNum(depth as i128).encode()));
                            let eq = store.intern_op(OpTag::Equal, vec![index, depth_lit], settings.use_deterministic_arguments_order);
                            child.path_condition.push(eq);
                            if more_exist {
                                child.warnings.push(format!(
                                    "warn_dynamic_stack_access_fanout_truncated_at_{}",
                                    settings.max_samples_for_dynamic_stack_access
                                ));
                            }
                            transfer::apply_static_pick(&mut child, store, settings, opcode_pc, line, depth, is_roll);
                            if !child.sealed {
                                child.pc = opcode_pc + 1;
                            }
                            let pos = child.pc;
                            if feasible(store, settings, &child)? {
                                explore(tokens, settings, plugins, blocks, store, child, leaves, pruned)?;
                            } else {
                                pruned.push(format!("infeasible dynamic-index sample pruned before position {pos}"));
                            }
                        }
                        if more_exist {
                            pruned.push(format!("{opcode_label} wit0 @ {opcode_pc}:L{line} : {cap}, ... was not explored beyond the sample cap"));
                        }
                        return Ok(());
                    }
                    Step::DynamicCheckMultiSig { num_keys, verify } => {
                        apply_directives(tok, &mut ctx, store, plugins)?;
                        // Same reasoning as DynamicPick: num_keys draws from the witness-backed
                        // stack, not a fixed physical one, so it is never depth-bounded.
                        let cap = settings.max_samples_for_dynamic_stack_access.max(1);
                        let line = ctx.line;
                        let more_exist = more_values_may_exist(store, settings, &ctx.path_condition, num_keys, cap)?;
                        for candidate in 0..cap {
                            let mut child = ctx.clone();
                            let count_lit = store.intern(Value::Literal(ScriptNum(candidate as i128).encode()));
                            let eq = store.intern_op(OpTag::Equal, vec![num_keys, count_lit], settings.use_deterministic_arguments_order);
                            child.path_condition.push(eq);
                            if more_exist {
                                child.warnings.push(format!(
                                    "warn_dynamic_stack_access_fanout_truncated_at_{}",
                                    settings.max_samples_for_dynamic_stack_access
                                ));
                            }
                            match transfer::apply_checkmultisig_with_keys(&mut child, store, settings, opcode_pc, line, num_keys, candidate, verify) {
                                transfer::MultiSigOutcome::Done => {
                                    if !child.sealed {
                                        child.pc = opcode_pc + 1;
                                    }
                                    let pos = child.pc;
                                    if feasible(store, settings, &child)? {
                                        explore(tokens, settings, plugins, blocks, store, child, leaves, pruned)?;
                                    } else {
                                        pruned.push(format!("infeasible dynamic-index sample pruned before position {pos}"));
                                    }
                                }
                                transfer::MultiSigOutcome::NeedsNumSigsFork { num_keys, num_keys_val, pubkeys, num_sigs_val, verify } => {
                                    fork_checkmultisig_numsigs(
                                        tokens, settings, plugins, blocks, store, &child, opcode_pc, line, num_keys, num_keys_val, &pubkeys,
                                        num_sigs_val, verify, leaves, pruned,
                                    )?;
                                }
                            }
                        }
                        if more_exist {
                            pruned.push(format!("CHECKMULTISIG wit0 @ {opcode_pc}:L{line} : {cap}, ... was not explored beyond the sample cap"));
                        }
                        return Ok(());
                    }
                    Step::DynamicCheckMultiSigNumSigs { num_keys, num_keys_val, pubkeys, num_sigs_val, verify } => {
                        apply_directives(tok, &mut ctx, store, plugins)?;
                        let line = ctx.line;
                        fork_checkmultisig_numsigs(
                            tokens, settings, plugins, blocks, store, &ctx, opcode_pc, line, num_keys, num_keys_val, &pubkeys, num_sigs_val,
                            verify, leaves, pruned,
                        )?;
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn trace(src: &str, settings: &Settings) -> Report {
        let tokens = tokenize(src, settings).unwrap();
        trace_script(&tokens, settings).unwrap()
    }

    #[test]
    fn straight_line_addition_succeeds() {
        let settings = Settings::default();
        let report = trace("1 2 ADD 3 EQUAL", &settings);
        assert_eq!(report.paths.len(), 1);
        assert!(!report.paths[0].failed());
    }

    #[test]
    fn if_else_forks_into_two_paths() {
        let settings = Settings::default();
        let report = trace("IF 1 ELSE 0 ENDIF", &settings);
        assert_eq!(report.paths.len(), 2);
    }

    #[test]
    fn unbalanced_endif_is_a_hard_error() {
        let settings = Settings::default();
        let tokens = tokenize("ENDIF", &settings).unwrap();
        assert!(trace_script(&tokens, &settings).is_err());
    }

    #[test]
    fn underflow_materializes_witnesses_into_a_single_valid_path() {
        let settings = Settings::default();
        let report = trace("ADD", &settings);
        assert_eq!(report.paths.len(), 1);
        assert!(!report.paths[0].failed(), "a shallow main stack materializes witnesses, it doesn't fail the path");
    }

    #[test]
    fn cleanstack_violation_is_reported() {
        let settings = Settings::default();
        let report = trace("1 2", &settings);
        assert_eq!(report.paths.len(), 1);
        assert!(report.paths[0].failed());
    }

    #[test]
    fn dynamic_pick_fans_out_over_sampled_depths() {
        let mut settings = Settings::default();
        settings.cleanstack_flag = false;
        settings.max_samples_for_dynamic_stack_access = 4;
        let report = trace("1 2 3 $depth PICK", &settings);
        assert!(report.paths.len() >= 2);
    }

    // spec §8 S1: name aliases inline into the enforcement text, and the two
    // witnesses an unaliased `ADD ADD` still needs beyond them keep plain
    // `witN` names.
    #[test]
    fn name_aliases_render_inline_in_the_final_enforcement() {
        let settings = Settings::default();
        let src = "ADD // bsst-name-alias(wit0): a1\nADD // bsst-name-alias(wit2): a2";
        let report = trace(src, &settings);
        assert_eq!(report.paths.len(), 1);
        let path = &report.paths[0];
        assert!(!path.failed());
        assert_eq!(path.witnesses_used, 3);
        let rendered = path.enforcements.last().expect("finalize publishes a BOOL enforcement").rendered.clone();
        assert!(rendered.starts_with("BOOL(ADD("), "{rendered}");
        assert_eq!(rendered.matches("ADD(").count(), 2, "expected two nested ADD calls: {rendered}");
        assert!(rendered.contains("a1<wit0>"), "{rendered}");
        assert!(rendered.contains("wit1"), "{rendered}");
        assert!(rendered.contains("a2<wit2>"), "{rendered}");
    }

    // spec §8 S2: a bare dynamic PICK on an empty stack must fan out over
    // every sampled depth, not just one — the main stack being witness-backed
    // means there is always "one more" underneath, so the sample cap alone
    // (not the current physical depth) bounds the fanout.
    #[test]
    fn dynamic_pick_on_an_empty_stack_fans_out_to_the_full_sample_cap() {
        let mut settings = Settings::default();
        settings.z3_enabled = false;
        settings.is_incomplete_script = true;
        settings.max_samples_for_dynamic_stack_access = 2;
        let report = trace("PICK", &settings);
        assert_eq!(report.paths.len(), 2);
        for path in &report.paths {
            assert!(!path.failed());
            assert!(path.warnings.iter().any(|w| w.starts_with("warn_dynamic_stack_access_fanout_truncated_at_")));
        }
    }

    // spec §8 S3: a bare CHECKMULTISIG on an empty stack forks over both
    // num_keys and, once num_keys is pinned, num_signatures (nested
    // 0..=num_keys), producing exactly the three valid (num_keys,
    // num_signatures) combinations reachable within the sample cap, plus a
    // pruned note recording the num_keys value the cap didn't reach.
    #[test]
    fn dynamic_checkmultisig_forks_over_num_keys_and_num_signatures() {
        let mut settings = Settings::default();
        settings.z3_enabled = false;
        settings.is_incomplete_script = true;
        settings.max_samples_for_dynamic_stack_access = 2;
        let report = trace("CHECKMULTISIG", &settings);
        assert_eq!(report.paths.len(), 3);
        for path in &report.paths {
            assert!(!path.failed(), "{:?}", path.failures);
        }
        let mut witness_counts: Vec<usize> = report.paths.iter().map(|p| p.witnesses_used).collect();
        witness_counts.sort();
        assert_eq!(witness_counts, vec![3, 4, 5]);
        assert!(report.pruned_notes.iter().any(|n| n.contains("CHECKMULTISIG") && n.contains(": 2")));
    }

    // spec §8 S5: a value produced, then dropped without ever being observed
    // by an operand or enforcement, is reported as unused on every path that
    // reaches it — here the materialized witness consumed by SWAP/DROP.
    #[test]
    fn dropped_unobserved_value_is_reported_as_unused_on_every_path() {
        let settings = Settings::default();
        let report = trace("IF 1 ELSE 2 ENDIF SWAP DROP", &settings);
        assert_eq!(report.paths.len(), 2);
        for path in &report.paths {
            assert!(!path.failed());
            // wit0 is consumed by the IF condition (pc 0); SWAP (pc 5) needs a
            // second stack slot it doesn't have, materializing wit1, which
            // DROP then discards without ever observing it.
            let unused: Vec<&String> = path.unused_values.iter().map(|u| &u.rendered).collect();
            assert!(unused.iter().any(|r| r.as_str() == "wit1"), "{unused:?}");
            let entry = path.unused_values.iter().find(|u| u.rendered == "wit1").unwrap();
            assert_eq!(entry.producer_pc, 5);
        }
    }
}
