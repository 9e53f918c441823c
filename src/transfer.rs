//! Per-opcode transfer functions (spec §4.2).
//!
//! Grounded on `air.rs`'s block evaluator (`eval_block`/
//! `eval_block_all_regs_r`): a pure function of `(context, opcode)` with no
//! global state, returning a typed result the orchestrator consumes. Here
//! the "block" is a single opcode step; the orchestrator is `explorer`.
//!
//! A transfer function never forks a context itself — it reports the fork
//! request (a branch predicate, or a dynamic-index request) back to
//! `explorer` as a [`Step`], which owns traversal order (spec §4.3, §4.4).

#![forbid(unsafe_code)]

use crate::config::MinimalDataMode;
use crate::context::ExecContext;
use crate::opcode::Opcode;
use crate::value::{OpTag, ScriptNum, Value, ValueError, ValueId, ValueStore};
use crate::Settings;

/// What `explorer` must do after a transfer function returns.
#[derive(Clone, Debug)]
pub enum Step {
    /// The opcode completed; continue to the next token.
    Done,
    /// `IF`/`NOTIF`: fork into a true-child (takes the following block) and
    /// a false-child (jumps to the matching `ELSE`/`ENDIF`). `cond` already
    /// accounts for `NOTIF`'s inversion — the true-child is always "the
    /// block that follows".
    If { cond: ValueId },
    /// `IFDUP`: both children continue at the next token; the true-child
    /// additionally has a duplicate of the top value pushed.
    IfDup { cond: ValueId, top: ValueId, producer_pc: usize, line: u32 },
    /// `PICK`/`ROLL` with a non-static index (spec §4.4).
    DynamicPick { index: ValueId, is_roll: bool },
    /// `CHECKMULTISIG(VERIFY)` with a non-static key count (spec §4.4).
    DynamicCheckMultiSig { num_keys: ValueId, verify: bool },
    /// `CHECKMULTISIG(VERIFY)` with a pinned key count but a non-static
    /// signature count (spec §8 S3): keys are already popped, `num_sigs_val`
    /// still needs a solver-backed fork over `0..=num_keys`.
    DynamicCheckMultiSigNumSigs { num_keys: usize, num_keys_val: ValueId, pubkeys: Vec<ValueId>, num_sigs_val: ValueId, verify: bool },
}

/// Outcome of popping a CHECKMULTISIG key count and its pubkeys: either the
/// signature count was also static and the whole opcode finished, or it
/// needs forking over `0..=num_keys` (spec §8 S3).
pub enum MultiSigOutcome {
    Done,
    NeedsNumSigsFork { num_keys: usize, num_keys_val: ValueId, pubkeys: Vec<ValueId>, num_sigs_val: ValueId, verify: bool },
}

fn fail_tag(opcode: &str) -> String {
    format!("check_{}_invalid", opcode.to_ascii_lowercase())
}

fn bool_of(store: &mut ValueStore, settings: &Settings, id: ValueId) -> ValueId {
    store.intern_op(OpTag::Bool, vec![id], settings.use_deterministic_arguments_order)
}

/// Apply one non-dynamic, non-push opcode to `ctx`. A shallow main stack is
/// never an error here: [`ExecContext::pop`]/[`ExecContext::ensure_depth`]
/// materialize fresh witnesses as needed (spec §2/§3), so the only failures
/// a transfer function still seals are genuine semantic violations (an
/// empty altstack, or a `CHECKMULTISIG` signature count that exceeds its key
/// count) — mirroring spec §7: "opcode-level violations sealed on the
/// failing path are reported, not thrown out of the whole analysis".
pub fn apply_opcode(ctx: &mut ExecContext, store: &mut ValueStore, settings: &Settings, opcode: &Opcode) -> Step {
    let pc = ctx.pc;
    let line = ctx.line;
    macro_rules! bail {
        ($e:expr) => {
            match $e {
                Ok(v) => v,
                Err(_) => {
                    ctx.fail(fail_tag(&format!("{:?}", opcode)));
                    return Step::Done;
                }
            }
        };
    }

    use Opcode::*;
    match opcode {
        Add | Sub | Cat | Equal | NumEqual | BoolAnd | BoolOr => {
            let (b, pb) = ctx.pop(store);
            let (a, pa) = ctx.pop(store);
            ctx.observe(pa);
            ctx.observe(pb);
            check_minimaldata_operand(ctx, store, settings, a);
            check_minimaldata_operand(ctx, store, settings, b);
            if ctx.sealed {
                return Step::Done;
            }
            let tag = match opcode {
                Add => OpTag::Add,
                Sub => OpTag::Sub,
                Cat => OpTag::Cat,
                Equal | NumEqual => OpTag::Equal,
                BoolAnd => OpTag::BoolAnd,
                BoolOr => OpTag::BoolOr,
                _ => unreachable!(),
            };
            let result = store.intern_op(tag, vec![a, b], settings.use_deterministic_arguments_order);
            ctx.push(result, pc, line);
            Step::Done
        }
        Not => {
            let (a, pa) = ctx.pop(store);
            ctx.observe(pa);
            check_minimaldata_operand(ctx, store, settings, a);
            if ctx.sealed {
                return Step::Done;
            }
            let result = store.intern_op(OpTag::Not, vec![a], settings.use_deterministic_arguments_order);
            ctx.push(result, pc, line);
            Step::Done
        }
        Within => {
            let (hi, ph) = ctx.pop(store);
            let (lo, pl) = ctx.pop(store);
            let (x, px) = ctx.pop(store);
            ctx.observe(ph);
            ctx.observe(pl);
            ctx.observe(px);
            check_minimaldata_operand(ctx, store, settings, x);
            check_minimaldata_operand(ctx, store, settings, lo);
            check_minimaldata_operand(ctx, store, settings, hi);
            if ctx.sealed {
                return Step::Done;
            }
            let result = store.intern_op(OpTag::Within, vec![x, lo, hi], settings.use_deterministic_arguments_order);
            ctx.push(result, pc, line);
            Step::Done
        }
        Size => {
            ctx.ensure_depth(store, 1);
            let top = *ctx.stack.last().unwrap();
            check_minimaldata_operand(ctx, store, settings, top);
            if ctx.sealed {
                return Step::Done;
            }
            let result = store.intern_op(OpTag::Size, vec![top], settings.use_deterministic_arguments_order);
            ctx.push(result, pc, line);
            Step::Done
        }
        EqualVerify | NumEqualVerify => {
            let (b, pb) = ctx.pop(store);
            let (a, pa) = ctx.pop(store);
            ctx.observe(pa);
            ctx.observe(pb);
            let eq = store.intern_op(OpTag::Equal, vec![a, b], settings.use_deterministic_arguments_order);
            let pred = bool_of(store, settings, eq);
            ctx.publish(pred, pc);
            Step::Done
        }
        Verify => {
            let (top, pt) = ctx.pop(store);
            ctx.observe(pt);
            let pred = bool_of(store, settings, top);
            ctx.publish(pred, pc);
            Step::Done
        }
        If | NotIf => {
            let (top, pt) = ctx.pop(store);
            ctx.observe(pt);
            let b = bool_of(store, settings, top);
            let cond = if matches!(opcode, If) {
                b
            } else {
                store.intern_op(OpTag::Not, vec![b], settings.use_deterministic_arguments_order)
            };
            Step::If { cond }
        }
        IfDup => {
            ctx.ensure_depth(store, 1);
            let top = *ctx.stack.last().unwrap();
            let producer_pc = ctx.top_provenance().unwrap();
            let cond = bool_of(store, settings, top);
            Step::IfDup { cond, top, producer_pc, line }
        }
        Dup => {
            ctx.ensure_depth(store, 1);
            let top = *ctx.stack.last().unwrap();
            ctx.push(top, pc, line);
            Step::Done
        }
        Drop => {
            ctx.pop(store);
            Step::Done
        }
        TwoDrop => {
            ctx.pop(store);
            ctx.pop(store);
            Step::Done
        }
        Swap => {
            ctx.ensure_depth(store, 2);
            let n = ctx.stack.len();
            ctx.stack.swap(n - 1, n - 2);
            Step::Done
        }
        Rot => {
            ctx.ensure_depth(store, 3);
            let n = ctx.stack.len();
            ctx.stack[n - 3..].rotate_left(1);
            Step::Done
        }
        Over => {
            ctx.ensure_depth(store, 2);
            let n = ctx.stack.len();
            let v = ctx.stack[n - 2];
            ctx.push(v, pc, line);
            Step::Done
        }
        Nip => {
            ctx.ensure_depth(store, 2);
            let n = ctx.stack.len();
            ctx.stack.remove(n - 2);
            Step::Done
        }
        Tuck => {
            ctx.ensure_depth(store, 2);
            let n = ctx.stack.len();
            let top = ctx.stack[n - 1];
            ctx.stack.insert(n - 2, top);
            Step::Done
        }
        TwoDup => {
            ctx.ensure_depth(store, 2);
            let n = ctx.stack.len();
            let (a, b) = (ctx.stack[n - 2], ctx.stack[n - 1]);
            ctx.push(a, pc, line);
            ctx.push(b, pc, line);
            Step::Done
        }
        ThreeDup => {
            ctx.ensure_depth(store, 3);
            let n = ctx.stack.len();
            let (a, b, c) = (ctx.stack[n - 3], ctx.stack[n - 2], ctx.stack[n - 1]);
            ctx.push(a, pc, line);
            ctx.push(b, pc, line);
            ctx.push(c, pc, line);
            Step::Done
        }
        ToAltStack => {
            let (v, p) = ctx.pop(store);
            ctx.push_alt(v, p, line);
            Step::Done
        }
        FromAltStack => {
            let (v, p) = bail!(ctx.pop_alt());
            ctx.push(v, p, line);
            Step::Done
        }
        Pick | Roll => {
            let (index, pi) = ctx.pop(store);
            ctx.observe(pi);
            match store.as_script_num(index) {
                Ok(n) if n.0 >= 0 => {
                    apply_static_pick(ctx, store, settings, pc, line, n.0 as usize, matches!(opcode, Roll));
                    Step::Done
                }
                _ => Step::DynamicPick { index, is_roll: matches!(opcode, Roll) },
            }
        }
        CheckMultiSig | CheckMultiSigVerify => {
            let verify = matches!(opcode, CheckMultiSigVerify);
            let (num_keys_val, pk) = ctx.pop(store);
            ctx.observe(pk);
            match store.as_script_num(num_keys_val) {
                Ok(n) if n.0 >= 0 => match apply_checkmultisig_with_keys(ctx, store, settings, pc, line, num_keys_val, n.0 as usize, verify) {
                    MultiSigOutcome::Done => Step::Done,
                    MultiSigOutcome::NeedsNumSigsFork { num_keys, num_keys_val, pubkeys, num_sigs_val, verify } => {
                        Step::DynamicCheckMultiSigNumSigs { num_keys, num_keys_val, pubkeys, num_sigs_val, verify }
                    }
                },
                _ => Step::DynamicCheckMultiSig { num_keys: num_keys_val, verify },
            }
        }
        Sha256 | Hash160 | Hash256 | Ripemd160 => {
            let (a, pa) = ctx.pop(store);
            ctx.observe(pa);
            let tag = match opcode {
                Sha256 => OpTag::Sha256,
                Hash160 => OpTag::Hash160,
                Hash256 => OpTag::Hash256,
                Ripemd160 => OpTag::Ripemd160,
                _ => unreachable!(),
            };
            let result = hash_value(store, settings, tag, a);
            ctx.push(result, pc, line);
            Step::Done
        }
        CheckSig => {
            let (pubkey, pp) = ctx.pop(store);
            let (sig, ps) = ctx.pop(store);
            ctx.observe(pp);
            ctx.observe(ps);
            let result = store.intern_op(OpTag::CheckSig, vec![sig, pubkey], settings.use_deterministic_arguments_order);
            ctx.push(result, pc, line);
            Step::Done
        }
        CheckSigVerify => {
            let (pubkey, pp) = ctx.pop(store);
            let (sig, ps) = ctx.pop(store);
            ctx.observe(pp);
            ctx.observe(ps);
            let cs = store.intern_op(OpTag::CheckSig, vec![sig, pubkey], settings.use_deterministic_arguments_order);
            let pred = bool_of(store, settings, cs);
            ctx.publish(pred, pc);
            Step::Done
        }
        CheckSigAdd => {
            let (pubkey, pp) = ctx.pop(store);
            let (num, pn) = ctx.pop(store);
            let (sig, ps) = ctx.pop(store);
            ctx.observe(pp);
            ctx.observe(pn);
            ctx.observe(ps);
            let result = store.intern_op(OpTag::CheckSigAdd, vec![sig, num, pubkey], settings.use_deterministic_arguments_order);
            ctx.push(result, pc, line);
            Step::Done
        }
        CheckSigFromStack | CheckSigFromStackVerify => {
            let (pubkey, pp) = ctx.pop(store);
            let (msg, pm) = ctx.pop(store);
            let (sig, ps) = ctx.pop(store);
            ctx.observe(pp);
            ctx.observe(pm);
            ctx.observe(ps);
            let result =
                store.intern_op(OpTag::CheckSigFromStack, vec![sig, msg, pubkey], settings.use_deterministic_arguments_order);
            if matches!(opcode, CheckSigFromStackVerify) {
                let pred = bool_of(store, settings, result);
                ctx.publish(pred, pc);
            } else {
                ctx.push(result, pc, line);
            }
            Step::Done
        }
        Introspect(name) => {
            let result = store.intern_op(OpTag::Opaque(*name), vec![], settings.use_deterministic_arguments_order);
            ctx.push(result, pc, line);
            Step::Done
        }
        Else | EndIf => Step::Done,
        Custom(_name) => {
            // Opcodes admitted only via `--explicitly-enabled-opcodes` are
            // modeled as an opaque nullary application; plugin hooks
            // (`pre_opcode`/`post_opcode`) are the place to give them real
            // semantics.
            let result = store.intern_op(OpTag::Opaque("CUSTOM"), vec![], settings.use_deterministic_arguments_order);
            ctx.push(result, pc, line);
            Step::Done
        }
    }
}

/// `--assume-no-160bit-hash-collisions` toggles whether `HASH160`/
/// `RIPEMD160` are modeled as injective.
fn hash_value(store: &mut ValueStore, settings: &Settings, tag: OpTag, input: ValueId) -> ValueId {
    if let Value::Literal(bytes) = store.get(input).clone() {
        let digest = match tag {
            OpTag::Sha256 => sha256(&bytes),
            OpTag::Hash256 => sha256(&sha256(&bytes)),
            OpTag::Ripemd160 => ripemd160(&bytes),
            OpTag::Hash160 => ripemd160(&sha256(&bytes)),
            _ => unreachable!(),
        };
        return store.intern(Value::Literal(digest));
    }
    let is_160bit = matches!(tag, OpTag::Hash160 | OpTag::Ripemd160);
    let _injective_assumed = !is_160bit || settings.assume_no_160bit_hash_collisions;
    store.intern_op(tag, vec![input], settings.use_deterministic_arguments_order)
}

fn sha256(bytes: &[u8]) -> Vec<u8> {
    use sha2::{Digest, Sha256};
    Sha256::digest(bytes).to_vec()
}

fn ripemd160(bytes: &[u8]) -> Vec<u8> {
    use ripemd::{Digest, Ripemd160};
    Ripemd160::digest(bytes).to_vec()
}

/// Static (index known) form of `PICK`/`ROLL` (spec §4.4 step 1). A depth
/// beyond the current stack just materializes more witnesses beneath it
/// (spec §2/§3); `PICK`/`ROLL` no longer fail on depth alone.
pub fn apply_static_pick(ctx: &mut ExecContext, store: &mut ValueStore, _settings: &Settings, pc: usize, line: u32, depth: usize, is_roll: bool) {
    ctx.ensure_depth(store, depth + 1);
    let n = ctx.stack.len();
    let idx = n - 1 - depth;
    let value = ctx.stack[idx];
    if is_roll {
        ctx.stack.remove(idx);
    }
    ctx.push(value, pc, line);
}

/// Pop a CHECKMULTISIG key count's pubkeys and try the signature count
/// (spec §4.4 step 1, §8 S3). A shallow stack just materializes witnesses
/// for the pubkeys; if the signature count isn't statically known it is
/// handed back to `explorer` to fork over `0..=num_keys`.
pub fn apply_checkmultisig_with_keys(
    ctx: &mut ExecContext,
    store: &mut ValueStore,
    settings: &Settings,
    pc: usize,
    line: u32,
    num_keys_val: ValueId,
    num_keys: usize,
    verify: bool,
) -> MultiSigOutcome {
    let mut pubkeys = Vec::with_capacity(num_keys);
    for _ in 0..num_keys {
        let (k, p) = ctx.pop(store);
        ctx.observe(p);
        pubkeys.push(k);
    }
    let (num_sigs_val, psig) = ctx.pop(store);
    ctx.observe(psig);
    match store.as_script_num(num_sigs_val) {
        Ok(n) if n.0 >= 0 && (n.0 as usize) <= num_keys => {
            finish_checkmultisig(ctx, store, settings, pc, line, num_keys_val, &pubkeys, num_sigs_val, n.0 as usize, verify);
            MultiSigOutcome::Done
        }
        _ => MultiSigOutcome::NeedsNumSigsFork { num_keys, num_keys_val, pubkeys, num_sigs_val, verify },
    }
}

/// Finish CHECKMULTISIG once both the key count and the signature count are
/// pinned (spec §8 S3). Signatures are popped, then the historical
/// off-by-one "dummy" element is popped unconditionally — `nulldummy_flag`
/// only gates whether its emptiness is *checked*, not whether it is popped.
pub fn finish_checkmultisig(
    ctx: &mut ExecContext,
    store: &mut ValueStore,
    settings: &Settings,
    pc: usize,
    line: u32,
    num_keys_val: ValueId,
    pubkeys: &[ValueId],
    num_sigs_val: ValueId,
    num_sigs: usize,
    verify: bool,
) {
    let name = if verify { "CHECKMULTISIGVERIFY" } else { "CHECKMULTISIG" };
    let mut sigs = Vec::with_capacity(num_sigs);
    for _ in 0..num_sigs {
        let (s, p) = ctx.pop(store);
        ctx.observe(p);
        sigs.push(s);
    }
    let (dummy, pd) = ctx.pop(store);
    ctx.observe(pd);
    if settings.nulldummy_flag {
        if let Value::Literal(bytes) = store.get(dummy) {
            if !bytes.is_empty() {
                ctx.fail(fail_tag(name));
                return;
            }
        }
    }
    let mut args = vec![num_keys_val];
    args.extend_from_slice(pubkeys);
    args.push(num_sigs_val);
    args.extend(sigs);
    let result = store.intern_op(OpTag::CheckMultiSig, args, settings.use_deterministic_arguments_order);
    if verify {
        let pred = bool_of(store, settings, result);
        ctx.publish(pred, pc);
    } else {
        ctx.push(result, pc, line);
    }
}

/// Publish a minimaldata/scriptnum-range constraint on a pure-arithmetic
/// operand if the flags demand it (spec §4.2). Reuses `OpTag::Equal` rather
/// than a dedicated tag: "minimal" means "equal to its own canonical
/// re-encoding", which the existing Equal/Bool machinery already displays,
/// const-evaluates, and lowers to Z3.
fn check_minimaldata_operand(ctx: &mut ExecContext, store: &mut ValueStore, settings: &Settings, operand: ValueId) {
    let mode = crate::config::minimaldata_mode(settings);
    if matches!(mode, MinimalDataMode::Off) {
        return;
    }
    let bytes = match store.get(operand) {
        Value::Literal(b) => b.clone(),
        _ => return,
    };
    match ScriptNum::decode(&bytes) {
        Ok(_) => {}
        Err(ValueError::NonMinimalScriptNum) => {
            if matches!(mode, MinimalDataMode::Strict) {
                ctx.fail("check_minimaldata_invalid");
            } else if let Ok(lenient) = ScriptNum::decode_lenient(&bytes) {
                let canonical = store.intern(Value::Literal(lenient.encode()));
                let eq = store.intern_op(OpTag::Equal, vec![operand, canonical], settings.use_deterministic_arguments_order);
                let pred = bool_of(store, settings, eq);
                ctx.publish(pred, ctx.pc);
            }
        }
        Err(_) => {
            if matches!(mode, MinimalDataMode::Strict) {
                ctx.fail("check_minimaldata_invalid");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn ctx_with(values: Vec<ValueId>) -> ExecContext {
        let mut ctx = ExecContext::new();
        for (i, v) in values.into_iter().enumerate() {
            ctx.push(v, i, 1);
        }
        ctx
    }

    #[test]
    fn add_builds_commutative_op_and_consumes_operands() {
        let mut store = ValueStore::new();
        let settings = Settings::default();
        let a = store.intern(Value::Witness { index: 0, alias: None });
        let b = store.intern(Value::Witness { index: 1, alias: None });
        let mut ctx = ctx_with(vec![a, b]);
        let step = apply_opcode(&mut ctx, &mut store, &settings, &Opcode::Add);
        assert!(matches!(step, Step::Done));
        assert_eq!(ctx.stack.len(), 1);
        assert!(ctx.unused_values().is_empty());
    }

    #[test]
    fn verify_publishes_enforcement_and_pops() {
        let mut store = ValueStore::new();
        let settings = Settings::default();
        let lit = store.intern(Value::Literal(vec![1]));
        let mut ctx = ctx_with(vec![lit]);
        apply_opcode(&mut ctx, &mut store, &settings, &Opcode::Verify);
        assert!(ctx.stack.is_empty());
        assert_eq!(ctx.enforcements.len(), 1);
    }

    #[test]
    fn underflow_materializes_witnesses_instead_of_failing() {
        let mut store = ValueStore::new();
        let settings = Settings::default();
        let mut ctx = ExecContext::new();
        let step = apply_opcode(&mut ctx, &mut store, &settings, &Opcode::Add);
        assert!(matches!(step, Step::Done));
        assert!(!ctx.is_failed(), "an empty main stack materializes witnesses, it never fails ADD");
        assert_eq!(ctx.stack.len(), 1);
        let result = *ctx.stack.last().unwrap();
        assert!(matches!(store.get(result), Value::Op { tag: OpTag::Add, .. }));
    }

    #[test]
    fn static_pick_with_known_depth_duplicates_in_place() {
        let mut store = ValueStore::new();
        let settings = Settings::default();
        let a = store.intern(Value::Witness { index: 0, alias: None });
        let b = store.intern(Value::Witness { index: 1, alias: None });
        let depth = store.intern(Value::Literal(vec![1])); // pick depth 1 == a
        let mut ctx = ctx_with(vec![a, b, depth]);
        let step = apply_opcode(&mut ctx, &mut store, &settings, &Opcode::Pick);
        assert!(matches!(step, Step::Done));
        assert_eq!(*ctx.stack.last().unwrap(), a);
    }

    #[test]
    fn dynamic_pick_with_symbolic_depth_requests_fanout() {
        let mut store = ValueStore::new();
        let settings = Settings::default();
        let a = store.intern(Value::Witness { index: 0, alias: None });
        let depth = store.intern(Value::Witness { index: 1, alias: None });
        let mut ctx = ctx_with(vec![a, depth]);
        let step = apply_opcode(&mut ctx, &mut store, &settings, &Opcode::Pick);
        assert!(matches!(step, Step::DynamicPick { is_roll: false, .. }));
    }

    #[test]
    fn non_minimal_operand_publishes_equality_constraint_instead_of_failing() {
        let mut store = ValueStore::new();
        let settings = Settings::default(); // minimaldata_flag on, strict off
        let non_minimal = store.intern(Value::Literal(vec![1, 0])); // decodes to 1, but not minimal
        let b = store.intern(Value::Literal(vec![1]));
        let mut ctx = ctx_with(vec![non_minimal, b]);
        apply_opcode(&mut ctx, &mut store, &settings, &Opcode::Add);
        assert!(!ctx.is_failed());
        assert!(ctx.enforcements.iter().any(|e| matches!(store.get(e.predicate), Value::Op { tag: OpTag::Bool, .. })));
    }

    #[test]
    fn minimaldata_strict_flag_fails_non_minimal_operand() {
        let mut store = ValueStore::new();
        let mut settings = Settings::default();
        settings.minimaldata_flag_strict = true;
        let non_minimal = store.intern(Value::Literal(vec![1, 0]));
        let b = store.intern(Value::Literal(vec![1]));
        let mut ctx = ctx_with(vec![non_minimal, b]);
        apply_opcode(&mut ctx, &mut store, &settings, &Opcode::Add);
        assert!(ctx.is_failed());
    }

    #[test]
    fn checkmultisig_with_static_counts_orders_args_keys_then_sigs() {
        let mut store = ValueStore::new();
        let settings = Settings::default();
        let pk = store.intern(Value::Witness { index: 0, alias: None });
        let num_keys = store.intern(Value::Literal(vec![1]));
        let sig = store.intern(Value::Witness { index: 1, alias: None });
        let num_sigs = store.intern(Value::Literal(vec![1]));
        let dummy = store.intern(Value::Witness { index: 2, alias: None });
        let mut ctx = ctx_with(vec![dummy, sig, num_sigs, pk, num_keys]);
        let step = apply_opcode(&mut ctx, &mut store, &settings, &Opcode::CheckMultiSig);
        assert!(matches!(step, Step::Done));
        assert!(!ctx.is_failed());
        let result = *ctx.stack.last().unwrap();
        match store.get(result) {
            Value::Op { tag: OpTag::CheckMultiSig, args } => assert_eq!(args.len(), 4),
            other => panic!("expected CheckMultiSig op, got {other:?}"),
        }
    }

    #[test]
    fn sha256_of_literal_is_concretely_evaluated() {
        let mut store = ValueStore::new();
        let settings = Settings::default();
        let lit = store.intern(Value::Literal(b"abc".to_vec()));
        let mut ctx = ctx_with(vec![lit]);
        apply_opcode(&mut ctx, &mut store, &settings, &Opcode::Sha256);
        let result = *ctx.stack.last().unwrap();
        assert!(matches!(store.get(result), Value::Literal(_)));
    }
}
