//! Per-path execution context (spec §3).
//!
//! Grounded on `air.rs::Locals`: a small, row-local tuple the rest of the
//! pipeline threads through by value without consulting global state. Here
//! the tuple grows to hold everything one live path owns — stacks, the
//! accumulated enforcement/warning/failure lists, the unused-value tracker,
//! data-reference bindings, and the branch trail describing how this path
//! was reached. A context is forked at every branching transfer function and
//! sealed at script end or first unrecoverable failure; once forked it is
//! never shared between siblings again.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use thiserror::Error;

use crate::value::{Value, ValueId, ValueStore};

/// The alt-stack, unlike the main stack, is never implicitly witness-backed
/// (spec §3: only the main stack models "the rest of the witness"), so
/// reading past its contents is a genuine structural error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackError {
    #[error("altstack is empty")]
    EmptyAltStack,
}

/// Flags an [`Enforcement`] may carry (spec §3).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EnforcementFlags {
    /// Proven tautologically true given the path predicate at the level it
    /// was lifted to (`<*>`, requires `check-always-true-enforcements`).
    pub always_true: bool,
    /// Proven tautologically true locally within one path but not
    /// necessarily in all valid paths (`{*}`, requires
    /// `mark-path-local-always-true-enforcements`).
    pub path_local_always_true: bool,
}

/// A predicate the script asserts for the path to be valid (spec §3, §4.3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Enforcement {
    pub predicate: ValueId,
    pub position: usize,
    pub flags: EnforcementFlags,
}

/// A sealed failure: an error-kind tag plus the stack snapshot at the
/// failing position (spec §7: "rendered with stack/altstack snapshots at the
/// failing position").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub kind: String,
    pub position: usize,
    pub line: u32,
    pub stack_snapshot: Vec<ValueId>,
    pub altstack_snapshot: Vec<ValueId>,
}

/// One step of how a path was reached (spec §3 `branch_trail`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchStep {
    pub opcode: String,
    pub position: usize,
    pub label: String,
}

/// Where an unconsumed value came from, for the "Unused values" section.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UnusedEntry {
    pub value: ValueId,
    /// Position to render (`@ position`): the producing token for an
    /// ordinary push, or the token that demanded a witness it didn't find
    /// on the stack (see [`ExecContext::pop`]).
    pub position: usize,
    pub line: u32,
}

/// The unit forked on every branch (spec §3 "Execution context").
#[derive(Clone, Debug)]
pub struct ExecContext {
    pub stack: Vec<ValueId>,
    pub altstack: Vec<ValueId>,
    /// Producer position (pc) parallel to `stack`, one entry per slot.
    stack_provenance: Vec<usize>,
    altstack_provenance: Vec<usize>,
    pub pc: usize,
    pub line: u32,
    pub enforcements: Vec<Enforcement>,
    pub warnings: Vec<String>,
    pub failures: Vec<Failure>,
    pub witness_aliases: HashMap<u32, String>,
    /// Next index handed out when the main stack is read past its current
    /// contents (spec §3 `witness counter`).
    next_witness: u32,
    /// Positions whose produced value has not yet been consumed as an
    /// operand or observed by an enforcement (spec §3 `unused`). Keyed by
    /// producer pc rather than by [`ValueId`] so that hash-consed duplicate
    /// literals pushed at distinct positions are tracked independently
    /// (see DESIGN.md's Open Question decision on `tag-data-with-position`).
    pending: HashMap<usize, UnusedEntry>,
    pub data_refs: HashMap<String, ValueId>,
    /// Conjunction of branch decisions and adopted assertions/assumptions
    /// reaching this node; consumed by `smt` to build a solver frame.
    pub path_condition: Vec<ValueId>,
    pub branch_trail: Vec<BranchStep>,
    pub sealed: bool,
    /// `(pc, rendered stack)` snapshots taken at `--points-of-interest`
    /// positions, for the supplemental points-of-interest dump.
    pub points_of_interest: Vec<(usize, String)>,
}

impl ExecContext {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            altstack: Vec::new(),
            stack_provenance: Vec::new(),
            altstack_provenance: Vec::new(),
            pc: 0,
            line: 0,
            enforcements: Vec::new(),
            warnings: Vec::new(),
            failures: Vec::new(),
            witness_aliases: HashMap::new(),
            next_witness: 0,
            pending: HashMap::new(),
            data_refs: HashMap::new(),
            path_condition: Vec::new(),
            branch_trail: Vec::new(),
            sealed: false,
            points_of_interest: Vec::new(),
        }
    }

    pub fn push(&mut self, value: ValueId, producer_pc: usize, line: u32) {
        self.stack.push(value);
        self.stack_provenance.push(producer_pc);
        self.pending.insert(producer_pc, UnusedEntry { value, position: producer_pc, line });
    }

    pub fn push_alt(&mut self, value: ValueId, producer_pc: usize, line: u32) {
        self.altstack.push(value);
        self.altstack_provenance.push(producer_pc);
        self.pending.entry(producer_pc).or_insert(UnusedEntry { value, position: producer_pc, line });
    }

    /// Materialize a fresh witness at stack slot `idx` (`0` is the bottom),
    /// tracked in `pending` as if it had been pushed by the instruction
    /// currently executing. Its pending key is disjoint from every real
    /// producer pc, so several witnesses materialized by the same
    /// instruction (e.g. `WITHIN` on an empty stack needs three) never
    /// collide in `pending`.
    fn materialize_witness(&mut self, store: &mut ValueStore, idx: usize) -> (ValueId, usize) {
        let index = self.next_witness;
        self.next_witness += 1;
        let alias = self.witness_aliases.get(&index).cloned();
        let value = store.intern(Value::Witness { index, alias });
        let key = usize::MAX - index as usize;
        self.stack.insert(idx, value);
        self.stack_provenance.insert(idx, key);
        self.pending.insert(key, UnusedEntry { value, position: self.pc, line: self.line });
        (value, key)
    }

    /// Pop the top of the main stack, materializing a fresh witness first if
    /// the stack is empty (spec §2/§3: the main stack is backed by an
    /// unbounded, unknown witness beneath whatever has actually been
    /// pushed). Unlike the altstack, this never fails.
    pub fn pop(&mut self, store: &mut ValueStore) -> (ValueId, usize) {
        if self.stack.is_empty() {
            self.materialize_witness(store, 0);
        }
        let v = self.stack.pop().expect("materialize_witness guarantees a non-empty stack");
        let p = self.stack_provenance.pop().expect("stack_provenance parallels stack");
        (v, p)
    }

    pub fn pop_alt(&mut self) -> Result<(ValueId, usize), StackError> {
        match (self.altstack.pop(), self.altstack_provenance.pop()) {
            (Some(v), Some(p)) => Ok((v, p)),
            _ => Err(StackError::EmptyAltStack),
        }
    }

    /// Producer pc of the current top-of-stack slot, for opcodes (`IFDUP`)
    /// that need to duplicate a value without popping it first. Call
    /// [`Self::ensure_depth`] first if the stack may be shallower than 1.
    pub fn top_provenance(&self) -> Option<usize> {
        self.stack_provenance.last().copied()
    }

    /// Materialize witnesses at the bottom of the main stack, oldest first,
    /// until it holds at least `n` items. For opcodes that index into the
    /// stack directly (`SWAP`, `ROT`, `DUP`, ...) rather than popping, since
    /// those need the items to exist before they can be addressed at all.
    pub fn ensure_depth(&mut self, store: &mut ValueStore, n: usize) {
        while self.stack.len() < n {
            self.materialize_witness(store, 0);
        }
    }

    /// Mark the value produced at `producer_pc` as consumed/observed, i.e.
    /// no longer a candidate for the "Unused values" section.
    pub fn observe(&mut self, producer_pc: usize) {
        self.pending.remove(&producer_pc);
    }

    /// Observe every slot currently on the main and alt stacks: used at
    /// finalize time when `cleanstack-flag` is off and an incomplete script
    /// simply stops (nothing further will ever consume these values, but
    /// spec's examples only flag genuinely *discarded* values, not a
    /// deliberately retained final stack — see `explorer::finalize`).
    pub fn observe_position(&mut self, producer_pc: usize) {
        self.observe(producer_pc);
    }

    /// Snapshot of everything still pending, for the reporter. The first
    /// element of each pair is the internal pending key (pass it back to
    /// [`Self::observe`]); sort and display by `UnusedEntry::position`.
    pub fn unused_values(&self) -> Vec<(usize, UnusedEntry)> {
        let mut v: Vec<_> = self.pending.iter().map(|(&key, &e)| (key, e)).collect();
        v.sort_by_key(|(_, e)| e.position);
        v
    }

    /// Total number of witnesses materialized on this path, not just the
    /// ones referenced by a surviving formula (spec §8 S3: CHECKMULTISIG's
    /// always-popped dummy element counts even though nothing ever reads it).
    pub fn witness_used(&self) -> usize {
        self.next_witness as usize
    }

    pub fn publish(&mut self, predicate: ValueId, position: usize) {
        self.enforcements.push(Enforcement { predicate, position, flags: EnforcementFlags::default() });
    }

    pub fn fail(&mut self, kind: impl Into<String>) {
        self.failures.push(Failure {
            kind: kind.into(),
            position: self.pc,
            line: self.line,
            stack_snapshot: self.stack.clone(),
            altstack_snapshot: self.altstack.clone(),
        });
        self.sealed = true;
    }

    pub fn is_failed(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, ValueStore};

    #[test]
    fn pending_tracks_by_producer_position_not_value_identity() {
        let mut store = ValueStore::new();
        let lit = store.intern(Value::Literal(vec![5]));
        let mut ctx = ExecContext::new();
        ctx.push(lit, 0, 1);
        ctx.push(lit, 3, 1); // same hash-consed value, different producer pc
        assert_eq!(ctx.unused_values().len(), 2, "two distinct pushes must be tracked independently");
        ctx.observe(0);
        assert_eq!(ctx.unused_values().len(), 1);
    }

    #[test]
    fn pop_then_drop_without_observe_stays_unused() {
        let mut store = ValueStore::new();
        let w = store.intern(Value::Witness { index: 1, alias: None });
        let mut ctx = ExecContext::new();
        ctx.push(w, 2, 1);
        let (_, pc) = ctx.pop(&mut store);
        assert_eq!(pc, 2);
        assert_eq!(ctx.unused_values().len(), 1, "drop without observe leaves the value unused");
    }

    #[test]
    fn popping_an_empty_main_stack_materializes_a_witness_instead_of_failing() {
        let mut store = ValueStore::new();
        let mut ctx = ExecContext::new();
        let (v, _) = ctx.pop(&mut store);
        assert!(matches!(store.get(v), Value::Witness { index: 0, .. }));
        assert!(ctx.stack.is_empty(), "pop leaves nothing behind once the materialized witness is taken");
    }

    #[test]
    fn ensure_depth_materializes_at_the_bottom_oldest_first() {
        let mut store = ValueStore::new();
        let mut ctx = ExecContext::new();
        let existing = store.intern(Value::Literal(vec![7]));
        ctx.push(existing, 0, 1);
        ctx.ensure_depth(&mut store, 2);
        assert_eq!(ctx.stack.len(), 2);
        assert!(matches!(store.get(ctx.stack[0]), Value::Witness { index: 0, .. }));
        assert_eq!(ctx.stack[1], existing, "the value already on the stack stays on top");
    }

    #[test]
    fn materialized_witnesses_do_not_collide_in_the_pending_map() {
        let mut store = ValueStore::new();
        let mut ctx = ExecContext::new();
        ctx.ensure_depth(&mut store, 3);
        assert_eq!(ctx.unused_values().len(), 3, "three witnesses materialized by one instruction all stay tracked");
    }
}
