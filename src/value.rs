//! Symbolic value algebra (spec §3, §4.1).
//!
//! A [`Value`] is a node in an immutable expression tree. Nodes live in a
//! [`ValueStore`] arena and are referred to by [`ValueId`] everywhere else in
//! the engine, the way `air.rs` treats a `Row`/`Locals` tuple as an opaque,
//! pure value the rest of the pipeline threads through by reference.
//!
//! Structural equality implies semantic equality: the store hash-conses
//! nodes by a `blake3` digest of their canonical encoding, so two
//! syntactically identical subtrees always share one [`ValueId`]. Arguments
//! are never mutated after a node is constructed.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Stable identity of a value node within a [`ValueStore`].
///
/// Two equal [`ValueId`]s always denote structurally (and therefore
/// semantically) equal values; this is what lets the SMT lowering key fresh
/// variables by identity instead of re-deriving structural equality.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(u32);

impl ValueId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opcode tag carried by an [`Value::Op`] node.
///
/// This is a superset of `opcode::Opcode`: it also carries the synthetic
/// operators the engine introduces internally (`Bool` for `CastToBool`,
/// `HashEq` for the injected `hash(x)=hash(y) ⇒ x=y` axiom, etc.) that never
/// appear as literal script tokens.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpTag {
    Add,
    Sub,
    Mul,
    Not,
    BoolAnd,
    BoolOr,
    Bool,
    Size,
    Cat,
    Equal,
    NotEqual,
    LessThan,
    LessEq,
    GreaterThan,
    GreaterEq,
    Within,
    CheckSig,
    CheckSigAdd,
    CheckSigFromStack,
    CheckMultiSig,
    Sha256,
    Hash160,
    Hash256,
    Ripemd160,
    Pick,
    Roll,
    /// Elements introspection opcode, or any opcode whose result the engine
    /// models as an opaque uninterpreted application (bit ops, numeric
    /// shifts, unimplemented/unknown opcodes behind `--explicitly-enabled-opcodes`).
    Opaque(&'static str),
}

impl OpTag {
    /// Whether operand order is semantically irrelevant (affects only the
    /// *displayed* order, gated by `use-deterministic-arguments-order`).
    pub fn commutative(self) -> bool {
        matches!(self, OpTag::Add | OpTag::Mul | OpTag::Equal | OpTag::BoolAnd | OpTag::BoolOr)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            OpTag::Add => "ADD",
            OpTag::Sub => "SUB",
            OpTag::Mul => "MUL",
            OpTag::Not => "NOT",
            OpTag::BoolAnd => "BOOLAND",
            OpTag::BoolOr => "BOOLOR",
            OpTag::Bool => "BOOL",
            OpTag::Size => "SIZE",
            OpTag::Cat => "CAT",
            OpTag::Equal => "EQUAL",
            OpTag::NotEqual => "NE",
            OpTag::LessThan => "LT",
            OpTag::LessEq => "LE",
            OpTag::GreaterThan => "GT",
            OpTag::GreaterEq => "GE",
            OpTag::Within => "WITHIN",
            OpTag::CheckSig => "CHECKSIG",
            OpTag::CheckSigAdd => "CHECKSIGADD",
            OpTag::CheckSigFromStack => "CHECKSIGFROMSTACK",
            OpTag::CheckMultiSig => "CHECKMULTISIG",
            OpTag::Sha256 => "SHA256",
            OpTag::Hash160 => "HASH160",
            OpTag::Hash256 => "HASH256",
            OpTag::Ripemd160 => "RIPEMD160",
            OpTag::Pick => "PICK",
            OpTag::Roll => "ROLL",
            OpTag::Opaque(name) => name,
        }
    }
}

/// One node of the expression tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// A concrete byte string known at trace time.
    Literal(Vec<u8>),
    /// A witness stack input, numbered by first appearance; `alias` is set
    /// by `// bsst-name-alias(wit<N>): alias`.
    Witness { index: u32, alias: Option<String> },
    /// A user-declared placeholder (`$name`), free until an assumption
    /// constrains it.
    Placeholder(String),
    /// A data reference (`&name`), bound by `// =>name` to whatever sat on
    /// top of the stack at that program point.
    DataRef(String),
    /// An operator application over an ordered operand list.
    Op { tag: OpTag, args: Vec<ValueId> },
}

/// Errors raised when a [`Value`]'s static view is requested but its shape
/// contradicts that view (coercion failures below the SMT layer).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("value is not a statically-known byte string")]
    NotStaticBytes,
    #[error("byte string is not minimally-encoded as a script number")]
    NonMinimalScriptNum,
    #[error("byte string has the wrong length for an 8-byte LE64 view ({0} bytes)")]
    BadLe64Length(usize),
    #[error("script number exceeds the engine's supported width")]
    ScriptNumOverflow,
}

/// Arbitrary-precision-enough script number: real scripts rarely exceed a
/// handful of bytes once minimality is enforced, so an `i128` is sufficient
/// width in practice; overflow is a typed error, never UB or wraparound.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScriptNum(pub i128);

impl ScriptNum {
    /// Decode a byte string under CScriptNum minimaldata rules: little
    /// endian magnitude, top bit of the last byte is the sign, no redundant
    /// leading zero byte unless required to avoid ambiguity with the sign
    /// bit of the prior byte.
    pub fn decode(bytes: &[u8]) -> Result<ScriptNum, ValueError> {
        if bytes.is_empty() {
            return Ok(ScriptNum(0));
        }
        if bytes.len() > 15 {
            return Err(ValueError::ScriptNumOverflow);
        }
        if let Some(&last) = bytes.last() {
            if bytes.len() > 1 {
                let top = bytes[bytes.len() - 2];
                if (last & 0x7f) == 0 && (top & 0x80) == 0 {
                    return Err(ValueError::NonMinimalScriptNum);
                }
            }
        }
        let mut magnitude: i128 = 0;
        for (i, &b) in bytes.iter().enumerate() {
            let byte = if i + 1 == bytes.len() { (b & 0x7f) as i128 } else { b as i128 };
            magnitude |= byte << (8 * i);
        }
        let negative = bytes.last().map(|b| b & 0x80 != 0).unwrap_or(false);
        Ok(ScriptNum(if negative { -magnitude } else { magnitude }))
    }

    /// Decode the magnitude/sign the same way [`Self::decode`] does, but
    /// without rejecting a non-minimal encoding — used to recover the value
    /// of an operand that failed minimality so its canonical re-encoding can
    /// be published as a constraint (spec §4.2).
    pub fn decode_lenient(bytes: &[u8]) -> Result<ScriptNum, ValueError> {
        if bytes.is_empty() {
            return Ok(ScriptNum(0));
        }
        if bytes.len() > 15 {
            return Err(ValueError::ScriptNumOverflow);
        }
        let mut magnitude: i128 = 0;
        for (i, &b) in bytes.iter().enumerate() {
            let byte = if i + 1 == bytes.len() { (b & 0x7f) as i128 } else { b as i128 };
            magnitude |= byte << (8 * i);
        }
        let negative = bytes.last().map(|b| b & 0x80 != 0).unwrap_or(false);
        Ok(ScriptNum(if negative { -magnitude } else { magnitude }))
    }

    /// Minimal encoding of this number (the inverse of [`ScriptNum::decode`]).
    pub fn encode(self) -> Vec<u8> {
        if self.0 == 0 {
            return Vec::new();
        }
        let negative = self.0 < 0;
        let mut magnitude = self.0.unsigned_abs();
        let mut out = Vec::new();
        while magnitude > 0 {
            out.push((magnitude & 0xff) as u8);
            magnitude >>= 8;
        }
        let top = *out.last().unwrap();
        if top & 0x80 != 0 {
            out.push(if negative { 0x80 } else { 0x00 });
        } else if negative {
            *out.last_mut().unwrap() |= 0x80;
        }
        out
    }
}

/// `CastToBool`: empty, all-zero, or all-zero-ending-in-0x80 is false.
pub fn cast_to_bool(bytes: &[u8]) -> bool {
    for (i, &b) in bytes.iter().enumerate() {
        if b != 0 {
            if i + 1 == bytes.len() && b == 0x80 {
                return false;
            }
            return true;
        }
    }
    false
}

/// Arena owning every value node traced so far, with hash-consing keyed by a
/// digest of each node's canonical encoding.
#[derive(Default)]
pub struct ValueStore {
    nodes: Vec<Value>,
    by_digest: HashMap<blake3::Hash, Vec<ValueId>>,
    /// Monotonically increasing counter of distinct witness indices seen,
    /// independent from how many times each index is referenced.
    witness_high_water: u32,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn digest_of(&self, value: &Value) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        match value {
            Value::Literal(bytes) => {
                hasher.update(b"L");
                hasher.update(bytes);
            }
            Value::Witness { index, alias } => {
                hasher.update(b"W");
                hasher.update(&index.to_le_bytes());
                if let Some(a) = alias {
                    hasher.update(a.as_bytes());
                }
            }
            Value::Placeholder(name) => {
                hasher.update(b"P");
                hasher.update(name.as_bytes());
            }
            Value::DataRef(name) => {
                hasher.update(b"R");
                hasher.update(name.as_bytes());
            }
            Value::Op { tag, args } => {
                hasher.update(b"O");
                hasher.update(tag.display_name().as_bytes());
                for a in args {
                    hasher.update(&a.as_u32().to_le_bytes());
                }
            }
        }
        hasher.finalize()
    }

    /// Intern a value, returning the existing id if an equal node already
    /// exists. Operand order for commutative tags is canonicalized by the
    /// caller (`intern_op`) before reaching here.
    pub fn intern(&mut self, value: Value) -> ValueId {
        if let Value::Witness { index, .. } = &value {
            self.witness_high_water = self.witness_high_water.max(index + 1);
        }
        let digest = self.digest_of(&value);
        if let Some(bucket) = self.by_digest.get(&digest) {
            for &id in bucket {
                if self.nodes[id.as_u32() as usize] == value {
                    return id;
                }
            }
        }
        let id = ValueId(self.nodes.len() as u32);
        self.nodes.push(value);
        self.by_digest.entry(digest).or_default().push(id);
        id
    }

    /// Intern an operator application, canonicalizing operand order for
    /// commutative tags when `deterministic_order` is set.
    pub fn intern_op(&mut self, tag: OpTag, mut args: Vec<ValueId>, deterministic_order: bool) -> ValueId {
        if deterministic_order && tag.commutative() {
            args.sort_by_key(|id| self.display(*id, false));
        }
        self.intern(Value::Op { tag, args })
    }

    pub fn get(&self, id: ValueId) -> &Value {
        &self.nodes[id.as_u32() as usize]
    }

    /// Total distinct witness indices referenced so far (spec: `witness_used`).
    pub fn witness_count(&self) -> u32 {
        self.witness_high_water
    }

    /// Byte view: only literals have one statically.
    pub fn as_bytes(&self, id: ValueId) -> Result<&[u8], ValueError> {
        match self.get(id) {
            Value::Literal(bytes) => Ok(bytes),
            _ => Err(ValueError::NotStaticBytes),
        }
    }

    pub fn as_script_num(&self, id: ValueId) -> Result<ScriptNum, ValueError> {
        ScriptNum::decode(self.as_bytes(id)?)
    }

    pub fn as_le64(&self, id: ValueId) -> Result<u64, ValueError> {
        let bytes = self.as_bytes(id)?;
        if bytes.len() != 8 {
            return Err(ValueError::BadLe64Length(bytes.len()));
        }
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn as_static_bool(&self, id: ValueId) -> Result<bool, ValueError> {
        Ok(cast_to_bool(self.as_bytes(id)?))
    }

    /// Render a value for the report, inlining aliases, data references,
    /// placeholders, and (optionally) position tags.
    ///
    /// `with_pos` is a no-op placeholder hook for `--tag-data-with-position`;
    /// position tagging for *display* is applied by the reporter, which owns
    /// the producer-position map (see `context::ExecContext::unused`).
    pub fn display(&self, id: ValueId, _with_pos: bool) -> String {
        match self.get(id) {
            Value::Literal(bytes) => {
                if bytes.is_empty() {
                    "0".to_string()
                } else {
                    match ScriptNum::decode(bytes) {
                        Ok(n) => n.0.to_string(),
                        Err(_) => format!("x('{}')", hex::encode(bytes)),
                    }
                }
            }
            Value::Witness { index, alias } => match alias {
                Some(a) => format!("{}<wit{}>", a, index),
                None => format!("wit{}", index),
            },
            Value::Placeholder(name) => format!("${}", name),
            Value::DataRef(name) => format!("&{}", name),
            Value::Op { tag, args } => {
                let rendered: Vec<String> = args.iter().map(|a| self.display(*a, _with_pos)).collect();
                format!("{}({})", tag.display_name(), rendered.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_consing_dedupes_identical_literals() {
        let mut store = ValueStore::new();
        let a = store.intern(Value::Literal(vec![1, 2, 3]));
        let b = store.intern(Value::Literal(vec![1, 2, 3]));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_literals_get_distinct_ids() {
        let mut store = ValueStore::new();
        let a = store.intern(Value::Literal(vec![1]));
        let b = store.intern(Value::Literal(vec![2]));
        assert_ne!(a, b);
    }

    #[test]
    fn commutative_order_is_canonicalized_when_requested() {
        let mut store = ValueStore::new();
        let w0 = store.intern(Value::Witness { index: 0, alias: None });
        let w1 = store.intern(Value::Witness { index: 1, alias: None });
        let a = store.intern_op(OpTag::Add, vec![w1, w0], true);
        let b = store.intern_op(OpTag::Add, vec![w0, w1], true);
        assert_eq!(a, b, "deterministic order should make operand order irrelevant to identity");
    }

    #[test]
    fn non_deterministic_order_preserves_source_order() {
        let mut store = ValueStore::new();
        let w0 = store.intern(Value::Witness { index: 0, alias: None });
        let w1 = store.intern(Value::Witness { index: 1, alias: None });
        let a = store.intern_op(OpTag::Add, vec![w1, w0], false);
        let b = store.intern_op(OpTag::Add, vec![w0, w1], false);
        assert_ne!(a, b);
    }

    #[test]
    fn script_num_roundtrip() {
        for n in [-1i128, 0, 1, 127, 128, 255, 256, -255, 32768] {
            let encoded = ScriptNum(n).encode();
            let decoded = ScriptNum::decode(&encoded).unwrap();
            assert_eq!(decoded.0, n);
        }
    }

    #[test]
    fn cast_to_bool_matches_spec() {
        assert!(!cast_to_bool(&[]));
        assert!(!cast_to_bool(&[0, 0, 0]));
        assert!(!cast_to_bool(&[0, 0, 0x80]));
        assert!(cast_to_bool(&[0, 0, 1]));
        assert!(cast_to_bool(&[0x80]));
    }

    #[test]
    fn witness_count_tracks_high_water_mark_not_reference_count() {
        let mut store = ValueStore::new();
        store.intern(Value::Witness { index: 0, alias: None });
        store.intern(Value::Witness { index: 0, alias: None });
        store.intern(Value::Witness { index: 2, alias: None });
        assert_eq!(store.witness_count(), 3);
    }
}
