//! Opcode table: dispatch categories and static metadata (spec §4.2).
//!
//! Grounded on `air.rs::AirSpec`: a fixed table consulted by row evaluation,
//! here keyed by opcode instead of by register column. `Opcode` covers the
//! categories spec §4.2 enumerates; opcodes outside this closed set but
//! named via `--explicitly-enabled-opcodes` fall back to `Opcode::Custom`.

#![forbid(unsafe_code)]

/// Dispatch category, mirroring the bullet list of spec §4.2.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Push,
    PureArithLogic,
    ComparisonVerify,
    Branching,
    StackStaticIndex,
    StackDynamicIndex,
    Crypto,
    Introspection,
    ControlFlow,
    Custom,
}

/// A single opcode. `Custom` carries the raw mnemonic for opcodes enabled at
/// runtime via plugins or `--explicitly-enabled-opcodes`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Not,
    Within,
    Equal,
    EqualVerify,
    NumEqual,
    NumEqualVerify,
    BoolAnd,
    BoolOr,
    Size,
    Cat,
    Verify,
    If,
    NotIf,
    Else,
    EndIf,
    IfDup,
    Dup,
    Drop,
    TwoDrop,
    Swap,
    Rot,
    Over,
    Nip,
    Tuck,
    TwoDup,
    ThreeDup,
    ToAltStack,
    FromAltStack,
    Pick,
    Roll,
    CheckMultiSig,
    CheckMultiSigVerify,
    Sha256,
    Hash160,
    Hash256,
    Ripemd160,
    CheckSig,
    CheckSigVerify,
    CheckSigAdd,
    CheckSigFromStack,
    CheckSigFromStackVerify,
    /// Elements introspection opcode (tx field accessors), feature-gated.
    Introspect(&'static str),
    Custom(String),
}

impl Opcode {
    /// Parse a token word (already `OP_`-stripped, upper-cased) into an
    /// opcode, or `None` if it is unrecognized (caller decides whether that
    /// is fatal or falls back to `Custom` based on `--explicitly-enabled-opcodes`).
    pub fn parse(word: &str) -> Option<Opcode> {
        use Opcode::*;
        Some(match word {
            "ADD" => Add,
            "SUB" => Sub,
            "NOT" => Not,
            "WITHIN" => Within,
            "EQUAL" => Equal,
            "EQUALVERIFY" => EqualVerify,
            "NUMEQUAL" => NumEqual,
            "NUMEQUALVERIFY" => NumEqualVerify,
            "BOOLAND" => BoolAnd,
            "BOOLOR" => BoolOr,
            "SIZE" => Size,
            "CAT" => Cat,
            "VERIFY" => Verify,
            "IF" => If,
            "NOTIF" => NotIf,
            "ELSE" => Else,
            "ENDIF" => EndIf,
            "IFDUP" => IfDup,
            "DUP" => Dup,
            "DROP" => Drop,
            "2DROP" => TwoDrop,
            "SWAP" => Swap,
            "ROT" => Rot,
            "OVER" => Over,
            "NIP" => Nip,
            "TUCK" => Tuck,
            "2DUP" => TwoDup,
            "3DUP" => ThreeDup,
            "TOALTSTACK" => ToAltStack,
            "FROMALTSTACK" => FromAltStack,
            "PICK" => Pick,
            "ROLL" => Roll,
            "CHECKMULTISIG" => CheckMultiSig,
            "CHECKMULTISIGVERIFY" => CheckMultiSigVerify,
            "SHA256" => Sha256,
            "HASH160" => Hash160,
            "HASH256" => Hash256,
            "RIPEMD160" => Ripemd160,
            "CHECKSIG" => CheckSig,
            "CHECKSIGVERIFY" => CheckSigVerify,
            "CHECKSIGADD" => CheckSigAdd,
            "CHECKSIGFROMSTACK" => CheckSigFromStack,
            "CHECKSIGFROMSTACKVERIFY" => CheckSigFromStackVerify,
            _ => return None,
        })
    }

    pub fn category(&self) -> Category {
        use Opcode::*;
        match self {
            Add | Sub | Not | Within | Equal | NumEqual | BoolAnd | BoolOr | Size | Cat => Category::PureArithLogic,
            EqualVerify | NumEqualVerify | CheckSigVerify | CheckSigFromStackVerify | CheckMultiSigVerify | Verify => {
                Category::ComparisonVerify
            }
            If | NotIf | Else | EndIf | IfDup => Category::Branching,
            Dup | Drop | TwoDrop | Swap | Rot | Over | Nip | Tuck | TwoDup | ThreeDup | ToAltStack | FromAltStack => {
                Category::StackStaticIndex
            }
            Pick | Roll | CheckMultiSig => Category::StackDynamicIndex,
            Sha256 | Hash160 | Hash256 | Ripemd160 | CheckSig | CheckSigAdd | CheckSigFromStack => Category::Crypto,
            Introspect(_) => Category::Introspection,
            Custom(_) => Category::Custom,
        }
    }

    /// Static stack input arity, when the opcode's reach does not depend on
    /// a runtime value (§4.4 opcodes return `None`: their arity must be
    /// resolved per-sample).
    pub fn static_arity(&self) -> Option<usize> {
        use Opcode::*;
        match self {
            Add | Sub | Equal | NumEqual | BoolAnd | BoolOr | Cat | Within => {
                if matches!(self, Within) {
                    Some(3)
                } else {
                    Some(2)
                }
            }
            Not | Size | Verify | If | NotIf | IfDup | Dup | Drop | ToAltStack | FromAltStack | Sha256 | Hash160
            | Hash256 | Ripemd160 => Some(1),
            EqualVerify | NumEqualVerify | Swap | Nip | Tuck | CheckSig | CheckSigAdd => Some(2),
            Rot | TwoDup | CheckSigFromStack => Some(3),
            ThreeDup => Some(3),
            TwoDrop | Over => Some(2),
            CheckSigVerify | CheckSigFromStackVerify => Some(2),
            Pick | Roll | CheckMultiSig | CheckMultiSigVerify => None,
            Else | EndIf => Some(0),
            Introspect(_) => Some(0),
            Custom(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_mnemonics() {
        assert_eq!(Opcode::parse("ADD"), Some(Opcode::Add));
        assert_eq!(Opcode::parse("CHECKMULTISIGVERIFY"), Some(Opcode::CheckMultiSigVerify));
    }

    #[test]
    fn unknown_mnemonic_is_none() {
        assert_eq!(Opcode::parse("NOTANOPCODE"), None);
    }

    #[test]
    fn dynamic_opcodes_have_no_static_arity() {
        assert_eq!(Opcode::Pick.static_arity(), None);
        assert_eq!(Opcode::CheckMultiSig.static_arity(), None);
    }

    #[test]
    fn categories_match_spec_buckets() {
        assert_eq!(Opcode::Add.category(), Category::PureArithLogic);
        assert_eq!(Opcode::If.category(), Category::Branching);
        assert_eq!(Opcode::Pick.category(), Category::StackDynamicIndex);
        assert_eq!(Opcode::Sha256.category(), Category::Crypto);
    }
}
