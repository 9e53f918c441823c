//! Crate root: public surface and cross-module re-exports.
//!
//! `bsst` symbolically executes a stack-based transaction script (the
//! Bitcoin/Elements script family). Given a token stream and a [`Settings`]
//! object it enumerates every feasible control-flow path, accumulates the
//! constraints each opcode and user assertion impose, optionally consults an
//! SMT backend to prune infeasible paths and probe derived properties, and
//! returns a [`report::Report`] the caller renders to text.
//!
//! ## Invariants
//!
//! - The engine never panics on malformed *script* input; malformed input
//!   surfaces as a failed path or a parse error, never a `panic!`.
//! - The value algebra (`value`) is immutable after construction and safe to
//!   share by reference; a [`context::ExecContext`] is never shared across
//!   branches once forked.
//! - The engine itself is single-threaded; the only parallelism lives inside
//!   a single SMT check (`smt::pool`).

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Symbolic value algebra: hash-consed expression trees and their views.
pub mod value;
/// Script tokenizer: the engine's sole concession to an out-of-scope parser.
pub mod token;
/// Opcode table: arity, category, and commutative-display metadata.
pub mod opcode;
/// Per-path execution context: stacks, enforcements, data refs, branch trail.
pub mod context;
/// Per-opcode transfer functions (the stack-effect/constraint contract).
pub mod transfer;
/// SMT backend: lowering, solver pool, timeout/retry policy, tracked asserts.
pub mod smt;
/// Assertion/assumption grammar and application.
pub mod assert;
/// Plugin hook registry.
pub mod plugin;
/// Path tree exploration: branch fork/merge, dynamic stack access fanout.
pub mod explorer;
/// Report composition: the nine sections of the external report format.
pub mod report;
/// Engine-wide settings (the CLI flag surface, minus CLI parsing itself).
pub mod config;

pub use config::Settings;
pub use context::{ExecContext, StackError};
pub use explorer::{trace_script, TraceError};
pub use report::Report;
pub use smt::SolverError;
pub use token::LexError;
pub use value::{Value, ValueError, ValueId, ValueStore};

/// Top-level result alias used by the public entry point.
pub type BsstResult<T> = Result<T, TraceError>;

/// Trace a script source string end to end: tokenize, symbolically execute
/// every feasible path, and return the composed report.
///
/// This is the single function a CLI or embedder needs; see `src/bin/bsst.rs`
/// for the thin wrapper that reads input and prints the report.
pub fn run(source: &str, settings: &Settings) -> BsstResult<Report> {
    let tokens = token::tokenize(source, settings).map_err(TraceError::Lex)?;
    trace_script(&tokens, settings)
}
