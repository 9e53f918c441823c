//! Plugin hook registry (spec §4.7).
//!
//! Grounded on `colinrozzi-runtime_v2/src/actor.rs`'s `Actor` trait: a fixed
//! set of named lifecycle callbacks a host dispatches into, none of which the
//! host is required to implement. That crate's hooks are async trait methods
//! on a long-lived actor; here there is no actor object and no async runtime
//! (the engine is single-threaded, spec §1's non-goals exclude a plugin
//! sandbox), so each hook becomes a plain `Option<Box<dyn Fn>>` field the
//! embedder fills in a la carte, and a plugin is just a named bundle of them.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use crate::context::{ExecContext, Failure};
use crate::opcode::Opcode;
use crate::value::{ValueId, ValueStore};
use crate::Settings;

/// The lifecycle callbacks spec §4.7 enumerates. Every field is optional;
/// a plugin implements only the hooks it needs.
#[derive(Default)]
pub struct PluginHooks {
    /// Rewrite raw source text before tokenization.
    pub parse_input_file: Option<Box<dyn Fn(&str) -> String>>,
    /// Mutate settings once, before tracing starts.
    pub plugin_settings: Option<Box<dyn Fn(&mut Settings)>>,
    /// Handle a `// bsst-plugin(name): body` directive addressed to this
    /// plugin.
    pub plugin_comment: Option<Box<dyn Fn(&str, &mut ExecContext, &mut ValueStore)>>,
    /// Observe a sealed failure on some path.
    pub script_failure: Option<Box<dyn Fn(&Failure)>>,
    /// Contribute a header line to the report, before the standard sections.
    pub report_start: Option<Box<dyn Fn() -> String>>,
    /// Contribute a trailer line to the report, after the standard sections.
    pub report_end: Option<Box<dyn Fn() -> String>>,
    /// Observe every value pushed by a `Push` token.
    pub pushdata: Option<Box<dyn Fn(&mut ExecContext, ValueId)>>,
    /// Run before an opcode's transfer function. Returning `false` skips the
    /// built-in transfer function entirely (the plugin owns the step).
    pub pre_opcode: Option<Box<dyn Fn(&mut ExecContext, &mut ValueStore, &Opcode) -> bool>>,
    /// Run after an opcode's transfer function (or after `pre_opcode` skipped
    /// it).
    pub post_opcode: Option<Box<dyn Fn(&mut ExecContext, &mut ValueStore, &Opcode)>>,
    /// Run before finalize-time enforcement (cleanstack/terminal bool) is
    /// checked.
    pub pre_finalize: Option<Box<dyn Fn(&mut ExecContext, &mut ValueStore)>>,
    /// Run after a path is fully finalized (success or failure already
    /// decided).
    pub post_finalize: Option<Box<dyn Fn(&mut ExecContext)>>,
}

/// Named bundles of [`PluginHooks`], dispatched by `// bsst-plugin(name):`
/// directives and lifecycle events raised during tracing.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, PluginHooks>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, hooks: PluginHooks) {
        self.plugins.insert(name.into(), hooks);
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn rewrite_source(&self, source: &str) -> String {
        let mut out = source.to_string();
        for hooks in self.plugins.values() {
            if let Some(f) = &hooks.parse_input_file {
                out = f(&out);
            }
        }
        out
    }

    pub fn apply_settings(&self, settings: &mut Settings) {
        for hooks in self.plugins.values() {
            if let Some(f) = &hooks.plugin_settings {
                f(settings);
            }
        }
    }

    /// Dispatch a `bsst-plugin(name): body` directive. Returns `false` if no
    /// registered plugin claims `name` (caller records a warning).
    pub fn dispatch_comment(&self, name: &str, body: &str, ctx: &mut ExecContext, store: &mut ValueStore) -> bool {
        match self.plugins.get(name).and_then(|h| h.plugin_comment.as_ref()) {
            Some(f) => {
                f(body, ctx, store);
                true
            }
            None => false,
        }
    }

    pub fn notify_failure(&self, failure: &Failure) {
        for hooks in self.plugins.values() {
            if let Some(f) = &hooks.script_failure {
                f(failure);
            }
        }
    }

    pub fn report_header_lines(&self) -> Vec<String> {
        self.plugins.values().filter_map(|h| h.report_start.as_ref()).map(|f| f()).collect()
    }

    pub fn report_trailer_lines(&self) -> Vec<String> {
        self.plugins.values().filter_map(|h| h.report_end.as_ref()).map(|f| f()).collect()
    }

    pub fn notify_pushdata(&self, ctx: &mut ExecContext, value: ValueId) {
        for hooks in self.plugins.values() {
            if let Some(f) = &hooks.pushdata {
                f(ctx, value);
            }
        }
    }

    /// Returns `false` if any `pre_opcode` hook asked to skip the built-in
    /// transfer function for this opcode.
    pub fn pre_opcode(&self, ctx: &mut ExecContext, store: &mut ValueStore, opcode: &Opcode) -> bool {
        let mut run_builtin = true;
        for hooks in self.plugins.values() {
            if let Some(f) = &hooks.pre_opcode {
                run_builtin &= f(ctx, store, opcode);
            }
        }
        run_builtin
    }

    pub fn post_opcode(&self, ctx: &mut ExecContext, store: &mut ValueStore, opcode: &Opcode) {
        for hooks in self.plugins.values() {
            if let Some(f) = &hooks.post_opcode {
                f(ctx, store, opcode);
            }
        }
    }

    pub fn pre_finalize(&self, ctx: &mut ExecContext, store: &mut ValueStore) {
        for hooks in self.plugins.values() {
            if let Some(f) = &hooks.pre_finalize {
                f(ctx, store);
            }
        }
    }

    pub fn post_finalize(&self, ctx: &mut ExecContext) {
        for hooks in self.plugins.values() {
            if let Some(f) = &hooks.post_finalize {
                f(ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn unregistered_plugin_comment_is_not_claimed() {
        let registry = PluginRegistry::new();
        let mut ctx = ExecContext::new();
        let mut store = ValueStore::new();
        assert!(!registry.dispatch_comment("unknown", "body", &mut ctx, &mut store));
    }

    #[test]
    fn registered_plugin_comment_runs_its_hook() {
        let mut registry = PluginRegistry::new();
        registry.register(
            "note",
            PluginHooks {
                plugin_comment: Some(Box::new(|body, ctx, _store| ctx.warnings.push(body.to_string()))),
                ..Default::default()
            },
        );
        let mut ctx = ExecContext::new();
        let mut store = ValueStore::new();
        assert!(registry.dispatch_comment("note", "hello", &mut ctx, &mut store));
        assert_eq!(ctx.warnings, vec!["hello".to_string()]);
    }

    #[test]
    fn pre_opcode_false_from_any_plugin_skips_builtin() {
        let mut registry = PluginRegistry::new();
        registry.register(
            "override",
            PluginHooks { pre_opcode: Some(Box::new(|_ctx, _store, _op| false)), ..Default::default() },
        );
        let mut ctx = ExecContext::new();
        let mut store = ValueStore::new();
        let v = store.intern(Value::Literal(vec![1]));
        ctx.push(v, 0, 1);
        assert!(!registry.pre_opcode(&mut ctx, &mut store, &Opcode::Dup));
    }
}
