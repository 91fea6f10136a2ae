//! Initialization-safety analysis for class templates.
//!
//! The checker analyzes one class body as if it were being constructed:
//! which fields are definitely initialized at each point, which values are
//! only partially constructed, and which calls may reach code that observes
//! a partially-built object. Violations become warnings; nothing aborts.

mod checker;
mod effect;
mod env;
mod latent;

pub use effect::{Effect, Res, ValueInfo, Warning};
pub use env::Env;
pub use latent::LatentInfo;

use checker::Analyzer;

use crate::sym::{Annotation, SymFlags, SymbolId, SymbolTable};
use crate::tree::Template;
use crate::types::TypeTable;

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckConfig {
    /// Print analysis events to stderr.
    pub trace: bool,
}

/// Everything the analyzer needs from the host: resolved symbols, interned
/// types, and configuration.
pub struct CheckContext<'a> {
    pub syms: &'a SymbolTable,
    pub types: &'a TypeTable,
    pub config: CheckConfig,
}

impl<'a> CheckContext<'a> {
    pub fn new(syms: &'a SymbolTable, types: &'a TypeTable) -> Self {
        Self {
            syms,
            types,
            config: CheckConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CheckConfig) -> Self {
        self.config = config;
        self
    }
}

/// The outcome of checking one class template: the raw effect trees in
/// discovery order, and their rendering as flat warnings (children before
/// their wrapping summary).
#[derive(Debug, Clone, Default)]
pub struct CheckOutput {
    pub effects: Vec<Effect>,
    pub warnings: Vec<Warning>,
}

impl CheckOutput {
    pub fn is_clean(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Checks the template of class `cls`. The template is read-only; all
/// findings come back in the returned [`CheckOutput`].
pub fn check_class(ctx: &CheckContext<'_>, cls: SymbolId, template: &Template) -> CheckOutput {
    let syms = ctx.syms;
    if syms.has_annotation(cls, Annotation::Unchecked) {
        return CheckOutput::default();
    }

    let info = syms.class_info(cls);

    // Values known partial at entry: partial-typed constructor accessors,
    // partial-typed concrete fields inherited from proper parents, and the
    // class under construction itself.
    let mut partial: Vec<SymbolId> = info
        .param_accessors
        .iter()
        .copied()
        .filter(|&acc| !syms.has_flag(acc, SymFlags::SETTER))
        .filter(|&acc| ctx.types.is_partial(syms.sym(acc).ty))
        .collect();
    for &parent in &info.base_classes {
        for &decl in &syms.class_info(parent).decls {
            let flags = syms.sym(decl).flags;
            if !flags.contains(SymFlags::DEFERRED)
                && !flags.contains(SymFlags::CLASS)
                && ctx.types.is_partial(syms.sym(decl).ty)
            {
                partial.push(decl);
            }
        }
    }
    partial.push(cls);

    // Fields that must be assigned by the body before use.
    let non_init: Vec<SymbolId> = info
        .decls
        .iter()
        .copied()
        .filter(|&decl| {
            let flags = syms.sym(decl).flags;
            !flags.contains(SymFlags::LAZY)
                && !flags.contains(SymFlags::DEFERRED)
                && !flags.contains(SymFlags::PARAM_ACCESSOR)
                && !flags.contains(SymFlags::METHOD)
                && !flags.contains(SymFlags::CLASS)
        })
        .collect();

    let top = Env::top(cls);
    let mut analyzer = Analyzer::new(ctx);
    let env = analyzer.nested_frame(&top);
    for &sym in &non_init {
        env.add_local(sym);
        env.set_not_init(sym);
    }
    for &sym in &partial {
        if !env.owns(sym) {
            env.add_local(sym);
        }
        env.set_partial(sym, true);
    }

    analyzer.trace(|| format!("checking template of `{}`", syms.name(cls)));
    analyzer.index_stats(&env, &template.body);
    let parents_res = analyzer.check_stats(&env, &template.parents);
    let body_res = analyzer.check_stats(&env, &template.body);
    analyzer.release_frames();

    let mut effects = parents_res.effects;
    effects.extend(body_res.effects);

    let mut warnings = Vec::new();
    for effect in &effects {
        effect.report_into(&mut warnings);
    }
    CheckOutput { effects, warnings }
}

#[cfg(test)]
#[path = "../tests/t_env.rs"]
mod t_env;

#[cfg(test)]
#[path = "../tests/t_effect.rs"]
mod t_effect;

#[cfg(test)]
#[path = "../tests/t_initck.rs"]
mod t_initck;

#[cfg(test)]
#[path = "../tests/t_report.rs"]
mod t_report;
