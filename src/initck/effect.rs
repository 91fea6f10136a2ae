//! Effects, value knowledge, and per-expression results.
//!
//! Every detected violation is an [`Effect`] appended to a [`Res`]; nothing
//! aborts the analysis. Effects that arise inside a nested body (a call, a
//! forced lazy val, an applied function value, an instantiated inner class)
//! carry their sub-effects, forming an owning tree that is rendered
//! child-before-parent so the root cause appears next to its consequence.

use thiserror::Error;

use crate::diag::Span;
use crate::initck::latent::LatentInfo;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Effect {
    #[error("access of uninitialized value `{0}`")]
    Uninit(String, Span),

    #[error("call to overridable method `{0}` during initialization; mark it `@init` or final")]
    OverrideRisk(String, Span),

    #[error("use of abstract member `{0}` not annotated `@init`")]
    UseAbstractDef(String, Span),

    #[error("selection of `{0}` on a partially initialized value")]
    Member(String, Span),

    #[error("assignment of a partially initialized value to `{0}`")]
    CrossAssign(String, Span),

    #[error("partially initialized value passed to `{0}` where a full value is expected")]
    Argument(String, Span),

    #[error("cannot construct `{1}` here: its outer `{0}` is partially initialized")]
    PartialNew(String, String, Span),

    #[error("call to `{0}` is unsafe during initialization")]
    Call(String, Vec<Effect>, Span),

    #[error("forcing lazy value `{0}` is unsafe during initialization")]
    Force(String, Vec<Effect>, Span),

    #[error("applying this function value is unsafe during initialization")]
    Latent(Vec<Effect>, Span),

    #[error("instantiating inner class `{0}` is unsafe during initialization")]
    Instantiate(String, Vec<Effect>, Span),

    #[error("recursive creation of `{0}` inside its own constructor")]
    RecCreate(String, Span),
}

impl Effect {
    pub fn span(&self) -> Span {
        match self {
            Effect::Uninit(_, span) => *span,
            Effect::OverrideRisk(_, span) => *span,
            Effect::UseAbstractDef(_, span) => *span,
            Effect::Member(_, span) => *span,
            Effect::CrossAssign(_, span) => *span,
            Effect::Argument(_, span) => *span,
            Effect::PartialNew(_, _, span) => *span,
            Effect::Call(_, _, span) => *span,
            Effect::Force(_, _, span) => *span,
            Effect::Latent(_, span) => *span,
            Effect::Instantiate(_, _, span) => *span,
            Effect::RecCreate(_, span) => *span,
        }
    }

    fn sub_effects(&self) -> &[Effect] {
        match self {
            Effect::Call(_, subs, _)
            | Effect::Force(_, subs, _)
            | Effect::Latent(subs, _)
            | Effect::Instantiate(_, subs, _) => subs,
            _ => &[],
        }
    }

    /// Flattens this effect tree into warnings, children before their
    /// wrapping summary.
    pub fn report_into(&self, out: &mut Vec<Warning>) {
        for sub in self.sub_effects() {
            sub.report_into(out);
        }
        out.push(Warning {
            span: self.span(),
            message: self.to_string(),
        });
    }
}

/// A rendered diagnostic ready for the host's reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub span: Span,
    pub message: String,
}

/// What is known about a value: whether it is partially constructed, and
/// whether it is latent (carries a deferred body).
#[derive(Debug, Clone, Default)]
pub struct ValueInfo<'t> {
    pub partial: bool,
    pub latent: Option<LatentInfo<'t>>,
}

impl<'t> ValueInfo<'t> {
    pub fn partial(partial: bool) -> Self {
        ValueInfo {
            partial,
            latent: None,
        }
    }

    pub fn join(self, other: ValueInfo<'t>) -> ValueInfo<'t> {
        let latent = match (self.latent, other.latent) {
            (Some(a), Some(b)) => Some(LatentInfo::Joined(Box::new(a), Box::new(b))),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        ValueInfo {
            partial: self.partial || other.partial,
            latent,
        }
    }
}

/// Accumulated effects plus the value knowledge of one subexpression.
#[derive(Debug, Clone, Default)]
pub struct Res<'t> {
    pub effects: Vec<Effect>,
    pub value: ValueInfo<'t>,
}

impl<'t> Res<'t> {
    pub fn with_value(value: ValueInfo<'t>) -> Self {
        Res {
            effects: Vec::new(),
            value,
        }
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Concatenates effects and joins value knowledge elementwise.
    pub fn join(mut self, other: Res<'t>) -> Res<'t> {
        self.effects.extend(other.effects);
        Res {
            effects: self.effects,
            value: self.value.join(other.value),
        }
    }
}
