//! Stored continuations for deferred analysis.
//!
//! A latent value stands for work the analyzer performs only when the value
//! is applied, forced, or instantiated: a method body, a lazy-val thunk, or
//! a nested class body. Each variant captures the frame it was indexed in;
//! the frame is a live handle, so initialization progress made between
//! indexing and the eventual force is visible to the body check.

use std::fmt;

use crate::initck::env::Env;
use crate::sym::SymbolId;
use crate::tree::{Template, Tree};

#[derive(Clone)]
pub enum LatentInfo<'t> {
    /// A method body; only the final parameter list is modelled.
    Method {
        sym: SymbolId,
        param_lists: &'t [Vec<SymbolId>],
        body: Option<&'t Tree>,
        env: Env<'t>,
    },
    /// A lazy-val thunk, evaluated under its defining frame.
    LazyVal {
        sym: SymbolId,
        rhs: &'t Tree,
        env: Env<'t>,
    },
    /// A nested class body, evaluated in a fresh child frame.
    Class {
        sym: SymbolId,
        template: &'t Template,
        env: Env<'t>,
    },
    /// Join of two latents from merged control flow; forcing forces both
    /// and joins the results.
    Joined(Box<LatentInfo<'t>>, Box<LatentInfo<'t>>),
}

impl<'t> LatentInfo<'t> {
    /// The symbol guarding re-entry for this latent, if it has one.
    pub fn guard_sym(&self) -> Option<SymbolId> {
        match self {
            LatentInfo::Method { sym, .. }
            | LatentInfo::LazyVal { sym, .. }
            | LatentInfo::Class { sym, .. } => Some(*sym),
            LatentInfo::Joined(..) => None,
        }
    }
}

impl fmt::Debug for LatentInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatentInfo::Method { sym, .. } => write!(f, "Method({sym})"),
            LatentInfo::LazyVal { sym, .. } => write!(f, "LazyVal({sym})"),
            LatentInfo::Class { sym, .. } => write!(f, "Class({sym})"),
            LatentInfo::Joined(a, b) => write!(f, "Joined({a:?}, {b:?})"),
        }
    }
}
