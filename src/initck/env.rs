//! Environment stack for the initialization analysis.
//!
//! The environment is a linked list of scope frames terminated by a top
//! sentinel bound to the class under analysis. Each frame owns the symbols
//! declared in its scope and tracks three orthogonal facts per symbol:
//! not-yet-initialized, partially constructed, and latent (deferred body).
//! Predicates dispatch outward to the owning frame; the sentinel answers
//! false and rejects mutation.
//!
//! Frames are shared handles (`Rc<RefCell<…>>`): latent continuations keep
//! their defining frame alive and observe updates made after indexing.
//! Branches use [`Env::deep_clone`] / [`Env::join`] to analyze both arms
//! independently and merge conservatively.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::initck::latent::LatentInfo;
use crate::sym::SymbolId;

#[derive(Clone)]
pub struct Env<'t>(Rc<RefCell<Frame<'t>>>);

enum Frame<'t> {
    Top {
        current_class: SymbolId,
    },
    Scope {
        outer: Env<'t>,
        locals: IndexSet<SymbolId>,
        non_init: IndexSet<SymbolId>,
        partial_syms: IndexSet<SymbolId>,
        lazy_forced: IndexSet<SymbolId>,
        latent_syms: IndexMap<SymbolId, LatentInfo<'t>>,
    },
}

impl<'t> Env<'t> {
    /// The top sentinel for a class analysis.
    pub fn top(current_class: SymbolId) -> Self {
        Env(Rc::new(RefCell::new(Frame::Top { current_class })))
    }

    /// Pushes a fresh empty frame whose outer scope is `self`.
    pub fn nested(&self) -> Env<'t> {
        Env(Rc::new(RefCell::new(Frame::Scope {
            outer: self.clone(),
            locals: IndexSet::new(),
            non_init: IndexSet::new(),
            partial_syms: IndexSet::new(),
            lazy_forced: IndexSet::new(),
            latent_syms: IndexMap::new(),
        })))
    }

    pub fn current_class(&self) -> SymbolId {
        let mut cur = self.clone();
        loop {
            let next = match &*cur.0.borrow() {
                Frame::Top { current_class } => return *current_class,
                Frame::Scope { outer, .. } => outer.clone(),
            };
            cur = next;
        }
    }

    /// Registers `sym` as owned by the innermost frame.
    pub fn add_local(&self, sym: SymbolId) {
        debug_assert!(!self.owns(sym), "symbol {sym} already owned by a frame");
        match &mut *self.0.borrow_mut() {
            Frame::Top { .. } => panic!("compiler bug: add_local on the top sentinel"),
            Frame::Scope { locals, .. } => {
                locals.insert(sym);
            }
        }
    }

    /// Whether any frame in the chain owns `sym`.
    pub fn owns(&self, sym: SymbolId) -> bool {
        self.lookup(sym, |_| true).unwrap_or(false)
    }

    pub fn is_not_init(&self, sym: SymbolId) -> bool {
        self.lookup(sym, |frame| frame.non_init.contains(&sym))
            .unwrap_or(false)
    }

    pub fn is_partial(&self, sym: SymbolId) -> bool {
        self.lookup(sym, |frame| frame.partial_syms.contains(&sym))
            .unwrap_or(false)
    }

    pub fn is_forced(&self, sym: SymbolId) -> bool {
        self.lookup(sym, |frame| frame.lazy_forced.contains(&sym))
            .unwrap_or(false)
    }

    pub fn is_latent(&self, sym: SymbolId) -> bool {
        self.lookup(sym, |frame| frame.latent_syms.contains_key(&sym))
            .unwrap_or(false)
    }

    pub fn latent_info(&self, sym: SymbolId) -> Option<LatentInfo<'t>> {
        self.lookup(sym, |frame| frame.latent_syms.get(&sym).cloned())
            .flatten()
    }

    pub fn set_not_init(&self, sym: SymbolId) {
        self.mutate(sym, "set_not_init", |frame| {
            frame.non_init.insert(sym);
        });
    }

    pub fn set_initialized(&self, sym: SymbolId) {
        self.mutate(sym, "set_initialized", |frame| {
            frame.non_init.shift_remove(&sym);
        });
    }

    pub fn set_partial(&self, sym: SymbolId, partial: bool) {
        self.mutate(sym, "set_partial", |frame| {
            if partial {
                frame.partial_syms.insert(sym);
            } else {
                frame.partial_syms.shift_remove(&sym);
            }
        });
    }

    pub fn set_forced(&self, sym: SymbolId) {
        self.mutate(sym, "set_forced", |frame| {
            frame.lazy_forced.insert(sym);
        });
    }

    pub fn set_latent(&self, sym: SymbolId, latent: LatentInfo<'t>) {
        self.mutate(sym, "set_latent", |frame| {
            frame.latent_syms.insert(sym, latent);
        });
    }

    /// Every frame has initialized all of its fields, and the only value
    /// still partial (if any) is the class under construction itself.
    pub fn initialized(&self) -> bool {
        let current_class = self.current_class();
        let mut cur = self.clone();
        loop {
            let next = match &*cur.0.borrow() {
                Frame::Top { .. } => return true,
                Frame::Scope {
                    outer,
                    non_init,
                    partial_syms,
                    ..
                } => {
                    let partial_ok = partial_syms.is_empty()
                        || (partial_syms.len() == 1 && partial_syms.contains(&current_class));
                    if !non_init.is_empty() || !partial_ok {
                        return false;
                    }
                    outer.clone()
                }
            };
            cur = next;
        }
    }

    /// Declares construction finished: the current class stops being partial.
    /// Only legal once [`Env::initialized`] holds.
    pub fn mark_initialized(&self) {
        if !self.initialized() {
            panic!("compiler bug: mark_initialized on a non-initialized environment");
        }
        let mut cur = self.clone();
        loop {
            let next = match &mut *cur.0.borrow_mut() {
                Frame::Top { .. } => return,
                Frame::Scope {
                    outer,
                    partial_syms,
                    ..
                } => {
                    partial_syms.clear();
                    outer.clone()
                }
            };
            cur = next;
        }
    }

    /// Independent copy of every frame up to the top sentinel, which stays
    /// shared by identity.
    pub fn deep_clone(&self) -> Env<'t> {
        match &*self.0.borrow() {
            Frame::Top { .. } => self.clone(),
            Frame::Scope {
                outer,
                locals,
                non_init,
                partial_syms,
                lazy_forced,
                latent_syms,
            } => Env(Rc::new(RefCell::new(Frame::Scope {
                outer: outer.deep_clone(),
                locals: locals.clone(),
                non_init: non_init.clone(),
                partial_syms: partial_syms.clone(),
                lazy_forced: lazy_forced.clone(),
                latent_syms: latent_syms.clone(),
            }))),
        }
    }

    /// Merges the other environment's facts into this one (set union on
    /// `non_init`, `partial_syms`, `lazy_forced`), recursively on outer
    /// frames. Both chains must end at the same top sentinel.
    pub fn join(&self, other: &Env<'t>) {
        if Rc::ptr_eq(&self.0, &other.0) {
            return;
        }
        let outers = {
            let mut mine = self.0.borrow_mut();
            let theirs = other.0.borrow();
            match (&mut *mine, &*theirs) {
                (
                    Frame::Scope {
                        outer,
                        non_init,
                        partial_syms,
                        lazy_forced,
                        ..
                    },
                    Frame::Scope {
                        outer: o_outer,
                        non_init: o_non_init,
                        partial_syms: o_partial,
                        lazy_forced: o_forced,
                        ..
                    },
                ) => {
                    non_init.extend(o_non_init.iter().copied());
                    partial_syms.extend(o_partial.iter().copied());
                    lazy_forced.extend(o_forced.iter().copied());
                    (outer.clone(), o_outer.clone())
                }
                _ => panic!(
                    "compiler bug: joining environments of different shape or top sentinel"
                ),
            }
        };
        outers.0.join(&outers.1);
    }

    /// Drops all stored continuations in this frame. Continuations capture
    /// their defining frame, so without this the `Rc` chain would cycle and
    /// frames would outlive the analysis.
    pub fn clear_latents(&self) {
        if let Frame::Scope { latent_syms, .. } = &mut *self.0.borrow_mut() {
            latent_syms.clear();
        }
    }

    fn lookup<R>(&self, sym: SymbolId, read: impl FnOnce(&ScopeView<'_, 't>) -> R) -> Option<R> {
        let mut cur = self.clone();
        loop {
            let next = {
                let frame = cur.0.borrow();
                match &*frame {
                    Frame::Top { .. } => return None,
                    Frame::Scope {
                        outer,
                        locals,
                        non_init,
                        partial_syms,
                        lazy_forced,
                        latent_syms,
                    } => {
                        if locals.contains(&sym) {
                            return Some(read(&ScopeView {
                                non_init,
                                partial_syms,
                                lazy_forced,
                                latent_syms,
                            }));
                        }
                        outer.clone()
                    }
                }
            };
            cur = next;
        }
    }

    fn mutate(&self, sym: SymbolId, op: &str, write: impl FnOnce(&mut ScopeViewMut<'_, 't>)) {
        let mut cur = self.clone();
        loop {
            let next = {
                let mut frame = cur.0.borrow_mut();
                match &mut *frame {
                    Frame::Top { .. } => {
                        panic!("compiler bug: {op} for symbol {sym} reached the top sentinel")
                    }
                    Frame::Scope {
                        outer,
                        locals,
                        non_init,
                        partial_syms,
                        lazy_forced,
                        latent_syms,
                    } => {
                        if locals.contains(&sym) {
                            write(&mut ScopeViewMut {
                                non_init,
                                partial_syms,
                                lazy_forced,
                                latent_syms,
                            });
                            return;
                        }
                        outer.clone()
                    }
                }
            };
            cur = next;
        }
    }
}

struct ScopeView<'a, 't> {
    non_init: &'a IndexSet<SymbolId>,
    partial_syms: &'a IndexSet<SymbolId>,
    lazy_forced: &'a IndexSet<SymbolId>,
    latent_syms: &'a IndexMap<SymbolId, LatentInfo<'t>>,
}

struct ScopeViewMut<'a, 't> {
    non_init: &'a mut IndexSet<SymbolId>,
    partial_syms: &'a mut IndexSet<SymbolId>,
    lazy_forced: &'a mut IndexSet<SymbolId>,
    latent_syms: &'a mut IndexMap<SymbolId, LatentInfo<'t>>,
}
