//! Symbol surface consumed by the initialization checker.
//!
//! The checker runs after name resolution and type checking, so symbols
//! arrive fully resolved: identity, owner chain, flags, annotations,
//! declared type, and source position. Class symbols additionally carry a
//! [`ClassInfo`] record (linearized parents, declarations, constructor
//! accessors) in a side table.

use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;

use crate::diag::Span;
use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Symbol flag bitset. The host resolver sets these; the checker only reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymFlags(u32);

impl SymFlags {
    pub const EMPTY: SymFlags = SymFlags(0);
    /// A `def` member (term method).
    pub const METHOD: SymFlags = SymFlags(1 << 0);
    /// A `lazy val` member.
    pub const LAZY: SymFlags = SymFlags(1 << 1);
    /// Declared without a body.
    pub const DEFERRED: SymFlags = SymFlags(1 << 2);
    /// Field backing a primary-constructor parameter.
    pub const PARAM_ACCESSOR: SymFlags = SymFlags(1 << 3);
    /// Getter/setter generated for a field.
    pub const ACCESSOR: SymFlags = SymFlags(1 << 4);
    /// Setter method (`x_=`).
    pub const SETTER: SymFlags = SymFlags(1 << 5);
    /// Synthesized getter for a default argument.
    pub const DEFAULT_GETTER: SymFlags = SymFlags(1 << 6);
    pub const FINAL: SymFlags = SymFlags(1 << 7);
    pub const PRIVATE: SymFlags = SymFlags(1 << 8);
    /// A `var` (reassignable field or local).
    pub const MUTABLE: SymFlags = SymFlags(1 << 9);
    pub const CLASS: SymFlags = SymFlags(1 << 10);

    pub fn contains(self, other: SymFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for SymFlags {
    type Output = SymFlags;

    fn bitor(self, rhs: SymFlags) -> SymFlags {
        SymFlags(self.0 | rhs.0)
    }
}

/// User annotations the checker recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// Method is safe to call during construction.
    Init,
    /// Value (field, parameter, or type) may be partially constructed.
    Partial,
    /// Suppress initialization checking for the whole class.
    Unchecked,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub owner: Option<SymbolId>,
    pub flags: SymFlags,
    pub annotations: Vec<Annotation>,
    pub ty: TypeId,
    pub span: Span,
}

/// Class-level structure used to seed the analysis environment.
#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    /// Proper parents in linearization order (the class itself excluded).
    pub base_classes: Vec<SymbolId>,
    /// Classes named by the declared self type, if any.
    pub self_type_classes: Vec<SymbolId>,
    /// Term and class members declared in the class body.
    pub decls: Vec<SymbolId>,
    /// Fields backing primary-constructor parameters, in declaration order.
    pub param_accessors: Vec<SymbolId>,
    pub primary_ctor: Option<SymbolId>,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    syms: Vec<Symbol>,
    classes: HashMap<SymbolId, ClassInfo>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(
        &mut self,
        name: impl Into<String>,
        owner: Option<SymbolId>,
        flags: SymFlags,
        annotations: Vec<Annotation>,
        ty: TypeId,
        span: Span,
    ) -> SymbolId {
        let id = SymbolId(self.syms.len() as u32);
        self.syms.push(Symbol {
            id,
            name: name.into(),
            owner,
            flags,
            annotations,
            ty,
            span,
        });
        id
    }

    pub fn sym(&self, id: SymbolId) -> &Symbol {
        self.syms
            .get(id.0 as usize)
            .unwrap_or_else(|| panic!("compiler bug: unknown symbol id {id}"))
    }

    pub fn sym_mut(&mut self, id: SymbolId) -> &mut Symbol {
        self.syms
            .get_mut(id.0 as usize)
            .unwrap_or_else(|| panic!("compiler bug: unknown symbol id {id}"))
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.sym(id).name
    }

    pub fn set_class_info(&mut self, cls: SymbolId, info: ClassInfo) {
        self.classes.insert(cls, info);
    }

    pub fn class_info(&self, cls: SymbolId) -> &ClassInfo {
        static EMPTY: ClassInfo = ClassInfo {
            base_classes: Vec::new(),
            self_type_classes: Vec::new(),
            decls: Vec::new(),
            param_accessors: Vec::new(),
            primary_ctor: None,
        };
        self.classes.get(&cls).unwrap_or(&EMPTY)
    }

    pub fn has_flag(&self, id: SymbolId, flags: SymFlags) -> bool {
        self.sym(id).flags.contains(flags)
    }

    pub fn has_annotation(&self, id: SymbolId, annot: Annotation) -> bool {
        self.sym(id).annotations.contains(&annot)
    }

    pub fn is_class(&self, id: SymbolId) -> bool {
        self.has_flag(id, SymFlags::CLASS)
    }

    /// Nearest enclosing class, starting from the symbol's owner.
    pub fn owner_class(&self, id: SymbolId) -> Option<SymbolId> {
        let mut cur = self.sym(id).owner;
        while let Some(owner) = cur {
            if self.is_class(owner) {
                return Some(owner);
            }
            cur = self.sym(owner).owner;
        }
        None
    }

    /// Whether `id`'s owner chain passes through `outer` (or is `outer`).
    pub fn is_contained_in(&self, id: SymbolId, outer: SymbolId) -> bool {
        let mut cur = Some(id);
        while let Some(sym) = cur {
            if sym == outer {
                return true;
            }
            cur = self.sym(sym).owner;
        }
        false
    }

    /// Subclass relation over the linearized parents.
    pub fn is_subclass(&self, cls: SymbolId, of: SymbolId) -> bool {
        cls == of || self.class_info(cls).base_classes.contains(&of)
    }

    /// Subclass relation extended with the declared self type: holds when the
    /// class itself, or any class its self type names, is a subclass of `of`.
    pub fn is_sub_or_self_sub(&self, cls: SymbolId, of: SymbolId) -> bool {
        if self.is_subclass(cls, of) {
            return true;
        }
        self.class_info(cls)
            .self_type_classes
            .iter()
            .any(|&st| self.is_subclass(st, of))
    }

    /// Overriding is impossible: final or private members.
    pub fn is_effectively_final(&self, id: SymbolId) -> bool {
        let flags = self.sym(id).flags;
        flags.contains(SymFlags::FINAL) || flags.contains(SymFlags::PRIVATE)
    }
}
