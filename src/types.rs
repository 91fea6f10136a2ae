//! Type surface consumed by the initialization checker.
//!
//! Types are interned in a [`TypeTable`] and referenced by [`TypeId`]. The
//! checker only needs a handful of queries: whether a type carries the
//! `@partial` annotation, the parameter lists of a method type, and whether
//! a member is a by-name/parameterless computation.

use std::fmt;

use crate::sym::{Annotation, SymbolId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// Reference to a class.
    Named(SymbolId),
    /// Method type; one entry per parameter list.
    Method {
        param_lists: Vec<Vec<TypeId>>,
        result: TypeId,
    },
    /// Parameterless computation (`=> T`).
    ByName(TypeId),
    /// Annotated type wrapper.
    Annotated {
        underlying: TypeId,
        annot: Annotation,
    },
    Unit,
}

#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: Vec<Type>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        self.types
            .get(id.0 as usize)
            .unwrap_or_else(|| panic!("compiler bug: unknown type id {id}"))
    }

    /// Strips `Annotated` wrappers down to the underlying type.
    pub fn skip_annots(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Annotated { underlying, .. } => self.skip_annots(*underlying),
            _ => id,
        }
    }

    /// Whether the type carries `@partial` on any annotation layer.
    pub fn is_partial(&self, id: TypeId) -> bool {
        match self.get(id) {
            Type::Annotated { underlying, annot } => {
                *annot == Annotation::Partial || self.is_partial(*underlying)
            }
            _ => false,
        }
    }

    pub fn is_by_name(&self, id: TypeId) -> bool {
        matches!(self.get(self.skip_annots(id)), Type::ByName(_))
    }

    /// The final parameter list of a method type, if there is one.
    pub fn final_param_list(&self, id: TypeId) -> Option<&[TypeId]> {
        match self.get(self.skip_annots(id)) {
            Type::Method { param_lists, .. } => param_lists.last().map(Vec::as_slice),
            _ => None,
        }
    }

    /// All parameter lists of a method type, flattened in order.
    pub fn flat_params(&self, id: TypeId) -> Vec<TypeId> {
        match self.get(self.skip_annots(id)) {
            Type::Method { param_lists, .. } => param_lists.iter().flatten().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// A member is parameterless when its type takes no term arguments:
    /// a by-name computation, a plain value type, or a method type whose
    /// final list is empty.
    pub fn is_parameterless(&self, id: TypeId) -> bool {
        if self.is_by_name(id) {
            return true;
        }
        match self.get(self.skip_annots(id)) {
            Type::Method { param_lists, .. } => param_lists.last().is_none_or(Vec::is_empty),
            _ => true,
        }
    }
}
