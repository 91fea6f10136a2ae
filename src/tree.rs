//! Typed trees consumed by the initialization checker.
//!
//! Trees arrive resolved and typed: every reference carries its symbol, and
//! constructor calls are pre-decomposed into class, constructor, outer
//! prefix, and argument lists. The checker never mutates a tree.

use std::fmt;

use crate::diag::Span;
use crate::sym::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeIdGen {
    next_id: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    pub id: NodeId,
    pub kind: TreeKind,
    pub span: Span,
}

impl Tree {
    pub fn new(id: NodeId, kind: TreeKind, span: Span) -> Self {
        Self { id, kind, span }
    }
}

#[derive(Debug, Clone)]
pub enum TreeKind {
    Literal,
    Ident(SymbolId),
    Select {
        qual: Box<Tree>,
        sym: SymbolId,
    },
    Apply {
        fun: Box<Tree>,
        args: Vec<Tree>,
    },
    /// `new prefix.C(argss…)`; `prefix` is absent when the outer instance is
    /// implicit (an in-scope class).
    New {
        cls: SymbolId,
        ctor: SymbolId,
        prefix: Option<Box<Tree>>,
        argss: Vec<Vec<Tree>>,
    },
    This(SymbolId),
    /// `super[qual].…` seen from class `cls`.
    Super {
        cls: SymbolId,
        qual: SymbolId,
    },
    If {
        cond: Box<Tree>,
        thenp: Box<Tree>,
        elsep: Box<Tree>,
    },
    Assign {
        lhs: Box<Tree>,
        rhs: Box<Tree>,
    },
    /// Type ascription; the ascribed type lives on the symbol side.
    Typed(Box<Tree>),
    Block {
        stats: Vec<Tree>,
        expr: Box<Tree>,
    },
    /// `rhs` is absent for deferred members; `wildcard` marks `val x: T = _`
    /// (explicit default initialization, the field stays unassigned).
    ValDef {
        sym: SymbolId,
        rhs: Option<Box<Tree>>,
        wildcard: bool,
    },
    DefDef {
        sym: SymbolId,
        param_lists: Vec<Vec<SymbolId>>,
        rhs: Option<Box<Tree>>,
    },
    ClassDef {
        sym: SymbolId,
        template: Template,
    },
    /// Closure lifted to a reference to its implementation method.
    Closure(SymbolId),
    Empty,
}

/// A class template: parent constructor calls and the body statements.
#[derive(Debug, Clone, Default)]
pub struct Template {
    pub parents: Vec<Tree>,
    pub body: Vec<Tree>,
}

/// Convenience constructor set for hosts (and tests) that assemble trees
/// programmatically. Spans default to [`Span::default`] and can be replaced
/// with [`Builder::at`].
#[derive(Debug, Default)]
pub struct Builder {
    ids: NodeIdGen,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    fn mk(&mut self, kind: TreeKind) -> Tree {
        Tree::new(self.ids.new_id(), kind, Span::default())
    }

    pub fn at(mut tree: Tree, span: Span) -> Tree {
        tree.span = span;
        tree
    }

    pub fn lit(&mut self) -> Tree {
        self.mk(TreeKind::Literal)
    }

    pub fn ident(&mut self, sym: SymbolId) -> Tree {
        self.mk(TreeKind::Ident(sym))
    }

    pub fn select(&mut self, qual: Tree, sym: SymbolId) -> Tree {
        self.mk(TreeKind::Select {
            qual: Box::new(qual),
            sym,
        })
    }

    pub fn apply(&mut self, fun: Tree, args: Vec<Tree>) -> Tree {
        self.mk(TreeKind::Apply {
            fun: Box::new(fun),
            args,
        })
    }

    pub fn new_instance(
        &mut self,
        cls: SymbolId,
        ctor: SymbolId,
        prefix: Option<Tree>,
        argss: Vec<Vec<Tree>>,
    ) -> Tree {
        self.mk(TreeKind::New {
            cls,
            ctor,
            prefix: prefix.map(Box::new),
            argss,
        })
    }

    pub fn this(&mut self, cls: SymbolId) -> Tree {
        self.mk(TreeKind::This(cls))
    }

    pub fn super_ref(&mut self, cls: SymbolId, qual: SymbolId) -> Tree {
        self.mk(TreeKind::Super { cls, qual })
    }

    pub fn if_then_else(&mut self, cond: Tree, thenp: Tree, elsep: Tree) -> Tree {
        self.mk(TreeKind::If {
            cond: Box::new(cond),
            thenp: Box::new(thenp),
            elsep: Box::new(elsep),
        })
    }

    pub fn assign(&mut self, lhs: Tree, rhs: Tree) -> Tree {
        self.mk(TreeKind::Assign {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn typed(&mut self, expr: Tree) -> Tree {
        self.mk(TreeKind::Typed(Box::new(expr)))
    }

    pub fn block(&mut self, stats: Vec<Tree>, expr: Tree) -> Tree {
        self.mk(TreeKind::Block {
            stats,
            expr: Box::new(expr),
        })
    }

    pub fn val_def(&mut self, sym: SymbolId, rhs: Tree) -> Tree {
        self.mk(TreeKind::ValDef {
            sym,
            rhs: Some(Box::new(rhs)),
            wildcard: false,
        })
    }

    pub fn val_decl(&mut self, sym: SymbolId) -> Tree {
        self.mk(TreeKind::ValDef {
            sym,
            rhs: None,
            wildcard: false,
        })
    }

    pub fn val_wildcard(&mut self, sym: SymbolId, rhs: Tree) -> Tree {
        self.mk(TreeKind::ValDef {
            sym,
            rhs: Some(Box::new(rhs)),
            wildcard: true,
        })
    }

    pub fn def_def(
        &mut self,
        sym: SymbolId,
        param_lists: Vec<Vec<SymbolId>>,
        rhs: Option<Tree>,
    ) -> Tree {
        self.mk(TreeKind::DefDef {
            sym,
            param_lists,
            rhs: rhs.map(Box::new),
        })
    }

    pub fn class_def(&mut self, sym: SymbolId, template: Template) -> Tree {
        self.mk(TreeKind::ClassDef { sym, template })
    }

    pub fn closure(&mut self, meth: SymbolId) -> Tree {
        self.mk(TreeKind::Closure(meth))
    }

    pub fn empty(&mut self) -> Tree {
        self.mk(TreeKind::Empty)
    }
}
