//! Tree dispatcher and per-construct checks.
//!
//! The analyzer walks a class template top-down: an indexing pass registers
//! every member definition with its latent continuation, then the main pass
//! walks statements in source order, updating the environment and returning
//! a [`Res`] per subexpression. Branches clone the environment, analyze each
//! arm independently, and join conservatively. A recursion set guards every
//! latent invocation so cyclic call graphs terminate.

use std::collections::HashSet;

use crate::initck::CheckContext;
use crate::initck::effect::{Effect, Res, ValueInfo};
use crate::initck::env::Env;
use crate::initck::latent::LatentInfo;
use crate::sym::{Annotation, SymFlags, SymbolId};
use crate::tree::{Template, Tree, TreeKind};
use crate::types::TypeId;

pub(super) struct Analyzer<'t, 'c> {
    ctx: &'c CheckContext<'c>,
    /// Symbols whose latent is currently being analyzed; re-entry
    /// short-circuits to a neutral result.
    checking: HashSet<SymbolId>,
    /// Every frame this analyzer created. Latents stored in a frame capture
    /// the frame itself, so the maps are cleared when the analysis ends to
    /// break the reference cycles.
    frames: Vec<Env<'t>>,
}

impl<'t, 'c> Analyzer<'t, 'c> {
    pub(super) fn new(ctx: &'c CheckContext<'c>) -> Self {
        Self {
            ctx,
            checking: HashSet::new(),
            frames: Vec::new(),
        }
    }

    pub(super) fn nested_frame(&mut self, env: &Env<'t>) -> Env<'t> {
        let frame = env.nested();
        self.frames.push(frame.clone());
        frame
    }

    pub(super) fn release_frames(&mut self) {
        for frame in self.frames.drain(..) {
            frame.clear_latents();
        }
    }

    pub(super) fn trace(&self, msg: impl FnOnce() -> String) {
        if self.ctx.config.trace {
            eprintln!("[initck] {}", msg());
        }
    }

    fn name(&self, sym: SymbolId) -> String {
        self.ctx.syms.name(sym).to_string()
    }

    fn flags(&self, sym: SymbolId) -> SymFlags {
        self.ctx.syms.sym(sym).flags
    }

    // --- Indexing pass ---

    /// Registers every member definition in `stats` with the frame: methods,
    /// lazy vals, and nested classes get latent continuations capturing the
    /// frame; other member definitions become plain locals.
    pub(super) fn index_stats(&mut self, env: &Env<'t>, stats: &'t [Tree]) {
        for stat in stats {
            match &stat.kind {
                TreeKind::DefDef {
                    sym,
                    param_lists,
                    rhs,
                } if !self.flags(*sym).contains(SymFlags::ACCESSOR) => {
                    if !env.owns(*sym) {
                        env.add_local(*sym);
                    }
                    env.set_latent(
                        *sym,
                        LatentInfo::Method {
                            sym: *sym,
                            param_lists,
                            body: rhs.as_deref(),
                            env: env.clone(),
                        },
                    );
                }
                TreeKind::ValDef {
                    sym,
                    rhs: Some(rhs),
                    ..
                } if self.flags(*sym).contains(SymFlags::LAZY) => {
                    if !env.owns(*sym) {
                        env.add_local(*sym);
                    }
                    env.set_latent(
                        *sym,
                        LatentInfo::LazyVal {
                            sym: *sym,
                            rhs,
                            env: env.clone(),
                        },
                    );
                }
                TreeKind::ClassDef { sym, template } => {
                    if !env.owns(*sym) {
                        env.add_local(*sym);
                    }
                    env.set_latent(
                        *sym,
                        LatentInfo::Class {
                            sym: *sym,
                            template,
                            env: env.clone(),
                        },
                    );
                }
                TreeKind::ValDef { sym, .. } | TreeKind::DefDef { sym, .. } => {
                    if !env.owns(*sym) {
                        env.add_local(*sym);
                    }
                }
                _ => {}
            }
        }
    }

    // --- Statement and expression walks ---

    /// Folds left across statements, keeping effects and dropping values.
    pub(super) fn check_stats(&mut self, env: &Env<'t>, stats: &'t [Tree]) -> Res<'t> {
        let mut effects = Vec::new();
        for stat in stats {
            let res = self.check(env, stat);
            effects.extend(res.effects);
        }
        Res {
            effects,
            value: ValueInfo::default(),
        }
    }

    pub(super) fn check(&mut self, env: &Env<'t>, tree: &'t Tree) -> Res<'t> {
        match &tree.kind {
            TreeKind::Literal | TreeKind::Empty => Res::default(),
            TreeKind::Closure(meth) => Res::with_value(ValueInfo {
                partial: false,
                latent: env.latent_info(*meth),
            }),
            TreeKind::Ident(sym) => self.check_term_ref(env, tree, *sym),
            TreeKind::Select { qual, sym } => {
                if self.is_lexical_prefix(env, qual) {
                    self.check_term_ref(env, tree, *sym)
                } else {
                    self.check_select(env, tree, qual, *sym)
                }
            }
            TreeKind::Apply { fun, args } => self.check_apply(env, tree, fun, args),
            TreeKind::New {
                cls,
                ctor,
                prefix,
                argss,
            } => self.check_new(env, tree, *cls, *ctor, prefix.as_deref(), argss),
            TreeKind::This(cls) => Res::with_value(ValueInfo::partial(env.is_partial(*cls))),
            TreeKind::Super { qual, .. } => {
                Res::with_value(ValueInfo::partial(env.is_partial(*qual)))
            }
            TreeKind::If { cond, thenp, elsep } => self.check_if(env, cond, thenp, elsep),
            TreeKind::Assign { lhs, rhs } => self.check_assign(env, lhs, rhs),
            TreeKind::Typed(expr) => self.check(env, expr),
            TreeKind::Block { stats, expr } => self.check_block(env, stats, expr),
            // A lazy val's rhs is deferred behind its latent; only plain
            // value definitions execute here.
            TreeKind::ValDef { sym, .. } if self.flags(*sym).contains(SymFlags::LAZY) => {
                Res::default()
            }
            TreeKind::ValDef {
                sym,
                rhs,
                wildcard,
            } => self.check_val_def(env, *sym, rhs.as_deref(), *wildcard),
            // Member definitions were handled by the indexing pass.
            TreeKind::DefDef { .. } | TreeKind::ClassDef { .. } => Res::default(),
        }
    }

    /// `this.x` and `super[Q].x` resolve within the current class's scope.
    fn is_lexical_prefix(&self, env: &Env<'t>, qual: &Tree) -> bool {
        match &qual.kind {
            TreeKind::This(cls) => *cls == env.current_class(),
            TreeKind::Super { .. } => true,
            _ => false,
        }
    }

    // --- References ---

    fn check_term_ref(&mut self, env: &Env<'t>, tree: &'t Tree, sym: SymbolId) -> Res<'t> {
        let syms = self.ctx.syms;
        let current = env.current_class();
        // A bare reference to an inherited member the environment tracks is
        // `this.x` sugar, so it counts as lexical too.
        let lexical = match &tree.kind {
            TreeKind::Select { .. } => true,
            _ => syms.is_contained_in(sym, current) || env.owns(sym),
        };

        if !lexical {
            // Reference through an implicit outer prefix.
            let mut res = Res::default();
            let prefix_partial = syms
                .owner_class(sym)
                .is_some_and(|owner| env.is_partial(owner));
            if prefix_partial && !self.is_safe_virtual_access(env, sym) {
                res.add(Effect::Member(self.name(sym), tree.span));
            }
            return res;
        }

        let mut res = Res::default();
        if env.is_not_init(sym) {
            res.add(Effect::Uninit(self.name(sym), tree.span));
        }

        let flags = self.flags(sym);
        if flags.contains(SymFlags::LAZY) {
            let forced = self.check_force(env, sym, tree);
            res.effects.extend(forced.effects);
            res.value = forced.value;
            return res;
        }

        if flags.contains(SymFlags::METHOD) {
            if !syms.has_annotation(sym, Annotation::Init)
                && !syms.is_effectively_final(sym)
                && !flags.contains(SymFlags::DEFAULT_GETTER)
            {
                res.add(Effect::OverrideRisk(self.name(sym), tree.span));
            }
            if self.ctx.types.is_parameterless(syms.sym(sym).ty) {
                if let Some(latent) = env.latent_info(sym) {
                    let Res { effects, value } = self.force(&latent, &[]);
                    if !effects.is_empty() {
                        res.add(Effect::Call(self.name(sym), effects, tree.span));
                    }
                    res.value = value;
                }
            } else {
                res.value = ValueInfo {
                    partial: false,
                    latent: env.latent_info(sym),
                };
            }
            return res;
        }

        if flags.contains(SymFlags::DEFERRED)
            && !syms.has_annotation(sym, Annotation::Init)
            && syms.sym(sym).owner == Some(current)
        {
            res.add(Effect::UseAbstractDef(self.name(sym), tree.span));
            return res;
        }

        res.value = ValueInfo {
            partial: env.is_partial(sym),
            latent: env.latent_info(sym),
        };
        res
    }

    fn check_select(
        &mut self,
        env: &Env<'t>,
        tree: &'t Tree,
        qual: &'t Tree,
        sym: SymbolId,
    ) -> Res<'t> {
        let q = self.check(env, qual);
        let mut res = Res {
            effects: q.effects,
            value: ValueInfo::partial(q.value.partial),
        };
        if q.value.partial {
            res.add(Effect::Member(self.name(sym), tree.span));
        }
        res
    }

    // --- Lazy values ---

    fn check_force(&mut self, env: &Env<'t>, sym: SymbolId, tree: &'t Tree) -> Res<'t> {
        if env.is_forced(sym) {
            return Res::with_value(ValueInfo {
                partial: env.is_partial(sym),
                latent: env.latent_info(sym),
            });
        }
        if env.owns(sym) {
            env.set_forced(sym);
        }
        let Some(latent) = env.latent_info(sym) else {
            return Res::default();
        };
        let body = self.force(&latent, &[]);
        if env.owns(sym) {
            env.set_partial(sym, body.value.partial);
            if let Some(l) = &body.value.latent {
                env.set_latent(sym, l.clone());
            }
        }
        let Res { effects, value } = body;
        let mut res = Res::with_value(value);
        if !effects.is_empty() {
            res.add(Effect::Force(self.name(sym), effects, tree.span));
        }
        res
    }

    // --- Calls ---

    /// Checks an argument list against the callee's declared parameters.
    /// Returns the collected effects, whether the call produces a partial
    /// value, and the per-argument value knowledge for latent invocation.
    fn check_params(
        &mut self,
        env: &Env<'t>,
        fun_name: &str,
        param_tys: &[TypeId],
        args: &[&'t Tree],
        force: bool,
    ) -> (Vec<Effect>, bool, Vec<ValueInfo<'t>>) {
        let mut effects = Vec::new();
        let mut partial_call = false;
        let mut infos = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let res = self.check(env, arg);
            effects.extend(res.effects);
            let declared_partial = param_tys
                .get(i)
                .is_some_and(|&ty| self.ctx.types.is_partial(ty));
            if force && let Some(latent) = &res.value.latent {
                let forced = self.force(latent, &[]);
                if !forced.effects.is_empty() {
                    partial_call = true;
                    if !declared_partial {
                        effects.push(Effect::Latent(forced.effects, arg.span));
                    }
                }
            }
            if res.value.partial && !declared_partial {
                effects.push(Effect::Argument(fun_name.to_string(), arg.span));
            }
            infos.push(res.value);
        }
        (effects, partial_call, infos)
    }

    fn check_apply(
        &mut self,
        env: &Env<'t>,
        tree: &'t Tree,
        fun: &'t Tree,
        args: &'t [Tree],
    ) -> Res<'t> {
        let fun_res = self.check(env, fun);
        let fun_sym = Self::callee_sym(fun);
        let fun_name = match fun_sym {
            Some(sym) => self.name(sym),
            None => "<function>".to_string(),
        };
        let param_tys: Vec<TypeId> = fun_sym
            .map(|sym| {
                self.ctx
                    .types
                    .final_param_list(self.ctx.syms.sym(sym).ty)
                    .unwrap_or(&[])
                    .to_vec()
            })
            .unwrap_or_default();

        // When the callee is latent its body is analyzed with the argument
        // knowledge below; otherwise argument latents are forced here.
        let force_args = fun_res.value.latent.is_none();
        let arg_refs: Vec<&'t Tree> = args.iter().collect();
        let (param_effects, partial_call, infos) =
            self.check_params(env, &fun_name, &param_tys, &arg_refs, force_args);

        let mut res = Res {
            effects: fun_res.effects,
            value: ValueInfo::default(),
        };
        res.effects.extend(param_effects);
        if let Some(latent) = fun_res.value.latent {
            let Res { effects, value } = self.force(&latent, &infos);
            if !effects.is_empty() {
                res.add(Effect::Latent(effects, tree.span));
            }
            res.value = value;
            res.value.partial |= partial_call;
        } else {
            res.value = ValueInfo::partial(partial_call);
        }
        res
    }

    fn callee_sym(fun: &Tree) -> Option<SymbolId> {
        match &fun.kind {
            TreeKind::Ident(sym) => Some(*sym),
            TreeKind::Select { sym, .. } => Some(*sym),
            TreeKind::Typed(inner) => Self::callee_sym(inner),
            TreeKind::Apply { fun, .. } => Self::callee_sym(fun),
            _ => None,
        }
    }

    // --- Instantiation ---

    fn check_new(
        &mut self,
        env: &Env<'t>,
        tree: &'t Tree,
        cls: SymbolId,
        ctor: SymbolId,
        prefix: Option<&'t Tree>,
        argss: &'t [Vec<Tree>],
    ) -> Res<'t> {
        let syms = self.ctx.syms;
        let current = env.current_class();

        let param_tys = self.ctx.types.flat_params(syms.sym(ctor).ty);
        let args: Vec<&'t Tree> = argss.iter().flatten().collect();
        let (mut effects, _, _) =
            self.check_params(env, &self.name(cls), &param_tys, &args, true);

        if cls == current {
            effects.push(Effect::RecCreate(self.name(cls), tree.span));
            return Res {
                effects,
                value: ValueInfo::default(),
            };
        }

        let prefix_partial = match prefix {
            Some(p) => {
                let r = self.check(env, p);
                effects.extend(r.effects);
                r.value.partial
            }
            None => syms
                .owner_class(cls)
                .is_some_and(|owner| env.is_partial(owner)),
        };

        // Constructing on a fully-built outer is safe.
        if !prefix_partial || self.is_safe_virtual_access(env, cls) {
            return Res {
                effects,
                value: ValueInfo::default(),
            };
        }

        if !syms.is_contained_in(cls, current) {
            let outer = syms
                .owner_class(cls)
                .map(|owner| self.name(owner))
                .unwrap_or_else(|| "this".to_string());
            effects.push(Effect::PartialNew(outer, self.name(cls), tree.span));
            return Res {
                effects,
                value: ValueInfo::default(),
            };
        }

        // In-scope inner class of a partial outer: its body runs now.
        if let Some(latent) = env.latent_info(cls) {
            let body = self.force(&latent, &[]);
            if !body.effects.is_empty() {
                effects.push(Effect::Instantiate(self.name(cls), body.effects, tree.span));
            }
        }
        Res {
            effects,
            value: ValueInfo::partial(true),
        }
    }

    // --- Control flow ---

    fn check_if(
        &mut self,
        env: &Env<'t>,
        cond: &'t Tree,
        thenp: &'t Tree,
        elsep: &'t Tree,
    ) -> Res<'t> {
        let cond_res = self.check(env, cond);
        let cloned = env.deep_clone();
        let then_res = self.check(env, thenp);
        let else_res = self.check(&cloned, elsep);
        env.join(&cloned);
        let joined = then_res.join(else_res);
        let mut effects = cond_res.effects;
        effects.extend(joined.effects);
        Res {
            effects,
            value: joined.value,
        }
    }

    fn check_block(&mut self, env: &Env<'t>, stats: &'t [Tree], expr: &'t Tree) -> Res<'t> {
        let frame = self.nested_frame(env);
        self.index_stats(&frame, stats);
        let mut res = self.check_stats(&frame, stats);
        let tail = self.check(&frame, expr);
        res.effects.extend(tail.effects);
        Res {
            effects: res.effects,
            value: tail.value,
        }
    }

    // --- Definitions and assignment ---

    fn check_val_def(
        &mut self,
        env: &Env<'t>,
        sym: SymbolId,
        rhs: Option<&'t Tree>,
        wildcard: bool,
    ) -> Res<'t> {
        let mut effects = Vec::new();
        if let Some(rhs) = rhs {
            let res = self.check(env, rhs);
            effects = res.effects;
            if !wildcard && env.owns(sym) {
                env.set_initialized(sym);
                if res.value.partial {
                    if env.initialized() {
                        // The last field just got its value: construction is
                        // complete and the self reference stops being partial.
                        env.mark_initialized();
                    } else {
                        env.set_partial(sym, true);
                    }
                }
                if let Some(latent) = &res.value.latent {
                    env.set_latent(sym, latent.clone());
                }
            }
        }
        Res {
            effects,
            value: ValueInfo::default(),
        }
    }

    fn check_assign(&mut self, env: &Env<'t>, lhs: &'t Tree, rhs: &'t Tree) -> Res<'t> {
        let rhs_res = self.check(env, rhs);
        let rhs_partial = rhs_res.value.partial;
        let mut effects = rhs_res.effects;

        if let Some(sym) = Self::local_assign_target(env, lhs) {
            if env.owns(sym) {
                if !rhs_partial || env.is_partial(sym) || env.is_not_init(sym) {
                    if env.is_not_init(sym) {
                        env.set_initialized(sym);
                    }
                    env.set_partial(sym, rhs_partial);
                } else {
                    effects.push(Effect::CrossAssign(self.name(sym), rhs.span));
                }
            } else {
                // Untracked lexical slot (inherited field): fall back to the
                // implicit-prefix rule.
                let prefix_partial = self
                    .ctx
                    .syms
                    .owner_class(sym)
                    .is_some_and(|owner| env.is_partial(owner));
                if rhs_partial && !prefix_partial {
                    effects.push(Effect::CrossAssign(self.name(sym), rhs.span));
                }
            }
        } else if let TreeKind::Select { qual, sym } = &lhs.kind {
            let q = self.check(env, qual);
            effects.extend(q.effects);
            if rhs_partial && !q.value.partial {
                effects.push(Effect::CrossAssign(self.name(*sym), rhs.span));
            }
        } else {
            let r = self.check(env, lhs);
            effects.extend(r.effects);
        }

        Res {
            effects,
            value: ValueInfo::default(),
        }
    }

    fn local_assign_target(env: &Env<'t>, lhs: &Tree) -> Option<SymbolId> {
        match &lhs.kind {
            TreeKind::Ident(sym) => Some(*sym),
            TreeKind::Select { qual, sym } => match &qual.kind {
                TreeKind::This(cls) if *cls == env.current_class() => Some(*sym),
                _ => None,
            },
            _ => None,
        }
    }

    // --- Latent invocation ---

    /// Invokes a stored continuation with caller-side argument knowledge.
    /// Re-entry on a symbol already being checked short-circuits to a
    /// neutral result, which bounds recursion to one entry per symbol per
    /// path.
    pub(super) fn force(&mut self, latent: &LatentInfo<'t>, args: &[ValueInfo<'t>]) -> Res<'t> {
        let guard = latent.guard_sym();
        if let Some(sym) = guard
            && !self.checking.insert(sym)
        {
            self.trace(|| {
                format!(
                    "skipping re-entry of `{}` while its body is being checked",
                    self.ctx.syms.name(sym)
                )
            });
            return Res::default();
        }

        let res = match latent {
            LatentInfo::Method {
                sym,
                param_lists,
                body,
                env,
            } => self.force_method(*sym, *param_lists, *body, env, args),
            LatentInfo::LazyVal { rhs, env, .. } => self.check(env, rhs),
            LatentInfo::Class { template, env, .. } => self.force_class(template, env),
            LatentInfo::Joined(a, b) => {
                let ra = self.force(a, args);
                let rb = self.force(b, args);
                ra.join(rb)
            }
        };

        if let Some(sym) = guard {
            self.checking.remove(&sym);
        }
        res
    }

    fn force_method(
        &mut self,
        _sym: SymbolId,
        param_lists: &'t [Vec<SymbolId>],
        body: Option<&'t Tree>,
        env: &Env<'t>,
        args: &[ValueInfo<'t>],
    ) -> Res<'t> {
        let frame = self.nested_frame(env);
        // TODO: propagate argument knowledge through earlier parameter lists
        // of curried methods; only the final list is modelled.
        if let Some(params) = param_lists.last() {
            for (i, &param) in params.iter().enumerate() {
                frame.add_local(param);
                let supplied = args.get(i).cloned().unwrap_or_default();
                let declared_partial = self.ctx.types.is_partial(self.ctx.syms.sym(param).ty);
                if supplied.partial || declared_partial {
                    frame.set_partial(param, true);
                }
                if let Some(latent) = supplied.latent {
                    frame.set_latent(param, latent);
                }
            }
        }
        match body {
            Some(body) => self.check(&frame, body),
            None => Res::default(),
        }
    }

    fn force_class(&mut self, template: &'t Template, env: &Env<'t>) -> Res<'t> {
        let frame = self.nested_frame(env);
        self.index_stats(&frame, &template.body);
        let res = self.check_stats(&frame, &template.body);
        Res {
            effects: res.effects,
            value: ValueInfo::default(),
        }
    }

    // --- Safe virtual access ---

    /// A selection on a partial receiver is provably innocuous when the
    /// member's owner is a class the current class (or its self type)
    /// extends, and the member is a plain fully-initialized field of a
    /// partial-free constructor, is annotated `@init` or `@partial`, is a
    /// default getter, or the receiver is a finalized `this`.
    fn is_safe_virtual_access(&self, env: &Env<'t>, sym: SymbolId) -> bool {
        let syms = self.ctx.syms;
        let Some(owner) = syms.sym(sym).owner else {
            return false;
        };
        if !syms.is_class(owner) {
            return false;
        }
        let current = env.current_class();
        if !syms.is_sub_or_self_sub(current, owner) {
            return false;
        }

        let flags = self.flags(sym);
        let plain_term = !flags.contains(SymFlags::METHOD)
            && !flags.contains(SymFlags::LAZY)
            && !flags.contains(SymFlags::DEFERRED)
            && !flags.contains(SymFlags::CLASS);
        if plain_term && self.ctor_takes_no_partials(owner) {
            return true;
        }
        if syms.has_annotation(sym, Annotation::Init) || syms.has_annotation(sym, Annotation::Partial)
        {
            return true;
        }
        if flags.contains(SymFlags::DEFAULT_GETTER) {
            return true;
        }
        env.initialized() && syms.has_flag(current, SymFlags::FINAL)
    }

    fn ctor_takes_no_partials(&self, cls: SymbolId) -> bool {
        self.ctx
            .syms
            .class_info(cls)
            .param_accessors
            .iter()
            .all(|&acc| !self.ctx.types.is_partial(self.ctx.syms.sym(acc).ty))
    }
}
