use crate::initck::Effect;

include!("fixture.rs");

#[test]
fn field_read_before_assignment() {
    // class A { val x = y; val y = 1 }
    let mut h = Host::new();
    let a = h.class("A");
    let x = h.field(a, "x", h.unit_ty());
    let y = h.field(a, "y", h.unit_ty());

    let rhs = h.b.ident(y);
    let x_def = h.b.val_def(x, rhs);
    let one = h.b.lit();
    let y_def = h.b.val_def(y, one);
    let template = Host::template(vec![x_def, y_def]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    assert!(matches!(&out.effects[0], Effect::Uninit(name, _) if name == "y"));
}

#[test]
fn overridable_method_call_leaks_uninit_field() {
    // class A { foo(); def foo(): Unit = println(x); val x = 1 }
    let mut h = Host::new();
    let a = h.class("A");
    let x = h.field(a, "x", h.unit_ty());
    let foo = h.method0(a, "foo");

    let foo_ref = h.b.ident(foo);
    let call = h.b.apply(foo_ref, vec![]);
    let foo_body = h.b.ident(x);
    let foo_def = h.b.def_def(foo, vec![vec![]], Some(foo_body));
    let one = h.b.lit();
    let x_def = h.b.val_def(x, one);
    let template = Host::template(vec![call, foo_def, x_def]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 2, "effects: {:?}", out.effects);
    assert!(matches!(&out.effects[0], Effect::OverrideRisk(name, _) if name == "foo"));
    match &out.effects[1] {
        Effect::Call(name, subs, _) => {
            assert_eq!(name, "foo");
            assert_eq!(subs.len(), 1);
            assert!(matches!(&subs[0], Effect::Uninit(field, _) if field == "x"));
        }
        e => panic!("expected Call effect, got {e:?}"),
    }
}

#[test]
fn init_annotated_method_is_safe_to_call() {
    // class A { foo(); @init def foo(): Unit = (); val x = 1 }
    let mut h = Host::new();
    let a = h.class("A");
    let x = h.field(a, "x", h.unit_ty());
    let foo = h.method0(a, "foo");
    h.annotate(foo, Annotation::Init);

    let foo_ref = h.b.ident(foo);
    let call = h.b.apply(foo_ref, vec![]);
    let unit = h.b.lit();
    let foo_def = h.b.def_def(foo, vec![vec![]], Some(unit));
    let one = h.b.lit();
    let x_def = h.b.val_def(x, one);
    let template = Host::template(vec![call, foo_def, x_def]);

    let out = h.check(a, &template);
    assert!(out.is_clean(), "effects: {:?}", out.effects);
}

#[test]
fn partial_argument_to_strict_parameter() {
    // class A(@partial p: P) { sink(p); private def sink(q: P): Unit = () }
    let mut h = Host::new();
    let a = h.class("A");
    let p_cls = h.class("P");
    let p_ty = h.class_ty(p_cls);
    let p_partial_ty = h.partial_ty(p_ty);
    let p = h.param_accessor(a, "p", p_partial_ty);
    let sink = h.method(a, "sink", &[p_ty]);
    h.add_flags(sink, SymFlags::PRIVATE);
    let q = h.param(sink, "q", p_ty);

    let sink_ref = h.b.ident(sink);
    let arg = h.b.ident(p);
    let call = h.b.apply(sink_ref, vec![arg]);
    let unit = h.b.lit();
    let sink_def = h.b.def_def(sink, vec![vec![q]], Some(unit));
    let template = Host::template(vec![call, sink_def]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    assert!(matches!(&out.effects[0], Effect::Argument(name, _) if name == "sink"));
}

#[test]
fn partial_argument_to_partial_parameter_is_accepted() {
    // class A(@partial p: P) { sink(p); private def sink(@partial q: P): Unit = () }
    let mut h = Host::new();
    let a = h.class("A");
    let p_cls = h.class("P");
    let p_ty = h.class_ty(p_cls);
    let p_partial_ty = h.partial_ty(p_ty);
    let p = h.param_accessor(a, "p", p_partial_ty);
    let sink = h.method(a, "sink", &[p_partial_ty]);
    h.add_flags(sink, SymFlags::PRIVATE);
    let q = h.param(sink, "q", p_partial_ty);

    let sink_ref = h.b.ident(sink);
    let arg = h.b.ident(p);
    let call = h.b.apply(sink_ref, vec![arg]);
    let unit = h.b.lit();
    let sink_def = h.b.def_def(sink, vec![vec![q]], Some(unit));
    let template = Host::template(vec![call, sink_def]);

    let out = h.check(a, &template);
    assert!(out.is_clean(), "effects: {:?}", out.effects);
}

#[test]
fn recursive_construction_of_own_class() {
    // class A { new A }
    let mut h = Host::new();
    let a = h.class("A");
    let ctor = h.ctor(a, &[]);

    let make = h.b.new_instance(a, ctor, None, vec![]);
    let template = Host::template(vec![make]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    assert!(matches!(&out.effects[0], Effect::RecCreate(name, _) if name == "A"));
}

#[test]
fn partial_value_assigned_to_full_field() {
    // class A(@partial p: P) { var q: P = null; q = p }
    let mut h = Host::new();
    let a = h.class("A");
    let p_cls = h.class("P");
    let p_ty = h.class_ty(p_cls);
    let p_partial_ty = h.partial_ty(p_ty);
    let p = h.param_accessor(a, "p", p_partial_ty);
    let q = h.var_field(a, "q", p_ty);

    let null = h.b.lit();
    let q_def = h.b.val_def(q, null);
    let lhs = h.b.ident(q);
    let rhs = h.b.ident(p);
    let assign = h.b.assign(lhs, rhs);
    let template = Host::template(vec![q_def, assign]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    assert!(matches!(&out.effects[0], Effect::CrossAssign(name, _) if name == "q"));
}

#[test]
fn reassigning_partial_field_stays_silent() {
    // A var that already holds a partial value may receive another one.
    let mut h = Host::new();
    let a = h.class("A");
    let p_cls = h.class("P");
    let p_ty = h.class_ty(p_cls);
    let p_partial_ty = h.partial_ty(p_ty);
    let p = h.param_accessor(a, "p", p_partial_ty);
    let q = h.var_field(a, "q", p_partial_ty);

    let init_rhs = h.b.ident(p);
    let q_def = h.b.val_def(q, init_rhs);
    let lhs = h.b.ident(q);
    let rhs = h.b.ident(p);
    let assign = h.b.assign(lhs, rhs);
    let template = Host::template(vec![q_def, assign]);

    let out = h.check(a, &template);
    assert!(out.is_clean(), "effects: {:?}", out.effects);
}

#[test]
fn lazy_val_thunk_runs_once() {
    // class A { lazy val l = x; l; l; val x = 1 }
    let mut h = Host::new();
    let a = h.class("A");
    let x = h.field(a, "x", h.unit_ty());
    let l = h.lazy_field(a, "l", h.unit_ty());

    let thunk = h.b.ident(x);
    let l_def = h.b.val_def(l, thunk);
    let first = h.b.ident(l);
    let second = h.b.ident(l);
    let one = h.b.lit();
    let x_def = h.b.val_def(x, one);
    let template = Host::template(vec![l_def, first, second, x_def]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    match &out.effects[0] {
        Effect::Force(name, subs, _) => {
            assert_eq!(name, "l");
            assert_eq!(subs.len(), 1);
            assert!(matches!(&subs[0], Effect::Uninit(field, _) if field == "x"));
        }
        e => panic!("expected Force effect, got {e:?}"),
    }
}

#[test]
fn field_assigned_in_one_branch_stays_uninit() {
    // class A { var x: Int = _; if (c) x = 1 else (); x }
    let mut h = Host::new();
    let a = h.class("A");
    let x = h.var_field(a, "x", h.unit_ty());

    let wild = h.b.lit();
    let x_decl = h.b.val_wildcard(x, wild);
    let cond = h.b.lit();
    let lhs = h.b.ident(x);
    let one = h.b.lit();
    let then_assign = h.b.assign(lhs, one);
    let skip = h.b.lit();
    let branch = h.b.if_then_else(cond, then_assign, skip);
    let read = h.b.ident(x);
    let template = Host::template(vec![x_decl, branch, read]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    assert!(matches!(&out.effects[0], Effect::Uninit(name, _) if name == "x"));
}

#[test]
fn field_assigned_in_both_branches_is_initialized() {
    let mut h = Host::new();
    let a = h.class("A");
    let x = h.var_field(a, "x", h.unit_ty());

    let wild = h.b.lit();
    let x_decl = h.b.val_wildcard(x, wild);
    let cond = h.b.lit();
    let then_lhs = h.b.ident(x);
    let one = h.b.lit();
    let then_assign = h.b.assign(then_lhs, one);
    let else_lhs = h.b.ident(x);
    let two = h.b.lit();
    let else_assign = h.b.assign(else_lhs, two);
    let branch = h.b.if_then_else(cond, then_assign, else_assign);
    let read = h.b.ident(x);
    let template = Host::template(vec![x_decl, branch, read]);

    let out = h.check(a, &template);
    assert!(out.is_clean(), "effects: {:?}", out.effects);
}

#[test]
fn inner_class_instantiated_on_partial_outer() {
    // class A { class Inner { x }; new Inner; val x = 1 }
    let mut h = Host::new();
    let a = h.class("A");
    let inner = h.inner_class(a, "Inner");
    let inner_ctor = h.ctor(inner, &[]);
    let x = h.field(a, "x", h.unit_ty());

    let inner_body = h.b.ident(x);
    let inner_def = h.b.class_def(
        inner,
        Template {
            parents: vec![],
            body: vec![inner_body],
        },
    );
    let make = h.b.new_instance(inner, inner_ctor, None, vec![]);
    let one = h.b.lit();
    let x_def = h.b.val_def(x, one);
    let template = Host::template(vec![inner_def, make, x_def]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    match &out.effects[0] {
        Effect::Instantiate(name, subs, _) => {
            assert_eq!(name, "Inner");
            assert_eq!(subs.len(), 1);
            assert!(matches!(&subs[0], Effect::Uninit(field, _) if field == "x"));
        }
        e => panic!("expected Instantiate effect, got {e:?}"),
    }
}

#[test]
fn foreign_inner_class_on_partial_prefix() {
    // class A(@partial p: B) { new p.Inner }
    let mut h = Host::new();
    let a = h.class("A");
    let b_cls = h.class("B");
    let b_inner = h.inner_class(b_cls, "Inner");
    let inner_ctor = h.ctor(b_inner, &[]);
    let b_ty = h.class_ty(b_cls);
    let b_partial_ty = h.partial_ty(b_ty);
    let p = h.param_accessor(a, "p", b_partial_ty);

    let prefix = h.b.ident(p);
    let make = h.b.new_instance(b_inner, inner_ctor, Some(prefix), vec![]);
    let template = Host::template(vec![make]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    assert!(
        matches!(&out.effects[0], Effect::PartialNew(outer, name, _) if outer == "B" && name == "Inner")
    );
}

#[test]
fn mutual_recursion_terminates_with_one_entry_per_method() {
    // class A { f(); @init def f(): Unit = g(); @init def g(): Unit = { f(); x }; val x = 1 }
    let mut h = Host::new();
    let a = h.class("A");
    let x = h.field(a, "x", h.unit_ty());
    let f = h.method0(a, "f");
    let g = h.method0(a, "g");
    h.annotate(f, Annotation::Init);
    h.annotate(g, Annotation::Init);

    let f_ref = h.b.ident(f);
    let call_f = h.b.apply(f_ref, vec![]);

    let g_ref = h.b.ident(g);
    let f_body = h.b.apply(g_ref, vec![]);
    let f_def = h.b.def_def(f, vec![vec![]], Some(f_body));

    let f_ref2 = h.b.ident(f);
    let rec_call = h.b.apply(f_ref2, vec![]);
    let read_x = h.b.ident(x);
    let g_body = h.b.block(vec![rec_call], read_x);
    let g_def = h.b.def_def(g, vec![vec![]], Some(g_body));

    let one = h.b.lit();
    let x_def = h.b.val_def(x, one);
    let template = Host::template(vec![call_f, f_def, g_def, x_def]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    match &out.effects[0] {
        Effect::Call(name, subs, _) => {
            assert_eq!(name, "f");
            assert_eq!(subs.len(), 1);
            match &subs[0] {
                Effect::Call(name, subs, _) => {
                    assert_eq!(name, "g");
                    assert_eq!(subs.len(), 1);
                    assert!(matches!(&subs[0], Effect::Uninit(field, _) if field == "x"));
                }
                e => panic!("expected nested Call effect, got {e:?}"),
            }
        }
        e => panic!("expected Call effect, got {e:?}"),
    }
}

#[test]
fn unchecked_class_is_skipped() {
    // @unchecked class A { val x = y; val y = 1 }
    let mut h = Host::new();
    let a = h.class("A");
    h.annotate(a, Annotation::Unchecked);
    let x = h.field(a, "x", h.unit_ty());
    let y = h.field(a, "y", h.unit_ty());

    let rhs = h.b.ident(y);
    let x_def = h.b.val_def(x, rhs);
    let one = h.b.lit();
    let y_def = h.b.val_def(y, one);
    let template = Host::template(vec![x_def, y_def]);

    let out = h.check(a, &template);
    assert!(out.is_clean());
    assert!(out.warnings.is_empty());
}

#[test]
fn closure_effects_surface_at_application() {
    // class A { def m(): Unit = x; val f = () => m(); f(); val x = 1 }
    let mut h = Host::new();
    let a = h.class("A");
    let x = h.field(a, "x", h.unit_ty());
    let m = h.method0(a, "m");
    h.annotate(m, Annotation::Init);
    let f = h.field(a, "f", h.unit_ty());

    let m_body = h.b.ident(x);
    let m_def = h.b.def_def(m, vec![vec![]], Some(m_body));
    let clo = h.b.closure(m);
    let f_def = h.b.val_def(f, clo);
    let f_ref = h.b.ident(f);
    let call = h.b.apply(f_ref, vec![]);
    let one = h.b.lit();
    let x_def = h.b.val_def(x, one);
    let template = Host::template(vec![m_def, f_def, call, x_def]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    match &out.effects[0] {
        Effect::Latent(subs, _) => {
            assert_eq!(subs.len(), 1);
            assert!(matches!(&subs[0], Effect::Uninit(field, _) if field == "x"));
        }
        e => panic!("expected Latent effect, got {e:?}"),
    }
}

#[test]
fn abstract_member_use_without_init_annotation() {
    // class A { d; val d: Int (deferred) }
    let mut h = Host::new();
    let a = h.class("A");
    let d = h.deferred_field(a, "d", h.unit_ty());

    let read = h.b.ident(d);
    let template = Host::template(vec![read]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    assert!(matches!(&out.effects[0], Effect::UseAbstractDef(name, _) if name == "d"));
}

#[test]
fn selection_on_partial_value() {
    // class A(@partial p: P) { p.f }
    let mut h = Host::new();
    let a = h.class("A");
    let p_cls = h.class("P");
    let f = h.field(p_cls, "f", h.unit_ty());
    let p_ty = h.class_ty(p_cls);
    let p_partial_ty = h.partial_ty(p_ty);
    let p = h.param_accessor(a, "p", p_partial_ty);

    let qual = h.b.ident(p);
    let sel = h.b.select(qual, f);
    let template = Host::template(vec![sel]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    assert!(matches!(&out.effects[0], Effect::Member(name, _) if name == "f"));
}

#[test]
fn assignment_into_partial_prefix_is_accepted() {
    // class A(@partial p: P) { p.f = p } -- storing partial into partial
    let mut h = Host::new();
    let a = h.class("A");
    let p_cls = h.class("P");
    let f = h.var_field(p_cls, "f", h.unit_ty());
    let p_ty = h.class_ty(p_cls);
    let p_partial_ty = h.partial_ty(p_ty);
    let p = h.param_accessor(a, "p", p_partial_ty);

    let qual = h.b.ident(p);
    let lhs = h.b.select(qual, f);
    let rhs = h.b.ident(p);
    let assign = h.b.assign(lhs, rhs);
    let template = Host::template(vec![assign]);

    let out = h.check(a, &template);
    assert!(out.is_clean(), "effects: {:?}", out.effects);
}

#[test]
fn partial_value_stored_through_full_prefix() {
    // class A(@partial p: P, o: P) { o.f = p }
    let mut h = Host::new();
    let a = h.class("A");
    let p_cls = h.class("P");
    let f = h.var_field(p_cls, "f", h.unit_ty());
    let p_ty = h.class_ty(p_cls);
    let p_partial_ty = h.partial_ty(p_ty);
    let p = h.param_accessor(a, "p", p_partial_ty);
    let o = h.param_accessor(a, "o", p_ty);

    let qual = h.b.ident(o);
    let lhs = h.b.select(qual, f);
    let rhs = h.b.ident(p);
    let assign = h.b.assign(lhs, rhs);
    let template = Host::template(vec![assign]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    assert!(matches!(&out.effects[0], Effect::CrossAssign(name, _) if name == "f"));
}

#[test]
fn super_reference_to_partial_inherited_member() {
    // class P { @partial val f: Q }
    // class A extends P { var q: Q = null; q = super[P].f }
    let mut h = Host::new();
    let p_cls = h.class("P");
    let q_cls = h.class("Q");
    let q_ty = h.class_ty(q_cls);
    let q_partial_ty = h.partial_ty(q_ty);
    let f = h.field(p_cls, "f", q_partial_ty);
    let a = h.class("A");
    h.extends(a, p_cls);
    let q = h.var_field(a, "q", q_ty);

    let null = h.b.lit();
    let q_def = h.b.val_def(q, null);
    let sup = h.b.super_ref(a, p_cls);
    let rhs = h.b.select(sup, f);
    let lhs = h.b.ident(q);
    let assign = h.b.assign(lhs, rhs);
    let template = Host::template(vec![q_def, assign]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    assert!(matches!(&out.effects[0], Effect::CrossAssign(name, _) if name == "q"));
}

#[test]
fn construction_completes_when_last_field_takes_self() {
    // class A { val x = 1; val me = this; me.x }
    let mut h = Host::new();
    let a = h.class("A");
    let x = h.field(a, "x", h.unit_ty());
    let a_ty = h.class_ty(a);
    let me = h.field(a, "me", a_ty);

    let one = h.b.lit();
    let x_def = h.b.val_def(x, one);
    let this = h.b.this(a);
    let me_def = h.b.val_def(me, this);
    let qual = h.b.ident(me);
    let read = h.b.select(qual, x);
    let template = Host::template(vec![x_def, me_def, read]);

    let out = h.check(a, &template);
    assert!(out.is_clean(), "effects: {:?}", out.effects);
}

#[test]
fn self_reference_before_fields_are_set_is_partial() {
    // class A { val me = this; val x = 1; me.x }
    let mut h = Host::new();
    let a = h.class("A");
    let a_ty = h.class_ty(a);
    let me = h.field(a, "me", a_ty);
    let x = h.field(a, "x", h.unit_ty());

    let this = h.b.this(a);
    let me_def = h.b.val_def(me, this);
    let one = h.b.lit();
    let x_def = h.b.val_def(x, one);
    let qual = h.b.ident(me);
    let read = h.b.select(qual, x);
    let template = Host::template(vec![me_def, x_def, read]);

    let out = h.check(a, &template);
    assert_eq!(out.effects.len(), 1, "effects: {:?}", out.effects);
    assert!(matches!(&out.effects[0], Effect::Member(name, _) if name == "x"));
}
