//! # Structural disequality (`dif/2`)
//!
//! The disunifier decides whether two terms can be proved structurally
//! unequal under the current substitution. It walks pairs with the same
//! dispatch shape as the unifier but never mutates anything. A rigid-rigid
//! mismatch anywhere settles the constraint; a walk that ends without one
//! violates it; a soft position (a variable or an attributed variable) defers
//! it by freezing the constraint goal on that position.
//!
//! Frozen constraints are re-examined whenever a unification touches their
//! attributed variable: the unifier records the touch in the trail's
//! deferred-goals buffer and the resolver re-inserts the goal chain at the
//! front of the pending body (see [`crate::resolve`]).

use std::collections::HashSet;

use crate::store::{NodeId, NodeKind, TermStore};
use crate::trail::Trail;
use crate::unify::{atom_name, classify, struct_arg, struct_parts, zero_ary_matches, K};

/// Outcome of a disunification walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disunify {
    /// A rigid-rigid mismatch was found: the constraint holds already.
    Different,
    /// The walk ended without a distinguishing position: the constraint is
    /// violated and the current branch must fail.
    Same,
    /// The first distinguishing position is this bare variable; freeze the
    /// constraint on it.
    DeferVariable(NodeId),
    /// The first distinguishing position is this attributed variable;
    /// prepend the constraint to its chain.
    DeferAttr(NodeId),
}

/// Mutation-free disequality walker. The seen-pair set makes the walk
/// terminate on rational (cyclic) operands.
#[derive(Debug, Default)]
pub struct Disunifier {
    todo: Vec<(NodeId, NodeId)>,
    seen: HashSet<(NodeId, NodeId)>,
}

impl Disunifier {
    pub fn new() -> Self {
        Self {
            todo: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Classify the pair `(a, b)` under the current substitution.
    pub fn check(&mut self, a: NodeId, b: NodeId, store: &TermStore) -> Disunify {
        self.todo.clear();
        self.seen.clear();
        self.todo.push((a, b));
        while let Some((a, b)) = self.todo.pop() {
            let a = store.find(a);
            let b = store.find(b);
            if a == b {
                continue;
            }
            if !self.seen.insert((a, b)) {
                continue;
            }
            match (classify(store, a), classify(store, b)) {
                (K::Attr, _) => return Disunify::DeferAttr(a),
                (_, K::Attr) => return Disunify::DeferAttr(b),
                (K::Var, _) => return Disunify::DeferVariable(a),
                (_, K::Var) => return Disunify::DeferVariable(b),
                (K::Atom, K::Atom) => {
                    if atom_name(store, a) != atom_name(store, b) {
                        return Disunify::Different;
                    }
                }
                (K::Atom, K::Struct) => {
                    if !zero_ary_matches(store, b, a) {
                        return Disunify::Different;
                    }
                }
                (K::Struct, K::Atom) => {
                    if !zero_ary_matches(store, a, b) {
                        return Disunify::Different;
                    }
                }
                (K::Struct, K::Struct) => {
                    let (f1, arity1, neg1) = struct_parts(store, a);
                    let (f2, arity2, neg2) = struct_parts(store, b);
                    if f1 != f2 || arity1 != arity2 || neg1 != neg2 {
                        return Disunify::Different;
                    }
                    for i in 0..arity1 {
                        self.todo
                            .push((struct_arg(store, a, i), struct_arg(store, b, i)));
                    }
                }
                (K::Clause, _) | (_, K::Clause) => return Disunify::Different,
            }
        }
        Disunify::Same
    }
}

/// Freeze `goal` on a bare variable: allocate an attributed variable wrapping
/// it and redirect the variable there. Journalled, so backtracking thaws the
/// constraint again.
pub fn freeze_variable(var: NodeId, goal: NodeId, store: &mut TermStore, trail: &mut Trail) {
    let attr = store.alloc_attrvar(var, goal, None);
    store.replace_with(var, attr, trail);
}

/// Freeze `goal` on an already-attributed variable: a new attributed node
/// sharing the same underlying variable is prepended, with the prior chain
/// continuing through its `next` link.
pub fn freeze_attrvar(attr: NodeId, goal: NodeId, store: &mut TermStore, trail: &mut Trail) {
    let var = match store.kind(attr) {
        NodeKind::AttrVar { var, .. } => *var,
        _ => unreachable!("freeze target must be an attributed variable"),
    };
    let fresh = store.alloc_attrvar(var, goal, Some(attr));
    store.replace_with(attr, fresh, trail);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AtomTable;
    use crate::unify::Unifier;

    struct Fix {
        store: TermStore,
        trail: Trail,
        atoms: AtomTable,
        dis: Disunifier,
    }

    fn fix() -> Fix {
        Fix {
            store: TermStore::new(),
            trail: Trail::new(),
            atoms: AtomTable::new(),
            dis: Disunifier::new(),
        }
    }

    impl Fix {
        fn atom(&mut self, name: &str) -> NodeId {
            self.atoms.intern(&mut self.store, name)
        }

        fn app(&mut self, functor: &str, args: Vec<NodeId>) -> NodeId {
            let f = self.atom(functor);
            self.store.alloc_struct(f, args, false)
        }
    }

    #[test]
    fn rigid_mismatch_is_different() {
        let mut f = fix();
        let a = f.atom("a");
        let b = f.atom("b");
        assert_eq!(f.dis.check(a, b, &f.store), Disunify::Different);

        let x = f.store.alloc_variable("X");
        let fa = f.app("f", vec![a, x]);
        let fb = f.app("f", vec![b, x]);
        assert_eq!(f.dis.check(fa, fb, &f.store), Disunify::Different);
    }

    #[test]
    fn identical_terms_are_same() {
        let mut f = fix();
        let a = f.atom("a");
        let fa1 = f.app("f", vec![a]);
        let fa2 = f.app("f", vec![a]);
        assert_eq!(f.dis.check(fa1, fa2, &f.store), Disunify::Same);
    }

    #[test]
    fn open_position_defers_on_the_variable() {
        let mut f = fix();
        let x = f.store.alloc_variable("X");
        let a = f.atom("a");
        assert_eq!(f.dis.check(x, a, &f.store), Disunify::DeferVariable(x));
    }

    #[test]
    fn frozen_constraint_is_woken_by_binding() {
        let mut f = fix();
        let mut unifier = Unifier::new();
        let x = f.store.alloc_variable("X");
        let a = f.atom("a");
        let goal = f.app("dif", vec![x, a]);

        freeze_variable(x, goal, &mut f.store, &mut f.trail);
        let attr = f.store.find(x);
        assert!(matches!(f.store.kind(attr), NodeKind::AttrVar { .. }));

        // A later check on the same pair now defers on the attributed node.
        assert_eq!(f.dis.check(x, a, &f.store), Disunify::DeferAttr(attr));

        // Binding the variable enqueues the chain for wake-up.
        let b = f.atom("b");
        assert!(unifier.unify(x, b, &mut f.store, &mut f.trail));
        assert_eq!(f.trail.deferred_goals(), &[attr]);
    }

    #[test]
    fn prepending_preserves_the_prior_chain() {
        let mut f = fix();
        let x = f.store.alloc_variable("X");
        let a = f.atom("a");
        let b = f.atom("b");
        let g1 = f.app("dif", vec![x, a]);
        let g2 = f.app("dif", vec![x, b]);

        freeze_variable(x, g1, &mut f.store, &mut f.trail);
        let first = f.store.find(x);
        freeze_attrvar(first, g2, &mut f.store, &mut f.trail);
        let second = f.store.find(x);
        assert_ne!(first, second);
        match f.store.kind(second) {
            NodeKind::AttrVar { goal, next, .. } => {
                assert_eq!(*goal, g2);
                assert_eq!(*next, Some(first));
            }
            _ => panic!("expected an attributed variable"),
        }
    }

    #[test]
    fn cyclic_operands_terminate() {
        let mut f = fix();
        let mut unifier = Unifier::new();
        let x = f.store.alloc_variable("X");
        let fx = f.app("f", vec![x]);
        assert!(unifier.unify(x, fx, &mut f.store, &mut f.trail));

        let y = f.store.alloc_variable("Y");
        let fy = f.app("f", vec![y]);
        assert!(unifier.unify(y, fy, &mut f.store, &mut f.trail));

        // Two rational terms with identical shape: no distinguishing
        // position exists.
        assert_eq!(f.dis.check(x, y, &f.store), Disunify::Same);
    }
}
