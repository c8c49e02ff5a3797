//! # Rational-tree unification
//!
//! Unification processes a LIFO worklist of node pairs. Both operands of a
//! pair are reduced to their canonical representatives first; pointer-equal
//! pairs are discarded, everything else goes through a two-level dispatch on
//! the variant pair.
//!
//! Two structs that unify are themselves linked *before* their arguments are
//! enqueued. Revisiting the same pair therefore finds identical canonical
//! representatives and terminates, which is what makes unification of cyclic
//! (rational) terms work without an occurs check.
//!
//! Rational trees are accepted during unification but rejected at clause-use
//! time: after a goal unifies with a clause head, every variable in the
//! clause's `cyck` set is walked depth-first, and finding a struct that is
//! already on the walk path fails the branch.

use crate::store::{NodeId, NodeKind, TermStore};
use crate::trail::Trail;

/// Coarse node classification used by the dispatch table. The disunifier
/// walks with the same dispatch shape, so this is shared with [`crate::dif`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum K {
    Var,
    Attr,
    Atom,
    Struct,
    Clause,
}

pub(crate) fn classify(store: &TermStore, n: NodeId) -> K {
    match store.kind(n) {
        NodeKind::Var { .. } => K::Var,
        NodeKind::AttrVar { .. } => K::Attr,
        NodeKind::Atom { .. } => K::Atom,
        NodeKind::Struct { .. } => K::Struct,
        NodeKind::Clause { .. } => K::Clause,
    }
}

pub(crate) fn atom_name(store: &TermStore, n: NodeId) -> &str {
    match store.kind(n) {
        NodeKind::Atom { name } => name,
        _ => unreachable!("expected an atom node"),
    }
}

pub(crate) fn struct_parts(store: &TermStore, n: NodeId) -> (NodeId, usize, bool) {
    match store.kind(n) {
        NodeKind::Struct {
            functor,
            args,
            negated,
        } => (*functor, args.len(), *negated),
        _ => unreachable!("expected a struct node"),
    }
}

pub(crate) fn struct_arg(store: &TermStore, n: NodeId, i: usize) -> NodeId {
    match store.kind(n) {
        NodeKind::Struct { args, .. } => args[i],
        _ => unreachable!("expected a struct node"),
    }
}

fn clause_head(store: &TermStore, n: NodeId) -> Option<NodeId> {
    match store.kind(n) {
        NodeKind::Clause { head, .. } => *head,
        _ => unreachable!("expected a clause node"),
    }
}

/// Worklist unifier. Owns the scratch buffers so repeated calls don't
/// reallocate.
#[derive(Debug, Default)]
pub struct Unifier {
    todo: Vec<(NodeId, NodeId)>,
    path: Vec<NodeId>,
}

impl Unifier {
    pub fn new() -> Self {
        Self {
            todo: Vec::new(),
            path: Vec::new(),
        }
    }

    /// Unify two terms under the current substitution. Journals every
    /// mutation in the trail; on failure the caller is responsible for
    /// rewinding to its own savepoint.
    pub fn unify(
        &mut self,
        a: NodeId,
        b: NodeId,
        store: &mut TermStore,
        trail: &mut Trail,
    ) -> bool {
        trail.clear_deferred();
        self.todo.clear();
        self.todo.push((a, b));
        self.run(store, trail)
    }

    /// Unify a goal struct against a clause (through its head), then run the
    /// cycle check for every variable in the clause's `cyck` set.
    pub fn unify_goal_rule(
        &mut self,
        goal: NodeId,
        rule: NodeId,
        store: &mut TermStore,
        trail: &mut Trail,
    ) -> bool {
        trail.clear_deferred();
        self.todo.clear();
        self.todo.push((goal, rule));
        if !self.run(store, trail) {
            return false;
        }
        let cyck = match store.kind(rule) {
            NodeKind::Clause { cyck, .. } => cyck.clone(),
            _ => Vec::new(),
        };
        cyck.iter().all(|&v| self.cycle_free(v, store))
    }

    /// Read-only probe: does `goal` unify with `rule`? The trail is rewound
    /// unconditionally, so the substitution is observably unchanged on
    /// return.
    pub fn match_goal_rule(
        &mut self,
        goal: NodeId,
        rule: NodeId,
        store: &mut TermStore,
        trail: &mut Trail,
    ) -> bool {
        let cp = trail.checkpoint();
        let matches = self.unify_goal_rule(goal, rule, store, trail);
        trail.rewind(cp, store);
        matches
    }

    fn run(&mut self, store: &mut TermStore, trail: &mut Trail) -> bool {
        while let Some((a, b)) = self.todo.pop() {
            let a = store.find(a);
            let b = store.find(b);
            if a == b {
                continue;
            }
            if !self.step(a, b, store, trail) {
                return false;
            }
        }
        true
    }

    /// One dispatch step for a canonical, non-identical pair.
    fn step(&mut self, a: NodeId, b: NodeId, store: &mut TermStore, trail: &mut Trail) -> bool {
        match (classify(store, a), classify(store, b)) {
            (K::Var, K::Var) => {
                store.link(a, b, trail);
                true
            }
            // A plain variable meeting an attributed one: the attributed
            // node stays representative and its chain is queued for
            // re-examination.
            (K::Var, K::Attr) => {
                store.replace_with(a, b, trail);
                trail.defer(b);
                true
            }
            (K::Attr, K::Var) => {
                store.replace_with(b, a, trail);
                trail.defer(a);
                true
            }
            (K::Var, K::Atom | K::Struct) => {
                store.replace_with(a, b, trail);
                true
            }
            (K::Atom | K::Struct, K::Var) => {
                store.replace_with(b, a, trail);
                true
            }
            // Both sides carry constraints: link by rank and splice the
            // demoted chain onto the survivor's, preserving insertion order.
            (K::Attr, K::Attr) => {
                let (demoted, survivor) = store.link(a, b, trail);
                let tail = store.chain_tail(survivor);
                store.splice_chain(tail, demoted, trail);
                true
            }
            // Binding an attributed variable to a rigid term wakes its goals.
            (K::Attr, K::Atom | K::Struct) => {
                store.replace_with(a, b, trail);
                trail.defer(a);
                true
            }
            (K::Atom | K::Struct, K::Attr) => {
                store.replace_with(b, a, trail);
                trail.defer(b);
                true
            }
            (K::Atom, K::Atom) => atom_name(store, a) == atom_name(store, b),
            (K::Atom, K::Struct) => zero_ary_matches(store, b, a),
            (K::Struct, K::Atom) => zero_ary_matches(store, a, b),
            (K::Struct, K::Struct) => {
                let (f1, arity1, neg1) = struct_parts(store, a);
                let (f2, arity2, neg2) = struct_parts(store, b);
                if f1 != f2 || arity1 != arity2 || neg1 != neg2 {
                    return false;
                }
                // Link first: a revisit of this pair through a cycle must
                // find the operands already merged.
                store.link(a, b, trail);
                for i in 0..arity1 {
                    self.todo
                        .push((struct_arg(store, a, i), struct_arg(store, b, i)));
                }
                true
            }
            // A clause takes part in unification only through its head.
            (K::Struct, K::Clause) => match clause_head(store, b) {
                Some(head) => {
                    self.todo.push((a, head));
                    true
                }
                None => false,
            },
            (K::Clause, K::Struct) => match clause_head(store, a) {
                Some(head) => {
                    self.todo.push((head, b));
                    true
                }
                None => false,
            },
            (K::Clause, _) | (_, K::Clause) => false,
        }
    }

    /// Walk the canonical image of `n` depth-first through struct arguments.
    /// Entering a struct already on the path signals a cycle.
    pub fn cycle_free(&mut self, n: NodeId, store: &TermStore) -> bool {
        self.path.clear();
        self.walk_acyclic(n, store)
    }

    fn walk_acyclic(&mut self, n: NodeId, store: &TermStore) -> bool {
        let n = store.find(n);
        match store.kind(n) {
            NodeKind::Struct { args, .. } => {
                if self.path.contains(&n) {
                    return false;
                }
                self.path.push(n);
                let ok = args.iter().all(|&arg| self.walk_acyclic(arg, store));
                self.path.pop();
                ok
            }
            NodeKind::Clause { head: Some(h), .. } => {
                let h = *h;
                self.walk_acyclic(h, store)
            }
            _ => true,
        }
    }
}

/// An atom unifies with a 0-ary, non-negated struct whose functor carries the
/// same name. No mutation is required: both sides are rigid.
pub(crate) fn zero_ary_matches(store: &TermStore, strct: NodeId, atom: NodeId) -> bool {
    let (functor, arity, negated) = struct_parts(store, strct);
    arity == 0 && !negated && atom_name(store, functor) == atom_name(store, atom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AtomTable;

    struct Fix {
        store: TermStore,
        trail: Trail,
        atoms: AtomTable,
        unifier: Unifier,
    }

    fn fix() -> Fix {
        Fix {
            store: TermStore::new(),
            trail: Trail::new(),
            atoms: AtomTable::new(),
            unifier: Unifier::new(),
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

        fn unify(&mut self, a: NodeId, b: NodeId) -> bool {
            self.unifier.unify(a, b, &mut self.store, &mut self.trail)
        }
    }

    #[test]
    fn variable_binds_to_struct() {
        let mut f = fix();
        let x = f.store.alloc_variable("X");
        let a = f.atom("a");
        let t = f.app("f", vec![a]);
        assert!(f.unify(x, t));
        assert_eq!(f.store.find(x), t);
    }

    #[test]
    fn rigid_mismatch_fails() {
        let mut f = fix();
        let a = f.atom("a");
        let b = f.atom("b");
        assert!(!f.unify(a, b));

        let x = f.store.alloc_variable("X");
        let fa = f.app("f", vec![a]);
        let gx = f.app("g", vec![x]);
        assert!(!f.unify(fa, gx));
    }

    #[test]
    fn atom_matches_zero_ary_struct() {
        let mut f = fix();
        let a = f.atom("a");
        let a0 = f.app("a", vec![]);
        assert!(f.unify(a, a0));
        // But not a negated one.
        let fun = f.atom("a");
        let neg = f.store.alloc_struct(fun, vec![], true);
        assert!(!f.unify(a, neg));
    }

    #[test]
    fn struct_args_unify_pairwise() {
        let mut f = fix();
        let x = f.store.alloc_variable("X");
        let y = f.store.alloc_variable("Y");
        let a = f.atom("a");
        let b = f.atom("b");
        let t1 = f.app("p", vec![x, b]);
        let t2 = f.app("p", vec![a, y]);
        assert!(f.unify(t1, t2));
        assert_eq!(f.store.find(x), a);
        assert_eq!(f.store.find(y), b);
        // The structs themselves were merged.
        assert_eq!(f.store.find(t1), f.store.find(t2));
    }

    #[test]
    fn rational_terms_unify_and_are_detected() {
        let mut f = fix();
        let x = f.store.alloc_variable("X");
        let fx = f.app("f", vec![x]);
        // X = f(X) succeeds under rational-tree semantics...
        assert!(f.unify(x, fx));
        // ...and a second round over the same cycle terminates immediately.
        assert!(f.unify(x, fx));
        // The cycle check sees the loop.
        assert!(!f.unifier.cycle_free(x, &f.store));

        let y = f.store.alloc_variable("Y");
        let a = f.atom("a");
        let fa = f.app("f", vec![a]);
        assert!(f.unify(y, fa));
        assert!(f.unifier.cycle_free(y, &f.store));
    }

    #[test]
    fn match_probe_is_pure() {
        let mut f = fix();
        let x = f.store.alloc_variable("X");
        let a = f.atom("a");
        let goal = f.app("p", vec![x]);
        let head = f.app("p", vec![a]);
        let rule = f.store.alloc_clause(Some(head), vec![], vec![], 1);

        let len_before = f.trail.len();
        assert!(f
            .unifier
            .match_goal_rule(goal, rule, &mut f.store, &mut f.trail));
        assert_eq!(f.trail.len(), len_before);
        // X is still unbound.
        assert_eq!(f.store.find(x), x);
    }

    #[test]
    fn cyclic_binding_fails_cyck_guarded_match() {
        let mut f = fix();
        let x = f.store.alloc_variable("X");
        let fx = f.app("f", vec![x]);
        assert!(f.unify(x, fx));

        // p(Y) :- ... with Y in the cyck set: matching p(X) must fail now.
        let y = f.store.alloc_variable("Y");
        let head = f.app("p", vec![y]);
        let body_goal = f.app("q", vec![y]);
        let rule = f.store.alloc_clause(Some(head), vec![y], vec![body_goal], 1);
        let goal = f.app("p", vec![x]);
        assert!(!f
            .unifier
            .match_goal_rule(goal, rule, &mut f.store, &mut f.trail));
    }
}
