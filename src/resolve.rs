//! # Resolution: unfolding and depth-bounded search
//!
//! Unfolding replaces the leftmost body goal of a partial derivation with the
//! body of a matching rule after unifying heads:
//!
//! ```text
//! (A0 :- A1, A2, ..., An) (+) (B0 :- B1, ..., Bm)
//!     = mgu(A1, B0) * (A0 :- B1, ..., Bm, A2, ..., An)
//! ```
//!
//! An [`Unfolder`] enumerates the possible unfoldings for one partial clause:
//! it iterates the candidate rules stored under the leftmost goal's functor,
//! or discharges the goal as a builtin (`dif/2`, `duplicate_term/2`) when no
//! user rules exist for it. A [`Solver`] stacks unfolders to express
//! AND-composition over the remaining goals, bounded by a maximum depth; the
//! search is restarted with growing depth bounds by the caller (iterative
//! deepening, see [`DEFAULT_MAX_DEPTH`]).
//!
//! Every unfolder records a trail savepoint and an arena checkpoint at
//! construction and restores both before each attempt. Backtracking is
//! nothing but these restorations, performed in LIFO order down the stack.


use std::collections::HashMap;

use crate::dif::{self, Disunifier, Disunify};
use crate::store::{self, NodeId, NodeKind, TermStore};
use crate::trail::{self, Trail};
use crate::unify::Unifier;

/// Depth ceiling for iterative deepening: a query is reported unprovable
/// (`NP`) once every depth up to this bound is exhausted.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Mutable solving state shared by all solvers of one program: the term
/// graph, its journal, and the scratch machines operating on them.
#[derive(Debug)]
pub struct Context {
    pub store: TermStore,
    pub trail: Trail,
    pub(crate) unify: Unifier,
    pub(crate) dis: Disunifier,
    pub(crate) inst: Instantiator,
    dif_atom: NodeId,
    dup_atom: NodeId,
}

impl Context {
    /// Wrap a store. The two atoms identify the builtin predicates and must
    /// be interned in the same store.
    pub fn new(store: TermStore, dif_atom: NodeId, dup_atom: NodeId) -> Self {
        Self {
            store,
            trail: Trail::new(),
            unify: Unifier::new(),
            dis: Disunifier::new(),
            inst: Instantiator::new(),
            dif_atom,
            dup_atom,
        }
    }
}

/// The clause database: rules grouped by head functor, kept in declaration
/// order. Read-only once resolution starts.
#[derive(Debug, Default)]
pub struct ClauseDb {
    by_functor: HashMap<NodeId, Vec<NodeId>>,
}

impl ClauseDb {
    pub fn new() -> Self {
        Self {
            by_functor: HashMap::new(),
        }
    }

    /// File a clause under its head functor. The clause must have a head.
    pub fn insert(&mut self, store: &TermStore, clause: NodeId) {
        let head = clause_head_of(store, clause)
            .expect("only clauses with a head belong in the database");
        let (functor, _, _) = crate::unify::struct_parts(store, head);
        self.by_functor.entry(functor).or_default().push(clause);
    }

    /// The candidate rules for a functor, in declaration order.
    pub fn rules_for(&self, functor: NodeId) -> &[NodeId] {
        self.by_functor
            .get(&functor)
            .map(|rules| rules.as_slice())
            .unwrap_or(&[])
    }

    /// All clauses in the database.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.by_functor.values().flatten().copied()
    }
}

// //////////////////////////////// INSTANTIATION ////////////////////////////////

/// Fresh-copy machine for clauses and terms.
///
/// Within one call, every occurrence of the same original variable maps to
/// the same fresh variable. Atoms are shared, structs are rebuilt with fresh
/// argument nodes, and attributed variables are copied with their whole chain
/// so the copy carries the same frozen constraints.
#[derive(Debug, Default)]
pub(crate) struct Instantiator {
    map: HashMap<NodeId, NodeId>,
}

impl Instantiator {
    pub(crate) fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Copy a clause with fresh variables. The copy keeps the source id, and
    /// its `cyck` set holds the fresh counterparts of the original's.
    pub(crate) fn instantiate_clause(&mut self, store: &mut TermStore, clause: NodeId) -> NodeId {
        self.map.clear();
        self.copy_clause(store, clause)
    }

    /// Copy the canonical image of a term with fresh variables
    /// (`duplicate_term/2`). Assumes the image is acyclic.
    pub(crate) fn instantiate_term(&mut self, store: &mut TermStore, term: NodeId) -> NodeId {
        self.map.clear();
        self.walk(store, term)
    }

    fn copy_clause(&mut self, store: &mut TermStore, clause: NodeId) -> NodeId {
        let (head, cyck, body, id) = match store.kind(clause) {
            NodeKind::Clause {
                head,
                cyck,
                body,
                id,
            } => (*head, cyck.clone(), body.clone(), *id),
            _ => unreachable!("expected a clause node"),
        };
        let head = head.map(|h| self.walk(store, h));
        let cyck = cyck
            .iter()
            .filter_map(|v| self.map.get(v).copied())
            .collect();
        let body = body.iter().map(|g| self.walk(store, *g)).collect();
        store.alloc_clause(head, cyck, body, id)
    }

    fn walk(&mut self, store: &mut TermStore, n: NodeId) -> NodeId {
        let n = store.find(n);
        if let Some(&copy) = self.map.get(&n) {
            return copy;
        }
        match store.kind(n) {
            NodeKind::Var { name } => {
                let name = name.clone();
                let copy = store.alloc_variable(&name);
                self.map.insert(n, copy);
                copy
            }
            NodeKind::Atom { .. } => n,
            NodeKind::Struct {
                functor,
                args,
                negated,
            } => {
                let (functor, negated) = (*functor, *negated);
                let args = args.clone();
                let args = args.iter().map(|&a| self.walk(store, a)).collect();
                store.alloc_struct(functor, args, negated)
            }
            NodeKind::AttrVar { .. } => self.walk_chain(store, n),
            NodeKind::Clause { .. } => self.copy_clause(store, n),
        }
    }

    /// Copy a whole attr chain. The copies are allocated (back to front, with
    /// the source goals as placeholders) and memoized *before* any goal is
    /// copied: goal terms refer back into the chain, so the memo entries must
    /// exist first.
    fn walk_chain(&mut self, store: &mut TermStore, head: NodeId) -> NodeId {
        let mut chain = Vec::new();
        let mut cur = Some(head);
        while let Some(n) = cur {
            match store.kind(n) {
                NodeKind::AttrVar { var, goal, next } => {
                    chain.push((n, *var, *goal));
                    cur = *next;
                }
                _ => unreachable!("attr chains consist of attributed variables"),
            }
        }
        let mut next_copy = None;
        for &(n, var, goal) in chain.iter().rev() {
            let fresh_var = self.fresh_var(store, var);
            let copy = store.alloc_attrvar(fresh_var, goal, next_copy);
            self.map.insert(n, copy);
            next_copy = Some(copy);
        }
        for &(n, _, goal) in &chain {
            let copy = self.map[&n];
            let goal_copy = self.walk(store, goal);
            store.patch_attr_goal(copy, goal_copy);
        }
        self.map[&head]
    }

    /// Fresh variable for a raw (possibly non-canonical) variable node. The
    /// wrapped variable of an attributed node redirects to the chain head, so
    /// it must not be resolved through `find` here.
    fn fresh_var(&mut self, store: &mut TermStore, var: NodeId) -> NodeId {
        if let Some(&copy) = self.map.get(&var) {
            return copy;
        }
        let name = match store.kind(var) {
            NodeKind::Var { name } => name.clone(),
            _ => unreachable!("expected a variable node"),
        };
        let copy = store.alloc_variable(&name);
        self.map.insert(var, copy);
        copy
    }
}

// //////////////////////////////// UNFOLDER ////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    None,
    Dif,
    DuplicateTerm,
}

/// Producer of the possible unfoldings of one partial clause, driven by
/// repeated [`Unfolder::get`] calls.
#[derive(Debug)]
pub struct Unfolder {
    /// The partial clause whose leftmost body goal is being resolved.
    goal: NodeId,
    /// The clause committed to by the last successful `get`.
    fresh: Option<NodeId>,
    /// Functor key into the database, when candidates exist.
    functor: Option<NodeId>,
    next: usize,
    end: usize,
    builtin: Builtin,
    attempted: bool,
    trail_sp: trail::Savepoint,
    store_sp: store::Savepoint,
}

impl Unfolder {
    pub fn new(cxt: &Context, db: &ClauseDb, goal: NodeId) -> Self {
        let trail_sp = cxt.trail.checkpoint();
        let store_sp = cxt.store.checkpoint();
        let mut functor = None;
        let mut end = 0;
        let mut builtin = Builtin::None;
        if let Some(first) = first_goal(&cxt.store, goal) {
            if let NodeKind::Struct {
                functor: f, args, ..
            } = cxt.store.kind(first)
            {
                let (f, arity) = (*f, args.len());
                let rules = db.rules_for(f);
                if !rules.is_empty() {
                    functor = Some(f);
                    end = rules.len();
                } else if arity == 2 && f == cxt.dif_atom {
                    builtin = Builtin::Dif;
                } else if arity == 2 && f == cxt.dup_atom {
                    builtin = Builtin::DuplicateTerm;
                }
            }
        }
        Self {
            goal,
            fresh: None,
            functor,
            next: 0,
            end,
            builtin,
            attempted: false,
            trail_sp,
            store_sp,
        }
    }

    /// Produce the next unfolding, or `None` when exhausted.
    ///
    /// The previous attempt's bindings and allocations are undone first, so
    /// each attempt starts from this frame's clean state.
    pub fn get(&mut self, cxt: &mut Context, db: &ClauseDb) -> Option<NodeId> {
        cxt.trail.rewind(self.trail_sp, &mut cxt.store);
        cxt.store.truncate(self.store_sp);
        let first = first_goal(&cxt.store, self.goal)?;

        match self.builtin {
            Builtin::Dif => {
                if self.attempted {
                    return None;
                }
                self.attempted = true;
                return self.discharge_dif(cxt, first);
            }
            Builtin::DuplicateTerm => {
                if self.attempted {
                    return None;
                }
                self.attempted = true;
                return self.discharge_duplicate(cxt, first);
            }
            Builtin::None => {}
        }

        let functor = self.functor?;
        while self.next < self.end {
            let clause = db.rules_for(functor)[self.next];
            self.next += 1;
            if cxt
                .unify
                .match_goal_rule(first, clause, &mut cxt.store, &mut cxt.trail)
            {
                let fresh = cxt.inst.instantiate_clause(&mut cxt.store, clause);
                let committed =
                    cxt.unify
                        .unify_goal_rule(first, fresh, &mut cxt.store, &mut cxt.trail);
                debug_assert!(committed, "a probed rule must commit");
                let mut body = woken_goals(&cxt.trail, &cxt.store);
                body.extend(clause_body_of(&cxt.store, fresh));
                body.extend(rest_of(&cxt.store, self.goal));
                self.fresh = Some(fresh);
                let head = clause_head_of(&cxt.store, self.goal);
                let id = clause_id_of(&cxt.store, fresh);
                return Some(cxt.store.alloc_clause(head, Vec::new(), body, id));
            }
        }
        None
    }

    /// `dif(A, B)`: discharge the goal when the operands are provably
    /// different, freeze the constraint on an open position, fail the branch
    /// when no distinguishing position exists.
    fn discharge_dif(&mut self, cxt: &mut Context, first: NodeId) -> Option<NodeId> {
        let a = crate::unify::struct_arg(&cxt.store, first, 0);
        let b = crate::unify::struct_arg(&cxt.store, first, 1);
        match cxt.dis.check(a, b, &cxt.store) {
            Disunify::Same => return None,
            Disunify::Different => {}
            Disunify::DeferVariable(var) => {
                dif::freeze_variable(var, first, &mut cxt.store, &mut cxt.trail)
            }
            Disunify::DeferAttr(attr) => {
                dif::freeze_attrvar(attr, first, &mut cxt.store, &mut cxt.trail)
            }
        }
        let body = rest_of(&cxt.store, self.goal);
        Some(self.successor(cxt, body))
    }

    /// `duplicate_term(Original, Copy)`: unify `Copy` with a fresh,
    /// structure-sharing-free copy of `Original`.
    fn discharge_duplicate(&mut self, cxt: &mut Context, first: NodeId) -> Option<NodeId> {
        let original = crate::unify::struct_arg(&cxt.store, first, 0);
        let target = crate::unify::struct_arg(&cxt.store, first, 1);
        let copy = cxt.inst.instantiate_term(&mut cxt.store, original);
        if !cxt
            .unify
            .unify(copy, target, &mut cxt.store, &mut cxt.trail)
        {
            return None;
        }
        let mut body = woken_goals(&cxt.trail, &cxt.store);
        body.extend(rest_of(&cxt.store, self.goal));
        Some(self.successor(cxt, body))
    }

    fn successor(&mut self, cxt: &mut Context, body: Vec<NodeId>) -> NodeId {
        let head = clause_head_of(&cxt.store, self.goal);
        let id = clause_id_of(&cxt.store, self.goal);
        let succ = cxt.store.alloc_clause(head, Vec::new(), body, id);
        self.fresh = Some(succ);
        succ
    }

    /// The clause the last successful `get` committed to, for proof display.
    pub fn reget(&self) -> Option<NodeId> {
        self.fresh
    }

    /// No further alternative remains; the solver drops such frames without
    /// re-entering them.
    pub fn at_end(&self) -> bool {
        self.next >= self.end && (self.builtin == Builtin::None || self.attempted)
    }
}

// //////////////////////////////// SOLVER ////////////////////////////////

/// Depth-bounded search over a stack of unfolders.
///
/// Each frame is an OR-choice point for one body goal; stacking expresses
/// AND-composition over the remaining goals. A frame is only pushed while
/// `stack.len() + body.len() <= max_depth`; deeper derivations are pruned
/// and picked up again by the next deepening round.
#[derive(Debug)]
pub struct Solver {
    stack: Vec<Unfolder>,
    trail_sp: trail::Savepoint,
    store_sp: store::Savepoint,
    max_depth: usize,
}

impl Solver {
    pub fn new(cxt: &Context, db: &ClauseDb, goal: NodeId, max_depth: usize) -> Self {
        let trail_sp = cxt.trail.checkpoint();
        let store_sp = cxt.store.checkpoint();
        Self {
            stack: vec![Unfolder::new(cxt, db, goal)],
            trail_sp,
            store_sp,
            max_depth,
        }
    }

    /// Search for the next proof at this depth bound. Returns the final
    /// partial clause (empty body) on success; on exhaustion the trail and
    /// arena are restored to their construction checkpoints and `None` is
    /// returned.
    pub fn get(&mut self, cxt: &mut Context, db: &ClauseDb) -> Option<NodeId> {
        loop {
            let Some(top) = self.stack.last_mut() else {
                break;
            };
            match top.get(cxt, db) {
                Some(next) => {
                    let body_len = body_len_of(&cxt.store, next);
                    if body_len == 0 {
                        return Some(next);
                    }
                    if self.stack.len() + body_len <= self.max_depth {
                        self.stack.push(Unfolder::new(cxt, db, next));
                    }
                }
                None => {
                    self.stack.pop();
                    while self.stack.last().map_or(false, Unfolder::at_end) {
                        self.stack.pop();
                    }
                }
            }
        }
        cxt.trail.rewind(self.trail_sp, &mut cxt.store);
        cxt.store.truncate(self.store_sp);
        None
    }

    /// The clause each live frame committed to, bottom-up: together they are
    /// the derivation of the current proof.
    pub fn steps(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.stack.iter().filter_map(Unfolder::reget)
    }

    /// Abort the search. Leaves the trail and arena exactly as they were
    /// when this solver was constructed.
    pub fn stop(&mut self, cxt: &mut Context) {
        self.stack.clear();
        cxt.trail.rewind(self.trail_sp, &mut cxt.store);
        cxt.store.truncate(self.store_sp);
    }

    pub fn at_end(&self) -> bool {
        self.stack.is_empty()
    }
}

// //////////////////////////////// CLAUSE ACCESS ////////////////////////////////

fn first_goal(store: &TermStore, clause: NodeId) -> Option<NodeId> {
    match store.kind(clause) {
        NodeKind::Clause { body, .. } => body.first().copied(),
        _ => None,
    }
}

pub(crate) fn clause_head_of(store: &TermStore, clause: NodeId) -> Option<NodeId> {
    match store.kind(clause) {
        NodeKind::Clause { head, .. } => *head,
        _ => None,
    }
}

fn clause_id_of(store: &TermStore, clause: NodeId) -> u32 {
    match store.kind(clause) {
        NodeKind::Clause { id, .. } => *id,
        _ => 0,
    }
}

fn clause_body_of(store: &TermStore, clause: NodeId) -> Vec<NodeId> {
    match store.kind(clause) {
        NodeKind::Clause { body, .. } => body.clone(),
        _ => Vec::new(),
    }
}

fn rest_of(store: &TermStore, clause: NodeId) -> Vec<NodeId> {
    match store.kind(clause) {
        NodeKind::Clause { body, .. } => body.iter().skip(1).copied().collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn body_len_of(store: &TermStore, clause: NodeId) -> usize {
    match store.kind(clause) {
        NodeKind::Clause { body, .. } => body.len(),
        _ => 0,
    }
}

/// Collect the frozen goals of every attributed variable touched by the last
/// unification, chain order preserved. These are re-inserted at the front of
/// the successor's body so constraints are re-checked before further
/// progress.
fn woken_goals(trail: &Trail, store: &TermStore) -> Vec<NodeId> {
    let mut goals = Vec::new();
    for &attr in trail.deferred_goals() {
        let mut cur = Some(attr);
        while let Some(n) = cur {
            match store.kind(n) {
                NodeKind::AttrVar { goal, next, .. } => {
                    goals.push(*goal);
                    cur = *next;
                }
                _ => break,
            }
        }
    }
    goals
}
