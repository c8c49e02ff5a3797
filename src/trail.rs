//! # The trail: a journal of union-find mutations
//!
//! Every structural mutation performed by the unifier (a `canonical`
//! redirection, a rank bump, an attr-chain splice) appends exactly one entry
//! here. Backtracking is implemented solely by rewinding this journal to a
//! savepoint (restoring canonical/rank/chain state in reverse order) and then
//! truncating the [`TermStore`](crate::store::TermStore) to the matching
//! allocation checkpoint. There is no other undo path.
//!
//! The trail also carries a small side buffer of attributed variables touched
//! by the current unification call. The resolver drains it to re-awaken the
//! frozen goals of those variables (see [`crate::resolve`]).

use crate::store::{NodeId, TermStore};

/// A position in the journal that can be rewound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Savepoint(usize);

#[derive(Debug)]
enum Entry {
    /// `node.canonical` was redirected; `ranked` records whether the
    /// survivor's rank was bumped alongside.
    Union { node: NodeId, ranked: bool },
    /// `node.next` was set while splicing two attr chains.
    Splice { node: NodeId },
}

/// Journal of structural mutations plus the deferred-goals side buffer.
#[derive(Debug, Default)]
pub struct Trail {
    entries: Vec<Entry>,
    deferred: Vec<NodeId>,
}

impl Trail {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            deferred: Vec::new(),
        }
    }

    /// Number of journal entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record the current journal position.
    pub fn checkpoint(&self) -> Savepoint {
        Savepoint(self.entries.len())
    }

    /// Pop entries LIFO down to the savepoint, reversing each mutation
    /// exactly. O(1) per entry.
    pub fn rewind(&mut self, savepoint: Savepoint, store: &mut TermStore) {
        debug_assert!(savepoint.0 <= self.entries.len());
        while self.entries.len() > savepoint.0 {
            match self.entries.pop().unwrap() {
                Entry::Union { node, ranked } => store.deunion(node, ranked),
                Entry::Splice { node } => store.unsplice(node),
            }
        }
    }

    pub(crate) fn push_union(&mut self, node: NodeId, ranked: bool) {
        self.entries.push(Entry::Union { node, ranked });
    }

    pub(crate) fn push_splice(&mut self, node: NodeId) {
        self.entries.push(Entry::Splice { node });
    }

    // //////////////////////////////// DEFERRED GOALS ////////////////////////////////

    /// Enqueue an attributed variable whose goal chain must be re-awoken.
    /// Duplicates within one unification call are dropped; first insertion
    /// order is kept.
    pub(crate) fn defer(&mut self, attr: NodeId) {
        if !self.deferred.contains(&attr) {
            self.deferred.push(attr);
        }
    }

    /// Reset the side buffer. Called at the start of each unification.
    pub(crate) fn clear_deferred(&mut self) {
        self.deferred.clear();
    }

    /// The attributed variables accumulated during the current unification.
    pub fn deferred_goals(&self) -> &[NodeId] {
        &self.deferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TermStore;
    use proptest::prelude::*;

    #[test]
    fn rewind_restores_links_and_ranks() {
        let mut store = TermStore::new();
        let mut trail = Trail::new();
        let a = store.alloc_variable("A");
        let b = store.alloc_variable("B");
        let c = store.alloc_variable("C");

        store.link(a, b, &mut trail);
        let before = store.union_state();
        let cp = trail.checkpoint();

        let root = store.find(a);
        store.link(root, c, &mut trail);
        let f = store.alloc_atom("f");
        store.replace_with(store.find(c), f, &mut trail);
        assert_ne!(store.union_state()[..before.len()], before[..]);

        trail.rewind(cp, &mut store);
        assert_eq!(store.union_state()[..before.len()], before[..]);
        // The pre-checkpoint link is untouched.
        assert_eq!(store.find(a), store.find(b));
    }

    #[test]
    fn rewind_cuts_spliced_chains() {
        let mut store = TermStore::new();
        let mut trail = Trail::new();
        let x = store.alloc_variable("X");
        let y = store.alloc_variable("Y");
        let g = store.alloc_atom("g");
        let ax = store.alloc_attrvar(x, g, None);
        let ay = store.alloc_attrvar(y, g, None);

        let cp = trail.checkpoint();
        let (demoted, survivor) = store.link(ax, ay, &mut trail);
        let tail = store.chain_tail(survivor);
        store.splice_chain(tail, demoted, &mut trail);
        assert_eq!(store.chain_tail(survivor), demoted);

        trail.rewind(cp, &mut store);
        assert_eq!(store.chain_tail(ax), ax);
        assert_eq!(store.chain_tail(ay), ay);
        assert_eq!(store.find(ax), ax);
    }

    /// One randomly chosen union-find mutation.
    #[derive(Debug, Clone)]
    enum Op {
        Link(usize, usize),
        Replace(usize, usize),
    }

    fn op_strategy(vars: usize) -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..vars, 0..vars).prop_map(|(a, b)| Op::Link(a, b)),
            (0..vars, 0..vars).prop_map(|(a, b)| Op::Replace(a, b)),
        ]
    }

    fn apply(store: &mut TermStore, trail: &mut Trail, vars: &[NodeId], op: &Op) {
        match *op {
            Op::Link(a, b) => {
                let (a, b) = (store.find(vars[a]), store.find(vars[b]));
                if a != b {
                    store.link(a, b, trail);
                }
            }
            Op::Replace(a, b) => {
                let (a, b) = (store.find(vars[a]), store.find(vars[b]));
                if a != b {
                    store.replace_with(a, b, trail);
                }
            }
        }
    }

    proptest! {
        /// Journal replay law: after rewinding to a checkpoint, the
        /// canonical-and-rank state of every node equals its state at the
        /// moment the checkpoint was taken.
        #[test]
        fn journal_replay_law(
            ops in proptest::collection::vec(op_strategy(8), 0..40),
            split in 0..40usize,
        ) {
            let mut store = TermStore::new();
            let mut trail = Trail::new();
            let vars: Vec<_> = (0..8)
                .map(|i| store.alloc_variable(&format!("V{}", i)))
                .collect();

            let split = split.min(ops.len());
            for op in &ops[..split] {
                apply(&mut store, &mut trail, &vars, op);
            }
            let snapshot = store.union_state();
            let cp = trail.checkpoint();
            for op in &ops[split..] {
                apply(&mut store, &mut trail, &vars, op);
            }
            trail.rewind(cp, &mut store);
            prop_assert_eq!(store.union_state(), snapshot);
        }
    }
}
