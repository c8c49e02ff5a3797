//! # Arena allocation for the term graph
//!
//! This module provides the single owner of all term nodes used while solving:
//! the [`TermStore`]. It stores nodes in a contiguous block of memory indexed
//! by handles rather than using pointers, and supports fast stack-based
//! deallocation through a checkpoint/truncate discipline.
//!
//! Every node carries the two mutable header fields used by union-find: a
//! `canonical` representative handle (initially the node itself) and a small
//! `rank` for union-by-rank. All mutations of these fields go through
//! [`TermStore::link`] and [`TermStore::replace_with`], which journal each
//! change in the [`Trail`](crate::trail::Trail) so that backtracking can
//! restore the exact prior topology.
//!
//! # Notes
//!
//! There are no safeguards against using [`NodeId`]s from one store with
//! another store. Since the implementation only uses safe Rust, nothing
//! *really* bad will happen in that case, but things might panic or silently
//! compute the wrong result.
//!
//! Truncation must be performed in the inverse order of checkpoint creation,
//! and only after the matching trail rewind: a node allocated after a
//! checkpoint may still be the `canonical` target of an older node until the
//! journal entries recording that redirection have been reversed.

use std::collections::HashMap;

use crate::trail::Trail;

/// Handle for a node stored inside a [`TermStore`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Return the ordinal number of this handle, for lookup tables indexed by
    /// node.
    #[inline(always)]
    pub fn ord(self) -> usize {
        self.0
    }
}

/// A memory allocation checkpoint that can be used for quickly releasing
/// nodes that have been allocated in a [`TermStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Savepoint(usize);

/// A term node: the union-find header plus the variant payload.
#[derive(Debug)]
pub struct Node {
    /// Representative handle. Following `canonical` eventually reaches a root
    /// node whose `canonical` is itself.
    canonical: NodeId,
    /// Union-by-rank weight. Changes only together with a journal entry.
    rank: u32,
    kind: NodeKind,
}

/// The payload of a term node.
#[derive(Debug)]
pub enum NodeKind {
    /// An unbound logic variable. The name is kept for display only.
    Var {
        name: String,
    },
    /// A variable that carries a chain of frozen goals. `next` links further
    /// attributed nodes accumulated for the same variable; insertion order of
    /// the chain is preserved across merges.
    AttrVar {
        var: NodeId,
        goal: NodeId,
        next: Option<NodeId>,
    },
    /// An interned symbol. One node exists per distinct string within a
    /// context (see [`AtomTable`]), so atom equality is handle equality.
    Atom {
        name: String,
    },
    /// A functor applied to an ordered argument list. `negated` records a
    /// leading `-` in the source and participates in matching.
    Struct {
        functor: NodeId,
        args: Vec<NodeId>,
        negated: bool,
    },
    /// A rule, a fact (empty body), or a top-level query (no head). The
    /// `cyck` set lists head variables that recur in the body and therefore
    /// need a cycle check after head unification.
    Clause {
        head: Option<NodeId>,
        cyck: Vec<NodeId>,
        body: Vec<NodeId>,
        id: u32,
    },
}

/// Arena owning every node of one solving context.
#[derive(Debug, Default)]
pub struct TermStore {
    nodes: Vec<Node>,
}

impl TermStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            canonical: id,
            rank: 0,
            kind,
        });
        id
    }

    /// Allocate a fresh unbound variable.
    pub fn alloc_variable(&mut self, name: &str) -> NodeId {
        self.alloc(NodeKind::Var {
            name: name.to_owned(),
        })
    }

    /// Allocate an atom node. Callers that need interning go through
    /// [`AtomTable::intern`] instead of calling this directly.
    pub fn alloc_atom(&mut self, name: &str) -> NodeId {
        self.alloc(NodeKind::Atom {
            name: name.to_owned(),
        })
    }

    /// Allocate a struct node applying `functor` to `args`.
    pub fn alloc_struct(&mut self, functor: NodeId, args: Vec<NodeId>, negated: bool) -> NodeId {
        self.alloc(NodeKind::Struct {
            functor,
            args,
            negated,
        })
    }

    /// Allocate an attributed variable wrapping `var` and carrying `goal`.
    /// `next` continues an existing chain for the same variable.
    pub fn alloc_attrvar(&mut self, var: NodeId, goal: NodeId, next: Option<NodeId>) -> NodeId {
        self.alloc(NodeKind::AttrVar { var, goal, next })
    }

    /// Allocate a clause node. A clause without a head is a top-level query.
    pub fn alloc_clause(
        &mut self,
        head: Option<NodeId>,
        cyck: Vec<NodeId>,
        body: Vec<NodeId>,
        id: u32,
    ) -> NodeId {
        self.alloc(NodeKind::Clause {
            head,
            cyck,
            body,
            id,
        })
    }

    /// Access the payload of a node.
    #[inline(always)]
    pub fn kind(&self, n: NodeId) -> &NodeKind {
        &self.nodes[n.0].kind
    }

    /// Record the current allocation boundary.
    pub fn checkpoint(&self) -> Savepoint {
        Savepoint(self.nodes.len())
    }

    /// Destroy all nodes allocated after the savepoint. The matching trail
    /// rewind must happen first so that no surviving node still points at a
    /// destroyed one.
    pub fn truncate(&mut self, savepoint: Savepoint) {
        debug_assert!(savepoint.0 <= self.nodes.len());
        self.nodes.truncate(savepoint.0);
    }

    // //////////////////////////////// UNION-FIND ////////////////////////////////

    /// Find the canonical representative of `n` by walking `canonical`
    /// handles to the root. No path compression is performed, so the walk
    /// needs no journal entries.
    pub fn find(&self, mut n: NodeId) -> NodeId {
        while self.nodes[n.0].canonical != n {
            n = self.nodes[n.0].canonical;
        }
        n
    }

    /// Join two distinct roots by rank: the lower-ranked root becomes a child
    /// of the higher-ranked one; on a tie the survivor's rank is bumped.
    /// Returns `(demoted, survivor)`; one journal entry is appended for the
    /// demoted node.
    pub fn link(&mut self, x: NodeId, y: NodeId, trail: &mut Trail) -> (NodeId, NodeId) {
        debug_assert!(self.nodes[x.0].canonical == x && self.nodes[y.0].canonical == y);
        debug_assert_ne!(x, y);
        let (mut child, mut parent) = (x, y);
        if self.nodes[child.0].rank > self.nodes[parent.0].rank {
            std::mem::swap(&mut child, &mut parent);
        }
        let ranked = self.nodes[child.0].rank == self.nodes[parent.0].rank;
        if ranked {
            self.nodes[parent.0].rank += 1;
        }
        self.nodes[child.0].canonical = parent;
        trail.push_union(child, ranked);
        (child, parent)
    }

    /// Point `n` at `e` unconditionally, bumping `e`'s rank when the ranks
    /// matched. Used for variable-to-term substitution, where the direction
    /// is dictated by the term kinds rather than by rank.
    pub fn replace_with(&mut self, n: NodeId, e: NodeId, trail: &mut Trail) {
        debug_assert_ne!(n, e);
        let ranked = self.nodes[n.0].rank == self.nodes[e.0].rank;
        if ranked {
            self.nodes[e.0].rank += 1;
        }
        self.nodes[n.0].canonical = e;
        trail.push_union(n, ranked);
    }

    /// Reverse one link: restore `n` as its own representative and undo the
    /// survivor's rank bump if one was journalled. Only the trail calls this,
    /// strictly in LIFO order.
    pub(crate) fn deunion(&mut self, n: NodeId, ranked: bool) {
        let parent = self.nodes[n.0].canonical;
        if ranked {
            self.nodes[parent.0].rank -= 1;
        }
        self.nodes[n.0].canonical = n;
    }

    // //////////////////////////////// ATTR CHAINS ////////////////////////////////

    /// Walk an attributed variable's `next` chain to its last element.
    pub fn chain_tail(&self, mut attr: NodeId) -> NodeId {
        loop {
            match &self.nodes[attr.0].kind {
                NodeKind::AttrVar {
                    next: Some(next), ..
                } => attr = *next,
                _ => return attr,
            }
        }
    }

    /// Splice `chain` onto the attributed variable `tail` (which must be the
    /// end of its chain). Journalled so that rewinding cuts the link again.
    pub fn splice_chain(&mut self, tail: NodeId, chain: NodeId, trail: &mut Trail) {
        match &mut self.nodes[tail.0].kind {
            NodeKind::AttrVar { next, .. } => {
                debug_assert!(next.is_none());
                *next = Some(chain);
                trail.push_splice(tail);
            }
            _ => unreachable!("splice target must be an attributed variable"),
        }
    }

    /// Overwrite the goal of a freshly copied attributed variable. Not
    /// journalled: instantiation patches copies before anything else can
    /// observe them, never nodes that predate the current checkpoint.
    pub(crate) fn patch_attr_goal(&mut self, attr: NodeId, goal: NodeId) {
        match &mut self.nodes[attr.0].kind {
            NodeKind::AttrVar { goal: slot, .. } => *slot = goal,
            _ => unreachable!("patch target must be an attributed variable"),
        }
    }

    /// Reverse one splice. Only the trail calls this.
    pub(crate) fn unsplice(&mut self, tail: NodeId) {
        match &mut self.nodes[tail.0].kind {
            NodeKind::AttrVar { next, .. } => *next = None,
            _ => unreachable!("unsplice target must be an attributed variable"),
        }
    }

    /// Snapshot of `(canonical, rank)` for every node, used by tests to state
    /// the journal replay law.
    #[cfg(test)]
    pub(crate) fn union_state(&self) -> Vec<(NodeId, u32)> {
        self.nodes.iter().map(|n| (n.canonical, n.rank)).collect()
    }
}

/// Name-to-atom interning map maintained by the parser and the context.
///
/// Atom equality is handle equality precisely because every allocation goes
/// through this table. Atoms are allocated while loading the program, before
/// the solver takes its first checkpoint, so truncation never destroys an
/// interned atom.
#[derive(Debug, Default)]
pub struct AtomTable {
    names: HashMap<String, NodeId>,
}

impl AtomTable {
    pub fn new() -> Self {
        Self {
            names: HashMap::new(),
        }
    }

    /// Return the unique atom node for `name`, allocating it on first use.
    pub fn intern(&mut self, store: &mut TermStore, name: &str) -> NodeId {
        if let Some(&atom) = self.names.get(name) {
            atom
        } else {
            let atom = store.alloc_atom(name);
            self.names.insert(name.to_owned(), atom);
            atom
        }
    }

    /// Look up an atom without allocating.
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trail::Trail;

    #[test]
    fn checkpoint_truncate_roundtrip() {
        let mut store = TermStore::new();
        for i in 0..5 {
            store.alloc_variable(&format!("X{}", i));
        }
        let cp = store.checkpoint();
        for i in 0..7 {
            store.alloc_variable(&format!("Y{}", i));
        }
        assert_eq!(store.len(), 12);
        store.truncate(cp);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn find_reaches_root() {
        let mut store = TermStore::new();
        let mut trail = Trail::new();
        let a = store.alloc_variable("A");
        let b = store.alloc_variable("B");
        let c = store.alloc_variable("C");
        store.link(a, b, &mut trail);
        let root_ab = store.find(a);
        store.link(root_ab, c, &mut trail);
        let root = store.find(a);
        assert_eq!(store.find(root), root);
        assert_eq!(store.find(b), root);
        assert_eq!(store.find(c), root);
    }

    #[test]
    fn link_by_rank() {
        let mut store = TermStore::new();
        let mut trail = Trail::new();
        let a = store.alloc_variable("A");
        let b = store.alloc_variable("B");
        let c = store.alloc_variable("C");
        // Equal ranks: second argument survives with a bumped rank.
        let (child, parent) = store.link(a, b, &mut trail);
        assert_eq!((child, parent), (a, b));
        // A fresh rank-0 node now loses against the rank-1 root.
        let (child, parent) = store.link(c, b, &mut trail);
        assert_eq!((child, parent), (c, b));
    }

    #[test]
    fn atoms_are_interned() {
        let mut store = TermStore::new();
        let mut atoms = AtomTable::new();
        let foo = atoms.intern(&mut store, "foo");
        let bar = atoms.intern(&mut store, "bar");
        assert_ne!(foo, bar);
        assert_eq!(atoms.intern(&mut store, "foo"), foo);
        assert_eq!(atoms.get("bar"), Some(bar));
        assert_eq!(atoms.get("baz"), None);
    }
}
