use std::collections::HashMap;
use std::fmt::{self, Write};

use crate::store::{NodeId, NodeKind, TermStore};

/// A pretty-printer for terms and clauses.
///
/// Variables render as `name#k`, where `k` is a per-name counter assigned on
/// first display; this keeps alpha-equivalent variables with identical source
/// names apart. Attributed variables additionally render their frozen-goal
/// chain in `{...}` after the variable name. Canonical representatives are
/// followed transparently, and a back-edge into a struct that is already
/// being printed renders as `...`, so rational terms print finitely.
///
/// Ordinals are assigned per printer instance: one printer per proof keeps
/// the numbering consistent across all lines of that proof.
pub struct Printer<'s> {
    store: &'s TermStore,
    var_ids: HashMap<NodeId, usize>,
    name_counts: HashMap<String, usize>,
    path: Vec<NodeId>,
}

impl<'s> Printer<'s> {
    pub fn new(store: &'s TermStore) -> Self {
        Self {
            store,
            var_ids: HashMap::new(),
            name_counts: HashMap::new(),
            path: Vec::new(),
        }
    }

    /// Forget all assigned variable ordinals.
    pub fn reset(&mut self) {
        self.var_ids.clear();
        self.name_counts.clear();
    }

    pub fn term_to_string(&mut self, term: NodeId) -> String {
        let mut out = String::new();
        self.write_term(&mut out, term).unwrap();
        out
    }

    pub fn clause_to_string(&mut self, clause: NodeId) -> String {
        let mut out = String::new();
        self.write_clause(&mut out, clause).unwrap();
        out
    }

    pub fn write_term<W: Write>(&mut self, w: &mut W, term: NodeId) -> fmt::Result {
        let store = self.store;
        let n = store.find(term);
        match store.kind(n) {
            NodeKind::Var { name } => {
                let k = self.var_ordinal(n, name);
                write!(w, "{}#{}", name, k)
            }
            NodeKind::AttrVar { .. } => self.write_attrvar(w, n),
            NodeKind::Atom { name } => w.write_str(name),
            NodeKind::Struct { .. } => self.write_struct(w, n),
            NodeKind::Clause { .. } => self.write_clause(w, n),
        }
    }

    pub fn write_clause<W: Write>(&mut self, w: &mut W, clause: NodeId) -> fmt::Result {
        let store = self.store;
        let (head, cyck, body, id) = match store.kind(clause) {
            NodeKind::Clause {
                head,
                cyck,
                body,
                id,
            } => (*head, cyck, body, *id),
            _ => return self.write_term(w, clause),
        };
        write!(w, "{}.", id)?;
        if let Some(head) = head {
            w.write_str(" ")?;
            self.write_term(w, head)?;
            if !cyck.is_empty() {
                w.write_str(" [")?;
                for (i, &var) in cyck.iter().enumerate() {
                    if i > 0 {
                        w.write_str(", ")?;
                    }
                    self.write_raw_var(w, var)?;
                }
                w.write_str("]")?;
            }
        }
        if !body.is_empty() {
            w.write_str(" :- ")?;
            for (i, &goal) in body.iter().enumerate() {
                if i > 0 {
                    w.write_str(", ")?;
                }
                self.write_term(w, goal)?;
            }
        }
        w.write_str(".")
    }

    fn write_struct<W: Write>(&mut self, w: &mut W, n: NodeId) -> fmt::Result {
        let store = self.store;
        if self.path.contains(&n) {
            return w.write_str("...");
        }
        let (functor, args, negated) = match store.kind(n) {
            NodeKind::Struct {
                functor,
                args,
                negated,
            } => (*functor, args, *negated),
            _ => unreachable!("expected a struct node"),
        };
        self.path.push(n);
        if negated {
            w.write_str("-")?;
        }
        self.write_term(w, functor)?;
        if let Some((first, rest)) = args.split_first() {
            w.write_str("(")?;
            self.write_term(w, *first)?;
            for &arg in rest {
                w.write_str(", ")?;
                self.write_term(w, arg)?;
            }
            w.write_str(")")?;
        }
        self.path.pop();
        Ok(())
    }

    fn write_attrvar<W: Write>(&mut self, w: &mut W, n: NodeId) -> fmt::Result {
        let store = self.store;
        let var = match store.kind(n) {
            NodeKind::AttrVar { var, .. } => *var,
            _ => unreachable!("expected an attributed variable"),
        };
        self.write_raw_var(w, var)?;
        // Goals inside the chain mention the variable itself; print those
        // occurrences bare instead of recursing into the chain again.
        if self.path.contains(&n) {
            return Ok(());
        }
        self.path.push(n);
        w.write_str("{")?;
        let mut cur = Some(n);
        let mut first = true;
        while let Some(attr) = cur {
            let (goal, next) = match store.kind(attr) {
                NodeKind::AttrVar { goal, next, .. } => (*goal, *next),
                _ => break,
            };
            if !first {
                w.write_str(", ")?;
            }
            first = false;
            self.write_term(w, goal)?;
            cur = next;
        }
        w.write_str("}")?;
        self.path.pop();
        Ok(())
    }

    /// Print a variable node by name and ordinal without resolving it; used
    /// for `cyck` sets and the wrapped variables of attributed nodes, which
    /// may be bound.
    fn write_raw_var<W: Write>(&mut self, w: &mut W, var: NodeId) -> fmt::Result {
        let store = self.store;
        match store.kind(var) {
            NodeKind::Var { name } => {
                let k = self.var_ordinal(var, name);
                write!(w, "{}#{}", name, k)
            }
            _ => self.write_term(w, var),
        }
    }

    fn var_ordinal(&mut self, var: NodeId, name: &str) -> usize {
        if let Some(&k) = self.var_ids.get(&var) {
            k
        } else {
            let count = self.name_counts.entry(name.to_owned()).or_insert(0);
            *count += 1;
            self.var_ids.insert(var, *count);
            *count
        }
    }
}
