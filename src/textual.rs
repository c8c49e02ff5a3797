//! # The textual interface
//!
//! This module ties the engine to the surface syntax. A [`Session`] owns one
//! program: the term store and trail, the atom interning table, the clause
//! database, and the queries collected while loading. Loading more text adds
//! to the same program; [`Session::run_goals`] proves the queued queries in
//! order, emitting a proof trace or `NP` for each.
//!
//! Syntactic elements:
//! - **Variables**: an identifier starting with an uppercase letter, e.g.
//!   `X`, `Acc`. Repeated occurrences within one clause denote the same
//!   variable.
//! - **Atoms**: an identifier starting with a lowercase letter, possibly
//!   containing underscores, e.g. `foo`, `is_natural`.
//! - **Compound terms**: a functor applied to arguments, e.g. `s(z)` or
//!   `add(X, z, X)`. A leading `-` marks the term as negated; the flag takes
//!   part in matching but carries no further semantics.
//! - **Facts**: `head.`
//! - **Rules**: `head :- goal_1, ..., goal_n.`
//! - **Queries**: `:- goal_1, ..., goal_n.`
//! - **Comments**: `#` to the end of the line.
//!
//! The builtin predicates `dif/2` and `duplicate_term/2` are available
//! unless the program defines rules for those functors itself.

mod lexer;
mod parser;
mod pretty;

use std::io;

pub use self::parser::{ParseError, ParseErrorKind, Parser};
pub use self::pretty::Printer;

use crate::resolve::{clause_head_of, ClauseDb, Context, Solver, DEFAULT_MAX_DEPTH};
use crate::store::{AtomTable, NodeId, NodeKind, TermStore};

/// A loaded program together with its solving state.
///
/// # Example
///
/// ```
/// let mut session = ratlog::Session::new();
/// session
///     .load_str(
///         r"
/// is_natural(z).
/// is_natural(s(X)) :- is_natural(X).
/// ",
///     )
///     .unwrap();
/// let output = session.run_query_str("is_natural(s(s(z))).").unwrap();
/// assert!(output.starts_with("PROOF:"));
/// assert!(output.contains("yes"));
/// ```
pub struct Session {
    cxt: Context,
    atoms: AtomTable,
    db: ClauseDb,
    goals: Vec<NodeId>,
    next_clause_id: u32,
    yes_atom: NodeId,
}

impl Session {
    pub fn new() -> Self {
        let mut store = TermStore::new();
        let mut atoms = AtomTable::new();
        let dif_atom = atoms.intern(&mut store, "dif");
        let dup_atom = atoms.intern(&mut store, "duplicate_term");
        let yes_atom = atoms.intern(&mut store, "yes");
        Self {
            cxt: Context::new(store, dif_atom, dup_atom),
            atoms,
            db: ClauseDb::new(),
            goals: Vec::new(),
            next_clause_id: 0,
            yes_atom,
        }
    }

    /// Load a set of clauses. Facts and rules enter the database; queries
    /// are queued for [`Session::run_goals`].
    pub fn load_str(&mut self, source: &str) -> Result<(), ParseError> {
        let clauses = Parser::new(
            &mut self.cxt.store,
            &mut self.atoms,
            &mut self.next_clause_id,
        )
        .parse_program(source)?;
        for clause in clauses {
            if clause_head_of(&self.cxt.store, clause).is_some() {
                self.db.insert(&self.cxt.store, clause);
            } else {
                self.goals.push(clause);
            }
        }
        Ok(())
    }

    /// Prove every queued query in order, writing a proof trace or `NP` for
    /// each.
    pub fn run_goals<W: io::Write>(&mut self, out: &mut W) -> io::Result<()> {
        let goals = std::mem::take(&mut self.goals);
        for goal in goals {
            self.run_goal(goal, out)?;
        }
        Ok(())
    }

    /// Parse a goal conjunction (e.g. `p(X), q(X).`) and prove it
    /// immediately, returning the rendered outcome.
    pub fn run_query_str(&mut self, line: &str) -> Result<String, ParseError> {
        let goals = Parser::new(
            &mut self.cxt.store,
            &mut self.atoms,
            &mut self.next_clause_id,
        )
        .parse_goals_str(line)?;
        self.next_clause_id += 1;
        let query = self
            .cxt
            .store
            .alloc_clause(None, Vec::new(), goals, self.next_clause_id);
        let mut buf = Vec::new();
        self.run_goal(query, &mut buf)
            .expect("writing to a buffer cannot fail");
        Ok(String::from_utf8(buf).expect("printer output is UTF-8"))
    }

    /// Iterative deepening over one query: probe depth bounds `1..=D_max`
    /// until a solver yields a proof.
    fn run_goal<W: io::Write>(&mut self, query: NodeId, out: &mut W) -> io::Result<()> {
        let answer_clause = self.answer_clause(query);
        for depth in 1..=DEFAULT_MAX_DEPTH {
            let mut solver = Solver::new(&self.cxt, &self.db, answer_clause, depth);
            if let Some(answer) = solver.get(&mut self.cxt, &self.db) {
                let mut printer = Printer::new(&self.cxt.store);
                writeln!(out, "PROOF:")?;
                let steps: Vec<NodeId> = solver.steps().collect();
                let mut lines = Vec::with_capacity(steps.len() + 1);
                for step in steps {
                    lines.push(printer.clause_to_string(step));
                }
                let head = clause_head_of(&self.cxt.store, answer);
                let answer_line = head.map(|h| printer.term_to_string(h));
                for line in lines {
                    writeln!(out, "{}", line)?;
                }
                writeln!(out)?;
                if let Some(answer_line) = answer_line {
                    writeln!(out, "{}", answer_line)?;
                }
                writeln!(out)?;
                solver.stop(&mut self.cxt);
                return Ok(());
            }
            // Exhaustion already restored the trail and arena; retry deeper.
            debug_assert!(solver.at_end());
        }
        writeln!(out, "NP")?;
        writeln!(out)
    }

    /// Wrap a query in a synthetic answer clause `yes(V1, ..., Vn) :- goals`,
    /// where the `Vi` are the query's distinct variables in order of first
    /// occurrence. The bound head is what gets displayed as the answer.
    fn answer_clause(&mut self, query: NodeId) -> NodeId {
        let (body, id) = match self.cxt.store.kind(query) {
            NodeKind::Clause { body, id, .. } => (body.clone(), *id),
            _ => unreachable!("queries are clause nodes"),
        };
        let mut vars = Vec::new();
        for &goal in &body {
            collect_vars(&self.cxt.store, goal, &mut vars);
        }
        let head = self.cxt.store.alloc_struct(self.yes_atom, vars, false);
        self.cxt.store.alloc_clause(Some(head), Vec::new(), body, id)
    }

    /// Render every stored clause, in declaration order.
    pub fn listing(&self) -> String {
        let mut clauses: Vec<(u32, NodeId)> = self
            .db
            .iter()
            .map(|clause| match self.cxt.store.kind(clause) {
                NodeKind::Clause { id, .. } => (*id, clause),
                _ => unreachable!("the database holds clause nodes"),
            })
            .collect();
        clauses.sort_by_key(|(id, _)| *id);
        let mut printer = Printer::new(&self.cxt.store);
        let mut out = String::new();
        for (_, clause) in clauses {
            out.push_str(&printer.clause_to_string(clause));
            out.push('\n');
        }
        out
    }

    pub fn context(&self) -> &Context {
        &self.cxt
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Distinct variables reachable from a term, in first-occurrence order.
fn collect_vars(store: &TermStore, term: NodeId, vars: &mut Vec<NodeId>) {
    let n = store.find(term);
    match store.kind(n) {
        NodeKind::Var { .. } | NodeKind::AttrVar { .. } => {
            if !vars.contains(&n) {
                vars.push(n);
            }
        }
        NodeKind::Atom { .. } => {}
        NodeKind::Struct { args, .. } => {
            for &arg in args {
                collect_vars(store, arg, vars);
            }
        }
        NodeKind::Clause { head, body, .. } => {
            if let Some(head) = head {
                collect_vars(store, *head, vars);
            }
            for &goal in body {
                collect_vars(store, goal, vars);
            }
        }
    }
}
