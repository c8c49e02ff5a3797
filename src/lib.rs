//! # Logic programming over rational trees
//!
//! Ratlog is a solver for definite-clause programs that searches for proofs
//! using SLD resolution, extended in three ways:
//!
//! - **Rational-tree unification**: `X = f(X)` succeeds, representing the
//!   infinite term finitely through union-find. Clauses whose head variables
//!   recur in the body reject cyclic bindings at use time.
//! - **Iterative deepening**: each query is retried with growing depth
//!   bounds, so any proof of bounded derivation length is found even in the
//!   presence of left recursion.
//! - **Disequality constraints**: `dif(X, Y)` freezes itself on an unbound
//!   position as an attributed variable and is re-checked whenever a
//!   unification touches that variable.
//!
//! The engine lives in [`store`] (the arena-owned term graph with its
//! union-find headers), [`trail`] (the mutation journal that implements
//! backtracking), [`unify`], [`dif`], and [`resolve`] (unfolding and the
//! depth-bounded solver stack). The [`textual`] module adds the Prolog-like
//! surface syntax.
//!
//! # Example
//!
//! ```
//! let mut session = ratlog::Session::new();
//! session
//!     .load_str(
//!         r"
//! ## Peano naturals
//! nat(z).
//! nat(s(X)) :- nat(X).
//! ",
//!     )
//!     .unwrap();
//!
//! let output = session.run_query_str("nat(s(s(z))).").unwrap();
//! assert!(output.starts_with("PROOF:"));
//!
//! // dif/2 defers until its arguments are distinguishable.
//! let mut session = ratlog::Session::new();
//! session.load_str("eq(X, X).").unwrap();
//! let output = session.run_query_str("dif(X, a), eq(X, b).").unwrap();
//! assert!(output.contains("yes(b)"));
//! ```

pub mod dif;
pub mod resolve;
pub mod store;
pub mod textual;
pub mod trail;
pub mod unify;

pub use resolve::{ClauseDb, Context, Solver, Unfolder, DEFAULT_MAX_DEPTH};
pub use store::{AtomTable, NodeId, TermStore};
pub use textual::Session;
pub use trail::Trail;
