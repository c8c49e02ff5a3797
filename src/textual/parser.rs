use std::collections::{HashMap, HashSet};
use std::iter::Peekable;

use logos::{Logos, Span, SpannedIter};
use thiserror::Error;

use crate::store::{AtomTable, NodeId, TermStore};

use super::lexer::Token;

struct TokenStream<'a> {
    source: &'a str,
    lexer: Peekable<SpannedIter<'a, Token>>,
}

impl<'a> TokenStream<'a> {
    pub fn new(source: &'a str) -> Self {
        let lexer = Token::lexer(source).spanned().peekable();

        Self { source, lexer }
    }

    pub fn next(&mut self) -> Option<(Token, Span)> {
        self.lexer.next()
    }

    pub fn advance(&mut self) {
        self.lexer.next();
    }

    pub fn peek_token(&mut self) -> Option<Token> {
        self.lexer.peek().map(|(tok, _)| tok).cloned()
    }

    pub fn slice(&self, span: &Span) -> &str {
        &self.source[span.clone()]
    }

    /// 1-based line and column of a span's start.
    pub fn position(&self, span: &Span) -> (usize, usize) {
        let upto = &self.source[..span.start];
        let row = upto.matches('\n').count() + 1;
        let col = match upto.rfind('\n') {
            Some(newline) => span.start - newline,
            None => span.start + 1,
        };
        (row, col)
    }

    pub fn eof(&self) -> Span {
        self.source.len()..self.source.len()
    }
}

/// A parse failure, locating the offending symbol in the source.
#[derive(Debug, Error)]
#[error("{kind} at line {row}, column {col}")]
pub struct ParseError {
    pub row: usize,
    pub col: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: &'static str },
    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },
}

/// Recursive-descent parser producing term graphs directly in the store.
///
/// Within one clause, repeated occurrences of a variable name denote the same
/// variable node; the scope resets between clauses. Atoms are interned
/// program-wide through the [`AtomTable`].
pub struct Parser<'u> {
    store: &'u mut TermStore,
    atoms: &'u mut AtomTable,
    next_clause_id: &'u mut u32,
    vars: HashMap<String, NodeId>,
    head_vars: Vec<NodeId>,
    body_vars: HashSet<NodeId>,
    in_head: bool,
}

impl<'u> Parser<'u> {
    pub fn new(
        store: &'u mut TermStore,
        atoms: &'u mut AtomTable,
        next_clause_id: &'u mut u32,
    ) -> Self {
        Self {
            store,
            atoms,
            next_clause_id,
            vars: HashMap::new(),
            head_vars: Vec::new(),
            body_vars: HashSet::new(),
            in_head: false,
        }
    }

    // //////////////////////////////// PUBLIC PARSER ////////////////////////////////

    /// Parse a whole program: a sequence of facts, rules, and queries.
    pub fn parse_program(&mut self, source: &str) -> Result<Vec<NodeId>, ParseError> {
        let mut tokens = TokenStream::new(source);
        let mut clauses = Vec::new();
        while tokens.peek_token().is_some() {
            clauses.push(self.parse_clause(&mut tokens)?);
        }
        Ok(clauses)
    }

    /// Parse a single clause from a string.
    pub fn parse_clause_str(&mut self, source: &str) -> Result<NodeId, ParseError> {
        let mut tokens = TokenStream::new(source);
        let clause = self.parse_clause(&mut tokens)?;
        self.expect_eof(&mut tokens)?;
        Ok(clause)
    }

    /// Parse a bare goal conjunction terminated by `.`, e.g. a query typed
    /// into the shell.
    pub fn parse_goals_str(&mut self, source: &str) -> Result<Vec<NodeId>, ParseError> {
        let mut tokens = TokenStream::new(source);
        self.enter_clause_scope(false);
        let goals = self.parse_conjunction1(&mut tokens)?;
        self.expect_eof(&mut tokens)?;
        Ok(goals)
    }

    // //////////////////////////////// PARSER INTERNALS ////////////////////////////////

    fn enter_clause_scope(&mut self, in_head: bool) {
        self.vars.clear();
        self.head_vars.clear();
        self.body_vars.clear();
        self.in_head = in_head;
    }

    fn parse_clause(&mut self, tokens: &mut TokenStream) -> Result<NodeId, ParseError> {
        self.enter_clause_scope(true);
        let head;
        let body;
        if let Some(Token::ImpliedBy) = tokens.peek_token() {
            tokens.advance();
            self.in_head = false;
            head = None;
            body = self.parse_conjunction1(tokens)?;
        } else {
            head = Some(self.parse_struct(tokens)?);
            self.in_head = false;
            body = match tokens.peek_token() {
                Some(Token::ImpliedBy) => {
                    tokens.advance();
                    self.parse_conjunction1(tokens)?
                }
                Some(Token::Period) => {
                    tokens.advance();
                    Vec::new()
                }
                Some(_) => return Err(unexpected(tokens, "':-' or '.'")),
                None => return Err(eof_error(tokens, "':-' or '.'")),
            };
        }
        // Head variables that recur in the body need a cycle check whenever
        // this clause is used.
        let cyck = self
            .head_vars
            .iter()
            .filter(|v| self.body_vars.contains(v))
            .copied()
            .collect();
        *self.next_clause_id += 1;
        Ok(self.store.alloc_clause(head, cyck, body, *self.next_clause_id))
    }

    /// One or more structs separated by `,`, terminated by `.` (consumed).
    fn parse_conjunction1(&mut self, tokens: &mut TokenStream) -> Result<Vec<NodeId>, ParseError> {
        let mut goals = vec![self.parse_struct(tokens)?];
        loop {
            match tokens.peek_token() {
                Some(Token::Comma) => {
                    tokens.advance();
                    goals.push(self.parse_struct(tokens)?);
                }
                Some(Token::Period) => {
                    tokens.advance();
                    break;
                }
                Some(_) => return Err(unexpected(tokens, "',' or '.'")),
                None => return Err(eof_error(tokens, "',' or '.'")),
            }
        }
        Ok(goals)
    }

    /// A goal position: `[-] functor [(args)]`. Always yields a struct, even
    /// without arguments.
    fn parse_struct(&mut self, tokens: &mut TokenStream) -> Result<NodeId, ParseError> {
        let negated = self.accept_minus(tokens);
        let functor = self.parse_atom_symbol(tokens)?;
        let args = self.parse_optional_args(tokens)?;
        Ok(self.store.alloc_struct(functor, args, negated))
    }

    /// An argument position: a variable, an atom, or a compound term.
    fn parse_term(&mut self, tokens: &mut TokenStream) -> Result<NodeId, ParseError> {
        match tokens.peek_token() {
            Some(Token::Variable) => self.parse_variable(tokens),
            Some(Token::Atom) | Some(Token::Minus) => {
                let negated = self.accept_minus(tokens);
                let functor = self.parse_atom_symbol(tokens)?;
                if let Some(Token::LParen) = tokens.peek_token() {
                    let args = self.parse_optional_args(tokens)?;
                    Ok(self.store.alloc_struct(functor, args, negated))
                } else if negated {
                    // A negated bare name has no atom form; keep the flag on
                    // a 0-ary struct.
                    Ok(self.store.alloc_struct(functor, Vec::new(), negated))
                } else {
                    Ok(functor)
                }
            }
            Some(_) => Err(unexpected(tokens, "a variable or a term")),
            None => Err(eof_error(tokens, "a variable or a term")),
        }
    }

    fn parse_optional_args(&mut self, tokens: &mut TokenStream) -> Result<Vec<NodeId>, ParseError> {
        let mut args = Vec::new();
        if let Some(Token::LParen) = tokens.peek_token() {
            tokens.advance();
            loop {
                args.push(self.parse_term(tokens)?);
                match tokens.peek_token() {
                    Some(Token::Comma) => tokens.advance(),
                    Some(Token::RParen) => {
                        tokens.advance();
                        break;
                    }
                    Some(_) => return Err(unexpected(tokens, "',' or ')'")),
                    None => return Err(eof_error(tokens, "',' or ')'")),
                }
            }
        }
        Ok(args)
    }

    fn parse_variable(&mut self, tokens: &mut TokenStream) -> Result<NodeId, ParseError> {
        let span = self.expect(tokens, Token::Variable, "a variable")?;
        let name = tokens.slice(&span);
        let var = if let Some(&var) = self.vars.get(name) {
            var
        } else {
            let var = self.store.alloc_variable(name);
            self.vars.insert(name.to_owned(), var);
            var
        };
        if self.in_head {
            if !self.head_vars.contains(&var) {
                self.head_vars.push(var);
            }
        } else {
            self.body_vars.insert(var);
        }
        Ok(var)
    }

    fn parse_atom_symbol(&mut self, tokens: &mut TokenStream) -> Result<NodeId, ParseError> {
        let span = self.expect(tokens, Token::Atom, "an atom")?;
        let name = tokens.slice(&span).to_owned();
        Ok(self.atoms.intern(self.store, &name))
    }

    fn accept_minus(&mut self, tokens: &mut TokenStream) -> bool {
        if let Some(Token::Minus) = tokens.peek_token() {
            tokens.advance();
            true
        } else {
            false
        }
    }

    fn expect(
        &mut self,
        tokens: &mut TokenStream,
        expected: Token,
        what: &'static str,
    ) -> Result<Span, ParseError> {
        match tokens.next() {
            Some((actual, span)) if actual == expected => Ok(span),
            Some((_, span)) => {
                let (row, col) = tokens.position(&span);
                Err(ParseError {
                    row,
                    col,
                    kind: ParseErrorKind::UnexpectedToken {
                        expected: what,
                        found: tokens.slice(&span).to_owned(),
                    },
                })
            }
            None => Err(eof_error(tokens, what)),
        }
    }

    fn expect_eof(&mut self, tokens: &mut TokenStream) -> Result<(), ParseError> {
        match tokens.next() {
            Some((_, span)) => {
                let (row, col) = tokens.position(&span);
                Err(ParseError {
                    row,
                    col,
                    kind: ParseErrorKind::UnexpectedToken {
                        expected: "end of input",
                        found: tokens.slice(&span).to_owned(),
                    },
                })
            }
            None => Ok(()),
        }
    }
}

fn unexpected(tokens: &mut TokenStream, expected: &'static str) -> ParseError {
    match tokens.next() {
        Some((_, span)) => {
            let (row, col) = tokens.position(&span);
            ParseError {
                row,
                col,
                kind: ParseErrorKind::UnexpectedToken {
                    expected,
                    found: tokens.slice(&span).to_owned(),
                },
            }
        }
        None => eof_error(tokens, expected),
    }
}

fn eof_error(tokens: &TokenStream, expected: &'static str) -> ParseError {
    let span = tokens.eof();
    let (row, col) = tokens.position(&span);
    ParseError {
        row,
        col,
        kind: ParseErrorKind::UnexpectedEof { expected },
    }
}

#[cfg(test)]
mod tests {
    use super::super::pretty::Printer;
    use super::*;

    fn clause_roundtrip(input: &str, expected: &str) {
        let mut store = TermStore::new();
        let mut atoms = AtomTable::new();
        let mut next_id = 0;
        let mut parser = Parser::new(&mut store, &mut atoms, &mut next_id);
        let clause = parser.parse_clause_str(input).unwrap();

        let mut printer = Printer::new(&store);
        assert_eq!(printer.clause_to_string(clause), expected);
    }

    #[test]
    fn test_fact_parsing() {
        clause_roundtrip("is_natural(z).", "1. is_natural(z).");
        clause_roundtrip("p.", "1. p.");
        clause_roundtrip("edge(a, b).", "1. edge(a, b).");
    }

    #[test]
    fn test_rule_parsing() {
        clause_roundtrip(
            "is_natural(s(X)) :- is_natural(X).",
            "1. is_natural(s(X#1)) [X#1] :- is_natural(X#1).",
        );
        clause_roundtrip(
            "grandparent(X, Y) :- parent(X, Z), parent(Z, Y).",
            "1. grandparent(X#1, Y#1) [X#1, Y#1] :- parent(X#1, Z#1), parent(Z#1, Y#1).",
        );
    }

    #[test]
    fn test_query_parsing() {
        clause_roundtrip(":- nat(s(z)).", "1. :- nat(s(z)).");
        clause_roundtrip(":- dif(X, a), eq(X, b).", "1. :- dif(X#1, a), eq(X#1, b).");
    }

    #[test]
    fn test_negation_flag() {
        clause_roundtrip(":- -p(X).", "1. :- -p(X#1).");
        clause_roundtrip("q(X) :- r(-f(X)).", "1. q(X#1) [X#1] :- r(-f(X#1)).");
    }

    #[test]
    fn test_comments_are_skipped() {
        let mut store = TermStore::new();
        let mut atoms = AtomTable::new();
        let mut next_id = 0;
        let mut parser = Parser::new(&mut store, &mut atoms, &mut next_id);
        let clauses = parser
            .parse_program("# a program\np(a). # trailing\n# done\np(b).\n")
            .unwrap();
        assert_eq!(clauses.len(), 2);
    }

    #[test]
    fn test_shared_variables_are_one_node() {
        let mut store = TermStore::new();
        let mut atoms = AtomTable::new();
        let mut next_id = 0;
        let mut parser = Parser::new(&mut store, &mut atoms, &mut next_id);
        // eq(X, X): both argument slots must hold the same node.
        let clause = parser.parse_clause_str("eq(X, X).").unwrap();
        let head = match store.kind(clause) {
            crate::store::NodeKind::Clause { head, .. } => head.unwrap(),
            _ => panic!("expected a clause"),
        };
        match store.kind(head) {
            crate::store::NodeKind::Struct { args, .. } => assert_eq!(args[0], args[1]),
            _ => panic!("expected a struct head"),
        }
    }

    #[test]
    fn test_error_position() {
        let mut store = TermStore::new();
        let mut atoms = AtomTable::new();
        let mut next_id = 0;
        let mut parser = Parser::new(&mut store, &mut atoms, &mut next_id);
        let err = parser.parse_program("p(a).\nq(,).\n").unwrap_err();
        assert_eq!((err.row, err.col), (2, 3));
        match err.kind {
            ParseErrorKind::UnexpectedToken { found, .. } => assert_eq!(found, ","),
            other => panic!("unexpected error kind: {:?}", other),
        }
    }

    #[test]
    fn test_eof_error() {
        let mut store = TermStore::new();
        let mut atoms = AtomTable::new();
        let mut next_id = 0;
        let mut parser = Parser::new(&mut store, &mut atoms, &mut next_id);
        let err = parser.parse_program("p(a)").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedEof { .. }));
    }
}
