use logos::Logos;

#[derive(Logos, Debug, PartialEq, Clone)]
pub enum Token {
    #[token(".")]
    Period,

    #[token(",")]
    Comma,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(":-")]
    ImpliedBy,

    #[token("-")]
    Minus,

    #[regex("[a-z][a-zA-Z0-9_]*")]
    Atom,

    #[regex("[A-Z][a-zA-Z0-9]*")]
    Variable,

    // Line comments run to the end of the line and are skipped like
    // whitespace.
    #[regex(r"#[^\n]*", logos::skip)]
    Comment,

    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    Whitespace,

    #[error]
    Error,
}
