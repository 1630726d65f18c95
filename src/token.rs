//! Tokens of a single line of assembly source.

use logos::{Lexer, Logos};

use std::fmt;

/// Enumeration of all tokens that can appear on a source line once comments have been removed.
#[derive(Logos, Debug, PartialEq, Clone, Copy)]
pub enum Token<'a> {
    /// Errorneous token that could not be interpreted as any of the other variants.
    ///
    /// Whitespace, commas and semicolons separate tokens and are skipped.
    #[error]
    #[regex(r"[ \t\r\f,;]+", logos::skip)]
    Error,

    /// A label declaration, such as `loop:`. Holds the name without the colon.
    #[regex("[A-Za-z_][A-Za-z0-9_]*:", label_callback)]
    Label(&'a str),

    /// A mnemonic or an operand. What it means is decided by the assembler.
    #[regex(r"[^ \t\r\f\n,;:]+", Lexer::slice)]
    Word(&'a str),
}

fn label_callback<'a>(lex: &mut Lexer<'a, Token<'a>>) -> &'a str {
    let slice = lex.slice();
    &slice[..slice.len() - 1]
}

impl<'t> fmt::Display for Token<'t> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Error => write!(f, "<error>"),
            Token::Label(label) => write!(f, "{}:", label),
            Token::Word(word) => write!(f, "{}", word),
        }
    }
}

#[test]
fn test_tokenize_instruction() {
    let tokens = Token::lexer("mov A,\t0x10 ;").collect::<Vec<_>>();

    assert_eq!(tokens, vec![Token::Word("mov"), Token::Word("A"), Token::Word("0x10")]);
}

#[test]
fn test_tokenize_label() {
    assert_eq!(Token::lexer("loop_1:").collect::<Vec<_>>(), vec![Token::Label("loop_1")]);
    assert_eq!(Token::lexer("1x:").collect::<Vec<_>>(), vec![Token::Word("1x"), Token::Error]);
}
