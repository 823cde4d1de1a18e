//! Lexer for grammar text.
//!
//! A grammar line reads `Head ::= a b c | d | &`. Symbols are any run of
//! characters other than whitespace and `|`; they are interned in the
//! [`LexContext`] symbol table so the parser works on indices. A `--` starts
//! a comment that runs to the end of the line.

use super::symtab::Symtab;
use logos::Logos;

/// State shared by every line of one grammar.
#[derive(Default, Debug)]
pub struct LexContext {
    /// Every symbol seen so far, heads and body symbols alike.
    pub symbols: Symtab,
}

/// Tokens produced by the grammar lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A grammar symbol, by its index in [`LexContext::symbols`].
    Sym(usize),
    /// The rule separator `::=`.
    Derives,
    /// The alternative separator `|`.
    Alt,
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
enum LogosToken {
    #[regex(r"--[^\n]*")]
    Comment,

    #[token("::=")]
    Derives,

    #[token("|")]
    Alt,

    #[regex(r"[^ \t\r\f\n|]+")]
    Word,
}

pub struct Lexer<'source> {
    inner: logos::Lexer<'source, LogosToken>,
}

impl<'source> Lexer<'source> {
    pub fn new(input: &'source str) -> Self {
        Self {
            inner: LogosToken::lexer(input),
        }
    }

    /// Returns the next token, `Some(Err(offset))` for input the lexer does
    /// not recognise, or `None` at the end of input.
    pub fn next_token(&mut self, ctx: &mut LexContext) -> Option<Result<Token, usize>> {
        while let Some(kind) = self.inner.next() {
            return Some(match kind {
                Ok(LogosToken::Comment) => continue,
                Ok(LogosToken::Derives) => Ok(Token::Derives),
                Ok(LogosToken::Alt) => Ok(Token::Alt),
                Ok(LogosToken::Word) => Ok(Token::Sym(ctx.symbols.add(self.inner.slice()))),
                Err(()) => Err(self.inner.span().start),
            });
        }
        None
    }

    /// Tokenizes one whole line. Fails with the byte offset of the first
    /// unrecognised character.
    pub fn tokenize_line(line: &'source str, ctx: &mut LexContext) -> Result<Vec<Token>, usize> {
        let mut lex = Lexer::new(line);
        let mut out = Vec::new();
        while let Some(tok) = lex.next_token(ctx) {
            out.push(tok?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_line() {
        let mut ctx = LexContext::default();
        let toks = Lexer::tokenize_line("E ::= E + T | T -- sums", &mut ctx).unwrap();
        assert_eq!(
            toks,
            [
                Token::Sym(0),
                Token::Derives,
                Token::Sym(0),
                Token::Sym(1),
                Token::Sym(2),
                Token::Alt,
                Token::Sym(2),
            ]
        );
        assert_eq!(ctx.symbols.sym(1), Some("+"));
    }

    #[test]
    fn symbols_may_contain_punctuation() {
        let mut ctx = LexContext::default();
        let toks = Lexer::tokenize_line("F ::= ( E )|id|&", &mut ctx).unwrap();
        assert_eq!(toks.len(), 9);
        let names: Vec<&str> = ctx.symbols.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, ["F", "(", "E", ")", "id", "&"]);
    }

    #[test]
    fn comments_and_blank_lines_are_empty() {
        let mut ctx = LexContext::default();
        assert!(Lexer::tokenize_line("   ", &mut ctx).unwrap().is_empty());
        assert!(Lexer::tokenize_line("-- just a comment", &mut ctx).unwrap().is_empty());
        assert!(ctx.symbols.is_empty());
    }
}
