//! The `lexgen` lexer generator.
//!
//! Regular expressions are compiled to syntax trees and then straight to a
//! DFA through the followpos construction. One DFA per regular definition is
//! built; their union is determinized into a single lexer automaton that
//! classifies words by token, earlier definitions winning ties.
//!
//! [`generate`] is the file-level entry point used by the `lexgen` binary.

mod definitions;
mod generate;
pub mod regex;
pub mod tree;

pub use definitions::{Definition, Definitions, Lexeme, Lexer, NO_TOKEN, write_lexemes};
pub use generate::generate;
pub use tree::SyntaxTree;

use lexslr::{Automaton, Result};

/// Compiles `pattern` into a DFA whose final states recognise `token`.
///
/// # Errors
/// Any [`lexslr::Error`] raised while reading the pattern.
pub fn regex_to_automaton(pattern: &str, token: &str) -> Result<Automaton> {
    Ok(regex::compile(pattern)?.to_automaton(token))
}
