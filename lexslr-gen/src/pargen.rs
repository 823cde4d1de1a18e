//! The `pargen` SLR(1) parser generator.
//!
//! A grammar is read from text, analysed for FIRST and FOLLOW sets, turned
//! into the canonical collection of LR(0) item sets and finally into a
//! [`lexslr::ParseTable`] that [`lexslr::Parser`] drives over token streams.
//!
//! [`generate`] is the file-level entry point used by the `pargen` binary.

mod generate;
pub mod grammar;
mod lexer;
pub mod lr0;
mod parser;
pub mod slr;
mod symtab;

pub use generate::{generate, token_column};
pub use grammar::{Grammar, Productions};
pub use lr0::CanonicalCollection;
pub use slr::build_table;

use lexslr::{ParseTable, Result};

/// Reads grammar text and builds its SLR(1) table in one step.
///
/// # Errors
/// Any [`lexslr::Error`] raised while reading the grammar.
pub fn table_from_text(text: &str) -> Result<ParseTable> {
    let grammar = Grammar::from_text(text)?;
    let collection = CanonicalCollection::build(&grammar);
    Ok(build_table(&grammar, &collection))
}
