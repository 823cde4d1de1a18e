//! Error taxonomy shared by the runtime and the generators.
//!
//! Every construction-time failure (regular expressions, regular definitions,
//! grammars, persisted automata) is reported through [`Error`], carrying the
//! offending fragment so callers can show it verbatim. A parser *rejecting*
//! its input is not an error: see [`ParseOutcome`](crate::ParseOutcome).
//!
//! # Examples
//!
//! ```rust
//! # use lexslr::Error;
//! let err = Error::InvalidRange { fragment: "[z-a]".into() };
//! assert!(err.to_string().contains("[z-a]"));
//! ```

use smartstring::alias::String;
use thiserror::Error;

/// Convenience alias used across the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while building regular expressions, automata, grammars or
/// parse tables, and the two internal-consistency failures of the parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Unbalanced `()` / `[]`, a dangling escape, an empty class or an empty
    /// expression.
    #[error("malformed expression: {fragment}")]
    MalformedExpression {
        /// The expression (or part of it) that could not be read.
        fragment: String,
    },

    /// Two operators that cannot be adjacent, e.g. `(*`, `|*` or `**`.
    #[error("invalid operator sequence {fragment:?}; consider parentheses to disambiguate")]
    InvalidOperatorSequence {
        /// The offending operator pair.
        fragment: String,
    },

    /// A character-class range whose bounds do not share a class
    /// (upper-case, lower-case, digit) or are out of order.
    #[error("invalid range {fragment}")]
    InvalidRange {
        /// The range as written, e.g. `[A-9]`.
        fragment: String,
    },

    /// A `<name>` reference to a regular definition that does not exist.
    #[error("undefined sub-expression <{name}>")]
    UndefinedSubexpression {
        /// The referenced definition name.
        name: String,
    },

    /// Grammar terminals that are not produced by the lexer definitions.
    #[error("grammar terminals not defined as tokens: {}", tokens.join(", "))]
    MismatchedTokens {
        /// The unexpected terminals, sorted.
        tokens: Vec<String>,
    },

    /// A regular-definitions line that is not of the form `name: regex`, or
    /// a cyclic chain of references.
    #[error("malformed definition at line {line_no}: {line:?}")]
    MalformedDefinition {
        /// 1-based line number.
        line_no: usize,
        /// The line as read.
        line: String,
    },

    /// A grammar line that is not of the form `Head ::= body | body`.
    #[error("malformed grammar rule at line {line_no}: {line:?}")]
    MalformedGrammar {
        /// 1-based line number.
        line_no: usize,
        /// The line as read.
        line: String,
    },

    /// The grammar declares no productions.
    #[error("grammar has no productions")]
    EmptyGrammar,

    /// The start symbol is not the head of any production.
    #[error("start symbol {symbol:?} has no productions")]
    UnknownStartSymbol {
        /// The requested start symbol.
        symbol: String,
    },

    /// The persisted text form of an automaton could not be read.
    #[error("malformed automaton at line {line_no}: {reason}")]
    MalformedAutomaton {
        /// 1-based physical line number, blank lines included.
        line_no: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A reduction found no goto entry for the reduced nonterminal. This only
    /// happens with a corrupted or inconsistent table.
    #[error("no goto from state {state} on {nonterminal:?}")]
    MissingGoto {
        /// The state uncovered by the reduction.
        state: usize,
        /// The production head being reduced to.
        nonterminal: String,
    },

    /// A reduction popped more states than the stack holds. Like
    /// [`Error::MissingGoto`], only a corrupted table can cause it.
    #[error("parser stack underflow reducing production {prod}")]
    StackUnderflow {
        /// The production being reduced.
        prod: usize,
    },

    /// A reduce action names a production the table does not have.
    #[error("reduce by unknown production {prod}")]
    UnknownProduction {
        /// The production index found in the table.
        prod: usize,
    },
}

impl Error {
    /// Shorthand for [`Error::MalformedExpression`].
    pub fn malformed(fragment: impl AsRef<str>) -> Self {
        Error::MalformedExpression {
            fragment: fragment.as_ref().into(),
        }
    }

    /// Shorthand for [`Error::InvalidOperatorSequence`].
    pub fn operator_sequence(fragment: impl AsRef<str>) -> Self {
        Error::InvalidOperatorSequence {
            fragment: fragment.as_ref().into(),
        }
    }

    /// Shorthand for [`Error::InvalidRange`].
    pub fn invalid_range(fragment: impl AsRef<str>) -> Self {
        Error::InvalidRange {
            fragment: fragment.as_ref().into(),
        }
    }

    /// Shorthand for [`Error::MalformedAutomaton`].
    pub fn automaton(line_no: usize, reason: impl AsRef<str>) -> Self {
        Error::MalformedAutomaton {
            line_no,
            reason: reason.as_ref().into(),
        }
    }

    /// Returns `true` for the failures that indicate a corrupted parse table
    /// rather than bad user input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::MissingGoto { .. } | Error::StackUnderflow { .. } | Error::UnknownProduction { .. }
        )
    }
}
