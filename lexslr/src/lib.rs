//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Runtime support for lexers and SLR(1) parsers.
//!
//! `lexslr` holds everything a generated lexer or parser needs at run time:
//!  * **[`Automaton`]**: finite automata with union, ε-closure, subset
//!    construction and a persisted text form
//!  * **[`ParseTable`]**: SLR(1) ACTION/GOTO tables with CSV export
//!  * **[`Parser`]**: the table-driven shift/reduce engine, producing a trace
//!
//! The generators that build these structures live in `lexslr-gen`.

mod automaton;
mod error;
mod parser;
mod persist;
mod table;

pub use crate::automaton::{Automaton, EPSILON, Label, Verdict};
pub use crate::error::{Error, Result};
pub use crate::parser::{ParseOutcome, Parser, ParserStats, TraceAction, TraceRow};
pub use crate::table::{Action, Conflict, END_MARKER, ParseTable, Production};
