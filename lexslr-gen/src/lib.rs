//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Lexer and parser generators.
//!
//! `lexslr-gen` provides two generators:
//!  * **`lexgen`**: regular definitions to a deterministic lexer automaton
//!  * **`pargen`**: a context-free grammar to an SLR(1) parse table
//!
//! Both produce data consumed by the [`lexslr`] runtime: the persisted
//! automaton form and an [`lexslr::ParseTable`].

pub mod lexgen;
pub mod pargen;
