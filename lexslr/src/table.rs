//! SLR(1) parse tables.
//!
//! A [`ParseTable`] maps `(state, symbol)` cells to an [`Action`]. Terminal
//! columns hold shifts, reductions and the accept action; nonterminal columns
//! hold gotos. The table also owns the (augmented) production list so the
//! parsing engine can reduce without consulting the grammar.

use smartstring::alias::String;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

/// The end-of-input marker appended to every token stream.
pub const END_MARKER: &str = "$";

/// A grammar production `head → body`. An empty body is an ε-production.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Production {
    /// The nonterminal being defined.
    pub head: String,
    /// The right-hand side symbols.
    pub body: Vec<String>,
}

impl Production {
    /// Creates a production from anything string-like.
    pub fn new<S: AsRef<str>>(head: impl AsRef<str>, body: &[S]) -> Self {
        Self {
            head: head.as_ref().into(),
            body: body.iter().map(|s| String::from(s.as_ref())).collect(),
        }
    }

    /// The body as space-separated symbols, `&` for an empty body.
    pub fn body_text(&self) -> std::string::String {
        if self.body.is_empty() {
            crate::automaton::EPSILON.to_string()
        } else {
            let body: Vec<&str> = self.body.iter().map(|s| s.as_str()).collect();
            body.join(" ")
        }
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.head, self.body_text())
    }
}

/// A parse-table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    /// Push the state and consume the lookahead.
    Shift(usize),
    /// Reduce by the production with this index.
    Reduce(usize),
    /// State to enter after reducing to a nonterminal.
    Goto(usize),
    /// The input is a sentence of the grammar.
    Accept,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Shift(n) => write!(f, "s{}", n),
            Action::Reduce(n) => write!(f, "r{}", n),
            Action::Goto(n) => write!(f, "{}", n),
            Action::Accept => write!(f, "accept"),
        }
    }
}

/// A cell that two actions competed for. The table keeps `kept`; `dropped`
/// never reaches the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    /// Row of the contested cell.
    pub state: usize,
    /// Column of the contested cell.
    pub symbol: String,
    /// The action already in the cell.
    pub kept: Action,
    /// The action that was discarded.
    pub dropped: Action,
}

/// An SLR(1) ACTION/GOTO table.
#[derive(Clone, Debug)]
pub struct ParseTable {
    /// Production list; index 0 is the augmented `S' → S`.
    pub productions: Vec<Production>,
    /// Terminal columns, sorted, with [`END_MARKER`] last.
    pub terminals: Vec<String>,
    /// Nonterminal columns in declaration order, augmented start excluded.
    pub nonterminals: Vec<String>,
    /// The augmented start symbol.
    pub start: String,
    /// Cells silently resolved in favour of the earlier action.
    pub conflicts: Vec<Conflict>,
    rows: Vec<BTreeMap<String, Action>>,
}

impl ParseTable {
    /// Creates an empty table with `n_states` rows.
    pub fn new(
        n_states: usize,
        productions: Vec<Production>,
        terminals: Vec<String>,
        nonterminals: Vec<String>,
        start: String,
    ) -> Self {
        Self {
            productions,
            terminals,
            nonterminals,
            start,
            conflicts: Vec::new(),
            rows: vec![BTreeMap::new(); n_states],
        }
    }

    /// Number of states (rows).
    pub fn n_states(&self) -> usize {
        self.rows.len()
    }

    /// Looks up the action for `state` on `symbol`.
    pub fn action(&self, state: usize, symbol: &str) -> Option<Action> {
        self.rows.get(state)?.get(symbol).copied()
    }

    /// All non-empty cells of one row.
    pub fn row(&self, state: usize) -> impl Iterator<Item = (&String, &Action)> {
        self.rows.get(state).into_iter().flatten()
    }

    /// Writes `action` into the cell, replacing what was there.
    pub fn set(&mut self, state: usize, symbol: &str, action: Action) {
        if let Some(previous) = self.rows[state].insert(symbol.into(), action) {
            if previous != action {
                log::warn!(
                    "state {} on {:?}: {} replaces {}",
                    state,
                    symbol,
                    action,
                    previous
                );
                self.conflicts.push(Conflict {
                    state,
                    symbol: symbol.into(),
                    kept: action,
                    dropped: previous,
                });
            }
        }
    }

    /// Writes `action` only if the cell is empty; otherwise the existing
    /// action wins and the clash is recorded. Returns `true` if written.
    pub fn set_if_vacant(&mut self, state: usize, symbol: &str, action: Action) -> bool {
        let row = &mut self.rows[state];
        match row.get(symbol) {
            None => {
                row.insert(symbol.into(), action);
                true
            }
            Some(&kept) => {
                if kept != action {
                    log::warn!(
                        "state {} on {:?}: keeping {}, dropping {}",
                        state,
                        symbol,
                        kept,
                        action
                    );
                    self.conflicts.push(Conflict {
                        state,
                        symbol: symbol.into(),
                        kept,
                        dropped: action,
                    });
                }
                false
            }
        }
    }

    /// Writes the table as CSV: a `STATE` column, then terminals (`$` last),
    /// then nonterminals sorted by name. Empty cells are blank.
    ///
    /// # Returns
    /// Returns `Ok(())` on success or an [`io::Error`] if writing fails.
    pub fn write_csv<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut nonterminals = self.nonterminals.clone();
        nonterminals.sort();
        let columns: Vec<&String> = self.terminals.iter().chain(nonterminals.iter()).collect();

        write!(out, "STATE")?;
        for col in &columns {
            write!(out, ",{}", csv_field(col))?;
        }
        writeln!(out)?;

        for (state, row) in self.rows.iter().enumerate() {
            write!(out, "{}", state)?;
            for col in &columns {
                match row.get(*col) {
                    Some(action) => write!(out, ",{}", action)?,
                    None => write!(out, ",")?,
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Writes the production list, one `P,<index>,<head> -> <body>` line each.
    pub fn write_prods<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "PS,{}\n", self.productions.len())?;
        for (i, prod) in self.productions.iter().enumerate() {
            writeln!(out, "P,{},{} -> {}", i, prod.head, prod.body_text())?;
        }
        Ok(())
    }
}

/// Quotes a CSV field when it contains a separator or a quote.
fn csv_field(s: &str) -> std::string::String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_owned()
    }
}
