// SLR(1) table construction and the FIRST/FOLLOW report.

use super::grammar::{Grammar, SymbolSets};
use super::lr0::{CanonicalCollection, Transition};
use lexslr::{Action, END_MARKER, ParseTable};
use smartstring::alias::String;
use std::io::{self, Write};

/// Fills the ACTION/GOTO table from the canonical collection.
///
/// Items are visited state by state in item order. Shifts, gotos and the
/// accept action are written into their cell unconditionally; a reduction
/// on each FOLLOW terminal only lands in an empty cell, so a shift beats a
/// reduction and the earlier production wins between reductions. Every
/// dropped action is recorded in [`ParseTable::conflicts`].
pub fn build_table(grammar: &Grammar, collection: &CanonicalCollection) -> ParseTable {
    let mut terminals: Vec<String> = grammar.terminals().iter().cloned().collect();
    terminals.push(END_MARKER.into());
    let nonterminals: Vec<String> = grammar.nonterminals().cloned().collect();

    let mut tab = ParseTable::new(
        collection.len(),
        collection.productions.clone(),
        terminals,
        nonterminals,
        collection.start.clone(),
    );

    for (state, items) in collection.states().enumerate() {
        for item in items {
            let prod = &collection.productions[item.prod];
            match prod.body.get(item.dot) {
                Some(sym) => {
                    if let Some(Transition::State(target)) = collection.transition(state, sym) {
                        let action = if grammar.is_nonterminal(sym) {
                            Action::Goto(target)
                        } else {
                            Action::Shift(target)
                        };
                        tab.set(state, sym, action);
                    }
                }
                None if item.prod == 0 => tab.set(state, END_MARKER, Action::Accept),
                None => {
                    for terminal in grammar.follow(&prod.head).into_iter().flatten() {
                        tab.set_if_vacant(state, terminal, Action::Reduce(item.prod));
                    }
                }
            }
        }
    }
    log::debug!(
        "SLR table: {} states, {} conflicts",
        tab.n_states(),
        tab.conflicts.len()
    );
    tab
}

/// Writes FIRST (`nullable` set) or FOLLOW sets, one
/// `FIRST,<symbol>,{a, b, }` line per nonterminal in declaration order.
///
/// # Returns
/// Returns `Ok(())` on success or an [`io::Error`] if writing fails.
pub fn write_fstflw<W: Write>(out: &mut W, grammar: &Grammar, sets: &SymbolSets, first: bool) -> io::Result<()> {
    let label = if first { "FIRST" } else { "FOLLOW" };
    for nt in grammar.nonterminals() {
        write!(out, "{},{},{{", label, nt)?;
        for sym in sets.get(nt).into_iter().flatten() {
            write!(out, "{}, ", sym)?;
        }
        writeln!(out, "}}")?;
    }
    Ok(())
}

/// The full text report: productions, FIRST and FOLLOW sets, the canonical
/// collection and any conflicts resolved while filling the table.
pub fn write_report<W: Write>(
    out: &mut W,
    grammar: &Grammar,
    collection: &CanonicalCollection,
    table: &ParseTable,
) -> io::Result<()> {
    table.write_prods(out)?;
    writeln!(out)?;
    write_fstflw(out, grammar, grammar.first_sets(), true)?;
    writeln!(out)?;
    write_fstflw(out, grammar, grammar.follow_sets(), false)?;
    writeln!(out)?;
    collection.write_set(out)?;
    if !table.conflicts.is_empty() {
        writeln!(out)?;
        for c in &table.conflicts {
            writeln!(out, "X,{},{},{},{}", c.state, c.symbol, c.kept, c.dropped)?;
        }
    }
    Ok(())
}
