//! LR(0) items and the canonical collection of item sets.

use super::grammar::Grammar;
use indexmap::IndexSet;
use lexslr::{END_MARKER, Production};
use smartstring::alias::String;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

/// An LR(0) item: a production index and a dot position.
///
/// For `E → E + T`, the item `E → E · + T` has `dot == 1`. Items compare by
/// value, so sets of them compare structurally.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Item {
    /// Index into [`CanonicalCollection::productions`].
    pub prod: usize,
    /// Number of body symbols already recognised.
    pub dot: usize,
}

/// A set of LR(0) items, ordered by production then dot.
pub type ItemSet = BTreeSet<Item>;

/// Where a state goes on a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    State(usize),
    /// Recorded on `$` for a state holding `S' → S ·`.
    Accept,
}

/// Production 0 is `S' → S`; the grammar's productions follow in
/// declaration order.
pub fn augment(grammar: &Grammar) -> (String, Vec<Production>) {
    let mut start: String = format!("{}'", grammar.start()).into();
    while grammar.is_nonterminal(&start) || grammar.is_terminal(&start) {
        start.push('\'');
    }
    let mut prods = vec![Production::new(&start, &[grammar.start()])];
    for (head, bodies) in grammar.productions() {
        prods.extend(bodies.iter().map(|body| Production::new(head, body)));
    }
    (start, prods)
}

/// The symbol right after the dot, if any.
fn next_symbol<'p>(item: &Item, prods: &'p [Production]) -> Option<&'p String> {
    prods[item.prod].body.get(item.dot)
}

/// Adds `B → · γ` for every item `A → α · B β` until nothing changes.
pub fn closure(items: &ItemSet, prods: &[Production], grammar: &Grammar) -> ItemSet {
    let mut c = items.clone();
    let mut work: Vec<Item> = items.iter().copied().collect();
    while let Some(item) = work.pop() {
        let Some(sym) = next_symbol(&item, prods) else {
            continue;
        };
        if !grammar.is_nonterminal(sym) {
            continue;
        }
        for (j, p) in prods.iter().enumerate() {
            if p.head == *sym {
                let new_item = Item { prod: j, dot: 0 };
                if c.insert(new_item) {
                    work.push(new_item);
                }
            }
        }
    }
    c
}

/// Advances the dot over `sym` wherever possible and closes the result.
pub fn goto(items: &ItemSet, sym: &str, prods: &[Production], grammar: &Grammar) -> ItemSet {
    let moved: ItemSet = items
        .iter()
        .filter(|item| next_symbol(item, prods).is_some_and(|s| s == sym))
        .map(|item| Item {
            prod: item.prod,
            dot: item.dot + 1,
        })
        .collect();
    closure(&moved, prods, grammar)
}

/// The canonical collection of LR(0) item sets and its transitions.
#[derive(Debug, Clone)]
pub struct CanonicalCollection {
    /// The augmented start symbol.
    pub start: String,
    /// Augmented production list.
    pub productions: Vec<Production>,
    states: IndexSet<ItemSet>,
    transitions: Vec<BTreeMap<String, Transition>>,
    /// Symbols each state moves on, in the order they were explored.
    order: Vec<Vec<String>>,
}

impl CanonicalCollection {
    /// Builds the collection breadth-first from `closure({S' → · S})`.
    ///
    /// Successor symbols of a state are explored in the order they occur
    /// after a dot in its items (productions in declaration order), so state
    /// numbering is stable. A successor structurally equal to a known state
    /// reuses that state's index.
    pub fn build(grammar: &Grammar) -> Self {
        let (start, productions) = augment(grammar);
        let mut states: IndexSet<ItemSet> = IndexSet::new();
        states.insert(closure(&ItemSet::from([Item { prod: 0, dot: 0 }]), &productions, grammar));

        let mut transitions: Vec<BTreeMap<String, Transition>> = Vec::new();
        let mut order: Vec<Vec<String>> = Vec::new();
        let mut i = 0;
        while i < states.len() {
            let state = states[i].clone();
            let mut row = BTreeMap::new();
            let mut symbols: Vec<String> = Vec::new();
            for item in &state {
                if let Some(sym) = next_symbol(item, &productions) {
                    if !symbols.contains(sym) {
                        symbols.push(sym.clone());
                    }
                }
            }
            for sym in &symbols {
                let next = goto(&state, sym, &productions, grammar);
                if next.is_empty() {
                    continue;
                }
                let (target, fresh) = states.insert_full(next);
                if fresh {
                    log::trace!("state {} on {:?} -> new state {}", i, sym, target);
                }
                row.insert(sym.clone(), Transition::State(target));
            }
            if state.contains(&Item { prod: 0, dot: 1 }) {
                row.insert(END_MARKER.into(), Transition::Accept);
            }
            transitions.push(row);
            order.push(symbols);
            i += 1;
        }
        log::debug!("canonical collection: {} states", states.len());
        Self {
            start,
            productions,
            states,
            transitions,
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, i: usize) -> Option<&ItemSet> {
        self.states.get_index(i)
    }

    pub fn states(&self) -> impl Iterator<Item = &ItemSet> {
        self.states.iter()
    }

    /// Index of the state structurally equal to `items`.
    pub fn find(&self, items: &ItemSet) -> Option<usize> {
        self.states.get_index_of(items)
    }

    pub fn transition(&self, state: usize, symbol: &str) -> Option<Transition> {
        self.transitions.get(state)?.get(symbol).copied()
    }

    /// Transitions of one state, in exploration order, the accept
    /// transition last.
    pub fn transitions(&self, state: usize) -> Vec<(&str, Transition)> {
        let Some(row) = self.transitions.get(state) else {
            return Vec::new();
        };
        let mut out: Vec<(&str, Transition)> = self.order[state]
            .iter()
            .filter_map(|sym| row.get(sym).map(|t| (sym.as_str(), *t)))
            .collect();
        if let Some(t) = row.get(END_MARKER).filter(|t| **t == Transition::Accept) {
            out.push((END_MARKER, *t));
        }
        out
    }

    /// `A -> α . β` for an item.
    pub fn item_text(&self, item: &Item) -> std::string::String {
        let prod = &self.productions[item.prod];
        let mut text = format!("{} ->", prod.head);
        for (j, sym) in prod.body.iter().enumerate() {
            if j == item.dot {
                text.push_str(" .");
            }
            text.push(' ');
            text.push_str(sym);
        }
        if item.dot == prod.body.len() {
            text.push_str(" .");
        }
        text
    }

    /// Writes every state as `C,<state>,<item>` lines, a blank line after
    /// each state, then the transitions as `T,<state>,<symbol>,<target>`.
    ///
    /// # Returns
    /// Returns `Ok(())` on success or an [`io::Error`] if writing fails.
    pub fn write_set<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "CS,{}\n", self.states.len())?;
        for (i, state) in self.states.iter().enumerate() {
            for item in state {
                writeln!(out, "C,{},{}", i, self.item_text(item))?;
            }
            writeln!(out)?;
        }
        for i in 0..self.states.len() {
            for (sym, t) in self.transitions(i) {
                match t {
                    Transition::State(n) => writeln!(out, "T,{},{},{}", i, sym, n)?,
                    Transition::Accept => writeln!(out, "T,{},{},accept", i, sym)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPR: &str = "\
E ::= E + T | T
T ::= T * F | F
F ::= ( E ) | id
";

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn augmented_start_is_fresh() {
        let g = Grammar::from_text(EXPR).unwrap();
        let (start, prods) = augment(&g);
        assert_eq!(start, "E'");
        assert_eq!(prods.len(), 7);
        assert_eq!(prods[0], Production::new("E'", &["E"]));
        assert_eq!(prods[6], Production::new("F", &["id"]));

        let g = Grammar::from_text("S ::= S' a | b\nS' ::= c\n").unwrap();
        assert_eq!(augment(&g).0, "S''");
    }

    #[test]
    fn closure_of_start_item() {
        let g = Grammar::from_text(EXPR).unwrap();
        let (_, prods) = augment(&g);
        let c = closure(&ItemSet::from([Item { prod: 0, dot: 0 }]), &prods, &g);
        // every production with the dot in front
        assert_eq!(c.len(), 7);
        assert!(c.iter().all(|item| item.dot == 0));

        let moved = goto(&c, "E", &prods, &g);
        assert_eq!(moved, ItemSet::from([Item { prod: 0, dot: 1 }, Item { prod: 1, dot: 1 }]));
        assert!(goto(&c, "+", &prods, &g).is_empty());
    }

    #[test]
    fn expression_collection() {
        init_logger();
        let g = Grammar::from_text(EXPR).unwrap();
        let cc = CanonicalCollection::build(&g);
        // the textbook collection I0..I11
        assert_eq!(cc.len(), 12);

        let states: Vec<&ItemSet> = cc.states().collect();
        for (i, a) in states.iter().enumerate() {
            for b in &states[i + 1..] {
                assert_ne!(a, b);
            }
        }

        assert_eq!(cc.transition(0, "E"), Some(Transition::State(1)));
        assert_eq!(cc.transition(1, "$"), Some(Transition::Accept));
        let from0: Vec<&str> = cc.transitions(0).into_iter().map(|(s, _)| s).collect();
        assert_eq!(from0, ["E", "T", "F", "(", "id"]);
        for i in 0..cc.len() {
            for (sym, t) in cc.transitions(i) {
                if let Transition::State(n) = t {
                    let next = goto(cc.state(i).unwrap(), sym, &cc.productions, &g);
                    assert_eq!(cc.find(&next), Some(n));
                }
            }
        }
    }

    #[test]
    fn item_rendering() {
        let g = Grammar::from_text("S ::= a S | &\n").unwrap();
        let cc = CanonicalCollection::build(&g);
        assert_eq!(cc.item_text(&Item { prod: 1, dot: 1 }), "S -> a . S");
        assert_eq!(cc.item_text(&Item { prod: 2, dot: 0 }), "S -> .");
        assert_eq!(cc.item_text(&Item { prod: 0, dot: 1 }), "S' -> S .");

        let mut buf = Vec::new();
        cc.write_set(&mut buf).unwrap();
        let text = std::string::String::from_utf8(buf).unwrap();
        assert!(text.starts_with(&format!("CS,{}\n\nC,0,S' -> . S\n", cc.len())));
        assert!(text.contains("T,1,$,accept\n"));
    }
}
