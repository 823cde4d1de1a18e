//! Context-free grammars and their FIRST and FOLLOW sets.
//!
//! Productions are kept in declaration order: the order of heads is the
//! order in which each head first appears, and bodies keep the order in
//! which they were written. That order numbers the productions and decides
//! which reduction wins a table conflict.

use super::lexer::{LexContext, Lexer};
use super::parser::parser;
use chumsky::Parser;
use indexmap::IndexMap;
use lexslr::{END_MARKER, Error, Result};
use smartstring::alias::String;
use std::collections::{BTreeMap, BTreeSet};

/// The empty string, written `&` in grammar text and in FIRST sets.
pub const EPSILON_SYMBOL: &str = "&";

/// Head → bodies, in declaration order.
pub type Productions = IndexMap<String, Vec<Vec<String>>>;

pub type SymbolSets = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone)]
pub struct Grammar {
    productions: Productions,
    terminals: BTreeSet<String>,
    start: String,
    first: SymbolSets,
    follow: SymbolSets,
}

impl Grammar {
    /// Builds a grammar and computes its FIRST and FOLLOW sets.
    ///
    /// `&` symbols are removed from bodies, so `A → &` is the empty body.
    /// A body listed twice for the same head is kept once.
    ///
    /// # Errors
    /// [`Error::EmptyGrammar`] if there is no production at all and
    /// [`Error::UnknownStartSymbol`] if `start` heads none.
    pub fn new(start: impl AsRef<str>, productions: Productions) -> Result<Self> {
        let start = start.as_ref();
        if productions.values().all(|bodies| bodies.is_empty()) {
            return Err(Error::EmptyGrammar);
        }
        if productions.get(start).is_none_or(|bodies| bodies.is_empty()) {
            return Err(Error::UnknownStartSymbol { symbol: start.into() });
        }

        let mut normalized: Productions = IndexMap::with_capacity(productions.len());
        for (head, bodies) in productions {
            let entry = normalized.entry(head).or_default();
            for body in bodies {
                let body: Vec<String> = body.into_iter().filter(|s| s != EPSILON_SYMBOL).collect();
                if !entry.contains(&body) {
                    entry.push(body);
                }
            }
        }

        let terminals = normalized
            .values()
            .flatten()
            .flatten()
            .filter(|s| !normalized.contains_key(*s))
            .cloned()
            .collect();

        let mut grammar = Self {
            productions: normalized,
            terminals,
            start: start.into(),
            first: SymbolSets::new(),
            follow: SymbolSets::new(),
        };
        grammar.compute_first();
        grammar.compute_follow();
        log::debug!(
            "grammar: {} nonterminals, {} terminals, {} productions",
            grammar.productions.len(),
            grammar.terminals.len(),
            grammar.n_productions()
        );
        Ok(grammar)
    }

    /// Reads grammar text: one `Head ::= body | body …` rule per line, the
    /// first head being the start symbol. A head may appear on several lines;
    /// its bodies accumulate.
    ///
    /// # Errors
    /// [`Error::MalformedGrammar`] naming the first bad line, or any error
    /// from [`Grammar::new`].
    pub fn from_text(text: &str) -> Result<Self> {
        let mut ctx = LexContext::default();
        let mut productions = Productions::new();
        let mut start: Option<String> = None;

        for (i, line) in text.lines().enumerate() {
            let malformed = || Error::MalformedGrammar {
                line_no: i + 1,
                line: line.trim().into(),
            };
            let tokens = Lexer::tokenize_line(line, &mut ctx).map_err(|_| malformed())?;
            if tokens.is_empty() {
                continue;
            }
            let rule = parser()
                .parse(tokens.as_slice())
                .into_result()
                .map_err(|_| malformed())?;

            let name = |idx: usize| String::from(ctx.symbols.sym(idx).unwrap_or_default());
            let head = name(rule.head);
            if head == EPSILON_SYMBOL || head == END_MARKER {
                return Err(malformed());
            }
            let mut parsed = Vec::with_capacity(rule.bodies.len());
            for body in &rule.bodies {
                let body: Vec<String> = body.iter().map(|&s| name(s)).collect();
                // `$` is the end marker, never a grammar symbol
                if body.iter().any(|s| s == END_MARKER) {
                    return Err(malformed());
                }
                parsed.push(body);
            }
            productions.entry(head.clone()).or_default().extend(parsed);
            start.get_or_insert(head);
        }

        let start = start.ok_or(Error::EmptyGrammar)?;
        Self::new(start, productions)
    }

    /// Fails with [`Error::MismatchedTokens`] listing (sorted) every
    /// terminal that is not among `expected`.
    pub fn check_tokens<I, S>(&self, expected: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let expected: BTreeSet<String> = expected.into_iter().map(|s| s.as_ref().into()).collect();
        let tokens: Vec<String> = self.terminals.difference(&expected).cloned().collect();
        if tokens.is_empty() {
            Ok(())
        } else {
            Err(Error::MismatchedTokens { tokens })
        }
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn productions(&self) -> &Productions {
        &self.productions
    }

    pub fn n_productions(&self) -> usize {
        self.productions.values().map(Vec::len).sum()
    }

    /// Sorted terminal names.
    pub fn terminals(&self) -> &BTreeSet<String> {
        &self.terminals
    }

    /// Nonterminal names in declaration order.
    pub fn nonterminals(&self) -> impl Iterator<Item = &String> {
        self.productions.keys()
    }

    pub fn is_nonterminal(&self, symbol: &str) -> bool {
        self.productions.contains_key(symbol)
    }

    pub fn is_terminal(&self, symbol: &str) -> bool {
        self.terminals.contains(symbol)
    }

    /// FIRST set of a single symbol; contains `&` if the symbol is nullable.
    pub fn first(&self, symbol: &str) -> Option<&BTreeSet<String>> {
        self.first.get(symbol)
    }

    pub fn follow(&self, nonterminal: &str) -> Option<&BTreeSet<String>> {
        self.follow.get(nonterminal)
    }

    pub fn first_sets(&self) -> &SymbolSets {
        &self.first
    }

    pub fn follow_sets(&self) -> &SymbolSets {
        &self.follow
    }

    pub fn nullable(&self, symbol: &str) -> bool {
        self.first(symbol).is_some_and(|f| f.contains(EPSILON_SYMBOL))
    }

    /// FIRST of a symbol sequence; contains `&` if every symbol is nullable
    /// (so always for the empty sequence).
    pub fn first_of<S: AsRef<str>>(&self, sequence: &[S]) -> BTreeSet<String> {
        sequence_first(&self.first, sequence)
    }

    fn compute_first(&mut self) {
        let mut first: SymbolSets = self.terminals.iter().map(|t| (t.clone(), BTreeSet::from([t.clone()]))).collect();
        first.extend(self.productions.keys().map(|nt| (nt.clone(), BTreeSet::new())));

        let mut passes = 0;
        let mut changed = true;
        while changed {
            changed = false;
            passes += 1;
            for (head, bodies) in &self.productions {
                for body in bodies {
                    let add = sequence_first(&first, body);
                    if let Some(set) = first.get_mut(head) {
                        for sym in add {
                            changed |= set.insert(sym);
                        }
                    }
                }
            }
        }
        log::trace!("FIRST converged after {} passes", passes);
        self.first = first;
    }

    fn compute_follow(&mut self) {
        let mut follow: SymbolSets = self.productions.keys().map(|nt| (nt.clone(), BTreeSet::new())).collect();
        if let Some(set) = follow.get_mut(&self.start) {
            set.insert(END_MARKER.into());
        }

        let mut passes = 0;
        let mut changed = true;
        while changed {
            changed = false;
            passes += 1;
            for (head, bodies) in &self.productions {
                for body in bodies {
                    for (i, b) in body.iter().enumerate() {
                        if !self.productions.contains_key(b) {
                            continue;
                        }
                        let mut add = sequence_first(&self.first, &body[i + 1..]);
                        if add.remove(EPSILON_SYMBOL) {
                            add.extend(follow.get(head).into_iter().flatten().cloned());
                        }
                        if let Some(set) = follow.get_mut(b) {
                            for sym in add {
                                changed |= set.insert(sym);
                            }
                        }
                    }
                }
            }
        }
        log::trace!("FOLLOW converged after {} passes", passes);
        self.follow = follow;
    }
}

/// Symbols missing from `first` are taken as terminals.
fn sequence_first<S: AsRef<str>>(first: &SymbolSets, sequence: &[S]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for sym in sequence {
        let sym = sym.as_ref();
        let Some(set) = first.get(sym) else {
            out.insert(sym.into());
            return out;
        };
        out.extend(set.iter().filter(|s| *s != EPSILON_SYMBOL).cloned());
        if !set.contains(EPSILON_SYMBOL) {
            return out;
        }
    }
    out.insert(EPSILON_SYMBOL.into());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPR: &str = "\
E ::= E + T | T
T ::= T * F | F
F ::= ( E ) | id
";

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| String::from(*s)).collect()
    }

    #[test]
    fn expression_grammar_sets() {
        let g = Grammar::from_text(EXPR).unwrap();
        assert_eq!(g.start(), "E");
        assert_eq!(g.n_productions(), 6);
        assert_eq!(g.terminals(), &set(&["(", ")", "*", "+", "id"]));
        let nts: Vec<&str> = g.nonterminals().map(|s| s.as_str()).collect();
        assert_eq!(nts, ["E", "T", "F"]);

        assert_eq!(g.first("F"), Some(&set(&["(", "id"])));
        assert_eq!(g.first("E"), Some(&set(&["(", "id"])));
        assert_eq!(g.first("+"), Some(&set(&["+"])));
        assert_eq!(g.follow("E"), Some(&set(&["$", "+", ")"])));
        assert_eq!(g.follow("T"), Some(&set(&["$", "*", "+", ")"])));
        assert_eq!(g.follow("F"), g.follow("T"));
    }

    #[test]
    fn nullable_symbols() {
        let g = Grammar::from_text("S ::= A B c\nA ::= a | &\nB ::= b |\n").unwrap();
        assert_eq!(g.first("A"), Some(&set(&["&", "a"])));
        assert_eq!(g.first("B"), Some(&set(&["&", "b"])));
        assert_eq!(g.first("S"), Some(&set(&["a", "b", "c"])));
        assert!(g.nullable("A"));
        assert!(!g.nullable("S"));
        assert_eq!(g.follow("A"), Some(&set(&["b", "c"])));
        assert_eq!(g.follow("B"), Some(&set(&["c"])));
        assert_eq!(g.first_of(&["A", "B"]), set(&["&", "a", "b"]));
        assert_eq!(g.first_of::<&str>(&[]), set(&["&"]));
        // `&` is never a terminal and empty bodies are stored empty
        assert!(!g.is_terminal("&"));
        assert_eq!(g.productions()["A"], vec![vec![String::from("a")], vec![]]);
    }

    #[test]
    fn follow_propagates_through_nullable_tail() {
        let g = Grammar::from_text("S ::= a A B\nA ::= x\nB ::= y | &\n").unwrap();
        assert_eq!(g.follow("A"), Some(&set(&["$", "y"])));
        assert_eq!(g.follow("B"), Some(&set(&["$"])));
    }

    #[test]
    fn repeated_heads_and_comments() {
        let text = "-- lists\nL ::= L , x\n\nL ::= x -- base case\nL ::= x\n";
        let g = Grammar::from_text(text).unwrap();
        assert_eq!(g.n_productions(), 2);
        assert_eq!(g.terminals(), &set(&[",", "x"]));
    }

    #[test]
    fn token_check_reports_sorted_mismatches() {
        let g = Grammar::from_text(EXPR).unwrap();
        assert!(g.check_tokens(["id", "+", "*", "(", ")", "num"]).is_ok());
        let err = g.check_tokens(["id"]).unwrap_err();
        assert_eq!(
            err,
            Error::MismatchedTokens {
                tokens: vec!["(".into(), ")".into(), "*".into(), "+".into()]
            }
        );
    }

    #[test]
    fn construction_errors() {
        assert_eq!(Grammar::from_text("-- nothing\n\n").unwrap_err(), Error::EmptyGrammar);
        assert!(matches!(
            Grammar::from_text("S ::= a\nS b\n").unwrap_err(),
            Error::MalformedGrammar { line_no: 2, .. }
        ));
        assert!(matches!(
            Grammar::from_text("::= a\n").unwrap_err(),
            Error::MalformedGrammar { line_no: 1, .. }
        ));
        assert!(matches!(
            Grammar::from_text("& ::= a\n").unwrap_err(),
            Error::MalformedGrammar { line_no: 1, .. }
        ));
        assert!(matches!(
            Grammar::from_text("S ::= a\nS ::= S $ | b\n").unwrap_err(),
            Error::MalformedGrammar { line_no: 2, .. }
        ));

        let mut prods = Productions::new();
        prods.insert("S".into(), vec![vec!["a".into()]]);
        assert_eq!(
            Grammar::new("X", prods).unwrap_err(),
            Error::UnknownStartSymbol { symbol: "X".into() }
        );
        assert_eq!(Grammar::new("S", Productions::new()).unwrap_err(), Error::EmptyGrammar);
    }
}
