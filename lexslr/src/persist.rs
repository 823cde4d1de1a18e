//! Persisted text form of an [`Automaton`].
//!
//! ```text
//! 4                 <- number of states
//! q0                <- initial state
//! NUM,ID            <- final states, comma separated
//! 0,1,a,b           <- alphabet, comma separated
//! q0,0,NUM          <- one `origin,symbol,destination` triple per line
//! q0,a,ID
//! ...
//! ```
//!
//! States are renamed on write. A final state recognising a token is named
//! after it: `TOKEN` for the first such state, `TOKEN#2`, `TOKEN#3`, … for
//! further states of the same token. Every other state, final or not, is
//! named `q0`, `q1`, … in the order of its original name. A token that
//! itself looks like `q<n>` or contains `#` always carries its count
//! (`q7#1`), so the two namespaces never meet. Reading strips the `#<n>`
//! count to recover the token; finals named `q<n>` have none.
//!
//! ε-moves are written with the symbol `&`, a literal `&` as `\&`.

use crate::automaton::{Automaton, EPSILON, Label};
use crate::error::{Error, Result};
use smartstring::alias::String;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};

/// Separates a token from its repeat count in a state name.
const REPEAT: char = '#';

/// Escape written in front of a literal `&`.
const ESCAPE: char = '\\';

impl Automaton {
    /// Names used when writing: tokens for final states, `qN` for the rest.
    fn persisted_names(&self) -> BTreeMap<&String, String> {
        let mut names: BTreeMap<&String, String> = BTreeMap::new();
        let mut counts: HashMap<&String, usize> = HashMap::new();
        for state in &self.finals {
            if let Some(token) = self.final_to_token.get(state) {
                let n = counts.entry(token).or_default();
                *n += 1;
                let name = if *n == 1 && !is_plain_state(token) && !token.contains(REPEAT) {
                    token.clone()
                } else {
                    format!("{}{}{}", token, REPEAT, n).into()
                };
                names.insert(state, name);
            }
        }
        let mut next = 0;
        for state in &self.states {
            if !names.contains_key(state) {
                names.insert(state, format!("q{}", next).into());
                next += 1;
            }
        }
        names
    }

    /// Writes the persisted form of this automaton to `out`.
    ///
    /// # Returns
    /// Returns `Ok(())` on success or an [`io::Error`] if writing fails or a
    /// token is empty or contains a comma or whitespace.
    pub fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if let Some(token) = self
            .final_to_token
            .values()
            .find(|t| t.is_empty() || t.contains(',') || t.contains(char::is_whitespace))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("token {:?} cannot be written as a state name", token),
            ));
        }
        let names = self.persisted_names();
        let name = |s: &String| names.get(s).cloned().unwrap_or_else(|| s.clone());

        writeln!(out, "{}", self.states.len())?;
        writeln!(out, "{}", name(&self.initial))?;

        let mut finals: Vec<String> = self.finals.iter().map(&name).collect();
        finals.sort();
        writeln!(out, "{}", finals.join(","))?;

        let alphabet: Vec<String> = self.alphabet.iter().map(|&c| label_text(Label::Symbol(c))).collect();
        writeln!(out, "{}", alphabet.join(","))?;

        let mut lines: Vec<(String, String, String)> = Vec::new();
        for ((origin, label), targets) in &self.transitions {
            for target in targets {
                lines.push((name(origin), label_text(*label), name(target)));
            }
        }
        lines.sort();
        for (origin, symbol, target) in lines {
            writeln!(out, "{},{},{}", origin, symbol, target)?;
        }
        Ok(())
    }

    /// Returns the persisted form as a string.
    ///
    /// # Errors
    /// As [`Automaton::write_text`].
    pub fn to_text(&self) -> io::Result<std::string::String> {
        let mut buf = Vec::new();
        self.write_text(&mut buf)?;
        Ok(std::string::String::from_utf8_lossy(&buf).into_owned())
    }

    /// Reads an automaton from its persisted form.
    ///
    /// The four header lines are positional (the final-state and alphabet
    /// lines may be empty); blank lines among the transitions are ignored.
    /// A final state recognises the token given by its name minus a
    /// trailing `#<n>` count, unless it is named `q<n>`.
    pub fn from_text(text: &str) -> Result<Automaton> {
        let lines: Vec<&str> = text.lines().map(|l| l.trim_end_matches('\r')).collect();
        let last = lines
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .ok_or_else(|| Error::automaton(1, "empty input"))?;
        let lines = &lines[..=last];
        if lines.len() < 4 {
            return Err(Error::automaton(lines.len() + 1, "expected four header lines"));
        }

        let count: usize = lines[0]
            .trim()
            .parse()
            .map_err(|_| Error::automaton(1, format!("state count {:?} is not a number", lines[0])))?;
        let initial = lines[1].trim();
        if initial.is_empty() {
            return Err(Error::automaton(2, "missing initial state"));
        }

        let mut fa = Automaton::new(initial);
        for state in split_list(lines[2]) {
            fa.add_final(state, token_of(state));
        }
        for symbol in split_list(lines[3]) {
            match read_label(symbol) {
                Some(Label::Symbol(c)) => {
                    fa.alphabet.insert(c);
                }
                Some(Label::Epsilon) => {}
                None => return Err(Error::automaton(4, format!("alphabet symbol {:?} is not one character", symbol))),
            }
        }

        for (i, line) in lines.iter().enumerate().skip(4) {
            let line_no = i + 1;
            if line.trim().is_empty() {
                continue;
            }
            // origin and destination never contain commas; the symbol may be one
            let (Some((origin, rest)), Some((_, target))) = (line.split_once(','), line.rsplit_once(',')) else {
                return Err(Error::automaton(line_no, format!("expected origin,symbol,destination in {:?}", line)));
            };
            let symbol = match rest.rsplit_once(',') {
                Some((symbol, _)) => symbol,
                None => return Err(Error::automaton(line_no, format!("missing symbol in {:?}", line))),
            };
            let Some(label) = read_label(symbol) else {
                return Err(Error::automaton(line_no, format!("symbol {:?} is not one character", symbol)));
            };
            let (origin, target) = (origin.trim(), target.trim());
            if origin.is_empty() || target.is_empty() {
                return Err(Error::automaton(line_no, format!("empty state name in {:?}", line)));
            }
            fa.add_transition(origin, label, target);
        }

        if fa.states.len() != count {
            log::warn!(
                "automaton header declares {} states, found {}",
                count,
                fa.states.len()
            );
        }
        Ok(fa)
    }
}

fn split_list(line: &str) -> impl Iterator<Item = &str> {
    line.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// `q12`, the name given to states without a token.
fn is_plain_state(name: &str) -> bool {
    name.strip_prefix('q')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// `TOKEN#3` → `TOKEN`, `q4` → none; any other name is its own token.
fn token_of(state: &str) -> Option<&str> {
    if is_plain_state(state) {
        return None;
    }
    match state.rsplit_once(REPEAT) {
        Some((token, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => Some(token),
        _ => Some(state),
    }
}

fn label_text(label: Label) -> String {
    let mut text = String::new();
    match label {
        Label::Epsilon => text.push(EPSILON),
        Label::Symbol(EPSILON) => {
            text.push(ESCAPE);
            text.push(EPSILON);
        }
        Label::Symbol(c) => text.push(c),
    }
    text
}

/// `&` is ε, `\&` a literal `&`, any other single character itself.
fn read_label(symbol: &str) -> Option<Label> {
    let mut chars = symbol.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(EPSILON), None, _) => Some(Label::Epsilon),
        (Some(c), None, _) => Some(Label::Symbol(c)),
        (Some(ESCAPE), Some(EPSILON), None) => Some(Label::Symbol(EPSILON)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident_or_number() -> Automaton {
        let mut fa = Automaton::new("start");
        fa.add_transition("start", Label::Symbol('a'), "id");
        fa.add_transition("id", Label::Symbol('a'), "id");
        fa.add_transition("id", Label::Symbol('0'), "id");
        fa.add_transition("start", Label::Symbol('0'), "num");
        fa.add_transition("num", Label::Symbol('0'), "num");
        fa.add_final("id", Some("ID"));
        fa.add_final("num", Some("NUM"));
        fa
    }

    #[test]
    fn writes_header_and_sorted_triples() {
        let text = ident_or_number().to_text().unwrap();
        let expected = "\
3
q0
ID,NUM
0,a
ID,0,ID
ID,a,ID
NUM,0,NUM
q0,0,NUM
q0,a,ID
";
        assert_eq!(text, expected);
    }

    #[test]
    fn round_trip_preserves_behaviour() {
        let fa = ident_or_number();
        let back = Automaton::from_text(&fa.to_text().unwrap()).unwrap();
        for w in ["", "a", "a0a", "00", "0a", "b", "aaa0"] {
            assert_eq!(fa.run(w), back.run(w), "{w:?}");
        }
    }

    #[test]
    fn repeated_tokens_get_suffixes_and_come_back() {
        let mut fa = Automaton::new("s");
        fa.add_transition("s", Label::Symbol('x'), "f1");
        fa.add_transition("f1", Label::Symbol('x'), "f2");
        fa.add_final("f1", Some("X"));
        fa.add_final("f2", Some("X"));
        let text = fa.to_text().unwrap();
        assert_eq!(text.lines().nth(2), Some("X,X#2"));
        let back = Automaton::from_text(&text).unwrap();
        assert_eq!(back.run("xx").token.as_deref(), Some("X"));
    }

    #[test]
    fn reads_nondeterministic_and_epsilon_moves() {
        let text = "3\nA\nC\na\nA,&,B\nA,a,B\nA,a,C\n\nB,a,C\n";
        let fa = Automaton::from_text(text).unwrap();
        assert!(!fa.is_deterministic());
        assert!(fa.accepts("a"));
        assert!(fa.accepts("aa"));
        assert!(!fa.accepts(""));
    }

    #[test]
    fn comma_can_be_a_symbol() {
        let mut fa = Automaton::new("s");
        fa.add_transition("s", Label::Symbol(','), "f");
        fa.add_final("f", Some("COMMA"));
        let back = Automaton::from_text(&fa.to_text().unwrap()).unwrap();
        assert!(back.accepts(","));
    }

    #[test]
    fn malformed_input_is_reported_with_line() {
        let err = Automaton::from_text("x\nq0\n\na\n").unwrap_err();
        assert!(matches!(err, Error::MalformedAutomaton { line_no: 1, .. }));

        let err = Automaton::from_text("2\nq0\nq1\na\nq0;a;q1\n").unwrap_err();
        assert!(matches!(err, Error::MalformedAutomaton { line_no: 5, .. }));

        let err = Automaton::from_text("2\nq0\nq1\na\nq0,ab,q1\n").unwrap_err();
        assert!(matches!(err, Error::MalformedAutomaton { line_no: 5, .. }));

        // blank lines count
        let err = Automaton::from_text("2\nq0\n\na\n\nq0;a;q1\n").unwrap_err();
        assert!(matches!(err, Error::MalformedAutomaton { line_no: 6, .. }));

        assert!(Automaton::from_text("\n\n").is_err());
    }

    #[test]
    fn token_names_are_recovered() {
        assert_eq!(token_of("ID#2"), Some("ID"));
        assert_eq!(token_of("ID_2"), Some("ID_2"));
        assert_eq!(token_of("LEFT_PAREN"), Some("LEFT_PAREN"));
        assert_eq!(token_of("q3"), None);
        assert_eq!(token_of("q3#1"), Some("q3"));
        assert_eq!(token_of("a#b#1"), Some("a#b"));
        assert_eq!(token_of("quote"), Some("quote"));
    }

    /// Round-trips `fa` and compares `run` on every word.
    fn assert_round_trip(fa: &Automaton, words: &[&str]) -> Automaton {
        let text = fa.to_text().unwrap();
        let back = Automaton::from_text(&text).unwrap();
        assert_eq!(back.states.len(), fa.states.len(), "{text}");
        assert_eq!(back.finals.len(), fa.finals.len(), "{text}");
        for w in words {
            assert_eq!(fa.run(w), back.run(w), "{w:?} in\n{text}");
        }
        back
    }

    #[test]
    fn token_names_with_counts_stay_apart() {
        // two states of A next to a token really called A_2, and one called A#2
        let mut fa = Automaton::new("s");
        fa.add_transition("s", Label::Symbol('a'), "a1");
        fa.add_transition("a1", Label::Symbol('a'), "a2");
        fa.add_transition("s", Label::Symbol('x'), "x");
        fa.add_transition("s", Label::Symbol('y'), "y");
        fa.add_final("a1", Some("A"));
        fa.add_final("a2", Some("A"));
        fa.add_final("x", Some("A_2"));
        fa.add_final("y", Some("A#2"));
        let back = assert_round_trip(&fa, &["a", "aa", "x", "y", "", "aaa"]);
        assert_eq!(back.run("x").token.as_deref(), Some("A_2"));
        assert_eq!(back.run("y").token.as_deref(), Some("A#2"));
        assert_eq!(back.run("aa").token.as_deref(), Some("A"));
    }

    #[test]
    fn token_shaped_like_a_plain_state() {
        let mut fa = Automaton::new("s");
        fa.add_transition("s", Label::Symbol('a'), "f");
        fa.add_transition("f", Label::Symbol('b'), "g");
        fa.add_final("f", Some("q0"));
        fa.add_final("g", Some("q1"));
        let text = fa.to_text().unwrap();
        assert_eq!(text.lines().nth(1), Some("q0"));
        assert_eq!(text.lines().nth(2), Some("q0#1,q1#1"));
        let back = assert_round_trip(&fa, &["", "a", "ab", "b"]);
        assert_eq!(back.run("a").token.as_deref(), Some("q0"));
    }

    #[test]
    fn final_without_token_stays_without_token() {
        let mut fa = Automaton::new("s");
        fa.add_transition("s", Label::Symbol('x'), "f");
        fa.add_final("f", None);
        let back = assert_round_trip(&fa, &["", "x", "xx"]);
        let verdict = back.run("x");
        assert!(verdict.accepted);
        assert_eq!(verdict.token, None);
    }

    #[test]
    fn literal_ampersand_is_not_epsilon() {
        let mut fa = Automaton::new("s");
        fa.add_transition("s", Label::Symbol('&'), "m");
        fa.add_transition("m", Label::Symbol('&'), "f");
        fa.add_transition("s", Label::Symbol('\\'), "f");
        fa.add_final("f", Some("AND"));
        let text = fa.to_text().unwrap();
        assert!(text.ends_with("q0,\\&,AND\nq1,\\,AND\nq1,\\&,q0\n"), "{text}");
        assert_eq!(text.lines().nth(3), Some("\\&,\\"));
        let back = assert_round_trip(&fa, &["", "&", "&&", "\\", "&&&"]);
        assert!(back.is_deterministic());
        assert!(back.accepts("&&"));
        assert!(back.accepts("\\"));
        assert!(!back.accepts(""));
        assert!(back.alphabet.contains(&'&'));

        assert!(Automaton::from_text("2\nq0\nq1\n&\nq0,\\a,q1\n").is_err());
    }

    #[test]
    fn unwritable_token_is_refused() {
        let mut fa = Automaton::new("s");
        fa.add_transition("s", Label::Symbol('x'), "f");
        fa.add_final("f", Some("a,b"));
        let err = fa.to_text().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
