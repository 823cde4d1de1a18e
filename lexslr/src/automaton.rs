//! Finite automata and the algebra used to assemble a lexer from per-token
//! recognizers.
//!
//! An [`Automaton`] may be nondeterministic (several targets per
//! `(state, label)` pair, [`Label::Epsilon`] moves) until it is passed through
//! [`Automaton::determinize`]. The algebra:
//!
//! - [`Automaton::epsilon_closure`]: states reachable through ε-moves only;
//! - [`Automaton::run`]: simulate the automaton over an input string;
//! - [`Automaton::union`]: fresh initial state with ε-moves to both operands;
//! - [`Automaton::determinize`]: subset construction, resolving final states
//!   shared by several tokens in favour of the earliest declared token.
//!
//! All collections are ordered, so every operation is deterministic and two
//! runs over the same input produce identically named states.

use smartstring::alias::String;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// The reserved symbol used for ε in regular expressions, grammars and the
/// persisted automaton form.
pub const EPSILON: char = '&';

/// A transition label: either a consumed character or ε.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    /// Moves without consuming input.
    Epsilon,
    /// Moves on exactly this character.
    Symbol(char),
}

/// Outcome of [`Automaton::run`].
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Verdict {
    /// `true` if the input drove the automaton into a final state.
    pub accepted: bool,
    /// The token associated with the final state reached, if any.
    pub token: Option<String>,
}

/// A (possibly nondeterministic) finite automaton with token-labelled final
/// states.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Automaton {
    /// All state names.
    pub states: BTreeSet<String>,
    /// Input characters with at least one transition (ε excluded).
    pub alphabet: BTreeSet<char>,
    /// Name of the initial state.
    pub initial: String,
    /// Accepting states.
    pub finals: BTreeSet<String>,
    /// `(origin, label) → targets`.
    pub transitions: BTreeMap<(String, Label), BTreeSet<String>>,
    /// Token recognised by each final state.
    pub final_to_token: BTreeMap<String, String>,
}

impl Automaton {
    /// Creates an automaton holding only its initial state.
    pub fn new(initial: impl AsRef<str>) -> Self {
        let initial = String::from(initial.as_ref());
        Self {
            states: BTreeSet::from([initial.clone()]),
            initial,
            ..Self::default()
        }
    }

    /// Adds a transition, registering both endpoints as states and the
    /// character (if any) in the alphabet.
    pub fn add_transition(&mut self, from: impl AsRef<str>, label: Label, to: impl AsRef<str>) {
        let from = String::from(from.as_ref());
        let to = String::from(to.as_ref());
        if let Label::Symbol(c) = label {
            self.alphabet.insert(c);
        }
        self.states.insert(from.clone());
        self.states.insert(to.clone());
        self.transitions.entry((from, label)).or_default().insert(to);
    }

    /// Marks `state` as final, optionally recognising `token`.
    pub fn add_final(&mut self, state: impl AsRef<str>, token: Option<&str>) {
        let state = String::from(state.as_ref());
        self.states.insert(state.clone());
        if let Some(token) = token {
            self.final_to_token.insert(state.clone(), token.into());
        }
        self.finals.insert(state);
    }

    /// Returns the targets of `state` on `label` (empty if there are none).
    pub fn targets<'a>(&'a self, state: &str, label: Label) -> impl Iterator<Item = &'a String> {
        self.transitions
            .get(&(String::from(state), label))
            .into_iter()
            .flatten()
    }

    /// Returns `true` if there are no ε-moves and every `(state, symbol)` pair
    /// has at most one target.
    pub fn is_deterministic(&self) -> bool {
        self.transitions
            .iter()
            .all(|((_, label), targets)| *label != Label::Epsilon && targets.len() <= 1)
    }

    /// Computes the ε-closure of `states`.
    pub fn epsilon_closure<'a, I>(&self, states: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut closure: BTreeSet<String> = BTreeSet::new();
        let mut stack: Vec<String> = Vec::new();
        for s in states {
            if closure.insert(s.clone()) {
                stack.push(s.clone());
            }
        }
        while let Some(state) = stack.pop() {
            for next in self.targets(&state, Label::Epsilon) {
                if closure.insert(next.clone()) {
                    stack.push(next.clone());
                }
            }
        }
        closure
    }

    /// Successor set of `current` on `c`, closed under ε-moves.
    fn step(&self, current: &BTreeSet<String>, c: char) -> BTreeSet<String> {
        let mut next = BTreeSet::new();
        for state in current {
            for target in self.targets(state, Label::Symbol(c)) {
                next.extend(self.epsilon_closure([target]));
            }
        }
        next
    }

    /// Runs the automaton over `input`.
    ///
    /// The run stops (rejecting) as soon as a character has no successor. On
    /// acceptance the token of the first final state reached (in state-name
    /// order) is reported.
    pub fn run(&self, input: &str) -> Verdict {
        let mut current = self.epsilon_closure([&self.initial]);
        for c in input.chars() {
            current = self.step(&current, c);
            if current.is_empty() {
                log::trace!("run {:?}: stuck on {:?}", input, c);
                return Verdict::default();
            }
        }
        let mut reached = current.iter().filter(|s| self.finals.contains(*s)).peekable();
        if reached.peek().is_none() {
            return Verdict::default();
        }
        let token = reached.find_map(|s| self.final_to_token.get(s).cloned());
        Verdict {
            accepted: true,
            token,
        }
    }

    /// Returns `true` if the automaton accepts `input`.
    pub fn accepts(&self, input: &str) -> bool {
        self.run(input).accepted
    }

    /// Builds an automaton recognising the union of both languages.
    ///
    /// A fresh initial state (`qi`, or `qi1`, `qi2`, … when taken) gets
    /// ε-moves to both initial states. States of `other` are renamed with an
    /// `af2-` prefix only where they collide with states of `self`.
    pub fn union(&self, other: &Automaton) -> Automaton {
        let mut rename: BTreeMap<&String, String> = BTreeMap::new();
        let mut taken: BTreeSet<String> = self.states.union(&other.states).cloned().collect();
        for s in &other.states {
            let name = if self.states.contains(s) {
                let mut candidate = String::from(s.as_str());
                while taken.contains(&candidate) {
                    candidate = format!("af2-{}", candidate).into();
                }
                taken.insert(candidate.clone());
                candidate
            } else {
                s.clone()
            };
            rename.insert(s, name);
        }
        let renamed = |s: &String| rename.get(s).cloned().unwrap_or_else(|| s.clone());

        let mut initial = String::from("qi");
        let mut n = 0;
        while taken.contains(&initial) {
            n += 1;
            initial = format!("qi{}", n).into();
        }

        let mut out = Automaton::new(&initial);
        out.states.extend(self.states.iter().cloned());
        out.states.extend(other.states.iter().map(&renamed));
        out.alphabet = self.alphabet.union(&other.alphabet).copied().collect();

        for ((origin, label), targets) in &self.transitions {
            out.transitions
                .entry((origin.clone(), *label))
                .or_default()
                .extend(targets.iter().cloned());
        }
        for ((origin, label), targets) in &other.transitions {
            out.transitions
                .entry((renamed(origin), *label))
                .or_default()
                .extend(targets.iter().map(&renamed));
        }
        out.add_transition(&initial, Label::Epsilon, &self.initial);
        out.add_transition(&initial, Label::Epsilon, renamed(&other.initial));

        out.finals.extend(self.finals.iter().cloned());
        out.finals.extend(other.finals.iter().map(&renamed));
        out.final_to_token.extend(
            self.final_to_token
                .iter()
                .map(|(s, t)| (s.clone(), t.clone())),
        );
        out.final_to_token.extend(
            other
                .final_to_token
                .iter()
                .map(|(s, t)| (renamed(s), t.clone())),
        );
        out
    }

    /// Folds [`Automaton::union`] over `automata` left to right. Returns
    /// `None` for an empty input.
    pub fn union_all<'a, I>(automata: I) -> Option<Automaton>
    where
        I: IntoIterator<Item = &'a Automaton>,
    {
        let mut iter = automata.into_iter();
        let first = iter.next()?.clone();
        Some(iter.fold(first, |acc, a| acc.union(a)))
    }

    /// Subset construction.
    ///
    /// Composite states are named by joining their sorted member names with
    /// `_`. A composite state is final if any member is final; when the final
    /// members recognise different tokens, the token appearing earliest in
    /// `token_priority` wins. Tokens missing from `token_priority` rank after
    /// all listed ones and are ordered by name among themselves.
    pub fn determinize<S: AsRef<str>>(&self, token_priority: &[S]) -> Automaton {
        let rank = |token: &String| {
            token_priority
                .iter()
                .position(|t| t.as_ref() == token.as_str())
                .unwrap_or(usize::MAX)
        };

        let mut names: BTreeMap<BTreeSet<String>, String> = BTreeMap::new();
        let mut used: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut name_of = |set: &BTreeSet<String>, names: &mut BTreeMap<BTreeSet<String>, String>| {
            if let Some(name) = names.get(set) {
                return (name.clone(), false);
            }
            let members: Vec<&str> = set.iter().map(|s| s.as_str()).collect();
            let mut name = String::from(members.join("_"));
            while used.get(&name).is_some_and(|other| other != set) {
                name.push('\'');
            }
            used.insert(name.clone(), set.clone());
            names.insert(set.clone(), name.clone());
            (name, true)
        };

        let start = self.epsilon_closure([&self.initial]);
        let (initial, _) = name_of(&start, &mut names);
        let mut out = Automaton::new(&initial);
        out.alphabet = self.alphabet.clone();

        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let current_name = names[&current].clone();

            let token = current
                .iter()
                .filter(|s| self.finals.contains(*s))
                .filter_map(|s| self.final_to_token.get(s))
                .min_by(|a, b| rank(*a).cmp(&rank(*b)).then_with(|| a.cmp(b)));
            if current.iter().any(|s| self.finals.contains(s)) {
                out.add_final(&current_name, token.map(|t| t.as_str()));
            }

            for &c in &self.alphabet {
                let next = self.step(&current, c);
                if next.is_empty() {
                    continue;
                }
                let (next_name, fresh) = name_of(&next, &mut names);
                if fresh {
                    queue.push_back(next);
                }
                out.add_transition(&current_name, Label::Symbol(c), &next_name);
            }
        }
        log::debug!(
            "determinize: {} states -> {} states",
            self.states.len(),
            out.states.len()
        );
        out
    }

    /// Returns a copy with states renamed `q0, q1, …` in breadth-first order
    /// from the initial state (symbols visited in order), keeping tokens.
    pub fn canonical(&self) -> Automaton {
        let mut order: BTreeMap<&String, String> = BTreeMap::new();
        let mut queue = VecDeque::from([&self.initial]);
        order.insert(&self.initial, "q0".into());
        while let Some(state) = queue.pop_front() {
            let labels = std::iter::once(Label::Epsilon).chain(self.alphabet.iter().map(|&c| Label::Symbol(c)));
            for label in labels {
                for target in self.targets(state, label) {
                    if !order.contains_key(target) {
                        order.insert(target, format!("q{}", order.len()).into());
                        queue.push_back(target);
                    }
                }
            }
        }
        // unreachable states keep a stable name after the reachable ones
        for s in &self.states {
            if !order.contains_key(s) {
                order.insert(s, format!("q{}", order.len()).into());
            }
        }
        self.rename(|s| order[s].clone())
    }

    /// Returns a copy with every state renamed through `f`.
    pub fn rename<F>(&self, f: F) -> Automaton
    where
        F: Fn(&String) -> String,
    {
        Automaton {
            states: self.states.iter().map(&f).collect(),
            alphabet: self.alphabet.clone(),
            initial: f(&self.initial),
            finals: self.finals.iter().map(&f).collect(),
            transitions: self
                .transitions
                .iter()
                .map(|((origin, label), targets)| ((f(origin), *label), targets.iter().map(&f).collect()))
                .collect(),
            final_to_token: self
                .final_to_token
                .iter()
                .map(|(s, t)| (f(s), t.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Even number of `a`s; `b` loops everywhere.
    fn even_a() -> Automaton {
        let mut fa = Automaton::new("p0");
        fa.add_transition("p0", Label::Symbol('a'), "p1");
        fa.add_transition("p1", Label::Symbol('a'), "p0");
        fa.add_transition("p0", Label::Symbol('b'), "p0");
        fa.add_transition("p1", Label::Symbol('b'), "p1");
        fa.add_final("p0", Some("EVEN_A"));
        fa
    }

    /// Number of `b`s divisible by three; `a` loops everywhere. Shares state
    /// names with nothing in `even_a` except through `collide`.
    fn triple_b(prefix: &str) -> Automaton {
        let s = |i: usize| format!("{}{}", prefix, i);
        let mut fa = Automaton::new(s(0));
        for i in 0..3 {
            fa.add_transition(s(i), Label::Symbol('b'), s((i + 1) % 3));
            fa.add_transition(s(i), Label::Symbol('a'), s(i));
        }
        fa.add_final(s(0), Some("TRIPLE_B"));
        fa
    }

    #[test]
    fn closure_follows_epsilon_chains() {
        let mut fa = Automaton::new("a");
        fa.add_transition("a", Label::Epsilon, "b");
        fa.add_transition("b", Label::Epsilon, "c");
        fa.add_transition("c", Label::Symbol('x'), "d");
        let closure = fa.epsilon_closure([&String::from("a")]);
        let names: Vec<&str> = closure.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn run_reports_token_and_rejections() {
        let fa = even_a();
        assert_eq!(
            fa.run("abab"),
            Verdict {
                accepted: true,
                token: Some("EVEN_A".into())
            }
        );
        assert!(!fa.accepts("ab"));
        assert!(fa.accepts(""));
        // unknown symbol has no successor
        assert!(!fa.accepts("aac"));
    }

    #[test]
    fn union_accepts_either_language() {
        init_logger();
        let u = even_a().union(&triple_b("p"));
        assert!(u.transitions.keys().any(|(s, l)| s == "qi" && *l == Label::Epsilon));
        // 1 a, 3 b's: only the second automaton accepts
        assert_eq!(u.run("abbb").token.as_deref(), Some("TRIPLE_B"));
        // 2 a's, 1 b: only the first
        assert_eq!(u.run("aab").token.as_deref(), Some("EVEN_A"));
        assert!(!u.accepts("ab"));
        // colliding names were renamed, not merged
        assert!(u.states.contains("af2-p0"));
        assert!(u.states.contains("p2"));
    }

    #[test]
    fn union_picks_a_fresh_initial_state() {
        let mut a = Automaton::new("qi");
        a.add_transition("qi", Label::Symbol('x'), "f");
        a.add_final("f", Some("X"));
        let u = a.union(&triple_b("t"));
        assert_eq!(u.initial, "qi1");
        assert!(u.accepts("x"));
        assert!(u.accepts("bbb"));
    }

    #[test]
    fn determinize_resolves_tokens_by_priority() {
        init_logger();
        let mut kw = Automaton::new("k0");
        kw.add_transition("k0", Label::Symbol('i'), "k1");
        kw.add_transition("k1", Label::Symbol('f'), "k2");
        kw.add_final("k2", Some("IF"));
        let mut id = Automaton::new("i0");
        id.add_transition("i0", Label::Symbol('i'), "i1");
        id.add_transition("i0", Label::Symbol('f'), "i1");
        id.add_transition("i1", Label::Symbol('i'), "i1");
        id.add_transition("i1", Label::Symbol('f'), "i1");
        id.add_final("i1", Some("ID"));

        let u = kw.union(&id);
        let dfa = u.determinize(&["IF", "ID"]);
        assert!(dfa.is_deterministic());
        assert_eq!(dfa.run("if").token.as_deref(), Some("IF"));
        assert_eq!(dfa.run("iff").token.as_deref(), Some("ID"));

        let dfa = u.determinize(&["ID", "IF"]);
        assert_eq!(dfa.run("if").token.as_deref(), Some("ID"));

        // unlisted tokens fall back to name order
        let dfa = u.determinize::<&str>(&[]);
        assert_eq!(dfa.run("if").token.as_deref(), Some("ID"));
    }

    #[test]
    fn determinize_is_idempotent_up_to_renaming() {
        let u = even_a().union(&triple_b("p"));
        let once = u.determinize(&["EVEN_A", "TRIPLE_B"]);
        let twice = once.determinize(&["EVEN_A", "TRIPLE_B"]);
        assert_eq!(once.canonical(), twice.canonical());
        for w in ["", "a", "ab", "abbb", "aab", "bbbbbb", "ababab"] {
            assert_eq!(u.run(w).accepted, once.run(w).accepted, "{w:?}");
        }
    }

    #[test]
    fn determinize_keeps_composite_names_distinct() {
        // members "1_2"+"3" and "1"+"2_3" would both join to "1_2_3"
        let mut fa = Automaton::new("s");
        fa.add_transition("s", Label::Symbol('x'), "1_2");
        fa.add_transition("s", Label::Symbol('x'), "3");
        fa.add_transition("s", Label::Symbol('y'), "1");
        fa.add_transition("s", Label::Symbol('y'), "2_3");
        let dfa = fa.determinize::<&str>(&[]);
        assert_eq!(dfa.states.len(), 3);
    }

    #[test]
    fn canonical_names_follow_breadth_first_order() {
        let c = even_a().canonical();
        assert_eq!(c.initial, "q0");
        assert!(c.finals.contains("q0"));
        assert_eq!(c.targets("q0", Label::Symbol('a')).next().map(|s| s.as_str()), Some("q1"));
    }
}
