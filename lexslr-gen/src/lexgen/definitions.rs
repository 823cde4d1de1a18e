//! Regular definitions and the lexer automaton built from them.
//!
//! A definitions file has one `name: regex` per line. Blank lines and lines
//! starting with `--` are ignored. A regex may refer to an earlier or later
//! definition as `<name>`; the reference is replaced by `(regex-of-name)`
//! before compilation. Every definition is a token, and declaration order is
//! the token priority used when one word matches several tokens.

use super::regex::compile;
use indexmap::IndexMap;
use lexslr::{Automaton, Error, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use smartstring::alias::String;
use std::fmt;
use std::io::{self, Write};

/// Maximum nesting of `<name>` references.
const MAX_DEPTH: usize = 64;

/// Shown in place of a token for words no token matches.
pub const NO_TOKEN: &str = "erro!";

static DEFINITION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.*?)\s*$"#).unwrap());

// escape pairs are matched first so `\<` never starts a reference
static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\\.|<([^<>]*)>|[<>]"#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    /// The regex as written, references unexpanded.
    pub regex: String,
    pub line_no: usize,
    line: String,
}

/// An ordered set of regular definitions.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    defs: IndexMap<String, Definition>,
}

impl Definitions {
    /// Parses a definitions file.
    ///
    /// # Errors
    /// [`Error::MalformedDefinition`] for a line that is not `name: regex`,
    /// or for a name defined twice.
    pub fn parse(text: &str) -> Result<Self> {
        let mut defs: IndexMap<String, Definition> = IndexMap::new();
        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("--") {
                continue;
            }
            let malformed = || Error::MalformedDefinition {
                line_no,
                line: trimmed.into(),
            };
            let caps = DEFINITION_RE.captures(trimmed).ok_or_else(malformed)?;
            let name: String = caps[1].into();
            if defs.contains_key(&name) {
                return Err(malformed());
            }
            defs.insert(
                name.clone(),
                Definition {
                    name,
                    regex: caps[2].into(),
                    line_no,
                    line: trimmed.into(),
                },
            );
        }
        log::debug!("{} definitions", defs.len());
        Ok(Self { defs })
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.defs.get(name)
    }

    /// Token names in priority (declaration) order.
    pub fn tokens(&self) -> impl Iterator<Item = &String> {
        self.defs.keys()
    }

    /// Returns the regex of `name` with every reference substituted.
    ///
    /// # Errors
    /// [`Error::UndefinedSubexpression`] for a reference to an unknown name,
    /// [`Error::MalformedExpression`] for a stray `<` or `>`, and
    /// [`Error::MalformedDefinition`] when references nest deeper than 64
    /// levels (which is what a cycle does).
    pub fn expand(&self, name: &str) -> Result<std::string::String> {
        let def = self.defs.get(name).ok_or_else(|| Error::UndefinedSubexpression { name: name.into() })?;
        self.expand_regex(&def.regex, def, 0)
    }

    fn expand_regex(&self, regex: &str, origin: &Definition, depth: usize) -> Result<std::string::String> {
        if depth > MAX_DEPTH {
            return Err(Error::MalformedDefinition {
                line_no: origin.line_no,
                line: origin.line.clone(),
            });
        }
        let mut error: Option<Error> = None;
        let expanded = REFERENCE_RE.replace_all(regex, |caps: &Captures| {
            if error.is_some() {
                return std::string::String::new();
            }
            let whole = &caps[0];
            let result = match caps.get(1) {
                Some(name) => match self.defs.get(name.as_str()) {
                    Some(def) => self.expand_regex(&def.regex, origin, depth + 1).map(|r| format!("({})", r)),
                    None => Err(Error::UndefinedSubexpression {
                        name: name.as_str().into(),
                    }),
                },
                None if whole.starts_with('\\') => Ok(whole.to_owned()),
                None => Err(Error::malformed(regex)),
            };
            result.unwrap_or_else(|e| {
                error = Some(e);
                std::string::String::new()
            })
        });
        match error {
            Some(e) => Err(e),
            None => Ok(expanded.into_owned()),
        }
    }

    /// Compiles every definition into its own DFA, in declaration order.
    pub fn automata(&self) -> Result<Vec<Automaton>> {
        self.defs
            .keys()
            .map(|name| {
                let regex = self.expand(name)?;
                log::trace!("{}: {}", name, regex);
                Ok(compile(&regex)?.to_automaton(name))
            })
            .collect()
    }
}

/// One classified word of the lexer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub word: String,
    /// `None` if no token matches the word.
    pub token: Option<String>,
}

impl Lexeme {
    /// Reads a `<word,token>` line back. The word may itself contain commas;
    /// the token is everything after the last one.
    pub fn parse_line(line: &str) -> Option<Lexeme> {
        let inner = line.trim().strip_prefix('<')?.strip_suffix('>')?;
        let (word, token) = inner.rsplit_once(',')?;
        Some(Lexeme {
            word: word.into(),
            token: (token != NO_TOKEN).then(|| token.into()),
        })
    }
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{},{}>", self.word, self.token.as_deref().unwrap_or(NO_TOKEN))
    }
}

/// A deterministic automaton recognising every token of a [`Definitions`].
#[derive(Debug, Clone)]
pub struct Lexer {
    automaton: Automaton,
}

impl Lexer {
    /// Builds `determinize(union of all token DFAs)`, breaking ties between
    /// tokens by declaration order.
    ///
    /// # Errors
    /// Any error from expanding or compiling a definition;
    /// [`Error::MalformedExpression`] if there are no definitions at all.
    pub fn new(defs: &Definitions) -> Result<Self> {
        let automata = defs.automata()?;
        let union = Automaton::union_all(&automata).ok_or_else(|| Error::malformed(""))?;
        let tokens: Vec<&String> = defs.tokens().collect();
        let automaton = union.determinize(&tokens).canonical();
        log::debug!(
            "lexer: {} tokens, {} states",
            tokens.len(),
            automaton.states.len()
        );
        Ok(Self { automaton })
    }

    /// Wraps an already deterministic automaton, e.g. one read back from its
    /// persisted form.
    pub fn from_automaton(automaton: Automaton) -> Self {
        Self { automaton }
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    /// Classifies one word.
    pub fn classify(&self, word: &str) -> Lexeme {
        let word = word.trim();
        let verdict = self.automaton.run(word);
        Lexeme {
            word: word.into(),
            token: verdict.token.filter(|_| verdict.accepted),
        }
    }

    /// Classifies each word. Blank words are skipped.
    pub fn scan<'a, I>(&self, words: I) -> Vec<Lexeme>
    where
        I: IntoIterator<Item = &'a str>,
    {
        words
            .into_iter()
            .filter(|w| !w.trim().is_empty())
            .map(|w| self.classify(w))
            .collect()
    }
}

/// Writes one `<word,token>` line per lexeme.
pub fn write_lexemes<W: Write>(out: &mut W, lexemes: &[Lexeme]) -> io::Result<()> {
    for lexeme in lexemes {
        writeln!(out, "{}", lexeme)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    const DEFS: &str = "\
-- keywords come before identifiers
IF: if
digit: [0-9]
NUM: <digit>(<digit>)*
ID: [a-z]([a-z0-9])*
PLUS: \\+
";

    #[test]
    fn parses_in_declaration_order() {
        let defs = Definitions::parse(DEFS).unwrap();
        let tokens: Vec<&str> = defs.tokens().map(|t| t.as_str()).collect();
        assert_eq!(tokens, ["IF", "digit", "NUM", "ID", "PLUS"]);
        assert_eq!(defs.get("NUM").unwrap().line_no, 4);
        assert_eq!(defs.get("PLUS").unwrap().regex, "\\+");
    }

    #[test]
    fn references_are_parenthesised() {
        let defs = Definitions::parse(DEFS).unwrap();
        assert_eq!(defs.expand("NUM").unwrap(), "([0-9])(([0-9]))*");

        // forward references resolve too
        let defs = Definitions::parse("A: <B>c\nB: a|b\n").unwrap();
        assert_eq!(defs.expand("A").unwrap(), "(a|b)c");

        // escaped angle brackets are kept as they are
        let defs = Definitions::parse("LT: \\<\n").unwrap();
        assert_eq!(defs.expand("LT").unwrap(), "\\<");
    }

    #[test]
    fn definition_errors() {
        let err = Definitions::parse("A: a\n\nbroken line\n").unwrap_err();
        assert_eq!(
            err,
            Error::MalformedDefinition {
                line_no: 3,
                line: "broken line".into()
            }
        );

        let err = Definitions::parse("A: a\nA: b\n").unwrap_err();
        assert!(matches!(err, Error::MalformedDefinition { line_no: 2, .. }));

        let defs = Definitions::parse("A: <missing>\n").unwrap();
        assert_eq!(
            defs.expand("A").unwrap_err(),
            Error::UndefinedSubexpression {
                name: "missing".into()
            }
        );

        let defs = Definitions::parse("A: a<b\n").unwrap();
        assert!(matches!(defs.expand("A"), Err(Error::MalformedExpression { .. })));

        let defs = Definitions::parse("A: <B>\nB: x<A>\n").unwrap();
        assert!(matches!(
            defs.expand("A"),
            Err(Error::MalformedDefinition { line_no: 1, .. })
        ));
    }

    #[test]
    fn scan_uses_declaration_priority() {
        init_logger();
        let defs = Definitions::parse(DEFS).unwrap();
        let lexer = Lexer::new(&defs).unwrap();
        assert!(lexer.automaton().is_deterministic());

        let out = lexer.scan(["if", "iff", "42", "7", "x1", "+", "", "1x", "  if  "]);
        let rendered: Vec<std::string::String> = out.iter().map(|l| l.to_string()).collect();
        assert_eq!(
            rendered,
            [
                "<if,IF>",
                "<iff,ID>",
                "<42,NUM>",
                // one digit is both `digit` and NUM; digit is declared first
                "<7,digit>",
                "<x1,ID>",
                "<+,PLUS>",
                "<1x,erro!>",
                "<if,IF>",
            ]
        );
    }

    #[test]
    fn lexer_survives_persistence() {
        let defs = Definitions::parse(DEFS).unwrap();
        let lexer = Lexer::new(&defs).unwrap();
        let back = Lexer::from_automaton(Automaton::from_text(&lexer.automaton().to_text().unwrap()).unwrap());
        for w in ["if", "i", "iff", "42", "7", "+", "++", "x-"] {
            assert_eq!(lexer.classify(w), back.classify(w), "{w:?}");
        }
    }

    #[test]
    fn lexeme_lines() {
        let l = Lexeme::parse_line("<a,b,ID>").unwrap();
        assert_eq!(l.word, "a,b");
        assert_eq!(l.token.as_deref(), Some("ID"));
        let l = Lexeme::parse_line("<??,erro!>").unwrap();
        assert_eq!(l.token, None);
        assert_eq!(l.to_string(), "<??,erro!>");
        assert!(Lexeme::parse_line("plain").is_none());

        let mut buf = Vec::new();
        write_lexemes(&mut buf, &[l]).unwrap();
        assert_eq!(buf, b"<??,erro!>\n");
    }

    #[test]
    fn no_definitions() {
        let defs = Definitions::parse("-- nothing\n\n").unwrap();
        assert!(defs.is_empty());
        assert!(Lexer::new(&defs).is_err());
    }
}
