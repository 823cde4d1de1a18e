//! Table-driven SLR(1) parsing engine.
//!
//! The engine is a shift/reduce/goto stack machine over a [`ParseTable`]. It
//! works on token *names* (the terminals of the grammar), appends the
//! [`END_MARKER`] itself and records one [`TraceRow`] per step. Rejecting the
//! input is a normal outcome reported through [`ParseOutcome::accepted`];
//! only a corrupted table makes [`Parser::parse`] return an error.

use crate::error::{Error, Result};
use crate::table::{Action, END_MARKER, ParseTable, Production};
use smartstring::alias::String;
use std::fmt;
use std::io::{self, Write};

/// What the engine did in one step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceAction {
    Shift(usize),
    Reduce(usize, Production),
    Accept,
    Error,
}

impl fmt::Display for TraceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceAction::Shift(n) => write!(f, "s{}", n),
            TraceAction::Reduce(n, prod) => write!(f, "r{} ({})", n, prod),
            TraceAction::Accept => write!(f, "accept"),
            TraceAction::Error => write!(f, "ERRO"),
        }
    }
}

/// One row of a parse trace: the configuration *before* the action was taken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceRow {
    /// 1-based step number.
    pub step: usize,
    /// State stack, bottom first.
    pub stack: Vec<usize>,
    /// Remaining input, lookahead first, ending with `$`.
    pub input: Vec<String>,
    /// The action taken from this configuration.
    pub action: TraceAction,
}

impl fmt::Display for TraceRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stack: Vec<std::string::String> = self.stack.iter().map(|s| s.to_string()).collect();
        let input: Vec<&str> = self.input.iter().map(|s| s.as_str()).collect();
        write!(
            f,
            "{} | {} | {} | {}",
            self.step,
            stack.join(" "),
            input.join(" "),
            self.action
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub tokens: usize,
    pub shifts: usize,
    pub reductions: usize,
}

/// Result of a completed parse.
#[derive(Clone, Debug)]
pub struct ParseOutcome {
    /// `true` if the table reached its accept action.
    pub accepted: bool,
    /// Every step taken, in order. A rejected parse ends with an `ERRO` row.
    pub trace: Vec<TraceRow>,
    pub stats: ParserStats,
}

impl ParseOutcome {
    /// Writes the trace, one `step | stack | input | action` line per row.
    ///
    /// # Returns
    /// Returns `Ok(())` on success or an [`io::Error`] if writing fails.
    pub fn write_trace<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "STEP | STACK | INPUT | ACTION")?;
        for row in &self.trace {
            writeln!(out, "{}", row)?;
        }
        writeln!(out)?;
        writeln!(out, "{}", if self.accepted { "ACCEPTED" } else { "REJECTED" })?;
        Ok(())
    }
}

/// Per-call machine configuration. Never shared between parses.
struct ParserCtx {
    states: Vec<usize>,
    input: Vec<String>,
    cursor: usize,
    trace: Vec<TraceRow>,
    stats: ParserStats,
}

impl ParserCtx {
    fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut input: Vec<String> = tokens.into_iter().map(|t| String::from(t.as_ref())).collect();
        let stats = ParserStats {
            tokens: input.len(),
            ..Default::default()
        };
        input.push(END_MARKER.into());
        Self {
            states: vec![0],
            input,
            cursor: 0,
            trace: Vec::new(),
            stats,
        }
    }

    fn top(&self) -> usize {
        self.states.last().copied().unwrap_or_default()
    }

    fn record(&mut self, action: TraceAction) {
        let row = TraceRow {
            step: self.trace.len() + 1,
            stack: self.states.clone(),
            input: self.input[self.cursor.min(self.input.len())..].to_vec(),
            action,
        };
        log::trace!("{}", row);
        self.trace.push(row);
    }

    fn finish(self, accepted: bool) -> ParseOutcome {
        ParseOutcome {
            accepted,
            trace: self.trace,
            stats: self.stats,
        }
    }
}

/// Drives a [`ParseTable`] over token streams.
#[derive(Clone, Copy, Debug)]
pub struct Parser<'t> {
    table: &'t ParseTable,
}

impl<'t> Parser<'t> {
    pub fn new(table: &'t ParseTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'t ParseTable {
        self.table
    }

    /// Parses a sequence of terminal names.
    ///
    /// # Errors
    /// [`Error::MissingGoto`], [`Error::StackUnderflow`] or
    /// [`Error::UnknownProduction`] if the table is inconsistent. A rejected
    /// input is `Ok` with `accepted == false`.
    pub fn parse<I, S>(&self, tokens: I) -> Result<ParseOutcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ctx = ParserCtx::new(tokens);
        loop {
            let state = ctx.top();
            let action = match ctx.input.get(ctx.cursor) {
                Some(lookahead) => self.table.action(state, lookahead),
                None => None,
            };
            match action {
                Some(Action::Shift(next)) => {
                    ctx.record(TraceAction::Shift(next));
                    ctx.states.push(next);
                    ctx.cursor += 1;
                    ctx.stats.shifts += 1;
                }

                Some(Action::Reduce(prod_id)) => {
                    let prod = self
                        .table
                        .productions
                        .get(prod_id)
                        .ok_or(Error::UnknownProduction { prod: prod_id })?;
                    ctx.record(TraceAction::Reduce(prod_id, prod.clone()));
                    let n = prod.body.len();
                    if n >= ctx.states.len() {
                        return Err(Error::StackUnderflow { prod: prod_id });
                    }
                    ctx.states.truncate(ctx.states.len() - n);
                    let uncovered = ctx.top();
                    let Some(Action::Goto(next)) = self.table.action(uncovered, &prod.head) else {
                        return Err(Error::MissingGoto {
                            state: uncovered,
                            nonterminal: prod.head.clone(),
                        });
                    };
                    ctx.states.push(next);
                    ctx.stats.reductions += 1;
                }

                Some(Action::Accept) => {
                    ctx.record(TraceAction::Accept);
                    log::debug!("accepted after {} steps", ctx.trace.len());
                    return Ok(ctx.finish(true));
                }

                // a goto under a terminal lookahead means the token named a nonterminal
                Some(Action::Goto(_)) | None => {
                    ctx.record(TraceAction::Error);
                    log::debug!(
                        "rejected in state {} on {:?}",
                        state,
                        ctx.input.get(ctx.cursor).map(|s| s.as_str()).unwrap_or(END_MARKER)
                    );
                    return Ok(ctx.finish(false));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // S' -> S ; S -> a S ; S -> b
    fn prods() -> Vec<Production> {
        vec![
            Production::new("S'", &["S"]),
            Production::new("S", &["a", "S"]),
            Production::new("S", &["b"]),
        ]
    }

    fn table_with(cells: &[(usize, &str, Action)]) -> ParseTable {
        let mut tab = ParseTable::new(
            5,
            prods(),
            vec!["a".into(), "b".into(), "$".into()],
            vec!["S".into()],
            "S'".into(),
        );
        for (state, sym, action) in cells {
            tab.set(*state, sym, *action);
        }
        tab
    }

    fn right_list() -> ParseTable {
        table_with(&[
            (0, "a", Action::Shift(2)),
            (0, "b", Action::Shift(3)),
            (0, "S", Action::Goto(1)),
            (1, "$", Action::Accept),
            (2, "a", Action::Shift(2)),
            (2, "b", Action::Shift(3)),
            (2, "S", Action::Goto(4)),
            (3, "$", Action::Reduce(2)),
            (4, "$", Action::Reduce(1)),
        ])
    }

    #[test]
    fn accepts_with_full_trace() {
        init_logger();
        let tab = right_list();
        let out = Parser::new(&tab).parse(["a", "b"]).unwrap();
        assert!(out.accepted);
        let actions: Vec<std::string::String> = out.trace.iter().map(|r| r.action.to_string()).collect();
        assert_eq!(actions, ["s2", "s3", "r2 (S → b)", "r1 (S → a S)", "accept"]);
        assert_eq!(out.trace[0].stack, vec![0]);
        assert_eq!(out.trace[0].input, ["a", "b", "$"].map(String::from));
        assert_eq!(out.trace[2].stack, vec![0, 2, 3]);
        assert_eq!(out.trace[4].stack, vec![0, 1]);
        assert_eq!(out.trace[4].input, [String::from("$")]);
        assert_eq!(out.trace[3].to_string(), "4 | 0 2 4 | $ | r1 (S → a S)");
        assert_eq!(
            out.stats,
            ParserStats {
                tokens: 2,
                shifts: 2,
                reductions: 2
            }
        );
    }

    #[test]
    fn rejects_with_error_row() {
        init_logger();
        let tab = right_list();
        let out = Parser::new(&tab).parse(["a"]).unwrap();
        assert!(!out.accepted);
        assert_eq!(out.trace.len(), 2);
        let last = out.trace.last().unwrap();
        assert_eq!(last.action, TraceAction::Error);
        assert_eq!(last.action.to_string(), "ERRO");
        assert_eq!(last.stack, vec![0, 2]);

        let out = Parser::new(&tab).parse(Vec::<&str>::new()).unwrap();
        assert!(!out.accepted);
        assert_eq!(out.trace.len(), 1);

        // a nonterminal name in the input is not a terminal
        let out = Parser::new(&tab).parse(["S"]).unwrap();
        assert!(!out.accepted);
    }

    #[test]
    fn trace_is_written_in_order() {
        let tab = right_list();
        let out = Parser::new(&tab).parse(["b"]).unwrap();
        let mut buf = Vec::new();
        out.write_trace(&mut buf).unwrap();
        let text = std::string::String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "STEP | STACK | INPUT | ACTION\n\
             1 | 0 | b $ | s3\n\
             2 | 0 3 | $ | r2 (S → b)\n\
             3 | 0 1 | $ | accept\n\
             \n\
             ACCEPTED\n"
        );
    }

    #[test]
    fn missing_goto_is_fatal() {
        let tab = table_with(&[(0, "b", Action::Shift(3)), (3, "$", Action::Reduce(2))]);
        let err = Parser::new(&tab).parse(["b"]).unwrap_err();
        assert_eq!(
            err,
            Error::MissingGoto {
                state: 0,
                nonterminal: "S".into()
            }
        );
        assert!(err.is_internal());
    }

    #[test]
    fn stack_underflow_is_fatal() {
        let tab = table_with(&[(0, "b", Action::Reduce(1))]);
        let err = Parser::new(&tab).parse(["b"]).unwrap_err();
        assert_eq!(err, Error::StackUnderflow { prod: 1 });
    }

    #[test]
    fn reduce_by_unknown_production_is_fatal() {
        let tab = table_with(&[(0, "b", Action::Reduce(42))]);
        let err = Parser::new(&tab).parse(["b"]).unwrap_err();
        assert_eq!(err, Error::UnknownProduction { prod: 42 });
        assert!(err.is_internal());
    }
}
