use super::grammar::Grammar;
use super::lr0::CanonicalCollection;
use super::slr::{build_table, write_report};
use crate::lexgen::{Definitions, Lexeme, NO_TOKEN};
use anyhow::{Context, Result, bail};
use lexslr::Parser;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Token names from a lexer output stream, one `<word,token>` per line.
/// Rejected words keep their `erro!` marker so the parser stops on them.
pub fn token_column(text: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(lexeme) = Lexeme::parse_line(line) else {
            bail!("line {}: expected <word,token>, found {:?}", i + 1, line);
        };
        tokens.push(lexeme.token.as_deref().unwrap_or(NO_TOKEN).to_owned());
    }
    Ok(tokens)
}

fn create(path: &Path) -> Result<BufWriter<std::fs::File>> {
    let file = std::fs::File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Builds the SLR(1) table for a grammar file and writes it to
/// `<output_dir>/<name>.csv`.
///
/// With `definitions`, every grammar terminal must be a token of that
/// regular-definitions file. With `tokens`, the token column of a lexer
/// output file is parsed and the trace written to `<name>.trace`. With
/// `debug`, the productions, FIRST/FOLLOW sets and canonical collection go
/// to `<name>.report`.
pub fn generate<P, Q>(
    grammar_path: P,
    output_dir: Q,
    name: impl AsRef<str>,
    tokens: Option<&Path>,
    definitions: Option<&Path>,
    debug: bool,
) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let grammar_path = grammar_path.as_ref();
    let output_dir = output_dir.as_ref();
    let name = name.as_ref();

    let text = std::fs::read_to_string(grammar_path)
        .with_context(|| format!("cannot read grammar {}", grammar_path.display()))?;
    let grammar = Grammar::from_text(&text).with_context(|| format!("in {}", grammar_path.display()))?;

    if let Some(path) = definitions {
        let text = std::fs::read_to_string(path).with_context(|| format!("cannot read definitions {}", path.display()))?;
        let defs = Definitions::parse(&text).with_context(|| format!("in {}", path.display()))?;
        grammar
            .check_tokens(defs.tokens())
            .with_context(|| format!("{} does not match {}", grammar_path.display(), path.display()))?;
    }

    let collection = CanonicalCollection::build(&grammar);
    let table = build_table(&grammar, &collection);
    if !table.conflicts.is_empty() {
        log::warn!(
            "{}: {} table conflicts resolved silently",
            grammar_path.display(),
            table.conflicts.len()
        );
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create output directory {}", output_dir.display()))?;

    let csv_path = output_dir.join(format!("{}.csv", name));
    let mut out = create(&csv_path)?;
    table.write_csv(&mut out)?;
    out.flush()?;
    log::info!("wrote {} ({} states)", csv_path.display(), table.n_states());

    if debug {
        let report_path = output_dir.join(format!("{}.report", name));
        let mut out = create(&report_path)?;
        write_report(&mut out, &grammar, &collection, &table)?;
        out.flush()?;
        log::info!("wrote {}", report_path.display());
    }

    if let Some(path) = tokens {
        let text = std::fs::read_to_string(path).with_context(|| format!("cannot read tokens {}", path.display()))?;
        let input = token_column(&text).with_context(|| format!("in {}", path.display()))?;
        let outcome = Parser::new(&table).parse(&input)?;

        let trace_path = output_dir.join(format!("{}.trace", name));
        let mut out = create(&trace_path)?;
        outcome.write_trace(&mut out)?;
        out.flush()?;
        log::info!(
            "wrote {} ({} tokens, {})",
            trace_path.display(),
            input.len(),
            if outcome.accepted { "accepted" } else { "rejected" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_column_keeps_rejections() {
        let tokens = token_column("<x,id>\n\n<+,plus>\n<?,erro!>\n").unwrap();
        assert_eq!(tokens, ["id", "plus", "erro!"]);
        assert!(token_column("<x,id>\nnot a lexeme\n").is_err());
    }
}
