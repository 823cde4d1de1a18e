use super::definitions::{Definitions, Lexer, write_lexemes};
use anyhow::{Context, Result};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Builds the lexer automaton for a definitions file and writes it to
/// `<output_dir>/<name>.fa`.
///
/// With `input`, every line of that file is a word to classify and the
/// `<word,token>` stream goes to `<output_dir>/<name>.tokens`. With `debug`,
/// the transition listing is also written to the log.
pub fn generate<P, Q>(spec_path: P, output_dir: Q, name: impl AsRef<str>, input: Option<&Path>, debug: bool) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let spec_path = spec_path.as_ref();
    let output_dir = output_dir.as_ref();
    let name = name.as_ref();

    let text = std::fs::read_to_string(spec_path)
        .with_context(|| format!("cannot read definitions {}", spec_path.display()))?;
    let defs = Definitions::parse(&text).with_context(|| format!("in {}", spec_path.display()))?;
    let lexer = Lexer::new(&defs).with_context(|| format!("cannot build lexer from {}", spec_path.display()))?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create output directory {}", output_dir.display()))?;

    let fa_path = output_dir.join(format!("{}.fa", name));
    let mut out = BufWriter::new(
        std::fs::File::create(&fa_path).with_context(|| format!("cannot create {}", fa_path.display()))?,
    );
    lexer
        .automaton()
        .write_text(&mut out)
        .with_context(|| format!("cannot write {}", fa_path.display()))?;
    out.flush()?;
    log::info!(
        "wrote {} ({} states)",
        fa_path.display(),
        lexer.automaton().states.len()
    );

    if debug {
        for line in lexer.automaton().to_text()?.lines() {
            log::info!("{}", line);
        }
    }

    if let Some(input) = input {
        let words = std::fs::read_to_string(input).with_context(|| format!("cannot read words {}", input.display()))?;
        let lexemes = lexer.scan(words.lines());
        let rejected = lexemes.iter().filter(|l| l.token.is_none()).count();

        let tokens_path = output_dir.join(format!("{}.tokens", name));
        let mut out = BufWriter::new(
            std::fs::File::create(&tokens_path).with_context(|| format!("cannot create {}", tokens_path.display()))?,
        );
        write_lexemes(&mut out, &lexemes)?;
        out.flush()?;
        log::info!(
            "wrote {} ({} words, {} rejected)",
            tokens_path.display(),
            lexemes.len(),
            rejected
        );
    }
    Ok(())
}
