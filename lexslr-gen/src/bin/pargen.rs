//! Command-line interface for the `pargen` parser generator.
//!
//! Reads a grammar, writes its SLR(1) table as CSV and, given a lexer output
//! file, the parse trace for its token column.

#[cfg(feature = "cli")]
mod real {
    use clap::Parser;
    use lexslr_gen::pargen;
    use std::path::PathBuf;

    #[derive(Parser)]
    #[command(about = "Generate an SLR(1) parse table from a grammar")]
    struct Args {
        /// Path to the grammar file.
        #[arg(short = 'g', long)]
        grammar: PathBuf,

        /// Path to the output directory.
        #[arg(short = 'o', long)]
        output_dir: PathBuf,

        /// Prefix used to construct output file names.
        #[arg(short = 'n', long)]
        name: String,

        /// Lexer output (`<word,token>` lines) to parse.
        #[arg(short = 't', long)]
        tokens: Option<PathBuf>,

        /// Regular definitions the grammar terminals must match.
        #[arg(short = 's', long)]
        spec: Option<PathBuf>,

        /// Enable debug logging and write the analysis report.
        #[arg(short = 'd', long)]
        debug: bool,
    }

    pub fn main() -> anyhow::Result<()> {
        let args = Args::parse();
        let level = if args.debug { "debug" } else { "info" };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
        pargen::generate(
            args.grammar,
            args.output_dir,
            args.name,
            args.tokens.as_deref(),
            args.spec.as_deref(),
            args.debug,
        )
    }
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    real::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("pargen disabled (compiled without `cli` feature)");
}
