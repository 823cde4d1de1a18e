//! Command-line interface for the `lexgen` lexer generator.
//!
//! Reads a regular-definitions file, writes the persisted lexer automaton
//! and, given a words file, the `<word,token>` stream for it.

#[cfg(feature = "cli")]
mod real {
    use clap::Parser;
    use lexslr_gen::lexgen;
    use std::path::PathBuf;

    #[derive(Parser)]
    #[command(about = "Generate a lexer automaton from regular definitions")]
    struct Args {
        /// Path to the regular-definitions file.
        #[arg(short = 's', long)]
        spec: PathBuf,

        /// Path to the output directory.
        #[arg(short = 'o', long)]
        output_dir: PathBuf,

        /// Prefix used to construct output file names.
        #[arg(short = 'n', long)]
        name: String,

        /// Words to classify, one per line.
        #[arg(short = 'i', long)]
        input: Option<PathBuf>,

        /// Enable debug logging (off by default).
        #[arg(short = 'd', long)]
        debug: bool,
    }

    pub fn main() -> anyhow::Result<()> {
        let args = Args::parse();
        let level = if args.debug { "debug" } else { "info" };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
        lexgen::generate(
            args.spec,
            args.output_dir,
            args.name,
            args.input.as_deref(),
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
    eprintln!("lexgen disabled (compiled without `cli` feature)");
}
