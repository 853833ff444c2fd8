use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use rayon::prelude::*;

use ctf_parser::driver::{self, CtfDriver, DEFAULT_THRESHOLD};
use ctf_parser::grammar::Grammar;
use ctf_parser::tokenize::{Tokenizer, WhitespaceTokenizer};

/// Parses sentences with a multilevel coarse-to-fine probabilistic CKY parser.
#[derive(Parser)]
#[command(name = "ctfparser")]
struct Args {
    /// Path to the finest-grained grammar, in JSON-lines Q1/Q2/WORDS form.
    #[arg(long)]
    grammar: PathBuf,

    /// Path to the nested-YAML coarse-to-fine symbol mapping.
    #[arg(long)]
    ctfmapping: PathBuf,

    /// Posterior-marginal pruning threshold; a candidate is admitted only if its projected
    /// marginal under the coarser level exceeds this value.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Install a stderr logger at info level.
    #[arg(long = "enable_logs")]
    enable_logs: bool,
}

fn main() {
    let args = Args::parse();
    if args.enable_logs {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let grammar = match Grammar::load_file(&args.grammar) {
        Ok(g) => g,
        Err(err) => {
            eprintln!("failed to load grammar {:?}: {}", args.grammar, err);
            std::process::exit(1);
        }
    };
    let mapping = match driver::load_mapping(&args.ctfmapping) {
        Ok(m) => m,
        Err(err) => {
            eprintln!("failed to load mapping {:?}: {}", args.ctfmapping, err);
            std::process::exit(1);
        }
    };
    let driver = match CtfDriver::build(grammar, mapping, args.threshold, None) {
        Ok(d) => d,
        Err(err) => {
            eprintln!("failed to build coarse-to-fine grammar chain: {}", err);
            std::process::exit(1);
        }
    };

    let tokenizer = WhitespaceTokenizer;
    let stdin = io::stdin();
    let lines: Vec<String> = stdin
        .lock()
        .lines()
        .collect::<io::Result<_>>()
        .expect("reading stdin");

    let outputs: Vec<String> = lines
        .par_iter()
        .map(|line| {
            let tokens = tokenizer.tokenize(line);
            match driver.parse(&tokens) {
                Ok((tree, _stats)) => serde_json::to_string(&tree).unwrap(),
                Err(_) => "[]".to_owned(),
            }
        })
        .collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in outputs {
        writeln!(out, "{}", line).expect("writing stdout");
    }
}
