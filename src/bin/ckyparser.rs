use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use rayon::prelude::*;

use ctf_parser::cky::{self, parse, AlwaysAdmit};
use ctf_parser::grammar::Grammar;
use ctf_parser::tokenize::{Tokenizer, WhitespaceTokenizer};

/// Parses sentences with plain probabilistic CKY over a single grammar, without coarse-to-fine
/// pruning.
#[derive(Parser)]
#[command(name = "ckyparser")]
struct Args {
    /// Path to the grammar, in JSON-lines Q1/Q2/WORDS form.
    #[arg(long)]
    grammar: PathBuf,

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
            let (chart, _stats) = parse(&grammar, &tokens, &AlwaysAdmit);
            match cky::backtrace(&grammar, &chart, &tokens) {
                Ok(tree) => serde_json::to_string(&tree).unwrap(),
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
