use clap::{Parser, Subcommand};

use regex_suffix_sets::Regexp;

use std::io::{self, Write};
use std::process;

#[derive(Parser, Debug)]
#[command(name = "resuf", version, about = "Match patterns by suffix-set evaluation")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Output DOT (Graphviz) representation of the matcher tree
    Dot {
        /// Pattern to compile
        pattern: String,
    },
    /// Match pattern against one or more inputs
    Match {
        /// Pattern to compile
        pattern: String,
        /// Inputs to test; a match on any prefix counts
        #[arg(required = true)]
        inputs: Vec<String>,
        /// Print the matcher tree and the remaining suffixes of each input
        #[arg(long)]
        debug: bool,
    },
}

fn parse_pattern(pattern: &str) -> Regexp {
    Regexp::new(pattern).unwrap_or_else(|e| {
        eprintln!("error: failed to parse pattern: {e}");
        process::exit(1);
    })
}

fn run_dot(pattern: &str) {
    let regex = parse_pattern(pattern);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = regex.to_dot(&mut out).and_then(|()| out.flush()) {
        eprintln!("error: failed to write DOT output: {e}");
        process::exit(1);
    }
}

fn run_match(pattern: &str, inputs: &[String], debug: bool) {
    let regex = parse_pattern(pattern);

    eprintln!("pattern: {pattern}");
    eprintln!("nodes: {}", regex.node_count());
    if debug {
        for (i, node) in regex.nodes().iter().enumerate() {
            eprintln!("[node {i}] {node}");
        }
    }
    eprintln!();

    let mut any_failed = false;
    for input in inputs {
        let bytes = input.as_bytes();

        if debug {
            let mut suffixes = regex
                .accept(bytes)
                .iter()
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect::<Vec<_>>();
            suffixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            eprintln!("--- input: {:?} ---", input);
            eprintln!("[suffixes] {:?}", suffixes);
            if let Some(prefix) = regex.longest_match(bytes) {
                eprintln!("[longest] {:?}", String::from_utf8_lossy(prefix));
            }
        }

        if regex.is_match(bytes) {
            println!("  \x1b[32mMATCH\x1b[0m  {:?}", input);
        } else {
            println!("  \x1b[31mNO MATCH\x1b[0m  {:?}", input);
            any_failed = true;
        }
    }

    if any_failed {
        process::exit(1);
    }
}

fn main() {
    let args = Args::parse();
    match args.command {
        Command::Dot { pattern } => run_dot(&pattern),
        Command::Match {
            pattern,
            inputs,
            debug,
        } => run_match(&pattern, &inputs, debug),
    }
}
