use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use sift::Filter;
use sift::config::FiltersConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of threads (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Filter JSON-lines records, writing the matches to stdout
    Run {
        #[command(flatten)]
        filter: FilterSource,

        /// Input JSON-lines file (defaults to stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print only the number of matching records
        #[arg(long)]
        count: bool,
    },

    /// Rewrite a filter in canonical form
    Fmt {
        #[command(flatten)]
        filter: FilterSource,

        /// Single-line output, comments dropped
        #[arg(long)]
        dense: bool,
    },

    /// Validate a filter without evaluating it
    Check {
        #[command(flatten)]
        filter: FilterSource,
    },

    /// List the keys a filter references and what it implies about them
    Keys {
        #[command(flatten)]
        filter: FilterSource,
    },

    /// Render the filter as a SQL predicate over a key/value column
    Sql {
        #[command(flatten)]
        filter: FilterSource,

        /// Column the predicate indexes into
        #[arg(long, default_value = "tags")]
        column: String,

        /// Print the expression tree as JSON instead of SQL
        #[arg(long)]
        json: bool,
    },
}

/// Where the filter comes from: a literal, a file, or a named entry in a
/// YAML filter library.
#[derive(Args)]
pub struct FilterSource {
    /// Filter expression text
    #[arg(short, long)]
    pub expr: Option<String>,

    /// File containing the filter expression
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Name of a filter in the library given with --library
    #[arg(short, long, requires = "library")]
    pub name: Option<String>,

    /// YAML filter library file
    #[arg(short, long)]
    pub library: Option<PathBuf>,
}

impl FilterSource {
    pub fn compile(&self) -> Result<Filter> {
        match (&self.expr, &self.file, &self.name) {
            (Some(expr), None, None) => Ok(Filter::parse(expr)?),
            (None, Some(path), None) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("CLI: Failed to read filter from {:?}", path))?;
                Ok(Filter::parse(&source)?)
            }
            (None, None, Some(name)) => {
                let library = self
                    .library
                    .as_ref()
                    .context("CLI: --name requires --library")?;
                let config = FiltersConfig::load(library)
                    .with_context(|| format!("CLI: Failed to load filter library {:?}", library))?;
                config.compile(name)
            }
            _ => bail!("CLI: Give exactly one of --expr, --file or --name"),
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            filter,
            input,
            count,
        } => {
            let filter = filter.compile()?;
            run_records(&filter, input.as_deref(), count)
        }
        Command::Fmt { filter, dense } => {
            let filter = filter.compile()?;
            let text = if dense {
                filter.to_dense()
            } else {
                filter.to_pretty()
            };
            println!("{text}");
            Ok(())
        }
        Command::Check { filter } => {
            let filter = filter.compile()?;
            println!("ok: references {} keys", filter.keys().len());
            Ok(())
        }
        Command::Keys { filter } => {
            let filter = filter.compile()?;
            let usage = filter.key_usage();
            for key in filter.keys() {
                if usage.present.contains(key) {
                    println!("{key}\talways present");
                } else if usage.absent.contains(key) {
                    println!("{key}\talways absent");
                } else {
                    println!("{key}");
                }
            }
            Ok(())
        }
        Command::Sql {
            filter,
            column,
            json,
        } => {
            let filter = filter.compile()?;
            if json {
                let tree = serde_json::to_string_pretty(&filter.to_query())
                    .context("CLI: Failed to serialize expression tree")?;
                println!("{tree}");
            } else {
                println!("{}", filter.to_sql(&column));
            }
            Ok(())
        }
    }
}

fn run_records(filter: &Filter, input: Option<&std::path::Path>, count_only: bool) -> Result<()> {
    let reader: Box<dyn BufRead> = match input {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("CLI: Failed to open input {:?}", path))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    tracing::info!(
        "Filter references {} keys: {}",
        filter.keys().len(),
        filter.to_dense()
    );

    let lines: Vec<String> = reader
        .lines()
        .collect::<std::io::Result<_>>()
        .context("CLI: Failed to read input")?;

    let predicate = filter.predicate();
    let matched: Vec<&String> = lines
        .par_iter()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| match serde_json::from_str(line) {
            Ok(record) => predicate.matches(&record),
            Err(err) => {
                tracing::warn!("Skipping malformed record: {err}");
                false
            }
        })
        .collect();

    tracing::info!("Matched {} of {} records", matched.len(), lines.len());

    if count_only {
        println!("{}", matched.len());
    } else {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for line in matched {
            writeln!(out, "{line}").context("CLI: Failed to write output")?;
        }
    }
    Ok(())
}
