use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use log::debug;
use snip_eval::{ExecutorConfig, MAX_CALL_DEPTH};
use snip_harness::{
    Catalog, Expectation, JsonReporter, LoadedCatalog, ReportFormat, Reporter, RunConfig, Runner,
    TextReporter, BUILTIN,
};

#[derive(Parser)]
#[command(name = "snipcheck", version)]
#[command(about = "Run the JavaScript snippet catalog and check every expectation")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Load this TOML catalog instead of the built-in one
    #[arg(long, global = true, env = "SNIPCHECK_CATALOG")]
    catalog: Option<PathBuf>,

    /// Stop after this many failures
    #[arg(long, global = true, env = "SNIPCHECK_MAX_FAILURES")]
    max_failures: Option<usize>,

    /// Time budget per example in milliseconds (0 disables it)
    #[arg(long, global = true, env = "SNIPCHECK_TIMEOUT_MS", default_value = "1000")]
    timeout_ms: u64,

    /// Deepest allowed call nesting (at most 1024)
    #[arg(
        long,
        global = true,
        env = "SNIPCHECK_MAX_CALL_DEPTH",
        default_value = "64",
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_CALL_DEPTH as u64)
    )]
    max_call_depth: usize,

    /// Only run examples whose id contains this text
    #[arg(long, global = true)]
    filter: Option<String>,

    /// Report format
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the catalog (the default)
    Run,
    /// List example ids and titles
    List,
    /// Print one example's source and expectation
    Show {
        /// Example id
        id: String,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match try_main(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every selected example passed.
fn try_main(cli: Cli) -> Result<bool> {
    let catalog = load_catalog(cli.catalog.as_ref())?;
    for rejected in &catalog.rejected {
        eprintln!("REJECTED {}: {}", rejected.id, rejected.reason);
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let config = RunConfig {
                executor: ExecutorConfig {
                    timeout: (cli.timeout_ms > 0).then(|| Duration::from_millis(cli.timeout_ms)),
                    max_call_depth: cli.max_call_depth,
                },
                max_failures: cli.max_failures,
                filter: cli.filter,
            };
            debug!("run config: {config:?}");
            let stdout = io::stdout().lock();
            let mut reporter: Box<dyn Reporter> = match cli.format {
                ReportFormat::Text => Box::new(TextReporter::new(stdout)),
                ReportFormat::Json => Box::new(JsonReporter::new(stdout)),
            };
            let summary = Runner::new(config)
                .run(&catalog, reporter.as_mut())
                .context("writing report")?;
            Ok(summary.all_passed())
        }
        Commands::List => {
            for example in catalog.select(cli.filter.as_deref()) {
                match example.title() {
                    Some(title) => println!("{}\t{title}", example.id()),
                    None => println!("{}", example.id()),
                }
            }
            Ok(true)
        }
        Commands::Show { id } => {
            let Some(example) = catalog.get(&id) else {
                bail!("no example with id '{id}'");
            };
            println!("# {}", example.id());
            if let Some(title) = example.title() {
                println!("# {title}");
            }
            println!("# sha256 {}", example.source_digest());
            println!();
            println!("{}", example.source().trim_end());
            println!();
            match example.expectation() {
                Expectation::Output(lines) => {
                    println!("expected output:");
                    for line in lines {
                        println!("  {line}");
                    }
                }
                Expectation::Error(kind) => println!("expected error: {kind}"),
            }
            Ok(true)
        }
    }
}

fn load_catalog(path: Option<&PathBuf>) -> Result<LoadedCatalog> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading catalog {}", path.display()))?;
            Catalog::load(&text).with_context(|| format!("loading catalog {}", path.display()))
        }
        None => Catalog::load(BUILTIN).context("loading built-in catalog"),
    }
}
