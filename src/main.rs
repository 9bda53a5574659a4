//! tabrl CLI - XBRL Table Linkbase resolver

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use tabrl::{export, Axis, Diagnostic, ResolvedTableSet, Severity, TablePackage};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// XBRL Table Linkbase resolver
#[derive(ClapParser)]
#[command(name = "tabrl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log resolution progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the tables of a package
    Resolve {
        /// Table package (JSON)
        input: PathBuf,

        /// Only resolve this table
        #[arg(short, long)]
        table: Option<String>,

        /// Output the structural model as JSON
        #[arg(short, long)]
        json: bool,

        /// Label language
        #[arg(long)]
        lang: Option<String>,
    },

    /// Check table definitions and cell tag selectors
    Validate {
        /// Table package (JSON)
        input: PathBuf,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Benchmark table resolution
    Bench {
        /// Table package (JSON)
        input: PathBuf,

        /// Number of iterations
        #[arg(short, long, default_value = "100")]
        iterations: usize,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "tabrl=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(input: &Path) -> Result<TablePackage> {
    TablePackage::from_file(input).with_context(|| format!("Failed to load {}", input.display()))
}

fn print_summary(set: &ResolvedTableSet) {
    println!("{} {}", "✓".green().bold(), set.definition);
    for table in &set.tables {
        if !table.parameters.is_empty() {
            let params: Vec<String> = table
                .parameters
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();
            println!("  Parameters: {}", params.join(", "));
        }
        println!("  Columns: {}", table.data_cols);
        println!("  Rows: {}", table.data_rows);
        println!(
            "  Z: {} breakdown(s), {} choice(s)",
            table.z_breakdowns,
            set.leaf_node_count(table, Axis::Z)
        );
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics.iter().take(20) {
        match diagnostic.severity {
            Severity::Error => println!("  {} {}", "ERROR:".red(), diagnostic),
            Severity::Warning => println!("  {} {}", "WARNING:".yellow(), diagnostic),
        }
    }
    if diagnostics.len() > 20 {
        println!("  ... and {} more", diagnostics.len() - 20);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Resolve {
            input,
            table,
            json,
            lang,
        } => {
            let mut package = load(&input)?;
            if let Some(lang) = lang {
                package.config = package.config.clone().with_lang(&lang);
            }
            let lang = package.config.lang.clone();

            let start = Instant::now();
            let (sets, failures) = match table {
                Some(key) => {
                    let set = package
                        .resolve_table(&key)
                        .with_context(|| format!("Failed to resolve table {}", key))?;
                    (vec![set], Vec::new())
                }
                None => {
                    let resolution = package.resolver().resolve_all();
                    (resolution.table_sets, resolution.diagnostics)
                }
            };
            let elapsed = start.elapsed();

            if json {
                let exported: Vec<_> = sets.iter().map(|s| export::export_table_set(s, &lang)).collect();
                println!("{}", serde_json::to_string_pretty(&exported)?);
            } else {
                for set in &sets {
                    print_summary(set);
                    print_diagnostics(&set.diagnostics);
                }
                for failure in &failures {
                    println!("{} {}", "✗".red().bold(), failure);
                }
                println!("  Time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
            }
            if !failures.is_empty() {
                std::process::exit(1);
            }
        }

        Commands::Validate { input, strict } => {
            let package = load(&input)?;
            let resolution = package.resolver().resolve_all();

            let mut diagnostics: Vec<Diagnostic> = resolution.diagnostics;
            for set in &resolution.table_sets {
                diagnostics.extend(set.diagnostics.iter().cloned());
            }
            let errors = diagnostics.iter().filter(|d| d.is_error()).count();
            let warnings = diagnostics.len() - errors;

            if diagnostics.is_empty() {
                println!("{} {} - Tables are valid", "✓".green().bold(), input.display());
            } else {
                println!("{} {} - Validation failed", "✗".red().bold(), input.display());
                println!("  Errors: {}", errors);
                println!("  Warnings: {}", warnings);
                print_diagnostics(&diagnostics);

                if errors > 0 || (strict && warnings > 0) {
                    std::process::exit(1);
                }
            }
        }

        Commands::Bench { input, iterations } => {
            let package = load(&input)?;
            let resolver = package.resolver();

            // Warmup
            for _ in 0..3 {
                let _ = resolver.resolve_all();
            }

            let mut times = Vec::with_capacity(iterations.max(1));
            let mut nodes: usize = 0;
            for _ in 0..iterations.max(1) {
                let start = Instant::now();
                let resolution = resolver.resolve_all();
                times.push(start.elapsed());
                nodes = resolution.table_sets.iter().map(|s| s.model.len()).sum();
            }

            times.sort();
            let min = times[0];
            let max = times[times.len() - 1];
            let median = times[times.len() / 2];
            let mean = times.iter().sum::<Duration>() / times.len() as u32;

            println!("Benchmark Results for {}", input.display());
            println!("  Iterations: {}", times.len());
            println!("  Structural nodes: {}", nodes);
            println!("  Min:    {:.3}ms", min.as_secs_f64() * 1000.0);
            println!("  Median: {:.3}ms", median.as_secs_f64() * 1000.0);
            println!("  Mean:   {:.3}ms", mean.as_secs_f64() * 1000.0);
            println!("  Max:    {:.3}ms", max.as_secs_f64() * 1000.0);
            println!("  Throughput: {:.0} nodes/sec", nodes as f64 / mean.as_secs_f64());
        }
    }

    Ok(())
}
