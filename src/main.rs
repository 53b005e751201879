use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;

use rstdcx::{BuildConfig, BuildStats, LinkBuilder, OutputFormat};

#[derive(Parser)]
#[command(
    name = "rstdcx",
    version,
    about = "Generate link substitution files and tag files for an rst document tree"
)]
struct Cli {
    /// Root of the document tree
    #[arg(default_value = ".")]
    root: PathBuf,

    /// More output, repeat for debug logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Configuration file, defaults to rstdcx.toml in the root
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output formats to write, comma separated
    #[arg(long, value_delimiter = ',')]
    formats: Vec<OutputFormat>,

    /// Do not run gen manifests
    #[arg(long)]
    no_gen: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(stats) => {
            print_summary(&stats);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: &Cli) -> Result<BuildStats> {
    let mut config = match &cli.config {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            BuildConfig::load(path)
        }
        None => BuildConfig::load_from_root(&cli.root),
    }
    .context("Failed to load configuration")?;

    if !cli.formats.is_empty() {
        config.formats = cli.formats.clone();
    }
    if cli.no_gen {
        config.run_generators = false;
    }

    LinkBuilder::new(config)
        .build(&cli.root)
        .with_context(|| format!("Failed to build links under {}", cli.root.display()))
}

fn print_summary(stats: &BuildStats) {
    println!(
        "{} folders, {} documents, {} targets, {} links ({} unresolved), {} generated files in {:.2?}",
        stats.folders,
        stats.documents,
        stats.targets,
        stats.links,
        stats.unresolved_links,
        stats.generated_files,
        stats.build_time
    );
}
