//! Command-line front-end for stsd-core (spec §6's minimal CLI surface).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stsd")]
#[command(about = "Simple time-series database file tool")]
#[command(version)]
struct Cli {
    /// Enable verbose (debug-level) logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty database file; errors if the path already exists.
    Init { path: PathBuf },

    /// Print header fields and page counts for an existing database file.
    Summary { path: PathBuf },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init { path } => {
            stsd_core::init(&path)?;
            tracing::info!(path = %path.display(), "created database");
            println!("Created {}", path.display());
        }
        Commands::Summary { path } => {
            let summary = stsd_core::summary(&path)?;
            println!("version:              {}", summary.version);
            println!("page_size:            {}", summary.page_size);
            println!("initial_year:         {}", summary.initial_year);
            println!("num_template_pages:   {}", summary.num_template_pages);
            println!("num_trend_pages:      {}", summary.num_trend_pages);
            println!("num_index_pages:      {}", summary.num_index_pages);
            println!("num_data_pages:       {}", summary.num_data_pages);
            println!("total_pages:          {}", summary.total_pages);
            println!("file_size_bytes:      {}", summary.file_size_bytes);
        }
    }
    Ok(())
}
