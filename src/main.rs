//! CLI entry point for the repository retrieval core.
//!
//! Provides commands for building a repository index, searching it, and
//! inspecting the persisted state.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use codequery::{IndexSource, RepositorySession, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(name = "codequery")]
#[command(version, about = "Index a code repository and search it semantically")]
#[command(styles = clap_cargo_style())]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "codequery.toml")]
    config: PathBuf,

    /// Override the index directory from the configuration
    #[arg(long, global = true)]
    index_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or load) the index for a repository
    Index {
        /// Repository root to index
        #[arg(default_value = ".")]
        repo: PathBuf,

        /// Rebuild even if a usable persisted index exists
        #[arg(long)]
        force: bool,
    },
    /// Search the persisted index
    Search {
        /// Free-text query
        query: String,

        /// Number of results to return
        #[arg(short = 'k', long, default_value_t = 5)]
        limit: usize,

        /// Repository root, used only if the index must be rebuilt
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
    /// Show information about the persisted index
    Info,
    /// Delete the persisted index
    Clear,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        if let Some(index_error) = e.downcast_ref::<codequery::IndexError>() {
            for suggestion in index_error.recovery_suggestions() {
                eprintln!("  hint: {suggestion}");
            }
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Arc::new(Settings::load_from(cli.config)?);
    let session = match cli.index_path {
        Some(path) => RepositorySession::with_index_path(settings, path),
        None => RepositorySession::new(settings),
    };

    match cli.command {
        Commands::Index { repo, force } => {
            let start = Instant::now();
            let summary = session.initialize(&repo, force)?;

            let action = match summary.source {
                IndexSource::Loaded => "Loaded",
                IndexSource::Rebuilt => "Indexed",
            };
            println!(
                "{action} {} chunks in {:.2}s ({} files, {} skipped)",
                summary.documents,
                start.elapsed().as_secs_f64(),
                summary.files_indexed,
                summary.files_skipped,
            );
            if summary.degraded {
                println!(
                    "Warning: no embedding model available; using the deterministic \
                     local fallback. Results match content, not meaning."
                );
            }
        }
        Commands::Search { query, limit, repo } => {
            session.initialize(&repo, false)?;
            let results = session.search(&query, limit)?;

            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (rank, result) in results.iter().enumerate() {
                let meta = &result.document.metadata;
                println!(
                    "{}. {} (chunk {}/{}, distance {:.4})",
                    rank + 1,
                    meta.source_path.display(),
                    meta.chunk_index + 1,
                    meta.total_chunks,
                    result.distance,
                );
                for line in result.document.snippet(200).lines().take(4) {
                    println!("     {line}");
                }
            }
        }
        Commands::Info => {
            let persistence = codequery::IndexPersistence::new(session.index_path().to_path_buf());
            match persistence.load()? {
                Some(persisted) => {
                    println!("Index directory: {}", session.index_path().display());
                    println!("Documents:       {}", persisted.store.len());
                    println!("Vectors:         {}", persisted.index.len());
                    println!("Dimension:       {}", persisted.index.dimension().get());
                    println!("Provider:        {}", persisted.identity);
                }
                None => println!(
                    "No index found at {}. Run 'codequery index <repository>' first.",
                    session.index_path().display()
                ),
            }
        }
        Commands::Clear => {
            let persistence = codequery::IndexPersistence::new(session.index_path().to_path_buf());
            if persistence.exists() {
                persistence.clear()?;
                println!("Removed index at {}", session.index_path().display());
            } else {
                println!("No index found at {}", session.index_path().display());
            }
        }
    }

    Ok(())
}
