use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tableprof_core::{IdentifierCasing, ProfileDefinition};
use tableprof_engine::{Profiler, ProfilerOptions};
use tableprof_store::{PostgresStore, RelationalStore};

/// Tableprof - concurrent relational database profiler
#[derive(Parser)]
#[command(name = "tableprof")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Target database connection string (or TABLEPROF_TARGET_DB)
    #[arg(long, global = true)]
    target_db: Option<String>,

    /// Profile store connection string (or TABLEPROF_PROFILE_DB)
    #[arg(long, global = true)]
    profile_db: Option<String>,

    /// Connect to both databases over TLS
    #[arg(long, global = true)]
    tls: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Profile the tables named in a definition file
    Run {
        /// Path to the profile definition JSON file
        #[arg(short, long, default_value = "profile.json")]
        definition: PathBuf,

        /// Use pascal case for synthesized table and column names
        #[arg(long)]
        pascal_case: bool,

        /// Maximum number of tables profiled concurrently
        #[arg(long, default_value_t = 8)]
        max_concurrency: usize,
    },

    /// Verify both database connections
    TestConnection,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let target_db = resolve_conn(cli.target_db.as_deref(), "TABLEPROF_TARGET_DB")
        .context("target database connection string is required (--target-db or TABLEPROF_TARGET_DB)")?;
    let profile_db = resolve_conn(cli.profile_db.as_deref(), "TABLEPROF_PROFILE_DB")
        .context("profile store connection string is required (--profile-db or TABLEPROF_PROFILE_DB)")?;

    match cli.command {
        Commands::Run {
            definition,
            pascal_case,
            max_concurrency,
        } => {
            run_command(
                &target_db,
                &profile_db,
                &definition,
                pascal_case,
                max_concurrency,
                cli.tls,
                cli.verbose,
            )
            .await
        }
        Commands::TestConnection => test_connection_command(&target_db, &profile_db, cli.tls).await,
    }
}

fn resolve_conn(flag: Option<&str>, env_var: &str) -> Option<String> {
    flag.map(str::to_string).or_else(|| std::env::var(env_var).ok())
}

async fn connect(conn_str: &str, tls: bool) -> Result<Arc<dyn RelationalStore>> {
    let store = if tls {
        PostgresStore::connect_with_tls(conn_str).await?
    } else {
        PostgresStore::connect(conn_str).await?
    };
    Ok(Arc::new(store))
}

async fn run_command(
    target_db: &str,
    profile_db: &str,
    definition_path: &Path,
    pascal_case: bool,
    max_concurrency: usize,
    tls: bool,
    verbose: bool,
) -> Result<()> {
    let definition = ProfileDefinition::from_file(definition_path)
        .with_context(|| format!("failed to load {}", definition_path.display()))?;

    if definition.is_empty() {
        eprintln!("{}", "Definition names no tables; nothing to do".yellow());
        return Ok(());
    }

    if verbose {
        eprintln!(
            "{} {} table task(s) from {}",
            "Loaded".cyan(),
            definition.task_count(),
            definition_path.display()
        );
    }

    let target = connect(target_db, tls)
        .await
        .context("failed to connect to the target database")?;
    let profile_store = connect(profile_db, tls)
        .await
        .context("failed to connect to the profile store")?;

    let options = ProfilerOptions {
        casing: if pascal_case {
            IdentifierCasing::Pascal
        } else {
            IdentifierCasing::Snake
        },
        max_concurrency,
    };

    eprintln!("{}", "Starting profile run...".cyan());
    let started = Instant::now();

    let profiler = Profiler::new(target, profile_store, options)
        .await
        .context("failed to scaffold the profile store")?;

    match profiler.run_profile(&definition).await {
        Ok(()) => {
            eprintln!(
                "{} in {:.2?}",
                "Profile run complete".green().bold(),
                started.elapsed()
            );
            Ok(())
        }
        Err(error) => {
            eprintln!(
                "{} after {:.2?}: {}",
                "Profile run incomplete".red().bold(),
                started.elapsed(),
                error
            );
            Err(error.into())
        }
    }
}

async fn test_connection_command(target_db: &str, profile_db: &str, tls: bool) -> Result<()> {
    let target = connect(target_db, tls).await?;
    target
        .test_connection()
        .await
        .context("target database connection failed")?;
    eprintln!("{} target database reachable", "OK".green().bold());

    let profile_store = connect(profile_db, tls).await?;
    profile_store
        .test_connection()
        .await
        .context("profile store connection failed")?;
    eprintln!("{} profile store reachable", "OK".green().bold());

    Ok(())
}
