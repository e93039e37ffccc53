mod logging;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use elif_migrations::{
    MigrationConfig, MigrationLoader, MigrationRunResult, MigrationRunner, MigrationStatus,
    PostgresConnection, SqlDialect, SqlLedger,
};
use tracing::warn;

use crate::logging::{init_logging, LoggingConfig};

#[derive(Parser)]
#[command(name = "elif-migrate")]
#[command(about = "Apply and roll back file-based database migrations")]
struct Cli {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Directory holding migration files (defaults to MIGRATIONS_DIR or ./migrations)
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Ledger table name (defaults to MIGRATIONS_TABLE or elif_migrations)
    #[arg(long, global = true)]
    table: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new migration pair
    Make {
        /// Migration name
        name: String,
    },

    /// Run pending migrations
    Run,

    /// Rollback applied migrations
    Rollback {
        /// Roll back every migration newer than this version
        #[arg(long)]
        to: Option<String>,

        /// Number of migrations to roll back when no target is given
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },

    /// Show migration status
    Status,
}

impl Cli {
    fn config(&self) -> MigrationConfig {
        let mut config = MigrationConfig::from_env();
        if let Some(dir) = &self.migrations_dir {
            config.migrations_dir = dir.clone();
        }
        if let Some(table) = &self.table {
            config.migrations_table = table.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig::default().verbose(cli.verbose).json(cli.json);
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command, returning whether it succeeded
async fn execute(cli: Cli) -> Result<bool> {
    let config = cli.config();

    match &cli.command {
        Commands::Make { name } => {
            fs::create_dir_all(&config.migrations_dir).with_context(|| {
                format!("creating {}", config.migrations_dir.display())
            })?;
            let loader = MigrationLoader::new(&config.migrations_dir)?;
            let version = loader.create_migration(name)?;
            println!(
                "Created migration {} in {}",
                version,
                config.migrations_dir.display()
            );
            Ok(true)
        }
        Commands::Run => {
            let (mut runner, handle) = open_runner(&cli, &config).await?;
            let result = runner.migrate().await;
            handle.close().await;
            report(&result, cli.json)
        }
        Commands::Rollback { to, steps } => {
            let (mut runner, handle) = open_runner(&cli, &config).await?;
            let result = runner.rollback_to(to.as_deref(), *steps).await;
            handle.close().await;
            report(&result, cli.json)
        }
        Commands::Status => {
            let (mut runner, handle) = open_runner(&cli, &config).await?;
            let status = runner.status().await;
            handle.close().await;
            report_status(&status, cli.json)
        }
    }
}

/// Connect to the database and build a runner.
///
/// The second value shares the runner's pool and is used to close it.
async fn open_runner(
    cli: &Cli,
    config: &MigrationConfig,
) -> Result<(MigrationRunner, PostgresConnection)> {
    let url = cli
        .database_url
        .as_deref()
        .context("no database configured, set DATABASE_URL or pass --database-url")?;

    let ledger = SqlLedger::from_url(url, config.migrations_table.clone())?;
    if ledger.dialect() != SqlDialect::PostgreSQL {
        bail!("elif-migrate only bundles a PostgreSQL driver, got a {} URL", ledger.dialect());
    }

    let loader = MigrationLoader::new(&config.migrations_dir)?;
    let connection = PostgresConnection::connect(url).await?;
    let handle = PostgresConnection::new(connection.pool().clone());

    Ok((
        MigrationRunner::new(loader, Box::new(ledger), Box::new(connection)),
        handle,
    ))
}

fn report(result: &MigrationRunResult, json: bool) -> Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(result.success);
    }

    for version in &result.executed_versions {
        println!("  ✅ {}", version);
    }
    for version in &result.rolled_back_versions {
        println!("  ↩️  {}", version);
    }

    if result.success {
        println!("{}", result.message);
    } else {
        warn!("Migration run stopped early");
        eprintln!("❌ {}", result.message);
    }

    Ok(result.success)
}

fn report_status(status: &MigrationStatus, json: bool) -> Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(status.error.is_none());
    }

    println!("Migration Status:");
    println!("================");

    if status.executed.is_empty() && status.pending.is_empty() {
        println!("No migrations found");
    }
    for unit in &status.executed {
        println!("  ✅ {} {}", unit.version(), unit.name());
    }
    for unit in &status.pending {
        println!("  ⏳ {} {}", unit.version(), unit.name());
    }

    if let Some(error) = &status.error {
        eprintln!("❌ {}", error);
        return Ok(false);
    }

    println!(
        "\n{} executed, {} pending",
        status.executed.len(),
        status.pending.len()
    );
    Ok(true)
}
