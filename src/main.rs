//! specsync - checklist tasks to GitHub issues
//!
//! Command-line entry point: loads settings, wires the tracker client and
//! ledger together, and maps results to exit codes.

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use specsync::reconcile::StatusEntry;
use specsync::task::ValidationResult;
use specsync::{
    compute_status, discover_documents, validate_document, ConfigValidator, IssueLookupCache,
    Reconciler, Result, SourceDocument, SyncConfig, SyncError, SyncStateManager, TrackerClient,
};

#[derive(Parser)]
#[command(name = "specsync")]
#[command(version)]
#[command(about = "Mirror checklist tasks in spec documents as GitHub issues", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Tracker connection flags, layered over `.specsync/settings.json`.
#[derive(Args)]
struct TrackerArgs {
    /// Target repository as owner/name
    #[arg(short, long)]
    repository: Option<String>,

    /// GitHub token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize every task with its GitHub issue
    Sync {
        /// Show what would change without touching GitHub or the ledger
        #[arg(long)]
        dry_run: bool,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        tracker: TrackerArgs,
    },

    /// Lint every spec document
    Validate,

    /// Show which tasks need syncing (offline)
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the token and repository against GitHub
    TestConnection {
        #[command(flatten)]
        tracker: TrackerArgs,
    },

    /// Export the ledger for backup or migration
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge a previous export into the ledger
    Import {
        /// Export file to read
        file: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration files
    Validate,

    /// Show configuration file paths
    Paths,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "specsync=debug,info"
    } else {
        "specsync=info,warn"
    };

    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }

    // Resolve project path
    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.is_dir() {
        eprintln!(
            "{} Project directory does not exist: {}",
            "Error:".red().bold(),
            project_path.display()
        );
        std::process::exit(2);
    }

    match run(cli.command, &project_path).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Execute one command and return its exit code.
async fn run(command: Commands, project_path: &Path) -> Result<i32> {
    match command {
        Commands::Sync {
            dry_run,
            json,
            tracker,
        } => {
            let config = load_config(project_path)?.with_overrides(tracker.repository, tracker.token);
            let client = TrackerClient::new(&config.tracker)?;

            let mut state = SyncStateManager::new(config.ledger_path(project_path));
            state.load()?;

            let documents = discover(project_path, &config)?;
            info!(
                "Syncing {} document(s) with {}",
                documents.len(),
                client.repository()
            );

            let mut cache = IssueLookupCache::new();
            let report = Reconciler::new(&client, &mut state, &mut cache)
                .with_options(config.reconcile_options(dry_run))
                .reconcile(&documents)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.render());
            }
            Ok(report.exit_code())
        }

        Commands::Validate => {
            let config = load_config(project_path)?;
            let documents = discover(project_path, &config)?;

            let mut invalid = 0;
            for document in &documents {
                let result = validate_document(&document.content);
                print_validation(document, &result);
                if !result.valid {
                    invalid += 1;
                }
            }

            if invalid > 0 {
                return Err(SyncError::InvalidDocuments { count: invalid });
            }
            println!(
                "{} {} document(s) valid",
                "OK".green().bold(),
                documents.len()
            );
            Ok(0)
        }

        Commands::Status { json } => {
            let config = load_config(project_path)?;
            let mut state = SyncStateManager::new(config.ledger_path(project_path));
            state.load()?;

            let documents = discover(project_path, &config)?;
            let status = compute_status(&documents, &state)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
                return Ok(0);
            }

            println!("\n{} Sync Status", "Status:".cyan().bold());
            println!("{}", "─".repeat(40));
            for entry in status.pending() {
                print_pending(entry);
            }
            for key in &status.duplicates {
                println!("   {} duplicate key {}", "✗".red(), key.bold());
            }
            for key in &status.orphans {
                println!("   {} orphaned ledger entry {}", "!".yellow(), key);
            }

            let line = format!(
                "{} task(s), {} pending, {} duplicate, {} orphaned",
                status.entries.len(),
                status.pending_count(),
                status.duplicates.len(),
                status.orphans.len()
            );
            if status.is_clean() {
                println!("{} {}", "OK".green().bold(), line);
            } else {
                println!("{}", line.yellow());
            }
            Ok(0)
        }

        Commands::TestConnection { tracker } => {
            let config = load_config(project_path)?.with_overrides(tracker.repository, tracker.token);
            let client = TrackerClient::new(&config.tracker)?;

            let report = client.test_connection().await;
            if !report.success {
                eprintln!("{} {}", "Failed:".red().bold(), report.message);
                return Ok(1);
            }
            println!("{} {}", "OK".green().bold(), report.message);

            match client.rate_limit_status().await {
                Ok(quota) => println!(
                    "   Rate limit: {}/{} remaining, resets {}",
                    quota.remaining,
                    quota.limit,
                    quota.reset_at.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                Err(e) => debug!("Rate limit unavailable: {}", e),
            }
            Ok(0)
        }

        Commands::Export { output } => {
            let config = load_config(project_path)?;
            let mut state = SyncStateManager::new(config.ledger_path(project_path));
            state.load()?;
            let exported = state.export_state()?;

            match output {
                Some(path) => {
                    std::fs::write(&path, exported)?;
                    eprintln!(
                        "{} Exported {} record(s) to {}",
                        "OK".green().bold(),
                        state.len()?,
                        path.display()
                    );
                }
                None => println!("{}", exported),
            }
            Ok(0)
        }

        Commands::Import { file } => {
            let config = load_config(project_path)?;
            let content = std::fs::read_to_string(&file)?;

            let mut state = SyncStateManager::new(config.ledger_path(project_path));
            state.load()?;
            let count = state.import_state(&content)?;
            state.save()?;

            println!(
                "{} Imported {} record(s) into {}",
                "OK".green().bold(),
                count,
                state.path().display()
            );
            Ok(0)
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                let config = load_config(project_path)?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                } else {
                    println!("\n{} Project Configuration", "Config:".cyan().bold());
                    println!("{}", "─".repeat(40));
                    println!("   Specs dir: {}", config.specs_dir.display());
                    println!("   Task file: {}", config.task_file);
                    println!(
                        "   Ledger: {}",
                        config.ledger_path(project_path).display()
                    );
                    println!("   Labels: {}", config.labels.join(", "));
                    let repository = if config.tracker.repository.is_empty() {
                        "(not set)"
                    } else {
                        config.tracker.repository.as_str()
                    };
                    println!("   Repository: {}", repository);
                    println!("   API URL: {}", config.tracker.api_url);
                    println!(
                        "   Retries: {} (every {}ms)",
                        config.tracker.max_retries, config.tracker.retry_delay_ms
                    );
                    println!(
                        "   Rate limit buffer: {}",
                        config.tracker.rate_limit_buffer
                    );
                }
                Ok(0)
            }

            ConfigAction::Validate => {
                let report = ConfigValidator::new(project_path).validate();
                println!("{}", report.render());
                Ok(report.exit_code())
            }

            ConfigAction::Paths => {
                let config = SyncConfig::load(project_path).unwrap_or_default();
                println!("\n{} Configuration Paths", "Config:".cyan().bold());
                println!("{}", "─".repeat(40));
                println!(
                    "   Settings: {}",
                    SyncConfig::settings_path(project_path).display()
                );
                println!("   Specs: {}", config.specs_dir(project_path).display());
                println!("   Ledger: {}", config.ledger_path(project_path).display());
                Ok(0)
            }
        },
    }
}

fn load_config(project_path: &Path) -> Result<SyncConfig> {
    SyncConfig::load(project_path).map_err(|e| {
        SyncError::config_with_path(format!("{:#}", e), SyncConfig::settings_path(project_path))
    })
}

fn discover(project_path: &Path, config: &SyncConfig) -> Result<Vec<SourceDocument>> {
    discover_documents(
        project_path,
        &config.specs_dir(project_path),
        &config.task_file,
    )
}

fn print_validation(document: &SourceDocument, result: &ValidationResult) {
    if result.valid && result.warnings.is_empty() {
        println!("{} {}", "OK".green(), document.relative_path);
        return;
    }

    let marker = if result.valid {
        "Warning:".yellow()
    } else {
        "Error:".red()
    };
    println!("{} {}", marker, document.relative_path);
    for error in &result.errors {
        println!("   {} {}", "✗".red(), error);
    }
    for warning in &result.warnings {
        println!("   {} {}", "⚠".yellow(), warning);
    }
}

fn print_pending(entry: &StatusEntry) {
    let issue = entry
        .issue_number
        .map_or_else(|| "new".to_string(), |n| format!("#{}", n));
    println!(
        "   {} {} [{}] {} ({}, {})",
        "•".green(),
        entry.key.bold(),
        entry.status,
        entry.title,
        entry.location,
        issue
    );
}
