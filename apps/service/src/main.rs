use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use upwatch_service::config::Config;
use upwatch_service::logs::{ExecutionLog, LogRotation};
use upwatch_service::orchestrator::Orchestrator;

/// Uptime monitor with SMS alerts
#[derive(Debug, Parser)]
#[command(name = "upwatch", version, about)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true, env = "UPWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the monitoring service (default)
    Run,
    /// Compress live execution logs and prune old archives once
    RotateLogs,
    /// Inspect execution logs
    Logs {
        #[command(subcommand)]
        command: LogsCommand,
    },
    /// Inspect stored checks
    Checks {
        #[command(subcommand)]
        command: ChecksCommand,
    },
}

#[derive(Debug, Subcommand)]
enum LogsCommand {
    /// List log file ids
    List {
        /// Include compressed archives
        #[arg(long)]
        archived: bool,
    },
    /// Print a live log or a decompressed archive
    Show { file_id: String },
}

#[derive(Debug, Subcommand)]
enum ChecksCommand {
    /// List every check with its current state
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref())?;
    logger::init(&config.logging);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("{}", config);
            Orchestrator::start(config).await?;
        }
        Command::RotateLogs => {
            let log = Arc::new(ExecutionLog::new(&config.logs.directory));
            let report = LogRotation::new(log, config.logs.archive_retention_days).rotate().await?;
            println!("compressed {} logs, pruned {} archives", report.compressed, report.pruned);
        }
        Command::Logs { command } => {
            let log = ExecutionLog::new(&config.logs.directory);
            match command {
                LogsCommand::List { archived } => {
                    for file_id in log.list(archived).await? {
                        println!("{file_id}");
                    }
                }
                LogsCommand::Show { file_id } => print!("{}", log.read(&file_id).await?),
            }
        }
        Command::Checks { command: ChecksCommand::List } => {
            let orchestrator = Orchestrator::new(config).await?;
            for (id, check) in orchestrator.list_checks().await? {
                match check {
                    Ok(check) => println!("{id}  {:<7}  {}  ({})", check.state.to_string(), check.describe(), check.user_phone),
                    Err(rejection) => println!("{id}  malformed: {rejection}"),
                }
            }
        }
    }

    Ok(())
}
