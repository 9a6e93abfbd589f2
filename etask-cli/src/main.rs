use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod calendar;
mod config;
mod state;
mod tasks_cmd;

#[derive(Parser, Debug)]
#[command(name = "etask", version, about = "Task list with derived progress, tabs and calendar")]
struct Cli {
    /// Work against a local JSON task file instead of the HTTP backend
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Task(tasks_cmd::TaskCommand),

    /// Manage ~/.etask/config.toml
    Config {
        #[command(subcommand)]
        command: config::ConfigCommand,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("ETASK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Config { command } => config::run(command)?,
        Command::Task(cmd) => {
            let cfg = config::load_config()?;
            tasks_cmd::run(cmd, &cfg, cli.snapshot).await?;
        }
    }

    Ok(())
}
