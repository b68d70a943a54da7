use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use threadline_core::Config;

mod commands;
mod mcp;

#[derive(Parser)]
#[command(name = "threadline")]
#[command(about = "Track personas, objectives, problems and their threads, with session timing")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overrides the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Local user name, overrides the config
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage personas
    #[command(subcommand)]
    Persona(PersonaCommand),
    /// Manage objectives and their gaps
    #[command(subcommand)]
    Objective(ObjectiveCommand),
    /// Manage problems
    #[command(subcommand)]
    Problem(ProblemCommand),
    /// Manage thread items under a problem
    #[command(subcommand)]
    Thread(ThreadCommand),
    /// Time work on a thread item
    #[command(subcommand)]
    Session(SessionCommand),
    /// Remember the selected persona and objective
    Select {
        #[arg(long)]
        persona: Option<String>,
        #[arg(long)]
        objective: Option<String>,
        /// Clear both selections
        #[arg(long)]
        clear: bool,
    },
    /// Start MCP server via stdio
    Mcp,
}

#[derive(Subcommand)]
pub enum PersonaCommand {
    List,
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "0")]
        order: i64,
    },
    Rename { id: String, name: String },
    /// Delete a persona and everything it owns
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum ObjectiveCommand {
    List,
    Add {
        title: String,
        #[arg(long, default_value = "0")]
        order: i64,
    },
    /// Add an ideal-versus-current gap to an objective
    Gap {
        objective_id: String,
        ideal: String,
        current: String,
    },
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum ProblemCommand {
    /// List problems of a persona or objective (the selection by default)
    List {
        #[arg(long)]
        persona: Option<String>,
        #[arg(long)]
        objective: Option<String>,
    },
    Add {
        title: String,
        #[arg(long)]
        persona: Option<String>,
        #[arg(long)]
        objective: Option<String>,
        #[arg(long)]
        gap: Option<String>,
        /// Nest under another problem
        #[arg(long)]
        parent: Option<String>,
    },
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum ThreadCommand {
    List { problem_id: String },
    Add {
        problem_id: String,
        content: String,
        /// General, Insight, Bottleneck, Task, Action or Session
        #[arg(long = "type", default_value = "General")]
        ty: String,
        #[arg(long)]
        reply_to: Option<String>,
    },
    /// Change the type of an item, resetting its type-specific fields
    Retype { id: String, ty: String },
    /// Toggle a Task item, complete an Action or resolve a Bottleneck
    Done { id: String },
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    Start { thread_id: String },
    Pause,
    Resume,
    /// Stop and record the session as a thread item
    Stop,
    Status,
    /// Print the elapsed time until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(db) = cli.db {
        config.database_path = Some(db);
    }
    if let Some(user) = cli.user {
        config.user_name = user;
    }

    // stdout belongs to the MCP transport
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let engine = commands::open_engine(&config).await?;
    commands::run(engine, &config, cli.command).await
}
