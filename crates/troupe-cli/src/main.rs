//! Troupe CLI — run worker teams from YAML definitions.
//!
//! Hosts the troupe-core engine behind a load-modify-save loop: each
//! command loads a conversation from SQLite, runs a team over it, and
//! persists the updated log.

mod commands;

use clap::{Parser, Subcommand};

/// Troupe CLI — team orchestration over pluggable workers
#[derive(Parser)]
#[command(name = "troupe", version, about = "Troupe CLI — team orchestration over pluggable workers")]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(long, env = "TROUPE_DB_PATH", default_value = "troupe.db")]
    db: String,

    /// Path to the team definition YAML file
    #[arg(long, short = 't', env = "TROUPE_TEAM", default_value = "team.yaml")]
    team: String,

    /// Quick prompt mode: run the planned team once against a fresh
    /// conversation. Example: troupe -p "Process order 42: 2x SKU-100"
    #[arg(short = 'p', long = "prompt")]
    prompt: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the planned team once against a conversation
    Process {
        /// Conversation ID to load and append to
        #[arg(long)]
        conversation: String,
        /// The inquiry to append before running
        message: String,
        /// Print produced messages as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Interactive chat session with the team
    Chat {
        /// Conversation ID to load and append to (random if omitted)
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Validate a team definition YAML file without running it
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "troupe_core=warn,troupe_cli=info".into()),
        )
        .init();

    let result = if let Some(prompt_text) = cli.prompt {
        // ── Quick prompt mode: troupe -p "inquiry" ──────────────────
        let conversation = uuid::Uuid::new_v4().to_string();
        commands::process::run(&cli.db, &cli.team, &conversation, &prompt_text, false).await
    } else if let Some(command) = cli.command {
        match command {
            Commands::Process {
                conversation,
                message,
                json,
            } => commands::process::run(&cli.db, &cli.team, &conversation, &message, json).await,

            Commands::Chat { conversation } => {
                let conversation =
                    conversation.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                commands::chat::run(&cli.db, &cli.team, &conversation).await
            }

            Commands::Validate => commands::validate::run(&cli.team),
        }
    } else {
        // No prompt and no subcommand — show help
        use clap::CommandFactory;
        Cli::command().print_help().ok();
        println!();
        Ok(())
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
