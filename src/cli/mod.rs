pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "nvlp")]
#[command(about = "NVLP CLI - Command-line client for the NVLP budgeting API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, default_value = "default", help = "Stored session to use")]
    pub profile: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Sign in, sign out and session status")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "List, create, update and delete transactions")]
    Transactions {
        #[command(subcommand)]
        cmd: commands::transactions::TransactionCommands,
    },

    #[command(about = "List budgets owned by the current user")]
    Budgets,

    #[command(about = "Show the dashboard for a budget")]
    Dashboard {
        #[arg(help = "Budget ID")]
        budget_id: String,
    },

    #[command(about = "Device registration and remote sign-out")]
    Devices {
        #[command(subcommand)]
        cmd: commands::devices::DeviceCommands,
    },

    #[command(about = "Check API server health")]
    Health,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let client = config::build_client(&cli.profile)?;

    match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(&client, cmd, output_format).await,
        Commands::Transactions { cmd } => {
            commands::transactions::handle(&client, cmd, output_format).await
        }
        Commands::Budgets => commands::dashboard::budgets(&client, output_format).await,
        Commands::Dashboard { budget_id } => {
            commands::dashboard::show(&client, &budget_id, output_format).await
        }
        Commands::Devices { cmd } => commands::devices::handle(&client, cmd, output_format).await,
        Commands::Health => commands::health::handle(&client, output_format).await,
    }
}
