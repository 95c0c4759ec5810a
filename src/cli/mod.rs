pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::config::config;

#[derive(Parser)]
#[command(name = "lendflow")]
#[command(about = "Lendflow CLI - Command-line client for the loan-management API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Login, logout and session information")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "List, read and write backend resources")]
    Data {
        #[command(subcommand)]
        cmd: commands::data::DataCommands,
    },

    #[command(about = "Lead workflows")]
    Lead {
        #[command(subcommand)]
        cmd: commands::lead::LeadCommands,
    },

    #[command(about = "Role-based navigation and page access")]
    Nav {
        #[command(subcommand)]
        cmd: commands::nav::NavCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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
    let app = App::init(config().clone())?;

    let result = match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, &app, output_format).await,
        Commands::Data { cmd } => commands::data::handle(cmd, &app, output_format).await,
        Commands::Lead { cmd } => commands::lead::handle(cmd, &app, output_format).await,
        Commands::Nav { cmd } => commands::nav::handle(cmd, &app, output_format),
    };

    app.dispose();
    result
}
