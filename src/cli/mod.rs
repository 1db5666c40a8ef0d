pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "forms")]
#[command(about = "Forms CLI - command-line interface for the Forms API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Server URL (overrides the saved session)")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Authentication and session management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Form management")]
    Forms {
        #[command(subcommand)]
        cmd: commands::forms::FormsCommands,
    },

    #[command(about = "Submit data to a form through the public API")]
    Submit(commands::submit::SubmitArgs),

    #[command(about = "Browse form submissions")]
    Submissions {
        #[command(subcommand)]
        cmd: commands::submissions::SubmissionsCommands,
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
    let server = cli.server;

    match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, server, output_format).await,
        Commands::Forms { cmd } => commands::forms::handle(cmd, server, output_format).await,
        Commands::Submit(args) => commands::submit::handle(args, server, output_format).await,
        Commands::Submissions { cmd } => {
            commands::submissions::handle(cmd, server, output_format).await
        }
    }
}
