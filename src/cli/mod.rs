pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "dynrest")]
#[command(about = "dynrest CLI - Administration for the dynamic REST API")]
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
    #[command(about = "API key management")]
    Keys {
        #[command(subcommand)]
        cmd: commands::keys::KeyCommands,
    },

    #[command(about = "Inspect the module registry")]
    Modules {
        #[command(subcommand)]
        cmd: commands::modules::ModuleCommands,
    },

    #[command(about = "Describe the table behind a module")]
    Schema {
        #[command(subcommand)]
        cmd: commands::schema::SchemaCommands,
    },
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

    match cli.command {
        Commands::Keys { cmd } => commands::keys::handle(cmd, output_format).await,
        Commands::Modules { cmd } => commands::modules::handle(cmd, output_format).await,
        Commands::Schema { cmd } => commands::schema::handle(cmd, output_format).await,
    }
}
