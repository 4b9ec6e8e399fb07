pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Campus portal CLI - tenant routing, tokens and credentials")]
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
    #[command(about = "Show how a host header is routed to a tenant")]
    Resolve {
        #[arg(help = "Host header value, e.g. archwood1.seth.ng:443")]
        host: String,
    },

    #[command(about = "Issue and verify bearer tokens")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },

    #[command(about = "Generate a temporary password")]
    Password {
        #[arg(long, help = "Password length (minimum 8)")]
        length: Option<usize>,
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
        Commands::Resolve { host } => commands::resolve::handle(&host, output_format),
        Commands::Token { cmd } => commands::token::handle(cmd, output_format),
        Commands::Password { length } => commands::password::handle(length, output_format),
    }
}
