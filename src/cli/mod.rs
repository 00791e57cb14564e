//! CLI interface for tickfeed
//!
//! Provides subcommands for:
//! - `run`: Start the market-data engine
//! - `seed`: Write the default instrument universe into the store
//! - `config`: Show effective configuration

mod run;
mod seed;

pub use run::RunArgs;
pub use seed::SeedArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tickfeed")]
#[command(about = "Real-time market-data engine with write-behind persistence")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the market-data engine
    Run(RunArgs),
    /// Write the default instrument universe into the durable store
    Seed(SeedArgs),
    /// Show effective configuration
    Config,
}
