//! CLI module for mongolap
//!
//! Provides commands:
//! - `presets`: List the named time ranges
//! - `plan`: Print the pipeline a query body compiles to
//! - `demo`: Insert and query metrics against an in-memory store

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod demo;
pub mod plan;

/// Mongolap analytics query compiler
#[derive(Parser, Debug)]
#[command(name = "mongolap")]
#[command(about = "Compile analytics queries into aggregation pipelines")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List range presets
    Presets,
    /// Print the aggregation pipeline for a JSON query body
    Plan {
        /// Target namespace
        namespace: String,
        /// Query body file (stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Periodically insert and query metrics in memory
    Demo {
        /// Stop after this many queries (runs until Ctrl-C when omitted)
        #[arg(short, long)]
        ticks: Option<u32>,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Presets) => {
            for name in mongolap_core::RangePresets::standard().names() {
                println!("{name}");
            }
            Ok(())
        }
        Some(Commands::Plan { namespace, file }) => plan::run(&namespace, file).await,
        Some(Commands::Demo { ticks }) => demo::run(ticks).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
