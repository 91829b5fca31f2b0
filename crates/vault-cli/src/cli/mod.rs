//! CLI for the vault content-access toolkit.

mod commands;
mod router_setup;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{run_cat, run_inspect, run_ls, run_stream};

/// Top-level CLI for the vault content-access toolkit.
#[derive(Debug, Parser)]
#[command(name = "vault")]
#[command(about = "Unified random-access reading over HTTP objects, local files, and RAR volumes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Open a target (local path or http(s):// URL) and write its bytes to stdout.
    Cat {
        /// Local path or http(s):// URL.
        target: String,
    },

    /// List a directory's or archive's children.
    Ls {
        /// Local path or http(s):// URL.
        target: String,
    },

    /// Resolve the best-scoring streamer for a target and write it to stdout.
    Stream {
        /// Local path or http(s):// URL.
        target: String,
    },

    /// Print what the RAR header parser sees in a volume's first file entry.
    Inspect {
        /// Path to a RAR volume file.
        volume: PathBuf,
    },
}

impl Cli {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        cli.command.run()
    }
}

impl CliCommand {
    fn run(self) -> Result<()> {
        match self {
            CliCommand::Cat { target } => {
                let cfg = vault_core::config::load_or_init()?;
                let router = router_setup::build_router(cfg);
                let item = router_setup::resolve_item(&target)?;
                run_cat(&router, &item)
            }
            CliCommand::Ls { target } => {
                let cfg = vault_core::config::load_or_init()?;
                let router = router_setup::build_router(cfg);
                let item = router_setup::resolve_item(&target)?;
                run_ls(&router, &item)
            }
            CliCommand::Stream { target } => {
                let cfg = vault_core::config::load_or_init()?;
                let router = router_setup::build_router(cfg);
                let item = router_setup::resolve_item(&target)?;
                run_stream(&router, &item)
            }
            CliCommand::Inspect { volume } => run_inspect(&volume),
        }
    }
}
