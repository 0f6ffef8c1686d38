// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Doppel - replies to your messages, in your style, while you are away.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod review;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use doppel_config::DoppelConfig;

/// Doppel - an always-on autoresponder that writes in your voice.
#[derive(Parser, Debug)]
#[command(name = "doppel", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the reply service.
    Serve,
    /// Validate the configuration and print what would be started.
    CheckConfig,
    /// List replies that failed for good and need a human.
    Review {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

fn load(path: Option<&PathBuf>) -> DoppelConfig {
    let loaded = match path {
        Some(path) => doppel_config::load_and_validate_path(path),
        None => doppel_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            doppel_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

fn describe(config: &DoppelConfig) -> String {
    let mut out = format!("doppel: config ok (service.name={})\n", config.service.name);
    for channel in &config.channels {
        out.push_str(&format!(
            "  channel {} kind={} {}\n",
            channel.id,
            channel.resolved_kind(),
            if channel.enabled { "enabled" } else { "disabled" }
        ));
    }
    if config.gateway.enabled {
        out.push_str(&format!(
            "  gateway {}:{}{}\n",
            config.gateway.host,
            config.gateway.port,
            if config.gateway.bearer_token.is_some() {
                ""
            } else {
                " (no bearer token, /v1 locked)"
            }
        ));
    }
    out.push_str(&format!(
        "  storage {}\n  generator {} model={}\n",
        config.storage.database_path, config.generator.endpoint, config.generator.model
    ));
    out
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::CheckConfig) => {
            print!("{}", describe(&config));
            Ok(())
        }
        Some(Commands::Review { json }) => review::run_review(&config, json).await,
        None => {
            println!("doppel: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
