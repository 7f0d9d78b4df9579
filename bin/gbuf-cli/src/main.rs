// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # gbuf
//!
//! Command-line interface for the gbuf2d graphic buffer allocator.
//!
//! ## Usage
//! ```bash
//! # Report platform 2D acceleration capabilities
//! gbuf info
//!
//! # Run a synthetic frame workload through the allocator
//! gbuf exercise --frames 512 --sizes 8M,4M,1M --cache-bytes 32M
//!
//! # Same, driven by a TOML workload description
//! gbuf exercise --config workload.toml --json
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "gbuf",
    about = "Inspect and exercise the graphic buffer allocator",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the platform's 2D acceleration capabilities.
    Info {
        /// Emit machine-readable JSON instead of the report.
        #[arg(long)]
        json: bool,
    },

    /// Run a synthetic frame workload and report allocator statistics.
    Exercise {
        /// Path to a TOML workload description (overrides the flags below).
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,

        /// Number of frames to simulate.
        #[arg(short, long, default_value_t = 256)]
        frames: usize,

        /// Comma-separated buffer sizes per frame (e.g., "8M,4M,1M").
        #[arg(short, long, default_value = "8M,4M,1M")]
        sizes: String,

        /// Byte ceiling per cache lane (e.g., "64M").
        #[arg(long, default_value = "64M")]
        cache_bytes: String,

        /// Entry-count ceiling per cache lane.
        #[arg(long, default_value_t = 16)]
        cache_count: usize,

        /// Emit machine-readable JSON instead of the report.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Info { json } => commands::info::execute(json),
        Commands::Exercise {
            config,
            frames,
            sizes,
            cache_bytes,
            cache_count,
            json,
        } => commands::exercise::execute(config, frames, sizes, cache_bytes, cache_count, json),
    }
}
