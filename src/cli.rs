// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::defs;

#[derive(Debug, Parser)]
#[command(name = "magic-mount", version, about = "Bind-mount overlay composer for root-shadowing modules")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = defs::CONFIG_FILE)]
    pub config: PathBuf,

    /// Override the module storage directory.
    #[arg(short = 'd', long)]
    pub module_dir: Option<PathBuf>,

    /// Override the tmpfs source label shown in `mount`/`/proc/mounts`.
    #[arg(long)]
    pub mount_source: Option<String>,

    /// Extra top-level partitions a module may shadow, beyond the built-in set.
    #[arg(short = 'p', long = "extra-partition")]
    pub extra_partitions: Vec<String>,

    /// Verbose (debug-level) logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Build the merged mount tree and log it, but perform no mounts.
    #[arg(long)]
    pub dry_run: bool,

    /// Don't notify the kernel module that mounted paths should resist unmount.
    #[arg(long)]
    pub disable_umount: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a default config file to the configured path.
    GenConfig,
    /// Print the effective config (file merged with CLI overrides) as TOML.
    ShowConfig,
    /// List discovered modules and their state.
    Modules,
}
