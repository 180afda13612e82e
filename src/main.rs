// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

mod cli;
mod config;
mod defs;
mod inventory;
mod mount;
mod registry;
mod utils;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use mimalloc::MiMalloc;

use cli::{Cli, Command};
use config::Config;
use mount::context::MagicMount;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = Config::from_file(&cli.config).unwrap_or_else(|e| {
        log::debug!("using default config ({e:#})");
        Config::default()
    });
    cfg.merge_with_cli(
        cli.module_dir.clone(),
        cli.mount_source.clone(),
        cli.verbose,
        cli.extra_partitions.clone(),
        cli.disable_umount,
    );

    utils::log::init_logging(cfg.verbose)?;

    match cli.command {
        Some(Command::GenConfig) => gen_config(&cli.config),
        Some(Command::ShowConfig) => show_config(&cfg),
        Some(Command::Modules) => list_modules(&cfg),
        None => run_mount(&cfg, cli.dry_run),
    }
}

fn gen_config(path: &Path) -> Result<()> {
    Config::default().save_to_file(path)?;
    println!("wrote default config to {}", path.display());
    Ok(())
}

fn show_config(cfg: &Config) -> Result<()> {
    print!("{}", toml::to_string_pretty(cfg).context("serialize config")?);
    Ok(())
}

fn list_modules(cfg: &Config) -> Result<()> {
    let modules = inventory::scan(&cfg.module_dir)?;
    if modules.is_empty() {
        println!("no modules found in {}", cfg.module_dir.display());
        return Ok(());
    }
    for m in modules {
        let mut flags = Vec::new();
        if m.disabled {
            flags.push("disabled");
        }
        if m.removed {
            flags.push("removed");
        }
        if m.skip_mount {
            flags.push("skip_mount");
        }
        if m.failed_last_run {
            flags.push("failed-last-run");
        }
        let flag_str = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!("{}{flag_str}", m.name);
    }
    Ok(())
}

fn run_mount(cfg: &Config, dry_run: bool) -> Result<()> {
    let mut ctx = MagicMount::init();
    ctx.module_dir = cfg.module_dir.clone();
    ctx.mount_source = cfg.mount_source.clone();
    ctx.enable_unmountable = !cfg.disable_umount;
    ctx.extra_partitions = cfg.extra_partitions.clone();

    if dry_run {
        match mount::tree::build_mount_tree(&ctx.module_dir, &ctx.extra_partitions)? {
            Some(root) => log::info!("dry run, mount tree:\n{root:?}"),
            None => log::info!("dry run, no modules contributed anything"),
        }
        return Ok(());
    }

    utils::fs::mkdir_p(Path::new(defs::RUN_DIR))?;
    let result = mount::driver::magic_mount(&ctx, Path::new(defs::RUN_DIR));
    ctx.cleanup();

    log::info!(
        "magic_mount done: {} mounted, {} whiteouts, {} failed",
        ctx.stats.nodes_mounted.get(),
        ctx.stats.nodes_whiteout.get(),
        ctx.stats.nodes_fail.get(),
    );

    result
}
