// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::Result;

pub fn init_logging(verbose: bool) -> Result<()> {
    #[cfg(target_os = "android")]
    {
        let level = if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(level)
                .with_tag("magic_mount"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        use std::io::Write;

        let level = if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };

        let mut builder = env_logger::Builder::new();
        builder.format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        });
        builder.filter_level(level).init();
    }

    Ok(())
}
