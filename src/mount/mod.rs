// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod apply;
pub mod context;
pub mod driver;
pub mod kernel_notify;
pub mod mirror;
pub mod node;
pub mod oracle;
pub mod tree;
