// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `rockwatch status`: one-shot readout of every watched metric.
//!
//! Values that cannot be read on this machine (no thermal zone inside a
//! container, no wireless adapter) show as unknown; the command still
//! succeeds.

use super::usage_bar;
use anyhow::Context;
use metric_sampler::{LinkState, Metric, MetricSource, ProcSampler};
use std::path::PathBuf;
use threshold_monitor::{format_value, WatchdogConfig};

pub async fn execute(config_path: Option<PathBuf>, interface: Option<String>) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => WatchdogConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WatchdogConfig::default(),
    };

    let mut sampler = ProcSampler::new();
    if let Some(iface) = interface.or_else(|| config.link.interface.clone()) {
        sampler = sampler.with_interface(iface);
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              rockwatch · Board Status               ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    // ── CPU ────────────────────────────────────────────────────
    println!("  CPU");
    print_percent(&mut sampler, Metric::CpuPercent, config.cpu.monitor.threshold_percent);
    match sampler.sample(Metric::CpuTempCelsius) {
        Ok(t) => println!(
            "   Temperature:  {}  {}",
            format_value(Metric::CpuTempCelsius, t),
            usage_bar(t / 100.0)
        ),
        Err(e) => println!("   Temperature:  unknown ({e})"),
    }
    println!();

    // ── Memory ─────────────────────────────────────────────────
    println!("  Memory");
    match sampler.memory_info() {
        Ok(mem) => {
            println!("   Total:        {} MB", mem.total_mb());
            println!("   Available:    {} MB", mem.available_mb());
        }
        Err(e) => println!("   Memory:       unknown ({e})"),
    }
    print_percent(&mut sampler, Metric::RamPercent, config.ram.monitor.threshold_percent);
    println!();

    // ── Link ───────────────────────────────────────────────────
    println!("  Link");
    match sampler.link_state() {
        Ok(LinkState::Up) => println!("   State:        up"),
        Ok(LinkState::Down(why)) => println!("   State:        DOWN ({why})"),
        Err(e) => println!("   State:        unknown ({e})"),
    }
    println!(
        "   Watchdog:     {}",
        if config.link.enabled { "enabled" } else { "disabled" }
    );

    Ok(())
}

fn print_percent(sampler: &mut ProcSampler, metric: Metric, threshold: f64) {
    let label = format!("{}:", metric.label());
    match sampler.sample(metric) {
        Ok(pct) => {
            let marker = if pct > threshold { "  ABOVE THRESHOLD" } else { "" };
            println!(
                "   {label:<13} {} {}  (threshold {threshold:.0}%){marker}",
                format_value(metric, pct),
                usage_bar(pct / 100.0),
            );
        }
        Err(e) => println!("   {label:<13} unknown ({e})"),
    }
}
