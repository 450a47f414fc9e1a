// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `rockwatch crash-check` and `rockwatch crash-scan`.
//!
//! The scan looks at dmesg for crash and OOM-kill lines and at
//! `systemctl --failed` for failed units.

use anyhow::{bail, Context};
use kernel_log::{
    read_boot_id, scan_crash_indicators, scan_failed_units, BootTracker, CrashIndicator,
    CrashReporter, IndicatorKind, SystemState, DEFAULT_MAX_REPORTS,
};
use std::path::PathBuf;
use std::process::Command;

#[derive(clap::Args, Debug)]
pub struct CrashCheckArgs {
    /// Directory holding `current_boot` and `last_crash`.
    #[arg(long, default_value = "/var/log/kernel")]
    state_dir: PathBuf,

    /// Directory crash reports are written to.
    #[arg(long, default_value = "/var/log/kernel/crashes")]
    crash_dir: PathBuf,

    /// Kernel log whose tail is captured into the report.
    #[arg(long, default_value = "/var/log/kernel/kernel.log")]
    kernel_log: PathBuf,

    /// procfs root.
    #[arg(long, default_value = "/proc")]
    proc_root: PathBuf,

    /// Reports kept in the crash directory.
    #[arg(long, default_value_t = DEFAULT_MAX_REPORTS)]
    max_reports: usize,
}

pub async fn check(args: CrashCheckArgs) -> anyhow::Result<()> {
    let boot_id = read_boot_id(&args.proc_root).context("reading current boot id")?;
    let tracker = BootTracker::new(&args.state_dir);

    let Some(previous) = tracker.check_previous(&boot_id)? else {
        println!("no unclean shutdown detected (boot {boot_id})");
        return Ok(());
    };

    tracing::warn!("detected unclean shutdown from previous session (boot {previous})");
    let state = SystemState::collect(&args.proc_root, Some(&args.kernel_log));
    let reporter =
        CrashReporter::new(&args.crash_dir, &args.state_dir).with_max_reports(args.max_reports);
    let path = reporter
        .generate(&previous, state)
        .context("writing crash report")?;
    println!("crash report written to {}", path.display());
    Ok(())
}

pub async fn scan(
    file: Option<PathBuf>,
    units_file: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let offline = file.is_some();
    let text = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => run_capture("dmesg", &[])?,
    };
    let mut indicators = scan_crash_indicators(&text);

    // Offline scans only look at units when given a saved listing.
    let units = match units_file {
        Some(path) => Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None if offline => None,
        None => run_capture("systemctl", &["--failed", "--no-legend", "--plain"])
            .map_err(|e| tracing::warn!("skipping failed-unit check: {e:#}"))
            .ok(),
    };
    if let Some(units) = units {
        indicators.extend(scan_failed_units(&units));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&indicators)?);
        return Ok(());
    }
    print_indicators(&indicators);
    Ok(())
}

fn print_indicators(indicators: &[CrashIndicator]) {
    if indicators.is_empty() {
        println!("no crash indicators found");
        return;
    }
    let count = |kind: IndicatorKind| indicators.iter().filter(|i| i.kind == kind).count();
    println!(
        "{} crash line(s), {} OOM kill(s), {} failed service(s)",
        count(IndicatorKind::KernelCrash),
        count(IndicatorKind::OomKill),
        count(IndicatorKind::ServiceFailure)
    );
    for indicator in indicators {
        let tag = match indicator.kind {
            IndicatorKind::KernelCrash => "crash",
            IndicatorKind::OomKill => "oom",
            IndicatorKind::ServiceFailure => "unit",
        };
        println!("  {tag:<6} {}", indicator.line);
    }
}

/// Runs `program args..` and returns its stdout.
fn run_capture(program: &str, args: &[&str]) -> anyhow::Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("running {program}"))?;
    if !output.status.success() {
        bail!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
