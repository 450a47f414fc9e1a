// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `rockwatch power`: sample PMIC voltage and current on an interval and
//! keep a capped JSON history.

use anyhow::Context;
use metric_sampler::{PowerHistory, PowerReader, PowerReading, DEFAULT_POWER_SUPPLY};
use std::path::PathBuf;
use std::time::Duration;

#[derive(clap::Args, Debug)]
pub struct PowerArgs {
    /// Power supply under /sys/class/power_supply.
    #[arg(long, default_value = DEFAULT_POWER_SUPPLY)]
    supply: String,

    /// sysfs root.
    #[arg(long, default_value = "/sys")]
    sys_root: PathBuf,

    /// JSON history file (most recent 1000 readings).
    #[arg(long, default_value = "/var/log/kernel/power_metrics.json")]
    history: PathBuf,

    /// Do not write the history file.
    #[arg(long)]
    no_history: bool,

    /// Seconds between readings.
    #[arg(long, default_value_t = 1.0)]
    interval: f64,

    /// Stop after this many readings (default: until Ctrl-C).
    #[arg(long)]
    count: Option<u64>,
}

pub async fn execute(args: PowerArgs) -> anyhow::Result<()> {
    let interval = Duration::try_from_secs_f64(args.interval)
        .ok()
        .filter(|d| !d.is_zero())
        .context("--interval must be a positive number of seconds")?;
    let reader = PowerReader::new(&args.sys_root, &args.supply);
    let history = (!args.no_history).then(|| PowerHistory::new(&args.history));

    tracing::info!("starting power monitoring on {}", reader.supply_dir().display());
    let mut ticker = tokio::time::interval(interval);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut taken = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let reader = reader.clone();
                let history = history.clone();
                let reading = tokio::task::spawn_blocking(move || sample_once(&reader, history.as_ref()))
                    .await
                    .context("power sampling task failed")?;
                log_reading(&reading);
                taken += 1;
                if args.count.is_some_and(|count| taken >= count) {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                tracing::info!("power monitoring stopped");
                break;
            }
        }
    }
    Ok(())
}

fn sample_once(reader: &PowerReader, history: Option<&PowerHistory>) -> PowerReading {
    let reading = reader.read();
    if let Some(history) = history {
        if let Err(e) = history.append(reading.clone()) {
            tracing::error!("error saving power metrics: {e}");
        }
    }
    reading
}

fn log_reading(reading: &PowerReading) {
    match (reading.voltage, reading.current, reading.power) {
        (Some(v), Some(ma), Some(w)) => tracing::info!(
            "power metrics - voltage: {v:.2}V, current: {ma:.2}mA, power: {w:.2}W"
        ),
        _ => tracing::warn!("failed to read some power metrics"),
    }
}
