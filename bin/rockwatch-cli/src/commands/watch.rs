// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `rockwatch watch`: one debounced monitor loop per enabled metric.
//!
//! CPU and RAM excursions reboot the board; a link excursion (interface
//! down, or gateway unreachable) rebinds USB network adapters and bounces
//! the interface. With `--dry-run` both are only logged. Loops run until
//! Ctrl-C, then print what they did.

use anyhow::{bail, Context};
use metric_sampler::{find_wireless_interface, Metric, ProcSampler};
use std::path::{Path, PathBuf};
use threshold_monitor::{
    CorrectiveAction, InterfaceResetAction, LogOnlyAction, LoopReport, MonitorConfig, MonitorLoop,
    RebootAction, UsbRebind, WatchdogConfig,
};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(clap::Args, Debug, Default)]
pub struct WatchArgs {
    /// CPU threshold in percent.
    #[arg(long)]
    cpu_threshold: Option<f64>,

    /// RAM threshold in percent.
    #[arg(long)]
    ram_threshold: Option<f64>,

    /// Seconds a CPU/RAM excursion must last before acting.
    #[arg(long)]
    sustained: Option<f64>,

    /// Seconds between samples (all metrics).
    #[arg(long)]
    poll_interval: Option<f64>,

    /// Do not monitor CPU.
    #[arg(long)]
    no_cpu: bool,

    /// Do not monitor RAM.
    #[arg(long)]
    no_ram: bool,

    /// Monitor link health and reset the interface when it stays down.
    #[arg(long)]
    link: bool,

    /// Interface for link monitoring (default: first wl* interface).
    #[arg(long)]
    interface: Option<String>,

    /// Judge link health by operstate only, without pinging the gateway.
    #[arg(long)]
    no_gateway_check: bool,

    /// Log corrective actions instead of executing them.
    #[arg(long)]
    dry_run: bool,
}

impl WatchArgs {
    /// Applies command-line overrides on top of the file configuration.
    fn apply(&self, config: &mut WatchdogConfig) {
        if let Some(t) = self.cpu_threshold {
            config.cpu.monitor.threshold_percent = t;
        }
        if let Some(t) = self.ram_threshold {
            config.ram.monitor.threshold_percent = t;
        }
        if let Some(s) = self.sustained {
            config.cpu.monitor.sustained_seconds = s;
            config.ram.monitor.sustained_seconds = s;
        }
        if let Some(p) = self.poll_interval {
            config.cpu.monitor.poll_interval_seconds = p;
            config.ram.monitor.poll_interval_seconds = p;
            config.link.poll_interval_seconds = p;
        }
        if self.no_cpu {
            config.cpu.enabled = false;
        }
        if self.no_ram {
            config.ram.enabled = false;
        }
        if self.link {
            config.link.enabled = true;
        }
        if self.interface.is_some() {
            config.link.interface = self.interface.clone();
        }
        if self.no_gateway_check {
            config.link.check_gateway = false;
        }
        if self.dry_run {
            config.dry_run = true;
        }
    }
}

/// Loads the file configuration (or defaults) and applies `args`.
fn resolve_config(path: Option<&Path>, args: &WatchArgs) -> anyhow::Result<WatchdogConfig> {
    let mut config = match path {
        Some(path) => WatchdogConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WatchdogConfig::default(),
    };
    args.apply(&mut config);
    config.validate().context("invalid watchdog configuration")?;
    Ok(config)
}

type BoxedAction = Box<dyn CorrectiveAction>;

fn reboot_action(config: &WatchdogConfig) -> anyhow::Result<BoxedAction> {
    if config.dry_run {
        return Ok(Box::new(LogOnlyAction::new("reboot")));
    }
    Ok(Box::new(RebootAction::new(config.reboot_grace()?)))
}

fn link_action(config: &WatchdogConfig, iface: &str) -> BoxedAction {
    if config.dry_run {
        return Box::new(LogOnlyAction::new(format!("reset {iface}")));
    }
    let action = InterfaceResetAction::new(vec![iface.to_string()]);
    if config.link.usb_rebind {
        Box::new(action.with_usb_rebind(UsbRebind::new("/sys")))
    } else {
        Box::new(action)
    }
}

fn spawn_loop(
    metric: Metric,
    monitor: MonitorConfig,
    sampler: ProcSampler,
    action: BoxedAction,
    config: &WatchdogConfig,
    sample_timeout: Duration,
    stop: watch::Receiver<bool>,
) -> anyhow::Result<JoinHandle<LoopReport>> {
    let monitor_loop = MonitorLoop::new(metric, monitor, sampler, action)
        .with_context(|| format!("cannot start {metric} monitor"))?
        .with_status_interval(config.status_interval()?)
        .with_sample_timeout(sample_timeout);
    Ok(tokio::spawn(monitor_loop.run(stop)))
}

pub async fn execute(config_path: Option<PathBuf>, args: WatchArgs) -> anyhow::Result<()> {
    let config = resolve_config(config_path.as_deref(), &args)?;
    if config.dry_run {
        tracing::warn!("dry run: corrective actions will only be logged");
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut handles = Vec::new();

    if config.cpu.enabled {
        handles.push(spawn_loop(
            Metric::CpuPercent,
            config.cpu.monitor.clone(),
            ProcSampler::new(),
            reboot_action(&config)?,
            &config,
            config.sample_timeout()?,
            stop_rx.clone(),
        )?);
    }
    if config.ram.enabled {
        handles.push(spawn_loop(
            Metric::RamPercent,
            config.ram.monitor.clone(),
            ProcSampler::new(),
            reboot_action(&config)?,
            &config,
            config.sample_timeout()?,
            stop_rx.clone(),
        )?);
    }
    if config.link.enabled {
        let iface = match config
            .link
            .interface
            .clone()
            .or_else(|| find_wireless_interface(Path::new("/sys")))
        {
            Some(iface) => iface,
            None => bail!("link monitoring enabled but no wireless interface found; set [link].interface"),
        };
        tracing::info!(
            check_gateway = config.link.check_gateway,
            "monitoring link health of {iface}"
        );
        let mut sampler = ProcSampler::new().with_interface(iface.clone());
        if let Some(check) = config.link.gateway_check()? {
            sampler = sampler.with_gateway_check(check);
        }
        handles.push(spawn_loop(
            Metric::LinkDown,
            config.link.monitor_config(),
            sampler,
            link_action(&config, &iface),
            &config,
            config.link.sample_timeout(config.sample_timeout()?)?,
            stop_rx.clone(),
        )?);
    }

    if handles.is_empty() {
        bail!("nothing to monitor: every metric is disabled");
    }
    println!("rockwatch: {} monitor(s) running, Ctrl-C to stop", handles.len());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for interrupt")?;
    tracing::info!("interrupt received, stopping monitors");
    // Fails only if every loop already exited.
    let _ = stop_tx.send(true);

    println!();
    for handle in handles {
        let report = handle.await.context("monitor task failed")?;
        println!(
            "  {:<16} {:>6} samples  {:>4} unknown  {:>2} action(s)",
            report.metric.name(),
            report.ticks,
            report.unavailable,
            report.fired.len()
        );
    }
    Ok(())
}
