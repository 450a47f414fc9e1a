// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: config file → sampler → debounce loop → action.
//!
//! All loops run on a paused tokio clock, so a 60-second link excursion
//! completes instantly.

use metric_sampler::{Metric, ProcSampler, ScriptedSource};
use std::path::Path;
use std::time::Duration;
use threshold_monitor::{LoopReport, MonitorLoop, RecordingAction, WatchdogConfig};
use tokio::sync::watch;

// ── Helpers ────────────────────────────────────────────────────

fn write_config(dir: &Path, body: &str) -> WatchdogConfig {
    let path = dir.join("rockwatch.toml");
    std::fs::write(&path, body).unwrap();
    let config = WatchdogConfig::from_file(&path).unwrap();
    config.validate().unwrap();
    config
}

/// Lets the loops run for `secs` of virtual time, then stops them all.
async fn run_for(
    secs: f64,
    loops: Vec<tokio::task::JoinHandle<LoopReport>>,
    stop: watch::Sender<bool>,
) -> Vec<LoopReport> {
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    stop.send(true).unwrap();
    let mut reports = Vec::new();
    for handle in loops {
        reports.push(handle.await.unwrap());
    }
    reports
}

// ── Tests ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_ram_excursion_from_procfs_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        r#"
[cpu]
enabled = false

[ram]
threshold_percent = 80.0
sustained_seconds = 3.0
"#,
    );

    let proc_root = dir.path().join("proc");
    std::fs::create_dir_all(&proc_root).unwrap();
    std::fs::write(
        proc_root.join("meminfo"),
        "MemTotal: 1000 kB\nMemFree: 50 kB\nMemAvailable: 100 kB\n",
    )
    .unwrap();
    let sampler = ProcSampler::with_roots(&proc_root, dir.path().join("sys"));

    let recorder = RecordingAction::new();
    let l = MonitorLoop::new(
        Metric::RamPercent,
        config.ram.monitor.clone(),
        sampler,
        recorder.clone(),
    )
    .unwrap()
    .with_sample_timeout(config.sample_timeout().unwrap());

    let (stop_tx, stop_rx) = watch::channel(false);
    let reports = run_for(10.5, vec![tokio::spawn(l.run(stop_rx))], stop_tx).await;

    assert_eq!(reports[0].ticks, 11);
    assert_eq!(reports[0].unavailable, 0);
    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].metric_name, "ram_percent");
    assert!((events[0].value - 90.0).abs() < 1e-9);
    assert_eq!(events[0].threshold, 80.0);
}

#[tokio::test(start_paused = true)]
async fn test_loops_are_independent() {
    let config = WatchdogConfig::default();
    let (stop_tx, stop_rx) = watch::channel(false);

    let cpu_recorder = RecordingAction::new();
    let cpu = MonitorLoop::new(
        Metric::CpuPercent,
        config.cpu.monitor.clone(),
        ScriptedSource::new().with_values(Metric::CpuPercent, [95.0; 30]),
        cpu_recorder.clone(),
    )
    .unwrap();

    let ram_recorder = RecordingAction::new();
    let ram = MonitorLoop::new(
        Metric::RamPercent,
        config.ram.monitor.clone(),
        ScriptedSource::new().with_values(Metric::RamPercent, [40.0; 30]),
        ram_recorder.clone(),
    )
    .unwrap();

    let handles = vec![
        tokio::spawn(cpu.run(stop_rx.clone())),
        tokio::spawn(ram.run(stop_rx)),
    ];
    let reports = run_for(29.5, handles, stop_tx).await;

    assert_eq!(reports[0].metric, Metric::CpuPercent);
    assert_eq!(reports[0].fired.len(), 1);
    assert_eq!(reports[1].metric, Metric::RamPercent);
    assert!(reports[1].fired.is_empty());
    assert_eq!(cpu_recorder.events().len(), 1);
    assert!(ram_recorder.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_link_down_for_a_minute() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        r#"
[link]
enabled = true
interface = "wlan0"
"#,
    );

    // Down for 70 seconds, back up, then down again briefly.
    let mut source = ScriptedSource::new().with_values(Metric::LinkDown, [1.0; 70]);
    source.push_values(Metric::LinkDown, [0.0; 5]);
    source.push_values(Metric::LinkDown, [1.0; 10]);

    let recorder = RecordingAction::new();
    let l = MonitorLoop::new(
        Metric::LinkDown,
        config.link.monitor_config(),
        source,
        recorder.clone(),
    )
    .unwrap();

    let (stop_tx, stop_rx) = watch::channel(false);
    let reports = run_for(84.5, vec![tokio::spawn(l.run(stop_rx))], stop_tx).await;

    assert_eq!(reports[0].ticks, 85);
    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].metric_name, "link_down");
    assert!(events[0].duration_exceeded >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_fires_again_after_recovery() {
    // 20 s high, 2 s low, 20 s high: two separate excursions.
    let mut source = ScriptedSource::new().with_values(Metric::CpuPercent, [90.0; 20]);
    source.push_values(Metric::CpuPercent, [10.0; 2]);
    source.push_values(Metric::CpuPercent, [90.0; 20]);

    let recorder = RecordingAction::new();
    let l = MonitorLoop::new(
        Metric::CpuPercent,
        WatchdogConfig::default().cpu.monitor,
        source,
        recorder.clone(),
    )
    .unwrap();

    let (stop_tx, stop_rx) = watch::channel(false);
    let reports = run_for(41.5, vec![tokio::spawn(l.run(stop_rx))], stop_tx).await;

    assert_eq!(reports[0].fired.len(), 2);
    assert_eq!(recorder.events().len(), 2);
}
