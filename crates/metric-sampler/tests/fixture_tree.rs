// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: a full fake `/proc` + `/sys` tree read through the
//! [`MetricSource`] trait object, the way the watchdog loops use it.

use metric_sampler::{Metric, MetricSource, ProcSampler, SampleError, ScriptedSource};
use std::path::Path;
use std::time::Duration;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[test]
fn test_every_metric_from_fixture_tree() {
    let dir = tempfile::tempdir().unwrap();
    let proc_root = dir.path().join("proc");
    let sys_root = dir.path().join("sys");

    write(&proc_root, "stat", "cpu  100 0 100 800 0 0 0 0\ncpu0 50 0 50 400 0 0 0 0\n");
    write(
        &proc_root,
        "meminfo",
        "MemTotal:  8000000 kB\nMemFree:  1000000 kB\nMemAvailable:  2000000 kB\n",
    );
    write(&sys_root, "class/thermal/thermal_zone0/temp", "72250\n");
    write(&sys_root, "class/net/eth0/operstate", "up\n");
    write(&sys_root, "class/net/wlan0/operstate", "dormant\n");

    let mut source: Box<dyn MetricSource> = Box::new(
        ProcSampler::with_roots(&proc_root, &sys_root).with_prime_delay(Duration::ZERO),
    );

    assert_eq!(source.sample(Metric::CpuPercent).unwrap(), 0.0);
    write(&proc_root, "stat", "cpu  400 0 100 900 0 0 0 0\n");
    let cpu = source.sample(Metric::CpuPercent).unwrap();
    assert!((cpu - 75.0).abs() < 1e-9, "cpu = {cpu}");

    let ram = source.sample(Metric::RamPercent).unwrap();
    assert!((ram - 75.0).abs() < 1e-9, "ram = {ram}");

    let temp = source.sample(Metric::CpuTempCelsius).unwrap();
    assert!((temp - 72.25).abs() < 1e-9);

    // The first wl* interface is picked; dormant counts as down.
    assert_eq!(source.sample(Metric::LinkDown).unwrap(), 1.0);
    write(&sys_root, "class/net/wlan0/operstate", "up\n");
    assert_eq!(source.sample(Metric::LinkDown).unwrap(), 0.0);
}

#[test]
fn test_unreadable_tree_is_unavailable_not_zero() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = ProcSampler::with_roots(dir.path(), dir.path());
    for metric in [Metric::CpuPercent, Metric::RamPercent, Metric::CpuTempCelsius] {
        assert!(matches!(
            source.sample(metric),
            Err(SampleError::SourceUnavailable { .. })
        ));
    }
}

#[test]
fn test_scripted_source_through_trait_object() {
    let mut scripted = ScriptedSource::new().with_values(Metric::RamPercent, [91.0, 92.0]);
    scripted.push_unavailable(Metric::RamPercent);
    let mut source: Box<dyn MetricSource> = Box::new(scripted);

    assert_eq!(source.sample(Metric::RamPercent).unwrap(), 91.0);
    assert_eq!(source.sample(Metric::RamPercent).unwrap(), 92.0);
    assert!(source.sample(Metric::RamPercent).is_err());
    assert!(source.sample(Metric::CpuPercent).is_err());
}
