// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Unclean-shutdown detection and crash reports.
//!
//! The kernel assigns a fresh random boot id on every boot. If the id
//! stored by the previous session differs from the current one and the
//! previous session never cleared it, that session ended without a clean
//! shutdown being recorded, and a [`CrashReport`] is written.

use crate::KernelLogError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Relative to the procfs root.
const BOOT_ID: &str = "sys/kernel/random/boot_id";
const OSRELEASE: &str = "sys/kernel/osrelease";
const CURRENT_BOOT_FILE: &str = "current_boot";
const LAST_CRASH_FILE: &str = "last_crash";
const REPORT_PREFIX: &str = "crash_report_";

/// Lines of kernel log captured into a report.
pub const KERNEL_LOG_TAIL: usize = 1000;

/// Default number of reports kept in the crash directory.
pub const DEFAULT_MAX_REPORTS: usize = 50;

/// Reads the current boot id from `<proc_root>/sys/kernel/random/boot_id`.
pub fn read_boot_id(proc_root: &Path) -> Result<String, KernelLogError> {
    let path = proc_root.join(BOOT_ID);
    std::fs::read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| KernelLogError::io(path, e))
}

/// Remembers the boot id between runs.
#[derive(Debug, Clone)]
pub struct BootTracker {
    state_dir: PathBuf,
}

impl BootTracker {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn current_boot_path(&self) -> PathBuf {
        self.state_dir.join(CURRENT_BOOT_FILE)
    }

    /// Compares `current_boot_id` with the stored one, then stores it.
    ///
    /// Returns the previous boot id when it differs from the current one.
    /// The first run (nothing stored) returns `None`.
    pub fn check_previous(&self, current_boot_id: &str) -> Result<Option<String>, KernelLogError> {
        let path = self.current_boot_path();
        let previous = match std::fs::read_to_string(&path) {
            Ok(s) => Some(s.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(KernelLogError::io(path, e)),
        };

        std::fs::create_dir_all(&self.state_dir)
            .map_err(|e| KernelLogError::io(&self.state_dir, e))?;
        std::fs::write(&path, current_boot_id).map_err(|e| KernelLogError::io(&path, e))?;

        Ok(previous.filter(|prev| !prev.is_empty() && prev != current_boot_id))
    }
}

/// Snapshot of the system at report time.
///
/// Every field is best effort: a read failure leaves it empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    pub timestamp: String,
    pub boot_id: Option<String>,
    pub kernel_version: Option<String>,
    pub uptime_seconds: Option<f64>,
    pub memory_info: Option<BTreeMap<String, String>>,
    pub last_kernel_logs: Vec<String>,
    /// `mali`, `panfrost` or `unknown`.
    pub gpu_driver: Option<String>,
}

impl SystemState {
    /// Gathers state from `proc_root` and the tail of `kernel_log`.
    pub fn collect(proc_root: &Path, kernel_log: Option<&Path>) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            boot_id: best_effort("boot id", read_boot_id(proc_root)),
            kernel_version: best_effort(
                "kernel release",
                read_trimmed(&proc_root.join(OSRELEASE)),
            ),
            uptime_seconds: best_effort("uptime", read_uptime(proc_root)),
            memory_info: best_effort("memory info", read_meminfo(proc_root)),
            last_kernel_logs: kernel_log
                .and_then(|p| best_effort("kernel log", tail_lines(p, KERNEL_LOG_TAIL)))
                .unwrap_or_default(),
            gpu_driver: best_effort("GPU driver", read_gpu_driver(proc_root)),
        }
    }
}

fn best_effort<T>(what: &str, result: Result<T, KernelLogError>) -> Option<T> {
    result
        .map_err(|e| tracing::warn!("failed to read {what}: {e}"))
        .ok()
}

fn read_trimmed(path: &Path) -> Result<String, KernelLogError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| KernelLogError::io(path, e))
}

fn read_uptime(proc_root: &Path) -> Result<f64, KernelLogError> {
    let raw = read_trimmed(&proc_root.join("uptime"))?;
    raw.split_whitespace()
        .next()
        .and_then(|first| first.parse().ok())
        .ok_or_else(|| KernelLogError::malformed(format!("unexpected uptime '{raw}'")))
}

fn read_meminfo(proc_root: &Path) -> Result<BTreeMap<String, String>, KernelLogError> {
    let raw = read_trimmed(&proc_root.join("meminfo"))?;
    Ok(raw
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect())
}

fn read_gpu_driver(proc_root: &Path) -> Result<String, KernelLogError> {
    let modules = read_trimmed(&proc_root.join("modules"))?;
    let driver = if modules.contains("mali") {
        "mali"
    } else if modules.contains("panfrost") {
        "panfrost"
    } else {
        "unknown"
    };
    Ok(driver.to_string())
}

fn tail_lines(path: &Path, n: usize) -> Result<Vec<String>, KernelLogError> {
    let content = std::fs::read_to_string(path).map_err(|e| KernelLogError::io(path, e))?;
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].iter().map(|l| l.to_string()).collect())
}

/// Persisted crash report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashReport {
    pub crash_boot_id: String,
    pub current_boot_id: Option<String>,
    pub crash_time: String,
    pub system_state: SystemState,
}

/// Writes crash reports and keeps the crash directory bounded.
#[derive(Debug, Clone)]
pub struct CrashReporter {
    crash_dir: PathBuf,
    state_dir: PathBuf,
    max_reports: usize,
}

impl CrashReporter {
    pub fn new(crash_dir: impl Into<PathBuf>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            crash_dir: crash_dir.into(),
            state_dir: state_dir.into(),
            max_reports: DEFAULT_MAX_REPORTS,
        }
    }

    pub fn with_max_reports(mut self, max_reports: usize) -> Self {
        self.max_reports = max_reports;
        self
    }

    pub fn last_crash_path(&self) -> PathBuf {
        self.state_dir.join(LAST_CRASH_FILE)
    }

    /// Writes a report for `crash_boot_id`, copies it to `last_crash` and
    /// prunes old reports. Returns the report path.
    pub fn generate(
        &self,
        crash_boot_id: &str,
        state: SystemState,
    ) -> Result<PathBuf, KernelLogError> {
        std::fs::create_dir_all(&self.crash_dir)
            .map_err(|e| KernelLogError::io(&self.crash_dir, e))?;
        std::fs::create_dir_all(&self.state_dir)
            .map_err(|e| KernelLogError::io(&self.state_dir, e))?;

        let now = chrono::Local::now();
        let report = CrashReport {
            crash_boot_id: crash_boot_id.to_string(),
            current_boot_id: state.boot_id.clone(),
            crash_time: now.to_rfc3339(),
            system_state: state,
        };
        let json = serde_json::to_string_pretty(&report)?;

        let path = self.unused_report_path(&now.format("%Y%m%d_%H%M%S").to_string());
        std::fs::write(&path, &json).map_err(|e| KernelLogError::io(&path, e))?;
        let last = self.last_crash_path();
        std::fs::copy(&path, &last).map_err(|e| KernelLogError::io(&last, e))?;
        tracing::info!("generated crash report: {}", path.display());

        let removed = self.prune()?;
        if removed > 0 {
            tracing::info!("cleaned up {removed} old crash reports");
        }
        Ok(path)
    }

    /// Report files, oldest first. Same-second reports are ordered by
    /// their numeric suffix, so `_10` comes after `_2`.
    pub fn reports(&self) -> Result<Vec<PathBuf>, KernelLogError> {
        let entries = match std::fs::read_dir(&self.crash_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(KernelLogError::io(&self.crash_dir, e)),
        };
        let mut reports: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(REPORT_PREFIX) && n.ends_with(".json"))
            })
            .collect();
        reports.sort_by_cached_key(|path| report_order_key(path));
        Ok(reports)
    }

    /// Deletes the oldest reports beyond `max_reports`. Returns how many.
    pub fn prune(&self) -> Result<usize, KernelLogError> {
        let reports = self.reports()?;
        let excess = reports.len().saturating_sub(self.max_reports);
        for path in &reports[..excess] {
            std::fs::remove_file(path).map_err(|e| KernelLogError::io(path, e))?;
        }
        Ok(excess)
    }

    /// Reports generated within the same second get a numeric suffix.
    fn unused_report_path(&self, stamp: &str) -> PathBuf {
        let base = self.crash_dir.join(format!("{REPORT_PREFIX}{stamp}.json"));
        if !base.exists() {
            return base;
        }
        (1..)
            .map(|n| self.crash_dir.join(format!("{REPORT_PREFIX}{stamp}_{n}.json")))
            .find(|p| !p.exists())
            .unwrap_or(base)
    }
}

/// `crash_report_<date>_<time>[_<n>].json` → `(<date>_<time>, n)`.
fn report_order_key(path: &Path) -> (String, u64) {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let rest = name
        .strip_prefix(REPORT_PREFIX)
        .and_then(|r| r.strip_suffix(".json"))
        .unwrap_or(name);
    let mut parts = rest.splitn(3, '_');
    let date = parts.next().unwrap_or_default();
    let time = parts.next().unwrap_or_default();
    let n = parts.next().and_then(|n| n.parse().ok()).unwrap_or(0);
    (format!("{date}_{time}"), n)
}

/// What a crash indicator line points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    KernelCrash,
    OomKill,
    ServiceFailure,
}

/// A dmesg line that suggests a crash or an OOM kill, or a failed
/// systemd unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrashIndicator {
    pub kind: IndicatorKind,
    pub line: String,
}

/// Scans dmesg-style text for `crash` and `killed` lines (case-insensitive).
///
/// A line mentioning both is reported once, as a crash.
pub fn scan_crash_indicators(text: &str) -> Vec<CrashIndicator> {
    text.lines()
        .filter_map(|line| {
            let lower = line.to_lowercase();
            let kind = if lower.contains("crash") {
                IndicatorKind::KernelCrash
            } else if lower.contains("killed") {
                IndicatorKind::OomKill
            } else {
                return None;
            };
            Some(CrashIndicator {
                kind,
                line: line.trim().to_string(),
            })
        })
        .collect()
}

/// Reports every unit listed as failed in `systemctl --failed` output.
///
/// Works with and without `--plain`/`--no-legend`: header, legend and the
/// trailing "N loaded units listed." lines carry no `failed` state column.
pub fn scan_failed_units(systemctl_output: &str) -> Vec<CrashIndicator> {
    systemctl_output
        .lines()
        .filter_map(|line| {
            let mut words = line
                .split_whitespace()
                .skip_while(|w| !w.chars().any(char::is_alphanumeric));
            let unit = words.next()?;
            let failed = words.take(3).any(|w| w == "failed");
            failed.then(|| CrashIndicator {
                kind: IndicatorKind::ServiceFailure,
                line: unit.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_proc(dir: &Path) -> PathBuf {
        let proc_root = dir.join("proc");
        std::fs::create_dir_all(proc_root.join("sys/kernel/random")).unwrap();
        std::fs::write(proc_root.join(BOOT_ID), "b1b2-boot\n").unwrap();
        std::fs::write(proc_root.join(OSRELEASE), "6.1.43-rk3588\n").unwrap();
        std::fs::write(proc_root.join("uptime"), "1234.56 4000.00\n").unwrap();
        std::fs::write(
            proc_root.join("meminfo"),
            "MemTotal:       16318480 kB\nMemAvailable:   12000000 kB\n",
        )
        .unwrap();
        std::fs::write(proc_root.join("modules"), "panfrost 90112 0 - Live\n").unwrap();
        proc_root
    }

    #[test]
    fn test_boot_tracker() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = BootTracker::new(dir.path().join("state"));

        assert_eq!(tracker.check_previous("boot-a").unwrap(), None);
        assert_eq!(tracker.check_previous("boot-a").unwrap(), None);
        assert_eq!(
            tracker.check_previous("boot-b").unwrap().as_deref(),
            Some("boot-a")
        );
        assert_eq!(
            std::fs::read_to_string(tracker.current_boot_path()).unwrap(),
            "boot-b"
        );
    }

    #[test]
    fn test_collect_system_state() {
        let dir = tempfile::tempdir().unwrap();
        let proc_root = fake_proc(dir.path());
        let log = dir.path().join("kernel.log");
        let lines: Vec<String> = (0..1500).map(|i| format!("line {i}")).collect();
        std::fs::write(&log, lines.join("\n")).unwrap();

        let state = SystemState::collect(&proc_root, Some(&log));
        assert_eq!(state.boot_id.as_deref(), Some("b1b2-boot"));
        assert_eq!(state.kernel_version.as_deref(), Some("6.1.43-rk3588"));
        assert_eq!(state.uptime_seconds, Some(1234.56));
        let mem = state.memory_info.unwrap();
        assert_eq!(mem["MemTotal"], "16318480 kB");
        assert_eq!(state.gpu_driver.as_deref(), Some("panfrost"));
        assert_eq!(state.last_kernel_logs.len(), KERNEL_LOG_TAIL);
        assert_eq!(state.last_kernel_logs[0], "line 500");
    }

    #[test]
    fn test_collect_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let state = SystemState::collect(dir.path(), Some(&dir.path().join("missing.log")));
        assert!(state.boot_id.is_none());
        assert!(state.uptime_seconds.is_none());
        assert!(state.memory_info.is_none());
        assert!(state.gpu_driver.is_none());
        assert!(state.last_kernel_logs.is_empty());
    }

    #[test]
    fn test_generate_and_prune() {
        let dir = tempfile::tempdir().unwrap();
        let proc_root = fake_proc(dir.path());
        let reporter = CrashReporter::new(dir.path().join("crashes"), dir.path().join("state"))
            .with_max_reports(2);

        let mut paths = Vec::new();
        for id in ["old-1", "old-2", "old-3"] {
            paths.push(
                reporter
                    .generate(id, SystemState::collect(&proc_root, None))
                    .unwrap(),
            );
        }

        let remaining = reporter.reports().unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(!remaining.contains(&paths[0]));
        assert!(remaining.contains(&paths[2]));

        let last: CrashReport =
            serde_json::from_str(&std::fs::read_to_string(reporter.last_crash_path()).unwrap())
                .unwrap();
        assert_eq!(last.crash_boot_id, "old-3");
        assert_eq!(last.current_boot_id.as_deref(), Some("b1b2-boot"));
    }

    #[test]
    fn test_prune_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let crash_dir = dir.path().join("crashes");
        std::fs::create_dir_all(&crash_dir).unwrap();
        for name in [
            "crash_report_20240101_000000.json",
            "crash_report_20240102_000000.json",
            "crash_report_20240103_000000.json",
            "notes.txt",
        ] {
            std::fs::write(crash_dir.join(name), "{}").unwrap();
        }
        let reporter = CrashReporter::new(&crash_dir, dir.path()).with_max_reports(1);
        assert_eq!(reporter.prune().unwrap(), 2);
        assert_eq!(
            reporter.reports().unwrap(),
            vec![crash_dir.join("crash_report_20240103_000000.json")]
        );
        assert!(crash_dir.join("notes.txt").exists());
    }

    #[test]
    fn test_same_second_reports_sort_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let crash_dir = dir.path().join("crashes");
        std::fs::create_dir_all(&crash_dir).unwrap();
        let stamp = "20240105_120000";
        let mut names = vec![format!("{REPORT_PREFIX}{stamp}.json")];
        names.extend((1..=11).map(|n| format!("{REPORT_PREFIX}{stamp}_{n}.json")));
        names.push(format!("{REPORT_PREFIX}20240105_115959_3.json"));
        for name in &names {
            std::fs::write(crash_dir.join(name), "{}").unwrap();
        }

        let reporter = CrashReporter::new(&crash_dir, dir.path()).with_max_reports(3);
        let reports = reporter.reports().unwrap();
        assert_eq!(reports[0], crash_dir.join(format!("{REPORT_PREFIX}20240105_115959_3.json")));
        assert_eq!(reports[1], crash_dir.join(&names[0]));
        assert_eq!(reports[3], crash_dir.join(format!("{REPORT_PREFIX}{stamp}_2.json")));
        assert_eq!(reports[12], crash_dir.join(format!("{REPORT_PREFIX}{stamp}_11.json")));

        assert_eq!(reporter.prune().unwrap(), 10);
        let kept: Vec<_> = reporter
            .reports()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            kept,
            [9, 10, 11].map(|n| format!("{REPORT_PREFIX}{stamp}_{n}.json"))
        );
    }

    #[test]
    fn test_scan_failed_units() {
        let output = "\
  UNIT                  LOAD   ACTIVE SUB    DESCRIPTION
● rknpu-init.service    loaded failed failed Rockchip NPU setup
● wpa_supplicant.service loaded failed failed WPA supplicant

LOAD   = Reflects whether the unit definition was properly loaded.
ACTIVE = The high-level unit activation state, i.e. generalization of SUB.

2 loaded units listed.
";
        let found = scan_failed_units(output);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|i| i.kind == IndicatorKind::ServiceFailure));
        assert_eq!(found[0].line, "rknpu-init.service");
        assert_eq!(found[1].line, "wpa_supplicant.service");

        let plain = "ssh.service loaded failed failed OpenBSD Secure Shell server\n";
        assert_eq!(scan_failed_units(plain)[0].line, "ssh.service");
        assert!(scan_failed_units("0 loaded units listed.\n").is_empty());
    }

    #[test]
    fn test_scan_crash_indicators() {
        let dmesg = "\
[  10.1] usb 1-1: new device
[  20.2] Out of memory: Killed process 1234 (stress) total-vm:1024kB
[  30.3] app[99]: CRASH detected in worker
[  40.4] all good
";
        let found = scan_crash_indicators(dmesg);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, IndicatorKind::OomKill);
        assert!(found[0].line.contains("Killed process 1234"));
        assert_eq!(found[1].kind, IndicatorKind::KernelCrash);
        assert!(scan_crash_indicators("").is_empty());
    }
}
