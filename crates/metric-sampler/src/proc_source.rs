// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The production [`MetricSource`]: procfs and sysfs readers.
//!
//! Paths are resolved against configurable roots (`/proc` and `/sys` by
//! default) so the same code runs against a fixture tree in tests.

use crate::link::{find_wireless_interface, GatewayCheck, LinkState};
use crate::thermal::{read_celsius, THERMAL_ZONE};
use crate::{CpuTimes, MemoryInfo, Metric, MetricSource, SampleError};
use std::path::PathBuf;
use std::time::Duration;

/// Delay between the two `/proc/stat` reads taken on the very first CPU
/// sample, when there is no previous reading to diff against.
const DEFAULT_PRIME_DELAY: Duration = Duration::from_millis(100);

/// Reads metrics from the live kernel interfaces.
#[derive(Debug)]
pub struct ProcSampler {
    proc_root: PathBuf,
    sys_root: PathBuf,
    interface: Option<String>,
    gateway_check: Option<GatewayCheck>,
    prime_delay: Duration,
    prev_cpu: Option<CpuTimes>,
}

impl ProcSampler {
    /// Creates a sampler rooted at `/proc` and `/sys`.
    pub fn new() -> Self {
        Self::with_roots("/proc", "/sys")
    }

    /// Creates a sampler rooted at custom procfs and sysfs directories.
    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
            interface: None,
            gateway_check: None,
            prime_delay: DEFAULT_PRIME_DELAY,
            prev_cpu: None,
        }
    }

    /// Pins link-health sampling to a specific interface.
    ///
    /// Without this, the first `wl*` interface found at sample time is used.
    pub fn with_interface(mut self, iface: impl Into<String>) -> Self {
        self.interface = Some(iface.into());
        self
    }

    /// Also requires the default gateway to answer a ping before the link
    /// counts as up.
    pub fn with_gateway_check(mut self, check: GatewayCheck) -> Self {
        self.gateway_check = Some(check);
        self
    }

    /// Overrides the delay used to prime the first CPU reading.
    pub fn with_prime_delay(mut self, delay: Duration) -> Self {
        self.prime_delay = delay;
        self
    }

    /// Reads the full memory breakdown (not just the percentage).
    pub fn memory_info(&self) -> Result<MemoryInfo, SampleError> {
        MemoryInfo::read_from(&self.proc_root.join("meminfo"))
    }

    /// Reads the state of the monitored link.
    pub fn link_state(&self) -> Result<LinkState, SampleError> {
        let iface = match &self.interface {
            Some(iface) => iface.clone(),
            None => match find_wireless_interface(&self.sys_root) {
                Some(iface) => iface,
                None => return Ok(LinkState::Down("no wireless interface".to_string())),
            },
        };
        let state = LinkState::read(&self.sys_root, &iface)?;
        match (&state, &self.gateway_check) {
            (LinkState::Up, Some(check)) => check.check(&iface),
            _ => Ok(state),
        }
    }

    fn cpu_percent(&mut self) -> Result<f64, SampleError> {
        let stat = self.proc_root.join("stat");
        let prev = match self.prev_cpu {
            Some(prev) => prev,
            None => {
                let first = CpuTimes::read_from(&stat)?;
                std::thread::sleep(self.prime_delay);
                first
            }
        };
        let curr = CpuTimes::read_from(&stat)?;
        self.prev_cpu = Some(curr);
        Ok(curr.busy_percent_since(&prev))
    }
}

impl Default for ProcSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for ProcSampler {
    fn sample(&mut self, metric: Metric) -> Result<f64, SampleError> {
        let value = match metric {
            Metric::CpuPercent => self.cpu_percent()?,
            Metric::RamPercent => self.memory_info()?.used_percent(),
            Metric::LinkDown => self.link_state()?.as_metric(),
            Metric::CpuTempCelsius => read_celsius(&self.sys_root.join(THERMAL_ZONE))?,
        };
        tracing::trace!(%metric, value, "sampled");
        Ok(value)
    }
}
