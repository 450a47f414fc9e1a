// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPU utilisation from `/proc/stat`.
//!
//! The aggregate `cpu` line holds cumulative jiffy counters since boot:
//!
//! ```text
//! cpu  user nice system idle iowait irq softirq steal guest guest_nice
//! ```
//!
//! Utilisation is only meaningful as a delta between two readings, so
//! callers keep the previous [`CpuTimes`] and pass both to
//! [`CpuTimes::busy_percent_since`].

use crate::SampleError;
use std::path::Path;

/// Cumulative CPU time counters from the aggregate `cpu` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    /// Reads the aggregate counters from a `/proc/stat`-formatted file.
    pub fn read_from(path: &Path) -> Result<Self, SampleError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SampleError::unavailable(path.display().to_string(), e))?;
        Self::parse(&content, path)
    }

    /// Parses the aggregate `cpu` line of `/proc/stat` content.
    ///
    /// Kernels older than 2.6.11 omit `steal`; missing trailing fields
    /// are read as zero, but the first four are required.
    pub fn parse(content: &str, source_path: &Path) -> Result<Self, SampleError> {
        let parse_err = |detail: String| SampleError::Parse {
            path: source_path.display().to_string(),
            detail,
        };

        let line = content
            .lines()
            .find(|l| l.split_whitespace().next() == Some("cpu"))
            .ok_or_else(|| parse_err("aggregate 'cpu' line not found".to_string()))?;

        let fields = line
            .split_whitespace()
            .skip(1)
            .map(|f| {
                f.parse::<u64>()
                    .map_err(|_| parse_err(format!("expected integer jiffies, got '{f}'")))
            })
            .collect::<Result<Vec<u64>, _>>()?;

        if fields.len() < 4 {
            return Err(parse_err(format!(
                "expected at least 4 counters, got {}",
                fields.len()
            )));
        }
        let field = |i: usize| fields.get(i).copied().unwrap_or(0);

        Ok(Self {
            user: field(0),
            nice: field(1),
            system: field(2),
            idle: field(3),
            iowait: field(4),
            irq: field(5),
            softirq: field(6),
            steal: field(7),
        })
    }

    /// Time spent idle or waiting on I/O.
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }

    /// Time spent doing work.
    pub fn busy_total(&self) -> u64 {
        self.user + self.nice + self.system + self.irq + self.softirq + self.steal
    }

    /// Sum of all counters.
    pub fn total(&self) -> u64 {
        self.idle_total() + self.busy_total()
    }

    /// Busy percentage over the interval `prev → self`, in `[0.0, 100.0]`.
    ///
    /// Returns `0.0` when no time elapsed between the two readings. Counter
    /// wrap or a reset (e.g. a CPU going offline) saturates to zero deltas.
    pub fn busy_percent_since(&self, prev: &CpuTimes) -> f64 {
        let total_delta = self.total().saturating_sub(prev.total());
        if total_delta == 0 {
            return 0.0;
        }
        let idle_delta = self.idle_total().saturating_sub(prev.idle_total());
        let busy_delta = total_delta.saturating_sub(idle_delta);
        (busy_delta as f64 / total_delta as f64 * 100.0).clamp(0.0, 100.0)
    }
}
