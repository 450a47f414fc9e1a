// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Metric identifiers and timestamped samples.

use crate::SampleError;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// The closed set of metrics the sampler knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Aggregate CPU busy time, in percent.
    CpuPercent,
    /// Memory in use (`MemTotal - MemAvailable`), in percent.
    RamPercent,
    /// Link health as a boolean: `1.0` when the link is down, `0.0` when up.
    LinkDown,
    /// SoC temperature in degrees Celsius.
    CpuTempCelsius,
}

impl Metric {
    /// All metrics, in display order.
    pub const ALL: [Metric; 4] = [
        Metric::CpuPercent,
        Metric::RamPercent,
        Metric::LinkDown,
        Metric::CpuTempCelsius,
    ];

    /// Stable snake_case name used in logs and configuration.
    pub fn name(self) -> &'static str {
        match self {
            Metric::CpuPercent => "cpu_percent",
            Metric::RamPercent => "ram_percent",
            Metric::LinkDown => "link_down",
            Metric::CpuTempCelsius => "cpu_temp_celsius",
        }
    }

    /// Short label for status lines.
    pub fn label(self) -> &'static str {
        match self {
            Metric::CpuPercent => "CPU",
            Metric::RamPercent => "RAM",
            Metric::LinkDown => "Link",
            Metric::CpuTempCelsius => "Temp",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Metric {
    type Err = SampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| SampleError::UnknownMetric {
                name: s.to_string(),
            })
    }
}

/// One reading of one metric.
///
/// Produced once per tick and consumed by the monitor; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Name of the sampled metric (see [`Metric::name`]).
    pub metric_name: String,
    /// The sampled value.
    pub value: f64,
    /// When the value was read.
    pub timestamp: Instant,
}

impl Sample {
    /// Creates a sample stamped with the current instant.
    pub fn new(metric: Metric, value: f64) -> Self {
        Self::at(metric, value, Instant::now())
    }

    /// Creates a sample stamped with an explicit instant.
    pub fn at(metric: Metric, value: f64, timestamp: Instant) -> Self {
        Self {
            metric_name: metric.name().to_string(),
            value,
            timestamp,
        }
    }
}
