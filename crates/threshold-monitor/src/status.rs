// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Throttled status lines.
//!
//! The watchdog polls every second but only reports at a slower cadence,
//! so the log does not grow by one line per tick.

use metric_sampler::Metric;
use std::time::{Duration, Instant};

/// Emits at most once per `interval`.
#[derive(Debug, Clone)]
pub struct StatusThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl StatusThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns `true` (and records `now`) if a status line is due.
    ///
    /// The first call is always due.
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = self
            .last
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last = Some(now);
        }
        due
    }
}

/// Renders a metric value with its unit, e.g. `85.0%`, `61.5°C`, `DOWN`.
pub fn format_value(metric: Metric, value: f64) -> String {
    if value.is_nan() {
        return "unknown".to_string();
    }
    match metric {
        Metric::CpuPercent | Metric::RamPercent => format!("{value:.1}%"),
        Metric::CpuTempCelsius => format!("{value:.1}°C"),
        Metric::LinkDown if value > 0.5 => "DOWN".to_string(),
        Metric::LinkDown => "OK".to_string(),
    }
}
