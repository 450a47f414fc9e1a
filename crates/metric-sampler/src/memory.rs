// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! System memory usage via `/proc/meminfo`.
//!
//! RAM pressure is measured against `MemAvailable`, which already counts
//! reclaimable cache, so a full page cache does not look like an
//! overload.

use crate::SampleError;
use std::path::Path;

/// System memory state.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MemoryInfo {
    /// Total physical memory in bytes.
    pub total_bytes: u64,
    /// Memory the kernel reports as available for new allocations, in bytes.
    pub available_bytes: u64,
}

impl MemoryInfo {
    /// Reads memory information from a `/proc/meminfo`-formatted file.
    pub fn read_from(path: &Path) -> Result<Self, SampleError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SampleError::unavailable(path.display().to_string(), e))?;
        Self::parse(&content, path)
    }

    /// Parses `/proc/meminfo` content.
    pub fn parse(content: &str, source_path: &Path) -> Result<Self, SampleError> {
        let mut total_kb = None;
        let mut available_kb = None;

        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let slot = match key {
                "MemTotal:" => &mut total_kb,
                "MemAvailable:" => &mut available_kb,
                _ => continue,
            };
            *slot = Some(value.parse::<u64>().map_err(|_| SampleError::Parse {
                path: source_path.display().to_string(),
                detail: format!("expected integer kB value for {key}, got '{value}'"),
            })?);

            if total_kb.is_some() && available_kb.is_some() {
                break;
            }
        }

        let missing = |field: &str| SampleError::Parse {
            path: source_path.display().to_string(),
            detail: format!("{field} not found"),
        };
        let total_kb = total_kb.ok_or_else(|| missing("MemTotal"))?;
        let available_kb = available_kb.ok_or_else(|| missing("MemAvailable"))?;

        Ok(Self {
            total_bytes: total_kb * 1024,
            available_bytes: available_kb * 1024,
        })
    }

    /// Memory in use, in bytes.
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    /// Memory in use as a percentage of total, in `[0.0, 100.0]`.
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes() as f64 / self.total_bytes as f64 * 100.0
    }

    /// Total memory in megabytes.
    pub fn total_mb(&self) -> u64 {
        self.total_bytes / (1024 * 1024)
    }

    /// Available memory in megabytes.
    pub fn available_mb(&self) -> u64 {
        self.available_bytes / (1024 * 1024)
    }
}
