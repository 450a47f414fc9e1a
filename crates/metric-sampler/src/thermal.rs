// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! SoC thermal readings via `/sys/class/thermal/`.
//!
//! Thermal zone 0 reports the SoC temperature in millidegrees Celsius on
//! both the RK3588 and BCM2711 boards.

use crate::SampleError;
use std::path::Path;

/// Thermal zone file, relative to the sysfs root.
pub(crate) const THERMAL_ZONE: &str = "class/thermal/thermal_zone0/temp";

/// Reads a thermal zone file and converts millidegrees to degrees Celsius.
pub(crate) fn read_celsius(path: &Path) -> Result<f64, SampleError> {
    let content = read_sysfs_file(path)?;
    let millidegrees: i64 = content.parse().map_err(|_| SampleError::Parse {
        path: path.display().to_string(),
        detail: format!("expected integer millidegrees, got '{content}'"),
    })?;
    Ok(millidegrees as f64 / 1000.0)
}

/// Reads a sysfs/procfs file and returns its trimmed content.
///
/// Shared by every reader in this crate.
pub(crate) fn read_sysfs_file(path: &Path) -> Result<String, SampleError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| SampleError::unavailable(path.display().to_string(), e))
}
