// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Supply voltage and current from the PMIC's power-supply class.
//!
//! The RK808 PMIC exposes `voltage_now` (µV) and `current_now` (µA) under
//! `/sys/class/power_supply/rk808-usb/`. Readings are appended to a JSON
//! history file holding the most recent [`POWER_HISTORY_LIMIT`] entries.

use crate::thermal::read_sysfs_file;
use crate::SampleError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Power-supply directory, relative to the sysfs root.
const POWER_SUPPLY_CLASS: &str = "class/power_supply";

/// Supply read when none is configured.
pub const DEFAULT_POWER_SUPPLY: &str = "rk808-usb";

/// Entries kept in the history file.
pub const POWER_HISTORY_LIMIT: usize = 1000;

/// One measurement. A field is `None` when its file could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerReading {
    /// RFC 3339, local time.
    pub timestamp: String,
    /// Volts.
    pub voltage: Option<f64>,
    /// Milliamps.
    pub current: Option<f64>,
    /// Watts.
    pub power: Option<f64>,
}

impl PowerReading {
    /// Builds a reading, deriving power from voltage and current.
    pub fn new(voltage: Option<f64>, current: Option<f64>) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            voltage,
            current,
            power: voltage.zip(current).map(|(v, ma)| v * ma / 1000.0),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.voltage.is_some() && self.current.is_some() && self.power.is_some()
    }
}

/// Reads one power supply.
#[derive(Debug, Clone)]
pub struct PowerReader {
    supply_dir: PathBuf,
}

impl PowerReader {
    /// `supply` is a directory name under `<sys_root>/class/power_supply`.
    pub fn new(sys_root: impl AsRef<Path>, supply: &str) -> Self {
        Self {
            supply_dir: sys_root.as_ref().join(POWER_SUPPLY_CLASS).join(supply),
        }
    }

    pub fn supply_dir(&self) -> &Path {
        &self.supply_dir
    }

    pub fn voltage_volts(&self) -> Result<f64, SampleError> {
        Ok(self.read_micro("voltage_now")? as f64 / 1_000_000.0)
    }

    pub fn current_milliamps(&self) -> Result<f64, SampleError> {
        Ok(self.read_micro("current_now")? as f64 / 1000.0)
    }

    /// Takes a reading; failed fields are logged and left empty.
    pub fn read(&self) -> PowerReading {
        let voltage = self
            .voltage_volts()
            .map_err(|e| tracing::error!("error reading voltage: {e}"))
            .ok();
        let current = self
            .current_milliamps()
            .map_err(|e| tracing::error!("error reading current: {e}"))
            .ok();
        PowerReading::new(voltage, current)
    }

    fn read_micro(&self, file: &str) -> Result<i64, SampleError> {
        let path = self.supply_dir.join(file);
        let content = read_sysfs_file(&path)?;
        content.parse().map_err(|_| SampleError::Parse {
            path: path.display().to_string(),
            detail: format!("expected an integer, got '{content}'"),
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    measurements: Vec<PowerReading>,
}

/// Rolling JSON history of power readings.
#[derive(Debug, Clone)]
pub struct PowerHistory {
    path: PathBuf,
    limit: usize,
}

impl PowerHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            limit: POWER_HISTORY_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored readings, oldest first. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<PowerReading>, SampleError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SampleError::unavailable(self.path.display().to_string(), e)),
        };
        let file: HistoryFile = serde_json::from_str(&content).map_err(|e| SampleError::Parse {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        })?;
        Ok(file.measurements)
    }

    /// Appends `reading`, drops the oldest entries beyond the limit and
    /// rewrites the file. Returns the number of entries stored.
    pub fn append(&self, reading: PowerReading) -> Result<usize, SampleError> {
        let mut measurements = self.load()?;
        measurements.push(reading);
        let excess = measurements.len().saturating_sub(self.limit);
        measurements.drain(..excess);

        let persist = |detail: String| SampleError::Persist {
            path: self.path.display().to_string(),
            detail,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| persist(e.to_string()))?;
        }
        let stored = measurements.len();
        let json = serde_json::to_string_pretty(&HistoryFile { measurements })
            .map_err(|e| persist(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| persist(e.to_string()))?;
        Ok(stored)
    }
}
