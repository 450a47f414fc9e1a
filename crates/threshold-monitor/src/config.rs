// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Watchdog configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! status_interval_seconds = 5.0
//! sample_timeout_seconds = 0.5
//! reboot_grace_seconds = 5.0
//! dry_run = false
//!
//! [cpu]
//! enabled = true
//! threshold_percent = 80.0
//! sustained_seconds = 15.0
//! poll_interval_seconds = 1.0
//!
//! [ram]
//! threshold_percent = 90.0
//!
//! [link]
//! enabled = true
//! interface = "wlan0"
//! sustained_seconds = 60.0
//! check_gateway = true
//! ping_timeout_seconds = 2.0
//! usb_rebind = true
//! ```
//!
//! Every field is optional; missing fields take the defaults shown.

use crate::MonitorError;
use metric_sampler::GatewayCheck;
use std::path::Path;
use std::time::Duration;

/// Threshold of the link monitor on its `0.0` (up) / `1.0` (down) scale.
const LINK_DOWN_THRESHOLD: f64 = 0.5;

/// Debounce parameters for one metric.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Value that must be strictly exceeded (percent for CPU/RAM).
    pub threshold_percent: f64,
    /// How long the excursion must last before the action fires.
    pub sustained_seconds: f64,
    /// Sampling cadence.
    pub poll_interval_seconds: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold_percent: 80.0,
            sustained_seconds: 15.0,
            poll_interval_seconds: 1.0,
        }
    }
}

impl MonitorConfig {
    /// Checks ranges: threshold > 0, sustained >= 0, poll interval > 0,
    /// all finite.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if !self.threshold_percent.is_finite() || self.threshold_percent <= 0.0 {
            return Err(MonitorError::ConfigurationInvalid {
                field: "threshold_percent",
                detail: format!("must be a positive number, got {}", self.threshold_percent),
            });
        }
        self.sustained()?;
        let poll = self.poll_interval()?;
        if poll.is_zero() {
            return Err(MonitorError::ConfigurationInvalid {
                field: "poll_interval_seconds",
                detail: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// `sustained_seconds` as a [`Duration`].
    pub fn sustained(&self) -> Result<Duration, MonitorError> {
        seconds("sustained_seconds", self.sustained_seconds)
    }

    /// `poll_interval_seconds` as a [`Duration`].
    pub fn poll_interval(&self) -> Result<Duration, MonitorError> {
        seconds("poll_interval_seconds", self.poll_interval_seconds)
    }
}

/// Converts a non-negative, finite number of seconds into a [`Duration`].
fn seconds(field: &'static str, value: f64) -> Result<Duration, MonitorError> {
    Duration::try_from_secs_f64(value).map_err(|_| MonitorError::ConfigurationInvalid {
        field,
        detail: format!("must be a non-negative number of seconds, got {value}"),
    })
}

/// A CPU or RAM section of the watchdog file.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub monitor: MonitorConfig,
}

impl Default for MetricSection {
    fn default() -> Self {
        Self {
            enabled: true,
            monitor: MonitorConfig::default(),
        }
    }
}

/// The link-health section of the watchdog file.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LinkSection {
    pub enabled: bool,
    /// Interface to watch; the first `wl*` interface when unset.
    pub interface: Option<String>,
    pub sustained_seconds: f64,
    pub poll_interval_seconds: f64,
    /// Also require the default gateway to answer a ping.
    pub check_gateway: bool,
    pub ping_timeout_seconds: f64,
    /// Rebind USB network adapters before bouncing the interface.
    pub usb_rebind: bool,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            enabled: false,
            interface: None,
            sustained_seconds: 60.0,
            poll_interval_seconds: 1.0,
            check_gateway: true,
            ping_timeout_seconds: 2.0,
            usb_rebind: true,
        }
    }
}

impl LinkSection {
    /// The debounce parameters for the `0/1` link-down metric.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            threshold_percent: LINK_DOWN_THRESHOLD,
            sustained_seconds: self.sustained_seconds,
            poll_interval_seconds: self.poll_interval_seconds,
        }
    }

    /// The reachability check, or `None` when it is disabled.
    pub fn gateway_check(&self) -> Result<Option<GatewayCheck>, MonitorError> {
        if !self.check_gateway {
            return Ok(None);
        }
        let timeout = seconds("ping_timeout_seconds", self.ping_timeout_seconds)?;
        Ok(Some(GatewayCheck::new(timeout)))
    }

    /// Sampling timeout for the link loop: a ping may legitimately take
    /// its full timeout on top of the usual read budget.
    pub fn sample_timeout(&self, base: Duration) -> Result<Duration, MonitorError> {
        Ok(match self.gateway_check()? {
            Some(check) => base + check.ping_timeout() + Duration::from_secs(1),
            None => base,
        })
    }
}

fn default_true() -> bool {
    true
}

/// Top-level watchdog configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Minimum spacing between periodic status lines, per metric.
    pub status_interval_seconds: f64,
    /// Reads slower than this are discarded as unknown.
    pub sample_timeout_seconds: f64,
    /// Pause between the syslog notice and the reboot command.
    pub reboot_grace_seconds: f64,
    /// Log corrective actions instead of executing them.
    pub dry_run: bool,
    pub cpu: MetricSection,
    pub ram: MetricSection,
    pub link: LinkSection,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            status_interval_seconds: 5.0,
            sample_timeout_seconds: 0.5,
            reboot_grace_seconds: 5.0,
            dry_run: false,
            cpu: MetricSection::default(),
            ram: MetricSection::default(),
            link: LinkSection::default(),
        }
    }
}

impl WatchdogConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, MonitorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, MonitorError> {
        toml::from_str(toml_str).map_err(|e| MonitorError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, MonitorError> {
        toml::to_string_pretty(self)
            .map_err(|e| MonitorError::Config(format!("TOML serialise error: {e}")))
    }

    /// Validates every enabled section plus the global timings.
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.status_interval()?;
        self.sample_timeout()?;
        self.reboot_grace()?;
        if self.cpu.enabled {
            self.cpu.monitor.validate()?;
        }
        if self.ram.enabled {
            self.ram.monitor.validate()?;
        }
        if self.link.enabled {
            self.link.monitor_config().validate()?;
            self.link.gateway_check()?;
        }
        Ok(())
    }

    pub fn status_interval(&self) -> Result<Duration, MonitorError> {
        seconds("status_interval_seconds", self.status_interval_seconds)
    }

    pub fn sample_timeout(&self) -> Result<Duration, MonitorError> {
        seconds("sample_timeout_seconds", self.sample_timeout_seconds)
    }

    pub fn reboot_grace(&self) -> Result<Duration, MonitorError> {
        seconds("reboot_grace_seconds", self.reboot_grace_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = MonitorConfig::default();
        assert_eq!(c.threshold_percent, 80.0);
        assert_eq!(c.sustained_seconds, 15.0);
        assert_eq!(c.poll_interval_seconds, 1.0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let c = MonitorConfig {
            threshold_percent: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            c.validate(),
            Err(MonitorError::ConfigurationInvalid {
                field: "threshold_percent",
                ..
            })
        ));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let c = MonitorConfig {
            sustained_seconds: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            c.validate(),
            Err(MonitorError::ConfigurationInvalid {
                field: "sustained_seconds",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_duration_allowed() {
        let c = MonitorConfig {
            sustained_seconds: 0.0,
            ..Default::default()
        };
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let c = MonitorConfig {
            threshold_percent: f64::NAN,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let c = MonitorConfig {
            poll_interval_seconds: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            c.validate(),
            Err(MonitorError::ConfigurationInvalid {
                field: "poll_interval_seconds",
                ..
            })
        ));
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
dry_run = true

[ram]
threshold_percent = 90.0

[link]
enabled = true
interface = "wlan1"
"#;
        let c = WatchdogConfig::from_toml(toml).unwrap();
        assert!(c.dry_run);
        assert!(c.cpu.enabled);
        assert_eq!(c.cpu.monitor, MonitorConfig::default());
        assert!(c.ram.enabled);
        assert_eq!(c.ram.monitor.threshold_percent, 90.0);
        assert_eq!(c.ram.monitor.sustained_seconds, 15.0);
        assert!(c.link.enabled);
        assert_eq!(c.link.interface.as_deref(), Some("wlan1"));
        assert_eq!(c.link.sustained_seconds, 60.0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let c = WatchdogConfig::from_toml("").unwrap();
        assert_eq!(c, WatchdogConfig::default());
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let mut c = WatchdogConfig::default();
        c.link.interface = Some("wlan0".into());
        let back = WatchdogConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            WatchdogConfig::from_toml("cpu = 3"),
            Err(MonitorError::Config(_))
        ));
    }

    #[test]
    fn test_disabled_section_not_validated() {
        let mut c = WatchdogConfig::default();
        c.cpu.enabled = false;
        c.cpu.monitor.threshold_percent = -5.0;
        assert!(c.validate().is_ok());

        c.cpu.enabled = true;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_link_threshold() {
        let link = LinkSection::default().monitor_config();
        assert_eq!(link.threshold_percent, LINK_DOWN_THRESHOLD);
        assert_eq!(link.sustained_seconds, 60.0);
    }

    #[test]
    fn test_link_sample_timeout_covers_ping() {
        let base = Duration::from_millis(500);
        let mut link = LinkSection::default();
        assert_eq!(link.sample_timeout(base).unwrap(), Duration::from_millis(3500));

        link.check_gateway = false;
        assert!(link.gateway_check().unwrap().is_none());
        assert_eq!(link.sample_timeout(base).unwrap(), base);
    }

    #[test]
    fn test_bad_ping_timeout_rejected_when_link_enabled() {
        let mut c = WatchdogConfig::default();
        c.link.ping_timeout_seconds = -1.0;
        assert!(c.validate().is_ok());
        c.link.enabled = true;
        assert!(matches!(
            c.validate(),
            Err(MonitorError::ConfigurationInvalid {
                field: "ping_timeout_seconds",
                ..
            })
        ));
    }

    #[test]
    fn test_from_missing_file() {
        let result = WatchdogConfig::from_file(Path::new("/nonexistent/rockwatch.toml"));
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }
}
