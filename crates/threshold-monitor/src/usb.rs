// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! USB network adapter rebinding through sysfs.
//!
//! A wedged USB Wi-Fi dongle or modem often comes back after its driver
//! is detached and reattached: write the device name to the driver's
//! `unbind` file, wait, then write it to `bind`.

use crate::ActionError;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// USB device directory, relative to the sysfs root.
const USB_DEVICES: &str = "bus/usb/devices";

/// `product` strings containing any of these (case-insensitive) are rebound.
pub const DEFAULT_USB_KEYWORDS: [&str; 3] = ["modem", "network", "wifi"];

/// A USB device found under `<sys_root>/bus/usb/devices`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDevice {
    /// Bus path name, e.g. `1-1.2`; this is what `bind`/`unbind` expect.
    pub name: String,
    pub product: String,
    path: PathBuf,
}

impl UsbDevice {
    /// Detaches the device from its driver, waits `pause`, reattaches it.
    pub fn rebind(&self, pause: Duration) -> Result<(), ActionError> {
        // Resolve now: the `driver` link disappears once unbound.
        let link = self.path.join("driver");
        let driver = std::fs::canonicalize(&link).map_err(|source| ActionError::Sysfs {
            path: link.clone(),
            source,
        })?;
        write_sysfs(&driver.join("unbind"), &self.name)?;
        std::thread::sleep(pause);
        write_sysfs(&driver.join("bind"), &self.name)
    }
}

fn write_sysfs(path: &Path, value: &str) -> Result<(), ActionError> {
    tracing::debug!("writing '{value}' to {}", path.display());
    std::fs::write(path, value).map_err(|source| ActionError::Sysfs {
        path: path.to_path_buf(),
        source,
    })
}

/// Lists USB devices whose `product` matches one of `keywords`, by name.
pub fn find_usb_devices(sys_root: &Path, keywords: &[String]) -> Vec<UsbDevice> {
    let Ok(entries) = std::fs::read_dir(sys_root.join(USB_DEVICES)) else {
        return Vec::new();
    };
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let mut devices: Vec<UsbDevice> = entries
        .filter_map(|e| e.ok())
        .filter_map(|entry| {
            let path = entry.path();
            let product = std::fs::read_to_string(path.join("product")).ok()?;
            let product = product.trim().to_string();
            let lower = product.to_lowercase();
            keywords
                .iter()
                .any(|k| lower.contains(k.as_str()))
                .then(|| UsbDevice {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    product,
                    path,
                })
        })
        .collect();
    devices.sort_by(|a, b| a.name.cmp(&b.name));
    devices
}

/// Rebind settings carried by [`InterfaceResetAction`](crate::InterfaceResetAction).
#[derive(Debug, Clone)]
pub struct UsbRebind {
    pub sys_root: PathBuf,
    pub keywords: Vec<String>,
}

impl UsbRebind {
    pub fn new(sys_root: impl Into<PathBuf>) -> Self {
        Self {
            sys_root: sys_root.into(),
            keywords: DEFAULT_USB_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    /// Rebinds every matching device, attempting all of them.
    /// Returns the number rebound and the first error seen.
    pub fn run(&self, pause: Duration) -> (usize, Option<ActionError>) {
        let mut rebound = 0;
        let mut first_error = None;
        for device in find_usb_devices(&self.sys_root, &self.keywords) {
            match device.rebind(pause) {
                Ok(()) => {
                    tracing::info!("restarted USB device {} ({})", device.name, device.product);
                    rebound += 1;
                }
                Err(e) => {
                    tracing::error!("failed to restart USB device {}: {e}", device.name);
                    first_error.get_or_insert(e);
                }
            }
        }
        (rebound, first_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Creates `<sys>/bus/usb/devices/<name>` with a product string and,
    /// optionally, a driver directory holding `bind`/`unbind`.
    fn fake_device(sys_root: &Path, name: &str, product: &str, with_driver: bool) -> PathBuf {
        let dir = sys_root.join(USB_DEVICES).join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("product"), format!("{product}\n")).unwrap();
        if with_driver {
            let driver = dir.join("driver");
            std::fs::create_dir_all(&driver).unwrap();
            std::fs::write(driver.join("bind"), "").unwrap();
            std::fs::write(driver.join("unbind"), "").unwrap();
        }
        dir
    }

    fn keywords() -> Vec<String> {
        DEFAULT_USB_KEYWORDS.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_find_matching_devices() {
        let root = tempfile::tempdir().unwrap();
        fake_device(root.path(), "1-1", "802.11ac WiFi Adapter", true);
        fake_device(root.path(), "2-1", "USB Optical Mouse", true);
        fake_device(root.path(), "1-2", "LTE Modem", false);
        std::fs::create_dir_all(root.path().join(USB_DEVICES).join("usb1")).unwrap();

        let found = find_usb_devices(root.path(), &keywords());
        let names: Vec<&str> = found.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["1-1", "1-2"]);
        assert_eq!(found[0].product, "802.11ac WiFi Adapter");
    }

    #[test]
    fn test_no_usb_tree() {
        let root = tempfile::tempdir().unwrap();
        assert!(find_usb_devices(root.path(), &keywords()).is_empty());
    }

    #[test]
    fn test_rebind_writes_unbind_then_bind() {
        let root = tempfile::tempdir().unwrap();
        let dir = fake_device(root.path(), "3-1.4", "Wireless Network Card", true);

        let (rebound, error) = UsbRebind::new(root.path()).run(Duration::ZERO);
        assert_eq!(rebound, 1);
        assert!(error.is_none());
        assert_eq!(std::fs::read_to_string(dir.join("driver/unbind")).unwrap(), "3-1.4");
        assert_eq!(std::fs::read_to_string(dir.join("driver/bind")).unwrap(), "3-1.4");
    }

    #[test]
    fn test_device_without_driver_fails() {
        let root = tempfile::tempdir().unwrap();
        fake_device(root.path(), "1-2", "LTE Modem", false);
        fake_device(root.path(), "1-3", "WiFi dongle", true);

        let (rebound, error) = UsbRebind::new(root.path()).run(Duration::ZERO);
        assert_eq!(rebound, 1);
        assert!(matches!(error, Some(ActionError::Sysfs { .. })));
    }

    #[test]
    fn test_custom_keywords() {
        let root = tempfile::tempdir().unwrap();
        fake_device(root.path(), "1-1", "RTL8812BU", true);
        let rebind = UsbRebind::new(root.path()).with_keywords(vec!["rtl88".into()]);
        assert_eq!(rebind.run(Duration::ZERO).0, 1);
    }
}
