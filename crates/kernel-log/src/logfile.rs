// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Size-rotated append-only log files.
//!
//! When an append would push `x.log` past its size limit, the file is
//! shifted to `x.log.1` (and `x.log.1` to `x.log.2`, ...) before writing.
//! At most `keep` rotated files survive; the oldest is deleted.

use crate::{KernelLogError, Severity};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Rotation threshold used unless configured otherwise.
pub const DEFAULT_MAX_LOG_BYTES: u64 = 100 * 1024 * 1024;

/// Rotated files kept unless configured otherwise.
pub const DEFAULT_KEEP_LOGS: usize = 5;

/// One log file plus its rotated predecessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    keep: usize,
}

impl RotatingFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: DEFAULT_MAX_LOG_BYTES,
            keep: DEFAULT_KEEP_LOGS,
        }
    }

    /// Rotates once the file would exceed `max_bytes`, keeping `keep`
    /// rotated files. `keep == 0` discards the old content.
    pub fn with_rotation(mut self, max_bytes: u64, keep: usize) -> Self {
        self.max_bytes = max_bytes;
        self.keep = keep;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `x.log.<n>`.
    pub fn rotated_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    /// Appends `text` as-is, rotating first if needed. A single write
    /// larger than the limit still goes to a fresh file.
    pub fn append(&self, text: &str) -> Result<(), KernelLogError> {
        let current = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(KernelLogError::io(&self.path, e)),
        };
        if current > 0 && current + text.len() as u64 > self.max_bytes {
            self.rotate()?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| KernelLogError::io(&self.path, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| KernelLogError::io(&self.path, e))
    }

    fn rotate(&self) -> Result<(), KernelLogError> {
        if self.keep == 0 {
            return std::fs::remove_file(&self.path).map_err(|e| KernelLogError::io(&self.path, e));
        }
        let oldest = self.rotated_path(self.keep);
        if oldest.exists() {
            std::fs::remove_file(&oldest).map_err(|e| KernelLogError::io(&oldest, e))?;
        }
        for n in (1..self.keep).rev() {
            let from = self.rotated_path(n);
            if from.exists() {
                std::fs::rename(&from, self.rotated_path(n + 1))
                    .map_err(|e| KernelLogError::io(&from, e))?;
            }
        }
        std::fs::rename(&self.path, self.rotated_path(1))
            .map_err(|e| KernelLogError::io(&self.path, e))?;
        tracing::debug!("rotated {}", self.path.display());
        Ok(())
    }
}

/// Plain-text log, one `time | LEVEL | message` line per entry.
#[derive(Debug, Clone)]
pub struct TextLog {
    file: RotatingFile,
}

impl TextLog {
    /// Creates the parent directory if needed.
    pub fn new(file: RotatingFile) -> Result<Self, KernelLogError> {
        if let Some(parent) = file.path().parent() {
            std::fs::create_dir_all(parent).map_err(|e| KernelLogError::io(parent, e))?;
        }
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn write(&self, severity: Severity, message: &str) -> Result<(), KernelLogError> {
        let line = format!(
            "{} | {:<8} | {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            severity.as_str().to_uppercase(),
            message
        );
        self.file.append(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotates_and_keeps_limit() {
        let dir = tempfile::tempdir().unwrap();
        let log = RotatingFile::new(dir.path().join("kernel.log")).with_rotation(10, 2);

        for line in ["aaaaaaaa\n", "bbbbbbbb\n", "cccccccc\n", "dddddddd\n"] {
            log.append(line).unwrap();
        }

        let read = |p: PathBuf| std::fs::read_to_string(p).unwrap();
        assert_eq!(read(log.path().to_path_buf()), "dddddddd\n");
        assert_eq!(read(log.rotated_path(1)), "cccccccc\n");
        assert_eq!(read(log.rotated_path(2)), "bbbbbbbb\n");
        assert!(!log.rotated_path(3).exists());
    }

    #[test]
    fn test_no_rotation_below_limit() {
        let dir = tempfile::tempdir().unwrap();
        let log = RotatingFile::new(dir.path().join("x.log")).with_rotation(100, 5);
        log.append("one\n").unwrap();
        log.append("two\n").unwrap();
        assert_eq!(std::fs::read_to_string(log.path()).unwrap(), "one\ntwo\n");
        assert!(!log.rotated_path(1).exists());
    }

    #[test]
    fn test_keep_zero_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let log = RotatingFile::new(dir.path().join("x.log")).with_rotation(4, 0);
        log.append("abc\n").unwrap();
        log.append("def\n").unwrap();
        assert_eq!(std::fs::read_to_string(log.path()).unwrap(), "def\n");
        assert!(!log.rotated_path(1).exists());
    }

    #[test]
    fn test_rotated_path() {
        let log = RotatingFile::new("/var/log/kernel/error.log");
        assert_eq!(log.rotated_path(3), PathBuf::from("/var/log/kernel/error.log.3"));
    }

    #[test]
    fn test_text_log_format() {
        let dir = tempfile::tempdir().unwrap();
        let log = TextLog::new(RotatingFile::new(dir.path().join("sub/kernel.log"))).unwrap();
        log.write(Severity::Warning, "under-voltage detected").unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let fields: Vec<&str> = content.trim_end().split(" | ").collect();
        assert_eq!(fields.len(), 3);
        assert!(chrono::NaiveDateTime::parse_from_str(fields[0], "%Y-%m-%d %H:%M:%S%.3f").is_ok());
        assert_eq!(fields[1].trim(), "WARNING");
        assert_eq!(fields[2], "under-voltage detected");
    }
}
