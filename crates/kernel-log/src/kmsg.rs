// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `/dev/kmsg` record parsing.
//!
//! Each record is one line:
//!
//! ```text
//! 6,339,5140900,-;NET: Registered protocol family 10
//! ^ ^   ^       ^  ^
//! | |   |       |  message
//! | |   |       flags
//! | |   timestamp, microseconds since boot
//! | sequence number
//! facility << 3 | level
//! ```
//!
//! Lines starting with a space are dictionary continuations of the
//! previous record (`SUBSYSTEM=...`) and are skipped by [`KmsgReader`].

use crate::{Classifier, KernelLogError, Severity};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

const LEVEL_NAMES: [&str; 8] = [
    "emerg", "alert", "crit", "err", "warning", "notice", "info", "debug",
];

/// One parsed kernel message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct KmsgRecord {
    /// Syslog level, `0` (emerg) to `7` (debug).
    pub level: u8,
    pub facility: u8,
    pub sequence: u64,
    /// Microseconds since boot.
    pub timestamp_usec: u64,
    pub message: String,
}

impl KmsgRecord {
    /// Parses one `/dev/kmsg` line.
    pub fn parse(line: &str) -> Result<Self, KernelLogError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let (header, message) = line
            .split_once(';')
            .ok_or_else(|| KernelLogError::malformed(format!("no ';' in '{line}'")))?;

        let mut fields = header.split(',');
        let mut next_number = |name: &str| -> Result<u64, KernelLogError> {
            let raw = fields
                .next()
                .ok_or_else(|| KernelLogError::malformed(format!("missing {name} in '{header}'")))?;
            raw.trim()
                .parse::<u64>()
                .map_err(|_| KernelLogError::malformed(format!("bad {name} '{raw}'")))
        };

        let prefix = next_number("prefix")?;
        let sequence = next_number("sequence")?;
        let timestamp_usec = next_number("timestamp")?;

        let level = (prefix & 7) as u8;
        let facility = u8::try_from(prefix >> 3)
            .map_err(|_| KernelLogError::malformed(format!("prefix {prefix} out of range")))?;

        Ok(Self {
            level,
            facility,
            sequence,
            timestamp_usec,
            message: message.trim().to_string(),
        })
    }

    /// `true` for dictionary continuation lines, which carry no record.
    pub fn is_continuation(line: &str) -> bool {
        line.starts_with(' ')
    }

    /// Time since boot.
    pub fn timestamp(&self) -> Duration {
        Duration::from_micros(self.timestamp_usec)
    }

    /// Syslog name of the level (`err`, `warning`, ...).
    pub fn level_name(&self) -> &'static str {
        LEVEL_NAMES[usize::from(self.level & 7)]
    }

    /// Severity implied by the kernel level alone.
    pub fn severity(&self) -> Severity {
        match self.level {
            0..=3 => Severity::Error,
            4 => Severity::Warning,
            5 => Severity::Info,
            _ => Severity::Debug,
        }
    }

    /// The more severe of the level mapping and the text classification.
    pub fn effective_severity(&self, classifier: &Classifier) -> Severity {
        self.severity()
            .max_severity(classifier.classify(&self.message))
    }
}

/// Iterates over the records of a kmsg-formatted stream.
///
/// Blank and continuation lines are skipped. A malformed record is
/// yielded as an error and iteration continues with the next line.
/// Invalid UTF-8 is replaced, not rejected.
pub struct KmsgReader<R> {
    reader: R,
    source: PathBuf,
    buf: Vec<u8>,
}

impl<R: BufRead> KmsgReader<R> {
    /// `source` names the stream in I/O errors.
    pub fn new(reader: R, source: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            source: source.into(),
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for KmsgReader<R> {
    type Item = Result<KmsgRecord, KernelLogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(KernelLogError::io(self.source.clone(), e))),
            }
            let line = String::from_utf8_lossy(&self.buf);
            if line.trim().is_empty() || KmsgRecord::is_continuation(&line) {
                continue;
            }
            return Some(KmsgRecord::parse(&line));
        }
    }
}
