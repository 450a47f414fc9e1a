// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Whole-file log analysis: per-severity counts plus the failure lines.

use crate::{Classifier, KernelLogError, Severity};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A `critical` or `error` line found during analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// 1-based.
    pub line_number: usize,
    pub severity: Severity,
    pub pattern: Option<String>,
    pub text: String,
}

impl Finding {
    /// Context object stored alongside the finding when it is routed.
    pub fn context(&self, source: &str) -> serde_json::Value {
        serde_json::json!({
            "file": source,
            "line": self.line_number,
            "pattern": self.pattern,
        })
    }
}

/// Result of [`LogAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Line count per severity; every level is present, possibly zero.
    pub counts: BTreeMap<Severity, usize>,
    pub findings: Vec<Finding>,
}

impl Default for AnalysisReport {
    fn default() -> Self {
        Self {
            counts: Severity::ALL.into_iter().map(|s| (s, 0)).collect(),
            findings: Vec::new(),
        }
    }
}

impl AnalysisReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.counts.get(&severity).copied().unwrap_or(0)
    }

    /// Number of lines analysed.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Share of lines at `severity`, in percent. `0.0` for an empty report.
    pub fn percentage(&self, severity: Severity) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.count(severity) as f64 / total as f64 * 100.0,
        }
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} lines: {} critical/error, {} warning, {} info, {} debug",
            self.total(),
            self.count(Severity::Critical) + self.count(Severity::Error),
            self.count(Severity::Warning),
            self.count(Severity::Info),
            self.count(Severity::Debug),
        )
    }
}

/// Classifies every line of a log.
#[derive(Debug, Clone)]
pub struct LogAnalyzer {
    classifier: Classifier,
}

impl LogAnalyzer {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Classifies every line of `reader`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected: build and kernel
    /// logs often carry stray bytes.
    pub fn analyze<R: BufRead>(&self, mut reader: R) -> Result<AnalysisReport, std::io::Error> {
        let mut report = AnalysisReport::default();
        let mut buf = Vec::new();
        for idx in 0.. {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            let verdict = self.classifier.classify_detailed(line);
            *report.counts.entry(verdict.severity).or_insert(0) += 1;
            if verdict.severity.is_failure() {
                report.findings.push(Finding {
                    line_number: idx + 1,
                    severity: verdict.severity,
                    pattern: verdict.pattern,
                    text: line.trim().to_string(),
                });
            }
        }
        tracing::debug!(lines = report.total(), findings = report.findings.len(), "analysis done");
        Ok(report)
    }

    /// Analyses a file. A missing or unreadable file is an error.
    pub fn analyze_file(&self, path: &Path) -> Result<AnalysisReport, KernelLogError> {
        let file = File::open(path).map_err(|e| KernelLogError::io(path, e))?;
        self.analyze(BufReader::new(file))
            .map_err(|e| KernelLogError::io(path, e))
    }
}
