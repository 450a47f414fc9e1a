// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Ordered, case-insensitive pattern matching of log lines.
//!
//! Pattern sets are evaluated from most to least severe; the first set
//! with a match decides the verdict. Lines that match nothing are
//! [`Severity::Debug`].

use crate::{KernelLogError, Severity};
use regex::{Regex, RegexBuilder};

const CRITICAL_PATTERNS: &[&str] = &[
    r"Kernel panic",
    r"Unable to mount root",
    r"Fatal exception",
    r"System halted",
    r"Oops:",
    r"BUG:",
    r"Unable to handle kernel",
    r"Segmentation fault",
    r"Stack overflow",
    // Rockchip / RK3588
    r"rockchip-pcie.*link.*failed",
    r"rockchip-cpufreq.*critical",
    r"rk3588.*thermal.*critical",
    r"coresight-mali.*fault",
    r"rockchip-efuse.*error",
    r"rk3588.*panic",
    r"rockchip.*fatal.*error",
];

const ERROR_PATTERNS: &[&str] = &[
    r"ERROR:",
    r"Failed to",
    r"Could not",
    r"Unable to",
    r"Device not found",
    r"Module not found",
    r"Timeout",
    r"Connection refused",
    r"rockchip-pinctrl.*error",
    r"rockchip-saradc.*failed",
    r"rockchip-otp.*error",
    r"pcie-rockchip.*error",
    r"rockchip-cpufreq.*failed",
    r"rockchip-efuse.*failed",
    r"rk3588.*error",
    r"rockchip.*driver.*failed",
];

const WARNING_PATTERNS: &[&str] = &[
    r"WARNING:",
    r"Deprecated",
    r"Obsolete",
    r"Experimental",
    r"Unstable",
    r"rockchip.*warning",
    r"rk3588.*warning",
    r"rockchip-pcie.*warning",
    r"rockchip-cpufreq.*warning",
    r"coresight-mali.*warning",
];

const INFO_PATTERNS: &[&str] = &[r"INFO:", r"Loading", r"Initializing", r"Starting", r"Stopping"];

/// Verdict for one line, with the pattern that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub severity: Severity,
    /// Source text of the first matching pattern; `None` for unmatched lines.
    pub pattern: Option<String>,
}

#[derive(Debug, Clone)]
struct PatternSet {
    severity: Severity,
    patterns: Vec<Regex>,
}

/// A compiled, immutable set of per-severity patterns.
#[derive(Debug, Clone)]
pub struct Classifier {
    sets: Vec<PatternSet>,
}

impl Classifier {
    /// A classifier with the built-in kernel and Rockchip pattern sets.
    pub fn with_default_patterns() -> Result<Self, KernelLogError> {
        ClassifierBuilder::new().with_defaults().build()
    }

    pub fn builder() -> ClassifierBuilder {
        ClassifierBuilder::new()
    }

    /// Classifies one line. Never fails; unmatched lines are `debug`.
    pub fn classify(&self, line: &str) -> Severity {
        self.find(line.trim()).map_or(Severity::Debug, |(sev, _)| sev)
    }

    /// Like [`classify`](Self::classify) but also reports the matching pattern.
    pub fn classify_detailed(&self, line: &str) -> Classification {
        match self.find(line.trim()) {
            Some((severity, re)) => Classification {
                severity,
                pattern: Some(re.as_str().to_string()),
            },
            None => Classification {
                severity: Severity::Debug,
                pattern: None,
            },
        }
    }

    /// Number of compiled patterns for `severity`.
    pub fn pattern_count(&self, severity: Severity) -> usize {
        self.sets
            .iter()
            .filter(|set| set.severity == severity)
            .map(|set| set.patterns.len())
            .sum()
    }

    fn find(&self, line: &str) -> Option<(Severity, &Regex)> {
        self.sets.iter().find_map(|set| {
            set.patterns
                .iter()
                .find(|re| re.is_match(line))
                .map(|re| (set.severity, re))
        })
    }
}

/// Collects pattern strings and compiles them into a [`Classifier`].
#[derive(Debug, Clone, Default)]
pub struct ClassifierBuilder {
    patterns: Vec<(Severity, String)>,
}

impl ClassifierBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the built-in pattern sets.
    pub fn with_defaults(self) -> Self {
        let defaults = [
            (Severity::Critical, CRITICAL_PATTERNS),
            (Severity::Error, ERROR_PATTERNS),
            (Severity::Warning, WARNING_PATTERNS),
            (Severity::Info, INFO_PATTERNS),
        ];
        defaults
            .into_iter()
            .fold(self, |b, (sev, pats)| b.patterns(sev, pats.iter().copied()))
    }

    /// Adds one pattern. Patterns for the same severity keep insertion order.
    pub fn pattern(mut self, severity: Severity, pattern: impl Into<String>) -> Self {
        self.patterns.push((severity, pattern.into()));
        self
    }

    pub fn patterns<I, P>(self, severity: Severity, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        patterns
            .into_iter()
            .fold(self, |b, p| b.pattern(severity, p))
    }

    /// Compiles every pattern case-insensitively.
    pub fn build(self) -> Result<Classifier, KernelLogError> {
        let mut sets: Vec<PatternSet> = Severity::ALL
            .into_iter()
            .map(|severity| PatternSet {
                severity,
                patterns: Vec::new(),
            })
            .collect();

        for (severity, pattern) in self.patterns {
            let re = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| KernelLogError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
            sets[severity.index()].patterns.push(re);
        }

        sets.retain(|set| !set.patterns.is_empty());
        Ok(Classifier { sets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::with_default_patterns().unwrap()
    }

    #[test]
    fn test_kernel_panic_is_critical() {
        assert_eq!(classifier().classify("Kernel panic: oops"), Severity::Critical);
    }

    #[test]
    fn test_levels() {
        let c = classifier();
        assert_eq!(c.classify("usb 1-1: Failed to set address"), Severity::Error);
        assert_eq!(c.classify("WARNING: CPU: 3 PID: 1 at mm/slub.c"), Severity::Warning);
        assert_eq!(c.classify("Starting kernel ..."), Severity::Info);
        assert_eq!(c.classify("random noise"), Severity::Debug);
        assert_eq!(c.classify(""), Severity::Debug);
    }

    #[test]
    fn test_case_insensitive() {
        let c = classifier();
        assert_eq!(c.classify("KERNEL PANIC - not syncing"), Severity::Critical);
        assert_eq!(c.classify("rk3588-THERMAL zone CRITICAL trip"), Severity::Critical);
        assert_eq!(c.classify("deprecated sysctl used"), Severity::Warning);
    }

    #[test]
    fn test_most_severe_set_wins() {
        // Matches both "Unable to handle kernel" (critical) and "Unable to" (error).
        let c = classifier();
        let v = c.classify_detailed("Unable to handle kernel NULL pointer dereference");
        assert_eq!(v.severity, Severity::Critical);
        assert_eq!(v.pattern.as_deref(), Some("Unable to handle kernel"));
    }

    #[test]
    fn test_unmatched_has_no_pattern() {
        let v = classifier().classify_detailed("  eth0: link becomes ready  ");
        assert_eq!(
            v,
            Classification {
                severity: Severity::Debug,
                pattern: None
            }
        );
    }

    #[test]
    fn test_rockchip_patterns() {
        let c = classifier();
        assert_eq!(
            c.classify("rockchip-pcie fe150000.pcie: PCIe link training failed"),
            Severity::Critical
        );
        assert_eq!(c.classify("rockchip-saradc fec10000: channel read failed"), Severity::Error);
        assert_eq!(c.classify("coresight-mali: power warning"), Severity::Warning);
    }

    #[test]
    fn test_custom_builder() {
        let c = Classifier::builder()
            .pattern(Severity::Warning, "brownout")
            .patterns(Severity::Critical, ["thermal shutdown"])
            .build()
            .unwrap();
        assert_eq!(c.classify("Brownout detected"), Severity::Warning);
        assert_eq!(c.classify("Thermal Shutdown imminent"), Severity::Critical);
        assert_eq!(c.classify("Kernel panic"), Severity::Debug);
        assert_eq!(c.pattern_count(Severity::Warning), 1);
        assert_eq!(c.pattern_count(Severity::Error), 0);
    }

    #[test]
    fn test_invalid_pattern() {
        let result = Classifier::builder().pattern(Severity::Error, "(unclosed").build();
        assert!(matches!(result, Err(KernelLogError::InvalidPattern { .. })));
    }

    #[test]
    fn test_default_pattern_counts() {
        let c = classifier();
        assert_eq!(c.pattern_count(Severity::Critical), CRITICAL_PATTERNS.len());
        assert_eq!(c.pattern_count(Severity::Info), INFO_PATTERNS.len());
        assert_eq!(c.pattern_count(Severity::Debug), 0);
    }
}
