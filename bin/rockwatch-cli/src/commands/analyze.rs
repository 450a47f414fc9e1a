// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `rockwatch analyze`: per-severity breakdown of a log file.

use anyhow::Context;
use kernel_log::{AnalysisReport, Classifier, LogAnalyzer, Severity, SeverityRouter};
use std::path::PathBuf;

pub async fn execute(file: PathBuf, route_dir: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let analyzer = LogAnalyzer::new(Classifier::with_default_patterns()?);
    let report = analyzer
        .analyze_file(&file)
        .with_context(|| format!("analysing {}", file.display()))?;

    if let Some(dir) = route_dir {
        let router = SeverityRouter::new(&dir)?;
        let source = file.display().to_string();
        for finding in &report.findings {
            let message = format!("Line {}: {}", finding.line_number, finding.text);
            router.record(finding.severity, &message, finding.context(&source))?;
            kernel_log::emit(finding.severity, &message);
        }
        tracing::info!(
            "routed {} finding(s) to {}",
            report.findings.len(),
            dir.display()
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&file, &report);
    }
    Ok(())
}

fn print_table(file: &std::path::Path, report: &AnalysisReport) {
    println!("  Kernel Log Analysis: {}", file.display());
    println!();
    println!("   {:<10} {:>8} {:>10}", "Level", "Count", "Share");
    for severity in Severity::ALL {
        println!(
            "   {:<10} {:>8} {:>9.1}%",
            severity.as_str().to_uppercase(),
            report.count(severity),
            report.percentage(severity)
        );
    }
    println!();

    if !report.findings.is_empty() {
        println!("  Findings");
        for f in &report.findings {
            println!("   {:>6}  {:<8}  {}", f.line_number, f.severity, f.text);
        }
        println!();
    }
    println!("  {}", report.summary());
}
