//! Typed views of the two JSON documents a report cycle consumes:
//! `coverage.json` from coverage.py and `diff-coverage.json` from
//! `diff-cover`. Required fields are checked here so the renderer never sees
//! a half-populated summary.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{HectorError, Result};

/// Whole-codebase coverage at the current commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageSummary {
    /// Percentage (0–100) of statements executed.
    pub overall_coverage_percent: f64,
}

/// Coverage of a single file, restricted to lines touched by the diff.
#[derive(Debug, Clone, PartialEq)]
pub struct FileCoverageStat {
    pub percent_covered: f64,
    /// Changed lines not covered by any test, strictly increasing.
    pub violation_lines: Vec<u32>,
}

/// Coverage restricted to the lines changed in the current diff.
///
/// Only constructed through [`DiffCoverageSummary::new`] or
/// [`parse_diff_coverage`], so violations never exceed changed lines and the
/// per-file stats are always least covered first.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffCoverageSummary {
    diff_coverage_percent: f64,
    total_changed_lines: u64,
    violated_lines: u64,
    per_file_stats: Vec<(String, FileCoverageStat)>,
    diff_name: Option<String>,
}

impl DiffCoverageSummary {
    /// Build a summary, validating the line counts and sorting the per-file
    /// stats ascending by coverage.
    pub fn new(
        diff_coverage_percent: f64,
        total_changed_lines: u64,
        violated_lines: u64,
        mut per_file_stats: Vec<(String, FileCoverageStat)>,
    ) -> Result<Self> {
        if violated_lines > total_changed_lines {
            return Err(HectorError::MalformedInput(format!(
                "{violated_lines} violations reported for only {total_changed_lines} changed lines"
            )));
        }
        per_file_stats.sort_by(|a, b| a.1.percent_covered.total_cmp(&b.1.percent_covered));
        Ok(Self {
            diff_coverage_percent,
            total_changed_lines,
            violated_lines,
            per_file_stats,
            diff_name: None,
        })
    }

    #[must_use]
    pub fn diff_coverage_percent(&self) -> f64 {
        self.diff_coverage_percent
    }

    #[must_use]
    pub fn total_changed_lines(&self) -> u64 {
        self.total_changed_lines
    }

    /// Changed lines not covered by any test.
    #[must_use]
    pub fn violated_lines(&self) -> u64 {
        self.violated_lines
    }

    /// Changed lines that are covered.
    #[must_use]
    pub fn covered_lines(&self) -> u64 {
        self.total_changed_lines - self.violated_lines
    }

    /// Per-file stats, least covered first.
    #[must_use]
    pub fn per_file_stats(&self) -> &[(String, FileCoverageStat)] {
        &self.per_file_stats
    }

    /// Description of the compared revisions, as reported by diff-cover.
    #[must_use]
    pub fn diff_name(&self) -> Option<&str> {
        self.diff_name.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CoverageDocument {
    totals: Option<CoverageTotals>,
}

#[derive(Deserialize)]
struct CoverageTotals {
    percent_covered: Option<f64>,
}

#[derive(Deserialize)]
struct DiffCoverageDocument {
    diff_name: Option<String>,
    total_num_lines: Option<u64>,
    total_num_violations: Option<u64>,
    total_percent_covered: Option<f64>,
    #[serde(default)]
    src_stats: BTreeMap<String, SourceStat>,
}

#[derive(Deserialize)]
struct SourceStat {
    percent_covered: Option<f64>,
    violation_lines: Option<Vec<u32>>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| HectorError::MalformedInput(format!("missing field `{field}`")))
}

/// Parse a coverage.py JSON report.
pub fn parse_coverage(input: &[u8]) -> Result<CoverageSummary> {
    let doc: CoverageDocument = serde_json::from_slice(input)?;
    let totals = required(doc.totals, "totals")?;
    Ok(CoverageSummary {
        overall_coverage_percent: required(totals.percent_covered, "totals.percent_covered")?,
    })
}

/// Parse a diff-cover JSON report.
pub fn parse_diff_coverage(input: &[u8]) -> Result<DiffCoverageSummary> {
    let doc: DiffCoverageDocument = serde_json::from_slice(input)?;

    let mut per_file_stats = Vec::with_capacity(doc.src_stats.len());
    for (path, stat) in doc.src_stats {
        let percent_covered = required(
            stat.percent_covered,
            &format!("src_stats.{path}.percent_covered"),
        )?;
        let violation_lines = required(
            stat.violation_lines,
            &format!("src_stats.{path}.violation_lines"),
        )?;
        if violation_lines.windows(2).any(|w| w[0] >= w[1]) {
            return Err(HectorError::MalformedInput(format!(
                "violation lines for {path} are not strictly increasing"
            )));
        }
        per_file_stats.push((
            path,
            FileCoverageStat {
                percent_covered,
                violation_lines,
            },
        ));
    }

    let mut summary = DiffCoverageSummary::new(
        required(doc.total_percent_covered, "total_percent_covered")?,
        required(doc.total_num_lines, "total_num_lines")?,
        required(doc.total_num_violations, "total_num_violations")?,
        per_file_stats,
    )?;
    summary.diff_name = doc.diff_name;
    Ok(summary)
}

/// Read and parse a coverage.py JSON report from disk.
pub fn load_coverage(path: &Path) -> Result<CoverageSummary> {
    parse_coverage(&std::fs::read(path)?)
}

/// Read and parse a diff-cover JSON report from disk.
pub fn load_diff_coverage(path: &Path) -> Result<DiffCoverageSummary> {
    parse_diff_coverage(&std::fs::read(path)?)
}
