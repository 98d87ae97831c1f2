//! Producing the diff coverage report that the comment is rendered from.
//!
//! The heavy lifting is delegated to the external `diff-cover` tool, which
//! compares `coverage.xml` against a branch and writes `diff-coverage.json`.
//! A [`ReportGenerator`] abstracts over running it versus reusing reports a
//! previous pipeline step already produced.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::error::HectorError;

/// Default branch the diff is computed against.
pub const DEFAULT_COMPARE_BRANCH: &str = "origin/master";

/// Outcome of a report generation step.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOutput {
    /// Exit code of the coverage gate. Nonzero when `--fail-under` was not met.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl GeneratorOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A source of diff coverage reports.
pub trait ReportGenerator {
    /// Make sure the JSON reports exist and return the gate outcome.
    fn generate(&self) -> Result<GeneratorOutput>;
}

/// Reports produced elsewhere; nothing is run.
pub struct ExistingReport {
    /// Exit code of the step that produced the reports.
    pub exit_code: i32,
}

impl ReportGenerator for ExistingReport {
    fn generate(&self) -> Result<GeneratorOutput> {
        Ok(GeneratorOutput {
            exit_code: self.exit_code,
            ..Default::default()
        })
    }
}

/// Runs `diff-cover` to produce the JSON report.
pub struct DiffCover {
    /// Cobertura XML written by `coverage xml`.
    pub coverage_xml: PathBuf,
    /// Where diff-cover writes its JSON report.
    pub json_report: PathBuf,
    pub compare_branch: String,
    /// Minimum diff coverage percentage, 0–100.
    pub fail_under: Option<u8>,
}

impl DiffCover {
    /// Build the invocation, validating the fail-under threshold.
    pub fn new(
        coverage_xml: impl Into<PathBuf>,
        json_report: impl Into<PathBuf>,
        compare_branch: &str,
        fail_under: Option<i64>,
    ) -> crate::error::Result<Self> {
        let fail_under = match fail_under {
            Some(t) => Some(
                u8::try_from(t)
                    .ok()
                    .filter(|pct| *pct <= 100)
                    .ok_or(HectorError::InvalidThreshold(t))?,
            ),
            None => None,
        };
        Ok(Self {
            coverage_xml: coverage_xml.into(),
            json_report: json_report.into(),
            compare_branch: compare_branch.to_string(),
            fail_under,
        })
    }

    /// Arguments passed to `diff-cover`.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            path_arg(&self.coverage_xml),
            "--compare-branch".to_string(),
            self.compare_branch.clone(),
            "--json-report".to_string(),
            path_arg(&self.json_report),
        ];
        if let Some(threshold) = self.fail_under {
            args.push("--fail-under".to_string());
            args.push(threshold.to_string());
        }
        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl ReportGenerator for DiffCover {
    fn generate(&self) -> Result<GeneratorOutput> {
        if !self.coverage_xml.is_file() {
            anyhow::bail!(
                "{} not found; run `coverage xml` first",
                self.coverage_xml.display()
            );
        }

        let args = self.args();
        debug!(?args, "running diff-cover");
        let output = Command::new("diff-cover")
            .args(&args)
            .output()
            .context("Failed to run diff-cover (is it installed?)")?;

        // A process killed by a signal has no code; treat it as a failed gate.
        let exit_code = output.status.code().unwrap_or(1);
        info!(exit_code, "diff-cover finished");

        Ok(GeneratorOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
