use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::errors::MirrorResult;
use crate::storage::traits::RunStateTracker;

/// File-backed run-state: the last successful run timestamp plus the
/// no-new-posts marker consumed by the CI pipeline to short-circuit
/// rendering and publishing.
pub struct FsRunStateTracker {
    last_run_path: PathBuf,
    marker_path: PathBuf,
    github_output: Option<PathBuf>,
    github_step_summary: Option<PathBuf>,
}

impl FsRunStateTracker {
    pub fn new(last_run_path: PathBuf, marker_path: PathBuf) -> Self {
        Self {
            last_run_path,
            marker_path,
            github_output: None,
            github_step_summary: None,
        }
    }

    /// Also emit GitHub Actions output variables and a step-summary note
    /// when marking a no-op run.
    pub fn with_ci_outputs(
        mut self,
        github_output: Option<PathBuf>,
        github_step_summary: Option<PathBuf>,
    ) -> Self {
        self.github_output = github_output;
        self.github_step_summary = github_step_summary;
        self
    }
}

impl RunStateTracker for FsRunStateTracker {
    fn get_last_run(&self) -> MirrorResult<Option<String>> {
        if !self.last_run_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.last_run_path)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(trimmed.to_string()))
    }

    fn set_last_run(&self) -> MirrorResult<String> {
        let timestamp = Utc::now().to_rfc3339();
        fs::write(&self.last_run_path, &timestamp)?;
        Ok(timestamp)
    }

    fn mark_no_new_posts(&self) -> MirrorResult<()> {
        fs::write(&self.marker_path, "true")?;

        if let Some(path) = &self.github_output {
            append_line(path, "no_new_posts=true")?;
        }
        if let Some(path) = &self.github_step_summary {
            append_line(path, "No new posts found since last run. Skipping generation.")?;
        }
        Ok(())
    }
}

fn append_line(path: &Path, line: &str) -> MirrorResult<()> {
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}
