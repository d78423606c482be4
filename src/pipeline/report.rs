use crate::converter::{ConversionResult, ReportedError};
use crate::error::{ConvertError, Result};
use crate::pipeline::batch::ArchiveEntry;
use crate::structure::StructureFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveState {
    Pending,
    Extracting,
    Scanning,
    Converting,
    Done,
    Failed,
}

impl ArchiveState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ArchiveState::Done | ArchiveState::Failed)
    }

    fn can_advance_to(&self, next: ArchiveState) -> bool {
        use ArchiveState::*;
        matches!(
            (self, next),
            (Pending, Extracting)
                | (Extracting, Scanning)
                | (Scanning, Converting)
                | (Converting, Done)
        ) || (!self.is_terminal() && next == Failed)
    }
}

impl std::fmt::Display for ArchiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArchiveState::Pending => "pending",
            ArchiveState::Extracting => "extracting",
            ArchiveState::Scanning => "scanning",
            ArchiveState::Converting => "converting",
            ArchiveState::Done => "done",
            ArchiveState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveReport {
    /// Name of the uploaded archive.
    pub name: String,
    /// Folder name used inside the output archive.
    pub entry_name: String,
    pub state: ArchiveState,
    /// Stage that was running when the archive failed.
    pub failed_during: Option<ArchiveState>,
    pub error: Option<ReportedError>,
    pub files: Vec<ConversionResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ArchiveReport {
    pub fn new<S: Into<String>, E: Into<String>>(name: S, entry_name: E) -> Self {
        Self {
            name: name.into(),
            entry_name: entry_name.into(),
            state: ArchiveState::Pending,
            failed_during: None,
            error: None,
            files: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to `next`; out-of-order transitions are ignored.
    pub fn advance(&mut self, next: ArchiveState) -> bool {
        if !self.state.can_advance_to(next) {
            return false;
        }
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        true
    }

    pub fn fail(&mut self, error: &ConvertError) {
        let during = self.state;
        if self.advance(ArchiveState::Failed) {
            self.failed_during = Some(during);
            self.error = Some(error.into());
        }
    }

    pub fn converted_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|f| !f.is_success()).count()
    }

    pub fn is_done(&self) -> bool {
        self.state == ArchiveState::Done
    }
}

/// Whether a run that did not abort converted everything it found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    SucceededWithSkips {
        skipped_files: usize,
        failed_archives: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub source_format: StructureFormat,
    pub target_format: StructureFormat,
    pub archives: Vec<ArchiveReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchReport {
    pub fn new(source_format: StructureFormat, target_format: StructureFormat) -> Self {
        Self {
            source_format,
            target_format,
            archives: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    pub fn converted_files(&self) -> usize {
        self.archives.iter().map(|a| a.converted_count()).sum()
    }

    pub fn skipped_files(&self) -> usize {
        self.archives.iter().map(|a| a.failed_count()).sum()
    }

    pub fn failed_archives(&self) -> usize {
        self.archives
            .iter()
            .filter(|a| a.state == ArchiveState::Failed)
            .count()
    }

    pub fn status(&self) -> RunStatus {
        let skipped_files = self.skipped_files();
        let failed_archives = self.failed_archives();

        if skipped_files == 0 && failed_archives == 0 {
            RunStatus::Succeeded
        } else {
            RunStatus::SucceededWithSkips {
                skipped_files,
                failed_archives,
            }
        }
    }

    /// Entries of the archives that completed, in arrival order.
    pub fn completed_entries(&self, workdir_root: &Path) -> Vec<ArchiveEntry> {
        self.archives
            .iter()
            .filter(|a| a.is_done())
            .map(|a| ArchiveEntry::new(a.entry_name.clone(), workdir_root.join(&a.entry_name)))
            .collect()
    }

    pub fn duration(&self) -> std::time::Duration {
        self.finished_at
            .unwrap_or_else(Utc::now)
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConvertError::Packaging {
            message: format!("Failed to serialize report: {}", e),
        })
    }
}
