use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{
    STATUS_ERROR,
    STATUS_PROCESSED,
    STATUS_SKIPPED_GUARD,
    STATUS_SKIPPED_NO_OLD,
    make_mid,
};

/// A page selected for processing, keyed by its numeric page id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRecord {
    pub pageid: u64,
    pub mid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl PageRecord {
    pub fn new(pageid: u64, title: Option<String>) -> Self {
        let title = title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty());
        Self {
            pageid,
            mid: make_mid(pageid),
            title,
        }
    }

    /// Human readable label for log lines.
    pub fn label(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("pageid {}", self.pageid))
    }
}

/// How a page is addressed in API calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageRef {
    Id(u64),
    Title(String),
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(pageid) => write!(f, "pageid {pageid}"),
            Self::Title(title) => write!(f, "{title}"),
        }
    }
}

/// Final status recorded for each processed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Processed,
    SkippedNoOldPattern,
    SkippedGuard,
    Error,
}

impl ProcessingStatus {
    /// Label written back into the status column.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Processed => STATUS_PROCESSED,
            Self::SkippedNoOldPattern => STATUS_SKIPPED_NO_OLD,
            Self::SkippedGuard => STATUS_SKIPPED_GUARD,
            Self::Error => STATUS_ERROR,
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One old to new substitution applied to a page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkReplacement {
    pub old: String,
    pub new: String,
}

/// Classification of an external link found in wikitext.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkClass {
    /// Persistent KB resolver link.
    Resolver { urn: String },
    /// Delpher viewer link; `urn` is `None` when no identifier can be recovered.
    Delpher { urn: Option<String> },
    /// Any other `kb.nl` link.
    KbLegacy,
    Other,
}

/// Outcome for a single page within a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageOutcome {
    pub pageid: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replacements: Vec<LinkReplacement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-status tallies for a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunCounts {
    pub processed: usize,
    pub skipped_no_old_pattern: usize,
    pub skipped_guard: usize,
    pub errors: usize,
}

impl RunCounts {
    pub const fn record(&mut self, status: ProcessingStatus) {
        match status {
            ProcessingStatus::Processed => self.processed += 1,
            ProcessingStatus::SkippedNoOldPattern => self.skipped_no_old_pattern += 1,
            ProcessingStatus::SkippedGuard => self.skipped_guard += 1,
            ProcessingStatus::Error => self.errors += 1,
        }
    }

    pub const fn total(&self) -> usize {
        self.processed + self.skipped_no_old_pattern + self.skipped_guard + self.errors
    }
}

/// Summary of a batch run, serialized as the run report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub job: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub counts: RunCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<PageOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub review_urls: Vec<String>,
}

impl RunReport {
    pub fn start(job: impl Into<String>, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job: job.into(),
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            counts: RunCounts::default(),
            outcomes: Vec::new(),
            review_urls: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: PageOutcome) {
        self.counts.record(outcome.status);
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
