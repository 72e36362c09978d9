use std::time::Duration;

use relink_store::schema::COMMONS_BASE_URL;
use thiserror::Error;

use crate::rewrite::RewriteError;
use crate::store::WorkbookError;
use crate::wiki::{WikiApi, WikiError};

pub mod runs;
pub mod sink;
pub mod slice;

pub use sink::{NullSink, StatusSink, WorkbookSink};
pub use slice::{SliceError, apply_slice};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Wiki(#[from] WikiError),
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    #[error(transparent)]
    Workbook(#[from] WorkbookError),
    #[error(transparent)]
    Slice(#[from] SliceError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("no records to process")]
    NoRecords,
}

/// Knobs shared by every batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Transform and report, but never save.
    pub dry_run: bool,
    /// Pause between records; not applied after the last one.
    pub edit_sleep: Duration,
    /// Flush statuses after this many successful edits; zero disables checkpoints.
    pub checkpoint_every: usize,
    /// Collect review links for successful edits.
    pub review_links: bool,
    pub review_max: usize,
    /// Site root used to build review links.
    pub site_base: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            edit_sleep: Duration::from_secs(4),
            checkpoint_every: 50,
            review_links: false,
            review_max: 20,
            site_base: COMMONS_BASE_URL.to_string(),
        }
    }
}

/// Runs fetch, transform and save over batches of pages.
pub struct RelinkControlPlane<W: WikiApi> {
    wiki: W,
}

impl<W: WikiApi> RelinkControlPlane<W> {
    pub const fn new(wiki: W) -> Self {
        Self { wiki }
    }

    pub const fn wiki(&self) -> &W {
        &self.wiki
    }
}
