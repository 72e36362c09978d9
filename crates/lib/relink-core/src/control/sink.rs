use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use relink_store::ProcessingStatus;

use crate::store::{ColumnNames, SheetSelector, Workbook};

use super::ControlError;

/// Destination for per-page statuses, written at checkpoints and at the end of a run.
pub trait StatusSink: Send {
    /// Persists all statuses collected so far and returns how many cells were written.
    fn flush(
        &mut self,
        statuses: &HashMap<u64, ProcessingStatus>,
    ) -> impl Future<Output = Result<usize, ControlError>> + Send;
}

/// Discards statuses. Used for dry runs and search-driven jobs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {
    async fn flush(&mut self, _statuses: &HashMap<u64, ProcessingStatus>) -> Result<usize, ControlError> {
        Ok(0)
    }
}

/// Writes statuses into a sheet of a JSON workbook on disk.
#[derive(Debug, Clone)]
pub struct WorkbookSink {
    path: PathBuf,
    selector: Option<SheetSelector>,
    columns: ColumnNames,
}

impl WorkbookSink {
    pub const fn new(path: PathBuf, selector: Option<SheetSelector>, columns: ColumnNames) -> Self {
        Self {
            path,
            selector,
            columns,
        }
    }
}

impl StatusSink for WorkbookSink {
    async fn flush(&mut self, statuses: &HashMap<u64, ProcessingStatus>) -> Result<usize, ControlError> {
        if statuses.is_empty() {
            return Ok(0);
        }
        let path = self.path.clone();
        let selector = self.selector.clone();
        let columns = self.columns.clone();
        let statuses = statuses.clone();

        let applied = tokio::task::spawn_blocking(move || {
            let mut workbook = Workbook::load(&path)?;
            let applied = workbook.write_statuses(selector.as_ref(), &columns, &statuses)?;
            workbook.save(&path)?;
            Ok::<_, ControlError>(applied)
        })
        .await??;
        Ok(applied)
    }
}
