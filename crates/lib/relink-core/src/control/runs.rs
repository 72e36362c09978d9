use std::collections::HashMap;

use relink_store::schema::make_redirect_url;
use relink_store::{LinkReplacement, PageOutcome, PageRecord, PageRef, ProcessingStatus, RunReport};
use tracing::{error, info, warn};

use crate::rewrite::{PageTransform, Rewrite};
use crate::wiki::{EditOutcome, ExtUrlQuery, PageEdit, PageHit, SearchQuery, WikiApi};

use super::{ControlError, RelinkControlPlane, RunOptions, StatusSink};

const SEPARATOR_WIDTH: usize = 50;

/// What happened to one page before it is turned into an outcome.
struct Step {
    status: ProcessingStatus,
    replacements: Vec<LinkReplacement>,
    message: Option<String>,
}

fn hits_to_records(hits: Vec<PageHit>) -> Vec<PageRecord> {
    hits.into_iter()
        .map(|hit| PageRecord::new(hit.pageid, Some(hit.title)))
        .collect()
}

impl<W: WikiApi> RelinkControlPlane<W> {
    /// Fetches, transforms and saves each record in order.
    ///
    /// Per-page failures are recorded as errors and the run continues.
    /// Statuses are flushed to `sink` every `checkpoint_every` successful
    /// edits and once more at the end.
    ///
    /// # Errors
    /// Returns `ControlError::NoRecords` for an empty batch, or the sink error
    /// if the final status write fails.
    pub async fn run_records<S: StatusSink>(
        &self,
        job: &str,
        records: &[PageRecord],
        transform: &dyn PageTransform,
        sink: &mut S,
        options: &RunOptions,
    ) -> Result<RunReport, ControlError> {
        if records.is_empty() {
            return Err(ControlError::NoRecords);
        }

        let total = records.len();
        let separator = "=".repeat(SEPARATOR_WIDTH);
        let mut report = RunReport::start(job, options.dry_run);
        let mut statuses: HashMap<u64, ProcessingStatus> = HashMap::new();
        let mut successes = 0usize;
        let mut since_flush = 0usize;

        info!(
            run_id = %report.run_id,
            job,
            transform = transform.name(),
            total,
            dry_run = options.dry_run,
            "starting run"
        );

        for (idx, record) in records.iter().enumerate() {
            let position = idx + 1;
            info!(
                "({position}/{total}) Processing: Title={:?}, MID={}, Pageid={}",
                record.title, record.mid, record.pageid
            );

            let step = match self.process_record(record, transform, options).await {
                Ok(step) => step,
                Err(err) => {
                    error!("{position} - Error processing {} (continuing): {err}", record.label());
                    Step {
                        status: ProcessingStatus::Error,
                        replacements: Vec::new(),
                        message: Some(err.to_string()),
                    }
                }
            };

            statuses.insert(record.pageid, step.status);
            if step.status == ProcessingStatus::Processed {
                successes += 1;
                since_flush += 1;

                if !options.dry_run
                    && options.review_links
                    && report.review_urls.len() < options.review_max
                {
                    let url = make_redirect_url(&options.site_base, record.pageid);
                    info!(url = %url, "review edit");
                    report.review_urls.push(url);
                }

                if options.checkpoint_every > 0 && since_flush >= options.checkpoint_every {
                    match sink.flush(&statuses).await {
                        Ok(_) => info!(
                            "Checkpoint: wrote statuses after {since_flush} successful edits (total successes so far: {successes})."
                        ),
                        Err(err) => warn!("Checkpoint write failed (continuing): {err}"),
                    }
                    since_flush = 0;
                }
            }

            report.push(PageOutcome {
                pageid: record.pageid,
                title: record.title.clone(),
                status: step.status,
                replacements: step.replacements,
                message: step.message,
            });

            if position < total {
                info!("{separator}");
                if !options.edit_sleep.is_zero() {
                    tokio::time::sleep(options.edit_sleep).await;
                }
            }
        }

        let written = sink.flush(&statuses).await?;
        info!(written, successes, "wrote final statuses");

        report.finish();
        info!(
            run_id = %report.run_id,
            processed = report.counts.processed,
            skipped_no_old_pattern = report.counts.skipped_no_old_pattern,
            skipped_guard = report.counts.skipped_guard,
            errors = report.counts.errors,
            "Finished processing."
        );
        Ok(report)
    }

    async fn process_record(
        &self,
        record: &PageRecord,
        transform: &dyn PageTransform,
        options: &RunOptions,
    ) -> Result<Step, ControlError> {
        let page = PageRef::Id(record.pageid);
        let revision = self.wiki().fetch_page(&page).await?;
        let label = record.label();

        let (text, replacements) = match transform.apply(&revision.text)? {
            Rewrite::Changed { text, replacements } if text != revision.text => (text, replacements),
            Rewrite::Skipped(reason) => {
                info!("Skipping {label}: {reason}");
                return Ok(Step {
                    status: ProcessingStatus::SkippedGuard,
                    replacements: Vec::new(),
                    message: Some(reason),
                });
            }
            Rewrite::Unchanged | Rewrite::Changed { .. } => {
                info!("No change needed (no old pattern): {label}");
                return Ok(Step {
                    status: ProcessingStatus::SkippedNoOldPattern,
                    replacements: Vec::new(),
                    message: None,
                });
            }
        };

        if options.dry_run {
            info!(replacements = replacements.len(), "Dry run, not saving: {label}");
            return Ok(Step {
                status: ProcessingStatus::Processed,
                replacements,
                message: Some("dry run; edit not saved".to_string()),
            });
        }

        let outcome = self
            .wiki()
            .save_page(&PageEdit {
                page,
                text,
                summary: transform.summary().to_string(),
                basetimestamp: revision.basetimestamp,
            })
            .await?;
        let message = match outcome {
            EditOutcome::Saved { newrevid } => {
                info!(newrevid, "Updated: {label}");
                None
            }
            EditOutcome::NoChange => {
                info!("Saved without change: {label}");
                Some("no change".to_string())
            }
        };

        Ok(Step {
            status: ProcessingStatus::Processed,
            replacements,
            message,
        })
    }

    /// Pages matched by a full-text search, as records.
    ///
    /// # Errors
    /// Returns `ControlError::Wiki` if the search fails.
    pub async fn records_from_search(&self, query: &SearchQuery) -> Result<Vec<PageRecord>, ControlError> {
        let hits = self.wiki().search_pages(query).await?;
        Ok(hits_to_records(hits))
    }

    /// Pages linking to an external URL pattern, as records.
    ///
    /// # Errors
    /// Returns `ControlError::Wiki` if the search fails.
    pub async fn records_with_external_link(
        &self,
        query: &ExtUrlQuery,
    ) -> Result<Vec<PageRecord>, ControlError> {
        let hits = self.wiki().pages_with_external_link(query).await?;
        Ok(hits_to_records(hits))
    }

    /// Runs `transform` over every page matched by a full-text search.
    ///
    /// # Errors
    /// See [`RelinkControlPlane::run_records`]; a search without results is
    /// reported as `ControlError::NoRecords`.
    pub async fn run_search<S: StatusSink>(
        &self,
        query: &SearchQuery,
        transform: &dyn PageTransform,
        sink: &mut S,
        options: &RunOptions,
    ) -> Result<RunReport, ControlError> {
        let records = self.records_from_search(query).await?;
        info!(query = %query.query, count = records.len(), "search selected pages");
        self.run_records("search", &records, transform, sink, options)
            .await
    }

    /// Runs `transform` over every page that links to an external URL pattern.
    ///
    /// # Errors
    /// See [`RelinkControlPlane::run_records`]; a search without results is
    /// reported as `ControlError::NoRecords`.
    pub async fn run_external_links<S: StatusSink>(
        &self,
        query: &ExtUrlQuery,
        transform: &dyn PageTransform,
        sink: &mut S,
        options: &RunOptions,
    ) -> Result<RunReport, ControlError> {
        let records = self.records_with_external_link(query).await?;
        info!(query = %query.query, count = records.len(), "external link search selected pages");
        self.run_records("external-links", &records, transform, sink, options)
            .await
    }
}
