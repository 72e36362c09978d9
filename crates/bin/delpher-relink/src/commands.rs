use std::error::Error;
use std::fs;
use std::path::Path;

use relink_core::control::{NullSink, RelinkControlPlane, RunOptions, WorkbookSink, apply_slice};
use relink_core::parsers::{reformat_replacements, reformat_wiki_urls};
use relink_core::rewrite::{DelpherLinkTransform, PageTransform, SourceBlockTransform, SweepRules};
use relink_core::store::Workbook;
use relink_core::wiki::{ExtUrlQuery, MediaWikiClient, SearchQuery};
use relink_store::{PageRecord, RunReport};
use tracing::info;

use crate::config::{Job, RecordSlice, RelinkConfig, WorkbookTarget};

type CommandResult<T> = Result<T, Box<dyn Error>>;

pub async fn run(config: RelinkConfig) -> CommandResult<()> {
    info!(job = config.job.name(), dry_run = config.run.dry_run, "starting");

    let report = match &config.job {
        Job::Sources {
            workbook,
            slice,
            summary,
        } => Some(run_sources(&config, workbook, slice, summary).await?),
        Job::Sweep { rules, slice } => Some(run_sweep(&config, rules, slice).await?),
        Job::Relink {
            query,
            protocol,
            namespace,
            summary,
            slice,
        } => {
            let query = ExtUrlQuery {
                query: query.clone(),
                protocol: Some(protocol.clone()).filter(|protocol| !protocol.is_empty()),
                namespace: Some(*namespace),
                limit: config.max_files,
            };
            Some(run_relink(&config, &query, summary, slice).await?)
        }
        Job::Resolvers { workbook } => {
            fill_resolvers(workbook)?;
            None
        }
        Job::Urls {
            input,
            nl_output,
            other_output,
        } => {
            split_wiki_urls(input, nl_output, other_output)?;
            None
        }
        Job::Replacements { input, output } => {
            kb_replacements(input, output)?;
            None
        }
    };

    if let (Some(report), Some(path)) = (report.as_ref(), config.report_path.as_ref()) {
        write_report(report, path)?;
    }
    Ok(())
}

async fn connect(config: &RelinkConfig) -> CommandResult<RelinkControlPlane<MediaWikiClient>> {
    let client = MediaWikiClient::new(config.wiki.clone())?;
    if config.wiki.username.is_some() && config.wiki.password.is_some() {
        client.login().await?;
    } else {
        info!("no credentials configured; reading anonymously");
    }
    Ok(RelinkControlPlane::new(client))
}

fn select(records: Vec<PageRecord>, slice: &RecordSlice) -> CommandResult<Vec<PageRecord>> {
    let total = records.len();
    let selected = apply_slice(records, slice.head, slice.range.as_deref())?;
    info!("Processing {} of {total} rows.", selected.len());
    Ok(selected)
}

async fn run_sources(
    config: &RelinkConfig,
    workbook: &WorkbookTarget,
    slice: &RecordSlice,
    summary: &str,
) -> CommandResult<RunReport> {
    let records = Workbook::load(&workbook.path)?.load_records(
        workbook.sheet.as_ref(),
        &workbook.columns,
        config.max_files,
    )?;
    let records = select(records, slice)?;

    let control = connect(config).await?;
    let transform = SourceBlockTransform::new(summary);
    let report = if config.run.dry_run {
        control
            .run_records("sources", &records, &transform, &mut NullSink, &config.run)
            .await?
    } else {
        let mut sink = WorkbookSink::new(
            workbook.path.clone(),
            workbook.sheet.clone(),
            workbook.columns.clone(),
        );
        control
            .run_records("sources", &records, &transform, &mut sink, &config.run)
            .await?
    };
    Ok(report)
}

async fn run_sweep(config: &RelinkConfig, rules: &Path, slice: &RecordSlice) -> CommandResult<RunReport> {
    let rules = SweepRules::load(rules)?;
    let control = connect(config).await?;
    let query = SearchQuery {
        query: rules.query.clone(),
        namespace: rules.namespace,
        limit: config.max_files,
    };
    let records = control.records_from_search(&query).await?;
    info!(query = %query.query, count = records.len(), "search selected pages");
    let records = select(records, slice)?;
    run_search_driven(&control, "sweep", &records, &rules.transform(), &config.run).await
}

async fn run_relink(
    config: &RelinkConfig,
    query: &ExtUrlQuery,
    summary: &str,
    slice: &RecordSlice,
) -> CommandResult<RunReport> {
    let control = connect(config).await?;
    let records = control.records_with_external_link(query).await?;
    info!(query = %query.query, count = records.len(), "external link search selected pages");
    let records = select(records, slice)?;
    run_search_driven(&control, "relink", &records, &DelpherLinkTransform::new(summary), &config.run).await
}

async fn run_search_driven(
    control: &RelinkControlPlane<MediaWikiClient>,
    job: &str,
    records: &[PageRecord],
    transform: &dyn PageTransform,
    options: &RunOptions,
) -> CommandResult<RunReport> {
    let report = control
        .run_records(job, records, transform, &mut NullSink, options)
        .await?;
    Ok(report)
}

fn fill_resolvers(workbook: &WorkbookTarget) -> CommandResult<()> {
    let mut book = Workbook::load(&workbook.path)?;
    let filled = book.fill_resolvers(workbook.sheet.as_ref(), &workbook.columns)?;
    book.save(&workbook.path)?;
    info!(filled, path = %workbook.path.display(), "saved workbook with resolver URLs");
    Ok(())
}

fn split_wiki_urls(input: &Path, nl_output: &Path, other_output: &Path) -> CommandResult<()> {
    let lists = reformat_wiki_urls(&fs::read_to_string(input)?);
    fs::write(nl_output, join_lines(&lists.nl))?;
    fs::write(other_output, join_lines(&lists.other))?;
    info!(
        nl = lists.nl.len(),
        other = lists.other.len(),
        unmatched = lists.unmatched.len(),
        "wrote interwiki lists"
    );
    Ok(())
}

fn kb_replacements(input: &Path, output: &Path) -> CommandResult<()> {
    let result = reformat_replacements(&fs::read_to_string(input)?)?;
    fs::write(output, &result.output)?;
    info!(
        kept = result.kept,
        dropped = result.dropped,
        path = %output.display(),
        "wrote kb.nl replacements"
    );
    Ok(())
}

fn join_lines(lines: &[String]) -> String {
    lines.iter().map(|line| format!("{line}\n")).collect()
}

fn write_report(report: &RunReport, path: &Path) -> CommandResult<()> {
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    info!(path = %path.display(), "wrote run report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_lines_with_trailing_newlines() {
        assert_eq!(join_lines(&[]), "");
        assert_eq!(
            join_lines(&["[[nl:Hoorn]]".to_string(), "[[nl:Edam]]".to_string()]),
            "[[nl:Hoorn]]\n[[nl:Edam]]\n"
        );
    }

    #[test]
    fn offline_jobs_write_their_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let urls = dir.path().join("urls.txt");
        let nl = dir.path().join("nlpages.txt");
        let other = dir.path().join("otherpages.txt");
        fs::write(
            &urls,
            "https://nl.wikipedia.org/wiki/Hoorn\nhttps://en.wikipedia.org/wiki/Delpher\n",
        )
        .unwrap();
        split_wiki_urls(&urls, &nl, &other).unwrap();
        assert_eq!(fs::read_to_string(&nl).unwrap(), "[[nl:Hoorn]]\n");
        assert_eq!(fs::read_to_string(&other).unwrap(), "[[en:Delpher]]\n");

        let pairs = dir.path().join("replacements.txt");
        let out = dir.path().join("replacements_kb_kb.txt");
        fs::write(&pairs, "https://www.kb.nl/a\thttps://www.kb.nl/b\n").unwrap();
        kb_replacements(&pairs, &out).unwrap();
        assert!(!fs::read_to_string(&out).unwrap().is_empty());
    }
}
