use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use relink_core::control::RunOptions;
use relink_core::rewrite::delpher::DEFAULT_RELINK_SUMMARY;
use relink_core::rewrite::source_block::DEFAULT_SOURCE_SUMMARY;
use relink_core::store::{ColumnNames, SheetSelector};
use relink_core::wiki::MediaWikiConfig;
use relink_store::schema::{
    COLUMN_PAGEID,
    COLUMN_RESOLVER,
    COLUMN_STATUS,
    COLUMN_TITLE,
    COMMONS_API_URL,
    NAMESPACE_MAIN,
};
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str =
    "delpher-relink/0.1 (https://www.wikidata.org/wiki/Q1526131; KB Delpher link maintenance)";
const DEFAULT_EDIT_SLEEP_SECS: f64 = 4.0;
const DEFAULT_MAX_FILES: usize = 60_000;
const DEFAULT_MAXLAG_SECS: u32 = 5;
const DEFAULT_MAXLAG_RETRIES: u32 = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_REVIEW_MAX: usize = 20;
const DEFAULT_CHECKPOINT_EVERY: usize = 50;
const DEFAULT_EXTLINK_PROTOCOL: &str = "https";

#[derive(Parser, Debug)]
#[command(
    name = "delpher-relink",
    version,
    about = "Replaces non-persistent Delpher links with KB resolver links on Wikimedia wikis."
)]
struct CliArgs {
    #[arg(long, global = true, env = "WIKIMEDIA_API_URL", default_value = COMMONS_API_URL)]
    api_url: String,

    #[arg(long, global = true, env = "WIKIMEDIA_USERNAME")]
    username: Option<String>,

    #[arg(long, global = true, env = "WIKIMEDIA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, global = true, env = "WIKIMEDIA_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    #[arg(
        long,
        global = true,
        env = "EDIT_SLEEP_SEC",
        default_value_t = DEFAULT_EDIT_SLEEP_SECS
    )]
    edit_sleep_secs: f64,

    #[arg(long, global = true, env = "MAX_FILES", default_value_t = DEFAULT_MAX_FILES)]
    max_files: usize,

    #[arg(
        long,
        global = true,
        env = "DRY_RUN",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    dry_run: bool,

    /// Write the JSON run report to this file.
    #[arg(long, global = true, env = "REPORT_PATH")]
    report: Option<PathBuf>,

    #[arg(long, global = true, env = "WIKIMEDIA_MAXLAG", default_value_t = DEFAULT_MAXLAG_SECS)]
    maxlag: u32,

    #[arg(
        long,
        global = true,
        env = "WIKIMEDIA_MAXLAG_RETRIES",
        default_value_t = DEFAULT_MAXLAG_RETRIES
    )]
    maxlag_retries: u32,

    #[arg(
        long,
        global = true,
        env = "WIKIMEDIA_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    timeout_secs: u64,

    /// Collect `Special:Redirect/page/<id>` links for successful edits.
    #[arg(
        long,
        global = true,
        env = "OPEN_AFTER_SUCCESS",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    review_links: bool,

    #[arg(
        long,
        global = true,
        env = "OPEN_AFTER_SUCCESS_MAX",
        default_value_t = DEFAULT_REVIEW_MAX
    )]
    review_links_max: usize,

    #[arg(
        long,
        global = true,
        env = "CHECKPOINT_EVERY_SUCCESS",
        default_value_t = DEFAULT_CHECKPOINT_EVERY
    )]
    checkpoint_every: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rewrite Internet Archive `|source =` blocks for pages listed in a workbook.
    Sources(SourcesArgs),
    /// Run a literal find/replace sweep over full-text search results.
    Sweep(SweepArgs),
    /// Replace Delpher viewer links with resolver links on pages found by external link search.
    Relink(RelinkArgs),
    /// Fill the resolver column of a workbook from file titles.
    Resolvers(WorkbookArgs),
    /// Turn wiki page URLs into `[[lang:page]]` lists.
    Urls(UrlsArgs),
    /// Reformat tab-separated replacement pairs for `www.kb.nl` targets.
    Replacements(ReplacementsArgs),
}

#[derive(Args, Debug)]
struct WorkbookArgs {
    /// Record sheet, an `.xlsx` spreadsheet or a `.json` workbook.
    #[arg(long, env = "EXCEL_FILE")]
    workbook: PathBuf,

    /// Sheet name, or a zero-based index when only digits are given.
    #[arg(long, env = "EXCEL_SHEET")]
    sheet: Option<String>,

    #[arg(long, env = "EXCEL_PAGEID_COL", default_value = COLUMN_PAGEID)]
    pageid_column: String,

    #[arg(long, env = "EXCEL_TITLE_COL", default_value = COLUMN_TITLE)]
    title_column: String,

    #[arg(long, env = "EXCEL_STATUS_COL", default_value = COLUMN_STATUS)]
    status_column: String,

    #[arg(long, env = "EXCEL_RESOLVER_COL", default_value = COLUMN_RESOLVER)]
    resolver_column: String,
}

#[derive(Args, Debug)]
struct SliceArgs {
    /// Process only the first N records.
    #[arg(long, env = "HEAD")]
    head: Option<usize>,

    /// Process a 1-based inclusive span, e.g. `51-200`.
    #[arg(long, env = "RANGE")]
    range: Option<String>,
}

#[derive(Args, Debug)]
struct SourcesArgs {
    #[command(flatten)]
    workbook: WorkbookArgs,

    #[command(flatten)]
    slice: SliceArgs,

    #[arg(long, env = "EDIT_SUMMARY", default_value = DEFAULT_SOURCE_SUMMARY)]
    summary: String,
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// TOML file with the search query, guard and replacement rules.
    #[arg(long, env = "SWEEP_RULES")]
    rules: PathBuf,

    #[command(flatten)]
    slice: SliceArgs,
}

#[derive(Args, Debug)]
struct RelinkArgs {
    /// Link target without protocol, e.g. `www.delpher.nl/nl/kranten/view`.
    #[arg(long, env = "EXTLINK_QUERY")]
    query: String,

    #[arg(long, env = "EXTLINK_PROTOCOL", default_value = DEFAULT_EXTLINK_PROTOCOL)]
    protocol: String,

    #[arg(long, env = "EXTLINK_NAMESPACE", default_value_t = NAMESPACE_MAIN)]
    namespace: i32,

    #[arg(long, env = "EDIT_SUMMARY", default_value = DEFAULT_RELINK_SUMMARY)]
    summary: String,

    #[command(flatten)]
    slice: SliceArgs,
}

#[derive(Args, Debug)]
struct UrlsArgs {
    #[arg(long, default_value = "urls.txt")]
    input: PathBuf,

    #[arg(long, default_value = "nlpages.txt")]
    nl_output: PathBuf,

    #[arg(long, default_value = "otherpages.txt")]
    other_output: PathBuf,
}

#[derive(Args, Debug)]
struct ReplacementsArgs {
    #[arg(long, default_value = "replacements.txt")]
    input: PathBuf,

    #[arg(long, default_value = "replacements_kb_kb.txt")]
    output: PathBuf,
}

/// Where a workbook-driven job reads records and writes results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookTarget {
    pub path: PathBuf,
    pub sheet: Option<SheetSelector>,
    pub columns: ColumnNames,
}

/// HEAD/RANGE selection applied to the records of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSlice {
    pub head: Option<usize>,
    pub range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Sources {
        workbook: WorkbookTarget,
        slice: RecordSlice,
        summary: String,
    },
    Sweep {
        rules: PathBuf,
        slice: RecordSlice,
    },
    Relink {
        query: String,
        protocol: String,
        namespace: i32,
        summary: String,
        slice: RecordSlice,
    },
    Resolvers {
        workbook: WorkbookTarget,
    },
    Urls {
        input: PathBuf,
        nl_output: PathBuf,
        other_output: PathBuf,
    },
    Replacements {
        input: PathBuf,
        output: PathBuf,
    },
}

impl Job {
    /// Whether the job talks to the wiki.
    pub const fn uses_wiki(&self) -> bool {
        matches!(self, Self::Sources { .. } | Self::Sweep { .. } | Self::Relink { .. })
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sources { .. } => "sources",
            Self::Sweep { .. } => "sweep",
            Self::Relink { .. } => "relink",
            Self::Resolvers { .. } => "resolvers",
            Self::Urls { .. } => "urls",
            Self::Replacements { .. } => "replacements",
        }
    }
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct RelinkConfig {
    pub wiki: MediaWikiConfig,
    pub run: RunOptions,
    pub max_files: usize,
    pub report_path: Option<PathBuf>,
    pub job: Job,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl RelinkConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl From<SliceArgs> for RecordSlice {
    fn from(args: SliceArgs) -> Self {
        Self {
            head: args.head.filter(|head| *head > 0),
            range: non_blank(args.range),
        }
    }
}

impl TryFrom<WorkbookArgs> for WorkbookTarget {
    type Error = ConfigError;

    fn try_from(args: WorkbookArgs) -> Result<Self, Self::Error> {
        let columns = [
            ("EXCEL_PAGEID_COL", &args.pageid_column),
            ("EXCEL_TITLE_COL", &args.title_column),
            ("EXCEL_STATUS_COL", &args.status_column),
            ("EXCEL_RESOLVER_COL", &args.resolver_column),
        ];
        for (name, value) in columns {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidSetting {
                    name,
                    value: value.clone(),
                });
            }
        }

        let sheet = non_blank(args.sheet).map(|sheet| match sheet.parse::<SheetSelector>() {
            Ok(selector) => selector,
            Err(never) => match never {},
        });

        Ok(Self {
            path: args.workbook,
            sheet,
            columns: ColumnNames {
                pageid: args.pageid_column,
                title: args.title_column,
                status: args.status_column,
                resolver: args.resolver_column,
            },
        })
    }
}

impl TryFrom<Command> for Job {
    type Error = ConfigError;

    fn try_from(command: Command) -> Result<Self, Self::Error> {
        Ok(match command {
            Command::Sources(args) => {
                if args.summary.trim().is_empty() {
                    return Err(ConfigError::MissingSetting("EDIT_SUMMARY"));
                }
                Self::Sources {
                    workbook: WorkbookTarget::try_from(args.workbook)?,
                    slice: args.slice.into(),
                    summary: args.summary,
                }
            }
            Command::Sweep(args) => Self::Sweep {
                rules: args.rules,
                slice: args.slice.into(),
            },
            Command::Relink(args) => {
                let query = args.query.trim().to_string();
                if query.is_empty() {
                    return Err(ConfigError::MissingSetting("EXTLINK_QUERY"));
                }
                if args.summary.trim().is_empty() {
                    return Err(ConfigError::MissingSetting("EDIT_SUMMARY"));
                }
                Self::Relink {
                    query,
                    protocol: args.protocol.trim().to_string(),
                    namespace: args.namespace,
                    summary: args.summary,
                    slice: args.slice.into(),
                }
            }
            Command::Resolvers(args) => Self::Resolvers {
                workbook: WorkbookTarget::try_from(args)?,
            },
            Command::Urls(args) => Self::Urls {
                input: args.input,
                nl_output: args.nl_output,
                other_output: args.other_output,
            },
            Command::Replacements(args) => Self::Replacements {
                input: args.input,
                output: args.output,
            },
        })
    }
}

impl TryFrom<CliArgs> for RelinkConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let job = Job::try_from(args.command)?;

        let api_url = args.api_url.trim().to_string();
        if !(api_url.starts_with("https://") || api_url.starts_with("http://")) {
            return Err(ConfigError::InvalidSetting {
                name: "WIKIMEDIA_API_URL",
                value: args.api_url,
            });
        }
        if !args.edit_sleep_secs.is_finite() || args.edit_sleep_secs < 0.0 {
            return Err(ConfigError::InvalidSetting {
                name: "EDIT_SLEEP_SEC",
                value: args.edit_sleep_secs.to_string(),
            });
        }
        if args.max_files == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "MAX_FILES",
                value: args.max_files.to_string(),
            });
        }

        let username = non_blank(args.username);
        let password = non_blank(args.password);
        if job.uses_wiki() && !args.dry_run {
            if username.is_none() {
                return Err(ConfigError::MissingSetting("WIKIMEDIA_USERNAME"));
            }
            if password.is_none() {
                return Err(ConfigError::MissingSetting("WIKIMEDIA_PASSWORD"));
            }
        }

        let user_agent = args.user_agent.trim().to_string();
        if user_agent.is_empty() {
            return Err(ConfigError::MissingSetting("WIKIMEDIA_USER_AGENT"));
        }

        let mut wiki = MediaWikiConfig::new(api_url, user_agent);
        wiki.username = username;
        wiki.password = password;
        wiki.maxlag = args.maxlag;
        wiki.maxlag_retries = args.maxlag_retries;
        wiki.timeout = Duration::from_secs(args.timeout_secs);

        let run = RunOptions {
            dry_run: args.dry_run,
            edit_sleep: Duration::from_secs_f64(args.edit_sleep_secs),
            checkpoint_every: args.checkpoint_every,
            review_links: args.review_links,
            review_max: args.review_links_max,
            site_base: wiki.site_base(),
        };

        Ok(Self {
            wiki,
            run,
            max_files: args.max_files,
            report_path: args.report,
            job,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook_args() -> WorkbookArgs {
        WorkbookArgs {
            workbook: PathBuf::from("files.json"),
            sheet: None,
            pageid_column: COLUMN_PAGEID.to_string(),
            title_column: COLUMN_TITLE.to_string(),
            status_column: COLUMN_STATUS.to_string(),
            resolver_column: COLUMN_RESOLVER.to_string(),
        }
    }

    fn base_args(command: Command) -> CliArgs {
        CliArgs {
            api_url: COMMONS_API_URL.to_string(),
            username: Some("Bot@relink".to_string()),
            password: Some("secret".to_string()),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            edit_sleep_secs: DEFAULT_EDIT_SLEEP_SECS,
            max_files: DEFAULT_MAX_FILES,
            dry_run: false,
            report: None,
            maxlag: DEFAULT_MAXLAG_SECS,
            maxlag_retries: DEFAULT_MAXLAG_RETRIES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            review_links: false,
            review_links_max: DEFAULT_REVIEW_MAX,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            command,
        }
    }

    fn sources() -> Command {
        Command::Sources(SourcesArgs {
            workbook: workbook_args(),
            slice: SliceArgs {
                head: Some(0),
                range: Some(" 51-200 ".to_string()),
            },
            summary: DEFAULT_SOURCE_SUMMARY.to_string(),
        })
    }

    #[test]
    fn builds_sources_job_with_defaults() {
        let config = RelinkConfig::try_from(base_args(sources())).expect("config should parse");

        assert_eq!(config.run.edit_sleep, Duration::from_secs(4));
        assert_eq!(config.run.site_base, "https://commons.wikimedia.org");
        assert_eq!(config.wiki.maxlag, 5);
        let Job::Sources { slice, workbook, .. } = config.job else {
            panic!("expected sources job");
        };
        assert_eq!(slice.head, None);
        assert_eq!(slice.range.as_deref(), Some("51-200"));
        assert_eq!(workbook.sheet, None);
    }

    #[test]
    fn digit_sheet_selects_index() {
        let mut args = workbook_args();
        args.sheet = Some("2".to_string());
        let target = WorkbookTarget::try_from(args).expect("workbook should parse");
        assert_eq!(target.sheet, Some(SheetSelector::Index(2)));
    }

    #[test]
    fn credentials_required_for_wiki_jobs_only() {
        let mut args = base_args(sources());
        args.password = Some("   ".to_string());
        assert!(matches!(
            RelinkConfig::try_from(args),
            Err(ConfigError::MissingSetting("WIKIMEDIA_PASSWORD"))
        ));

        let mut args = base_args(sources());
        args.username = None;
        args.password = None;
        args.dry_run = true;
        assert!(RelinkConfig::try_from(args).is_ok());

        let mut args = base_args(Command::Replacements(ReplacementsArgs {
            input: PathBuf::from("in.txt"),
            output: PathBuf::from("out.txt"),
        }));
        args.username = None;
        args.password = None;
        let config = RelinkConfig::try_from(args).expect("offline job needs no credentials");
        assert!(!config.job.uses_wiki());
    }

    #[test]
    fn rejects_invalid_settings() {
        let mut args = base_args(sources());
        args.edit_sleep_secs = -1.0;
        assert!(matches!(
            RelinkConfig::try_from(args),
            Err(ConfigError::InvalidSetting { name: "EDIT_SLEEP_SEC", .. })
        ));

        let mut args = base_args(sources());
        args.api_url = "commons.wikimedia.org".to_string();
        assert!(matches!(
            RelinkConfig::try_from(args),
            Err(ConfigError::InvalidSetting { name: "WIKIMEDIA_API_URL", .. })
        ));

        let args = base_args(Command::Relink(RelinkArgs {
            query: "  ".to_string(),
            protocol: DEFAULT_EXTLINK_PROTOCOL.to_string(),
            namespace: NAMESPACE_MAIN,
            summary: DEFAULT_RELINK_SUMMARY.to_string(),
            slice: SliceArgs {
                head: None,
                range: None,
            },
        }));
        assert!(matches!(
            RelinkConfig::try_from(args),
            Err(ConfigError::MissingSetting("EXTLINK_QUERY"))
        ));
    }
}
