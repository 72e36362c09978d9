use std::collections::{HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use relink_store::schema::{COLUMN_PAGEID, COLUMN_RESOLVER, COLUMN_STATUS, COLUMN_TITLE};
use relink_store::{PageRecord, ProcessingStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::parsers::resolver_from_title;

use super::xlsx;

/// How many offending rows are quoted in a validation error.
const MAX_BAD_EXAMPLES: usize = 5;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("failed to access workbook {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed workbook JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read spreadsheet: {0}")]
    Excel(#[from] calamine::Error),
    #[error("failed to write spreadsheet: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("unsupported workbook file {0}; use .xlsx or .json")]
    UnsupportedFormat(PathBuf),
    #[error("sheet {sheet:?} has more rows or columns than a spreadsheet can hold")]
    SheetTooLarge { sheet: String },
    #[error("workbook has no sheets")]
    NoSheets,
    #[error("sheet index {index} out of range; available sheets: {available:?}")]
    SheetIndexOutOfRange { index: usize, available: Vec<String> },
    #[error("sheet {name:?} not found; available sheets: {available:?}")]
    SheetNotFound { name: String, available: Vec<String> },
    #[error("expected column {column:?} not found in sheet {sheet:?}; columns present: {present:?}")]
    MissingColumn {
        column: String,
        sheet: String,
        present: Vec<String>,
    },
    #[error("invalid values in {column:?} (must be positive integers); first examples: {examples:?}")]
    InvalidPageIds { column: String, examples: Vec<String> },
    #[error("no valid records after validation and de-duplication")]
    Empty,
    #[error("{count} records exceed the maximum of {max}; reduce the input or raise the limit")]
    TooManyRecords { count: usize, max: usize },
}

pub type WorkbookResult<T> = Result<T, WorkbookError>;

/// On-disk workbook encoding, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
    Json,
    Xlsx,
}

impl WorkbookFormat {
    /// # Errors
    /// Returns `WorkbookError::UnsupportedFormat` for anything but `.json` and `.xlsx`.
    pub fn from_path(path: &Path) -> WorkbookResult<Self> {
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("xlsx") => Ok(Self::Xlsx),
            _ => Err(WorkbookError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Which sheet of a workbook to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl FromStr for SheetSelector {
    type Err = std::convert::Infallible;

    /// A value made only of digits selects by index; anything else by name.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Ok(value
            .parse::<usize>()
            .map_or_else(|_| Self::Name(value.to_string()), Self::Index))
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Column headers used when reading records and writing results back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub pageid: String,
    pub title: String,
    pub status: String,
    pub resolver: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            pageid: COLUMN_PAGEID.to_string(),
            title: COLUMN_TITLE.to_string(),
            status: COLUMN_STATUS.to_string(),
            resolver: COLUMN_RESOLVER.to_string(),
        }
    }
}

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Sheet {
    /// Column names in first-seen order across all rows.
    pub fn columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .flat_map(Map::keys)
            .filter(|key| seen.insert(key.as_str()))
            .cloned()
            .collect()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.rows.iter().any(|row| row.contains_key(column))
    }

    fn require_column(&self, column: &str) -> WorkbookResult<()> {
        if self.has_column(column) {
            return Ok(());
        }
        Err(WorkbookError::MissingColumn {
            column: column.to_string(),
            sheet: self.name.clone(),
            present: self.columns(),
        })
    }
}

/// An ordered set of named sheets, each a list of row objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// Reads a workbook from an `.xlsx` spreadsheet or a JSON file.
    ///
    /// # Errors
    /// Returns `WorkbookError` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> WorkbookResult<Self> {
        if WorkbookFormat::from_path(path)? == WorkbookFormat::Xlsx {
            return xlsx::read(path);
        }
        let bytes = std::fs::read(path).map_err(|source| WorkbookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Writes the workbook in the format its extension names, replacing the
    /// file in one rename.
    ///
    /// # Errors
    /// Returns `WorkbookError` if the file cannot be written.
    pub fn save(&self, path: &Path) -> WorkbookResult<()> {
        let mut staging = OsString::from(path.as_os_str());
        staging.push(".partial");
        let staging = PathBuf::from(staging);
        let io_error = |source| WorkbookError::Io {
            path: path.to_path_buf(),
            source,
        };

        match WorkbookFormat::from_path(path)? {
            WorkbookFormat::Xlsx => xlsx::write(self, &staging)?,
            WorkbookFormat::Json => {
                let json = serde_json::to_vec_pretty(self)?;
                std::fs::write(&staging, json).map_err(io_error)?;
            }
        }
        std::fs::rename(&staging, path).map_err(io_error)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }

    fn position(&self, selector: Option<&SheetSelector>) -> WorkbookResult<usize> {
        if self.sheets.is_empty() {
            return Err(WorkbookError::NoSheets);
        }
        match selector {
            None => Ok(0),
            Some(SheetSelector::Index(index)) if *index < self.sheets.len() => Ok(*index),
            Some(SheetSelector::Index(index)) => Err(WorkbookError::SheetIndexOutOfRange {
                index: *index,
                available: self.sheet_names(),
            }),
            Some(SheetSelector::Name(name)) => self
                .sheets
                .iter()
                .position(|sheet| &sheet.name == name)
                .ok_or_else(|| WorkbookError::SheetNotFound {
                    name: name.clone(),
                    available: self.sheet_names(),
                }),
        }
    }

    /// Resolves a selector; `None` means the first sheet.
    ///
    /// # Errors
    /// Returns `WorkbookError` if the selected sheet does not exist.
    pub fn sheet(&self, selector: Option<&SheetSelector>) -> WorkbookResult<&Sheet> {
        let index = self.position(selector)?;
        Ok(&self.sheets[index])
    }

    /// Mutable variant of [`Workbook::sheet`].
    ///
    /// # Errors
    /// Returns `WorkbookError` if the selected sheet does not exist.
    pub fn sheet_mut(&mut self, selector: Option<&SheetSelector>) -> WorkbookResult<&mut Sheet> {
        let index = self.position(selector)?;
        Ok(&mut self.sheets[index])
    }

    /// Builds validated, de-duplicated page records from the selected sheet.
    ///
    /// # Errors
    /// Returns `WorkbookError` when the page id column is missing, any page id
    /// is not a positive integer, nothing is left, or more than `max_records`
    /// records remain.
    pub fn load_records(
        &self,
        selector: Option<&SheetSelector>,
        columns: &ColumnNames,
        max_records: usize,
    ) -> WorkbookResult<Vec<PageRecord>> {
        let sheet = self.sheet(selector)?;
        sheet.require_column(&columns.pageid)?;

        let mut pageids = Vec::with_capacity(sheet.rows.len());
        let mut bad = Vec::new();
        for (idx, row) in sheet.rows.iter().enumerate() {
            let raw = row.get(&columns.pageid).unwrap_or(&Value::Null);
            match pageid_value(raw) {
                Some(pageid) => pageids.push((pageid, row)),
                None => {
                    if bad.len() < MAX_BAD_EXAMPLES {
                        bad.push(format!("row {}: {raw}", idx + 1));
                    }
                }
            }
        }
        if !bad.is_empty() {
            return Err(WorkbookError::InvalidPageIds {
                column: columns.pageid.clone(),
                examples: bad,
            });
        }

        let mut seen = HashSet::new();
        let mut duplicates = 0usize;
        let mut records = Vec::with_capacity(pageids.len());
        for (pageid, row) in pageids {
            if !seen.insert(pageid) {
                duplicates += 1;
                continue;
            }
            let title = row.get(&columns.title).and_then(text_value);
            records.push(PageRecord::new(pageid, title));
        }
        if duplicates > 0 {
            warn!(duplicates, "duplicate pageid rows were ignored (first occurrence kept)");
        }

        if records.is_empty() {
            return Err(WorkbookError::Empty);
        }
        if records.len() > max_records {
            return Err(WorkbookError::TooManyRecords {
                count: records.len(),
                max: max_records,
            });
        }

        info!(sheet = %sheet.name, count = records.len(), "loaded records");
        Ok(records)
    }

    /// Writes statuses into the status column of every row with a matching page id.
    /// Returns the number of cells written.
    ///
    /// # Errors
    /// Returns `WorkbookError` if the sheet or its page id column is missing.
    pub fn write_statuses(
        &mut self,
        selector: Option<&SheetSelector>,
        columns: &ColumnNames,
        statuses: &HashMap<u64, ProcessingStatus>,
    ) -> WorkbookResult<usize> {
        let sheet = self.sheet_mut(selector)?;
        sheet.require_column(&columns.pageid)?;

        let mut applied = 0;
        for row in &mut sheet.rows {
            let status = row
                .get(&columns.pageid)
                .and_then(pageid_value)
                .and_then(|pageid| statuses.get(&pageid));
            match status {
                Some(status) => {
                    row.insert(columns.status.clone(), Value::String(status.label().to_string()));
                    applied += 1;
                }
                None => {
                    row.entry(columns.status.clone())
                        .or_insert_with(|| Value::String(String::new()));
                }
            }
        }

        info!(sheet = %sheet.name, applied, "wrote status cells");
        Ok(applied)
    }

    /// Fills the resolver column from each row's title. Returns the number of
    /// cells filled.
    ///
    /// # Errors
    /// Returns `WorkbookError` if the selected sheet does not exist.
    pub fn fill_resolvers(
        &mut self,
        selector: Option<&SheetSelector>,
        columns: &ColumnNames,
    ) -> WorkbookResult<usize> {
        let sheet = self.sheet_mut(selector)?;
        if !sheet.has_column(&columns.title) {
            warn!(column = %columns.title, "title column not present; resolver URLs not computed");
            return Ok(0);
        }

        let mut filled = 0;
        for row in &mut sheet.rows {
            let resolver = row
                .get(&columns.title)
                .and_then(text_value)
                .and_then(|title| resolver_from_title(&title));
            if let Some(url) = resolver {
                row.insert(columns.resolver.clone(), Value::String(url));
                filled += 1;
            } else {
                row.entry(columns.resolver.clone())
                    .or_insert_with(|| Value::String(String::new()));
            }
        }

        info!(sheet = %sheet.name, filled, column = %columns.resolver, "filled resolver cells from titles");
        Ok(filled)
    }
}

/// Accepts positive integers, integral floats and numeric strings.
fn pageid_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().and_then(integral_u64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<u64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(integral_u64))
        }
        _ => None,
    }
    .filter(|pageid| *pageid > 0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn integral_u64(value: f64) -> Option<u64> {
    (value.is_finite() && value.fract() == 0.0 && value > 0.0 && value < 2f64.powi(53))
        .then(|| value as u64)
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
    .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn workbook(rows: Value) -> Workbook {
        serde_json::from_value(json!({
            "sheets": [
                {"name": "Overview", "rows": []},
                {"name": "Files", "rows": rows}
            ]
        }))
        .unwrap()
    }

    fn files() -> Option<SheetSelector> {
        Some(SheetSelector::Name("Files".to_string()))
    }

    #[test]
    fn selector_parses_digits_as_index() {
        assert_eq!("1".parse::<SheetSelector>().unwrap(), SheetSelector::Index(1));
        assert_eq!(
            " Files ".parse::<SheetSelector>().unwrap(),
            SheetSelector::Name("Files".to_string())
        );
    }

    #[test]
    fn loads_and_dedupes_records() {
        let book = workbook(json!([
            {"Title": " File:A_(IA_ddd_01).pdf ", "PageID": 10},
            {"Title": "File:B.pdf", "PageID": "11"},
            {"Title": "File:A again", "PageID": 10.0},
            {"PageID": 12}
        ]));
        let records = book
            .load_records(files().as_ref(), &ColumnNames::default(), 100)
            .unwrap();
        let ids: Vec<u64> = records.iter().map(|record| record.pageid).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert_eq!(records[0].title.as_deref(), Some("File:A_(IA_ddd_01).pdf"));
        assert_eq!(records[0].mid, "M10");
        assert_eq!(records[2].title, None);
    }

    #[test]
    fn rejects_bad_pageids_with_examples() {
        let book = workbook(json!([
            {"PageID": 0}, {"PageID": "x"}, {"PageID": null}, {"PageID": 1.5},
            {"PageID": -3}, {"PageID": true}, {"PageID": 7}
        ]));
        let err = book
            .load_records(files().as_ref(), &ColumnNames::default(), 100)
            .unwrap_err();
        let WorkbookError::InvalidPageIds { examples, .. } = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(examples.len(), 5);
        assert_eq!(examples[0], "row 1: 0");
    }

    #[test]
    fn enforces_column_and_limits() {
        let book = workbook(json!([{"Title": "x"}]));
        assert!(matches!(
            book.load_records(files().as_ref(), &ColumnNames::default(), 10),
            Err(WorkbookError::MissingColumn { .. })
        ));

        let book = workbook(json!([{"PageID": 1}, {"PageID": 2}]));
        assert!(matches!(
            book.load_records(files().as_ref(), &ColumnNames::default(), 1),
            Err(WorkbookError::TooManyRecords { count: 2, max: 1 })
        ));
        assert!(matches!(
            book.load_records(None, &ColumnNames::default(), 10),
            Err(WorkbookError::MissingColumn { .. })
        ));
        assert!(matches!(
            book.load_records(Some(&SheetSelector::Index(5)), &ColumnNames::default(), 10),
            Err(WorkbookError::SheetIndexOutOfRange { index: 5, .. })
        ));
    }

    #[test]
    fn writes_statuses_for_matching_rows() {
        let mut book = workbook(json!([{"PageID": 1}, {"PageID": "2"}, {"PageID": 1}, {"PageID": 3}]));
        let statuses = HashMap::from([
            (1, ProcessingStatus::Processed),
            (2, ProcessingStatus::Error),
        ]);
        let applied = book
            .write_statuses(files().as_ref(), &ColumnNames::default(), &statuses)
            .unwrap();
        assert_eq!(applied, 3);
        let rows = &book.sheets[1].rows;
        assert_eq!(rows[0]["ProcessingStatus"], "Successfully processed");
        assert_eq!(rows[1]["ProcessingStatus"], "Skipped - other error");
        assert_eq!(rows[3]["ProcessingStatus"], "");
    }

    #[test]
    fn fills_resolvers_from_titles() {
        let mut book = workbook(json!([
            {"Title": "Krant_(IA_MMKB08_000088804_mpeg21).pdf", "PageID": 1},
            {"Title": "Other.pdf", "PageID": 2}
        ]));
        let filled = book
            .fill_resolvers(files().as_ref(), &ColumnNames::default())
            .unwrap();
        assert_eq!(filled, 1);
        assert_eq!(
            book.sheets[1].rows[0]["ResolverURL"],
            "https://resolver.kb.nl/resolve?urn=MMKB08:000088804"
        );
        assert_eq!(book.sheets[1].rows[1]["ResolverURL"], "");
    }

    #[test]
    fn save_and_load_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let book = workbook(json!([{"PageID": 1}]));
        book.save(&path).unwrap();
        assert_eq!(Workbook::load(&path).unwrap(), book);
        assert!(!path.with_extension("json.partial").exists());
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            WorkbookFormat::from_path(Path::new("MediaFromDelpher.XLSX")).unwrap(),
            WorkbookFormat::Xlsx
        );
        assert_eq!(
            WorkbookFormat::from_path(Path::new("files.json")).unwrap(),
            WorkbookFormat::Json
        );
        assert!(matches!(
            Workbook::load(Path::new("files.csv")),
            Err(WorkbookError::UnsupportedFormat(_))
        ));
    }
}
