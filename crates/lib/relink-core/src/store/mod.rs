//! Record sheets that drive batch runs and receive their statuses.
//!
//! Workbooks are `.xlsx` spreadsheets or JSON files holding named sheets of
//! row objects.

pub mod workbook;
mod xlsx;

pub use workbook::{
    ColumnNames,
    Row,
    Sheet,
    SheetSelector,
    Workbook,
    WorkbookError,
    WorkbookFormat,
    WorkbookResult,
};
