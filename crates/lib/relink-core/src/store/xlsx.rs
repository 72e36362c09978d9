//! Excel backend: the first row of each worksheet holds the column headers.

use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};
use rust_xlsxwriter::Workbook as XlsxWorkbook;
use serde_json::Value;

use super::workbook::{Row, Sheet, Workbook, WorkbookError, WorkbookResult};

pub(super) fn read(path: &Path) -> WorkbookResult<Workbook> {
    let mut source = open_workbook_auto(path)?;
    let mut sheets = Vec::new();
    for name in source.sheet_names() {
        let range = source.worksheet_range(&name)?;
        sheets.push(Sheet {
            name,
            rows: rows_from_range(&range),
        });
    }
    Ok(Workbook { sheets })
}

/// Blank header cells are named `Unnamed: <column>`; rows with no values are
/// dropped.
fn rows_from_range(range: &Range<Data>) -> Vec<Row> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| match cell {
            Data::Empty => format!("Unnamed: {idx}"),
            other => other.to_string().trim().to_string(),
        })
        .collect();

    rows.filter(|cells| cells.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|cells| {
            headers
                .iter()
                .cloned()
                .zip(cells.iter().map(cell_value))
                .collect()
        })
        .collect()
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(number) => Value::from(*number),
        Data::Float(number) => Value::from(*number),
        Data::Bool(flag) => Value::Bool(*flag),
        Data::String(text) => Value::String(text.clone()),
        other => Value::String(other.to_string()),
    }
}

pub(super) fn write(book: &Workbook, path: &Path) -> WorkbookResult<()> {
    let mut target = XlsxWorkbook::new();
    for sheet in &book.sheets {
        let worksheet = target.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        let too_large = || WorkbookError::SheetTooLarge {
            sheet: sheet.name.clone(),
        };
        for (col, header) in sheet.columns().iter().enumerate() {
            let col = u16::try_from(col).map_err(|_| too_large())?;
            worksheet.write_string(0, col, header)?;
            for (idx, row) in sheet.rows.iter().enumerate() {
                let row_num = u32::try_from(idx + 1).map_err(|_| too_large())?;
                match row.get(header) {
                    None | Some(Value::Null) => {}
                    Some(Value::String(text)) => {
                        worksheet.write_string(row_num, col, text)?;
                    }
                    Some(Value::Bool(flag)) => {
                        worksheet.write_boolean(row_num, col, *flag)?;
                    }
                    Some(Value::Number(number)) => {
                        worksheet.write_number(row_num, col, number.as_f64().unwrap_or_default())?;
                    }
                    Some(other) => {
                        worksheet.write_string(row_num, col, other.to_string())?;
                    }
                }
            }
        }
    }
    target.save(path)?;
    Ok(())
}
