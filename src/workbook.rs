//! Spreadsheet output: one `.xlsx` workbook per brand.

use anyhow::{Context, Result, bail};
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, FormatBorder, Workbook, Worksheet};
use std::path::Path;
use tracing::debug;

use crate::table::{Cell, Table};

/// Rows per worksheet, header included.
pub const MAX_SHEET_ROWS: usize = 1_048_576;
/// Longest sheet name a workbook accepts.
pub const MAX_SHEET_NAME: usize = 31;

/// Accumulates tables as worksheets and writes them out in one go.
pub struct BrandWorkbook {
    workbook: Workbook,
    header: Format,
    date: Format,
    timestamp: Format,
    sheets: Vec<String>,
}

impl BrandWorkbook {
    pub fn new() -> Self {
        Self {
            workbook: Workbook::new(),
            header: Format::new().set_bold().set_border(FormatBorder::Thin),
            date: Format::new().set_num_format("yyyy-mm-dd"),
            timestamp: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
            sheets: Vec::new(),
        }
    }

    /// Names of the sheets added so far, in order.
    pub fn sheet_names(&self) -> &[String] {
        &self.sheets
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Adds `table` as a new sheet: a header row, then one row per record.
    pub fn add_table(&mut self, name: &str, table: &Table) -> Result<()> {
        if name.chars().count() > MAX_SHEET_NAME {
            bail!("Sheet name '{name}' is longer than {MAX_SHEET_NAME} characters");
        }
        if self.sheets.iter().any(|s| s.eq_ignore_ascii_case(name)) {
            bail!("Sheet name '{name}' is already used");
        }
        if table.len() + 1 > MAX_SHEET_ROWS {
            bail!(
                "Sheet {} would need {} rows, more than the {} a worksheet holds",
                name,
                table.len() + 1,
                MAX_SHEET_ROWS
            );
        }

        let sheet = self.workbook.add_worksheet();
        sheet.set_name(name)?;

        for (col, title) in table.columns().iter().enumerate() {
            sheet.write_string_with_format(0, col_num(col)?, title, &self.header)?;
        }
        for (r, row) in table.rows().iter().enumerate() {
            let row_num = u32::try_from(r + 1)?;
            for (c, cell) in row.iter().enumerate() {
                write_cell(sheet, row_num, col_num(c)?, cell, &self.date, &self.timestamp)
                    .with_context(|| format!("Cannot write {name} row {}", r + 1))?;
            }
        }

        debug!(sheet = name, rows = table.len(), "Sheet added");
        self.sheets.push(name.to_string());
        Ok(())
    }

    /// Writes the workbook to `path`. A workbook without sheets is refused.
    pub fn save(mut self, path: &Path) -> Result<()> {
        if self.sheets.is_empty() {
            bail!("Refusing to save {} without any sheets", path.display());
        }
        self.workbook
            .save(path)
            .with_context(|| format!("Cannot save workbook {}", path.display()))
    }
}

impl Default for BrandWorkbook {
    fn default() -> Self {
        Self::new()
    }
}

fn col_num(col: usize) -> Result<u16> {
    Ok(u16::try_from(col)?)
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    date: &Format,
    timestamp: &Format,
) -> Result<()> {
    match cell {
        Cell::Null => {}
        Cell::Text(s) => {
            sheet.write_string(row, col, s)?;
        }
        Cell::Number(d) => match d.to_f64() {
            Some(n) => {
                sheet.write_number(row, col, n)?;
            }
            None => {
                sheet.write_string(row, col, d.to_string())?;
            }
        },
        Cell::Float(f) if !f.is_finite() => {}
        Cell::Float(f) => {
            sheet.write_number(row, col, *f)?;
        }
        Cell::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Cell::Date(d) => {
            sheet.write_datetime_with_format(row, col, d, date)?;
        }
        Cell::Timestamp(t) => {
            sheet.write_datetime_with_format(row, col, t, timestamp)?;
        }
    }
    Ok(())
}
