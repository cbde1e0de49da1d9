//! Channel-level roll-up of raw distribution-cost rows.

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

use crate::table::{Cell, Table};

/// Monetary columns summed per group, in output order.
pub const MONETARY_COLUMNS: [&str; 11] = [
    "RYT",
    "LGT_CST",
    "STRG_CST",
    "CARD_CMS",
    "SHOP_RNT",
    "SHOP_DEPRC_CST",
    "ALNC_ONLN_CMS",
    "SM_CMS",
    "DF_SALE_STFF_CMS",
    "DMGMT_SALE_STFF_CMS",
    "DSTRB_CMS",
];

/// Suffix of the derived millions-of-won columns.
pub const MILLIONS_SUFFIX: &str = "_MIL";

const MILLION: i64 = 1_000_000;

/// Converts an amount to millions, rounded half-to-even to a whole number.
pub fn to_millions(amount: Decimal) -> Decimal {
    (amount / Decimal::from(MILLION)).round_dp(0)
}

/// Groups `raw` by `group_by` and sums every [`MONETARY_COLUMNS`] entry.
///
/// The result holds the key columns, the sums, then one `<col>_MIL` column
/// per sum. Groups come out sorted by key. Rows with a NULL key are left out
/// and NULL amounts count as zero.
pub fn summarize(raw: &Table, group_by: &[&str]) -> Result<Table> {
    let key_idx = indices(raw, group_by)?;
    let value_idx = indices(raw, &MONETARY_COLUMNS)?;

    let mut groups: BTreeMap<Vec<GroupKey>, Vec<Decimal>> = BTreeMap::new();
    let mut skipped = 0usize;

    for (row_no, row) in raw.rows().iter().enumerate() {
        let Some(key) = key_idx
            .iter()
            .map(|&i| GroupKey::from_cell(&row[i]))
            .collect::<Option<Vec<_>>>()
        else {
            skipped += 1;
            continue;
        };

        let sums = groups
            .entry(key)
            .or_insert_with(|| vec![Decimal::ZERO; value_idx.len()]);

        for (sum, &i) in sums.iter_mut().zip(&value_idx) {
            if let Some(amount) = amount(&row[i])
                .with_context(|| format!("Row {} column {}", row_no + 1, raw.columns()[i]))?
            {
                *sum += amount;
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "Rows without a complete group key left out of summary");
    }

    let columns = group_by
        .iter()
        .map(|c| c.to_string())
        .chain(MONETARY_COLUMNS.iter().map(|c| c.to_string()))
        .chain(MONETARY_COLUMNS.iter().map(|c| format!("{c}{MILLIONS_SUFFIX}")))
        .collect();

    let rows = groups
        .into_iter()
        .map(|(key, sums)| {
            let millions: Vec<Cell> = sums.iter().map(|s| Cell::Number(to_millions(*s))).collect();
            key.into_iter()
                .map(GroupKey::into_cell)
                .chain(sums.into_iter().map(Cell::Number))
                .chain(millions)
                .collect()
        })
        .collect();

    Ok(Table::new(columns, rows))
}

/// A non-NULL grouping value. Numbers order numerically and before text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Number(Decimal),
    Text(String),
}

impl GroupKey {
    fn from_cell(cell: &Cell) -> Option<Self> {
        match cell {
            Cell::Number(d) => Some(GroupKey::Number(*d)),
            Cell::Float(f) => Decimal::from_f64(*f).map(GroupKey::Number),
            other => other.key().map(GroupKey::Text),
        }
    }

    fn into_cell(self) -> Cell {
        match self {
            GroupKey::Number(d) => Cell::Number(d),
            GroupKey::Text(s) => Cell::Text(s),
        }
    }
}

fn indices(table: &Table, names: &[&str]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            table
                .column_index(name)
                .with_context(|| format!("Column {name} missing from result"))
        })
        .collect()
}

fn amount(cell: &Cell) -> Result<Option<Decimal>> {
    match cell {
        Cell::Null => Ok(None),
        Cell::Number(d) => Ok(Some(*d)),
        Cell::Float(f) if f.is_nan() => Ok(None),
        Cell::Float(f) => Decimal::from_f64(*f)
            .map(Some)
            .with_context(|| format!("{f} cannot be summed as a decimal")),
        Cell::Text(s) => Decimal::from_str(s.trim())
            .map(Some)
            .with_context(|| format!("'{s}' is not a number")),
        other => bail!("{other:?} is not a monetary amount"),
    }
}
