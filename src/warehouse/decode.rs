//! Conversion of Snowflake's JSON result encoding into typed [`Cell`]s.
//!
//! Values arrive as strings. Dates are days since the epoch and timestamps
//! are epoch seconds with a fractional part; `TIMESTAMP_TZ` appends an
//! offset after a space.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use flate2::read::GzDecoder;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::io::Read;
use std::str::FromStr;

use super::protocol::RowType;
use crate::table::{Cell, Table};

/// Day number of 1970-01-01 counted from 0001-01-01 (day 1).
const UNIX_EPOCH_CE_DAYS: i32 = 719_163;

pub(crate) type RawRow = Vec<Option<String>>;

pub(crate) fn decode_table(rowtype: &[RowType], rows: Vec<RawRow>) -> Result<Table> {
    let columns = rowtype.iter().map(|c| c.name.clone()).collect();
    let rows = rows
        .into_iter()
        .enumerate()
        .map(|(n, row)| {
            row.into_iter()
                .zip(rowtype)
                .map(|(raw, column)| {
                    decode_cell(&column.kind, raw).with_context(|| {
                        format!("Cannot decode row {} column {}", n + 1, column.name)
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Table::new(columns, rows))
}

pub(crate) fn decode_cell(kind: &str, raw: Option<String>) -> Result<Cell> {
    let Some(raw) = raw else {
        return Ok(Cell::Null);
    };

    let cell = match kind.to_ascii_lowercase().as_str() {
        "fixed" => Cell::Number(Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw))?),
        "real" => Cell::Float(raw.parse()?),
        "boolean" => Cell::Bool(matches!(raw.as_str(), "1" | "true" | "TRUE" | "True")),
        "date" => Cell::Date(date_from_days(&raw)?),
        "timestamp_ntz" | "timestamp_ltz" | "timestamp_tz" => {
            let epoch = raw.split_whitespace().next().unwrap_or_default();
            Cell::Timestamp(timestamp_from_epoch(epoch)?)
        }
        _ => Cell::Text(raw),
    };
    Ok(cell)
}

fn date_from_days(raw: &str) -> Result<NaiveDate> {
    let days: i32 = raw.parse()?;
    days.checked_add(UNIX_EPOCH_CE_DAYS)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| anyhow!("date {raw} out of range"))
}

fn timestamp_from_epoch(raw: &str) -> Result<NaiveDateTime> {
    let value = Decimal::from_str(raw)?;
    let secs = value.floor();
    let nanos = ((value - secs) * Decimal::from(1_000_000_000)).round();
    secs.to_i64()
        .zip(nanos.to_u32())
        .and_then(|(s, n)| DateTime::from_timestamp(s, n))
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| anyhow!("timestamp {raw} out of range"))
}

/// Parses a downloaded result chunk: a comma-separated run of JSON row
/// arrays, possibly gzip-compressed.
pub(crate) fn decode_chunk(bytes: &[u8]) -> Result<Vec<RawRow>> {
    let text = if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut text = String::new();
        GzDecoder::new(bytes)
            .read_to_string(&mut text)
            .context("Cannot decompress result chunk")?;
        text
    } else {
        String::from_utf8(bytes.to_vec()).context("Result chunk is not UTF-8")?
    };

    let body = text.trim().trim_end_matches(',');
    serde_json::from_str(&format!("[{body}]")).context("Result chunk is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_decode_fixed_keeps_exact_value() {
        assert_eq!(
            decode_cell("fixed", s("123456789012.34")).unwrap(),
            Cell::Number(Decimal::new(12345678901234, 2))
        );
    }

    #[test]
    fn test_decode_null_for_any_type() {
        for kind in ["fixed", "text", "date", "boolean"] {
            assert_eq!(decode_cell(kind, None).unwrap(), Cell::Null);
        }
    }

    #[test]
    fn test_decode_date() {
        assert_eq!(
            decode_cell("date", s("0")).unwrap(),
            Cell::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
        );
        assert_eq!(
            decode_cell("date", s("19723")).unwrap(),
            Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_decode_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_milli_opt(0, 0, 1, 500)
            .unwrap();

        assert_eq!(
            decode_cell("timestamp_ntz", s("1704067201.500000000")).unwrap(),
            Cell::Timestamp(expected)
        );
        assert_eq!(
            decode_cell("timestamp_tz", s("1704067201.500000000 1980")).unwrap(),
            Cell::Timestamp(expected)
        );
    }

    #[test]
    fn test_decode_boolean_real_and_text() {
        assert_eq!(decode_cell("boolean", s("1")).unwrap(), Cell::Bool(true));
        assert_eq!(decode_cell("boolean", s("0")).unwrap(), Cell::Bool(false));
        assert_eq!(decode_cell("real", s("0.25")).unwrap(), Cell::Float(0.25));
        assert_eq!(decode_cell("text", s("온라인")).unwrap(), Cell::from("온라인"));
        assert_eq!(decode_cell("variant", s("{}")).unwrap(), Cell::from("{}"));
    }

    #[test]
    fn test_decode_bad_number() {
        assert!(decode_cell("fixed", s("abc")).is_err());
    }

    #[test]
    fn test_decode_table_names_failing_column() {
        let rowtype = vec![RowType {
            name: "RYT".into(),
            kind: "fixed".into(),
        }];
        let err = decode_table(&rowtype, vec![vec![s("1")], vec![s("x")]]).unwrap_err();
        assert_eq!(err.to_string(), "Cannot decode row 2 column RYT");
    }

    #[test]
    fn test_decode_chunk_plain() {
        let rows = decode_chunk(br#"["a","1"],
["b",null]"#)
            .unwrap();
        assert_eq!(rows, vec![vec![s("a"), s("1")], vec![s("b"), None]]);
    }

    #[test]
    fn test_decode_chunk_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"["x"],["y"],"#).unwrap();
        let compressed = encoder.finish().unwrap();

        let rows = decode_chunk(&compressed).unwrap();
        assert_eq!(rows, vec![vec![s("x")], vec![s("y")]]);
    }

    #[test]
    fn test_decode_empty_chunk() {
        assert!(decode_chunk(b"").unwrap().is_empty());
    }
}
