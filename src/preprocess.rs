//! Cleaning of the community spreadsheet export (one row per player per week).
//!
//! Steps run in a fixed order: column selection, identity validation, last-wins
//! de-duplication, then best-effort numeric coercion of every price cell.

use std::collections::HashSet;
use std::io::Read;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::observation::{WeekdaySlot, SELLING_SLOTS};

pub const PLAYER_NAME_COLUMN: &str = "In-Game Name";
pub const ISLAND_NAME_COLUMN: &str = "Island";
pub const BUY_PRICE_COLUMN: &str = "Buy Price";
pub const SELL_PRICE_COLUMNS: [&str; 12] = [
    "Mon AM", "Mon PM", "Tue AM", "Tue PM", "Wed AM", "Wed PM", "Thu AM", "Thu PM", "Fri AM",
    "Fri PM", "Sat AM", "Sat PM",
];

const PRICE_COLUMN_COUNT: usize = 13;
const MISSING_TOKENS: [&str; 10] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "#N/A",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("raw export is missing required columns: {missing:?}")]
pub struct SchemaError {
    pub missing: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("price cell '{raw}' is not numeric")]
struct ConversionError {
    raw: String,
}

/// Untyped export as read from disk; `None` marks an empty or NA cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// A row restricted to the known columns, buy price first then the sell slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedRow {
    pub player_name: Option<String>,
    pub island_name: Option<String>,
    pub prices: [Option<String>; PRICE_COLUMN_COUNT],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifiedRow {
    pub player_name: String,
    pub island_name: String,
    pub prices: [Option<String>; PRICE_COLUMN_COUNT],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessedRecord {
    pub player_name: String,
    pub island_name: String,
    pub buy_price: Option<f64>,
    pub sell_prices: [Option<f64>; 12],
}

impl PreprocessedRecord {
    /// Sell prices paired with the weekday slot each column represents.
    pub fn sell_slots(&self) -> impl Iterator<Item = (WeekdaySlot, Option<f64>)> + '_ {
        SELLING_SLOTS.iter().copied().zip(self.sell_prices.iter().copied())
    }
}

pub fn read_raw_export<R: Read>(reader: R) -> Result<RawTable, PreprocessError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(
            (0..headers.len())
                .map(|idx| record.get(idx).and_then(cell_value))
                .collect(),
        );
    }

    Ok(RawTable { headers, rows })
}

/// Keeps exactly the identity, buy and sell columns. Names match case-sensitively.
pub fn select_columns(table: &RawTable) -> Result<Vec<SelectedRow>, SchemaError> {
    let required = required_columns();
    let mut indices = Vec::with_capacity(required.len());
    let mut missing = Vec::new();
    for name in &required {
        match table.headers.iter().position(|header| header == name) {
            Some(idx) => indices.push(idx),
            None => missing.push((*name).to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(SchemaError { missing });
    }

    let cell = |row: &[Option<String>], column: usize| -> Option<String> {
        row.get(indices[column]).cloned().flatten()
    };

    Ok(table
        .rows
        .iter()
        .map(|row| SelectedRow {
            player_name: cell(row, 0),
            island_name: cell(row, 1),
            prices: std::array::from_fn(|idx| cell(row, idx + 2)),
        })
        .collect())
}

pub fn filter_valid_identity(rows: Vec<SelectedRow>) -> Vec<IdentifiedRow> {
    rows.into_iter()
        .filter_map(|row| match (row.player_name, row.island_name) {
            (Some(player_name), Some(island_name)) => Some(IdentifiedRow {
                player_name,
                island_name,
                prices: row.prices,
            }),
            _ => None,
        })
        .collect()
}

/// Keeps the last row per (player, island), preserving the order of the kept rows.
///
/// Works around known double submissions in the export (one player appears twice in
/// week 4); it is not a general merge policy for conflicting rows.
pub fn dedup_identity(rows: Vec<IdentifiedRow>) -> Vec<IdentifiedRow> {
    let mut seen = HashSet::new();
    let mut kept: Vec<IdentifiedRow> = rows
        .into_iter()
        .rev()
        .filter(|row| seen.insert((row.player_name.clone(), row.island_name.clone())))
        .collect();
    kept.reverse();
    kept
}

pub fn coerce_prices(rows: Vec<IdentifiedRow>) -> Vec<PreprocessedRecord> {
    rows.into_iter()
        .map(|row| {
            let prices: [Option<f64>; PRICE_COLUMN_COUNT] =
                std::array::from_fn(|idx| coerce_price(row.prices[idx].as_deref()));
            PreprocessedRecord {
                player_name: row.player_name,
                island_name: row.island_name,
                buy_price: prices[0],
                sell_prices: std::array::from_fn(|idx| prices[idx + 1]),
            }
        })
        .collect()
}

/// Numeric value of a cell, or `None` when missing or unparsable.
pub fn coerce_price(cell: Option<&str>) -> Option<f64> {
    match parse_price(cell?) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(
                component = "preprocess",
                event = "preprocess.price.unparsable",
                error = %err
            );
            None
        }
    }
}

pub fn preprocess_table(table: &RawTable) -> Result<Vec<PreprocessedRecord>, SchemaError> {
    let selected = select_columns(table)?;
    let input_rows = selected.len();
    let identified = filter_valid_identity(selected);
    let valid_rows = identified.len();
    let deduped = dedup_identity(identified);
    let records = coerce_prices(deduped);

    info!(
        component = "preprocess",
        event = "preprocess.finish",
        input_rows,
        invalid_identity_rows = input_rows - valid_rows,
        duplicate_rows = valid_rows - records.len(),
        output_rows = records.len()
    );

    Ok(records)
}

pub fn preprocess<R: Read>(reader: R) -> Result<Vec<PreprocessedRecord>, PreprocessError> {
    let table = read_raw_export(reader)?;
    Ok(preprocess_table(&table)?)
}

fn required_columns() -> Vec<&'static str> {
    let mut columns = vec![PLAYER_NAME_COLUMN, ISLAND_NAME_COLUMN, BUY_PRICE_COLUMN];
    columns.extend(SELL_PRICE_COLUMNS);
    columns
}

fn cell_value(raw: &str) -> Option<String> {
    if MISSING_TOKENS.contains(&raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

fn parse_price(raw: &str) -> Result<f64, ConversionError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if !value.is_nan() => Ok(value),
        _ => Err(ConversionError {
            raw: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_line() -> String {
        required_columns().join(",")
    }

    fn row(player: Option<&str>, island: Option<&str>, buy: &str) -> Vec<Option<String>> {
        let mut cells = vec![player.map(str::to_string), island.map(str::to_string)];
        cells.push(Some(buy.to_string()));
        cells.extend((0..12).map(|idx| Some(format!("{}", 50 + idx))));
        cells
    }

    fn table(rows: Vec<Vec<Option<String>>>) -> RawTable {
        RawTable {
            headers: required_columns().into_iter().map(str::to_string).collect(),
            rows,
        }
    }

    #[test]
    fn coerce_price_falls_back_to_missing() {
        let coerced: Vec<Option<f64>> = [Some("100"), Some("abc"), None]
            .into_iter()
            .map(coerce_price)
            .collect();
        assert_eq!(coerced, vec![Some(100.0), None, None]);
        assert_eq!(coerce_price(Some(" 97.5 ")), Some(97.5));
        assert_eq!(coerce_price(Some("nan")), None);
    }

    #[test]
    fn select_columns_reports_every_missing_column() {
        let raw = RawTable {
            headers: vec![
                "In-Game Name".to_string(),
                "island".to_string(),
                "Buy Price".to_string(),
            ],
            rows: Vec::new(),
        };
        let err = select_columns(&raw).unwrap_err();
        assert_eq!(err.missing.len(), 13);
        assert_eq!(err.missing[0], "Island");
        assert_eq!(err.missing[1], "Mon AM");
    }

    #[test]
    fn select_columns_drops_extra_and_reorders() {
        let raw = RawTable {
            headers: std::iter::once("Timestamp".to_string())
                .chain(required_columns().into_iter().rev().map(str::to_string))
                .collect(),
            rows: vec![std::iter::once(Some("2020-04-13".to_string()))
                .chain((0..15).rev().map(|idx| Some(idx.to_string())))
                .collect()],
        };
        let selected = select_columns(&raw).unwrap();
        assert_eq!(selected[0].player_name.as_deref(), Some("0"));
        assert_eq!(selected[0].island_name.as_deref(), Some("1"));
        assert_eq!(selected[0].prices[0].as_deref(), Some("2"));
        assert_eq!(selected[0].prices[12].as_deref(), Some("14"));
    }

    #[test]
    fn rows_without_identity_are_removed() {
        let rows = select_columns(&table(vec![
            row(Some("Ana"), Some("Pine"), "95"),
            row(None, Some("Pine"), "96"),
            row(Some("Bo"), None, "97"),
        ]))
        .unwrap();
        let valid = filter_valid_identity(rows);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].player_name, "Ana");
    }

    #[test]
    fn duplicates_keep_last_occurrence_in_place() {
        let rows = filter_valid_identity(
            select_columns(&table(vec![
                row(Some("Lala"), Some("Hyazinth"), "90"),
                row(Some("Ana"), Some("Pine"), "95"),
                row(Some("Lala"), Some("Hyazinth"), "101"),
                row(Some("Lala"), Some("Other"), "102"),
            ]))
            .unwrap(),
        );
        let deduped = dedup_identity(rows);
        let summary: Vec<(&str, &str, Option<&str>)> = deduped
            .iter()
            .map(|r| {
                (
                    r.player_name.as_str(),
                    r.island_name.as_str(),
                    r.prices[0].as_deref(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Ana", "Pine", Some("95")),
                ("Lala", "Hyazinth", Some("101")),
                ("Lala", "Other", Some("102")),
            ]
        );
    }

    #[test]
    fn sell_columns_map_onto_selling_slots() {
        for (column, slot) in SELL_PRICE_COLUMNS.iter().zip(SELLING_SLOTS) {
            assert_eq!(WeekdaySlot::from_short_label(column).unwrap(), slot);
        }
    }

    #[test]
    fn preprocess_reads_csv_end_to_end() {
        let csv = format!(
            "Timestamp,{}\n\
             t1,Ana,Pine,95,100,abc,,NA,1,2,3,4,5,6,7,8\n\
             t2,,Pine,95,1,1,1,1,1,1,1,1,1,1,1,1\n\
             t3,Ana,Pine,99,120,121,122,123,124,125,126,127,128,129,130,131\n",
            header_line()
        );
        let records = preprocess(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.buy_price, Some(99.0));
        assert_eq!(record.sell_prices[0], Some(120.0));
        assert_eq!(
            record.sell_slots().last(),
            Some(("Saturday PM".parse::<WeekdaySlot>().unwrap(), Some(131.0)))
        );

        let first_only = format!(
            "Timestamp,{}\nt1,Ana,Pine,95,100,abc,,NA,1,2,3,4,5,6,7,8\n",
            header_line()
        );
        let records = preprocess(first_only.as_bytes()).unwrap();
        assert_eq!(&records[0].sell_prices[..4], &[Some(100.0), None, None, None]);
    }

    #[test]
    fn preprocess_surfaces_schema_errors() {
        let err = preprocess("Name,Island\nAna,Pine\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PreprocessError::Schema(_)));
    }
}
