//! CSV ingestion: detects the dataset shape from the header row, validates
//! required columns, and normalizes every row into the common `Record`
//! model. Per-row parse failures are counted and skipped; missing columns
//! are fatal for the affected view.

use crate::columns::wide_value_columns;
use crate::error::DataError;
use crate::types::{Period, Record, Site, SiteChoice, Table};
use crate::util::{parse_date_safe, parse_f64_safe, parse_i32_safe, parse_u32_safe};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Crisis factor applied when a long-format file carries no `value_crise`
/// column. The observed datasets simulate a +70% load.
pub const DEFAULT_CRISIS_FACTOR: f64 = 0.70;

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_records: usize,
    pub parse_errors: usize,
    /// True when `value_crise` was absent and derived from `value`.
    pub derived_crisis: bool,
}

/// A loaded table together with its load diagnostics. Shared read-only for
/// the rest of the process.
#[derive(Debug)]
pub struct LoadedTable {
    pub table: Table,
    pub report: LoadReport,
}

/// Long-format row: daily or monthly granularity, one site per row. The
/// `dow` column of daily files is ignored; the weekday is derived from the
/// date instead.
#[derive(Debug, Deserialize)]
struct RawLongRow {
    year: Option<String>,
    month: Option<String>,
    date: Option<String>,
    site_code: Option<String>,
    indicateur: Option<String>,
    sous_indicateur: Option<String>,
    unite: Option<String>,
    value: Option<String>,
    value_crise: Option<String>,
}

pub fn load(path: &Path) -> Result<LoadedTable, DataError> {
    let file = File::open(path)?;
    load_from_reader(file)
}

pub fn load_from_reader<R: Read>(rdr: R) -> Result<LoadedTable, DataError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(rdr);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().any(|h| h == "INDICATEUR") {
        load_wide(&mut reader, &headers)
    } else if headers.iter().any(|h| h == "indicateur") {
        load_long(&mut reader, &headers)
    } else {
        Err(DataError::UnknownLayout(headers.join(",")))
    }
}

fn require_columns(headers: &[String], required: &[&str]) -> Result<(), DataError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataError::Schema(missing))
    }
}

fn load_long<R: Read>(
    reader: &mut csv::Reader<R>,
    headers: &[String],
) -> Result<LoadedTable, DataError> {
    require_columns(
        headers,
        &["year", "site_code", "indicateur", "sous_indicateur", "unite", "value"],
    )?;
    let has_crisis_col = headers.iter().any(|h| h == "value_crise");

    let mut report = LoadReport {
        derived_crisis: !has_crisis_col,
        ..LoadReport::default()
    };
    let mut table: Table = Vec::new();

    for result in reader.deserialize::<RawLongRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                report.parse_errors += 1;
                continue;
            }
        };

        let year = match parse_i32_safe(row.year.as_deref()) {
            Some(y) => y,
            None => {
                report.parse_errors += 1;
                continue;
            }
        };
        let site = match row.site_code.as_deref().and_then(Site::from_code) {
            Some(s) => s,
            None => {
                report.parse_errors += 1;
                continue;
            }
        };
        let value_normal = match parse_f64_safe(row.value.as_deref()) {
            Some(v) => v,
            None => {
                report.parse_errors += 1;
                continue;
            }
        };
        let value_crisis = if has_crisis_col {
            match parse_f64_safe(row.value_crise.as_deref()) {
                Some(v) => v,
                None => {
                    report.parse_errors += 1;
                    continue;
                }
            }
        } else {
            value_normal * (1.0 + DEFAULT_CRISIS_FACTOR)
        };

        // Daily rows carry a date; monthly rows only a month number. The
        // finest present column wins.
        let period = if let Some(d) = parse_date_safe(row.date.as_deref()) {
            Period::Day(d)
        } else if let Some(m) = parse_u32_safe(row.month.as_deref()) {
            if !(1..=12).contains(&m) {
                report.parse_errors += 1;
                continue;
            }
            Period::Month(year, m)
        } else {
            Period::Year(year)
        };

        table.push(Record {
            period,
            site,
            indicator: row.indicateur.unwrap_or_default().trim().to_string(),
            sub_indicator: row.sous_indicateur.unwrap_or_default().trim().to_string(),
            unit: row.unite.unwrap_or_default().trim().to_string(),
            value_normal,
            value_crisis,
        });
    }

    report.loaded_records = table.len();
    Ok(LoadedTable { table, report })
}

fn column_index(headers: &[String], name: &str) -> Result<usize, DataError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| DataError::Schema(vec![name.to_string()]))
}

/// The wide file is read by header position through the column selector.
/// The `TOTAL_*` columns are deliberately not read: TOTAL is always
/// recomputed as PLF + CFX.
fn load_wide<R: Read>(
    reader: &mut csv::Reader<R>,
    headers: &[String],
) -> Result<LoadedTable, DataError> {
    require_columns(
        headers,
        &[
            "ANNEE",
            "INDICATEUR",
            "SOUS-INDICATEUR",
            "UNITE",
            "PLF_NORMAL",
            "PLF_CRISE",
            "CFX_NORMAL",
            "CFX_CRISE",
        ],
    )?;

    let annee_idx = column_index(headers, "ANNEE")?;
    let indicateur_idx = column_index(headers, "INDICATEUR")?;
    let sous_idx = column_index(headers, "SOUS-INDICATEUR")?;
    let unite_idx = column_index(headers, "UNITE")?;
    let mut site_cols: Vec<(Site, usize, usize)> = Vec::new();
    for (site, choice) in [(Site::Plf, SiteChoice::Plf), (Site::Cfx, SiteChoice::Cfx)] {
        let (normal_col, crisis_col) = wide_value_columns(choice);
        site_cols.push((
            site,
            column_index(headers, normal_col)?,
            column_index(headers, crisis_col)?,
        ));
    }

    let mut report = LoadReport::default();
    let mut table: Table = Vec::new();

    for result in reader.records() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                report.parse_errors += 1;
                continue;
            }
        };

        let year = match parse_i32_safe(row.get(annee_idx)) {
            Some(y) => y,
            None => {
                report.parse_errors += 1;
                continue;
            }
        };
        let indicator = row.get(indicateur_idx).unwrap_or_default().trim().to_string();
        let sub_indicator = row.get(sous_idx).unwrap_or_default().trim().to_string();
        let unit = row.get(unite_idx).unwrap_or_default().trim().to_string();

        // One CSV row fans out into one record per site; the stored table
        // never contains a TOTAL row.
        let mut parsed: Vec<Record> = Vec::with_capacity(site_cols.len());
        for (site, normal_idx, crisis_idx) in &site_cols {
            let pair = (
                parse_f64_safe(row.get(*normal_idx)),
                parse_f64_safe(row.get(*crisis_idx)),
            );
            let (Some(value_normal), Some(value_crisis)) = pair else {
                parsed.clear();
                break;
            };
            parsed.push(Record {
                period: Period::Year(year),
                site: *site,
                indicator: indicator.clone(),
                sub_indicator: sub_indicator.clone(),
                unit: unit.clone(),
                value_normal,
                value_crisis,
            });
        }
        if parsed.is_empty() {
            report.parse_errors += 1;
            continue;
        }
        table.extend(parsed);
    }

    report.loaded_records = table.len();
    Ok(LoadedTable { table, report })
}

/// Process-lifetime memoization of loaded tables, keyed by path. There is
/// no invalidation: the datasets are near-static reference data, and a
/// changed file requires a restart. Kept as an explicit injectable object
/// so tests can isolate cache state per case.
#[derive(Default)]
pub struct DataCache {
    entries: Mutex<HashMap<PathBuf, Arc<LoadedTable>>>,
}

impl DataCache {
    pub fn new() -> DataCache {
        DataCache::default()
    }

    pub fn get_or_load(&self, path: &Path) -> Result<Arc<LoadedTable>, DataError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(loaded) = entries.get(path) {
            return Ok(Arc::clone(loaded));
        }
        let loaded = Arc::new(load(path)?);
        entries.insert(path.to_path_buf(), Arc::clone(&loaded));
        Ok(loaded)
    }
}
