//! Spreadsheet input: turns the first sheet of a workbook, or a CSV file,
//! into [`BatchRecord`]s keyed by header names.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use creative_provisioner_core::batch::{
    BatchRecord, COLUMN_ADVERTISER_ID, COLUMN_CAMPAIGN_PERIOD, COLUMN_CREATIVE_NAME,
    COLUMN_PAYLOAD, COLUMN_PAYLOAD_ALIAS, COLUMN_TARGET_URL,
};
use tracing::info;

/// Positions of the known columns in the header row.
#[derive(Debug, Default)]
struct ColumnMap {
    advertiser_id: Option<usize>,
    creative_name: Option<usize>,
    campaign_period: Option<usize>,
    target_url: Option<usize>,
    payload_source: Option<usize>,
}

impl ColumnMap {
    fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut map = ColumnMap::default();
        for (index, header) in headers.iter().enumerate() {
            let slot = match header.as_ref().trim() {
                COLUMN_ADVERTISER_ID => &mut map.advertiser_id,
                COLUMN_CREATIVE_NAME => &mut map.creative_name,
                COLUMN_CAMPAIGN_PERIOD => &mut map.campaign_period,
                COLUMN_TARGET_URL => &mut map.target_url,
                COLUMN_PAYLOAD | COLUMN_PAYLOAD_ALIAS => &mut map.payload_source,
                _ => continue,
            };
            slot.get_or_insert(index);
        }
        map
    }

    fn is_empty(&self) -> bool {
        self.advertiser_id.is_none()
            && self.creative_name.is_none()
            && self.campaign_period.is_none()
            && self.target_url.is_none()
            && self.payload_source.is_none()
    }

    fn record(&self, cells: &[Option<String>]) -> BatchRecord {
        let cell = |index: Option<usize>| index.and_then(|i| cells.get(i).cloned().flatten());
        BatchRecord {
            advertiser_id: cell(self.advertiser_id),
            creative_name: cell(self.creative_name),
            campaign_period: cell(self.campaign_period),
            target_url: cell(self.target_url),
            payload_source: cell(self.payload_source),
        }
    }
}

/// Reads records from `path`, picking the reader by file extension.
///
/// Rows where every cell is blank are skipped. A file without any known
/// header yields no records.
pub fn read_records(path: &Path) -> Result<Vec<BatchRecord>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let records = match extension.as_str() {
        "csv" => read_csv(path)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path)?,
        other => bail!("Unsupported input file type {other:?}: expected .xlsx or .csv"),
    };
    info!(path = ?path, records = records.len(), "[TABLE] Input read");
    Ok(records)
}

fn read_csv(path: &Path) -> Result<Vec<BatchRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file {path:?}"))?;
    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(str::to_string)
        .collect();
    let columns = ColumnMap::from_headers(&headers);
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.context("Failed to read CSV row")?;
        let cells: Vec<Option<String>> = row
            .iter()
            .map(|c| Some(c.to_string()).filter(|c| !c.is_empty()))
            .collect();
        if cells.iter().all(Option::is_none) {
            continue;
        }
        records.push(columns.record(&cells));
    }
    Ok(records)
}

fn read_workbook(path: &Path) -> Result<Vec<BatchRecord>> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Failed to open workbook {path:?}"))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("Workbook {path:?} has no sheets"))?
        .with_context(|| format!("Failed to read first sheet of {path:?}"))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| cell_text(c).unwrap_or_default())
        .collect();
    let columns = ColumnMap::from_headers(&headers);
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    Ok(rows
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .filter(|cells| cells.iter().any(Option::is_some))
        .map(|cells| columns.record(&cells))
        .collect())
}

/// Text of a cell, `None` when blank. Whole numbers lose their `.0` so
/// numeric advertiser ids come out as typed.
pub fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    };
    Some(text).filter(|t| !t.is_empty())
}
