//! Hosted spreadsheet destination (Google Sheets v4 REST).
//!
//! # Responsibility
//! - Read values of the configured sheet region.
//! - Read true merge metadata of the sheet.
//! - Write numeric values cell by cell.
//!
//! # Invariants
//! - No retries; any transport or non-success status is `Connectivity`.
//! - Cell writes are independent: one failing cell never stops the rest.

use super::{
    CellWrite, CellWriteFailure, CellWriteReport, SurfaceError, SurfaceKind, SurfaceResult,
    TabularSurface,
};
use crate::model::cell::{CellRange, CellRef, CellValue};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::{Client, Response};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

static SPREADSHEET_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").expect("valid spreadsheet url regex")
});

/// Extracts the document id from a spreadsheet share URL.
///
/// A bare id (no `/`) is returned unchanged.
pub fn spreadsheet_id_from_url(input: &str) -> Option<String> {
    let input = input.trim();
    if let Some(captures) = SPREADSHEET_URL_RE.captures(input) {
        return Some(captures[1].to_string());
    }
    let bare = !input.is_empty()
        && input
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    bare.then(|| input.to_string())
}

/// Connection settings for one remote sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSheetConfig {
    pub api_base: String,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub access_token: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateValuesResponse {
    #[serde(default)]
    updated_cells: u64,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
    #[serde(default)]
    merges: Vec<GridRange>,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// Zero-based, end-exclusive grid range as the API reports it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridRange {
    #[serde(default)]
    start_row_index: u32,
    #[serde(default)]
    end_row_index: u32,
    #[serde(default)]
    start_column_index: u32,
    #[serde(default)]
    end_column_index: u32,
}

impl GridRange {
    fn to_cell_range(&self) -> Option<CellRange> {
        if self.end_row_index <= self.start_row_index
            || self.end_column_index <= self.start_column_index
        {
            return None;
        }
        Some(CellRange::new(
            CellRef::new(self.start_row_index + 1, self.start_column_index + 1),
            CellRef::new(self.end_row_index, self.end_column_index),
        ))
    }
}

fn json_to_cell(value: &Value) -> CellValue {
    match value {
        Value::String(text) => CellValue::from(text.as_str()),
        Value::Number(number) => number.as_f64().map_or(CellValue::Empty, CellValue::Number),
        Value::Bool(flag) => CellValue::Bool(*flag),
        _ => CellValue::Empty,
    }
}

/// One sheet of a hosted spreadsheet document.
pub struct RemoteSheetSurface {
    client: Client,
    config: RemoteSheetConfig,
}

impl RemoteSheetSurface {
    pub fn new(config: RemoteSheetConfig) -> SurfaceResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| SurfaceError::Connectivity(format!("http client: {err}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RemoteSheetConfig {
        &self.config
    }

    fn url(&self, segments: &[&str]) -> SurfaceResult<Url> {
        let mut url = Url::parse(&self.config.api_base).map_err(|err| {
            SurfaceError::Connectivity(format!("api base `{}`: {err}", self.config.api_base))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                SurfaceError::Connectivity(format!(
                    "api base `{}` cannot carry a path",
                    self.config.api_base
                ))
            })?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.config.spreadsheet_id)
            .extend(segments);
        Ok(url)
    }

    fn get<T: DeserializeOwned>(&self, url: Url) -> SurfaceResult<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.access_token)
            .send()
            .map_err(|err| SurfaceError::Connectivity(err.to_string()))?;
        Self::handle_response(response)
    }

    fn handle_response<T: DeserializeOwned>(response: Response) -> SurfaceResult<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .map_err(|err| SurfaceError::Connectivity(format!("decode response: {err}")));
        }
        let body = response.text().unwrap_or_default();
        Err(SurfaceError::Connectivity(format!(
            "status {}: {}",
            status.as_u16(),
            body.trim()
        )))
    }

    fn update_cell(&self, write: &CellWrite) -> SurfaceResult<u64> {
        let range = CellRange::single(write.cell).qualified(&self.config.sheet_name);
        let mut url = self.url(&["values", &range])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[write.value]],
        });
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .map_err(|err| SurfaceError::Connectivity(err.to_string()))?;
        let updated: UpdateValuesResponse = Self::handle_response(response)?;
        Ok(updated.updated_cells)
    }
}

impl TabularSurface for RemoteSheetSurface {
    fn describe(&self) -> String {
        format!("sheets:{}[{}]", self.config.spreadsheet_id, self.config.sheet_name)
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Service
    }

    fn read_range(&self, range: &CellRange) -> SurfaceResult<Vec<Vec<CellValue>>> {
        let qualified = range.qualified(&self.config.sheet_name);
        let url = self.url(&["values", &qualified])?;
        let payload: ValueRange = self.get(url)?;
        debug!(
            "event=sheet_read module=surface status=ok range={} rows={}",
            qualified,
            payload.values.len()
        );
        Ok(payload
            .values
            .iter()
            .map(|row| row.iter().map(json_to_cell).collect())
            .collect())
    }

    fn merged_blocks(&self) -> SurfaceResult<Vec<CellRange>> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets(properties(title),merges)");
        let meta: SpreadsheetMeta = self.get(url)?;
        let sheet = meta
            .sheets
            .into_iter()
            .find(|sheet| sheet.properties.title == self.config.sheet_name)
            .ok_or_else(|| SurfaceError::SheetNotFound(self.config.sheet_name.clone()))?;
        Ok(sheet
            .merges
            .iter()
            .filter_map(GridRange::to_cell_range)
            .collect())
    }

    fn write_cells(&mut self, writes: &[CellWrite]) -> SurfaceResult<CellWriteReport> {
        let mut report = CellWriteReport::default();
        for write in writes {
            match self.update_cell(write) {
                Ok(_) => report.written += 1,
                Err(err) => {
                    warn!(
                        "event=sheet_write module=surface status=error cell={} error={}",
                        write.cell, err
                    );
                    report.failures.push(CellWriteFailure {
                        cell: write.cell,
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}
