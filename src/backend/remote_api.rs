use super::{RowSpan, SheetBackend, SheetSide, TransactionalBackend};
use crate::address::CellAddress;
use crate::errors::BackendError;
use crate::plan::FormulaUpdate;
use crate::snapshot::{CellValue, Row, TabularSnapshot};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::time::Duration;

/// Open-ended reads are capped rather than unbounded; the ledger sheets this
/// engine targets are far smaller.
const MAX_READ_ROW: u32 = 10_000;

/// One sheet within the remote spreadsheet, optionally pinned to a view.
#[derive(Debug, Clone)]
pub struct RemoteSheet {
    pub name: String,
    pub view_id: Option<String>,
}

impl RemoteSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            view_id: None,
        }
    }

    pub fn with_view(name: impl Into<String>, view_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            view_id: Some(view_id.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteApiConfig {
    pub base_url: String,
    pub spreadsheet_id: String,
    pub source: RemoteSheet,
    pub destination: RemoteSheet,
    pub call_timeout: Duration,
    /// Transparent retries for reads only; mutations are never retried
    /// because a replayed relocation would duplicate rows.
    pub read_retries: u32,
}

/// Spreadsheet access over a values/batchUpdate style HTTP API.
///
/// Each call may fail independently. The formula batch goes out as one atomic
/// request, but the row delete and row insert are two separate calls with no
/// cross-call transaction; a failure between them leaves the source row
/// deleted and the destination unpopulated, which callers see reported as a
/// partial outcome needing manual recovery.
pub struct RemoteApiBackend {
    http: Client,
    config: RemoteApiConfig,
}

impl RemoteApiBackend {
    pub fn new(config: RemoteApiConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(config.call_timeout)
            .build()
            .map_err(|e| BackendError::read(format!("failed to build http client: {e}")))?;
        Ok(Self { http, config })
    }

    fn sheet(&self, side: SheetSide) -> &RemoteSheet {
        match side {
            SheetSide::Source => &self.config.source,
            SheetSide::Destination => &self.config.destination,
        }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn values_url(&self, sheet: &RemoteSheet, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}!{}",
            self.base(),
            self.config.spreadsheet_id,
            sheet.name,
            range
        )
    }

    fn batch_url(&self) -> String {
        format!(
            "{}/spreadsheets/{}:batchUpdate",
            self.base(),
            self.config.spreadsheet_id
        )
    }

    fn values_batch_url(&self) -> String {
        format!(
            "{}/spreadsheets/{}/values:batchUpdate",
            self.base(),
            self.config.spreadsheet_id
        )
    }

    fn timeout_ms(&self) -> u64 {
        self.config.call_timeout.as_millis() as u64
    }

    fn read_error(&self, err: reqwest::Error, operation: &'static str) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                operation,
                timeout_ms: self.timeout_ms(),
            }
        } else {
            // Connection-level failures are worth one more try; anything the
            // server answered is classified by status below.
            BackendError::read_transient(format!("{operation}: {err}"))
        }
    }

    fn write_error(&self, err: reqwest::Error, operation: &'static str) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                operation,
                timeout_ms: self.timeout_ms(),
            }
        } else {
            BackendError::write(format!("{operation}: {err}"))
        }
    }

    fn fetch_values(&self, sheet: &RemoteSheet, range: &str) -> Result<Value, BackendError> {
        let url = self.values_url(sheet, range);
        let mut attempt = 0u32;
        loop {
            match self.try_fetch(&url, sheet) {
                Ok(body) => return Ok(body),
                Err(err) if err.is_transient_read() && attempt < self.config.read_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %err, "transient read failure, retrying");
                    std::thread::sleep(Duration::from_millis(200 * attempt as u64));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn try_fetch(&self, url: &str, sheet: &RemoteSheet) -> Result<Value, BackendError> {
        let mut request = self.http.get(url);
        if let Some(view) = &sheet.view_id {
            request = request.query(&[("viewId", view.as_str())]);
        }
        let response = request
            .send()
            .map_err(|e| self.read_error(e, "read_region"))?;
        let status = response.status();
        if !status.is_success() {
            let message = format!("read_region returned {status}");
            return if status.is_server_error() || status.as_u16() == 429 {
                Err(BackendError::read_transient(message))
            } else {
                Err(BackendError::read(message))
            };
        }
        response
            .json::<Value>()
            .map_err(|e| BackendError::read(format!("invalid read_region body: {e}")))
    }

    fn post_mutation(
        &self,
        url: &str,
        body: &Value,
        operation: &'static str,
    ) -> Result<(), BackendError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .map_err(|e| self.write_error(e, operation))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::write(format!("{operation} returned {status}")));
        }
        Ok(())
    }

    fn dimension_range(&self, sheet: &RemoteSheet, row: u32) -> Value {
        let mut range = json!({
            "dimension": "ROWS",
            "startIndex": row - 1,
            "endIndex": row,
        });
        match &sheet.view_id {
            Some(view) => range["sheetId"] = json!(view),
            None => range["sheetName"] = json!(sheet.name),
        }
        range
    }
}

fn parse_cell(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Number(n) => n
            .as_f64()
            .map(CellValue::Number)
            .unwrap_or_else(|| CellValue::Text(n.to_string())),
        Value::String(s) => CellValue::from_sheet_text(s),
        Value::Bool(b) => CellValue::Text(b.to_string()),
        other => CellValue::Text(other.to_string()),
    }
}

fn cell_to_json(value: &CellValue) -> Value {
    match value {
        CellValue::Text(s) => json!(s),
        CellValue::Number(n) => json!(n),
        CellValue::Empty => Value::Null,
    }
}

impl SheetBackend for RemoteApiBackend {
    fn name(&self) -> &'static str {
        "remote-api"
    }

    fn read_region(
        &mut self,
        side: SheetSide,
        span: RowSpan,
    ) -> Result<TabularSnapshot, BackendError> {
        let sheet = self.sheet(side).clone();
        let end = span.end.unwrap_or(MAX_READ_ROW);
        if span.start > end {
            return Ok(TabularSnapshot::default());
        }
        let range = format!("{}:{}", span.start, end);
        let body = self.fetch_values(&sheet, &range)?;

        let Some(values) = body.get("values").and_then(Value::as_array) else {
            return Ok(TabularSnapshot::default());
        };
        let rows = values
            .iter()
            .enumerate()
            .map(|(offset, row)| {
                let cells = row
                    .as_array()
                    .map(|cells| cells.iter().map(parse_cell).collect())
                    .unwrap_or_default();
                Row::new(span.start + offset as u32, cells)
            })
            .collect();
        Ok(TabularSnapshot::new(rows))
    }
}

impl TransactionalBackend for RemoteApiBackend {
    fn write_cell(
        &mut self,
        side: SheetSide,
        address: CellAddress,
        value: &CellValue,
    ) -> Result<(), BackendError> {
        let sheet = self.sheet(side).clone();
        let url = format!(
            "{}?valueInputOption=RAW",
            self.values_url(&sheet, &address.to_string())
        );
        let body = json!({
            "range": format!("{}!{}", sheet.name, address),
            "values": [[cell_to_json(value)]],
        });
        self.post_mutation(&url, &body, "write_cell")
    }

    fn insert_row(&mut self, side: SheetSide, row: u32) -> Result<(), BackendError> {
        if row == 0 {
            return Err(BackendError::write("row positions are 1-based"));
        }
        let sheet = self.sheet(side).clone();
        let body = json!({
            "requests": [{
                "insertDimension": {
                    "range": self.dimension_range(&sheet, row),
                    "inheritFromBefore": false,
                }
            }]
        });
        self.post_mutation(&self.batch_url(), &body, "insert_row")
    }

    fn delete_row(&mut self, side: SheetSide, row: u32) -> Result<(), BackendError> {
        if row == 0 {
            return Err(BackendError::write("row positions are 1-based"));
        }
        let sheet = self.sheet(side).clone();
        let body = json!({
            "requests": [{
                "deleteDimension": {
                    "range": self.dimension_range(&sheet, row),
                }
            }]
        });
        self.post_mutation(&self.batch_url(), &body, "delete_row")
    }

    fn batch_update_formulas(
        &mut self,
        side: SheetSide,
        updates: &[FormulaUpdate],
    ) -> Result<(), BackendError> {
        let sheet = self.sheet(side).clone();
        let data: Vec<Value> = updates
            .iter()
            .map(|update| {
                json!({
                    "range": format!("{}!{}", sheet.name, update.address),
                    "values": [[format!("={}", update.formula)]],
                })
            })
            .collect();
        let body = json!({
            "valueInputOption": "USER_ENTERED",
            "data": data,
        });
        self.post_mutation(&self.values_batch_url(), &body, "batch_update_formulas")
    }
}
