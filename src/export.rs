use crate::errors::BackendError;
use crate::snapshot::CellValue;
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;

/// Relocated record as posted to the export endpoint.
#[derive(Debug, Serialize)]
pub struct ExportRecord<'a> {
    pub list: &'a str,
    pub row: u32,
    pub cells: &'a [CellValue],
}

/// Posts a relocated record to an external service after the sheet move.
///
/// Export failure never rolls back the sheet; it only qualifies the terminal
/// report, mirroring how the sheet update and the upload are independent
/// steps with independent failure modes.
pub struct RecordExporter {
    http: Client,
    endpoint: String,
    label: String,
    timeout_ms: u64,
}

impl RecordExporter {
    pub fn new(
        endpoint: impl Into<String>,
        label: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::write(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            label: label.into(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn export(&self, row: u32, cells: &[CellValue]) -> Result<(), BackendError> {
        let record = ExportRecord {
            list: &self.label,
            row,
            cells,
        };
        let response = self
            .http
            .post(&self.endpoint)
            .json(&record)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout {
                        operation: "export",
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    BackendError::write(format!("export: {e}"))
                }
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::write(format!(
                "export endpoint returned {status}"
            )));
        }
        tracing::debug!(row, "record exported");
        Ok(())
    }
}
