use crate::backend::{
    Backend, LocalFileBackend, RemoteApiBackend, RemoteApiConfig, RemoteSheet,
};
use crate::errors::RelocateError;
use crate::marker::{MarkerScan, MarkerSpec};
use crate::plan::AggregateFormulaSpec;
use crate::relocate::RelocationRules;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SOURCE_SHEET: &str = "Pending";
const DEFAULT_DEST_SHEET: &str = "Done";
const DEFAULT_IDENTITY_COLUMN: u32 = 1;
const DEFAULT_FIRST_DATA_ROW: u32 = 2;
const DEFAULT_DONE_DATA_START_ROW: u32 = 2;
const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_READ_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    LocalFile,
    RemoteApi,
    UiReplay,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::LocalFile => write!(f, "local-file"),
            BackendKind::RemoteApi => write!(f, "remote-api"),
            BackendKind::UiReplay => write!(f, "ui-replay"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "ledger-relocate",
    about = "Move a matching ledger row from the pending list to the done list and rewrite the running totals"
)]
pub struct CliArgs {
    /// Keyword searched case-insensitively in the identity column.
    pub keyword: String,

    /// YAML config file; CLI flags override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Workbook path for the local-file backend.
    #[arg(long)]
    pub workbook: Option<PathBuf>,

    #[arg(long)]
    pub source_sheet: Option<String>,

    #[arg(long)]
    pub dest_sheet: Option<String>,

    /// Marker sentinel text; omitted means the whole source sheet is pending.
    #[arg(long)]
    pub marker: Option<String>,

    /// Restrict the marker scan to one 1-based column; omitted scans any cell.
    #[arg(long)]
    pub marker_column: Option<u32>,

    #[arg(long)]
    pub identity_column: Option<u32>,

    #[arg(long)]
    pub first_data_row: Option<u32>,

    /// Cell currently carrying a running total, e.g. B14. Repeatable.
    #[arg(long = "formula-cell")]
    pub formula_cells: Vec<String>,

    #[arg(long)]
    pub done_data_start_row: Option<u32>,

    #[arg(long, env = "LEDGER_API_BASE_URL")]
    pub api_base_url: Option<String>,

    #[arg(long)]
    pub spreadsheet_id: Option<String>,

    #[arg(long)]
    pub source_view_id: Option<String>,

    #[arg(long)]
    pub dest_view_id: Option<String>,

    /// Optional endpoint the relocated record is posted to after the move.
    #[arg(long, env = "LEDGER_EXPORT_URL")]
    pub export_url: Option<String>,

    #[arg(long)]
    pub call_timeout_ms: Option<u64>,

    #[arg(long)]
    pub read_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    backend: Option<BackendKind>,
    workbook: Option<PathBuf>,
    source_sheet: Option<String>,
    dest_sheet: Option<String>,
    marker: Option<String>,
    marker_column: Option<u32>,
    identity_column: Option<u32>,
    first_data_row: Option<u32>,
    formula_cells: Option<Vec<String>>,
    done_data_start_row: Option<u32>,
    api_base_url: Option<String>,
    spreadsheet_id: Option<String>,
    source_view_id: Option<String>,
    dest_view_id: Option<String>,
    export_url: Option<String>,
    call_timeout_ms: Option<u64>,
    read_retries: Option<u32>,
}

/// Resolved, immutable configuration handed to the engine at construction.
/// No process-wide settings state exists; everything flows through this.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub backend: BackendKind,
    pub workbook: Option<PathBuf>,
    pub source_sheet: String,
    pub dest_sheet: String,
    pub marker: Option<String>,
    pub marker_column: Option<u32>,
    pub identity_column: u32,
    pub first_data_row: u32,
    pub formula_cells: Vec<String>,
    pub done_data_start_row: u32,
    pub api_base_url: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub source_view_id: Option<String>,
    pub dest_view_id: Option<String>,
    pub export_url: Option<String>,
    pub call_timeout_ms: u64,
    pub read_retries: u32,
}

impl EngineConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            keyword: _,
            config,
            backend: cli_backend,
            workbook: cli_workbook,
            source_sheet: cli_source_sheet,
            dest_sheet: cli_dest_sheet,
            marker: cli_marker,
            marker_column: cli_marker_column,
            identity_column: cli_identity_column,
            first_data_row: cli_first_data_row,
            formula_cells: cli_formula_cells,
            done_data_start_row: cli_done_data_start_row,
            api_base_url: cli_api_base_url,
            spreadsheet_id: cli_spreadsheet_id,
            source_view_id: cli_source_view_id,
            dest_view_id: cli_dest_view_id,
            export_url: cli_export_url,
            call_timeout_ms: cli_call_timeout_ms,
            read_retries: cli_read_retries,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            backend: file_backend,
            workbook: file_workbook,
            source_sheet: file_source_sheet,
            dest_sheet: file_dest_sheet,
            marker: file_marker,
            marker_column: file_marker_column,
            identity_column: file_identity_column,
            first_data_row: file_first_data_row,
            formula_cells: file_formula_cells,
            done_data_start_row: file_done_data_start_row,
            api_base_url: file_api_base_url,
            spreadsheet_id: file_spreadsheet_id,
            source_view_id: file_source_view_id,
            dest_view_id: file_dest_view_id,
            export_url: file_export_url,
            call_timeout_ms: file_call_timeout_ms,
            read_retries: file_read_retries,
        } = file_config;

        let backend = cli_backend.or(file_backend).unwrap_or(BackendKind::LocalFile);

        let formula_cells = if cli_formula_cells.is_empty() {
            file_formula_cells.unwrap_or_default()
        } else {
            cli_formula_cells
        };
        anyhow::ensure!(
            !formula_cells.is_empty(),
            "at least one aggregate formula cell is required (e.g. --formula-cell B14)"
        );

        let identity_column = cli_identity_column
            .or(file_identity_column)
            .unwrap_or(DEFAULT_IDENTITY_COLUMN);
        anyhow::ensure!(identity_column >= 1, "identity column is 1-based");

        let first_data_row = cli_first_data_row
            .or(file_first_data_row)
            .unwrap_or(DEFAULT_FIRST_DATA_ROW);
        anyhow::ensure!(first_data_row >= 1, "first data row is 1-based");

        let marker_column = cli_marker_column.or(file_marker_column);
        if let Some(col) = marker_column {
            anyhow::ensure!(col >= 1, "marker column is 1-based");
        }

        let workbook = cli_workbook.or(file_workbook);
        if backend == BackendKind::LocalFile {
            let path = workbook
                .as_ref()
                .context("the local-file backend requires --workbook")?;
            anyhow::ensure!(path.exists(), "configured workbook {:?} does not exist", path);
            anyhow::ensure!(path.is_file(), "configured workbook {:?} is not a file", path);
        }

        let api_base_url = cli_api_base_url.or(file_api_base_url);
        let spreadsheet_id = cli_spreadsheet_id.or(file_spreadsheet_id);
        if backend == BackendKind::RemoteApi {
            anyhow::ensure!(
                api_base_url.is_some(),
                "the remote-api backend requires --api-base-url"
            );
            anyhow::ensure!(
                spreadsheet_id.is_some(),
                "the remote-api backend requires --spreadsheet-id"
            );
        }

        let call_timeout_ms = cli_call_timeout_ms
            .or(file_call_timeout_ms)
            .unwrap_or(DEFAULT_CALL_TIMEOUT_MS)
            .max(1);

        Ok(Self {
            backend,
            workbook,
            source_sheet: cli_source_sheet
                .or(file_source_sheet)
                .unwrap_or_else(|| DEFAULT_SOURCE_SHEET.to_string()),
            dest_sheet: cli_dest_sheet
                .or(file_dest_sheet)
                .unwrap_or_else(|| DEFAULT_DEST_SHEET.to_string()),
            marker: cli_marker.or(file_marker).filter(|m| !m.trim().is_empty()),
            marker_column,
            identity_column,
            first_data_row,
            formula_cells,
            done_data_start_row: cli_done_data_start_row
                .or(file_done_data_start_row)
                .unwrap_or(DEFAULT_DONE_DATA_START_ROW),
            api_base_url,
            spreadsheet_id,
            source_view_id: cli_source_view_id.or(file_source_view_id),
            dest_view_id: cli_dest_view_id.or(file_dest_view_id),
            export_url: cli_export_url.or(file_export_url),
            call_timeout_ms,
            read_retries: cli_read_retries
                .or(file_read_retries)
                .unwrap_or(DEFAULT_READ_RETRIES),
        })
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn marker_spec(&self) -> Option<MarkerSpec> {
        self.marker.as_ref().map(|sentinel| {
            let scan = match self.marker_column {
                Some(col) => MarkerScan::Column(col),
                None => MarkerScan::AnyCell,
            };
            MarkerSpec::new(sentinel.clone(), scan)
        })
    }

    pub fn formula_spec(&self) -> Result<AggregateFormulaSpec, RelocateError> {
        AggregateFormulaSpec::parse(&self.formula_cells, self.done_data_start_row)
    }

    pub fn rules(&self) -> Result<RelocationRules, RelocateError> {
        Ok(RelocationRules {
            marker: self.marker_spec(),
            identity_column: self.identity_column,
            first_data_row: self.first_data_row,
            formula: self.formula_spec()?,
        })
    }

    /// Serialization key for the per-sheet session registry.
    pub fn sheet_key(&self) -> String {
        match self.backend {
            BackendKind::LocalFile => format!(
                "file:{}#{}->{}",
                self.workbook
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                self.source_sheet,
                self.dest_sheet
            ),
            BackendKind::RemoteApi | BackendKind::UiReplay => format!(
                "remote:{}#{}->{}",
                self.spreadsheet_id.as_deref().unwrap_or_default(),
                self.source_sheet,
                self.dest_sheet
            ),
        }
    }

    /// Builds the configured backend. The ui-replay variant needs an
    /// embedding application surface and cannot be constructed here.
    pub fn build_backend(&self) -> Result<Backend> {
        match self.backend {
            BackendKind::LocalFile => {
                let path = self
                    .workbook
                    .as_ref()
                    .context("the local-file backend requires --workbook")?;
                Ok(Backend::Transactional(Box::new(LocalFileBackend::new(
                    path,
                    self.source_sheet.clone(),
                    self.dest_sheet.clone(),
                ))))
            }
            BackendKind::RemoteApi => {
                let base_url = self
                    .api_base_url
                    .clone()
                    .context("the remote-api backend requires --api-base-url")?;
                let spreadsheet_id = self
                    .spreadsheet_id
                    .clone()
                    .context("the remote-api backend requires --spreadsheet-id")?;
                let source = match &self.source_view_id {
                    Some(view) => RemoteSheet::with_view(self.source_sheet.clone(), view.clone()),
                    None => RemoteSheet::new(self.source_sheet.clone()),
                };
                let destination = match &self.dest_view_id {
                    Some(view) => RemoteSheet::with_view(self.dest_sheet.clone(), view.clone()),
                    None => RemoteSheet::new(self.dest_sheet.clone()),
                };
                let backend = RemoteApiBackend::new(RemoteApiConfig {
                    base_url,
                    spreadsheet_id,
                    source,
                    destination,
                    call_timeout: self.call_timeout(),
                    read_retries: self.read_retries,
                })
                .map_err(|e| anyhow::anyhow!("{e}"))?;
                Ok(Backend::Transactional(Box::new(backend)))
            }
            BackendKind::UiReplay => anyhow::bail!(
                "the ui-replay backend needs an embedding application surface; \
                 construct it through the library API"
            ),
        }
    }
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse config file '{}'", path.display()))
}
