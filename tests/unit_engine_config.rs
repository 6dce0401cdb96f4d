use std::fs;

use clap::Parser;
use ledger_relocate::config::{BackendKind, CliArgs, EngineConfig};
use ledger_relocate::marker::{MarkerScan, MarkerSpec};

#[test]
fn merges_config_file_and_cli_overrides() {
    let dir = tempfile::tempdir().expect("tempdir");
    let workbook = dir.path().join("ledger.xlsx");
    fs::write(&workbook, b"stub").expect("write workbook");
    let config_path = dir.path().join("relocate.yaml");
    let yaml = format!(
        "backend: local-file\n\
         workbook: {}\n\
         source_sheet: Invoices\n\
         marker: \"== DONE ==\"\n\
         marker_column: 3\n\
         identity_column: 2\n\
         formula_cells:\n  - B14\n  - D14\n\
         call_timeout_ms: 500\n",
        workbook.display()
    );
    fs::write(&config_path, yaml).expect("write config");

    let args = CliArgs::parse_from([
        "ledger-relocate",
        "acme",
        "--config",
        config_path.to_str().unwrap(),
        "--identity-column",
        "1",
        "--dest-sheet",
        "Archive",
    ]);
    let config = EngineConfig::from_args(args).expect("config");

    assert_eq!(config.backend, BackendKind::LocalFile);
    assert_eq!(config.workbook.as_deref(), Some(workbook.as_path()));
    assert_eq!(config.source_sheet, "Invoices");
    assert_eq!(config.dest_sheet, "Archive");
    assert_eq!(config.identity_column, 1, "CLI overrides the file");
    assert_eq!(config.formula_cells, vec!["B14".to_string(), "D14".to_string()]);
    assert_eq!(config.call_timeout_ms, 500);
    assert_eq!(
        config.marker_spec(),
        Some(MarkerSpec::new("== DONE ==", MarkerScan::Column(3)))
    );

    let rules = config.rules().expect("rules");
    assert_eq!(rules.formula.formula_row(), 14);
    assert_eq!(rules.formula.columns().len(), 2);
}

#[test]
fn at_least_one_formula_cell_is_required() {
    let dir = tempfile::tempdir().expect("tempdir");
    let workbook = dir.path().join("ledger.xlsx");
    fs::write(&workbook, b"stub").expect("write workbook");

    let args = CliArgs::parse_from([
        "ledger-relocate",
        "acme",
        "--workbook",
        workbook.to_str().unwrap(),
    ]);
    let err = EngineConfig::from_args(args).unwrap_err();
    assert!(err.to_string().contains("formula cell"), "{err}");
}

#[test]
fn local_file_backend_requires_an_existing_workbook() {
    let args = CliArgs::parse_from([
        "ledger-relocate",
        "acme",
        "--formula-cell",
        "B14",
        "--workbook",
        "/nonexistent/ledger.xlsx",
    ]);
    assert!(EngineConfig::from_args(args).is_err());

    let args = CliArgs::parse_from(["ledger-relocate", "acme", "--formula-cell", "B14"]);
    let err = EngineConfig::from_args(args).unwrap_err();
    assert!(err.to_string().contains("--workbook"), "{err}");
}

#[test]
fn remote_api_backend_requires_url_and_spreadsheet_id() {
    let args = CliArgs::parse_from([
        "ledger-relocate",
        "acme",
        "--backend",
        "remote-api",
        "--formula-cell",
        "B14",
        "--api-base-url",
        "https://sheets.example/v4",
    ]);
    let err = EngineConfig::from_args(args).unwrap_err();
    assert!(err.to_string().contains("spreadsheet-id"), "{err}");
}

#[test]
fn sheet_keys_distinguish_substrate_and_sheet_pair() {
    let dir = tempfile::tempdir().expect("tempdir");
    let workbook = dir.path().join("ledger.xlsx");
    fs::write(&workbook, b"stub").expect("write workbook");

    let local = EngineConfig::from_args(CliArgs::parse_from([
        "ledger-relocate",
        "acme",
        "--formula-cell",
        "B14",
        "--workbook",
        workbook.to_str().unwrap(),
    ]))
    .expect("local config");

    let remote = EngineConfig::from_args(CliArgs::parse_from([
        "ledger-relocate",
        "acme",
        "--backend",
        "remote-api",
        "--formula-cell",
        "B14",
        "--api-base-url",
        "https://sheets.example/v4",
        "--spreadsheet-id",
        "sheet-123",
    ]))
    .expect("remote config");

    assert_ne!(local.sheet_key(), remote.sheet_key());
    assert!(local.sheet_key().starts_with("file:"));
    assert!(remote.sheet_key().contains("sheet-123"));
}

#[test]
fn ui_replay_backend_is_not_constructible_from_config() {
    let config = EngineConfig::from_args(CliArgs::parse_from([
        "ledger-relocate",
        "acme",
        "--backend",
        "ui-replay",
        "--formula-cell",
        "B14",
    ]))
    .expect("config");
    assert!(config.build_backend().is_err());
}
