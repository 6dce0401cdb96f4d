use anyhow::{Context, Result};
use clap::Parser;
use ledger_relocate::config::{CliArgs, EngineConfig};
use ledger_relocate::export::RecordExporter;
use ledger_relocate::notify::TracingSink;
use ledger_relocate::relocate::Relocator;
use ledger_relocate::session::{RelocationSession, SessionRegistry};
use ledger_relocate::ui::ConsolePrompt;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn main() -> Result<()> {
    init_logging();

    let args = CliArgs::parse();
    let keyword = args.keyword.clone();
    let config = EngineConfig::from_args(args)?;

    let backend = config.build_backend()?;
    let relocator = Relocator::new(backend, config.rules()?)?;

    let mut session = RelocationSession::new(relocator);
    if let Some(url) = &config.export_url {
        let exporter = RecordExporter::new(url, &config.dest_sheet, config.call_timeout())
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        session = session.with_exporter(exporter);
    }

    let registry = SessionRegistry::new();
    let _guard = registry
        .acquire(&config.sheet_key())
        .context("another relocation is already running for this sheet")?;

    let mut ui = ConsolePrompt::new(config.identity_column);
    let terminal = session.run(&keyword, &mut ui, &TracingSink)?;
    println!("{terminal}");
    Ok(())
}
