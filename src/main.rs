use clap::Parser;
use miette::{IntoDiagnostic, Result};
use splitpay::application::orchestrator::SplitTenderOrchestrator;
use splitpay::domain::allocation::CARD_MINIMUM_DEFAULT;
use splitpay::domain::ports::StoredValueLedgerBox;
use splitpay::infrastructure::in_memory::{InMemoryCardProcessor, InMemoryLedger};
#[cfg(feature = "remote")]
use splitpay::infrastructure::remote::{RemoteCardProcessor, RemoteLedger};
use splitpay::interfaces::csv::op_reader::{CsvOp, OpKind, OpReader};
use splitpay::interfaces::csv::outcome_writer::{Outcome, OutcomeWriter};
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Smallest card share in minor units; smaller shares shift onto
    /// the stored-value leg
    #[arg(long, default_value_t = CARD_MINIMUM_DEFAULT)]
    card_minimum: i64,

    /// Base URL of a remote stored-value ledger (needs --processor-url)
    #[arg(long, requires = "processor_url")]
    ledger_url: Option<String>,

    /// Base URL of a remote card processor (needs --ledger-url)
    #[arg(long, requires = "ledger_url")]
    processor_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Stdout carries the outcome CSV, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "splitpay=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let (orchestrator, ledger) = build_collaborators(&cli)?;

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = OpReader::new(file);
    let stdout = io::stdout();
    let mut writer = OutcomeWriter::new(stdout.lock());

    for op_result in reader.ops() {
        match op_result {
            Ok(op) => {
                let kind = op.op;
                match run_op(&op, &orchestrator, &ledger).await {
                    Ok(outcome) => writer.write(&outcome).into_diagnostic()?,
                    Err(e) => {
                        if e.is_fatal() {
                            eprintln!("FATAL: {}", e);
                        } else {
                            eprintln!("Error processing operation: {}", e);
                        }
                        writer.write(&Outcome::failed(kind, &e)).into_diagnostic()?;
                    }
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    Ok(())
}

/// Runs one CSV row against the engine. Funding and balance lookups go
/// straight to the ledger; allocation and charging go through the
/// orchestrator.
async fn run_op(
    op: &CsvOp,
    orchestrator: &SplitTenderOrchestrator,
    ledger: &StoredValueLedgerBox,
) -> splitpay::error::Result<Outcome> {
    match op.op {
        OpKind::Fund => {
            let selector = op.required_stored_value_selector()?;
            let record = ledger.fund(&selector, op.amount()?, &op.currency()?).await?;
            Ok(Outcome::funded(&record))
        }
        OpKind::Balance => {
            let selector = op.required_stored_value_selector()?;
            let balance = ledger.balance(&selector, &op.currency()?).await?;
            Ok(Outcome::balance(balance))
        }
        OpKind::Simulate => {
            let allocation = orchestrator.simulate(&op.to_request()?).await?;
            Ok(Outcome::simulated(&allocation))
        }
        OpKind::Charge => {
            let summary = orchestrator.commit(op.to_request()?).await?;
            Ok(Outcome::charged(&summary))
        }
    }
}

/// Builds the orchestrator plus a direct ledger handle for `fund` and
/// `balance` rows. Both handles share one underlying collaborator.
fn build_collaborators(cli: &Cli) -> Result<(SplitTenderOrchestrator, StoredValueLedgerBox)> {
    match (&cli.ledger_url, &cli.processor_url) {
        (Some(ledger_url), Some(processor_url)) => {
            build_remote(ledger_url, processor_url, cli.card_minimum)
        }
        _ => Ok(build_in_memory(cli.card_minimum)),
    }
}

fn build_in_memory(card_minimum: i64) -> (SplitTenderOrchestrator, StoredValueLedgerBox) {
    let ledger = InMemoryLedger::new();
    let handle: StoredValueLedgerBox = Box::new(ledger.clone());
    let orchestrator = SplitTenderOrchestrator::new(
        Box::new(ledger),
        Box::new(InMemoryCardProcessor::new()),
    )
    .with_card_minimum(card_minimum);
    (orchestrator, handle)
}

#[cfg(feature = "remote")]
fn build_remote(
    ledger_url: &str,
    processor_url: &str,
    card_minimum: i64,
) -> Result<(SplitTenderOrchestrator, StoredValueLedgerBox)> {
    use miette::WrapErr;

    let token = std::env::var("SPLITPAY_LEDGER_TOKEN")
        .into_diagnostic()
        .wrap_err("SPLITPAY_LEDGER_TOKEN must be set for a remote ledger")?;
    let secret_key = std::env::var("SPLITPAY_PROCESSOR_KEY")
        .into_diagnostic()
        .wrap_err("SPLITPAY_PROCESSOR_KEY must be set for a remote card processor")?;

    let ledger = RemoteLedger::new(ledger_url, token);
    let handle: StoredValueLedgerBox = Box::new(ledger.clone());
    let orchestrator = SplitTenderOrchestrator::new(
        Box::new(ledger),
        Box::new(RemoteCardProcessor::new(processor_url, secret_key)),
    )
    .with_card_minimum(card_minimum);
    Ok((orchestrator, handle))
}

#[cfg(not(feature = "remote"))]
fn build_remote(
    _ledger_url: &str,
    _processor_url: &str,
    card_minimum: i64,
) -> Result<(SplitTenderOrchestrator, StoredValueLedgerBox)> {
    eprintln!(
        "WARNING: Remote collaborators requested via --ledger-url/--processor-url, \
         but 'remote' feature is not enabled. Falling back to in-memory collaborators."
    );
    Ok(build_in_memory(card_minimum))
}
