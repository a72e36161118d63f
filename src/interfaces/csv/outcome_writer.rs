use crate::domain::allocation::Allocation;
use crate::domain::record::StoredValueChargeRecord;
use crate::domain::summary::PaymentSummary;
use crate::error::{ChargeError, Result};
use crate::interfaces::csv::op_reader::OpKind;
use serde::Serialize;
use std::io::Write;

/// One CSV output row: the operation, its outcome label, and the
/// figures that apply to it. Columns that do not apply stay empty.
///
/// Failures carry the error's label in `outcome` and its message in
/// `detail`, so a run never aborts halfway through a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub op: &'static str,
    pub outcome: &'static str,
    pub stored_value: Option<i64>,
    pub card: Option<i64>,
    pub stored_value_txn: Option<String>,
    pub card_txn: Option<String>,
    pub detail: Option<String>,
}

impl Outcome {
    fn ok(op: OpKind) -> Self {
        Self {
            op: op.as_str(),
            outcome: "ok",
            stored_value: None,
            card: None,
            stored_value_txn: None,
            card_txn: None,
            detail: None,
        }
    }

    pub fn funded(record: &StoredValueChargeRecord) -> Self {
        Self {
            stored_value: Some(record.value),
            stored_value_txn: Some(record.id.clone()),
            ..Self::ok(OpKind::Fund)
        }
    }

    pub fn balance(balance: i64) -> Self {
        Self {
            stored_value: Some(balance),
            ..Self::ok(OpKind::Balance)
        }
    }

    pub fn simulated(allocation: &Allocation) -> Self {
        let share = allocation.share();
        Self {
            stored_value: Some(share.stored_value),
            card: Some(share.card),
            ..Self::ok(OpKind::Simulate)
        }
    }

    pub fn charged(summary: &PaymentSummary) -> Self {
        Self {
            stored_value: Some(summary.stored_value().amount()),
            card: Some(summary.card().amount()),
            stored_value_txn: summary.stored_value().charge_id().map(String::from),
            card_txn: summary.card().charge_id().map(String::from),
            ..Self::ok(OpKind::Charge)
        }
    }

    pub fn failed(op: OpKind, err: &ChargeError) -> Self {
        Self {
            outcome: err.kind(),
            detail: Some(err.to_string()),
            ..Self::ok(op)
        }
    }
}

/// Writes outcome rows as CSV, emitting the header automatically on
/// the first row.
pub struct OutcomeWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OutcomeWriter<W> {
    /// Creates a new `OutcomeWriter` over any `Write` sink (e.g., Stdout).
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Serializes one outcome row and flushes it, so rows appear as
    /// soon as their operation finishes.
    pub fn write(&mut self, outcome: &Outcome) -> Result<()> {
        self.writer.serialize(outcome)?;
        self.writer.flush()?;
        Ok(())
    }
}
