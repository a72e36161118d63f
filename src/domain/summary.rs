use crate::domain::record::{CardChargeRecord, Metadata, StoredValueChargeRecord};
use crate::domain::request::Currency;
use serde::Serialize;

/// Final state of one leg as reported to the caller. A leg that was
/// never created has amount 0 and neither id nor metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryLeg {
    amount: i64,
    charge_id: Option<String>,
    metadata: Option<Metadata>,
}

impl SummaryLeg {
    fn absent() -> Self {
        Self {
            amount: 0,
            charge_id: None,
            metadata: None,
        }
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn charge_id(&self) -> Option<&str> {
        self.charge_id.as_deref()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}

impl From<&StoredValueChargeRecord> for SummaryLeg {
    fn from(record: &StoredValueChargeRecord) -> Self {
        Self {
            amount: record.debited_amount(),
            charge_id: Some(record.id.clone()),
            metadata: Some(record.metadata.clone()),
        }
    }
}

impl From<&CardChargeRecord> for SummaryLeg {
    fn from(record: &CardChargeRecord) -> Self {
        Self {
            amount: record.amount,
            charge_id: Some(record.id.clone()),
            metadata: Some(record.metadata.clone()),
        }
    }
}

/// Immutable audit record of one committed (or replayed) split: what
/// each leg paid, under which transaction, with which metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentSummary {
    currency: Currency,
    stored_value: SummaryLeg,
    card: SummaryLeg,
}

impl PaymentSummary {
    pub fn from_records(
        currency: Currency,
        stored_value: Option<&StoredValueChargeRecord>,
        card: Option<&CardChargeRecord>,
    ) -> Self {
        Self {
            currency,
            stored_value: stored_value.map(SummaryLeg::from).unwrap_or_else(SummaryLeg::absent),
            card: card.map(SummaryLeg::from).unwrap_or_else(SummaryLeg::absent),
        }
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn stored_value(&self) -> &SummaryLeg {
        &self.stored_value
    }

    pub fn card(&self) -> &SummaryLeg {
        &self.card
    }

    /// Sum of both legs, which equals the order total that was
    /// committed.
    pub fn total(&self) -> i64 {
        self.stored_value.amount + self.card.amount
    }
}
