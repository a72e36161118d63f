use crate::domain::record::{CardChargeRecord, Metadata, StoredValueChargeRecord};
use crate::domain::request::{Amount, CardSelector, Currency, StoredValueSelector};
use crate::error::Result;
use async_trait::async_trait;

/// Parameters for one charge on the stored-value ledger.
#[derive(Debug, Clone)]
pub struct LedgerChargeParams {
    pub selector: StoredValueSelector,
    /// Negative for debits, per the ledger's sign convention.
    pub value: i64,
    pub currency: Currency,
    pub idempotency_key: String,
    /// When true the charge is authorized but not finalized; it must be
    /// captured or voided later.
    pub pending: bool,
    pub metadata: Metadata,
}

/// Parameters for one charge on the card processor.
#[derive(Debug, Clone)]
pub struct CardChargeParams {
    pub amount: Amount,
    pub currency: Currency,
    pub selector: CardSelector,
    /// Forwarded as the processor's own idempotency token, so retries of
    /// the same commit cannot double-charge the card.
    pub idempotency_key: String,
    pub metadata: Metadata,
}

/// The stored-value ledger service. Selector resolution (code, direct
/// instrument id, or account-plus-currency) happens behind this
/// boundary.
#[async_trait]
pub trait StoredValueLedger: Send + Sync {
    /// Spendable balance of the selected instrument, in minor units.
    async fn balance(&self, selector: &StoredValueSelector, currency: &Currency) -> Result<i64>;

    /// Creates a charge under a ledger-enforced unique idempotency key;
    /// a taken key is rejected with `AlreadyExists`.
    async fn create_charge(&self, params: LedgerChargeParams) -> Result<StoredValueChargeRecord>;

    /// Finalizes a pending charge. `metadata` is merged into the
    /// record's existing metadata.
    async fn capture(
        &self,
        record: &StoredValueChargeRecord,
        metadata: Metadata,
    ) -> Result<StoredValueChargeRecord>;

    /// Reverses a pending charge, releasing the held value.
    async fn void(
        &self,
        record: &StoredValueChargeRecord,
        metadata: Metadata,
    ) -> Result<StoredValueChargeRecord>;

    /// Returns a captured charge's value to the instrument.
    async fn refund(
        &self,
        record: &StoredValueChargeRecord,
        metadata: Metadata,
    ) -> Result<StoredValueChargeRecord>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<StoredValueChargeRecord>>;

    /// Credits the instrument, provisioning value ahead of a charge.
    async fn fund(
        &self,
        selector: &StoredValueSelector,
        amount: Amount,
        currency: &Currency,
    ) -> Result<StoredValueChargeRecord>;
}

/// The card processor service.
#[async_trait]
pub trait CardProcessor: Send + Sync {
    /// Charges the selected card. Reusing an idempotency token with the
    /// same parameters returns the original charge instead of creating
    /// a second one.
    async fn create_charge(&self, params: CardChargeParams) -> Result<CardChargeRecord>;

    async fn retrieve(&self, id: &str) -> Result<CardChargeRecord>;
}

pub type StoredValueLedgerBox = Box<dyn StoredValueLedger>;
pub type CardProcessorBox = Box<dyn CardProcessor>;
