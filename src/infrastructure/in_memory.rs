use crate::domain::ports::{CardChargeParams, CardProcessor, LedgerChargeParams, StoredValueLedger};
use crate::domain::record::{CardChargeRecord, ChargeState, Metadata, StoredValueChargeRecord};
use crate::domain::request::{Amount, CardSelector, Currency, StoredValueSelector};
use crate::error::{ChargeError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Card selectors the in-memory processor always declines, mirroring
/// the reserved test tokens of real processors.
pub const DECLINE_TOKEN: &str = "tok_chargeDeclined";
pub const DECLINE_CUSTOMER: &str = "cus_chargeDeclined";

/// One provisioned stored-value instrument.
#[derive(Debug, Clone)]
struct Instrument {
    id: String,
    code: Option<String>,
    account_id: Option<String>,
    currency: Currency,
    balance: i64,
}

#[derive(Default)]
struct LedgerState {
    instruments: HashMap<String, Instrument>,
    charges: HashMap<String, StoredValueChargeRecord>,
    by_key: HashMap<String, String>,
}

impl LedgerState {
    fn resolve_id(&self, selector: &StoredValueSelector, currency: &Currency) -> Result<String> {
        match selector {
            StoredValueSelector::Code(code) => {
                let instrument = self
                    .instruments
                    .values()
                    .find(|i| i.code.as_deref() == Some(code.as_str()))
                    .ok_or_else(|| {
                        ChargeError::NotFound(format!("no instrument with code {code}"))
                    })?;
                check_currency(instrument, currency)
            }
            StoredValueSelector::InstrumentId(id) => {
                let instrument = self
                    .instruments
                    .get(id)
                    .ok_or_else(|| ChargeError::NotFound(format!("no instrument with id {id}")))?;
                check_currency(instrument, currency)
            }
            StoredValueSelector::AccountId(account) => {
                let mut wrong_currency = None;
                for instrument in self.instruments.values() {
                    if instrument.account_id.as_deref() == Some(account.as_str()) {
                        if instrument.currency == *currency {
                            return Ok(instrument.id.clone());
                        }
                        wrong_currency = Some(instrument);
                    }
                }
                match wrong_currency {
                    Some(instrument) => Err(ChargeError::CurrencyMismatch {
                        held: instrument.currency.as_str().to_string(),
                        requested: currency.as_str().to_string(),
                    }),
                    None => Err(ChargeError::NotFound(format!(
                        "no instrument for account {account}"
                    ))),
                }
            }
        }
    }

    fn provision(&mut self, selector: &StoredValueSelector, currency: &Currency) -> String {
        let (id, code, account_id) = match selector {
            StoredValueSelector::Code(code) => (
                format!("sv_{}", Uuid::new_v4().simple()),
                Some(code.clone()),
                None,
            ),
            StoredValueSelector::InstrumentId(id) => (id.clone(), None, None),
            StoredValueSelector::AccountId(account) => (
                format!("sv_{}", Uuid::new_v4().simple()),
                None,
                Some(account.clone()),
            ),
        };
        self.instruments.insert(
            id.clone(),
            Instrument {
                id: id.clone(),
                code,
                account_id,
                currency: currency.clone(),
                balance: 0,
            },
        );
        id
    }

    fn index_charge(&mut self, record: &StoredValueChargeRecord) {
        self.by_key
            .insert(record.idempotency_key.clone(), record.id.clone());
        self.charges.insert(record.id.clone(), record.clone());
    }
}

fn check_currency(instrument: &Instrument, currency: &Currency) -> Result<String> {
    if instrument.currency == *currency {
        Ok(instrument.id.clone())
    } else {
        Err(ChargeError::CurrencyMismatch {
            held: instrument.currency.as_str().to_string(),
            requested: currency.as_str().to_string(),
        })
    }
}

/// A thread-safe in-memory stored-value ledger.
///
/// Implements the full collaborator contract: selector resolution,
/// currency checking, idempotency-key uniqueness, and the
/// pending/capture/void/refund state machine with value held from the
/// moment a charge is created. Funding an unknown selector provisions
/// the instrument on the fly, which keeps demos and tests
/// self-contained.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    inner: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    /// Creates a new ledger with no instruments.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoredValueLedger for InMemoryLedger {
    async fn balance(&self, selector: &StoredValueSelector, currency: &Currency) -> Result<i64> {
        let state = self.inner.read().await;
        let instrument_id = state.resolve_id(selector, currency)?;
        match state.instruments.get(&instrument_id) {
            Some(instrument) => Ok(instrument.balance),
            None => Err(ChargeError::NotFound(format!(
                "no instrument with id {instrument_id}"
            ))),
        }
    }

    async fn create_charge(&self, params: LedgerChargeParams) -> Result<StoredValueChargeRecord> {
        if params.value >= 0 {
            return Err(ChargeError::BadParameter(
                "ledger charges are debits and must carry a negative value".to_string(),
            ));
        }

        let mut state = self.inner.write().await;
        if state.by_key.contains_key(&params.idempotency_key) {
            return Err(ChargeError::AlreadyExists(params.idempotency_key));
        }
        let instrument_id = state.resolve_id(&params.selector, &params.currency)?;
        let Some(instrument) = state.instruments.get_mut(&instrument_id) else {
            return Err(ChargeError::NotFound(format!(
                "no instrument with id {instrument_id}"
            )));
        };
        if instrument.balance + params.value < 0 {
            return Err(ChargeError::InsufficientValue(format!(
                "balance of {} cannot cover a debit of {}",
                instrument.balance, -params.value
            )));
        }
        // Pending charges hold their value immediately; void returns it.
        instrument.balance += params.value;

        let record = StoredValueChargeRecord {
            id: format!("txn_{}", Uuid::new_v4().simple()),
            idempotency_key: params.idempotency_key,
            instrument_id,
            value: params.value,
            currency: params.currency,
            state: if params.pending {
                ChargeState::Pending
            } else {
                ChargeState::Captured
            },
            metadata: params.metadata,
        };
        state.index_charge(&record);
        Ok(record)
    }

    async fn capture(
        &self,
        record: &StoredValueChargeRecord,
        metadata: Metadata,
    ) -> Result<StoredValueChargeRecord> {
        self.transition(&record.id, ChargeState::Pending, ChargeState::Captured, metadata, false)
            .await
    }

    async fn void(
        &self,
        record: &StoredValueChargeRecord,
        metadata: Metadata,
    ) -> Result<StoredValueChargeRecord> {
        self.transition(&record.id, ChargeState::Pending, ChargeState::Voided, metadata, true)
            .await
    }

    async fn refund(
        &self,
        record: &StoredValueChargeRecord,
        metadata: Metadata,
    ) -> Result<StoredValueChargeRecord> {
        self.transition(&record.id, ChargeState::Captured, ChargeState::Refunded, metadata, true)
            .await
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<StoredValueChargeRecord>> {
        let state = self.inner.read().await;
        Ok(state
            .by_key
            .get(key)
            .and_then(|id| state.charges.get(id))
            .cloned())
    }

    async fn fund(
        &self,
        selector: &StoredValueSelector,
        amount: Amount,
        currency: &Currency,
    ) -> Result<StoredValueChargeRecord> {
        let mut state = self.inner.write().await;
        let instrument_id = match state.resolve_id(selector, currency) {
            Ok(id) => id,
            Err(ChargeError::NotFound(_)) => state.provision(selector, currency),
            Err(err) => return Err(err),
        };
        let Some(instrument) = state.instruments.get_mut(&instrument_id) else {
            return Err(ChargeError::NotFound(format!(
                "no instrument with id {instrument_id}"
            )));
        };
        instrument.balance += amount.value();

        let record = StoredValueChargeRecord {
            id: format!("txn_{}", Uuid::new_v4().simple()),
            idempotency_key: Uuid::new_v4().to_string(),
            instrument_id,
            value: amount.value(),
            currency: currency.clone(),
            state: ChargeState::Captured,
            metadata: Metadata::new(),
        };
        state.index_charge(&record);
        Ok(record)
    }
}

impl InMemoryLedger {
    async fn transition(
        &self,
        record_id: &str,
        from: ChargeState,
        to: ChargeState,
        metadata: Metadata,
        release_value: bool,
    ) -> Result<StoredValueChargeRecord> {
        let mut state = self.inner.write().await;
        let Some(stored) = state.charges.get_mut(record_id) else {
            return Err(ChargeError::NotFound(format!("no ledger charge {record_id}")));
        };
        if stored.state != from {
            return Err(ChargeError::BadParameter(format!(
                "ledger charge {record_id} is {:?} and cannot become {to:?}",
                stored.state
            )));
        }
        stored.state = to;
        stored.metadata.extend(metadata);
        let record = stored.clone();

        if release_value {
            if let Some(instrument) = state.instruments.get_mut(&record.instrument_id) {
                // The held value is negative, so subtracting restores it.
                instrument.balance -= record.value;
            }
        }
        Ok(record)
    }
}

#[derive(Default)]
struct ProcessorState {
    charges: HashMap<String, CardChargeRecord>,
    by_token: HashMap<String, String>,
}

/// A thread-safe in-memory card processor.
///
/// Deduplicates charges by idempotency token the way real processors
/// do, and declines the reserved `tok_chargeDeclined` and
/// `cus_chargeDeclined` selectors so failure paths can be exercised.
#[derive(Default, Clone)]
pub struct InMemoryCardProcessor {
    inner: Arc<RwLock<ProcessorState>>,
}

impl InMemoryCardProcessor {
    /// Creates a new processor with no charges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of charges ever created. Lets tests assert that a replay
    /// issued no second charge.
    pub async fn charge_count(&self) -> usize {
        self.inner.read().await.charges.len()
    }
}

#[async_trait]
impl CardProcessor for InMemoryCardProcessor {
    async fn create_charge(&self, params: CardChargeParams) -> Result<CardChargeRecord> {
        let declined = match &params.selector {
            CardSelector::Token(token) => token == DECLINE_TOKEN,
            CardSelector::CustomerId(customer) => customer == DECLINE_CUSTOMER,
        };
        if declined {
            return Err(ChargeError::ThirdPartyPayment(
                "the card was declined".to_string(),
            ));
        }

        let mut state = self.inner.write().await;
        if let Some(existing_id) = state.by_token.get(&params.idempotency_key) {
            let Some(existing) = state.charges.get(existing_id) else {
                return Err(ChargeError::NotFound(format!(
                    "no card charge behind idempotency token {}",
                    params.idempotency_key
                )));
            };
            if existing.amount != params.amount.value() {
                return Err(ChargeError::BadParameter(format!(
                    "idempotency token {} was used for a charge of {} but this request is for {}",
                    params.idempotency_key, existing.amount, params.amount
                )));
            }
            return Ok(existing.clone());
        }

        let record = CardChargeRecord {
            id: format!("ch_{}", Uuid::new_v4().simple()),
            amount: params.amount.value(),
            currency: params.currency,
            metadata: params.metadata,
        };
        state
            .by_token
            .insert(params.idempotency_key, record.id.clone());
        state.charges.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn retrieve(&self, id: &str) -> Result<CardChargeRecord> {
        let state = self.inner.read().await;
        state
            .charges
            .get(id)
            .cloned()
            .ok_or_else(|| ChargeError::NotFound(format!("no card charge {id}")))
    }
}
