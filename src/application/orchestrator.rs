use crate::domain::allocation::{self, Allocation, CARD_MINIMUM_DEFAULT, Share};
use crate::domain::ports::{
    CardChargeParams, CardProcessorBox, LedgerChargeParams, StoredValueLedgerBox,
};
use crate::domain::record::{ChargeState, Metadata, SplitMarker, SplitPartner, StoredValueChargeRecord};
use crate::domain::request::{Amount, CardSelector, ChargeRequest, StoredValueSelector};
use crate::domain::summary::PaymentSummary;
use crate::error::{ChargeError, Result};
use tracing::{debug, error, info, warn};

/// Drives the two-leg split-tender protocol against the stored-value
/// ledger and the card processor.
///
/// `simulate` is read-only and callable any number of times. `commit` is
/// the only mutating operation; under retry with the same idempotency
/// key it replays the original outcome instead of charging again. The
/// stored-value leg always goes first, so a card failure can be
/// compensated by voiding the pending ledger charge.
pub struct SplitTenderOrchestrator {
    ledger: StoredValueLedgerBox,
    processor: CardProcessorBox,
    card_minimum: i64,
}

impl SplitTenderOrchestrator {
    pub fn new(ledger: StoredValueLedgerBox, processor: CardProcessorBox) -> Self {
        Self {
            ledger,
            processor,
            card_minimum: CARD_MINIMUM_DEFAULT,
        }
    }

    /// Overrides the processor minimum charge the allocator honors.
    pub fn with_card_minimum(mut self, card_minimum: i64) -> Self {
        self.card_minimum = card_minimum;
        self
    }

    /// Projects the split that `commit` would execute right now, without
    /// touching any external state.
    pub async fn simulate(&self, request: &ChargeRequest) -> Result<Allocation> {
        let share = self.allocate_live(request).await?;
        let allocation = Allocation::new(
            request.order_amount(),
            request.currency().clone(),
            share,
        );
        debug!(
            total = allocation.order_total().value(),
            currency = %allocation.currency(),
            stored_value = share.stored_value,
            card = share.card,
            "simulated split"
        );
        Ok(allocation)
    }

    /// Executes the split: at most one ledger debit and one card charge,
    /// committed together or not at all (short of the fatal
    /// capture-failure case, which is surfaced as `Inconsistent`).
    pub async fn commit(&self, mut request: ChargeRequest) -> Result<PaymentSummary> {
        let key = request.ensure_idempotency_key().to_string();

        if let Some(existing) = self.ledger.find_by_idempotency_key(&key).await? {
            info!(key = %key, "idempotency key seen before, replaying");
            return self.replay(&request, existing).await;
        }

        let share = self.allocate_live(&request).await?;

        // A validation failure must abort before anything is charged.
        if share.card > 0 && request.card().is_none() {
            return Err(ChargeError::BadParameter(format!(
                "order needs a card payment of {} but no card was given",
                share.card
            )));
        }

        info!(
            key = %key,
            stored_value = share.stored_value,
            card = share.card,
            "committing split"
        );

        let outcome = match (request.stored_value().cloned(), request.card().cloned()) {
            (_, Some(card)) if share.stored_value == 0 => {
                self.commit_card_only(&request, &key, card).await
            }
            (Some(stored), _) if share.card == 0 => {
                self.commit_stored_value_only(&request, &key, stored, share.stored_value)
                    .await
            }
            (Some(stored), Some(card)) => {
                self.commit_split(&request, &key, stored, card, share).await
            }
            // A non-zero share on a side implies its selector is present.
            _ => Err(ChargeError::BadParameter(
                "request does not identify the payment sources its split needs".to_string(),
            )),
        };

        match outcome {
            Err(ChargeError::AlreadyExists(_)) => {
                // Lost the create race to a concurrent commit under this
                // key; the winner's record replays.
                warn!(key = %key, "idempotency key taken mid-commit, replaying");
                match self.ledger.find_by_idempotency_key(&key).await? {
                    Some(existing) => self.replay(&request, existing).await,
                    None => Err(ChargeError::Inconsistent {
                        detail: format!(
                            "ledger rejected idempotency key {key} as taken but holds no record for it"
                        ),
                        stored_value_id: None,
                        card_id: None,
                    }),
                }
            }
            other => other,
        }
    }

    /// Looks up the summary of an already-committed split by its
    /// idempotency key. Never charges anything.
    pub async fn retrieve(&self, request: &ChargeRequest) -> Result<PaymentSummary> {
        let Some(key) = request.idempotency_key() else {
            return Err(ChargeError::BadParameter(
                "an idempotency key is required to retrieve a split".to_string(),
            ));
        };
        match self.ledger.find_by_idempotency_key(key).await? {
            Some(record) => self.replay(request, record).await,
            None => Err(ChargeError::NotFound(format!(
                "no split-tender charge under idempotency key {key}"
            ))),
        }
    }

    /// Queries the live balance (zero without a selector) and runs the
    /// allocator.
    async fn allocate_live(&self, request: &ChargeRequest) -> Result<Share> {
        let balance = match request.stored_value() {
            Some(selector) => self.ledger.balance(selector, request.currency()).await?,
            None => 0,
        };
        allocation::allocate(request.order_amount(), balance, self.card_minimum)
    }

    /// Reassembles the summary of a previously committed split without
    /// issuing any new debit.
    async fn replay(
        &self,
        request: &ChargeRequest,
        record: StoredValueChargeRecord,
    ) -> Result<PaymentSummary> {
        let Some(marker) = record.split_marker() else {
            return Err(ChargeError::BadParameter(format!(
                "idempotency key {} belongs to a ledger transaction that is not a split-tender charge",
                record.idempotency_key
            )));
        };

        let order = request.order_amount().value();
        if marker.order_total != order {
            return Err(ChargeError::BadParameter(format!(
                "idempotency key {} was committed for an order of {} but this request is for {order}",
                record.idempotency_key, marker.order_total
            )));
        }

        if record.state == ChargeState::Voided {
            return Err(ChargeError::BadParameter(format!(
                "the split under idempotency key {} was compensated; retry with a fresh key",
                record.idempotency_key
            )));
        }

        let stored_value_share = record.debited_amount();
        let card_share = order - stored_value_share;

        let card_record = if card_share != 0 {
            let Some(card_id) = marker.partner_txn_id.as_deref() else {
                return Err(ChargeError::Inconsistent {
                    detail: format!(
                        "split record {} expects a card leg of {card_share} but carries no card charge id",
                        record.id
                    ),
                    stored_value_id: Some(record.id.clone()),
                    card_id: None,
                });
            };
            Some(self.processor.retrieve(card_id).await?)
        } else {
            None
        };

        info!(
            key = %record.idempotency_key,
            stored_value = stored_value_share,
            card = card_share,
            "replayed split"
        );
        // The summary reports what was committed, so the currency comes
        // from the record, not from the replaying request.
        Ok(PaymentSummary::from_records(
            record.currency.clone(),
            Some(&record),
            card_record.as_ref(),
        ))
    }

    /// No spendable stored value: one card charge covers the whole
    /// order. The idempotency key doubles as the processor token, which
    /// makes retries of this path dedupe processor-side.
    async fn commit_card_only(
        &self,
        request: &ChargeRequest,
        key: &str,
        selector: CardSelector,
    ) -> Result<PaymentSummary> {
        let mut metadata = request.metadata().clone();
        SplitMarker::new(request.order_amount().value(), SplitPartner::StoredValue)
            .apply_to(&mut metadata);

        let card = self
            .processor
            .create_charge(CardChargeParams {
                amount: request.order_amount(),
                currency: request.currency().clone(),
                selector,
                idempotency_key: key.to_string(),
                metadata,
            })
            .await
            .map_err(wrap_card_failure)?;
        debug!(charge = %card.id, amount = card.amount, "card covered the whole order");

        Ok(PaymentSummary::from_records(
            request.currency().clone(),
            None,
            Some(&card),
        ))
    }

    /// The balance covers the whole order: one ledger debit, created
    /// directly captured.
    async fn commit_stored_value_only(
        &self,
        request: &ChargeRequest,
        key: &str,
        selector: StoredValueSelector,
        amount: i64,
    ) -> Result<PaymentSummary> {
        let mut metadata = request.metadata().clone();
        SplitMarker::new(request.order_amount().value(), SplitPartner::Card)
            .apply_to(&mut metadata);

        let record = self
            .ledger
            .create_charge(LedgerChargeParams {
                selector,
                value: -amount,
                currency: request.currency().clone(),
                idempotency_key: key.to_string(),
                pending: false,
                metadata,
            })
            .await?;
        debug!(record = %record.id, amount, "stored value covered the whole order");

        Ok(PaymentSummary::from_records(
            request.currency().clone(),
            Some(&record),
            None,
        ))
    }

    /// True split: authorize the ledger leg, charge the card, then
    /// capture, or void on card failure.
    async fn commit_split(
        &self,
        request: &ChargeRequest,
        key: &str,
        stored_selector: StoredValueSelector,
        card_selector: CardSelector,
        share: Share,
    ) -> Result<PaymentSummary> {
        let order_total = request.order_amount().value();

        let mut leg_metadata = request.metadata().clone();
        SplitMarker::new(order_total, SplitPartner::Card).apply_to(&mut leg_metadata);

        let pending = self
            .ledger
            .create_charge(LedgerChargeParams {
                selector: stored_selector,
                value: -share.stored_value,
                currency: request.currency().clone(),
                idempotency_key: key.to_string(),
                pending: true,
                metadata: leg_metadata,
            })
            .await?;
        debug!(
            record = %pending.id,
            amount = share.stored_value,
            "stored-value leg authorized"
        );

        let mut card_metadata = request.metadata().clone();
        SplitMarker::new(order_total, SplitPartner::StoredValue)
            .with_partner_txn(pending.id.clone())
            .apply_to(&mut card_metadata);

        let card = match self
            .processor
            .create_charge(CardChargeParams {
                amount: Amount::new(share.card)?,
                currency: request.currency().clone(),
                selector: card_selector,
                idempotency_key: key.to_string(),
                metadata: card_metadata,
            })
            .await
        {
            Ok(card) => card,
            Err(card_err) => return self.compensate(&pending, card_err).await,
        };
        debug!(charge = %card.id, amount = share.card, "card leg charged");

        let mut capture_metadata = Metadata::new();
        SplitMarker::new(order_total, SplitPartner::Card)
            .with_partner_txn(card.id.clone())
            .apply_to(&mut capture_metadata);

        match self.ledger.capture(&pending, capture_metadata).await {
            Ok(captured) => Ok(PaymentSummary::from_records(
                request.currency().clone(),
                Some(&captured),
                Some(&card),
            )),
            Err(capture_err) => {
                error!(
                    stored_value = %pending.id,
                    card = %card.id,
                    error = %capture_err,
                    "card charged but stored-value capture failed"
                );
                Err(ChargeError::Inconsistent {
                    detail: format!(
                        "card charge {} succeeded but capturing stored-value charge {} failed: {capture_err}",
                        card.id, pending.id
                    ),
                    stored_value_id: Some(pending.id.clone()),
                    card_id: Some(card.id.clone()),
                })
            }
        }
    }

    /// Voids the pending stored-value leg after a card failure, then
    /// surfaces the card failure itself.
    async fn compensate(
        &self,
        pending: &StoredValueChargeRecord,
        card_err: ChargeError,
    ) -> Result<PaymentSummary> {
        warn!(
            record = %pending.id,
            error = %card_err,
            "card leg failed, voiding stored-value leg"
        );
        if let Err(void_err) = self.ledger.void(pending, Metadata::new()).await {
            // The card took no money; the dangling authorization is left
            // for ledger-side reconciliation.
            error!(
                record = %pending.id,
                error = %void_err,
                "could not void stored-value leg"
            );
        }
        Err(wrap_card_failure(card_err))
    }
}

/// Card-leg failures surface as `ThirdPartyPayment` unless the caller's
/// own input was at fault.
fn wrap_card_failure(err: ChargeError) -> ChargeError {
    match err {
        ChargeError::BadParameter(_) | ChargeError::ThirdPartyPayment(_) => err,
        other => ChargeError::ThirdPartyPayment(other.to_string()),
    }
}
