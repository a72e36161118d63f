use crate::domain::record::Metadata;
use crate::error::ChargeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A positive monetary amount in minor currency units (cents and the
/// like).
///
/// Ensures that order and charge amounts are always positive; the signed
/// ledger convention (negative = debit) lives on the records instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> Result<Self, ChargeError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(ChargeError::BadParameter(
                "amount must be a positive number of minor units".to_string(),
            ))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = ChargeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO-4217 style currency code, normalized to upper case at
/// construction so comparisons never depend on caller casing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, ChargeError> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(ChargeError::BadParameter(format!(
                "invalid currency code: {code:?}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = String::deserialize(deserializer)?;
        Currency::new(&code).map_err(serde::de::Error::custom)
    }
}

/// How the caller identifies the stored-value instrument. At most one
/// way per request, enforced by the type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValueSelector {
    /// Redemption code as printed on a gift card.
    Code(String),
    /// Direct instrument identifier.
    InstrumentId(String),
    /// Account identifier; the ledger resolves it to the instrument held
    /// in the requested currency.
    AccountId(String),
}

/// How the caller identifies the card to charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardSelector {
    /// Single-use tokenized card.
    Token(String),
    /// Stored customer with a card on file.
    CustomerId(String),
}

/// One split-tender charge request.
///
/// Constructed once, then treated as immutable: the only mutation the
/// engine performs is backfilling a generated idempotency key before the
/// first external call.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    order_amount: Amount,
    currency: Currency,
    idempotency_key: Option<String>,
    stored_value: Option<StoredValueSelector>,
    card: Option<CardSelector>,
    metadata: Metadata,
}

impl ChargeRequest {
    pub fn new(order_amount: Amount, currency: Currency) -> Self {
        Self {
            order_amount,
            currency,
            idempotency_key: None,
            stored_value: None,
            card: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_stored_value(mut self, selector: StoredValueSelector) -> Self {
        self.stored_value = Some(selector);
        self
    }

    pub fn with_card(mut self, selector: CardSelector) -> Self {
        self.card = Some(selector);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Caller metadata attached to both legs. Keys under the reserved
    /// `_split-tender-` prefix are overwritten by the engine.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn order_amount(&self) -> Amount {
        self.order_amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    pub fn stored_value(&self) -> Option<&StoredValueSelector> {
        self.stored_value.as_ref()
    }

    pub fn card(&self) -> Option<&CardSelector> {
        self.card.as_ref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Fills in a generated idempotency key when the caller supplied
    /// none, and returns the key in effect.
    pub fn ensure_idempotency_key(&mut self) -> &str {
        self.idempotency_key
            .get_or_insert_with(|| Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(1).is_ok());
        assert!(matches!(
            Amount::new(0),
            Err(ChargeError::BadParameter(_))
        ));
        assert!(matches!(
            Amount::new(-100),
            Err(ChargeError::BadParameter(_))
        ));
    }

    #[test]
    fn test_currency_normalization() {
        assert_eq!(Currency::new("usd").unwrap().as_str(), "USD");
        assert_eq!(Currency::new(" eur ").unwrap().as_str(), "EUR");
    }

    #[test]
    fn test_currency_rejects_malformed_codes() {
        for code in ["US", "USDX", "U$D", ""] {
            assert!(matches!(
                Currency::new(code),
                Err(ChargeError::BadParameter(_))
            ));
        }
    }

    #[test]
    fn test_currency_deserializes_through_validation() {
        let currency: Currency = serde_json::from_str("\"usd\"").unwrap();
        assert_eq!(currency.as_str(), "USD");
        assert!(serde_json::from_str::<Currency>("\"toolong\"").is_err());
    }

    #[test]
    fn test_ensure_idempotency_key_generates_once() {
        let mut request = ChargeRequest::new(
            Amount::new(100).unwrap(),
            Currency::new("USD").unwrap(),
        );
        assert!(request.idempotency_key().is_none());

        let generated = request.ensure_idempotency_key().to_string();
        assert_eq!(request.ensure_idempotency_key(), generated);
        assert_eq!(request.idempotency_key(), Some(generated.as_str()));
    }

    #[test]
    fn test_ensure_idempotency_key_keeps_caller_key() {
        let mut request = ChargeRequest::new(
            Amount::new(100).unwrap(),
            Currency::new("USD").unwrap(),
        )
        .with_idempotency_key("order-42");

        assert_eq!(request.ensure_idempotency_key(), "order-42");
    }
}
