use crate::domain::request::Currency;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form key/value payload carried on charge records and requests.
pub type Metadata = serde_json::Map<String, Value>;

/// Reserved metadata keys written by the engine. Caller metadata under
/// these keys is overwritten.
pub const METADATA_KEY_TOTAL: &str = "_split-tender-total";
pub const METADATA_KEY_PARTNER: &str = "_split-tender-partner";
pub const METADATA_KEY_PARTNER_TXN_ID: &str = "_split-tender-partner-txn-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChargeState {
    Pending,
    Captured,
    Voided,
    Refunded,
}

/// One charge on the stored-value ledger, as the ledger returns it.
///
/// `value` follows the ledger's sign convention: negative for debits,
/// positive for credits. State transitions happen only through the
/// ledger's own operations; holders of a record never flip it locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredValueChargeRecord {
    pub id: String,
    pub idempotency_key: String,
    pub instrument_id: String,
    pub value: i64,
    pub currency: Currency,
    pub state: ChargeState,
    pub metadata: Metadata,
}

impl StoredValueChargeRecord {
    /// The debited amount as a positive number of minor units.
    pub fn debited_amount(&self) -> i64 {
        -self.value
    }

    pub fn split_marker(&self) -> Option<SplitMarker> {
        SplitMarker::from_metadata(&self.metadata)
    }
}

/// One charge on the card processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardChargeRecord {
    pub id: String,
    pub amount: i64,
    pub currency: Currency,
    pub metadata: Metadata,
}

impl CardChargeRecord {
    pub fn split_marker(&self) -> Option<SplitMarker> {
        SplitMarker::from_metadata(&self.metadata)
    }
}

/// Which leg sits on the other side of a split, as recorded in a
/// charge's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPartner {
    StoredValue,
    Card,
}

impl SplitPartner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StoredValue => "STORED_VALUE",
            Self::Card => "CARD",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "STORED_VALUE" => Some(Self::StoredValue),
            "CARD" => Some(Self::Card),
            _ => None,
        }
    }
}

/// Typed view of the reserved split-tender keys in a record's metadata.
///
/// The marker ties the two legs of one split together: the original
/// order total (for replay verification), the counterparty leg kind,
/// and the counterparty's transaction id once that leg exists.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitMarker {
    pub order_total: i64,
    pub partner: SplitPartner,
    pub partner_txn_id: Option<String>,
}

impl SplitMarker {
    pub fn new(order_total: i64, partner: SplitPartner) -> Self {
        Self {
            order_total,
            partner,
            partner_txn_id: None,
        }
    }

    pub fn with_partner_txn(mut self, id: impl Into<String>) -> Self {
        self.partner_txn_id = Some(id.into());
        self
    }

    /// Writes the reserved keys into `metadata`, overwriting colliding
    /// caller values.
    pub fn apply_to(&self, metadata: &mut Metadata) {
        metadata.insert(
            METADATA_KEY_TOTAL.to_string(),
            Value::from(self.order_total),
        );
        metadata.insert(
            METADATA_KEY_PARTNER.to_string(),
            Value::from(self.partner.as_str()),
        );
        if let Some(id) = &self.partner_txn_id {
            metadata.insert(
                METADATA_KEY_PARTNER_TXN_ID.to_string(),
                Value::from(id.as_str()),
            );
        }
    }

    /// Reads the marker back out of a record's metadata. `None` when the
    /// reserved keys are absent or unparseable, which means the record
    /// was not written by this engine.
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        let order_total = metadata.get(METADATA_KEY_TOTAL)?.as_i64()?;
        let partner = SplitPartner::parse(metadata.get(METADATA_KEY_PARTNER)?.as_str()?)?;
        let partner_txn_id = metadata
            .get(METADATA_KEY_PARTNER_TXN_ID)
            .and_then(Value::as_str)
            .map(String::from);
        Some(Self {
            order_total,
            partner,
            partner_txn_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_roundtrip() {
        let marker = SplitMarker::new(10100, SplitPartner::Card).with_partner_txn("ch_123");
        let mut metadata = Metadata::new();
        marker.apply_to(&mut metadata);

        assert_eq!(SplitMarker::from_metadata(&metadata), Some(marker));
    }

    #[test]
    fn test_marker_without_partner_txn() {
        let marker = SplitMarker::new(500, SplitPartner::StoredValue);
        let mut metadata = Metadata::new();
        marker.apply_to(&mut metadata);

        assert!(!metadata.contains_key(METADATA_KEY_PARTNER_TXN_ID));
        assert_eq!(SplitMarker::from_metadata(&metadata), Some(marker));
    }

    #[test]
    fn test_marker_absent_from_foreign_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert("order".to_string(), Value::from("order-1"));
        assert_eq!(SplitMarker::from_metadata(&metadata), None);

        // A total without a partner is not a marker either.
        metadata.insert(METADATA_KEY_TOTAL.to_string(), Value::from(100));
        assert_eq!(SplitMarker::from_metadata(&metadata), None);
    }

    #[test]
    fn test_marker_overwrites_colliding_caller_keys() {
        let mut metadata = Metadata::new();
        metadata.insert(METADATA_KEY_TOTAL.to_string(), Value::from("bogus"));
        metadata.insert("cart".to_string(), Value::from("cart-9"));

        SplitMarker::new(250, SplitPartner::Card).apply_to(&mut metadata);

        assert_eq!(
            metadata.get(METADATA_KEY_TOTAL),
            Some(&Value::from(250))
        );
        assert_eq!(metadata.get("cart"), Some(&Value::from("cart-9")));
    }

    #[test]
    fn test_debited_amount_flips_ledger_sign() {
        let record = StoredValueChargeRecord {
            id: "txn_1".to_string(),
            idempotency_key: "order-1".to_string(),
            instrument_id: "sv_1".to_string(),
            value: -750,
            currency: crate::domain::request::Currency::new("USD").unwrap(),
            state: ChargeState::Captured,
            metadata: Metadata::new(),
        };
        assert_eq!(record.debited_amount(), 750);
    }

    #[test]
    fn test_charge_state_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ChargeState::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(
            serde_json::from_str::<ChargeState>("\"VOIDED\"").unwrap(),
            ChargeState::Voided
        );
    }
}
