use crate::domain::request::{Amount, CardSelector, ChargeRequest, Currency, StoredValueSelector};
use crate::error::{ChargeError, Result};
use serde::Deserialize;
use std::io::Read;

/// One operation the demo binary can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Fund,
    Balance,
    Simulate,
    Charge,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fund => "fund",
            Self::Balance => "balance",
            Self::Simulate => "simulate",
            Self::Charge => "charge",
        }
    }
}

/// One CSV row: an operation plus its parameters. Columns that do not
/// apply to the operation stay empty.
#[derive(Debug, Clone, Deserialize)]
pub struct CsvOp {
    pub op: OpKind,
    #[serde(default)]
    pub amount: Option<i64>,
    pub currency: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub instrument_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl CsvOp {
    pub fn currency(&self) -> Result<Currency> {
        Currency::new(&self.currency)
    }

    pub fn amount(&self) -> Result<Amount> {
        let value = self.amount.ok_or_else(|| {
            ChargeError::BadParameter(format!("{} needs an amount", self.op.as_str()))
        })?;
        Amount::new(value)
    }

    /// The stored-value selector, if any. At most one of the three
    /// selector columns may be set.
    pub fn stored_value_selector(&self) -> Result<Option<StoredValueSelector>> {
        let mut selectors = Vec::new();
        if let Some(code) = &self.code {
            selectors.push(StoredValueSelector::Code(code.clone()));
        }
        if let Some(id) = &self.instrument_id {
            selectors.push(StoredValueSelector::InstrumentId(id.clone()));
        }
        if let Some(account) = &self.account_id {
            selectors.push(StoredValueSelector::AccountId(account.clone()));
        }
        if selectors.len() > 1 {
            return Err(ChargeError::BadParameter(
                "set at most one of code, instrument_id and account_id".to_string(),
            ));
        }
        Ok(selectors.pop())
    }

    /// The stored-value selector for operations that cannot run
    /// without one.
    pub fn required_stored_value_selector(&self) -> Result<StoredValueSelector> {
        self.stored_value_selector()?.ok_or_else(|| {
            ChargeError::BadParameter(format!(
                "{} needs one of code, instrument_id or account_id",
                self.op.as_str()
            ))
        })
    }

    pub fn card_selector(&self) -> Result<Option<CardSelector>> {
        match (&self.token, &self.customer) {
            (Some(_), Some(_)) => Err(ChargeError::BadParameter(
                "set at most one of token and customer".to_string(),
            )),
            (Some(token), None) => Ok(Some(CardSelector::Token(token.clone()))),
            (None, Some(customer)) => Ok(Some(CardSelector::CustomerId(customer.clone()))),
            (None, None) => Ok(None),
        }
    }

    /// Builds the charge request for a `simulate` or `charge` row.
    pub fn to_request(&self) -> Result<ChargeRequest> {
        let mut request = ChargeRequest::new(self.amount()?, self.currency()?);
        if let Some(selector) = self.stored_value_selector()? {
            request = request.with_stored_value(selector);
        }
        if let Some(selector) = self.card_selector()? {
            request = request.with_card(selector);
        }
        if let Some(key) = &self.idempotency_key {
            request = request.with_idempotency_key(key.clone());
        }
        Ok(request)
    }
}

/// Reads operations from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over
/// `Result<CsvOp>`. It handles whitespace trimming and flexible record
/// lengths automatically.
pub struct OpReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OpReader<R> {
    /// Creates a new `OpReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes operations,
    /// so large files stream without loading fully into memory.
    pub fn ops(self) -> impl Iterator<Item = Result<CsvOp>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(ChargeError::from))
    }
}
