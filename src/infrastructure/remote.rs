//! HTTP collaborators for real deployments, compiled in with the
//! `remote` feature.
//!
//! The ledger client speaks the stored-value service's JSON API with a
//! bearer token. The card client speaks the processor's form-encoded
//! API with basic auth, the way the large processors expose it.

use crate::domain::ports::{CardChargeParams, CardProcessor, LedgerChargeParams, StoredValueLedger};
use crate::domain::record::{CardChargeRecord, Metadata, StoredValueChargeRecord};
use crate::domain::request::{Amount, CardSelector, Currency, StoredValueSelector};
use crate::error::{ChargeError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

/// Error body returned by the stored-value service. The `code` labels
/// match the ones `ChargeError::kind` produces.
#[derive(Debug, Deserialize)]
struct LedgerErrorBody {
    code: String,
    message: String,
    #[serde(default)]
    held: Option<String>,
    #[serde(default)]
    requested: Option<String>,
}

impl LedgerErrorBody {
    fn into_error(self) -> ChargeError {
        match self.code.as_str() {
            "bad-parameter" => ChargeError::BadParameter(self.message),
            "insufficient-value" => ChargeError::InsufficientValue(self.message),
            "authorization-failed" => ChargeError::AuthorizationFailed(self.message),
            "not-found" => ChargeError::NotFound(self.message),
            "already-exists" => ChargeError::AlreadyExists(self.message),
            "currency-mismatch" => ChargeError::CurrencyMismatch {
                held: self.held.unwrap_or_default(),
                requested: self.requested.unwrap_or_default(),
            },
            _ => ChargeError::IoError(std::io::Error::other(format!(
                "ledger error {}: {}",
                self.code, self.message
            ))),
        }
    }
}

fn selector_field(selector: &StoredValueSelector) -> (&'static str, &str) {
    match selector {
        StoredValueSelector::Code(code) => ("code", code),
        StoredValueSelector::InstrumentId(id) => ("instrument_id", id),
        StoredValueSelector::AccountId(account) => ("account_id", account),
    }
}

fn transport(err: reqwest::Error) -> ChargeError {
    ChargeError::IoError(std::io::Error::other(err))
}

/// Client for a remote stored-value ledger service.
///
/// This struct is thread-safe (`Clone` shares the underlying
/// connection pool).
#[derive(Clone)]
pub struct RemoteLedger {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RemoteLedger {
    /// Creates a client for the service at `base_url`, authenticating
    /// every call with the given bearer `token`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn read_record(&self, resp: reqwest::Response) -> Result<StoredValueChargeRecord> {
        if !resp.status().is_success() {
            return Err(Self::read_error(resp).await);
        }
        resp.json().await.map_err(transport)
    }

    async fn read_error(resp: reqwest::Response) -> ChargeError {
        let status = resp.status();
        match resp.json::<LedgerErrorBody>().await {
            Ok(body) => body.into_error(),
            Err(_) => ChargeError::IoError(std::io::Error::other(format!(
                "ledger request failed with status {status}"
            ))),
        }
    }

    async fn mutate_charge(
        &self,
        record: &StoredValueChargeRecord,
        action: &str,
        metadata: Metadata,
    ) -> Result<StoredValueChargeRecord> {
        let resp = self
            .client
            .post(format!("{}/charges/{}/{action}", self.base_url, record.id))
            .bearer_auth(&self.token)
            .json(&json!({ "metadata": metadata }))
            .send()
            .await
            .map_err(transport)?;
        self.read_record(resp).await
    }
}

#[async_trait]
impl StoredValueLedger for RemoteLedger {
    async fn balance(&self, selector: &StoredValueSelector, currency: &Currency) -> Result<i64> {
        #[derive(Deserialize)]
        struct BalanceBody {
            balance: i64,
        }

        let (field, value) = selector_field(selector);
        let resp = self
            .client
            .get(format!("{}/instruments/balance", self.base_url))
            .bearer_auth(&self.token)
            .query(&[(field, value), ("currency", currency.as_str())])
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(Self::read_error(resp).await);
        }
        let body: BalanceBody = resp.json().await.map_err(transport)?;
        Ok(body.balance)
    }

    async fn create_charge(&self, params: LedgerChargeParams) -> Result<StoredValueChargeRecord> {
        let (field, value) = selector_field(&params.selector);
        let resp = self
            .client
            .post(format!("{}/charges", self.base_url))
            .bearer_auth(&self.token)
            .json(&json!({
                field: value,
                "value": params.value,
                "currency": params.currency,
                "idempotency_key": params.idempotency_key,
                "pending": params.pending,
                "metadata": params.metadata,
            }))
            .send()
            .await
            .map_err(transport)?;
        self.read_record(resp).await
    }

    async fn capture(
        &self,
        record: &StoredValueChargeRecord,
        metadata: Metadata,
    ) -> Result<StoredValueChargeRecord> {
        self.mutate_charge(record, "capture", metadata).await
    }

    async fn void(
        &self,
        record: &StoredValueChargeRecord,
        metadata: Metadata,
    ) -> Result<StoredValueChargeRecord> {
        self.mutate_charge(record, "void", metadata).await
    }

    async fn refund(
        &self,
        record: &StoredValueChargeRecord,
        metadata: Metadata,
    ) -> Result<StoredValueChargeRecord> {
        self.mutate_charge(record, "refund", metadata).await
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<StoredValueChargeRecord>> {
        let resp = self
            .client
            .get(format!("{}/charges", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("idempotency_key", key)])
            .send()
            .await
            .map_err(transport)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(self.read_record(resp).await?))
    }

    async fn fund(
        &self,
        selector: &StoredValueSelector,
        amount: Amount,
        currency: &Currency,
    ) -> Result<StoredValueChargeRecord> {
        let (field, value) = selector_field(selector);
        let resp = self
            .client
            .post(format!("{}/funds", self.base_url))
            .bearer_auth(&self.token)
            .json(&json!({
                field: value,
                "amount": amount.value(),
                "currency": currency,
            }))
            .send()
            .await
            .map_err(transport)?;
        self.read_record(resp).await
    }
}

/// Stringifies a metadata value for a form-encoded API, which only
/// carries flat string fields.
fn form_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn charge_form(params: &CardChargeParams) -> Vec<(String, String)> {
    let mut fields = vec![
        ("amount".to_string(), params.amount.value().to_string()),
        (
            "currency".to_string(),
            params.currency.as_str().to_lowercase(),
        ),
    ];
    match &params.selector {
        CardSelector::Token(token) => fields.push(("source".to_string(), token.clone())),
        CardSelector::CustomerId(customer) => {
            fields.push(("customer".to_string(), customer.clone()))
        }
    }
    for (key, value) in &params.metadata {
        fields.push((format!("metadata[{key}]"), form_value(value)));
    }
    fields
}

#[derive(Debug, Deserialize)]
struct ProcessorErrorBody {
    error: ProcessorErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProcessorErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Client for a remote card processor with a form-encoded charges API.
///
/// This struct is thread-safe (`Clone` shares the underlying
/// connection pool).
#[derive(Clone)]
pub struct RemoteCardProcessor {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl RemoteCardProcessor {
    /// Creates a client for the processor at `base_url`, authenticating
    /// with the given secret key as the basic-auth username.
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    async fn read_charge(&self, resp: reqwest::Response) -> Result<CardChargeRecord> {
        let status = resp.status();
        if status.is_success() {
            return resp.json().await.map_err(transport);
        }

        let message = match resp.json::<ProcessorErrorBody>().await {
            Ok(body) => body
                .error
                .message
                .unwrap_or_else(|| format!("processor request failed with status {status}")),
            Err(_) => format!("processor request failed with status {status}"),
        };
        Err(match status.as_u16() {
            400 | 409 => ChargeError::BadParameter(message),
            401 | 403 => ChargeError::AuthorizationFailed(message),
            402 => ChargeError::ThirdPartyPayment(message),
            404 => ChargeError::NotFound(message),
            _ => ChargeError::ThirdPartyPayment(message),
        })
    }
}

#[async_trait]
impl CardProcessor for RemoteCardProcessor {
    async fn create_charge(&self, params: CardChargeParams) -> Result<CardChargeRecord> {
        let resp = self
            .client
            .post(format!("{}/v1/charges", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", &params.idempotency_key)
            .form(&charge_form(&params))
            .send()
            .await
            .map_err(transport)?;
        self.read_charge(resp).await
    }

    async fn retrieve(&self, id: &str) -> Result<CardChargeRecord> {
        let resp = self
            .client
            .get(format!("{}/v1/charges/{id}", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(transport)?;
        self.read_charge(resp).await
    }
}
