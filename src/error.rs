use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChargeError>;

/// Failure taxonomy for split-tender processing.
///
/// Callers are expected to branch on these variants: `BadParameter` and
/// `InsufficientValue` are caller-side and safe to retry after correction,
/// `ThirdPartyPayment` means the card leg failed after any pending
/// stored-value leg was compensated, and `Inconsistent` must never be
/// retried blindly.
#[derive(Error, Debug)]
pub enum ChargeError {
    #[error("Bad parameter: {0}")]
    BadParameter(String),
    #[error("Insufficient stored value: {0}")]
    InsufficientValue(String),
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Currency mismatch: instrument holds {held}, request is in {requested}")]
    CurrencyMismatch { held: String, requested: String },
    #[error("Idempotency key already in use: {0}")]
    AlreadyExists(String),
    #[error("Card processor error: {0}")]
    ThirdPartyPayment(String),
    #[error(
        "Inconsistent split state, manual reconciliation required: {detail} \
         (stored-value charge: {stored_value_id:?}, card charge: {card_id:?})"
    )]
    Inconsistent {
        detail: String,
        stored_value_id: Option<String>,
        card_id: Option<String>,
    },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ChargeError {
    /// Stable short label for outcome reporting and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadParameter(_) => "bad-parameter",
            Self::InsufficientValue(_) => "insufficient-value",
            Self::AuthorizationFailed(_) => "authorization-failed",
            Self::NotFound(_) => "not-found",
            Self::CurrencyMismatch { .. } => "currency-mismatch",
            Self::AlreadyExists(_) => "already-exists",
            Self::ThirdPartyPayment(_) => "third-party-payment",
            Self::Inconsistent { .. } => "inconsistent",
            Self::CsvError(_) => "csv",
            Self::IoError(_) => "io",
        }
    }

    /// True for failures that may not be resolved by fixing the request and
    /// retrying: something external already went half-way.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Inconsistent { .. })
    }
}
