//! Error taxonomy shared by the fetchers, normalizer, store, and query layer.
//!
//! Every failure surfaces to the caller unmodified; there is no local recovery.
//! [`Error::kind`] gives the coarse classification and [`Error::http_status`]
//! the status code a request/response surface should answer with.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which upstream API an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamApi {
    Countries,
    ExchangeRates,
}

impl fmt::Display for UpstreamApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamApi::Countries => f.write_str("country API"),
            UpstreamApi::ExchangeRates => f.write_str("exchange-rate API"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Network failure or non-success response from an upstream API.
    #[error("{source_api} unavailable: {reason}")]
    UpstreamUnavailable { source_api: UpstreamApi, reason: String },

    /// Upstream answered, but the body could not be decoded.
    #[error("{source_api} returned a malformed body: {reason}")]
    UpstreamMalformed { source_api: UpstreamApi, reason: String },

    /// No rate exists for the country's currency code.
    #[error("no exchange rate for currency {currency_code} (country {country})")]
    MissingExchangeRate {
        country: String,
        currency_code: String,
    },

    /// A record failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidRecord { field: &'static str, reason: String },

    #[error("country {name} already exists")]
    DuplicateKey { name: String },

    #[error("country {name} not found")]
    NotFound { name: String },

    /// Unrecognized filter key, sort value, or unparsable parameter.
    #[error("invalid query parameter {key}: {reason}")]
    InvalidQuery { key: String, reason: String },

    #[error("database error during {operation}")]
    Database {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to render summary image: {0}")]
    Render(String),

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UpstreamUnavailable,
    UpstreamMalformed,
    MissingExchangeRate,
    InvalidRecord,
    DuplicateKey,
    NotFound,
    InvalidQuery,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UpstreamMalformed => "upstream_malformed",
            ErrorKind::MissingExchangeRate => "missing_exchange_rate",
            ErrorKind::InvalidRecord => "invalid_record",
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidQuery => "invalid_query",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Error::UpstreamMalformed { .. } => ErrorKind::UpstreamMalformed,
            Error::MissingExchangeRate { .. } => ErrorKind::MissingExchangeRate,
            Error::InvalidRecord { .. } => ErrorKind::InvalidRecord,
            Error::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::InvalidQuery { .. } => ErrorKind::InvalidQuery,
            Error::Database { .. } | Error::Render(_) | Error::Io { .. } => ErrorKind::Internal,
        }
    }

    /// Status code for a request/response surface.
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidRecord | ErrorKind::InvalidQuery | ErrorKind::MissingExchangeRate => {
                400
            }
            ErrorKind::NotFound => 404,
            ErrorKind::DuplicateKey => 409,
            ErrorKind::UpstreamMalformed => 502,
            ErrorKind::UpstreamUnavailable => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Structured, serializable view of this error for callers.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            error: self.kind(),
            status: self.http_status(),
            detail: self.to_string(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidRecord {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn query(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidQuery {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn db(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Error::Database { operation, source }
    }
}

/// Body returned to callers when a request fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub error: ErrorKind,
    pub status: u16,
    pub detail: String,
}
