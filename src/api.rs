//! Synchronous clients for the two upstream APIs: **RestCountries v2** for country
//! metadata and **open.er-api.com** for exchange rates against a base currency.
//!
//! ### Notes
//! - One attempt per call. A network error or non-2xx status surfaces as
//!   [`Error::UpstreamUnavailable`]; a body that does not decode surfaces as
//!   [`Error::UpstreamMalformed`].
//! - The rate API reports its own failures in-band (`"result": "error"`); those are
//!   treated as the upstream being unavailable.
//! - Timeouts come from [`Settings`] (30s total / 10s connect by default).
//!
//! Typical usage:
//! ```no_run
//! # use country_fx::{Client, Upstream};
//! let client = Client::default();
//! let countries = client.fetch_countries()?;
//! let rates = client.fetch_exchange_rates()?;
//! println!("{} countries, {} rates", countries.len(), rates.len());
//! # Ok::<(), country_fx::Error>(())
//! ```

use crate::config::Settings;
use crate::error::{Error, Result, UpstreamApi};
use crate::models::{RateTable, RawCountry};
use log::debug;
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use std::time::Duration;

/// Source of raw country and exchange-rate data.
///
/// [`Client`] talks HTTP; tests and offline tooling can supply their own.
pub trait Upstream {
    fn fetch_countries(&self) -> Result<Vec<RawCountry>>;
    fn fetch_exchange_rates(&self) -> Result<RateTable>;
}

#[derive(Debug, Clone)]
pub struct Client {
    pub countries_url: String,
    pub rates_url: String,
    http: HttpClient,
}

impl Default for Client {
    fn default() -> Self {
        Self::from_settings(&Settings::default()).expect("reqwest client build")
    }
}

impl Client {
    /// Build a client from endpoints and timeouts in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(settings.timeout_secs)) // total request timeout
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .redirect(Policy::limited(5)) // cap redirects
            .user_agent(concat!("country_fx/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::UpstreamUnavailable {
                source_api: UpstreamApi::Countries,
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self {
            countries_url: settings.countries_url.clone(),
            rates_url: settings.rates_url.clone(),
            http,
        })
    }

    /// GET `url` once and return the body text of a 2xx response.
    fn get_text(&self, api: UpstreamApi, url: &str) -> Result<String> {
        debug!("GET {url}");
        let unavailable = |reason: String| Error::UpstreamUnavailable {
            source_api: api,
            reason,
        };
        let resp = self
            .http
            .get(url)
            .send()
            .map_err(|e| unavailable(format!("GET {url}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(unavailable(format!("GET {url}: HTTP {status}")));
        }
        resp.text()
            .map_err(|e| unavailable(format!("GET {url}: reading body: {e}")))
    }
}

impl Upstream for Client {
    fn fetch_countries(&self) -> Result<Vec<RawCountry>> {
        let body = self.get_text(UpstreamApi::Countries, &self.countries_url)?;
        let countries = parse_countries(&body)?;
        debug!("country API returned {} entries", countries.len());
        Ok(countries)
    }

    fn fetch_exchange_rates(&self) -> Result<RateTable> {
        let body = self.get_text(UpstreamApi::ExchangeRates, &self.rates_url)?;
        let table = parse_rates(&body)?;
        debug!(
            "exchange-rate API returned {} rates against {}",
            table.len(),
            table.base_code
        );
        Ok(table)
    }
}

/// Decode a country API body: a JSON array of country objects.
pub fn parse_countries(body: &str) -> Result<Vec<RawCountry>> {
    serde_json::from_str(body).map_err(|e| Error::UpstreamMalformed {
        source_api: UpstreamApi::Countries,
        reason: e.to_string(),
    })
}

/// Decode an exchange-rate API body.
///
/// Accepts the `{"result": "success", "base_code": ..., "rates": {...}}` envelope.
/// A missing `result` is tolerated; any other value than `"success"` is an
/// in-band upstream failure.
pub fn parse_rates(body: &str) -> Result<RateTable> {
    let table: RateTable = serde_json::from_str(body).map_err(|e| Error::UpstreamMalformed {
        source_api: UpstreamApi::ExchangeRates,
        reason: e.to_string(),
    })?;
    match table.result.as_deref() {
        None | Some("success") => {}
        Some(other) => {
            return Err(Error::UpstreamUnavailable {
                source_api: UpstreamApi::ExchangeRates,
                reason: format!("API reported result {other:?}"),
            });
        }
    }
    if table.rates.is_empty() {
        return Err(Error::UpstreamMalformed {
            source_api: UpstreamApi::ExchangeRates,
            reason: "no rates in response".into(),
        });
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn rate_api_error_result_is_unavailable() {
        let body = r#"{"result":"error","error-type":"unsupported-code"}"#;
        let err = parse_rates(body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[test]
    fn empty_rate_map_is_malformed() {
        let err = parse_rates(r#"{"result":"success","base_code":"USD","rates":{}}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamMalformed);
    }

    #[test]
    fn country_body_must_be_array() {
        let err = parse_countries(r#"{"message":"Not Found"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamMalformed);
    }
}
