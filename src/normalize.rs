//! Join a raw country with its exchange rate into a validated [`CountryRecord`].

use crate::error::{Error, Result};
use crate::models::{CountryRecord, RateTable, RawCountry};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static CURRENCY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,4}$").expect("valid currency code regex"));

/// Estimated GDP derived from population and exchange rate.
#[inline]
pub fn estimated_gdp(population: u64, exchange_rate: f64) -> f64 {
    population as f64 * exchange_rate
}

/// [`estimated_gdp`], rejecting a product that overflows to infinity.
pub(crate) fn checked_gdp(population: u64, exchange_rate: f64) -> Result<f64> {
    let gdp = estimated_gdp(population, exchange_rate);
    if !gdp.is_finite() {
        return Err(Error::invalid(
            "estimated_gdp",
            format!("{population} × {exchange_rate} is not a finite number"),
        ));
    }
    Ok(gdp)
}

/// Normalize one raw country against the rate table.
///
/// ### Errors
/// - [`Error::InvalidRecord`] for a blank name, missing currency code, or negative population
/// - [`Error::MissingExchangeRate`] when the currency has no rate
/// - [`Error::InvalidRecord`] when the looked-up rate is not a positive finite number
pub fn normalize(
    raw: &RawCountry,
    rates: &RateTable,
    refreshed_at: DateTime<Utc>,
) -> Result<CountryRecord> {
    let name = validate_name(&raw.name)?;
    let currency_code = raw
        .currency_code()
        .ok_or_else(|| Error::invalid("currency_code", format!("{name} lists no currency")))?;
    let currency_code = validate_currency_code(currency_code)?;

    let population = u64::try_from(raw.population).map_err(|_| {
        Error::invalid(
            "population",
            format!("{} is negative for {name}", raw.population),
        )
    })?;

    let exchange_rate =
        rates
            .rate(&currency_code)
            .ok_or_else(|| Error::MissingExchangeRate {
                country: name.clone(),
                currency_code: currency_code.clone(),
            })?;
    validate_exchange_rate(exchange_rate)?;

    Ok(CountryRecord {
        estimated_gdp: checked_gdp(population, exchange_rate)?,
        name,
        capital: non_blank(raw.capital.as_deref()),
        region: non_blank(raw.region.as_deref()),
        population,
        currency_code,
        exchange_rate,
        flag_url: non_blank(raw.flag.as_deref()),
        last_refreshed_at: refreshed_at,
    })
}

/// Check every invariant of a record that did not come through [`normalize`],
/// and bring `estimated_gdp` back in line with its inputs. Blank optional
/// text fields become `None`.
pub fn validate_record(mut record: CountryRecord) -> Result<CountryRecord> {
    record.name = validate_name(&record.name)?;
    record.currency_code = validate_currency_code(&record.currency_code)?;
    validate_exchange_rate(record.exchange_rate)?;
    record.estimated_gdp = checked_gdp(record.population, record.exchange_rate)?;
    record.capital = non_blank(record.capital.as_deref());
    record.region = non_blank(record.region.as_deref());
    record.flag_url = non_blank(record.flag_url.as_deref());
    Ok(record)
}

pub(crate) fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::invalid("name", "must not be empty"));
    }
    Ok(name.to_string())
}

pub(crate) fn validate_currency_code(code: &str) -> Result<String> {
    let code = code.trim().to_ascii_uppercase();
    if !CURRENCY_CODE.is_match(&code) {
        return Err(Error::invalid(
            "currency_code",
            format!("{code:?} is not a 2-4 letter code"),
        ));
    }
    Ok(code)
}

pub(crate) fn validate_exchange_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(Error::invalid(
            "exchange_rate",
            format!("{rate} is not a positive number"),
        ));
    }
    Ok(())
}

pub(crate) fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
