//! Fetch → normalize → persist.
//!
//! Exchange rates are fetched fresh on every call; nothing is cached between runs.

use crate::api::Upstream;
use crate::error::{Error, Result};
use crate::models::CountryRecord;
use crate::normalize::normalize;
use crate::storage::{CountryStore, Upserted};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

/// A country the normalizer rejected during a refresh.
#[derive(Debug, Serialize)]
pub struct Skipped {
    pub name: String,
    pub error: String,
    #[serde(skip)]
    pub cause: Error,
}

#[derive(Debug, Serialize)]
pub struct RefreshReport {
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: Vec<Skipped>,
    pub refreshed_at: DateTime<Utc>,
}

impl RefreshReport {
    /// Countries written to the store.
    pub fn processed(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Refresh every country the upstream knows about.
///
/// Upstream failures abort the whole refresh before anything is written.
/// Countries the normalizer rejects are left out of the store and listed in
/// [`RefreshReport::skipped`]; the rest are upserted in one transaction.
pub fn refresh<U: Upstream + ?Sized>(
    upstream: &U,
    store: &mut CountryStore,
    now: DateTime<Utc>,
) -> Result<RefreshReport> {
    let countries = upstream.fetch_countries()?;
    let rates = upstream.fetch_exchange_rates()?;

    let mut records = Vec::with_capacity(countries.len());
    let mut skipped = Vec::new();
    for raw in &countries {
        match normalize(raw, &rates, now) {
            Ok(rec) => records.push(rec),
            Err(e) => {
                warn!("skipping {:?}: {e}", raw.name);
                skipped.push(Skipped {
                    name: raw.name.clone(),
                    error: e.to_string(),
                    cause: e,
                });
            }
        }
    }

    let (inserted, updated) = store.upsert_many(&records)?;
    info!(
        "refresh: {} fetched, {inserted} inserted, {updated} updated, {} skipped",
        countries.len(),
        skipped.len()
    );
    Ok(RefreshReport {
        fetched: countries.len(),
        inserted,
        updated,
        skipped,
        refreshed_at: now,
    })
}

/// Ingest a single named country (case-insensitive match on the upstream name).
///
/// Unlike [`refresh`], normalizer errors surface unchanged and nothing is written.
pub fn ingest_country<U: Upstream + ?Sized>(
    upstream: &U,
    store: &mut CountryStore,
    name: &str,
    now: DateTime<Utc>,
) -> Result<(CountryRecord, Upserted)> {
    let wanted = name.trim();
    let countries = upstream.fetch_countries()?;
    let raw = countries
        .iter()
        .find(|c| c.name.trim().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| Error::NotFound {
            name: wanted.to_string(),
        })?;
    let rates = upstream.fetch_exchange_rates()?;
    let record = normalize(raw, &rates, now)?;
    let outcome = store.upsert(&record)?;
    info!("ingested {} ({outcome:?})", record.name);
    Ok((record, outcome))
}
