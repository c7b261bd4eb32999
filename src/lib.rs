//! country_fx
//!
//! Fetch country metadata and exchange rates from two public REST APIs, join them
//! into one validated record per country, keep those records in SQLite, and
//! query, export, or chart them. Pairs with the `country-fx` CLI.
//!
//! ### Features
//! - Fetch RestCountries v2 data and open.er-api.com rates (base USD)
//! - Normalize: one currency code, one rate, `estimated_gdp = population × rate`
//! - SQLite store with create/read/update/delete and filtered, sorted listings
//! - Closed query vocabulary (`region`, `currency`, `min_population`, `sort=gdp_desc`, …)
//! - Summary statistics and a PNG/SVG bar chart of the top countries by GDP
//! - CSV/JSON export
//!
//! ### Example
//! ```no_run
//! use country_fx::{Client, CountryQuery, CountryStore, ingest, viz};
//!
//! let client = Client::default();
//! let mut store = CountryStore::open("countries.db")?;
//! let report = ingest::refresh(&client, &mut store, chrono::Utc::now())?;
//! println!("{} countries stored, {} skipped", report.processed(), report.skipped.len());
//!
//! let query = CountryQuery::from_query_string("region=Africa&sort=gdp_desc")?;
//! let africa = store.list(&query)?;
//! viz::render_to_path(&africa, "africa.png", &viz::RenderOptions::default())?;
//! # Ok::<(), country_fx::Error>(())
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod query;
pub mod stats;
pub mod storage;
pub mod viz;

pub use api::{Client, Upstream};
pub use config::Settings;
pub use error::{Error, ErrorKind, Result};
pub use models::{CountryPatch, CountryRecord, RateTable, RawCountry};
pub use query::{CountryFilter, CountryQuery, CountrySort, SortDirection, SortKey};
pub use storage::CountryStore;
