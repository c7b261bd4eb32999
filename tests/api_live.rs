//! Live API tests. Run with: `cargo test --features online -- --nocapture`
#![cfg(feature = "online")]

use country_fx::{Client, CountryStore, Upstream, ingest};

#[test]
fn fetch_live_sources() {
    let cli = Client::default();
    let countries = cli.fetch_countries().unwrap();
    assert!(countries.len() > 200);
    assert!(countries.iter().any(|c| c.name == "Nigeria"));

    let rates = cli.fetch_exchange_rates().unwrap();
    assert_eq!(rates.base_code, "USD");
    assert_eq!(rates.rate("USD"), Some(1.0));
}

#[test]
fn ingest_live_country() {
    let cli = Client::default();
    let mut store = CountryStore::open_in_memory().unwrap();
    let (rec, _) = ingest::ingest_country(&cli, &mut store, "Germany", chrono::Utc::now()).unwrap();
    assert_eq!(rec.currency_code, "EUR");
    assert!(rec.estimated_gdp > 0.0);
}
