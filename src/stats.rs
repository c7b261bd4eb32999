use crate::models::CountryRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One entry of the top-by-GDP ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ranked {
    pub name: String,
    pub currency_code: String,
    pub estimated_gdp: f64,
}

/// Store-wide summary statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub total_countries: usize,
    pub total_population: u64,
    pub total_gdp: f64,
    pub mean_gdp: Option<f64>,
    pub median_gdp: Option<f64>,
    pub top_by_gdp: Vec<Ranked>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// Order by estimated GDP descending, then name ascending ignoring ASCII case
/// (the store's `NOCASE` collation).
pub fn by_gdp_desc(a: &CountryRecord, b: &CountryRecord) -> Ordering {
    b.estimated_gdp
        .total_cmp(&a.estimated_gdp)
        .then_with(|| cmp_nocase(&a.name, &b.name))
}

fn cmp_nocase(a: &str, b: &str) -> Ordering {
    let fold = |s: &str| s.bytes().map(|c| c.to_ascii_lowercase()).collect::<Vec<_>>();
    fold(a).cmp(&fold(b)).then_with(|| a.cmp(b))
}

/// Summarize `records`, keeping the `top_n` largest by estimated GDP.
pub fn summarize(records: &[CountryRecord], top_n: usize) -> Summary {
    let mut gdps: Vec<f64> = records.iter().map(|r| r.estimated_gdp).collect();
    gdps.sort_by(f64::total_cmp);
    let count = gdps.len();
    let total_gdp: f64 = gdps.iter().sum();
    let mean_gdp = if count > 0 {
        Some(total_gdp / count as f64)
    } else {
        None
    };
    let median_gdp = if count == 0 {
        None
    } else if count % 2 == 1 {
        Some(gdps[count / 2])
    } else {
        Some((gdps[count / 2 - 1] + gdps[count / 2]) / 2.0)
    };

    let mut ranked: Vec<&CountryRecord> = records.iter().collect();
    ranked.sort_by(|a, b| by_gdp_desc(a, b));
    let top_by_gdp = ranked
        .into_iter()
        .take(top_n)
        .map(|r| Ranked {
            name: r.name.clone(),
            currency_code: r.currency_code.clone(),
            estimated_gdp: r.estimated_gdp,
        })
        .collect();

    Summary {
        total_countries: count,
        total_population: records
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.population)),
        total_gdp,
        mean_gdp,
        median_gdp,
        top_by_gdp,
        last_refreshed_at: records.iter().map(|r| r.last_refreshed_at).max(),
    }
}
