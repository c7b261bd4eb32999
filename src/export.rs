use crate::error::{Error, Result};
use crate::models::CountryRecord;
use chrono::SecondsFormat;
use csv::WriterBuilder;
use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const HEADER: [&str; 9] = [
    "name",
    "capital",
    "region",
    "population",
    "currency_code",
    "exchange_rate",
    "estimated_gdp",
    "flag_url",
    "last_refreshed_at",
];

/// Prefix cells a spreadsheet would evaluate as a formula with a single quote.
fn defuse(cell: &str) -> Cow<'_, str> {
    match cell.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => Cow::Owned(format!("'{cell}")),
        _ => Cow::Borrowed(cell),
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> Error + '_ {
    move |e| Error::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    }
}

/// Save records as CSV with header.
pub fn save_csv<P: AsRef<Path>>(records: &[CountryRecord], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new().from_path(path).map_err(csv_err(path))?;
    wtr.write_record(HEADER).map_err(csv_err(path))?;
    for r in records {
        let population = r.population.to_string();
        let rate = r.exchange_rate.to_string();
        let gdp = r.estimated_gdp.to_string();
        let ts = r.last_refreshed_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        wtr.write_record([
            &*defuse(&r.name),
            &*defuse(r.capital.as_deref().unwrap_or("")),
            &*defuse(r.region.as_deref().unwrap_or("")),
            population.as_str(),
            &*defuse(&r.currency_code),
            rate.as_str(),
            gdp.as_str(),
            &*defuse(r.flag_url.as_deref().unwrap_or("")),
            ts.as_str(),
        ])
        .map_err(csv_err(path))?;
    }
    wtr.flush().map_err(io_err(path))?;
    Ok(())
}

/// Save records as pretty JSON array.
pub fn save_json<P: AsRef<Path>>(records: &[CountryRecord], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut f = File::create(path).map_err(io_err(path))?;
    let s = serde_json::to_string_pretty(records).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;
    f.write_all(s.as_bytes()).map_err(io_err(path))?;
    Ok(())
}
