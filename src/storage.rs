//! SQLite-backed persistence for [`CountryRecord`]s.
//!
//! The store owns an explicit [`Connection`] handed to [`CountryStore::new`]
//! (or acquired by [`CountryStore::open`]); dropping the store releases it.
//! Country names are the key and compare case-insensitively.

use crate::error::{Error, Result};
use crate::models::{CountryPatch, CountryRecord, StoreStatus};
use crate::normalize::{
    checked_gdp, non_blank, validate_currency_code, validate_exchange_rate, validate_record,
};
use crate::query::{CountryQuery, SortDirection, SortKey};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS countries (
    name              TEXT    NOT NULL PRIMARY KEY COLLATE NOCASE,
    capital           TEXT,
    region            TEXT,
    population        INTEGER NOT NULL CHECK (population >= 0),
    currency_code     TEXT    NOT NULL,
    exchange_rate     REAL    NOT NULL CHECK (exchange_rate > 0),
    estimated_gdp     REAL    NOT NULL,
    flag_url          TEXT,
    last_refreshed_at TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS countries_region ON countries (region COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS countries_currency ON countries (currency_code);
";

const COLUMNS: &str = "name, capital, region, population, currency_code, exchange_rate, \
                       estimated_gdp, flag_url, last_refreshed_at";

/// Outcome of [`CountryStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Inserted,
    Updated,
}

pub struct CountryStore {
    conn: Connection,
}

impl std::fmt::Debug for CountryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountryStore")
            .field("path", &self.conn.path())
            .finish_non_exhaustive()
    }
}

impl CountryStore {
    /// Wrap an already-open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(Error::db("initialise schema"))?;
        Ok(Self { conn })
    }

    /// Open (or create) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening country store at {}", path.display());
        let conn = Connection::open(path).map_err(Error::db("open database"))?;
        Self::new(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::db("open in-memory database"))?;
        Self::new(conn)
    }

    /// Insert a new record. Fails with [`Error::DuplicateKey`] if the name is taken.
    pub fn create(&mut self, record: &CountryRecord) -> Result<CountryRecord> {
        let record = validate_record(record.clone())?;
        let tx = self
            .conn
            .transaction()
            .map_err(Error::db("begin create"))?;
        if exists(&tx, &record.name)? {
            return Err(Error::DuplicateKey { name: record.name });
        }
        insert(&tx, &record)?;
        tx.commit().map_err(Error::db("commit create"))?;
        Ok(record)
    }

    pub fn read(&self, name: &str) -> Result<CountryRecord> {
        find(&self.conn, name)?.ok_or_else(|| not_found(name))
    }

    /// Apply `patch` to the named record. `estimated_gdp` is re-derived from the
    /// patched population and exchange rate before the row is written.
    pub fn update(&mut self, name: &str, patch: &CountryPatch) -> Result<CountryRecord> {
        let tx = self
            .conn
            .transaction()
            .map_err(Error::db("begin update"))?;
        let current = find(&tx, name)?.ok_or_else(|| not_found(name))?;
        let updated = apply_patch(current, patch, Utc::now())?;
        write_existing(&tx, &updated)?;
        tx.commit().map_err(Error::db("commit update"))?;
        Ok(updated)
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        let n = self
            .conn
            .execute("DELETE FROM countries WHERE name = ?1", [name.trim()])
            .map_err(Error::db("delete country"))?;
        if n == 0 {
            return Err(not_found(name));
        }
        Ok(())
    }

    /// Insert the record, or overwrite every field of the existing row with the same name.
    pub fn upsert(&mut self, record: &CountryRecord) -> Result<Upserted> {
        let tx = self
            .conn
            .transaction()
            .map_err(Error::db("begin upsert"))?;
        let outcome = upsert_in(&tx, record)?;
        tx.commit().map_err(Error::db("commit upsert"))?;
        Ok(outcome)
    }

    /// Upsert a batch in one transaction. Returns `(inserted, updated)` counts.
    pub fn upsert_many(&mut self, records: &[CountryRecord]) -> Result<(usize, usize)> {
        let tx = self
            .conn
            .transaction()
            .map_err(Error::db("begin batch upsert"))?;
        let (mut inserted, mut updated) = (0, 0);
        for record in records {
            match upsert_in(&tx, record)? {
                Upserted::Inserted => inserted += 1,
                Upserted::Updated => updated += 1,
            }
        }
        tx.commit().map_err(Error::db("commit batch upsert"))?;
        Ok((inserted, updated))
    }

    /// Filtered, sorted listing. Rows with equal sort keys come back in `name` order.
    pub fn list(&self, query: &CountryQuery) -> Result<Vec<CountryRecord>> {
        let mut sql = format!("SELECT {COLUMNS} FROM countries");
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        let f = &query.filter;
        if let Some(region) = &f.region {
            clauses.push("region = ? COLLATE NOCASE");
            args.push(Value::Text(region.trim().to_string()));
        }
        if let Some(code) = &f.currency_code {
            clauses.push("currency_code = ?");
            args.push(Value::Text(code.trim().to_ascii_uppercase()));
        }
        if let Some(min) = f.min_population {
            clauses.push("population >= ?");
            args.push(Value::Integer(clamp_i64(min)));
        }
        if let Some(max) = f.max_population {
            clauses.push("population <= ?");
            args.push(Value::Integer(clamp_i64(max)));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let column = match query.sort.key {
            SortKey::Name => "name",
            SortKey::Population => "population",
            SortKey::EstimatedGdp => "estimated_gdp",
        };
        let direction = match query.sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        if query.sort.key == SortKey::Name {
            sql.push_str(&format!(" ORDER BY name {direction}"));
        } else {
            sql.push_str(&format!(" ORDER BY {column} {direction}, name ASC"));
        }

        if query.limit.is_some() || query.offset.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
            args.push(Value::Integer(query.limit.map_or(-1, i64::from)));
            args.push(Value::Integer(query.offset.map_or(0, i64::from)));
        }

        debug!("list: {sql}");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(Error::db("prepare list"))?;
        let rows = stmt
            .query_map(params_from_iter(args), row_to_record)
            .map_err(Error::db("list countries"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::db("read country row"))
    }

    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM countries", [], |r| r.get(0))
            .map_err(Error::db("count countries"))?;
        Ok(n.max(0) as u64)
    }

    /// Most recent `last_refreshed_at` across all rows.
    pub fn last_refreshed_at(&self) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT MAX(last_refreshed_at) FROM countries", [], |r| {
                r.get(0)
            })
            .map_err(Error::db("read last refresh"))?;
        raw.map(|s| parse_timestamp(0, &s))
            .transpose()
            .map_err(Error::db("parse last refresh"))
    }

    pub fn status(&self) -> Result<StoreStatus> {
        Ok(StoreStatus {
            total_countries: self.count()?,
            last_refreshed_at: self.last_refreshed_at()?,
        })
    }
}

/// Merge a patch into a record, re-validating and re-deriving `estimated_gdp`.
///
/// A blank text value clears the field. Switching to a different currency
/// requires a new exchange rate in the same patch.
pub fn apply_patch(
    mut record: CountryRecord,
    patch: &CountryPatch,
    now: DateTime<Utc>,
) -> Result<CountryRecord> {
    if let Some(capital) = &patch.capital {
        record.capital = non_blank(Some(capital));
    }
    if let Some(region) = &patch.region {
        record.region = non_blank(Some(region));
    }
    if let Some(flag) = &patch.flag_url {
        record.flag_url = non_blank(Some(flag));
    }
    if let Some(code) = &patch.currency_code {
        let code = validate_currency_code(code)?;
        if code != record.currency_code && patch.exchange_rate.is_none() {
            return Err(Error::invalid(
                "exchange_rate",
                format!(
                    "changing currency from {} to {code} needs a new exchange rate",
                    record.currency_code
                ),
            ));
        }
        record.currency_code = code;
    }
    if let Some(population) = patch.population {
        record.population = population;
    }
    if let Some(rate) = patch.exchange_rate {
        validate_exchange_rate(rate)?;
        record.exchange_rate = rate;
    }
    record.estimated_gdp = checked_gdp(record.population, record.exchange_rate)?;
    record.last_refreshed_at = now;
    Ok(record)
}

fn not_found(name: &str) -> Error {
    Error::NotFound {
        name: name.trim().to_string(),
    }
}

fn clamp_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn exists(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM countries WHERE name = ?1 LIMIT 1",
        [name.trim()],
        |_| Ok(()),
    )
    .optional()
    .map(|r| r.is_some())
    .map_err(Error::db("check country exists"))
}

fn find(conn: &Connection, name: &str) -> Result<Option<CountryRecord>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM countries WHERE name = ?1"),
        [name.trim()],
        row_to_record,
    )
    .optional()
    .map_err(Error::db("read country"))
}

fn upsert_in(tx: &Transaction<'_>, record: &CountryRecord) -> Result<Upserted> {
    let record = validate_record(record.clone())?;
    if exists(tx, &record.name)? {
        write_existing(tx, &record)?;
        Ok(Upserted::Updated)
    } else {
        insert(tx, &record)?;
        Ok(Upserted::Inserted)
    }
}

fn population_param(record: &CountryRecord) -> Result<i64> {
    i64::try_from(record.population).map_err(|_| {
        Error::invalid(
            "population",
            format!("{} does not fit the store", record.population),
        )
    })
}

fn insert(conn: &Connection, r: &CountryRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO countries ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            r.name,
            r.capital,
            r.region,
            population_param(r)?,
            r.currency_code,
            r.exchange_rate,
            r.estimated_gdp,
            r.flag_url,
            format_timestamp(&r.last_refreshed_at),
        ],
    )
    .map_err(Error::db("insert country"))?;
    Ok(())
}

fn write_existing(conn: &Connection, r: &CountryRecord) -> Result<()> {
    conn.execute(
        "UPDATE countries SET capital = ?2, region = ?3, population = ?4, currency_code = ?5, \
         exchange_rate = ?6, estimated_gdp = ?7, flag_url = ?8, last_refreshed_at = ?9 \
         WHERE name = ?1",
        params![
            r.name,
            r.capital,
            r.region,
            population_param(r)?,
            r.currency_code,
            r.exchange_rate,
            r.estimated_gdp,
            r.flag_url,
            format_timestamp(&r.last_refreshed_at),
        ],
    )
    .map_err(Error::db("update country"))?;
    Ok(())
}

// Fixed-width UTC form so MAX() over the text column orders chronologically.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CountryRecord> {
    let population: i64 = row.get(3)?;
    let population = u64::try_from(population)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, Box::new(e)))?;
    let ts: String = row.get(8)?;
    Ok(CountryRecord {
        name: row.get(0)?,
        capital: row.get(1)?,
        region: row.get(2)?,
        population,
        currency_code: row.get(4)?,
        exchange_rate: row.get(5)?,
        estimated_gdp: row.get(6)?,
        flag_url: row.get(7)?,
        last_refreshed_at: parse_timestamp(8, &ts)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::normalize::estimated_gdp;

    fn rec(name: &str, code: &str, population: u64, rate: f64) -> CountryRecord {
        CountryRecord {
            name: name.into(),
            capital: None,
            region: Some("Testregion".into()),
            population,
            currency_code: code.into(),
            exchange_rate: rate,
            estimated_gdp: estimated_gdp(population, rate),
            flag_url: None,
            last_refreshed_at: Utc::now(),
        }
    }

    #[test]
    fn create_then_read_round_trips() {
        let mut store = CountryStore::open_in_memory().unwrap();
        let created = store.create(&rec("Testland", "TST", 1000, 2.5)).unwrap();
        let read = store.read("Testland").unwrap();
        assert_eq!(read.name, created.name);
        assert_eq!(read.population, 1000);
        assert_eq!(read.estimated_gdp, 2500.0);
        assert_eq!(
            format_timestamp(&read.last_refreshed_at),
            format_timestamp(&created.last_refreshed_at)
        );
    }

    #[test]
    fn names_compare_case_insensitively() {
        let mut store = CountryStore::open_in_memory().unwrap();
        store.create(&rec("Testland", "TST", 1, 1.0)).unwrap();
        assert_eq!(store.read("testland").unwrap().name, "Testland");
        let dup = store.create(&rec("TESTLAND", "TST", 1, 1.0)).unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::DuplicateKey);
    }

    #[test]
    fn create_recomputes_stale_gdp() {
        let mut store = CountryStore::open_in_memory().unwrap();
        let mut r = rec("Testland", "TST", 10, 3.0);
        r.estimated_gdp = 1.0;
        assert_eq!(store.create(&r).unwrap().estimated_gdp, 30.0);
        assert_eq!(store.read("Testland").unwrap().estimated_gdp, 30.0);
    }

    #[test]
    fn apply_patch_leaves_unset_fields() {
        let base = rec("Testland", "TST", 10, 2.0);
        let now = Utc::now();
        let patched = apply_patch(
            base.clone(),
            &CountryPatch {
                capital: Some("Testville".into()),
                ..CountryPatch::default()
            },
            now,
        )
        .unwrap();
        assert_eq!(patched.capital.as_deref(), Some("Testville"));
        assert_eq!(patched.population, base.population);
        assert_eq!(patched.estimated_gdp, 20.0);
        assert_eq!(patched.last_refreshed_at, now);
    }

    #[test]
    fn blank_patch_text_clears_field() {
        let mut base = rec("Testland", "TST", 10, 2.0);
        base.capital = Some("Testville".into());
        let patched = apply_patch(
            base,
            &CountryPatch {
                capital: Some("   ".into()),
                region: Some(" Arctic ".into()),
                ..CountryPatch::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(patched.capital, None);
        assert_eq!(patched.region.as_deref(), Some("Arctic"));
    }

    #[test]
    fn currency_switch_needs_new_rate() {
        let base = rec("Testland", "TST", 10, 2.0);
        let only_code = CountryPatch {
            currency_code: Some("EUR".into()),
            ..CountryPatch::default()
        };
        let err = apply_patch(base.clone(), &only_code, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidRecord {
                field: "exchange_rate",
                ..
            }
        ));

        // same code, different case: not a switch
        let same = CountryPatch {
            currency_code: Some("tst".into()),
            ..CountryPatch::default()
        };
        assert_eq!(apply_patch(base.clone(), &same, Utc::now()).unwrap().exchange_rate, 2.0);

        let with_rate = CountryPatch {
            exchange_rate: Some(0.5),
            ..only_code
        };
        let patched = apply_patch(base, &with_rate, Utc::now()).unwrap();
        assert_eq!(patched.currency_code, "EUR");
        assert_eq!(patched.estimated_gdp, 5.0);
    }

    #[test]
    fn status_tracks_count_and_latest_refresh() {
        let mut store = CountryStore::open_in_memory().unwrap();
        assert_eq!(store.status().unwrap().total_countries, 0);
        assert!(store.status().unwrap().last_refreshed_at.is_none());

        let mut old = rec("Oldland", "OLD", 1, 1.0);
        old.last_refreshed_at = "2020-01-01T00:00:00Z".parse().unwrap();
        let mut new = rec("Newland", "NEW", 1, 1.0);
        new.last_refreshed_at = "2024-06-01T12:00:00Z".parse().unwrap();
        store.create(&old).unwrap();
        store.create(&new).unwrap();

        let status = store.status().unwrap();
        assert_eq!(status.total_countries, 2);
        assert_eq!(status.last_refreshed_at, Some(new.last_refreshed_at));
    }
}
