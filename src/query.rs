//! Typed filter/sort arguments for [`crate::storage::CountryStore::list`], and
//! the translation from request strings into them.
//!
//! The vocabulary is closed: anything outside the keys below is rejected with
//! [`Error::InvalidQuery`].
//!
//! | key              | value                                   |
//! |------------------|-----------------------------------------|
//! | `region`         | region name, case-insensitive           |
//! | `currency`       | currency code, case-insensitive         |
//! | `min_population` | inclusive lower bound                   |
//! | `max_population` | inclusive upper bound                   |
//! | `sort`           | `{name,population,gdp}_{asc,desc}`      |
//! | `limit`          | maximum number of rows                  |
//! | `offset`         | rows to skip                            |

use crate::error::{Error, Result};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Column a listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Name,
    Population,
    EstimatedGdp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Sort order; equal keys always fall back to `name` ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountrySort {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl CountrySort {
    pub const fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }
}

impl FromStr for CountrySort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (key, dir) = s
            .trim()
            .rsplit_once('_')
            .ok_or_else(|| Error::query("sort", format!("{s:?} is not <key>_<asc|desc>")))?;
        let key = match key.to_ascii_lowercase().as_str() {
            "name" => SortKey::Name,
            "population" => SortKey::Population,
            "gdp" | "estimated_gdp" => SortKey::EstimatedGdp,
            other => return Err(Error::query("sort", format!("unknown sort key {other:?}"))),
        };
        let direction = match dir.to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => {
                return Err(Error::query(
                    "sort",
                    format!("unknown sort direction {other:?}"),
                ));
            }
        };
        Ok(Self { key, direction })
    }
}

impl fmt::Display for CountrySort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self.key {
            SortKey::Name => "name",
            SortKey::Population => "population",
            SortKey::EstimatedGdp => "gdp",
        };
        let dir = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{key}_{dir}")
    }
}

/// Filter predicates; every `Some` must hold for a row to be returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryFilter {
    pub region: Option<String>,
    pub currency_code: Option<String>,
    pub min_population: Option<u64>,
    pub max_population: Option<u64>,
}

/// Everything `list` needs: filter, sort, and an optional page window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryQuery {
    pub filter: CountryFilter,
    pub sort: CountrySort,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl CountryQuery {
    /// Translate `key=value` pairs into a query.
    ///
    /// Keys are matched case-insensitively; each key may appear once.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut q = CountryQuery::default();
        let mut seen = BTreeSet::new();
        for (key, value) in pairs {
            let key = key.as_ref().trim().to_ascii_lowercase();
            let value = value.as_ref().trim();
            if !seen.insert(key.clone()) {
                return Err(Error::query(key, "given more than once"));
            }
            if value.is_empty() {
                return Err(Error::query(key, "empty value"));
            }
            match key.as_str() {
                "region" => q.filter.region = Some(value.to_string()),
                "currency" | "currency_code" => {
                    q.filter.currency_code = Some(value.to_ascii_uppercase())
                }
                "min_population" => q.filter.min_population = Some(parse_num(&key, value)?),
                "max_population" => q.filter.max_population = Some(parse_num(&key, value)?),
                "sort" => q.sort = value.parse()?,
                "limit" => q.limit = Some(parse_num(&key, value)?),
                "offset" => q.offset = Some(parse_num(&key, value)?),
                _ => return Err(Error::query(key, "unrecognized filter key")),
            }
        }
        if let (Some(lo), Some(hi)) = (q.filter.min_population, q.filter.max_population)
            && lo > hi
        {
            return Err(Error::query(
                "min_population",
                format!("{lo} is greater than max_population {hi}"),
            ));
        }
        Ok(q)
    }

    /// Parse a URL-style query string (`region=Africa&sort=gdp_desc`), percent-decoding
    /// keys and values. A leading `?` is ignored.
    pub fn from_query_string(qs: &str) -> Result<Self> {
        Self::from_pairs(split_query_string(qs)?)
    }

    /// Build a query from command-line words.
    ///
    /// Each word is a literal `key=value` pair (split on the first `=`, no
    /// decoding), unless it reads as a URL query string: a leading `?`, or
    /// `&`-separated segments that all contain `=`. Those are decoded like
    /// [`CountryQuery::from_query_string`].
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let mut pairs = Vec::new();
        for arg in args {
            let arg = arg.as_ref();
            if is_query_string(arg) {
                pairs.extend(split_query_string(arg)?);
            } else {
                let (k, v) = arg
                    .split_once('=')
                    .ok_or_else(|| Error::query(arg, "expected key=value"))?;
                pairs.push((k.to_string(), v.to_string()));
            }
        }
        Self::from_pairs(pairs)
    }
}

fn is_query_string(arg: &str) -> bool {
    arg.starts_with('?')
        || (arg.contains('&') && arg.split('&').all(|p| p.is_empty() || p.contains('=')))
}

/// Split a query string into decoded `(key, value)` pairs.
pub fn split_query_string(qs: &str) -> Result<Vec<(String, String)>> {
    let qs = qs.trim().trim_start_matches('?');
    let mut out = Vec::new();
    for part in qs.split('&').filter(|p| !p.is_empty()) {
        let (k, v) = part
            .split_once('=')
            .ok_or_else(|| Error::query(part, "expected key=value"))?;
        out.push((decode(k)?, decode(v)?));
    }
    Ok(out)
}

fn decode(s: &str) -> Result<String> {
    let plus_as_space = s.replace('+', " ");
    percent_decode_str(&plus_as_space)
        .decode_utf8()
        .map(|c| c.into_owned())
        .map_err(|e| Error::query(s, format!("invalid percent-encoding: {e}")))
}

fn parse_num<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| Error::query(key, format!("{value:?}: {e}")))
}
