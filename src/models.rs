use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One currency entry of a raw country payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCurrency {
    pub code: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

/// Raw country entry as served by the country API (RestCountries v2 field set).
///
/// Nothing is validated here; see [`crate::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCountry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Signed so that a negative upstream value can be rejected instead of wrapping.
    #[serde(default, deserialize_with = "de_i64_from_string_or_number")]
    pub population: i64,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub currencies: Option<Vec<RawCurrency>>,
}

impl RawCountry {
    /// Currency code of the first listed currency, if any.
    pub fn currency_code(&self) -> Option<&str> {
        self.currencies
            .as_ref()?
            .first()?
            .code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Serde helper: parse `i64` from either a JSON number or a string.
fn de_i64_from_string_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    struct I64Visitor;

    impl<'de> Visitor<'de> for I64Visitor {
        type Value = i64;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a string or integer representing a population count")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            i64::try_from(v).map_err(E::custom)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v)
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.fract() != 0.0 || !v.is_finite() {
                return Err(E::custom("population must be a whole number"));
            }
            Ok(v as i64)
        }

        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            s.trim().parse::<i64>().map_err(E::custom)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(0)
        }
    }

    deserializer.deserialize_any(I64Visitor)
}

/// Exchange-rate payload (open.er-api.com `latest` shape).
///
/// `rates` maps a currency code to units of that currency per one unit of
/// `base_code`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default, alias = "base")]
    pub base_code: String,
    #[serde(default)]
    pub time_last_update_unix: Option<i64>,
    #[serde(default)]
    pub rates: AHashMap<String, f64>,
}

impl RateTable {
    pub fn new(base_code: impl Into<String>) -> Self {
        Self {
            base_code: base_code.into(),
            ..Self::default()
        }
    }

    /// Builder-style insert, handy for fixtures.
    pub fn with_rate(mut self, code: impl Into<String>, rate: f64) -> Self {
        self.rates.insert(code.into(), rate);
        self
    }

    /// Case-insensitive lookup by currency code.
    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied().or_else(|| {
            let upper = code.to_ascii_uppercase();
            self.rates.get(&upper).copied()
        })
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// A country's stored state. `estimated_gdp` is always `population * exchange_rate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountryRecord {
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: u64,
    pub currency_code: String,
    pub exchange_rate: f64,
    pub estimated_gdp: f64,
    pub flag_url: Option<String>,
    pub last_refreshed_at: DateTime<Utc>,
}

/// Partial update for a stored record. `None` leaves the field unchanged; a
/// blank text value clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryPatch {
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub population: Option<u64>,
    /// A code different from the stored one must come with `exchange_rate`.
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub exchange_rate: Option<f64>,
    #[serde(default)]
    pub flag_url: Option<String>,
}

impl CountryPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Store-wide status as reported by the `status` surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreStatus {
    pub total_countries: u64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}
