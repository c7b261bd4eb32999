//! Runtime settings. Each field can come from a command-line flag or an
//! environment variable; [`Settings::default`] holds the built-in values.

use clap::Args;
use std::path::PathBuf;

pub const DEFAULT_COUNTRIES_URL: &str =
    "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies";
pub const DEFAULT_RATES_URL: &str = "https://open.er-api.com/v6/latest/USD";

#[derive(Args, Debug, Clone, PartialEq)]
pub struct Settings {
    /// SQLite database file holding the country table.
    #[arg(long = "database", env = "DATABASE_URL", default_value = "countries.db", global = true)]
    pub database_path: PathBuf,
    /// Country metadata endpoint.
    #[arg(long, env = "COUNTRIES_API_URL", default_value = DEFAULT_COUNTRIES_URL, global = true)]
    pub countries_url: String,
    /// Exchange-rate endpoint.
    #[arg(long, env = "RATES_API_URL", default_value = DEFAULT_RATES_URL, global = true)]
    pub rates_url: String,
    /// Total timeout for each upstream request, in seconds.
    #[arg(long = "timeout", env = "HTTP_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub timeout_secs: u64,
    /// Connect timeout for each upstream request, in seconds.
    #[arg(long = "connect-timeout", env = "HTTP_CONNECT_TIMEOUT_SECS", default_value_t = 10, global = true)]
    pub connect_timeout_secs: u64,
    /// Where `refresh` writes the summary image.
    #[arg(long = "summary-image", env = "SUMMARY_IMAGE_PATH", default_value = "cache/summary.png", global = true)]
    pub summary_image_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("countries.db"),
            countries_url: DEFAULT_COUNTRIES_URL.to_string(),
            rates_url: DEFAULT_RATES_URL.to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            summary_image_path: PathBuf::from("cache/summary.png"),
        }
    }
}

impl Settings {
    /// Accept `sqlite://path` / `sqlite:path` forms of `DATABASE_URL` as plain paths.
    pub fn database_file(&self) -> PathBuf {
        let raw = self.database_path.to_string_lossy();
        match raw
            .strip_prefix("sqlite://")
            .or_else(|| raw.strip_prefix("sqlite:"))
        {
            Some(rest) => PathBuf::from(rest),
            None => self.database_path.clone(),
        }
    }
}
