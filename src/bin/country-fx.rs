use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use country_fx::viz::{self, RenderOptions};
use country_fx::{Client, CountryPatch, CountryQuery, CountryRecord, CountryStore, Settings};
use country_fx::{export, ingest, normalize, stats};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "country-fx",
    version,
    about = "Fetch, store, query & summarize country currency and exchange-rate data"
)]
struct Cli {
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch all countries and rates, store them, and regenerate the summary image.
    Refresh(RefreshArgs),
    /// Fetch and store a single country by name.
    Ingest { name: String },
    /// List stored countries, e.g. `list region=Africa sort=gdp_desc`.
    List(QueryArgs),
    /// Show one country.
    Get { name: String },
    /// Insert a country by hand.
    Create(CreateArgs),
    /// Change fields of a stored country; estimated GDP is recomputed.
    Update(UpdateArgs),
    /// Remove a country.
    Delete { name: String },
    /// Country count and last refresh time.
    Status {
        /// Include summary statistics and the GDP ranking.
        #[arg(long, default_value_t = false)]
        detailed: bool,
    },
    /// Render the summary image from stored data.
    Image(ImageArgs),
    /// Export stored countries to CSV or JSON.
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct RefreshArgs {
    /// Do not write the summary image after refreshing.
    #[arg(long, default_value_t = false)]
    no_image: bool,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Filter/sort parameters as literal `key=value` words, or one URL-encoded
    /// `a=b&c=d` string. Keys: region, currency, min_population, max_population,
    /// sort, limit, offset.
    params: Vec<String>,
}

impl QueryArgs {
    fn query(&self) -> Result<CountryQuery> {
        Ok(CountryQuery::from_args(&self.params)?)
    }
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[arg(long)]
    name: String,
    /// Currency code, e.g. EUR.
    #[arg(long)]
    currency: String,
    #[arg(long)]
    population: u64,
    /// Units of the currency per one unit of the base currency.
    #[arg(long)]
    rate: f64,
    #[arg(long)]
    capital: Option<String>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    flag_url: Option<String>,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    name: String,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long)]
    population: Option<u64>,
    #[arg(long)]
    rate: Option<f64>,
    #[arg(long)]
    capital: Option<String>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    flag_url: Option<String>,
}

#[derive(Args, Debug)]
struct ImageArgs {
    /// Output path (.png or .svg). Defaults to the configured summary image path.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Number of countries to chart.
    #[arg(long, default_value_t = viz::DEFAULT_TOP_N)]
    top: usize,
    /// Width of the image (default 1000).
    #[arg(long, default_value_t = 1000)]
    width: u32,
    /// Height of the image (default 600).
    #[arg(long, default_value_t = 600)]
    height: u32,
    /// Locale for number labels (en, de, fr, ...).
    #[arg(long, default_value = "en")]
    locale: String,
    #[command(flatten)]
    query: QueryArgs,
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(long)]
    out: PathBuf,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    #[command(flatten)]
    query: QueryArgs,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(settings: &Settings) -> Result<CountryStore> {
    let path = settings.database_file();
    CountryStore::open(&path).with_context(|| format!("open store {}", path.display()))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err),
    }
}

/// Print a structured error on stderr; client errors exit with 2, everything else with 1.
fn report_failure(err: &anyhow::Error) -> ExitCode {
    match err.chain().find_map(|e| e.downcast_ref::<country_fx::Error>()) {
        Some(e) => {
            let report = e.report();
            match serde_json::to_string(&report) {
                Ok(s) => eprintln!("{s}"),
                Err(_) => eprintln!("{e}"),
            }
            if (400..500).contains(&report.status) {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
        None => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = cli.settings;
    match cli.cmd {
        Command::Refresh(args) => cmd_refresh(&settings, args),
        Command::Ingest { name } => {
            let client = Client::from_settings(&settings)?;
            let mut store = open_store(&settings)?;
            let (record, _) = ingest::ingest_country(&client, &mut store, &name, chrono::Utc::now())?;
            print_json(&record)
        }
        Command::List(args) => {
            let store = open_store(&settings)?;
            print_json(&store.list(&args.query()?)?)
        }
        Command::Get { name } => {
            let store = open_store(&settings)?;
            print_json(&store.read(&name)?)
        }
        Command::Create(args) => {
            let mut store = open_store(&settings)?;
            let record = CountryRecord {
                name: args.name,
                capital: args.capital,
                region: args.region,
                population: args.population,
                currency_code: args.currency,
                exchange_rate: args.rate,
                estimated_gdp: normalize::estimated_gdp(args.population, args.rate),
                flag_url: args.flag_url,
                last_refreshed_at: chrono::Utc::now(),
            };
            print_json(&store.create(&record)?)
        }
        Command::Update(args) => {
            let mut store = open_store(&settings)?;
            let patch = CountryPatch {
                capital: args.capital,
                region: args.region,
                population: args.population,
                currency_code: args.currency,
                exchange_rate: args.rate,
                flag_url: args.flag_url,
            };
            if patch.is_empty() {
                anyhow::bail!("nothing to update: pass at least one field flag");
            }
            print_json(&store.update(&args.name, &patch)?)
        }
        Command::Delete { name } => {
            let mut store = open_store(&settings)?;
            store.delete(&name)?;
            print_json(&serde_json::json!({ "message": format!("Country {name} deleted") }))
        }
        Command::Status { detailed } => {
            let store = open_store(&settings)?;
            if detailed {
                let records = store.list(&CountryQuery::default())?;
                print_json(&stats::summarize(&records, 5))
            } else {
                print_json(&store.status()?)
            }
        }
        Command::Image(args) => {
            let store = open_store(&settings)?;
            let records = store.list(&args.query.query()?)?;
            let out = args.out.unwrap_or_else(|| settings.summary_image_path.clone());
            let opts = RenderOptions {
                width: args.width,
                height: args.height,
                top_n: args.top,
                locale: args.locale,
                ..RenderOptions::default()
            };
            viz::render_to_path(&records, &out, &opts)?;
            eprintln!("Wrote summary image to {}", out.display());
            Ok(())
        }
        Command::Export(args) => {
            let store = open_store(&settings)?;
            let records = store.list(&args.query.query()?)?;
            let fmt = match args.format {
                Some(OutFormat::Csv) => "csv",
                Some(OutFormat::Json) => "json",
                None => args.out.extension().and_then(|e| e.to_str()).unwrap_or("csv"),
            }
            .to_ascii_lowercase();
            match fmt.as_str() {
                "csv" => export::save_csv(&records, &args.out)?,
                "json" => export::save_json(&records, &args.out)?,
                other => anyhow::bail!("unsupported format: {}", other),
            }
            eprintln!("Saved {} rows to {}", records.len(), args.out.display());
            Ok(())
        }
    }
}

fn cmd_refresh(settings: &Settings, args: RefreshArgs) -> Result<()> {
    let client = Client::from_settings(settings)?;
    let mut store = open_store(settings)?;
    let report = ingest::refresh(&client, &mut store, chrono::Utc::now())?;

    if !args.no_image && store.count()? > 0 {
        let records = store.list(&CountryQuery::default())?;
        viz::render_to_path(&records, &settings.summary_image_path, &RenderOptions::default())?;
        eprintln!(
            "Wrote summary image to {}",
            settings.summary_image_path.display()
        );
    }

    print_json(&serde_json::json!({
        "message": "Countries data refreshed successfully",
        "countries_processed": report.processed(),
        "inserted": report.inserted,
        "updated": report.updated,
        "skipped": report.skipped,
        "timestamp": report.refreshed_at,
    }))
}
