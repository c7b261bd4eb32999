use chrono::Utc;
use country_fx::CountryRecord;
use country_fx::normalize::estimated_gdp;
use country_fx::viz::{self, ImageFormat, RenderOptions};
use std::fs;

fn sample() -> Vec<CountryRecord> {
    [
        ("Nigeria", "NGN", 206_139_587, 1466.2),
        ("Germany", "EUR", 83_240_525, 0.857),
        ("Ghana", "GHS", 31_072_945, 10.9),
        ("A country with an exceedingly long official name for truncation", "TST", 1_000, 2.5),
    ]
    .into_iter()
    .map(|(name, code, population, rate)| CountryRecord {
        name: name.into(),
        capital: None,
        region: None,
        population,
        currency_code: code.into(),
        exchange_rate: rate,
        estimated_gdp: estimated_gdp(population, rate),
        flag_url: None,
        last_refreshed_at: Utc::now(),
    })
    .collect()
}

#[test]
fn render_png_and_svg_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("cache/summary.png");
    let svg = dir.path().join("summary.svg");

    viz::render_to_path(&sample(), &png, &RenderOptions::default()).unwrap();
    let bytes = fs::read(&png).unwrap();
    assert!(bytes.starts_with(b"\x89PNG"));

    viz::render_to_path(&sample(), &svg, &RenderOptions::default()).unwrap();
    let text = fs::read_to_string(&svg).unwrap();
    assert!(text.contains("<svg"));
    assert!(text.contains("Nigeria"));
}

#[test]
fn svg_respects_top_n_and_locale() {
    let opts = RenderOptions {
        format: ImageFormat::Svg,
        top_n: 2,
        locale: "de".into(),
        width: 640,
        height: 400,
        ..RenderOptions::default()
    };
    let svg = String::from_utf8(viz::render(&sample(), &opts).unwrap()).unwrap();
    assert!(svg.contains("Nigeria"));
    assert!(svg.contains("Ghana"));
    assert!(!svg.contains("Germany ("));
    // German thousands separator in the population total
    assert!(svg.contains("320.454.057"), "population total not localized");
}

#[test]
fn format_follows_extension() {
    assert_eq!(ImageFormat::from_path("x.SVG".as_ref()), ImageFormat::Svg);
    assert_eq!(ImageFormat::from_path("x.png".as_ref()), ImageFormat::Png);
    assert_eq!(ImageFormat::from_path("x".as_ref()), ImageFormat::Png);
    assert_eq!(ImageFormat::Svg.mime_type(), "image/svg+xml");
}
