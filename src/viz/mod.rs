//! Summary renderer: a horizontal bar chart of the top countries by estimated GDP,
//! headed by the country count and last refresh time, as **PNG** or **SVG**.

pub mod text;
pub mod types;
pub mod util;

pub use types::{DEFAULT_TOP_N, ImageFormat, RenderOptions};

use crate::error::{Error, Result};
use crate::models::CountryRecord;
use crate::stats::{Summary, summarize};

use plotters::backend::DrawingBackend;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use plotters_bitmap::BitMapBackend;
use plotters_svg::SVGBackend;

use std::fmt::Debug;
use std::fs;
use std::path::Path;
use std::sync::Once;

use text::truncate_to_width;
use util::{choose_axis_scale, format_count, format_scaled, map_locale, office_color};

/// One-time registration for a fallback "sans-serif" font when using the `ab_glyph` text path.
/// Required because `ab_glyph` doesn't discover OS fonts.
static INIT_FONTS: Once = Once::new();

fn ensure_fonts_registered() {
    INIT_FONTS.call_once(|| {
        let _ = plotters::style::register_font(
            "sans-serif",
            plotters::style::FontStyle::Normal,
            include_bytes!("../../assets/DejaVuSans.ttf"),
        );
    });
}

fn render_err<E: Debug>(e: E) -> Error {
    Error::Render(format!("{e:?}"))
}

/// Render the summary image for `records` and return the encoded bytes.
///
/// ### Errors
/// [`Error::Render`] when `records` is empty or drawing fails.
pub fn render(records: &[CountryRecord], opts: &RenderOptions) -> Result<Vec<u8>> {
    if records.is_empty() {
        return Err(Error::Render("no countries to render".into()));
    }
    ensure_fonts_registered();
    let summary = summarize(records, opts.top_n.max(1));
    let size = (opts.width.max(200), opts.height.max(150));

    match opts.format {
        ImageFormat::Svg => {
            let mut buf = String::new();
            {
                let root = SVGBackend::with_string(&mut buf, size).into_drawing_area();
                draw_summary(root, &summary, opts)?;
            }
            Ok(buf.into_bytes())
        }
        ImageFormat::Png => {
            // The bitmap backend encodes through its file path, so go via a scratch file.
            let tmp = tempfile::Builder::new()
                .prefix("country-fx-summary")
                .suffix(".png")
                .tempfile()
                .map_err(|source| Error::Io {
                    path: std::env::temp_dir(),
                    source,
                })?;
            {
                let root = BitMapBackend::new(tmp.path(), size).into_drawing_area();
                draw_summary(root, &summary, opts)?;
            }
            fs::read(tmp.path()).map_err(|source| Error::Io {
                path: tmp.path().to_path_buf(),
                source,
            })
        }
    }
}

/// Render and write to `out_path`, creating parent directories. The format is
/// taken from the path extension (`.svg` or PNG otherwise).
pub fn render_to_path<P: AsRef<Path>>(
    records: &[CountryRecord],
    out_path: P,
    opts: &RenderOptions,
) -> Result<()> {
    let out_path = out_path.as_ref();
    let opts = RenderOptions {
        format: ImageFormat::from_path(out_path),
        ..opts.clone()
    };
    let bytes = render(records, &opts)?;
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(out_path, bytes).map_err(|source| Error::Io {
        path: out_path.to_path_buf(),
        source,
    })
}

fn draw_summary<DB>(root: DrawingArea<DB, Shift>, summary: &Summary, opts: &RenderOptions) -> Result<()>
where
    DB: DrawingBackend,
{
    const HEADER_H: u32 = 86;
    const MARGIN: i32 = 16;
    const LABEL_PX: u32 = 13;

    root.fill(&WHITE).map_err(render_err)?;
    let (locale, dec_sep) = map_locale(&opts.locale);
    let (root_w, _) = root.dim_in_pixel();

    // ----------------------------
    // 1) Header: title, totals, refresh time
    // ----------------------------
    let (header, body) = root.split_vertically(HEADER_H);
    let title_style = ("sans-serif", 22).into_font().color(&BLACK);
    let line_style = ("sans-serif", 14).into_font().color(&BLACK);
    header
        .draw(&Text::new(opts.title.clone(), (MARGIN, 10), title_style))
        .map_err(render_err)?;
    let totals = format!(
        "Total countries: {}    Total population: {}",
        format_count(summary.total_countries as u64, locale),
        format_count(summary.total_population, locale)
    );
    header
        .draw(&Text::new(totals, (MARGIN, 42), line_style.clone()))
        .map_err(render_err)?;
    let refreshed = match summary.last_refreshed_at {
        Some(ts) => format!("Last refreshed: {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
        None => "Last refreshed: never".to_string(),
    };
    header
        .draw(&Text::new(refreshed, (MARGIN, 62), line_style))
        .map_err(render_err)?;

    // ----------------------------
    // 2) Axis scaling
    // ----------------------------
    let bars = &summary.top_by_gdp;
    let n = bars.len().max(1);
    let max_gdp = bars
        .iter()
        .map(|r| r.estimated_gdp)
        .fold(0.0_f64, f64::max);
    if !max_gdp.is_finite() {
        return Err(Error::Render(format!("estimated GDP {max_gdp} cannot be charted")));
    }
    let (scale, scale_word) = choose_axis_scale(max_gdp);
    let x_max = if max_gdp > 0.0 { max_gdp / scale * 1.05 } else { 1.0 };
    let x_desc = if scale_word.is_empty() {
        "Estimated GDP".to_string()
    } else {
        format!("Estimated GDP ({scale_word})")
    };

    let mut chart = ChartBuilder::on(&body)
        .margin(MARGIN as u32)
        .set_label_area_size(LabelAreaPosition::Bottom, 44)
        .set_label_area_size(LabelAreaPosition::Left, 8)
        .build_cartesian_2d(0f64..x_max, 0f64..n as f64)
        .map_err(render_err)?;

    let x_label_fmt = |v: &f64| format_scaled(*v, dec_sep);
    chart
        .configure_mesh()
        .disable_y_mesh()
        .disable_y_axis()
        .x_desc(x_desc)
        .x_labels(8)
        .x_label_formatter(&x_label_fmt)
        .label_style(("sans-serif", 12))
        .axis_desc_style(("sans-serif", 14))
        .draw()
        .map_err(render_err)?;

    // ----------------------------
    // 3) Bars, largest on top
    // ----------------------------
    let slot = |rank: usize| (n - 1 - rank) as f64;
    chart
        .draw_series(bars.iter().enumerate().map(|(rank, r)| {
            let y = slot(rank);
            Rectangle::new(
                [(0.0, y + 0.15), (r.estimated_gdp / scale, y + 0.85)],
                office_color(rank).mix(0.55).filled(),
            )
        }))
        .map_err(render_err)?;

    // Labels sit inside the plot, left-aligned from the axis.
    let plot_w_px = root_w.saturating_sub(2 * MARGIN as u32 + 8);
    let label_style = ("sans-serif", LABEL_PX)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));
    let x_pad = x_max * 0.005;
    chart
        .draw_series(bars.iter().enumerate().map(|(rank, r)| {
            let label = format!(
                "{}. {} ({}) {}",
                rank + 1,
                r.name,
                r.currency_code,
                format_scaled(r.estimated_gdp / scale, dec_sep)
            );
            Text::new(
                truncate_to_width(&label, LABEL_PX, plot_w_px),
                (x_pad, slot(rank) + 0.5),
                label_style.clone(),
            )
        }))
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}
