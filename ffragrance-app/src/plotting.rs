//! Renders the category breakdown of a formula as a PNG bar chart.

use crate::report::BreakdownEntry;
use anyhow::{anyhow, Result};
use ffragrance_schemas::color::Rgba;
use plotters::prelude::*;
use std::path::Path;
use tracing::{info, warn};

fn to_plot_color(color: Rgba) -> RGBColor {
    let [r, g, b, _] = color.to_rgba8();
    RGBColor(r, g, b)
}

/// Default output file for a formula's chart, derived from its name.
pub fn default_chart_path(formula_name: &str) -> String {
    let slug: String = formula_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{}_composition.png", slug.trim_matches('_'))
}

/// Draws one horizontal bar per category, in the category's colour. Returns
/// `false` without touching the filesystem when there is nothing to draw.
pub fn plot_category_breakdown(path: &Path, formula_name: &str, entries: &[BreakdownEntry]) -> Result<bool> {
    if entries.is_empty() {
        warn!(formula = %formula_name, "no ingredients to plot");
        return Ok(false);
    }

    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_share = entries.iter().map(|e| e.share).fold(0.0, f64::max).max(1.0);
    let bar_count = entries.len() as i32;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Composition of {}", formula_name),
            ("sans-serif", 40).into_font(),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(160)
        .build_cartesian_2d(0f64..max_share * 1.1, 0i32..bar_count)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(entries.len() + 1)
        .y_label_formatter(&|index: &i32| {
            // bars occupy [i, i + 1); label them at their lower edge, top first
            usize::try_from(bar_count - 1 - *index)
                .ok()
                .and_then(|i| entries.get(i))
                .map_or_else(String::new, |entry| entry.label.clone())
        })
        .x_desc("Share of formula (%)")
        .draw()?;

    for (i, entry) in entries.iter().enumerate() {
        let color = to_plot_color(entry.color);
        let row = bar_count - 1 - i as i32;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(0.0, row), (entry.share, row + 1)],
                color.filled(),
            )))?
            .label(format!("{} ({:.2}%)", entry.label, entry.share))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()
        .map_err(|e| anyhow!("Failed to write chart {:?}: {}", path, e))?;

    info!(path = %path.display(), bars = entries.len(), "breakdown chart written");
    Ok(true)
}
