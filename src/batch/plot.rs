//! Bar chart of the evidence counts of every genome in a batch.

use crate::report::RunSummary;
use color_eyre::eyre::{Report, Result, WrapErr};
use std::path::Path;
use svg::node::element::{Line, Rectangle, Text};
use svg::Document;

const ROW_HEIGHT: f64 = 64.0;
const LABEL_WIDTH: f64 = 260.0;
const BAR_WIDTH: f64 = 420.0;
const MARGIN: f64 = 20.0;

/// Name and color of each bar.
const SERIES: [(&str, &str); 4] =
    [("Duplication", "#4e79a7"), ("BGC proximity", "#f28e2b"), ("Phylogeny", "#59a14f"), ("Two or more criteria", "#e15759")];

fn values(summary: &RunSummary) -> [usize; 4] {
    [summary.duplicates, summary.proximity, summary.phylogeny, summary.multi_criteria.two_plus.len()]
}

/// Draw one group of bars per genome, scaled to the largest count of the batch.
pub fn summary_plot(summaries: &[(String, RunSummary)]) -> Document {
    let max = summaries.iter().flat_map(|(_, s)| values(s)).max().unwrap_or(0).max(1) as f64;
    let legend_height = 24.0;
    let width = MARGIN * 2.0 + LABEL_WIDTH + BAR_WIDTH + 40.0;
    let height = MARGIN * 2.0 + legend_height + ROW_HEIGHT * summaries.len().max(1) as f64;

    let mut doc = Document::new()
        .set("viewBox", (0.0, 0.0, width, height))
        .set("width", width)
        .set("height", height)
        .add(Rectangle::new().set("x", 0).set("y", 0).set("width", width).set("height", height).set("fill", "#ffffff"));

    // legend
    for (i, (name, color)) in SERIES.iter().enumerate() {
        let x = MARGIN + LABEL_WIDTH + i as f64 * BAR_WIDTH / 4.0;
        doc = doc
            .add(Rectangle::new().set("x", x).set("y", MARGIN).set("width", 10).set("height", 10).set("fill", *color))
            .add(
                Text::new(*name)
                    .set("x", x + 14.0)
                    .set("y", MARGIN + 9.0)
                    .set("font-family", "sans-serif")
                    .set("font-size", 10),
            );
    }

    let top = MARGIN + legend_height;
    let bar_height = (ROW_HEIGHT - 8.0) / SERIES.len() as f64;
    for (row_i, (name, summary)) in summaries.iter().enumerate() {
        let y = top + row_i as f64 * ROW_HEIGHT;
        doc = doc.add(
            Text::new(name.clone())
                .set("x", MARGIN + LABEL_WIDTH - 8.0)
                .set("y", y + ROW_HEIGHT / 2.0)
                .set("text-anchor", "end")
                .set("font-family", "sans-serif")
                .set("font-size", 12),
        );
        for (bar_i, (value, (_, color))) in values(summary).iter().zip(SERIES.iter()).enumerate() {
            let bar_y = y + bar_i as f64 * bar_height;
            let length = *value as f64 / max * BAR_WIDTH;
            doc = doc
                .add(
                    Rectangle::new()
                        .set("x", MARGIN + LABEL_WIDTH)
                        .set("y", bar_y)
                        .set("width", length)
                        .set("height", bar_height - 2.0)
                        .set("fill", *color),
                )
                .add(
                    Text::new(value.to_string())
                        .set("x", MARGIN + LABEL_WIDTH + length + 4.0)
                        .set("y", bar_y + bar_height - 4.0)
                        .set("font-family", "sans-serif")
                        .set("font-size", 9),
                );
        }
        doc = doc.add(
            Line::new()
                .set("x1", MARGIN)
                .set("y1", y + ROW_HEIGHT)
                .set("x2", width - MARGIN)
                .set("y2", y + ROW_HEIGHT)
                .set("stroke", "#d1d5db")
                .set("stroke-width", 1),
        );
    }

    doc
}

/// Write the summary plot to an SVG file.
pub fn write_summary_plot(summaries: &[(String, RunSummary)], path: &Path) -> Result<(), Report> {
    svg::save(path, &summary_plot(summaries)).wrap_err_with(|| format!("Failed to write plot: {path:?}"))?;
    Ok(())
}
