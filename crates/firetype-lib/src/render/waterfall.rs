//! Waterfall chart of feature attributions
//!
//! Layout is computed separately from drawing so the cumulative bar
//! positions can be checked without parsing SVG. Rows run from the
//! largest contribution at the top to the smallest at the bottom; the
//! walk starts at the base value under the bottom row and ends at the
//! model output above the top row.

use super::escape_html;
use crate::predictor::Attribution;

/// Rows shown by default, one per input feature
pub const DEFAULT_MAX_DISPLAY: usize = 6;

const POSITIVE_COLOR: &str = "#ff0051";
const NEGATIVE_COLOR: &str = "#008bfb";

const WIDTH: f64 = 640.0;
const ROW_HEIGHT: f64 = 34.0;
const LABEL_WIDTH: f64 = 210.0;
const RIGHT_MARGIN: f64 = 40.0;
const TOP_MARGIN: f64 = 40.0;
const BOTTOM_MARGIN: f64 = 56.0;

#[derive(Debug, Clone, PartialEq)]
pub struct WaterfallRow {
    pub label: String,
    pub value: f64,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterfallLayout {
    pub base_value: f64,
    pub output_value: f64,
    /// Top to bottom
    pub rows: Vec<WaterfallRow>,
}

impl WaterfallLayout {
    /// Order and stack the attributions, collapsing the tail beyond `max_display` rows
    pub fn from_attribution(attribution: &Attribution, max_display: usize) -> Self {
        let max_display = max_display.max(1);
        let n = attribution.values.len();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            attribution.values[b]
                .abs()
                .partial_cmp(&attribution.values[a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let shown = if n > max_display { max_display - 1 } else { n };
        let mut rows: Vec<WaterfallRow> = order[..shown]
            .iter()
            .map(|&i| WaterfallRow {
                label: row_label(attribution, i),
                value: attribution.values[i],
                start: 0.0,
                end: 0.0,
            })
            .collect();

        if shown < n {
            let rest = &order[shown..];
            rows.push(WaterfallRow {
                label: format!("{} other features", rest.len()),
                value: rest.iter().map(|&i| attribution.values[i]).sum(),
                start: 0.0,
                end: 0.0,
            });
        }

        let mut cumulative = attribution.base_value;
        for row in rows.iter_mut().rev() {
            row.start = cumulative;
            cumulative += row.value;
            row.end = cumulative;
        }

        Self {
            base_value: attribution.base_value,
            output_value: cumulative,
            rows,
        }
    }

    /// Smallest and largest x the chart must show, padded
    fn domain(&self) -> (f64, f64) {
        let points = self
            .rows
            .iter()
            .flat_map(|r| [r.start, r.end])
            .chain([self.base_value, self.output_value]);
        let (lo, hi) = points.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        let span = hi - lo;
        if span <= f64::EPSILON {
            (lo - 0.5, hi + 0.5)
        } else {
            (lo - span * 0.05, hi + span * 0.05)
        }
    }
}

fn row_label(attribution: &Attribution, i: usize) -> String {
    let name = attribution
        .feature_names
        .get(i)
        .cloned()
        .unwrap_or_else(|| format!("feature_{}", i));
    match attribution.data.get(i) {
        Some(value) => format!("{} = {:.3}", name, value),
        None => name,
    }
}

/// Draw the layout as a standalone SVG element
pub fn render_svg(layout: &WaterfallLayout) -> String {
    let n_rows = layout.rows.len() as f64;
    let height = TOP_MARGIN + n_rows * ROW_HEIGHT + BOTTOM_MARGIN;
    let plot_width = WIDTH - LABEL_WIDTH - RIGHT_MARGIN;
    let (lo, hi) = layout.domain();
    let x = |v: f64| LABEL_WIDTH + (v - lo) / (hi - lo) * plot_width;
    let plot_bottom = TOP_MARGIN + n_rows * ROW_HEIGHT;

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" class="waterfall" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif" font-size="13">"#,
        w = WIDTH,
        h = height
    ));
    svg.push_str(&format!(
        r##"<rect x="0" y="0" width="{}" height="{}" fill="#ffffff"/>"##,
        WIDTH, height
    ));

    // Reference lines for E[f(X)] and f(x)
    for (value, y_text, text) in [
        (layout.base_value, plot_bottom + 40.0, format!("E[f(X)] = {:.3}", layout.base_value)),
        (layout.output_value, TOP_MARGIN - 14.0, format!("f(x) = {:.3}", layout.output_value)),
    ] {
        svg.push_str(&format!(
            r##"<line x1="{x:.1}" y1="{top:.1}" x2="{x:.1}" y2="{bottom:.1}" stroke="#999999" stroke-dasharray="4 3"/>"##,
            x = x(value),
            top = TOP_MARGIN - 8.0,
            bottom = plot_bottom + 8.0
        ));
        svg.push_str(&format!(
            r##"<text x="{:.1}" y="{:.1}" text-anchor="middle" fill="#333333">{}</text>"##,
            x(value),
            y_text,
            escape_html(&text)
        ));
    }

    for (i, row) in layout.rows.iter().enumerate() {
        let y = TOP_MARGIN + i as f64 * ROW_HEIGHT;
        let (left, right) = if row.start <= row.end {
            (row.start, row.end)
        } else {
            (row.end, row.start)
        };
        let color = if row.value >= 0.0 {
            POSITIVE_COLOR
        } else {
            NEGATIVE_COLOR
        };
        let bar_width = (x(right) - x(left)).max(1.0);

        svg.push_str(&format!(
            r##"<text x="{:.1}" y="{:.1}" text-anchor="end" fill="#333333">{}</text>"##,
            LABEL_WIDTH - 10.0,
            y + ROW_HEIGHT / 2.0 + 4.0,
            escape_html(&row.label)
        ));
        svg.push_str(&format!(
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
            x(left),
            y + 6.0,
            bar_width,
            ROW_HEIGHT - 12.0,
            color
        ));
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" text-anchor="{}" fill="{}">{:+.3}</text>"#,
            if row.value >= 0.0 { x(right) + 4.0 } else { x(left) - 4.0 },
            y + ROW_HEIGHT / 2.0 + 4.0,
            if row.value >= 0.0 { "start" } else { "end" },
            color,
            row.value
        ));
    }

    svg.push_str(&format!(
        r##"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#333333"/>"##,
        LABEL_WIDTH,
        plot_bottom + 8.0,
        LABEL_WIDTH + plot_width,
        plot_bottom + 8.0
    ));
    svg.push_str("</svg>");
    svg
}

/// Layout and draw in one step
pub fn waterfall_svg(attribution: &Attribution, max_display: usize) -> String {
    render_svg(&WaterfallLayout::from_attribution(attribution, max_display))
}
