//! Form page
//!
//! Every response is a full re-render: the submitted values go back into
//! the controls and the result block, if any, sits below the button.
//! Editing any control removes the result block in the browser.

use super::escape_html;
use crate::models::{fields, Confidence, FieldSpec, SensorReading};
use crate::predictor::FireCategory;

const TITLE: &str = "Fire Type Classification";

const STYLE: &str = r#"
body { margin: 0; font-family: sans-serif; background: linear-gradient(135deg, #fff5eb, #ffe0c7); color: #262730; }
.layout { display: flex; min-height: 100vh; }
aside { width: 260px; padding: 24px; background: #f0f2f6; }
main { flex: 1; max-width: 760px; padding: 32px; }
label { display: block; margin-top: 14px; font-weight: 600; }
input, select { width: 100%; padding: 6px; margin-top: 4px; box-sizing: border-box; }
button { margin-top: 20px; padding: 10px 18px; font-size: 15px; cursor: pointer; }
.banner { margin-top: 24px; padding: 14px; border-radius: 8px; color: #ffffff; font-size: 18px; font-weight: 700; }
.warning { margin-top: 16px; padding: 12px; border-radius: 8px; background: #fff3cd; color: #664d03; }
.error { margin-top: 24px; padding: 14px; border-radius: 8px; background: #f8d7da; color: #842029; }
"#;

/// Clears a previous result as soon as any control changes
const CLEAR_RESULT_SCRIPT: &str =
    "var r = document.getElementById('result'); if (r) { r.remove(); }";

/// Chart slot of a result block
#[derive(Debug, Clone, PartialEq)]
pub enum ChartView {
    Svg(String),
    /// Explanation failed; shown instead of the chart
    Warning(String),
}

/// What a successful prediction displays
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBlock {
    pub category: FireCategory,
    pub chart: ChartView,
}

/// Inputs of one page render
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormPage {
    /// Values placed back into the controls
    pub reading: SensorReading,
    pub result: Option<ResultBlock>,
    /// Request-level failure shown instead of a result
    pub error: Option<String>,
}

impl FormPage {
    pub fn with_result(reading: SensorReading, result: ResultBlock) -> Self {
        Self {
            reading,
            result: Some(result),
            error: None,
        }
    }

    pub fn with_error(reading: SensorReading, error: impl Into<String>) -> Self {
        Self {
            reading,
            result: None,
            error: Some(error.into()),
        }
    }
}

fn document(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{style}</style>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        title = TITLE,
        style = STYLE,
        body = body
    )
}

fn sidebar() -> String {
    "<aside>\n<h3>About the App</h3>\n\
     <p>Classifies a MODIS fire detection as a vegetation fire, another static land \
     source or an offshore fire from six satellite readings.</p>\n\
     <p>The chart shows how much each reading pushed the prediction up or down.</p>\n\
     </aside>"
        .to_string()
}

fn number_input(field: &FieldSpec, value: f64) -> String {
    let max = field
        .max
        .map(|max| format!(" max=\"{}\"", max))
        .unwrap_or_default();
    format!(
        "<label for=\"{name}\">{label}</label>\n\
         <input type=\"number\" id=\"{name}\" name=\"{name}\" step=\"any\" min=\"{min}\"{max} value=\"{value}\" required>",
        name = field.name,
        label = escape_html(field.label),
        min = field.min,
        max = max,
        value = value
    )
}

fn confidence_select(selected: Confidence) -> String {
    let options: String = Confidence::ALL
        .iter()
        .map(|c| {
            format!(
                "<option value=\"{v}\"{sel}>{v}</option>",
                v = c.as_str(),
                sel = if *c == selected { " selected" } else { "" }
            )
        })
        .collect();
    format!(
        "<label for=\"confidence\">Confidence Level</label>\n\
         <select id=\"confidence\" name=\"confidence\">{}</select>",
        options
    )
}

fn form(reading: &SensorReading) -> String {
    let values = [
        reading.brightness,
        reading.bright_t31,
        reading.frp,
        reading.scan,
        reading.track,
    ];
    let mut controls: Vec<String> = fields::NUMERIC
        .iter()
        .zip(values)
        .map(|(field, value)| number_input(field, value))
        .collect();
    controls.push(confidence_select(reading.confidence));

    format!(
        "<form method=\"post\" action=\"/predict\" oninput=\"{script}\" onchange=\"{script}\">\n\
         {controls}\n<button type=\"submit\">Predict Fire Type</button>\n</form>",
        script = CLEAR_RESULT_SCRIPT,
        controls = controls.join("\n")
    )
}

fn result_block(result: &ResultBlock) -> String {
    let banner = format!(
        "<div class=\"banner\" style=\"background-color: {color};\">Predicted Fire Type: {text}</div>",
        color = result.category.color().css(),
        text = escape_html(result.category.display_text())
    );
    let chart = match &result.chart {
        ChartView::Svg(svg) => format!(
            "<h3>Feature Contribution (SHAP Explanation)</h3>\n<div class=\"chart\">{}</div>",
            svg
        ),
        ChartView::Warning(message) => format!(
            "<div class=\"warning\">SHAP explanation failed: {}</div>",
            escape_html(message)
        ),
    };
    format!("<section id=\"result\">\n{}\n{}\n</section>", banner, chart)
}

/// Full page with the form, plus a result or error when present
pub fn render_form_page(page: &FormPage) -> String {
    let mut main = format!(
        "<main>\n<h1>{}</h1>\n<p>Enter MODIS satellite readings to classify the fire type.</p>\n{}",
        TITLE,
        form(&page.reading)
    );
    if let Some(error) = &page.error {
        main.push_str(&format!(
            "\n<section id=\"result\">\n<div class=\"error\">{}</div>\n</section>",
            escape_html(error)
        ));
    } else if let Some(result) = &page.result {
        main.push('\n');
        main.push_str(&result_block(result));
    }
    main.push_str("\n</main>");

    document(&format!("<div class=\"layout\">\n{}\n{}\n</div>", sidebar(), main))
}

/// Page shown when the artifacts could not be loaded; no form
pub fn render_fatal_page(message: &str) -> String {
    document(&format!(
        "<div class=\"layout\">\n{}\n<main>\n<h1>{}</h1>\n\
         <div class=\"error\">Error loading model or scaler: {}</div>\n</main>\n</div>",
        sidebar(),
        TITLE,
        escape_html(message)
    ))
}
