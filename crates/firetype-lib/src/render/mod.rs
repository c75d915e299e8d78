//! HTML rendering of the form page and the attribution chart

mod page;
mod waterfall;

pub use page::{render_fatal_page, render_form_page, ChartView, FormPage, ResultBlock};
pub use waterfall::{render_svg, waterfall_svg, WaterfallLayout, WaterfallRow, DEFAULT_MAX_DISPLAY};

/// Escape text for use in HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("frp = 1.000"), "frp = 1.000");
    }
}
