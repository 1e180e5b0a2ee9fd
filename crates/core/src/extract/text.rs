// Posts arrive as HTML fragments; tickers are matched against the rendered text. A wide wrap
// width keeps html2text from breaking long lines.
const RENDER_WIDTH: usize = 10_000;

pub fn strip_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let normalized = html.replace("<br>", "\n");
    html2text::from_read(normalized.as_bytes(), RENDER_WIDTH)
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_unescapes_entities() {
        let s = strip_html("<b>$GME</b> to the moon<br>buy &amp; hold");
        assert!(s.contains("GME"));
        assert!(s.contains("buy & hold"));
        assert!(!s.contains("<b>"));
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(strip_html(""), "");
        assert_eq!(strip_html("   "), "");
    }
}
