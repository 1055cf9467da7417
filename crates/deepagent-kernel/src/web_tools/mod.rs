//! Tools that reach outside the agent: page fetching and a browser.
//!
//! The scraper is stateless. The browser tools share one [`BrowserContext`]
//! owned by a [`BrowserHandle`]; the tool registry acquires that handle once
//! and releases it on shutdown.

pub mod browser;
pub mod scraper;

pub use browser::{
    BrowserContext, BrowserHandle, BrowserLauncher, CurrentWebpageEngine, ExtractTextEngine,
    HttpBrowserLauncher, NavigateEngine, browser_tools,
};
pub use scraper::{ScraperConfig, WebScraperEngine};

/// Line width for plain-text rendering.
const TEXT_WIDTH: usize = 120;

/// Convert an HTML page to markdown, dropping scripts and styles.
pub(crate) fn html_to_markdown(html: &str) -> anyhow::Result<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript"])
        .build();
    converter
        .convert(html)
        .map_err(|e| anyhow::anyhow!("HTML to markdown conversion failed: {}", e))
}

/// Render an HTML page as plain text.
pub(crate) fn html_to_text(html: &str) -> anyhow::Result<String> {
    html2text::from_read(html.as_bytes(), TEXT_WIDTH)
        .map_err(|e| anyhow::anyhow!("HTML to text conversion failed: {}", e))
}

/// Keep at most `max_chars` characters, marking the cut.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\n\n[truncated at {} characters]", &text[..idx], max_chars),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html><head><title>T</title><style>p { color: red }</style>\
        <script>alert('x')</script></head>\
        <body><h1>Heading</h1><p>Hello <b>world</b></p></body></html>";

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語\n\n[truncated at 3 characters]");
    }

    #[test]
    fn markdown_keeps_structure_and_drops_scripts() {
        let md = html_to_markdown(PAGE).unwrap();
        assert!(md.contains("# Heading"), "{md}");
        assert!(md.contains("**world**"), "{md}");
        assert!(!md.contains("alert"), "{md}");
        assert!(!md.contains("<p>"), "{md}");
    }

    #[test]
    fn text_has_no_markup() {
        let text = html_to_text(PAGE).unwrap();
        assert!(text.contains("Heading"), "{text}");
        assert!(text.contains("Hello"), "{text}");
        assert!(text.contains("world"), "{text}");
        assert!(!text.contains("<b>"), "{text}");
    }
}
