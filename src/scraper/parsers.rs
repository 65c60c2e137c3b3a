use crate::error::{Result, ScrapeError};
use scraper::{ElementRef, Html, Node, Selector};

/// What the scraper needs from one fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// Visible text under `<body>`; compared page-to-page to detect the end of a thread.
    pub body_text: String,
    /// Cleaned text of every element matched by the post selector, in page order.
    pub posts: Vec<String>,
}

/// Selectors compiled once per scrape.
#[derive(Debug, Clone)]
pub struct PageParser {
    body_sel: Selector,
    post_sel: Selector,
}

pub fn compile_selector(expr: &str) -> Result<Selector> {
    Selector::parse(expr)
        .map_err(|e| ScrapeError::config(format!("selector {:?}: {:?}", expr, e)))
}

impl PageParser {
    pub fn new(post_selector: &str) -> Result<Self> {
        Ok(Self {
            body_sel: compile_selector("body")?,
            post_sel: compile_selector(post_selector)?,
        })
    }

    pub fn parse(&self, html: &str) -> ParsedPage {
        let doc = Html::parse_document(html);

        let body_text = doc
            .select(&self.body_sel)
            .next()
            .map(|body| body.text().collect::<String>())
            .unwrap_or_default();

        let posts = doc.select(&self.post_sel).map(post_text).collect();

        ParsedPage { body_text, posts }
    }
}

/// Element text with `<br>` rendered as a newline, trimmed.
pub fn post_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if e.name() == "br" => out.push('\n'),
            _ => {}
        }
    }
    out.trim().to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
  <div class="header">Digital piano prices</div>
  <div class="post-content"><div class="post_inner">
    MAKE: Yamaha<br>MODEL: P155B<br/>PRICE PAID: $1000
  </div></div>
  <div class="post-content"><div class="post_inner"><b>MAKE</b>: Kawai<br>MODEL: ES110</div></div>
</body></html>"#;

    #[test]
    fn test_posts_keep_line_breaks() {
        let parser = PageParser::new(".post-content .post_inner").unwrap();
        let page = parser.parse(PAGE);

        assert_eq!(page.posts.len(), 2);
        assert_eq!(page.posts[0], "MAKE: Yamaha\nMODEL: P155B\nPRICE PAID: $1000");
        assert_eq!(page.posts[1], "MAKE: Kawai\nMODEL: ES110");
    }

    #[test]
    fn test_body_text_is_stable_for_identical_pages() {
        let parser = PageParser::new(".post_inner").unwrap();
        let a = parser.parse(PAGE);
        let b = parser.parse(PAGE);
        assert!(a.body_text.contains("Digital piano prices"));
        assert_eq!(a.body_text, b.body_text);
    }

    #[test]
    fn test_bad_selector_is_configuration_error() {
        let err = PageParser::new("div[[").unwrap_err();
        assert!(matches!(err, ScrapeError::Configuration(_)));
    }
}
