use scraper::{Html, Node};

/// Element content that never renders as page text.
const HIDDEN_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// A parsed HTML page plus its visible text, computed once per document.
pub struct ParsedDocument {
    html: Html,
    visible_text: String,
}

impl ParsedDocument {
    /// html5ever recovers from any input, so parsing never fails.
    pub fn parse(body: &str) -> Self {
        let html = Html::parse_document(body);
        let visible_text = collect_visible_text(&html);
        Self { html, visible_text }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn visible_text(&self) -> &str {
        &self.visible_text
    }
}

fn collect_visible_text(html: &Html) -> String {
    let mut out = String::new();
    for node in html.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|parent| {
            parent
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_TAGS.contains(&el.name()))
        });
        if !hidden {
            out.push_str(text);
        }
    }
    out
}
