//! Page rendering with MiniJinja

use minijinja::Environment;
use serde::Serialize;

const INDEX_NAME: &str = "index.html";
const INDEX_SOURCE: &str = include_str!("../templates/index.html");

/// What one rendering of the page shows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageView {
    /// Text to prefill the input with
    pub query: String,
    pub answer: Option<String>,
    pub error: Option<String>,
}

impl PageView {
    pub fn answered(query: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: Some(answer.into()),
            error: None,
        }
    }

    pub fn failed(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: None,
            error: Some(error.into()),
        }
    }
}

/// The compiled page template
///
/// Output is HTML-escaped, so model text cannot inject markup.
pub struct Page {
    env: Environment<'static>,
}

impl Page {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(INDEX_NAME, INDEX_SOURCE)?;
        Ok(Self { env })
    }

    pub fn render(&self, view: &PageView) -> Result<String, minijinja::Error> {
        self.env.get_template(INDEX_NAME)?.render(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_page() {
        let html = Page::new().unwrap().render(&PageView::default()).unwrap();
        assert!(html.contains("MCP Math Chat"));
        assert!(html.contains(r#"name="query""#));
        assert!(html.contains("Send"));
        assert!(html.contains("Thinking…"));
        assert!(!html.contains(r#"id="answer""#));
        assert!(!html.contains(r#"id="error""#));
    }

    #[test]
    fn test_answer_is_escaped() {
        let view = PageView::answered("1 < 2?", "<b>yes</b>");
        let html = Page::new().unwrap().render(&view).unwrap();
        assert!(html.contains(r#"id="answer""#));
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;b&gt;yes"));
        assert!(html.contains("1 &lt; 2?"));
    }

    #[test]
    fn test_error_box() {
        let view = PageView::failed("q", "Connection failed: math");
        let html = Page::new().unwrap().render(&view).unwrap();
        assert!(html.contains(r#"id="error""#));
        assert!(html.contains("Connection failed: math"));
        assert!(!html.contains(r#"id="answer""#));
    }
}
