//! HTML document as a host environment.
//!
//! Each executed artifact becomes a `<script>` element appended to the body:
//! `<script type="MODE" data-artifact="NAME">CONTENT</script>`.
//!
//! Element content is raw text, so sequences that end or re-open the element
//! have no HTML escape. Script artifacts get the inline-script rewrite
//! (`</script` → `<\/script`, `<!--` → `<\!--`), which leaves string and
//! template literals unchanged. Auxiliary artifacts are written verbatim and
//! refused if they contain such a sequence.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use relaybuild_shared::{Fragment, RelayError, Result};

use crate::{ExecutionMode, HostEnvironment};

/// Matches a closing body tag, any case.
static BODY_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</body\s*>").expect("body close regex"));

/// Matches `</script` (ends the element) or `<!--` (can enter the
/// double-escaped state), any case.
static RAW_TEXT_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/script|!--)").expect("raw text break regex"));

/// An HTML document that grows by one element per injected artifact.
#[derive(Debug, Clone)]
pub struct HtmlDocumentHost {
    html: String,
    injected: Vec<String>,
}

impl HtmlDocumentHost {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            injected: Vec::new(),
        }
    }

    /// Names of artifacts injected so far, in order.
    pub fn injected(&self) -> &[String] {
        &self.injected
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }
}

impl HostEnvironment for HtmlDocumentHost {
    fn execute(&mut self, artifact: &Fragment, mode: ExecutionMode<'_>) -> Result<()> {
        if artifact.name.is_empty() {
            return Err(RelayError::injection("<unnamed>", "artifact has no name"));
        }

        let content = match mode {
            ExecutionMode::Script(_) => RAW_TEXT_BREAK_RE.replace_all(&artifact.content, "<\\$1"),
            ExecutionMode::Auxiliary(_) => {
                if RAW_TEXT_BREAK_RE.is_match(&artifact.content) {
                    return Err(RelayError::injection(
                        &artifact.name,
                        "auxiliary content contains `</script` or `<!--` and cannot be embedded verbatim",
                    ));
                }
                Cow::Borrowed(artifact.content.as_str())
            }
        };

        let element = format!(
            "<script type=\"{}\" data-artifact=\"{}\">{content}</script>\n",
            escape_attr(mode.label()),
            escape_attr(&artifact.name),
        );

        // Insert before the last closing body tag, else append.
        let at = BODY_CLOSE_RE
            .find_iter(&self.html)
            .last()
            .map_or(self.html.len(), |m| m.start());
        self.html.insert_str(at, &element);
        self.injected.push(artifact.name.clone());
        Ok(())
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
