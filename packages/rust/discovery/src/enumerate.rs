//! Fragment enumeration over a parsed host document.
//!
//! Elements are matched by their `type` attribute against the two configured
//! markers and visited in document order:
//! - `<script type="SOURCE" src="...">` / `<script type="CONFIG" src="...">` → remote
//! - `<script type="SOURCE">text</script>` → inline

use relaybuild_shared::{
    CONFIG_FRAGMENT_NAME, FragmentKind, FragmentSource, MarkerConfig, RelayError, Result,
};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Snapshot of the fragments found in a host document.
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    /// Sources in document order.
    pub sources: Vec<FragmentSource>,
    /// Non-fatal notices raised while enumerating.
    pub advisories: Vec<String>,
}

impl Enumeration {
    pub fn remote_count(&self) -> usize {
        self.sources.iter().filter(|s| s.is_remote()).count()
    }

    pub fn inline_count(&self) -> usize {
        self.sources.len() - self.remote_count()
    }

    pub fn has_config(&self) -> bool {
        self.sources
            .iter()
            .any(|s| s.kind() == FragmentKind::Config)
    }
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

/// Collect every source and configuration fragment in `html`.
///
/// Remote locations are resolved against `base`.
pub(crate) fn enumerate_html(html: &str, base: &Url, markers: &MarkerConfig) -> Result<Enumeration> {
    if markers.source == markers.config {
        return Err(RelayError::validation(format!(
            "source and config markers must differ (both are '{}')",
            markers.source
        )));
    }

    let selector = marker_selector(markers)?;
    let document = Html::parse_document(html);

    let mut enumeration = Enumeration::default();
    let mut source_ordinal = 0usize;

    for element in document.select(&selector) {
        let kind = if element.value().attr("type") == Some(markers.config.as_str()) {
            FragmentKind::Config
        } else {
            FragmentKind::Source
        };

        let ordinal = match kind {
            FragmentKind::Source => {
                let current = source_ordinal;
                source_ordinal += 1;
                Some(current)
            }
            FragmentKind::Config => None,
        };

        let source = classify(element, kind, ordinal, base, &markers.source_extension)?;
        debug!(name = source.name(), remote = source.is_remote(), ?kind, "fragment discovered");
        enumeration.sources.push(source);
    }

    if !enumeration.has_config() {
        let advisory = format!(
            "no project configuration fragment (<script type=\"{}\">) found; compilation will likely fail",
            markers.config
        );
        warn!("{advisory}");
        enumeration.advisories.push(advisory);
    }

    Ok(enumeration)
}

fn classify(
    element: ElementRef<'_>,
    kind: FragmentKind,
    ordinal: Option<usize>,
    base: &Url,
    extension: &str,
) -> Result<FragmentSource> {
    let src = element
        .value()
        .attr("src")
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match src {
        Some(src) => {
            let location = base.join(src).map_err(|e| {
                RelayError::parse(format!("cannot resolve fragment location '{src}': {e}"))
            })?;
            let name = fragment_name(kind, ordinal, Some(&location), extension);
            Ok(FragmentSource::Remote {
                kind,
                name,
                location,
            })
        }
        None => Ok(FragmentSource::Inline {
            kind,
            name: fragment_name(kind, ordinal, None, extension),
            content: element.text().collect(),
        }),
    }
}

/// Name a fragment from its location, falling back to a generated placeholder.
fn fragment_name(
    kind: FragmentKind,
    ordinal: Option<usize>,
    location: Option<&Url>,
    extension: &str,
) -> String {
    if kind == FragmentKind::Config {
        return CONFIG_FRAGMENT_NAME.to_string();
    }

    location
        .and_then(last_segment)
        .unwrap_or_else(|| format!("fragment-{}.{extension}", ordinal.unwrap_or_default()))
}

fn last_segment(location: &Url) -> Option<String> {
    location
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn marker_selector(markers: &MarkerConfig) -> Result<Selector> {
    let css = format!(
        "script[type=\"{}\"], script[type=\"{}\"]",
        escape_attr(&markers.source),
        escape_attr(&markers.config)
    );
    Selector::parse(&css)
        .map_err(|e| RelayError::config(format!("invalid marker selector '{css}': {e}")))
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://app.example.com/pages/index.html").unwrap()
    }

    fn enumerate(html: &str) -> Enumeration {
        enumerate_html(html, &base(), &MarkerConfig::default()).expect("enumerate")
    }

    #[test]
    fn classifies_inline_and_remote_in_document_order() {
        let html = r#"<html><head>
            <script type="text/tsconfig+json">{"compilerOptions":{}}</script>
            <script type="text/typescript" src="lib/util.ts"></script>
            </head><body>
            <script type="text/typescript">console.log(1)</script>
            <script type="text/javascript">ignored()</script>
            </body></html>"#;

        let e = enumerate(html);
        assert_eq!(e.sources.len(), 3);
        assert_eq!(e.remote_count(), 1);
        assert_eq!(e.inline_count(), 2);
        assert!(e.advisories.is_empty());

        assert_eq!(e.sources[0].name(), "tsconfig.json");
        assert_eq!(e.sources[0].kind(), FragmentKind::Config);

        assert_eq!(e.sources[1].name(), "util.ts");
        assert_eq!(
            e.sources[1].location().map(Url::as_str),
            Some("https://app.example.com/pages/lib/util.ts")
        );

        match &e.sources[2] {
            FragmentSource::Inline { name, content, .. } => {
                assert_eq!(name, "fragment-1.ts");
                assert_eq!(content, "console.log(1)");
            }
            other => panic!("expected inline, got {other:?}"),
        }
    }

    #[test]
    fn placeholder_ordinals_count_source_fragments_only() {
        let html = r#"
            <script type="text/typescript">a</script>
            <script type="text/tsconfig+json" src="/cfg/"></script>
            <script type="text/typescript" src="/scripts/"></script>
            <script type="text/typescript" src="https://cdn.example.com"></script>
            <script type="text/typescript">b</script>"#;

        let names: Vec<_> = enumerate(html)
            .sources
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "fragment-0.ts",
                "tsconfig.json",
                "fragment-1.ts",
                "fragment-2.ts",
                "fragment-3.ts",
            ]
        );
    }

    #[test]
    fn config_fragment_is_always_named_tsconfig() {
        let html = r#"<script type="text/tsconfig+json" src="settings/project.json"></script>"#;
        let e = enumerate(html);
        assert_eq!(e.sources[0].name(), "tsconfig.json");
        assert!(e.sources[0].is_remote());
    }

    #[test]
    fn missing_config_is_advisory_only() {
        let e = enumerate(r#"<script type="text/typescript">let x = 1;</script>"#);
        assert_eq!(e.sources.len(), 1);
        assert_eq!(e.advisories.len(), 1);
        assert!(e.advisories[0].contains("text/tsconfig+json"));
    }

    #[test]
    fn empty_document_yields_no_sources() {
        let e = enumerate("<html><body></body></html>");
        assert!(e.sources.is_empty());
        assert_eq!(e.advisories.len(), 1);
    }

    #[test]
    fn custom_extension_and_markers() {
        let markers = MarkerConfig {
            source: "text/x-lang".into(),
            config: "text/x-project".into(),
            source_extension: "xl".into(),
        };
        let html = r#"<script type="text/x-lang">main</script>
                      <script type="text/x-project">{}</script>"#;
        let e = enumerate_html(html, &base(), &markers).expect("enumerate");
        assert_eq!(e.sources[0].name(), "fragment-0.xl");
        assert_eq!(e.sources[1].name(), "tsconfig.json");
    }

    #[test]
    fn identical_markers_are_rejected() {
        let markers = MarkerConfig {
            source: "text/x".into(),
            config: "text/x".into(),
            source_extension: "ts".into(),
        };
        assert!(enumerate_html("", &base(), &markers).is_err());
    }
}
