//! Script handling for provider HTML before it reaches the surface.
//!
//! Two policies exist. `Strip` (the default) deletes every script region so
//! nothing embedded in the payload can run. `Replay` keeps the body content
//! and hands inline script bodies back separately, in document order, for a
//! trusted executor on the host side. Replay runs third-party code with host
//! privileges and is only reachable when `trusted_scripts` is enabled.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptPolicy {
    #[default]
    Strip,
    Replay,
}

impl ScriptPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "strip" | "a" => Some(Self::Strip),
            "replay" | "extract" | "b" => Some(Self::Replay),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Strip => "strip",
            Self::Replay => "replay",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedHtml {
    pub policy: ScriptPolicy,
    /// Markup handed to the renderer: a full document for `Strip`, body
    /// content for `Replay`.
    pub html: String,
    /// Inline script bodies in document order. Always empty for `Strip`.
    pub scripts: Vec<String>,
}

fn script_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b[^>]*>.*?</script\b[^>]*>").expect("valid script block pattern")
    })
}

fn dangling_script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // An unclosed opener turns the rest of the document into script text.
    RE.get_or_init(|| Regex::new(r"(?is)<script\b.*\z").expect("valid dangling script pattern"))
}

pub fn sanitize(raw_html: &str, policy: ScriptPolicy) -> SanitizedHtml {
    match policy {
        ScriptPolicy::Strip => SanitizedHtml {
            policy,
            html: strip_scripts(raw_html),
            scripts: Vec::new(),
        },
        ScriptPolicy::Replay => {
            let (html, scripts) = extract_scripts(raw_html);
            SanitizedHtml {
                policy,
                html,
                scripts,
            }
        }
    }
}

pub fn strip_scripts(raw_html: &str) -> String {
    let without_blocks = script_block_re().replace_all(raw_html, "");
    dangling_script_re()
        .replace(&without_blocks, "")
        .into_owned()
}

/// Splits a document into its body markup (scripts removed) and the ordered
/// list of non-empty inline script bodies. External scripts (`src=`) carry no
/// inline body and are dropped.
pub fn extract_scripts(raw_html: &str) -> (String, Vec<String>) {
    let parsed = Html::parse_document(raw_html);
    let body_sel = Selector::parse("body").expect("body selector is valid");
    let script_sel = Selector::parse("script").expect("script selector is valid");

    let scripts: Vec<String> = parsed
        .select(&script_sel)
        .map(|s| s.text().collect::<String>())
        .filter(|code| !code.trim().is_empty())
        .collect();

    let body = parsed
        .select(&body_sel)
        .next()
        .map(|b| b.inner_html())
        .unwrap_or_default();

    (strip_scripts(&body), scripts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_removes_every_script_region() {
        let raw = r#"<html><head><SCRIPT type="text/javascript">
            var w = 1;
        </SCRIPT></head><body><p>ok</p><script>alert(1)</script ></body></html>"#;
        let out = strip_scripts(raw);
        assert!(!out.to_lowercase().contains("<script"));
        assert!(out.contains("<p>ok</p>"));
        assert!(!out.contains("alert"));
    }

    #[test]
    fn strip_drops_unterminated_script_tail() {
        let out = strip_scripts("<p>keep</p><script>never closed <p>gone</p>");
        assert_eq!(out, "<p>keep</p>");
    }

    #[test]
    fn end_tag_with_attributes_closes_the_script() {
        let raw = r#"<body><script>a()</script foo><div class="headerclass" id="h1">Sem1</div><div class="contentclass" id="h1">Marks: 78</div></body>"#;
        let out = strip_scripts(raw);
        assert!(!out.contains("a()"));
        assert!(out.contains("Sem1"));
        assert!(out.contains("Marks: 78"));
    }

    #[test]
    fn replay_preserves_script_order_and_skips_external() {
        let raw = r#"<html><head><script>first()</script><script src="x.js"></script></head>
            <body><div>content</div><script>second()</script></body></html>"#;
        let out = sanitize(raw, ScriptPolicy::Replay);
        assert_eq!(out.scripts, vec!["first()".to_string(), "second()".to_string()]);
        assert!(out.html.contains("<div>content</div>"));
        assert!(!out.html.contains("second()"));
    }

    #[test]
    fn policy_parse_accepts_aliases() {
        assert_eq!(ScriptPolicy::parse("STRIP"), Some(ScriptPolicy::Strip));
        assert_eq!(ScriptPolicy::parse("extract"), Some(ScriptPolicy::Replay));
        assert_eq!(ScriptPolicy::parse("run"), None);
    }
}
