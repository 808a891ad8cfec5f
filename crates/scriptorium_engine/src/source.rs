//! Source text resolution.
//!
//! Given a unit's declarative attributes, resolution produces the text that
//! will actually execute: an external reference is preferred (script form) or
//! used as fallback (block form), fetch failures are recoverable, and inline
//! content is de-indented so source code is never mis-indented by its
//! position inside markup.

use crate::engine::{IoSink, SourceFetcher};
use crate::error::codes;

/// Declarative source attributes of one unit.
#[derive(Debug, Clone, Default)]
pub struct SourceSpec {
    /// External source reference (`src` attribute).
    pub src: Option<String>,
    /// Inline content of the element.
    pub inline: String,
    /// Whether the inline content passed through an HTML parser and needs
    /// unescaping. Content from a never-parsed syntax form is safe raw.
    pub escaped: bool,
}

/// Which source wins when a unit declares both an external reference and
/// inline content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePrecedence {
    /// Script form: the external reference wins, inline is the fallback.
    SrcFirst,
    /// Block form: inline content wins unless the element has none.
    InlineFirst,
}

/// Resolves a unit's source text.
///
/// A fetch failure is recoverable: it is reported to the unit's stderr
/// channel and resolution falls through to the inline content, which may be
/// empty. The fetch is not retried.
pub async fn resolve_source(
    spec: &SourceSpec,
    precedence: SourcePrecedence,
    fetcher: &dyn SourceFetcher,
    io: &dyn IoSink,
) -> String {
    let has_inline = !spec.inline.trim().is_empty();

    if precedence == SourcePrecedence::InlineFirst && has_inline {
        return resolve_inline(spec);
    }

    if let Some(url) = spec.src.as_deref() {
        match fetcher.fetch(url).await {
            Ok(text) => return text,
            Err(err) => {
                tracing::warn!(url, %err, "source fetch failed; falling back to inline content");
                io.stderr(&codes::FETCH_FAILED.message(&err));
            }
        }
    }

    resolve_inline(spec)
}

fn resolve_inline(spec: &SourceSpec) -> String {
    let dedented = dedent(&spec.inline);
    if spec.escaped {
        tracing::warn!(
            "inline source resolved from an HTML-parsed body; this embedding form is deprecated \
             because markup-sensitive source text is unsafe in it"
        );
        unescape_html(&dedented)
    } else {
        dedented
    }
}

/// Removes the common leading whitespace shared by all non-blank lines,
/// preserving relative indentation.
#[must_use]
pub fn dedent(text: &str) -> String {
    let mut prefix: Option<&str> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let leading = &line[..line.len() - line.trim_start().len()];
        prefix = Some(match prefix {
            None => leading,
            Some(current) => common_prefix(current, leading),
        });
        if prefix == Some("") {
            break;
        }
    }
    let Some(prefix) = prefix.filter(|p| !p.is_empty()) else {
        return text.to_string();
    };

    let mut out = String::with_capacity(text.len());
    let mut first = true;
    for line in text.lines() {
        if !first {
            out.push('\n');
        }
        first = false;
        out.push_str(line.strip_prefix(prefix).unwrap_or(line.trim_start()));
    }
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let mut end = 0;
    for (ca, cb) in a.chars().zip(b.chars()) {
        if ca != cb {
            break;
        }
        end += ca.len_utf8();
    }
    &a[..end]
}

/// Reverses the HTML entity escaping an HTML parser applies to element
/// bodies.
#[must_use]
pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CollectingIo, StaticFetcher};

    #[test]
    fn dedent_removes_common_indent() {
        let text = "    def f():\n        return 1\n";
        assert_eq!(dedent(text), "def f():\n    return 1\n");
    }

    #[test]
    fn dedent_ignores_blank_lines() {
        let text = "    a = 1\n\n    b = 2\n";
        assert_eq!(dedent(text), "a = 1\n\nb = 2\n");
    }

    #[test]
    fn dedent_preserves_relative_indentation() {
        let text = "  if x:\n      y()\n  z()";
        assert_eq!(dedent(text), "if x:\n    y()\nz()");
    }

    #[test]
    fn dedent_noop_when_any_line_flush() {
        let text = "a = 1\n    b = 2\n";
        assert_eq!(dedent(text), text);
    }

    #[test]
    fn dedent_handles_tabs() {
        let text = "\tdef f():\n\t\tpass\n";
        assert_eq!(dedent(text), "def f():\n\tpass\n");
    }

    #[test]
    fn unescape_covers_parser_entities() {
        assert_eq!(
            unescape_html("print(1 &lt; 2 &amp;&amp; &quot;x&quot; != &#39;y&#39;)"),
            "print(1 < 2 && \"x\" != 'y')"
        );
    }

    #[tokio::test]
    async fn src_wins_for_script_form() {
        let fetcher = StaticFetcher::with_sources([("https://x/app.py", "print('remote')")]);
        let io = CollectingIo::default();
        let spec = SourceSpec {
            src: Some("https://x/app.py".into()),
            inline: "print('inline')".into(),
            escaped: false,
        };

        let code = resolve_source(&spec, SourcePrecedence::SrcFirst, &fetcher, &io).await;
        assert_eq!(code, "print('remote')");
        assert!(io.stderr_lines().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_reports_and_falls_back_to_inline() {
        let fetcher = StaticFetcher::default(); // every URL 404s
        let io = CollectingIo::default();
        let spec = SourceSpec {
            src: Some("https://x/missing.py".into()),
            inline: "    print(1)".into(),
            escaped: false,
        };

        let code = resolve_source(&spec, SourcePrecedence::SrcFirst, &fetcher, &io).await;
        assert_eq!(code, "print(1)");
        let errors = io.stderr_lines();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("(SCR1003)"), "got: {}", errors[0]);
    }

    #[tokio::test]
    async fn inline_wins_for_block_form() {
        let fetcher = StaticFetcher::with_sources([("https://x/app.py", "print('remote')")]);
        let io = CollectingIo::default();
        let spec = SourceSpec {
            src: Some("https://x/app.py".into()),
            inline: "print('inline')".into(),
            escaped: false,
        };

        let code = resolve_source(&spec, SourcePrecedence::InlineFirst, &fetcher, &io).await;
        assert_eq!(code, "print('inline')");
    }

    #[tokio::test]
    async fn block_form_uses_src_when_no_inline_content() {
        let fetcher = StaticFetcher::with_sources([("https://x/app.py", "print('remote')")]);
        let io = CollectingIo::default();
        let spec = SourceSpec {
            src: Some("https://x/app.py".into()),
            inline: "  \n".into(),
            escaped: false,
        };

        let code = resolve_source(&spec, SourcePrecedence::InlineFirst, &fetcher, &io).await;
        assert_eq!(code, "print('remote')");
    }

    #[tokio::test]
    async fn escaped_inline_is_unescaped_after_dedent() {
        let fetcher = StaticFetcher::default();
        let io = CollectingIo::default();
        let spec = SourceSpec {
            src: None,
            inline: "    print(1 &lt; 2)".into(),
            escaped: true,
        };

        let code = resolve_source(&spec, SourcePrecedence::SrcFirst, &fetcher, &io).await;
        assert_eq!(code, "print(1 < 2)");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Common indentation of N columns is removed and relative
            /// indentation is preserved.
            #[test]
            fn dedent_round_trips(
                base in 0usize..8,
                lines in proptest::collection::vec(
                    (0usize..4, "[a-z]{1,8}"),
                    1..8,
                ),
            ) {
                let min_extra = lines.iter().map(|(extra, _)| *extra).min().unwrap_or(0);
                let indented: String = lines
                    .iter()
                    .map(|(extra, content)| {
                        format!("{}{}", " ".repeat(base + extra), content)
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                let expected: String = lines
                    .iter()
                    .map(|(extra, content)| {
                        format!("{}{}", " ".repeat(extra - min_extra), content)
                    })
                    .collect::<Vec<_>>()
                    .join("\n");

                prop_assert_eq!(dedent(&indented), expected);
            }
        }
    }
}
