// src/services/markup.rs

//! Markup sanitizing with link rewriting.
//!
//! A region is serialized by `scraper` and streamed through `lol_html`:
//! attributes outside the allow-list and comments are dropped, anchor `href`s
//! go through a caller-supplied rewrite, and runs of line breaks are
//! collapsed.

use std::sync::LazyLock;

use html_escape::{decode_html_entities, encode_double_quoted_attribute};
use lol_html::{RewriteStrSettings, comments, element, rewrite_str};
use regex::Regex;
use scraper::ElementRef;

use crate::error::Result;

/// Attributes kept on every element.
pub const ALLOWED_ATTRIBUTES: &[&str] = &["src", "href", "target", "alt"];

static LINE_BREAK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<br\s*/?>(?:\s*<br\s*/?>)+").expect("valid regex"));

/// Serialize `root` (including its own tag) keeping only allowed attributes.
///
/// `rewrite_href` sees the entity-decoded `href` of every anchor; returning
/// `Some` replaces it, `None` keeps it.
pub fn sanitize<F>(root: ElementRef<'_>, mut rewrite_href: F) -> Result<String>
where
    F: FnMut(&str) -> Option<String>,
{
    let html = root.html();
    let rewritten = rewrite_str(
        &html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("*", |el| {
                    let dropped: Vec<String> = el
                        .attributes()
                        .iter()
                        .map(|attr| attr.name())
                        .filter(|name| !ALLOWED_ATTRIBUTES.contains(&name.as_str()))
                        .collect();
                    for name in dropped {
                        el.remove_attribute(&name);
                    }
                    Ok(())
                }),
                element!("a[href]", |el| {
                    if let Some(href) = el.get_attribute("href") {
                        if let Some(new_href) = rewrite_href(&*decode_html_entities(&href)) {
                            el.set_attribute("href", &encode_double_quoted_attribute(&new_href))?;
                        }
                    }
                    Ok(())
                }),
                comments!("*", |comment| {
                    comment.remove();
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )?;
    Ok(collapse_line_breaks(&rewritten))
}

/// Replace every run of two or more `<br>` tags with exactly two.
pub fn collapse_line_breaks(html: &str) -> String {
    LINE_BREAK_RUN.replace_all(html, "<br><br>").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(html: &'a Html, css: &str) -> ElementRef<'a> {
        html.select(&Selector::parse(css).unwrap()).next().unwrap()
    }

    #[test]
    fn test_drops_disallowed_attributes() {
        let html = Html::parse_fragment(
            r#"<div id="x" class="c" style="color:red"><img src="a.png" width="3"></div>"#,
        );
        let out = sanitize(first(&html, "div"), |_| None).unwrap();
        assert_eq!(out, r#"<div><img src="a.png"></div>"#);
    }

    #[test]
    fn test_rewrites_anchor_hrefs_only() {
        let html = Html::parse_fragment(
            r#"<div><a href="/x.aspx" onclick="f()">x</a><img src="/x.aspx"></div>"#,
        );
        let out = sanitize(first(&html, "div"), |href| Some(href.replace(".aspx", "/"))).unwrap();
        assert_eq!(out, r#"<div><a href="/x/">x</a><img src="/x.aspx"></div>"#);
    }

    #[test]
    fn test_rewrite_sees_decoded_href() {
        let html = Html::parse_fragment(r#"<p><a href="/a?b=1&amp;c=2">x</a></p>"#);
        let mut seen = Vec::new();
        let out = sanitize(first(&html, "p"), |href| {
            seen.push(href.to_string());
            Some(format!("{href}&d=3"))
        })
        .unwrap();
        assert_eq!(seen, vec!["/a?b=1&c=2"]);
        assert_eq!(out, r#"<p><a href="/a?b=1&amp;c=2&amp;d=3">x</a></p>"#);
    }

    #[test]
    fn test_collapses_line_break_runs() {
        let html = Html::parse_fragment("<p>a<br><br/>\n<br>b<br>c</p>");
        let out = sanitize(first(&html, "p"), |_| None).unwrap();
        assert_eq!(out, "<p>a<br><br>b<br>c</p>");
    }

    #[test]
    fn test_escapes_text_and_attributes() {
        let html = Html::parse_fragment(r#"<p><a href="/a?b=1&amp;c=&quot;2&quot;">1 &lt; 2</a></p>"#);
        let out = sanitize(first(&html, "p"), |_| None).unwrap();
        assert_eq!(out, r#"<p><a href="/a?b=1&amp;c=&quot;2&quot;">1 &lt; 2</a></p>"#);
    }

    #[test]
    fn test_comments_are_dropped() {
        let html = Html::parse_fragment("<div>a<!-- hidden -->b</div>");
        assert_eq!(sanitize(first(&html, "div"), |_| None).unwrap(), "<div>ab</div>");
    }
}
