use std::sync::LazyLock;

use regex::Regex;
use ::scraper::node::Node;
use ::scraper::{ElementRef, Html, Selector};

static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static BOLD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("b, strong").unwrap());
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\u{a0}]+").unwrap());

const SKIPPED: [&str; 6] = ["head", "script", "style", "noscript", "template", "title"];

const BLOCKS: [&str; 22] = [
    "address", "article", "blockquote", "center", "dd", "div", "dl", "dt", "h1", "h2", "h3", "h4",
    "h5", "h6", "hr", "li", "ol", "p", "table", "td", "th", "tr",
];

/// Visible text of a page, one line per block element.
pub fn to_text(page: &str) -> String {
    let doc = Html::parse_document(page);
    let mut out = String::new();
    push_text(doc.root_element(), &mut out);
    out
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => out.push_str(&WS_RE.replace_all(t, " ")),
            Node::Element(e) => {
                let name = e.name();
                if SKIPPED.contains(&name) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let Some(child_el) = ElementRef::wrap(child) else { continue };
                let block = BLOCKS.contains(&name);
                if block {
                    out.push('\n');
                }
                push_text(child_el, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn collapse<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let joined: String = parts.collect();
    WS_RE.replace_all(&joined, " ").trim().to_string()
}

/// (href, link text) for every anchor with an href.
pub fn anchors(page: &str) -> Vec<(String, String)> {
    let doc = Html::parse_document(page);
    doc.select(&ANCHOR_SEL)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim().to_string();
            Some((href, collapse(a.text())))
        })
        .collect()
}

/// Text of every <b>/<strong> element, in document order.
pub fn bold_texts(page: &str) -> Vec<String> {
    let doc = Html::parse_document(page);
    doc.select(&BOLD_SEL).map(|b| collapse(b.text())).collect()
}

/// Trimmed non-empty lines joined by a blank line.
pub fn format_content(text: &str) -> String {
    text.lines()
        .map(|l| SPACES_RE.replace_all(l.trim(), " ").into_owned())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    }

    #[test]
    fn text_breaks_on_blocks() {
        let html = "<html><head><title>x</title></head><body><p>First&nbsp;line</p><div>Second <i>line</i></div>third<br>fourth</body></html>";
        assert_eq!(lines(&to_text(html)), vec!["First line", "Second line", "third", "fourth"]);
    }

    #[test]
    fn scripts_and_comments_dropped() {
        let text = to_text("<script>var a = '<p>';</script><!-- hidden --><p>shown</p>");
        assert_eq!(text.trim(), "shown");
    }

    #[test]
    fn entities_are_decoded() {
        let text = to_text("<p>JOS&Eacute; RIZAL vs. RAM&Oacute;N &eacute;&hellip; &amp; &#233;&#x41;</p>");
        assert_eq!(text.trim(), "JOSÉ RIZAL vs. RAMÓN é… & éA");
    }

    #[test]
    fn source_newlines_do_not_split_paragraphs() {
        let text = to_text("<p>THE UNITED STATES,\n   PLAINTIFF</p>");
        assert_eq!(lines(&text), vec!["THE UNITED STATES, PLAINTIFF"]);
    }

    #[test]
    fn anchors_and_bold() {
        let html = r#"<a href="gr_1_1901.html">G.R. No. 1</a> <A HREF='x.html'><b>X</b></A><a name="top">no href</a><strong>PEOPLE  vs.
            PE&Ntilde;A</strong>"#;
        let a = anchors(html);
        assert_eq!(a.len(), 2);
        assert_eq!(a[0], ("gr_1_1901.html".to_string(), "G.R. No. 1".to_string()));
        assert_eq!(a[1].0, "x.html");
        assert_eq!(bold_texts(html), vec!["X", "PEOPLE vs. PEÑA"]);
    }

    #[test]
    fn content_formatting() {
        assert_eq!(format_content("  a  \n\n\n b\tc \n"), "a\n\nb c");
    }
}
