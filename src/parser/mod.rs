pub mod classify;
pub mod fields;
pub mod html;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

use crate::record::{CaseFields, CaseRecord};
use crate::unit::WorkUnit;

static MONTH_PAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\d{4}\.html$").unwrap()
});

/// A case page linked from a month listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseLink {
    pub url: String,
    pub href: String,
    pub text: String,
}

/// Relative `.html` links of a month listing, resolved against `base_url`.
/// Navigation back to year/month index pages is skipped.
pub fn parse_listing(listing_html: &str, base_url: &str) -> Vec<CaseLink> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();

    html::anchors(listing_html)
        .into_iter()
        .filter(|(href, _)| {
            let lower = href.to_ascii_lowercase();
            lower.ends_with(".html") && !lower.starts_with("http") && !is_navigation(&lower)
        })
        .filter_map(|(href, text)| {
            let url = base.join(&href).ok()?.to_string();
            seen.insert(url.clone()).then_some(CaseLink { url, href, text })
        })
        .collect()
}

fn is_navigation(href: &str) -> bool {
    let name = href.rsplit('/').next().unwrap_or(href);
    name.starts_with("juri")
        || name == "index.html"
        || MONTH_PAGE_RE.is_match(name)
        || href.starts_with("../")
}

/// Three-pass extraction: html → text → fields → record.
pub fn parse_case(page_html: &str, url: &str, unit: WorkUnit) -> CaseRecord {
    let text = html::to_text(page_html);
    let bold = html::bold_texts(page_html);
    let content = html::format_content(&text);

    let case_number = fields::case_number(&text).unwrap_or_else(|| stem_of(url));
    let title = fields::title(&bold, &text);
    let decision_date = fields::decision_date(&text)
        .unwrap_or_else(|| format!("Date not specified, {}", unit.year));

    CaseRecord::build(
        unit,
        CaseFields {
            case_number,
            volume_page: fields::volume_page(&text),
            decision_date,
            division: fields::division(&text),
            categories: classify::categories(&text),
            keywords: classify::keywords(&text, &title),
            title,
            content,
        },
    )
}

fn stem_of(url: &str) -> String {
    let name = url.rsplit('/').next().unwrap_or(url);
    name.strip_suffix(".html").unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Month;

    const LISTING: &str = r#"
        <html><body>
        <a href="../juri1901.html">1901</a>
        <a href="aug1901.html">August</a>
        <a href="gr_l-1_1901.html">G.R. No. L-1 August 15, 1901 SMITH vs. JONES</a>
        <a href="gr_l-2_1901.html">G.R. No. L-2</a>
        <a href="gr_l-2_1901.html">duplicate</a>
        <a href="https://elsewhere.example/x.html">external</a>
        <a href="notes.pdf">pdf</a>
        </body></html>"#;

    const CASE: &str = r#"
        <html><head><title>G.R. No. 1</title></head><body>
        <center><b>EN BANC</b></center>
        <p>[ G.R. No. 1, August 15, 1901 ]</p>
        <p><b>THE UNITED STATES, PLAINTIFF, vs. JUAN DELA CRUZ, DEFENDANT.</b></p>
        <p>D E C I S I O N</p>
        <p>This appeal concerns the theft of a carabao. 1 Phil. 25</p>
        <p>SO ORDERED.</p>
        </body></html>"#;

    #[test]
    fn listing_links() {
        let base = "https://lawphil.net/judjuris/juri1901/aug1901/aug1901.html";
        let links = parse_listing(LISTING, base);
        assert_eq!(links.len(), 2);
        assert_eq!(
            links[0].url,
            "https://lawphil.net/judjuris/juri1901/aug1901/gr_l-1_1901.html"
        );
        assert_eq!(links[1].href, "gr_l-2_1901.html");
    }

    #[test]
    fn case_page() {
        let unit = WorkUnit::new(1901, Month::August);
        let r = parse_case(CASE, "https://lawphil.net/judjuris/juri1901/aug1901/gr_1_1901.html", unit);
        assert_eq!(r.case_number, "G.R. No. 1");
        assert_eq!(r.gr_number, "1");
        assert_eq!(r.decision_date, "August 15, 1901");
        assert_eq!(r.volume_page, "1 Phil. 25");
        assert_eq!(r.division.as_deref(), Some("En Banc"));
        assert!(r.title.starts_with("THE UNITED STATES"));
        assert!(r.categories.contains(&"Criminal Law".to_string()));
        assert!(r.formatted_case_content.contains("SO ORDERED."));
        assert!(!r.formatted_case_content.contains("<p>"));
        assert!(r.missing_fields().is_empty());
    }

    #[test]
    fn accented_party_names_are_decoded() {
        let page = "<p>[ G.R. No. 8, May 2, 1930 ]</p><p><b>JOS&Eacute; RIZAL vs. RAM&Oacute;N &eacute;&hellip;</b></p>";
        let r = parse_case(page, "https://x/juri1930/may1930/gr_8.html", WorkUnit::new(1930, Month::May));
        assert_eq!(r.title, "JOSÉ RIZAL vs. RAMÓN é…");
        assert!(r.formatted_case_content.contains("RAMÓN"));
    }

    #[test]
    fn case_without_number_uses_filename() {
        let unit = WorkUnit::new(1930, Month::May);
        let r = parse_case("<p>Nothing useful</p>", "https://x/juri1930/may1930/res_12.html", unit);
        assert_eq!(r.case_number, "res_12");
        assert_eq!(r.decision_date, "Date not specified, 1930");
        assert_eq!(r.title, fields::NO_TITLE);
        assert_eq!(r.categories, vec!["General"]);
    }
}
