use std::sync::LazyLock;

use regex::Regex;

static CASE_NUMBER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)G\.R\.?\s*No\.?\s*((?:L-)?\d+)",
        r"(?i)GR\s*No\.?\s*((?:L-)?\d+)",
        r"(?i)A\.C\.?\s*No\.?\s*((?:L-)?\d+)",
        r"(?i)A\.M\.?\s*No\.?\s*((?:L-)?\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const MONTHS: &str = "January|February|March|April|May|June|July|August|September|October|November|December";

static DATE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(&format!(r"(?i)(?:{})\s+\d{{1,2}},\s+\d{{4}}", MONTHS)).unwrap(),
        Regex::new(&format!(r"(?i)\d{{1,2}}\s+(?:{})\s+\d{{4}}", MONTHS)).unwrap(),
    ]
});

static VOLUME_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\d+\s+Phil\.?\s+\d+",
        r"(?i)\d+\s+SCRA\s+\d+",
        r"(?i)Vol\.?\s+\d+[,\s]+p\.?\s+\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub const NO_VOLUME: &str = "Volume information not available";
pub const NO_TITLE: &str = "Title not found";

fn first_match(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().to_string())
}

/// "G.R. No. 1234" style identifier, as written in the page.
pub fn case_number(text: &str) -> Option<String> {
    first_match(&CASE_NUMBER_RES, text)
}

pub fn decision_date(text: &str) -> Option<String> {
    first_match(&DATE_RES, text)
}

pub fn volume_page(text: &str) -> String {
    first_match(&VOLUME_RES, text).unwrap_or_else(|| NO_VOLUME.to_string())
}

/// A long bold "X vs. Y" caption, else an early text line naming the parties.
pub fn title(bold: &[String], text: &str) -> String {
    let from_bold = bold
        .iter()
        .take(3)
        .find(|t| t.chars().count() > 20 && t.to_lowercase().contains("vs"));
    if let Some(t) = from_bold {
        return t.clone();
    }

    text.lines()
        .take(20)
        .find(|l| {
            let lower = l.to_lowercase();
            lower.contains(" vs ") || lower.contains(" v. ")
        })
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string())
}

pub fn division(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    [
        ("first division", "First Division"),
        ("second division", "Second Division"),
        ("third division", "Third Division"),
        ("en banc", "En Banc"),
    ]
    .iter()
    .find(|(needle, _)| lower.contains(needle))
    .map(|(_, name)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_numbers() {
        assert_eq!(case_number("[ G.R. No. 1234, August 15, 1901 ]").as_deref(), Some("G.R. No. 1234"));
        assert_eq!(case_number("gr no 77").as_deref(), Some("gr no 77"));
        assert_eq!(case_number("A.M. No. 12 and A.C. No. 3").as_deref(), Some("A.C. No. 3"));
        assert_eq!(case_number("G.R. No. L-4521").as_deref(), Some("G.R. No. L-4521"));
        assert_eq!(case_number("nothing here"), None);
    }

    #[test]
    fn dates() {
        assert_eq!(decision_date("decided August 15, 1901.").as_deref(), Some("August 15, 1901"));
        assert_eq!(decision_date("on 3 March 1925").as_deref(), Some("3 March 1925"));
        assert_eq!(decision_date("no date"), None);
    }

    #[test]
    fn volumes() {
        assert_eq!(volume_page("reported in 1 Phil. 25 and"), "1 Phil. 25");
        assert_eq!(volume_page("12 SCRA 400"), "12 SCRA 400");
        assert_eq!(volume_page("Vol. 3, p. 17"), "Vol. 3, p. 17");
        assert_eq!(volume_page(""), NO_VOLUME);
    }

    #[test]
    fn titles() {
        let bold = vec!["DECISION".to_string(), "THE UNITED STATES vs. JUAN DELA CRUZ".to_string()];
        assert_eq!(title(&bold, ""), "THE UNITED STATES vs. JUAN DELA CRUZ");
        assert_eq!(title(&[], "header\n  SMITH v. JONES  \nbody"), "SMITH v. JONES");
        assert_eq!(title(&[], "no parties"), NO_TITLE);
    }

    #[test]
    fn divisions() {
        assert_eq!(division("SECOND DIVISION").as_deref(), Some("Second Division"));
        assert_eq!(division("EN BANC").as_deref(), Some("En Banc"));
        assert_eq!(division("plain"), None);
    }
}
