use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[a-z]{3,}\b").unwrap());

const MAX_CATEGORIES: usize = 6;
const MAX_KEYWORDS: usize = 20;

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Civil Law", &["civil", "contract", "property", "obligation", "tort", "damages"]),
    ("Criminal Law", &["criminal", "murder", "homicide", "theft", "robbery", "fraud"]),
    ("Labor Law", &["labor", "employment", "employee", "employer", "nlrc", "worker"]),
    ("Commercial Law", &["commercial", "corporation", "partnership", "banking", "insurance"]),
    ("Tax Law", &["tax", "taxation", "bir", "revenue", "customs"]),
    ("Administrative Law", &["administrative", "agency", "regulation", "license"]),
    ("Constitutional Law", &["constitutional", "constitution", "bill of rights", "due process"]),
    ("Family Law", &["family", "marriage", "divorce", "adoption", "custody"]),
    ("Property Law", &["land", "real property", "title", "ownership", "possession"]),
    ("Remedial Law", &["procedure", "jurisdiction", "appeal", "certiorari", "mandamus"]),
];

const STOP_WORDS: &[&str] = &[
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "is", "was", "are",
    "were", "been", "be", "have", "has", "had", "that", "this", "these", "those", "from", "by",
    "not", "which", "such", "all",
];

static STOP_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());

/// Areas of law whose keywords appear in the text; "General" when none do.
pub fn categories(content: &str) -> Vec<String> {
    let lower = content.to_lowercase();
    let mut found: Vec<String> = CATEGORY_KEYWORDS
        .iter()
        .filter(|(_, kws)| kws.iter().any(|kw| lower.contains(kw)))
        .map(|(name, _)| name.to_string())
        .take(MAX_CATEGORIES)
        .collect();
    if found.is_empty() {
        found.push("General".to_string());
    }
    found
}

/// Most frequent words of title + content; ties keep first-seen order.
pub fn keywords(content: &str, title: &str) -> Vec<String> {
    let text = format!("{} {}", title, content).to_lowercase();
    let mut order: Vec<&str> = Vec::new();
    let mut freq: HashMap<&str, usize> = HashMap::new();

    for m in WORD_RE.find_iter(&text) {
        let word = m.as_str();
        if STOP_SET.contains(word) {
            continue;
        }
        let count = freq.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    order.sort_by(|a, b| freq[b].cmp(&freq[a]));
    order
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_categories_in_table_order() {
        let cats = categories("An appeal on a contract of insurance over land.");
        assert_eq!(cats, vec!["Civil Law", "Commercial Law", "Property Law", "Remedial Law"]);
    }

    #[test]
    fn general_when_nothing_matches() {
        assert_eq!(categories("xyz"), vec!["General"]);
    }

    #[test]
    fn capped_at_six() {
        let text = "civil criminal labor commercial tax administrative constitutional family land appeal";
        assert_eq!(categories(text).len(), MAX_CATEGORIES);
    }

    #[test]
    fn keywords_by_frequency() {
        let kw = keywords("the court held the land was sold; land sale void. court", "Land");
        assert_eq!(&kw[..2], &["land".to_string(), "court".to_string()]);
        assert!(!kw.contains(&"the".to_string()));
        assert!(kw.iter().all(|w| w.len() >= 3));
    }

    #[test]
    fn keywords_capped() {
        let glued: String = (0..40).map(|i| format!("word{} ", i)).collect();
        assert!(keywords(&glued, "").is_empty());
        let many: String = ('a'..='z').map(|c| format!("{c}{c}{c} ")).collect();
        assert_eq!(keywords(&many, "").len(), MAX_KEYWORDS);
    }
}
