use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::fsio;
use crate::record::title_summary;

static CAPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\[\s*G\.R\. No\.\s*.*?\]\s*\n\n(.*?)\n\nD E C I S I O N").unwrap()
});

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RepairStats {
    pub scanned: usize,
    pub fixed: usize,
    pub skipped: usize,
}

/// Caption between the `[ G.R. No. … ]` line and `D E C I S I O N`,
/// collapsed onto one line.
pub fn title_from_content(content: &str) -> Option<String> {
    let caps = CAPTION_RE.captures(content)?;
    let title = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

fn needs_title(case: &Value) -> bool {
    match case.get("title") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Fill empty titles of `<dir>/<year>/*/*.json` from their content.
pub fn fix_titles(dir: &Path, year: i32) -> anyhow::Result<RepairStats> {
    let year_dir = dir.join(year.to_string());
    let mut stats = RepairStats::default();
    if !year_dir.is_dir() {
        warn!("{} is not a directory", year_dir.display());
        return Ok(stats);
    }

    // <year>/<month>/<case>.json only.
    let walker = WalkDir::new(&year_dir)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !path.extension().is_some_and(|e| e == "json") {
            continue;
        }
        stats.scanned += 1;
        match fix_file(path) {
            Ok(true) => stats.fixed += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                stats.skipped += 1;
            }
        }
    }
    info!("Fixed {} of {} files for {}", stats.fixed, stats.scanned, year);
    Ok(stats)
}

fn fix_file(path: &Path) -> anyhow::Result<bool> {
    let raw = fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        anyhow::bail!("empty file");
    }
    let mut case: Value = serde_json::from_str(&raw).context("invalid JSON")?;
    if !needs_title(&case) {
        return Ok(false);
    }
    let content = case
        .get("formatted_case_content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let Some(title) = title_from_content(content) else {
        debug!("No caption found in {}", path.display());
        return Ok(false);
    };

    case["title_summary"] = Value::String(title_summary(&title));
    case["title"] = Value::String(title);
    fsio::write_json_atomic(path, &case)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = "EN BANC\n\n[ G.R. No. 12, March 3, 1905 ]\n\nTHE UNITED STATES,\n   PLAINTIFF,  vs. JUAN\nDELA CRUZ\n\nD E C I S I O N\n\nBody.";

    #[test]
    fn extracts_caption() {
        assert_eq!(
            title_from_content(CONTENT).as_deref(),
            Some("THE UNITED STATES, PLAINTIFF, vs. JUAN DELA CRUZ")
        );
        assert_eq!(title_from_content("no caption here"), None);
    }

    #[test]
    fn fixes_only_empty_titles() {
        let dir = tempfile::tempdir().unwrap();
        let month = dir.path().join("1905/march");
        fs::create_dir_all(&month).unwrap();

        let empty = serde_json::json!({"title": "", "formatted_case_content": CONTENT, "extra": 1});
        let kept = serde_json::json!({"title": "KEEP ME", "formatted_case_content": CONTENT});
        fs::write(month.join("a.json"), empty.to_string()).unwrap();
        fs::write(month.join("b.json"), kept.to_string()).unwrap();
        fs::write(month.join("c.json"), "").unwrap();
        fs::write(month.join("d.json"), "{oops").unwrap();
        // Outside <year>/<month>/: not touched.
        fs::write(dir.path().join("1905/stray.json"), empty.to_string()).unwrap();
        fs::create_dir_all(month.join("deep")).unwrap();
        fs::write(month.join("deep/x.json"), empty.to_string()).unwrap();

        let stats = fix_titles(dir.path(), 1905).unwrap();
        assert_eq!(stats, RepairStats { scanned: 4, fixed: 1, skipped: 2 });

        let a: Value = serde_json::from_str(&fs::read_to_string(month.join("a.json")).unwrap()).unwrap();
        assert_eq!(a["title"], "THE UNITED STATES, PLAINTIFF, vs. JUAN DELA CRUZ");
        assert_eq!(a["title_summary"], a["title"]);
        assert_eq!(a["extra"], 1);
        let b: Value = serde_json::from_str(&fs::read_to_string(month.join("b.json")).unwrap()).unwrap();
        assert_eq!(b["title"], "KEEP ME");
    }

    #[test]
    fn missing_year_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(fix_titles(dir.path(), 1950).unwrap(), RepairStats::default());
    }
}
