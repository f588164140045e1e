use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::Context;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::fsio;
use crate::scan::{self, CaseFile};

pub const INDEX_FILE: &str = "case_index.json";

/// Summary of one case, keyed by case id in `case_index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub case_id: String,
    pub case_number: String,
    pub gr_number: String,
    pub year: Option<i64>,
    pub month: Option<String>,
    pub decision_date: String,
    pub title: String,
    pub title_summary: String,
    pub volume_page: String,
    pub division: Option<String>,
    pub categories: Vec<String>,
    pub file_path: String,
    pub content_length: u64,
}

impl IndexEntry {
    fn from_case(case_id: String, file_path: String, case: &Value) -> Self {
        let text = |k: &str| case.get(k).and_then(Value::as_str).unwrap_or_default().to_string();
        Self {
            case_number: text("case_number"),
            gr_number: text("gr_number"),
            year: case.get("year").and_then(Value::as_i64),
            month: case.get("month").and_then(Value::as_str).map(str::to_string),
            decision_date: text("decision_date"),
            title: text("title"),
            title_summary: text("title_summary"),
            volume_page: text("volume_page"),
            division: case.get("division").and_then(Value::as_str).map(str::to_string),
            categories: case
                .get("categories")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default(),
            content_length: case.get("content_length").and_then(Value::as_u64).unwrap_or(0),
            case_id,
            file_path,
        }
    }
}

#[derive(Debug, Default)]
pub struct IndexUpdate {
    pub new_cases: usize,
    pub updated_cases: usize,
    pub skipped: usize,
    pub total: usize,
    pub by_year: BTreeMap<i64, usize>,
}

impl IndexUpdate {
    pub fn print(&self) {
        println!("\nNew cases added: {}", self.new_cases);
        println!("Existing cases updated: {}", self.updated_cases);
        if self.skipped > 0 {
            println!("Unreadable files skipped: {}", self.skipped);
        }
        println!("Total cases in index: {}", self.total);
        println!("\nCases by year:");
        for (year, n) in &self.by_year {
            println!("  {}: {} cases", year, n);
        }
    }
}

fn load_index(path: &Path) -> anyhow::Result<BTreeMap<String, IndexEntry>> {
    match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).with_context(|| format!("corrupt index {}", path.display())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

fn read_case(file: &CaseFile) -> anyhow::Result<Value> {
    let raw = fs::read_to_string(&file.path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Upsert every dated case file under `dir` into the index at `index_file`.
pub fn update_index(dir: &Path, index_file: &Path, start: Option<i32>, end: Option<i32>) -> anyhow::Result<IndexUpdate> {
    let mut index = load_index(index_file)?;
    info!("Loaded existing index with {} cases", index.len());

    let files: Vec<CaseFile> = scan::case_files(dir, start, end)
        .with_context(|| format!("scanning {}", dir.display()))?
        .into_iter()
        .filter(|f| f.year.is_some())
        .collect();
    info!("Found {} case files", files.len());

    let parsed: Vec<(&CaseFile, anyhow::Result<Value>)> = files.par_iter().map(|f| (f, read_case(f))).collect();

    let mut update = IndexUpdate::default();
    for (file, case) in parsed {
        let case = match case {
            Ok(c) => c,
            Err(e) => {
                warn!("Skipping {}: {}", file.rel, e);
                update.skipped += 1;
                continue;
            }
        };
        let case_id = file
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entry = IndexEntry::from_case(case_id.clone(), file.rel.clone(), &case);
        if index.insert(case_id, entry).is_some() {
            update.updated_cases += 1;
        } else {
            update.new_cases += 1;
        }
    }

    fsio::write_json_atomic(index_file, &index).with_context(|| format!("writing {}", index_file.display()))?;

    update.total = index.len();
    for entry in index.values() {
        if let Some(y) = entry.year {
            *update.by_year.entry(y).or_default() += 1;
        }
    }
    info!("Index saved to {}", index_file.display());
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_case(root: &Path, rel: &str, title: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        let v = serde_json::json!({
            "case_number": "G.R. No. 1",
            "gr_number": "1",
            "year": 1901,
            "month": "august",
            "decision_date": "August 1, 1901",
            "title": title,
            "title_summary": title,
            "volume_page": "1 Phil. 1",
            "division": null,
            "categories": ["General"],
            "content_length": 42
        });
        fs::write(p, v.to_string()).unwrap();
    }

    #[test]
    fn builds_then_updates_index() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_case(root, "1901/august/G_R__No__1.json", "A vs. B");
        write_case(root, "1902/may/G_R__No__7.json", "C vs. D");
        fs::write(root.join("1902/may/broken.json"), "{").unwrap();
        let index_file = root.join(INDEX_FILE);

        let first = update_index(root, &index_file, None, None).unwrap();
        assert_eq!(first.new_cases, 2);
        assert_eq!(first.updated_cases, 0);
        assert_eq!(first.skipped, 1);
        assert_eq!(first.total, 2);

        write_case(root, "1901/august/G_R__No__1.json", "A vs. Z");
        let second = update_index(root, &index_file, Some(1901), Some(1901)).unwrap();
        assert_eq!(second.new_cases, 0);
        assert_eq!(second.updated_cases, 1);
        assert_eq!(second.total, 2);

        let index = load_index(&index_file).unwrap();
        let entry = &index["G_R__No__1"];
        assert_eq!(entry.title, "A vs. Z");
        assert_eq!(entry.file_path, "1901/august/G_R__No__1.json");
        assert_eq!(entry.division, None);
        assert_eq!(entry.content_length, 42);
        assert_eq!(second.by_year[&1902], 1);
    }
}
