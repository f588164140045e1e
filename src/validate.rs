use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::scan::{self, CaseFile};
use crate::unit::Month;

const REQUIRED_FIELDS: [&str; 16] = [
    "file_path",
    "filename",
    "year",
    "month",
    "case_number",
    "gr_number",
    "volume_page",
    "decision_date",
    "title",
    "categories",
    "keywords",
    "title_summary",
    "formatted_case_content",
    "content_length",
    "metadata_extraction_date",
    "extraction_version",
];

const NULLABLE_FIELDS: [&str; 2] = ["division", "decision_date"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct YearCounts {
    pub valid: usize,
    pub invalid: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseIssues {
    pub file: String,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub total_cases: usize,
    pub valid_cases: usize,
    pub invalid_cases: usize,
    pub cases_by_year: BTreeMap<i32, YearCounts>,
    pub errors: Vec<CaseIssues>,
}

/// Problems with one case file; empty when the file is valid.
pub fn validate_case(path: &Path) -> Vec<String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => return vec![format!("Cannot read file: {}", e)],
    };
    let case: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => return vec![format!("Invalid JSON: {}", e)],
    };
    let Some(obj) = case.as_object() else {
        return vec!["Top-level value is not an object".to_string()];
    };

    let mut issues = Vec::new();
    for field in REQUIRED_FIELDS {
        match obj.get(field) {
            None => issues.push(format!("Missing required field: {}", field)),
            Some(Value::Null) if !NULLABLE_FIELDS.contains(&field) => {
                issues.push(format!("Field '{}' is null but should have a value", field))
            }
            Some(Value::String(s)) if !NULLABLE_FIELDS.contains(&field) && s.trim().is_empty() => {
                issues.push(format!("Field '{}' is empty", field))
            }
            _ => {}
        }
    }

    for field in ["categories", "keywords"] {
        match obj.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Array(a)) if a.is_empty() => issues.push(format!("Field '{}' is empty", field)),
            Some(Value::Array(_)) => {}
            Some(_) => issues.push(format!("Field '{}' must be an array", field)),
        }
    }

    match obj.get("year") {
        Some(Value::Number(n)) if n.is_i64() => {
            let y = n.as_i64().unwrap_or_default();
            if !(1900..=2100).contains(&y) {
                issues.push(format!("Field 'year' has invalid value: {}", y));
            }
        }
        None | Some(Value::Null) => {}
        Some(other) => issues.push(format!("Field 'year' must be an integer, got {}", type_name(other))),
    }

    let month = obj.get("month").and_then(scalar_text);
    if let Some(m) = &month {
        if !is_valid_month(m) {
            issues.push(format!("Invalid month: {}", m));
        }
    }

    if let (Some(declared), Some(Value::String(content))) =
        (obj.get("content_length"), obj.get("formatted_case_content"))
    {
        let actual = content.chars().count();
        if declared.as_u64() != Some(actual as u64) {
            issues.push(format!(
                "content_length mismatch: declared {}, actual {}",
                declared, actual
            ));
        }
    }

    if let (Some(year), Some(m)) = (obj.get("year").and_then(scalar_text), &month) {
        let expected = format!("{}/{}", year, m);
        let actual = path.to_string_lossy().replace('\\', "/");
        if !actual.contains(&expected) {
            issues.push(format!(
                "File location doesn't match year/month: expected {} in path",
                expected
            ));
        }
    }

    issues
}

/// Full lowercase month names or month numbers, optionally zero-padded.
fn is_valid_month(m: &str) -> bool {
    let lower = m.to_lowercase();
    if Month::ALL.iter().any(|month| month.name() == lower) {
        return true;
    }
    m.len() <= 2 && m.parse::<u32>().is_ok_and(|n| (1..=12).contains(&n))
}

/// String form of a scalar, without JSON quoting.
fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "float",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Validate every case file under `dir` in parallel.
pub fn validate_dir(dir: &Path, start: Option<i32>, end: Option<i32>) -> anyhow::Result<ValidationReport> {
    let files = scan::case_files(dir, start, end)?;
    info!("Validating {} case files in {}", files.len(), dir.display());

    let pb = ProgressBar::new(files.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let results: Vec<(&CaseFile, Vec<String>)> = files
        .par_iter()
        .map(|f| {
            let issues = validate_case(&f.path);
            pb.inc(1);
            (f, issues)
        })
        .collect();
    pb.finish_and_clear();

    let mut report = ValidationReport::default();
    for (file, issues) in results {
        report.total_cases += 1;
        let valid = issues.is_empty();
        if valid {
            report.valid_cases += 1;
        } else {
            report.invalid_cases += 1;
            report.errors.push(CaseIssues {
                file: file.rel.clone(),
                issues,
            });
        }
        if let Some(year) = file.year {
            let counts = report.cases_by_year.entry(year).or_default();
            if valid {
                counts.valid += 1;
            } else {
                counts.invalid += 1;
            }
        }
    }
    Ok(report)
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_cases == 0
    }

    pub fn print(&self) {
        for e in &self.errors {
            println!("INVALID {}", e.file);
            for issue in &e.issues {
                println!("   - {}", issue);
            }
        }

        let pct = |n: usize| {
            if self.total_cases == 0 {
                0.0
            } else {
                n as f64 * 100.0 / self.total_cases as f64
            }
        };
        println!("\n{}", "=".repeat(80));
        println!("VALIDATION SUMMARY");
        println!("{}", "=".repeat(80));
        println!("Total cases validated: {}", self.total_cases);
        println!("Valid cases:   {} ({:.1}%)", self.valid_cases, pct(self.valid_cases));
        println!("Invalid cases: {} ({:.1}%)", self.invalid_cases, pct(self.invalid_cases));

        if !self.cases_by_year.is_empty() {
            println!("\nCases by year:");
            for (year, c) in &self.cases_by_year {
                let total = c.valid + c.invalid;
                let status = if c.invalid == 0 { "ok" } else { "!!" };
                println!("  {} {}: {}/{} valid", status, year, c.valid, total);
            }
        }

        if self.is_clean() {
            println!("\nAll cases passed validation.");
        } else {
            println!("\n{} cases have validation errors", self.invalid_cases);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CaseFields, CaseRecord};
    use crate::unit::WorkUnit;
    use crate::writer::{JsonDirWriter, RecordWriter};

    fn sample(n: u32) -> CaseRecord {
        CaseRecord::build(
            WorkUnit::new(1901, Month::August),
            CaseFields {
                case_number: format!("G.R. No. {}", n),
                volume_page: "1 Phil. 1".into(),
                decision_date: "August 1, 1901".into(),
                title: "SMITH vs. JONES".into(),
                division: None,
                categories: vec!["Civil Law".into()],
                keywords: vec!["smith".into()],
                content: "SMITH vs. JONES\n\nSO ORDERED.".into(),
            },
        )
    }

    #[test]
    fn written_records_are_valid() {
        let dir = tempfile::tempdir().unwrap();
        let w = JsonDirWriter::new(dir.path());
        w.write_unit(WorkUnit::new(1901, Month::August), &[sample(1), sample(2)])
            .unwrap();

        let report = validate_dir(dir.path(), None, None).unwrap();
        assert_eq!(report.total_cases, 2);
        assert!(report.is_clean(), "{:?}", report.errors);
        assert_eq!(report.cases_by_year[&1901], YearCounts { valid: 2, invalid: 0 });
    }

    #[test]
    fn flags_each_problem() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = serde_json::to_value(sample(3)).unwrap();
        v["title"] = Value::String(" ".into());
        v["keywords"] = serde_json::json!([]);
        v["content_length"] = serde_json::json!(1);
        v["year"] = serde_json::json!("1901");
        v.as_object_mut().unwrap().remove("gr_number");
        let path = dir.path().join("1901/march/x.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, serde_json::to_string(&v).unwrap()).unwrap();

        let issues = validate_case(&path);
        let joined = issues.join("\n");
        assert!(joined.contains("Missing required field: gr_number"));
        assert!(joined.contains("Field 'title' is empty"));
        assert!(joined.contains("Field 'keywords' is empty"));
        assert!(joined.contains("content_length mismatch"));
        assert!(joined.contains("must be an integer, got str"));
        assert!(joined.contains("expected 1901/august in path"));
    }

    #[test]
    fn month_forms() {
        assert!(is_valid_month("august"));
        assert!(is_valid_month("August"));
        assert!(is_valid_month("08"));
        assert!(is_valid_month("8"));
        assert!(!is_valid_month("aug"));
        assert!(!is_valid_month("13"));
    }

    #[test]
    fn nullable_fields_may_be_null() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = serde_json::to_value(sample(4)).unwrap();
        v["decision_date"] = Value::Null;
        v["division"] = Value::Null;
        let path = dir.path().join("1901/august/y.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, serde_json::to_string(&v).unwrap()).unwrap();
        assert!(validate_case(&path).is_empty());
    }

    #[test]
    fn broken_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1901/august/bad.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{\"year\": ").unwrap();
        let report = validate_dir(dir.path(), None, None).unwrap();
        assert_eq!(report.invalid_cases, 1);
        assert!(report.errors[0].issues[0].starts_with("Invalid JSON"));
        assert_eq!(report.errors[0].file, "1901/august/bad.json");
    }
}
