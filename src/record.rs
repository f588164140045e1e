use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::unit::WorkUnit;

pub const EXTRACTION_VERSION: &str = "2.0_enhanced_full_content";
pub const TITLE_SUMMARY_LEN: usize = 100;
const WEBPAGE_ROOT: &str = "/workspace/PRUDEUS_DB/WEBPAGE_VERSION";

static UNSAFE_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\-]").unwrap());

/// One extracted Supreme Court case, serialized one file per case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub file_path: String,
    pub filename: String,
    pub year: i32,
    pub month: String,
    pub case_number: String,
    pub gr_number: String,
    pub volume_page: String,
    pub decision_date: String,
    pub title: String,
    pub division: Option<String>,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
    pub title_summary: String,
    pub formatted_case_content: String,
    pub content_length: usize,
    pub metadata_extraction_date: String,
    pub extraction_version: String,
}

/// Fields parsed from a case page, before path/bookkeeping fields are derived.
#[derive(Debug, Clone, Default)]
pub struct CaseFields {
    pub case_number: String,
    pub volume_page: String,
    pub decision_date: String,
    pub title: String,
    pub division: Option<String>,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
    pub content: String,
}

impl CaseRecord {
    pub fn build(unit: WorkUnit, fields: CaseFields) -> Self {
        let case_id = safe_case_id(&fields.case_number);
        let filename = format!("{}.html", case_id);
        CaseRecord {
            file_path: format!("{}/{}/{}/{}", WEBPAGE_ROOT, unit.year, unit.month, filename),
            filename,
            year: unit.year,
            month: unit.month.name().to_string(),
            gr_number: gr_number(&fields.case_number),
            case_number: fields.case_number,
            volume_page: fields.volume_page,
            decision_date: fields.decision_date,
            title_summary: title_summary(&fields.title),
            title: fields.title,
            division: fields.division,
            categories: fields.categories,
            keywords: fields.keywords,
            content_length: fields.content.chars().count(),
            formatted_case_content: fields.content,
            metadata_extraction_date: chrono::Utc::now().to_rfc3339(),
            extraction_version: EXTRACTION_VERSION.to_string(),
        }
    }

    /// Identifier unique within the record's month; also the output file stem.
    pub fn case_id(&self) -> String {
        self.filename
            .strip_suffix(".html")
            .unwrap_or(&self.filename)
            .to_string()
    }

    /// Move the record to another case id, keeping its case number.
    pub fn rename(&mut self, case_id: &str) {
        let filename = format!("{}.html", case_id);
        self.file_path = format!("{}/{}/{}/{}", WEBPAGE_ROOT, self.year, self.month, filename);
        self.filename = filename;
    }

    /// Required non-null fields the writer refuses to persist without.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let required = [
            ("case_number", &self.case_number),
            ("filename", &self.filename),
            ("title", &self.title),
            ("decision_date", &self.decision_date),
            ("formatted_case_content", &self.formatted_case_content),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }
        if self.categories.is_empty() {
            missing.push("categories");
        }
        missing
    }
}

pub fn safe_case_id(case_number: &str) -> String {
    UNSAFE_CHARS_RE.replace_all(case_number, "_").into_owned()
}

fn gr_number(case_number: &str) -> String {
    case_number
        .replace("G.R. No. ", "")
        .replace("G.R. ", "")
}

/// Title clipped to 100 characters with a trailing ellipsis.
pub fn title_summary(title: &str) -> String {
    if title.chars().count() > TITLE_SUMMARY_LEN {
        let clipped: String = title.chars().take(TITLE_SUMMARY_LEN).collect();
        format!("{}...", clipped)
    } else {
        title.to_string()
    }
}
