use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Name fragments of bookkeeping JSON files that live next to case files.
const SKIP_NAMES: [&str; 4] = ["index", "report", "progress", "validation"];

/// A case JSON file found under a scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFile {
    pub path: PathBuf,
    /// Path relative to the scan root, with `/` separators.
    pub rel: String,
    /// First four-digit path component below the root.
    pub year: Option<i32>,
}

/// All case files under `dir`, sorted by relative path. Files with a year
/// outside `[start, end]` are left out; files without a year are kept.
pub fn case_files(dir: &Path, start: Option<i32>, end: Option<i32>) -> io::Result<Vec<CaseFile>> {
    let paths = json_files(dir)?;

    let mut files: Vec<CaseFile> = paths
        .into_iter()
        .filter(|p| !is_bookkeeping(p))
        .filter_map(|path| {
            let rel_path = path.strip_prefix(dir).ok()?.to_path_buf();
            let parts: Vec<String> = rel_path
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let year = parts
                .iter()
                .find(|p| p.len() == 4 && p.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|p| p.parse().ok());
            Some(CaseFile {
                rel: parts.join("/"),
                path,
                year,
            })
        })
        .filter(|f| match f.year {
            Some(y) => start.map_or(true, |s| y >= s) && end.map_or(true, |e| y <= e),
            None => true,
        })
        .collect();
    files.sort_by(|a, b| a.rel.cmp(&b.rel));
    Ok(files)
}

fn is_bookkeeping(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    SKIP_NAMES.iter().any(|s| name.contains(s))
}

/// Every `.json` file below `dir`, at any depth.
pub fn json_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "json") {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}
