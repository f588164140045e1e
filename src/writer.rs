use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::WriteError;
use crate::record::CaseRecord;
use crate::unit::WorkUnit;

/// Lists the files written so far for a unit that has not finished.
const INFLIGHT_MARKER: &str = ".unit-inflight";

/// Persistence side of the pipeline.
pub trait RecordWriter {
    /// Persist every record of `unit`. Either all records are written or none
    /// remain on disk when this returns an error. The write stays revocable
    /// through `discard_partial` until `commit_unit` is called.
    fn write_unit(&self, unit: WorkUnit, records: &[CaseRecord]) -> Result<usize, WriteError>;

    /// Make the last `write_unit` of `unit` permanent. Called once the unit's
    /// completion is checkpointed.
    fn commit_unit(&self, unit: WorkUnit) -> Result<(), WriteError>;

    /// Remove output left behind by a write of `unit` that never finished.
    fn discard_partial(&self, unit: WorkUnit) -> Result<usize, WriteError>;
}

/// Writes `<root>/<year>/<month>/<case_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirWriter {
    root: PathBuf,
}

impl JsonDirWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn unit_dir(&self, unit: WorkUnit) -> PathBuf {
        self.root.join(unit.year.to_string()).join(unit.month.name())
    }

    pub fn record_path(&self, unit: WorkUnit, record: &CaseRecord) -> PathBuf {
        self.unit_dir(unit).join(format!("{}.json", record.case_id()))
    }

    /// Write one record, refusing to replace an existing one.
    pub fn write_record(&self, unit: WorkUnit, record: &CaseRecord) -> Result<PathBuf, WriteError> {
        check_record(record)?;
        let dir = self.unit_dir(unit);
        fs::create_dir_all(&dir).map_err(|e| WriteError::io(&dir, e))?;
        let path = self.record_path(unit, record);
        let file = create_exclusive(&path)?;
        write_json(file, &path, record)?;
        Ok(path)
    }

    /// Undo the files created for `unit`. The marker survives if anything is
    /// left behind so the next attempt can finish the cleanup.
    fn rollback(&self, unit: WorkUnit, created: &[PathBuf]) {
        let mut clean = true;
        for path in created {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Rollback of {} failed: {}", path.display(), e);
                    clean = false;
                }
            }
        }
        if clean {
            let _ = fs::remove_file(self.unit_dir(unit).join(INFLIGHT_MARKER));
        }
    }
}

impl RecordWriter for JsonDirWriter {
    fn write_unit(&self, unit: WorkUnit, records: &[CaseRecord]) -> Result<usize, WriteError> {
        for record in records {
            check_record(record)?;
        }

        self.discard_partial(unit)?;
        if records.is_empty() {
            return Ok(0);
        }

        let dir = self.unit_dir(unit);
        fs::create_dir_all(&dir).map_err(|e| WriteError::io(&dir, e))?;
        let marker_path = dir.join(INFLIGHT_MARKER);
        let mut marker = File::create(&marker_path).map_err(|e| WriteError::io(&marker_path, e))?;

        let mut created = Vec::with_capacity(records.len());
        for record in records {
            let path = self.record_path(unit, record);
            let result = create_exclusive(&path).and_then(|file| {
                created.push(path.clone());
                writeln!(marker, "{}", file_name(&path))
                    .and_then(|_| marker.sync_data())
                    .map_err(|e| WriteError::io(&marker_path, e))?;
                write_json(file, &path, record)
            });
            if let Err(e) = result {
                self.rollback(unit, &created);
                return Err(e);
            }
        }

        debug!("Wrote {} records for {}", created.len(), unit);
        Ok(created.len())
    }

    fn commit_unit(&self, unit: WorkUnit) -> Result<(), WriteError> {
        let marker_path = self.unit_dir(unit).join(INFLIGHT_MARKER);
        match fs::remove_file(&marker_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WriteError::io(&marker_path, e)),
        }
    }

    fn discard_partial(&self, unit: WorkUnit) -> Result<usize, WriteError> {
        let dir = self.unit_dir(unit);
        let marker_path = dir.join(INFLIGHT_MARKER);
        let listed = match fs::read_to_string(&marker_path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(WriteError::io(&marker_path, e)),
        };

        let mut removed = 0;
        for name in listed.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let path = dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(WriteError::io(&path, e)),
            }
        }
        fs::remove_file(&marker_path).map_err(|e| WriteError::io(&marker_path, e))?;
        warn!("Discarded {} partially written records for {}", removed, unit);
        Ok(removed)
    }
}

fn check_record(record: &CaseRecord) -> Result<(), WriteError> {
    let missing = record.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(WriteError::InvalidRecord {
            case_id: record.case_id(),
            reason: format!("missing {}", missing.join(", ")),
        })
    }
}

/// Create `path` only if no record lives there. A zero-length file is the
/// remnant of a create that never got its content and is reused.
fn create_exclusive(path: &Path) -> Result<File, WriteError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => Ok(f),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let empty = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(false);
            if empty {
                OpenOptions::new()
                    .write(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|e| WriteError::io(path, e))
            } else {
                Err(WriteError::Collision(path.to_path_buf()))
            }
        }
        Err(e) => Err(WriteError::io(path, e)),
    }
}

fn write_json(file: File, path: &Path, record: &CaseRecord) -> Result<(), WriteError> {
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, record)
        .map_err(|e| WriteError::io(path, e.into()))?;
    w.write_all(b"\n").map_err(|e| WriteError::io(path, e))?;
    let file = w
        .into_inner()
        .map_err(|e| WriteError::io(path, e.into_error()))?;
    file.sync_all().map_err(|e| WriteError::io(path, e))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CaseFields;
    use crate::unit::Month;

    const UNIT: WorkUnit = WorkUnit {
        year: 1901,
        month: Month::August,
    };

    fn record(number: &str) -> CaseRecord {
        CaseRecord::build(
            UNIT,
            CaseFields {
                case_number: number.into(),
                volume_page: "1 Phil. 1".into(),
                decision_date: "August 15, 1901".into(),
                title: "SMITH vs. JONES".into(),
                division: None,
                categories: vec!["General".into()],
                keywords: vec!["smith".into()],
                content: "SMITH vs. JONES".into(),
            },
        )
    }

    fn json_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .map(|rd| {
                rd.filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn writes_one_file_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let w = JsonDirWriter::new(dir.path());
        let n = w.write_unit(UNIT, &[record("G.R. No. 1"), record("G.R. No. 2")]).unwrap();
        assert_eq!(n, 2);
        let unit_dir = dir.path().join("1901/august");
        assert!(unit_dir.join("G_R__No__1.json").exists());
        assert!(unit_dir.join(INFLIGHT_MARKER).exists());
        w.commit_unit(UNIT).unwrap();
        assert!(!unit_dir.join(INFLIGHT_MARKER).exists());
        w.commit_unit(UNIT).unwrap();

        let raw = fs::read_to_string(unit_dir.join("G_R__No__2.json")).unwrap();
        let back: CaseRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.case_number, "G.R. No. 2");
    }

    #[test]
    fn collision_is_rejected_and_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let w = JsonDirWriter::new(dir.path());
        w.write_record(UNIT, &record("G.R. No. 2")).unwrap();
        let before = fs::read_to_string(dir.path().join("1901/august/G_R__No__2.json")).unwrap();

        let err = w
            .write_unit(UNIT, &[record("G.R. No. 1"), record("G.R. No. 2")])
            .unwrap_err();
        assert!(matches!(err, WriteError::Collision(_)));
        assert!(!err.is_persistence());

        let unit_dir = dir.path().join("1901/august");
        assert!(!unit_dir.join("G_R__No__1.json").exists());
        assert_eq!(fs::read_to_string(unit_dir.join("G_R__No__2.json")).unwrap(), before);
        assert!(!unit_dir.join(INFLIGHT_MARKER).exists());
    }

    #[test]
    fn invalid_record_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let w = JsonDirWriter::new(dir.path());
        let mut bad = record("G.R. No. 3");
        bad.title.clear();
        let err = w.write_unit(UNIT, &[record("G.R. No. 1"), bad]).unwrap_err();
        assert!(matches!(err, WriteError::InvalidRecord { .. }));
        assert_eq!(json_files(&dir.path().join("1901/august")), 0);
    }

    #[test]
    fn discards_leftovers_of_crashed_unit() {
        let dir = tempfile::tempdir().unwrap();
        let w = JsonDirWriter::new(dir.path());
        w.write_record(UNIT, &record("G.R. No. 7")).unwrap();
        let unit_dir = dir.path().join("1901/august");
        fs::write(unit_dir.join(INFLIGHT_MARKER), "G_R__No__7.json\n").unwrap();

        assert_eq!(w.discard_partial(UNIT).unwrap(), 1);
        assert_eq!(json_files(&unit_dir), 0);
        assert_eq!(w.discard_partial(UNIT).unwrap(), 0);

        // Rewriting the unit after the discard succeeds without collision.
        assert_eq!(w.write_unit(UNIT, &[record("G.R. No. 7")]).unwrap(), 1);
    }

    #[test]
    fn uncommitted_unit_can_be_discarded_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let w = JsonDirWriter::new(dir.path());
        let unit_dir = dir.path().join("1901/august");
        w.write_unit(UNIT, &[record("G.R. No. 1"), record("G.R. No. 2")]).unwrap();

        // Process died before the completion checkpoint.
        assert_eq!(w.discard_partial(UNIT).unwrap(), 2);
        assert_eq!(json_files(&unit_dir), 0);

        assert_eq!(w.write_unit(UNIT, &[record("G.R. No. 1"), record("G.R. No. 2")]).unwrap(), 2);
        w.commit_unit(UNIT).unwrap();
        assert_eq!(w.discard_partial(UNIT).unwrap(), 0);
        assert_eq!(json_files(&unit_dir), 2);
    }

    #[test]
    fn empty_remnant_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let w = JsonDirWriter::new(dir.path());
        let unit_dir = dir.path().join("1901/august");
        fs::create_dir_all(&unit_dir).unwrap();
        fs::write(unit_dir.join("G_R__No__5.json"), "").unwrap();
        assert_eq!(w.write_unit(UNIT, &[record("G.R. No. 5")]).unwrap(), 1);
        assert!(fs::metadata(unit_dir.join("G_R__No__5.json")).unwrap().len() > 0);
    }
}
