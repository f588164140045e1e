use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::record::{CaseFields, CaseRecord};
use crate::unit::{Month, WorkUnit};
use crate::writer::JsonDirWriter;

pub const SAMPLE_DIR: &str = "SAMPLE_CASES";

const FIRST_CONTENT: &str = "FIRST DIVISION

[ G.R. No. 1, August 15, 1901 ]

SMITH vs. JONES

D E C I S I O N

This is a sample case to demonstrate the format.

The case involves a dispute between Smith and Jones regarding property rights.

ACCORDINGLY, the petition is GRANTED.

SO ORDERED.";

const SECOND_CONTENT: &str = "[ G.R. No. 2, September 1, 1901 ]

REPUBLIC OF THE PHILIPPINES vs. DOE

D E C I S I O N

This is another sample case demonstrating the database format.

The Supreme Court rules on an important matter of law.

WHEREFORE, the decision is AFFIRMED.

SO ORDERED.";

fn sample(unit: WorkUnit, number: u32, title: &str, date: &str, volume: &str, division: Option<&str>, content: &str) -> CaseRecord {
    CaseRecord::build(
        unit,
        CaseFields {
            case_number: format!("G.R. No. {}", number),
            volume_page: volume.to_string(),
            decision_date: date.to_string(),
            title: title.to_string(),
            division: division.map(str::to_string),
            categories: vec!["Civil Law".into(), "Property Law".into()],
            keywords: ["property", "rights", "dispute", "petition", "court", "decision"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            content: content.to_string(),
        },
    )
}

pub fn sample_records() -> Vec<(WorkUnit, CaseRecord)> {
    let aug = WorkUnit::new(1901, Month::August);
    let sep = WorkUnit::new(1901, Month::September);
    vec![
        (
            aug,
            sample(aug, 1, "SMITH vs. JONES", "August 15, 1901", "1 Phil. 1", Some("En Banc"), FIRST_CONTENT),
        ),
        (
            sep,
            sample(
                sep,
                2,
                "REPUBLIC OF THE PHILIPPINES vs. DOE",
                "September 1, 1901",
                "1 Phil. 25",
                None,
                SECOND_CONTENT,
            ),
        ),
    ]
}

/// Write the sample records under `output_dir`, replacing earlier copies.
pub fn generate(output_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let writer = JsonDirWriter::new(output_dir);
    let mut created = Vec::new();
    for (unit, record) in sample_records() {
        let old = writer.record_path(unit, &record);
        match fs::remove_file(&old) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("removing old sample {}", old.display())),
        }
        let path = writer
            .write_record(unit, &record)
            .with_context(|| format!("writing sample for {}", unit))?;
        created.push(path);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate;

    #[test]
    fn samples_pass_validation_and_regenerate() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join(SAMPLE_DIR);

        let paths = generate(&out).unwrap();
        assert_eq!(paths[0], out.join("1901/august/G_R__No__1.json"));
        assert_eq!(paths[1], out.join("1901/september/G_R__No__2.json"));

        // Running twice replaces rather than collides.
        generate(&out).unwrap();

        let report = validate::validate_dir(&out, None, None).unwrap();
        assert_eq!(report.total_cases, 2);
        assert!(report.is_clean(), "{:?}", report.errors);

        let second: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths[1]).unwrap()).unwrap();
        assert!(second["division"].is_null());
    }
}
