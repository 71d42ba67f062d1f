//! Append-only CSV output of resolved websites.
//!
//! Each row carries the input record's fields plus the website and a
//! confidence percentage. The header is written only when the file does
//! not exist yet, so interrupted runs keep appending to the same file
//! and `--combine` rebuilds it from scratch after a [`reset`].
//!
//! [`reset`]: OutputWriter::reset

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::batch::CompanyRecord;
use crate::finder::FinderResult;

/// Output column names, mirroring the input columns plus the two result fields.
pub const OUTPUT_HEADER: [&str; 7] = [
    "Company Number",
    "Company Name",
    "Date Incorporated",
    "Active Directors",
    "Registered Address",
    "Website",
    "Website Confidence",
];

/// Converts a finder result to the percentage written in the last column.
///
/// Unresolved results are written as `-1` so downstream consumers can tell
/// "searched and found nothing" apart from a genuine low score.
pub fn confidence_percentage(result: &FinderResult) -> i64 {
    if result.is_unresolved() {
        return -1;
    }

    if result.maximum_possible <= 0 {
        return 0;
    }

    let ratio = result.confidence as f64 / result.maximum_possible as f64;

    (ratio * 100.0).round() as i64
}

/// Appends result rows to the output CSV file.
pub struct OutputWriter {
    path: PathBuf,
}

impl OutputWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the output file. The next [`append`] starts a fresh file
    /// with a new header row.
    ///
    /// [`append`]: OutputWriter::append
    pub fn reset(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
            debug!("Removed existing output file: {}", self.path.display());
        }

        Ok(())
    }

    /// Appends one result row, writing the header first if the file is new.
    pub fn append(&self, record: &CompanyRecord, result: &FinderResult) -> Result<()> {
        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if needs_header {
            writer.write_record(OUTPUT_HEADER)?;
        }

        let percentage = confidence_percentage(result);

        writer.write_record([
            record.number.as_str(),
            record.name.as_str(),
            record.date_incorporated.as_str(),
            record.active_directors.as_str(),
            record.registered_address.as_str(),
            result.url.as_str(),
            &percentage.to_string(),
        ])?;

        writer.flush()?;
        debug!("Appended output row for {} to {}", record.name, self.path.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CompanyRecord {
        CompanyRecord {
            number: "01234567".to_string(),
            name: "Acme Widgets Ltd".to_string(),
            date_incorporated: "2001-02-03".to_string(),
            active_directors: "2".to_string(),
            registered_address: "1 High Street, London".to_string(),
        }
    }

    fn resolved(confidence: i64, maximum_possible: i64) -> FinderResult {
        FinderResult {
            url: "https://www.acme-widgets.co.uk".to_string(),
            confidence,
            maximum_possible,
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv");
        let writer = OutputWriter::new(&path);

        writer.append(&record(), &resolved(700, 700)).unwrap();
        writer.append(&record(), &resolved(500, 1300)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Company Number,Company Name"));
        assert!(lines[1].ends_with(",100"));
        assert!(lines[2].ends_with(",38"));
    }

    #[test]
    fn test_percentage_rounds() {
        assert_eq!(confidence_percentage(&resolved(2525, 3325)), 76);
        assert_eq!(confidence_percentage(&resolved(700, 700)), 100);
        assert_eq!(confidence_percentage(&resolved(1, 3)), 33);
    }

    #[test]
    fn test_unresolved_written_as_minus_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv");
        let writer = OutputWriter::new(&path);

        writer.append(&record(), &FinderResult::none()).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.lines().nth(1).unwrap().ends_with(",none,-1"));
    }

    #[test]
    fn test_zero_maximum_does_not_divide() {
        let result = FinderResult {
            url: "https://www.acme-widgets.co.uk".to_string(),
            confidence: 0,
            maximum_possible: 0,
        };
        assert_eq!(confidence_percentage(&result), 0);
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv");
        let writer = OutputWriter::new(&path);

        writer.append(&record(), &resolved(700, 700)).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[4], "1 High Street, London");
        assert_eq!(&row[5], "https://www.acme-widgets.co.uk");
    }

    #[test]
    fn test_reset_starts_a_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv");
        let writer = OutputWriter::new(&path);

        writer.append(&record(), &resolved(700, 700)).unwrap();
        writer.reset().unwrap();
        assert!(!path.exists());

        writer.append(&record(), &resolved(500, 1300)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Company Number"));
    }

    #[test]
    fn test_reset_without_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path().join("output.csv"));
        writer.reset().unwrap();
    }
}
