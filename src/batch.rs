//! Batch input handling: company records parsed from a header-mapped CSV file.
//!
//! Supports:
//! - Header-named columns (`Company Number`, `Company Name`, ...), matched
//!   case-insensitively
//! - Missing optional columns (fields default to empty strings)
//! - Static sharding of the record list across independent workers

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// One company row from the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRecord {
    /// Registry identifier; the idempotency key for the history store.
    pub number: String,
    /// Registered company name as filed.
    pub name: String,
    pub date_incorporated: String,
    pub active_directors: String,
    /// Registered office address; feeds the search query hint.
    pub registered_address: String,
}

const COLUMN_NUMBER: &str = "Company Number";
const COLUMN_NAME: &str = "Company Name";
const COLUMN_DATE: &str = "Date Incorporated";
const COLUMN_DIRECTORS: &str = "Active Directors";
const COLUMN_ADDRESS: &str = "Registered Address";

/// Load company records from a CSV file.
pub fn load_companies(path: &Path) -> Result<Vec<CompanyRecord>> {
    let content = fs::read_to_string(path)
        .context(format!("Failed to read input file: {}", path.display()))?;
    parse_companies(&content)
}

/// Parse company records from CSV content with a header row.
///
/// `Company Number` and `Company Name` columns are required; the remaining
/// columns are optional and default to empty strings. Rows with every field
/// empty are dropped.
pub fn parse_companies(content: &str) -> Result<Vec<CompanyRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();

    let number_idx = column_index(&headers, COLUMN_NUMBER)
        .context(format!("Input CSV must have a '{}' column", COLUMN_NUMBER))?;
    let name_idx = column_index(&headers, COLUMN_NAME)
        .context(format!("Input CSV must have a '{}' column", COLUMN_NAME))?;
    let date_idx = column_index(&headers, COLUMN_DATE);
    let directors_idx = column_index(&headers, COLUMN_DIRECTORS);
    let address_idx = column_index(&headers, COLUMN_ADDRESS);

    let mut companies = Vec::new();
    for result in reader.records() {
        let record = result.context("Failed to parse CSV record")?;

        let company = CompanyRecord {
            number: field(&record, Some(number_idx)),
            name: field(&record, Some(name_idx)),
            date_incorporated: field(&record, date_idx),
            active_directors: field(&record, directors_idx),
            registered_address: field(&record, address_idx),
        };

        if company.number.is_empty()
            && company.name.is_empty()
            && company.registered_address.is_empty()
        {
            continue;
        }

        companies.push(company);
    }

    Ok(companies)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn field(record: &csv::StringRecord, idx: Option<usize>) -> String {
    idx.and_then(|i| record.get(i))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Select the contiguous partition of `items` owned by worker `thread_number`
/// out of `thread_count` workers (both 1-based counts).
///
/// Partitions are `len / thread_count` items each; the last worker absorbs
/// the remainder, so together the partitions cover the whole list exactly
/// once. When the list is shorter than the worker count every partition
/// degenerates to the full list and the history store deduplicates work.
pub fn shard(items: &[CompanyRecord], thread_number: usize, thread_count: usize) -> &[CompanyRecord] {
    let size = items.len() / thread_count;
    let start = size * (thread_number - 1);
    let mut end = start + size;
    if thread_number == thread_count || end == 0 {
        end = items.len();
    }
    &items[start..end]
}
