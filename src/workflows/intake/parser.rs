use std::collections::BTreeMap;
use std::io::Read;

use super::normalizer::clean_cell;

/// Parsed spreadsheet: trimmed headers plus fixed-shape data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
    pub malformed: Vec<MalformedRow>,
}

/// One data row aligned with [`ParsedTable::headers`]. `number` is 1-based
/// and counts data rows only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub number: usize,
    pub values: Vec<Option<String>>,
}

impl CsvRow {
    pub fn value(&self, column: usize) -> Option<&str> {
        self.values.get(column).and_then(|value| value.as_deref())
    }
}

/// Data row whose field count disagreed with the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedRow {
    pub number: usize,
    pub found: usize,
    pub expected: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("input must contain a header line and at least one data row")]
    NoDataRows,
    #[error("unreadable CSV input: {0}")]
    Csv(#[from] csv::Error),
}

pub fn parse_text(text: &str) -> Result<ParsedTable, ParseError> {
    parse_reader(text.as_bytes())
}

pub(crate) fn parse_reader<R: Read>(reader: R) -> Result<ParsedTable, ParseError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    let mut malformed = Vec::new();
    let mut number = 0;

    for record in csv_reader.records() {
        let record = record?;
        if is_blank(&record) {
            continue;
        }

        let expected = match &headers {
            Some(header) => header.len(),
            None => {
                headers = Some(record.iter().map(clean_cell).collect());
                continue;
            }
        };

        number += 1;
        if record.len() != expected {
            malformed.push(MalformedRow {
                number,
                found: record.len(),
                expected,
            });
            continue;
        }

        rows.push(CsvRow {
            number,
            values: record.iter().map(cell_value).collect(),
        });
    }

    match headers {
        Some(headers) if number > 0 => Ok(ParsedTable {
            headers,
            rows,
            malformed,
        }),
        _ => Err(ParseError::NoDataRows),
    }
}

/// Builds a table from rows a caller already split into header-keyed maps.
pub fn from_records(
    records: &[BTreeMap<String, Option<String>>],
) -> Result<ParsedTable, ParseError> {
    if records.is_empty() {
        return Err(ParseError::NoDataRows);
    }

    let mut headers: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            let key = clean_cell(key);
            if !headers.contains(&key) {
                headers.push(key);
            }
        }
    }

    let rows = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let cleaned: BTreeMap<String, &Option<String>> = record
                .iter()
                .map(|(key, value)| (clean_cell(key), value))
                .collect();
            let values = headers
                .iter()
                .map(|header| {
                    cleaned
                        .get(header)
                        .and_then(|value| value.as_deref())
                        .and_then(cell_value)
                })
                .collect();
            CsvRow {
                number: index + 1,
                values,
            }
        })
        .collect();

    Ok(ParsedTable {
        headers,
        rows,
        malformed: Vec::new(),
    })
}

fn cell_value(raw: &str) -> Option<String> {
    let cleaned = clean_cell(raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// A line with no delimiter and nothing but whitespace. Rows made of
/// delimiters only are data and keep their row number.
fn is_blank(record: &csv::StringRecord) -> bool {
    record.len() <= 1 && record.iter().all(|field| field.trim().is_empty())
}
