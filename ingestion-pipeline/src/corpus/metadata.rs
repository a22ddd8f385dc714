use std::{fs::File, path::Path};

use common::error::AppError;
use csv::{StringRecord, StringRecordsIntoIter, Trim};

const ID_COLUMN: &str = "id";
const LABEL_COLUMN: &str = "journal";
// Positions used when the header does not name the columns: `index,id,journal`.
const FALLBACK_ID_POSITION: usize = 1;
const FALLBACK_LABEL_POSITION: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRow {
    pub id: String,
    pub label: Option<String>,
}

/// Streams metadata rows from a headered CSV file, aligned by position with the vector file.
pub struct MetadataReader {
    records: StringRecordsIntoIter<File>,
    id_position: usize,
    label_position: Option<usize>,
}

impl MetadataReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_path(path.as_ref())?;

        let headers = reader.headers()?.clone();
        let (id_position, label_position) = column_positions(&headers);

        Ok(Self {
            records: reader.into_records(),
            id_position,
            label_position,
        })
    }

    /// Reads up to `size` rows. Fewer rows means the file is exhausted.
    pub fn next_chunk(&mut self, size: usize) -> Result<Vec<MetadataRow>, AppError> {
        let mut rows = Vec::with_capacity(size);
        while rows.len() < size {
            let Some(record) = self.records.next() else {
                break;
            };
            rows.push(self.to_row(&record?));
        }
        Ok(rows)
    }

    fn to_row(&self, record: &StringRecord) -> MetadataRow {
        MetadataRow {
            id: record.get(self.id_position).unwrap_or_default().to_string(),
            label: self
                .label_position
                .and_then(|position| record.get(position))
                .filter(|label| !label.is_empty())
                .map(str::to_string),
        }
    }
}

impl Iterator for MetadataReader {
    type Item = Result<MetadataRow, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(
            record
                .map(|record| self.to_row(&record))
                .map_err(AppError::from),
        )
    }
}

fn column_positions(headers: &StringRecord) -> (usize, Option<usize>) {
    let find = |name: &str| {
        headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
    };

    match find(ID_COLUMN) {
        Some(id_position) => (id_position, find(LABEL_COLUMN)),
        None if headers.len() > FALLBACK_ID_POSITION => (
            FALLBACK_ID_POSITION,
            (headers.len() > FALLBACK_LABEL_POSITION).then_some(FALLBACK_LABEL_POSITION),
        ),
        None => (0, None),
    }
}
