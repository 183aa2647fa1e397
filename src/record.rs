use std::{fs::File, io, path::Path, rc::Rc};

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use log::{debug, trace};

use crate::Error;

/// One data row: header names mapped positionally to the row's values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    headers: Rc<[String]>,
    values: Vec<String>,
}

impl Record {
    pub fn columns(&self) -> &[String] {
        &self.headers
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        let index = self.headers.iter().position(|header| header == column)?;
        Some(&self.values[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }
}

/// Lazy, single-pass sequence of [`Record`]s read from CSV text.
///
/// The header line is consumed when the sequence is created. Quoted fields
/// follow RFC 4180, surrounding whitespace is trimmed. A row shorter than
/// the header is padded with empty values, a longer one is rejected.
pub struct Records<R> {
    rows: StringRecordsIntoIter<R>,
    headers: Rc<[String]>,
    row: usize,
}

fn builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.trim(Trim::All).flexible(true).has_headers(true);
    builder
}

impl Records<File> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let reader = builder().from_path(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("opened input file {path:?}");
        Self::new(reader)
    }
}

impl<R: io::Read> Records<R> {
    pub fn from_reader(reader: R) -> Result<Self, Error> {
        Self::new(builder().from_reader(reader))
    }

    fn new(mut reader: csv::Reader<R>) -> Result<Self, Error> {
        let headers = reader.headers().map_err(Error::Header)?;
        if headers.iter().all(str::is_empty) {
            return Err(Error::EmptyFile);
        }
        let headers: Rc<[String]> = headers.iter().map(String::from).collect();
        debug!("header: {headers:?}");
        Ok(Self {
            rows: reader.into_records(),
            headers,
            row: 0,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn record(&self, fields: StringRecord) -> Result<Record, Error> {
        let expected = self.headers.len();
        if fields.len() > expected {
            return Err(Error::MalformedRow {
                row: self.row,
                expected,
                found: fields.len(),
            });
        }
        trace!(
            "row {} at line {:?}: {fields:?}",
            self.row,
            fields.position().map(|position| position.line())
        );
        let mut values: Vec<String> = fields.iter().map(String::from).collect();
        values.resize(expected, String::new());
        Ok(Record {
            headers: Rc::clone(&self.headers),
            values,
        })
    }
}

impl<R: io::Read> Iterator for Records<R> {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let fields = self.rows.next()?;
        self.row += 1;
        let row = self.row;
        Some(
            fields
                .map_err(|source| Error::Read { row, source })
                .and_then(|fields| self.record(fields)),
        )
    }
}
