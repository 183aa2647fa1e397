use std::{
    io::{self, Write},
    num::NonZeroUsize,
};

use log::{debug, info, warn};

use crate::{
    record::Records,
    store::{Insert, Session, Store},
    transform::{InvalidValue, Transforms, Value},
    Error,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub table: String,
    pub transforms: Transforms,
    /// Number of inserts per transaction. One commits every record.
    pub commit_every: NonZeroUsize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            table: "people".into(),
            transforms: Transforms::default(),
            commit_every: NonZeroUsize::MIN,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub inserted: usize,
    pub committed: usize,
}

/// Inserts every record into `options.table` and echoes the transformed
/// values to `out`, one line per record once its transaction is committed.
///
/// Stops at the first failure. Rows committed before it stay committed,
/// the open transaction is rolled back.
pub fn ingest<R, S, W>(
    records: Records<R>,
    session: &mut Session<S>,
    options: &Options,
    out: &mut W,
) -> Result<Summary, Error>
where
    R: io::Read,
    S: Store,
    W: Write,
{
    let insert = Insert::new(&options.table, records.headers());
    debug!("statement: {}", insert.sql());
    let mut summary = Summary::default();
    let result = write_records(records, session, options, &insert, out, &mut summary);
    if let Err(err) = &result {
        if let Err(rollback) = session.rollback() {
            warn!("rollback failed: {rollback}");
        }
        warn!(
            "stopped after {} rows, {} of them committed: {err}",
            summary.inserted, summary.committed
        );
    }
    result.map(|()| summary)
}

fn write_records<R: io::Read, S: Store, W: Write>(
    records: Records<R>,
    session: &mut Session<S>,
    options: &Options,
    insert: &Insert,
    out: &mut W,
    summary: &mut Summary,
) -> Result<(), Error> {
    // echo lines of the open transaction
    let mut uncommitted = Vec::with_capacity(options.commit_every.get());
    for record in records {
        let record = record?;
        let row = summary.inserted + 1;
        let values = options
            .transforms
            .apply(&record)
            .map_err(|InvalidValue { column, value }| Error::Transform { row, column, value })?;
        let committed = summary.committed;
        let write_error = |source| Error::Write {
            row,
            committed,
            source,
        };
        session.insert(insert, &values).map_err(write_error)?;
        summary.inserted = row;
        uncommitted.push(echo(&values));
        if row % options.commit_every == 0 {
            session.commit().map_err(write_error)?;
            summary.committed = row;
            flush(out, &mut uncommitted)?;
        }
    }
    if session.in_transaction() {
        session.commit().map_err(|source| Error::Write {
            row: summary.inserted,
            committed: summary.committed,
            source,
        })?;
        summary.committed = summary.inserted;
        flush(out, &mut uncommitted)?;
    }
    info!("{} rows inserted into {:?}", summary.inserted, options.table);
    Ok(())
}

fn flush<W: Write>(out: &mut W, lines: &mut Vec<String>) -> io::Result<()> {
    for line in lines.drain(..) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn echo(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
