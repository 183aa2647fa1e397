use std::{io, path::PathBuf, process::ExitCode};

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Usage(#[from] clap::Error),

    #[error("cannot open input file {path:?}: {source}")]
    Open { path: PathBuf, source: csv::Error },

    #[error("input has no header line")]
    EmptyFile,

    #[error("cannot read header line: {0}")]
    Header(#[source] csv::Error),

    #[error("cannot read data row {row}: {source}")]
    Read { row: usize, source: csv::Error },

    #[error("cannot load transform rules from {path:?}: {source}")]
    Transforms { path: PathBuf, source: csv::Error },

    #[error("data row {row} has {found} fields but the header has {expected}")]
    MalformedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("data row {row}: value {value:?} in column {column:?} is not an integer")]
    Transform {
        row: usize,
        column: String,
        value: String,
    },

    #[error("cannot open database {path:?}: {source}")]
    Connect { path: PathBuf, source: StoreError },

    #[error("store rejected data row {row} ({committed} rows committed before the failure): {source}")]
    Write {
        row: usize,
        committed: usize,
        source: StoreError,
    },

    #[error("cannot release database connection: {source}")]
    Close { source: StoreError },

    #[error("cannot write to output: {0}")]
    Output(#[from] io::Error),
}

impl Error {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::Usage(_) => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }
}
