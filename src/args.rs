use std::{ffi::OsString, num::NonZeroUsize, path::PathBuf};

use clap::Parser;

use crate::{
    ingest::Options,
    transform::{TransformRule, Transforms},
    Error,
};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// CSV file to load; its first line names the columns.
    pub input: PathBuf,

    /// SQLite database holding the target table. It must already exist.
    #[arg(long, env = "CSV_INGEST_DATABASE", default_value = "people.db")]
    pub database: PathBuf,

    /// Table the rows are inserted into.
    #[arg(long, env = "CSV_INGEST_TABLE", default_value = "people")]
    pub table: String,

    /// Convert a column before inserting it (KIND: yes-no, integer, text).
    #[arg(long = "transform", value_name = "COLUMN=KIND")]
    pub transform: Vec<TransformRule>,

    /// CSV file of `column,kind` transform rules.
    #[arg(long, env = "CSV_INGEST_TRANSFORMS", value_name = "FILE")]
    pub transforms: Option<PathBuf>,

    /// Do not apply the built-in `is_alive=yes-no` rule.
    #[arg(long)]
    pub no_default_transforms: bool,

    /// Commit after this many inserts.
    #[arg(long, env = "CSV_INGEST_COMMIT_EVERY", value_name = "N", default_value = "1")]
    pub commit_every: NonZeroUsize,
}

impl Args {
    /// Parses the full argument list, program name first.
    pub fn resolve<I, T>(argv: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::try_parse_from(argv)?)
    }

    /// Transform rules apply in order: built-in, rules file, then flags.
    pub fn options(&self) -> Result<Options, Error> {
        let mut transforms = if self.no_default_transforms {
            Transforms::empty()
        } else {
            Transforms::default()
        };
        if let Some(path) = &self.transforms {
            transforms.load(path)?;
        }
        for rule in &self.transform {
            transforms.insert(rule.clone());
        }
        Ok(Options {
            table: self.table.clone(),
            transforms,
            commit_every: self.commit_every,
        })
    }
}
