use std::io::{Read, Write};

use log::info;

mod args;
mod error;
mod ingest;
mod record;
mod store;
mod transform;

pub use args::Args;
pub use error::Error;
pub use ingest::{ingest, Options, Summary};
pub use record::{Record, Records};
pub use store::{Insert, Session, SqliteStore, Store, StoreError};
pub use transform::{Transform, TransformRule, Transforms, Value};

/// Loads `args.input` into the configured table, echoing each row to `out`.
///
/// The input is opened before the database, so a bad path never touches
/// the store.
pub fn run(args: &Args, out: &mut impl Write) -> Result<Summary, Error> {
    let options = args.options()?;
    let records = Records::from_path(&args.input)?;
    let store = SqliteStore::open(&args.database).map_err(|source| Error::Connect {
        path: args.database.clone(),
        source,
    })?;
    let summary = load(records, store, &options, out)?;
    info!(
        "loaded {} rows from {:?} into {:?}",
        summary.committed, args.input, options.table
    );
    Ok(summary)
}

fn load<R: Read, S: Store>(
    records: Records<R>,
    store: S,
    options: &Options,
    out: &mut impl Write,
) -> Result<Summary, Error> {
    let mut session = Session::new(store);
    let summary = ingest(records, &mut session, options, out)?;
    session.close().map_err(|source| Error::Close { source })?;
    Ok(summary)
}
