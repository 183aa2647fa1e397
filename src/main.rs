use std::{io, process::ExitCode};

use csv_ingest::{Args, Error};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let result = Args::resolve(std::env::args_os())
        .and_then(|args| csv_ingest::run(&args, &mut io::stdout().lock()));
    match result {
        Ok(_) => ExitCode::SUCCESS,
        // clap renders usage, help and version itself
        Err(Error::Usage(err)) => err.exit(),
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}
