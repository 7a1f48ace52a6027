//! Entry point: `shale <database-dir>` opens (or creates) a database
//! directory and starts the REPL.

use std::process::ExitCode;

use shale::cli::Repl;
use shale::Database;

fn main() -> ExitCode {
    let dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./shale-data".to_string());

    let db = match Database::open_default(&dir) {
        Ok(db) => db,
        Err(err) => {
            eprintln!("failed to open database '{dir}': {err}");
            return ExitCode::from(1);
        }
    };

    let mut repl = match Repl::new(db) {
        Ok(repl) => repl,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };

    ExitCode::from(repl.run() as u8)
}
