//! archstage - Staged changesets for layered architecture models

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = archstage::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
