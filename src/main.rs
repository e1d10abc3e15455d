//! IPIT - week-indexed resource planning reports

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = ipit::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
