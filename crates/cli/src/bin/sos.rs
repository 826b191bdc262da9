use std::process::ExitCode;

use anyhow::Result;

fn main() -> Result<ExitCode> {
    sos_cli::main_entry()
}
