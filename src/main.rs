#![forbid(unsafe_code)]

//! logview: terminal syslog viewer entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(&args) {
        eprintln!("logview: {e}");
        std::process::exit(e.exit_code());
    }
}
