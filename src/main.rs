//! `unitwatch` binary entrypoint.

use clap::Parser;

use unitwatch::cli_app::{Cli, init_tracing, run};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(&cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
