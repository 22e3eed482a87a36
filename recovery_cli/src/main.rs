use clap::Parser;
use recovery_core::diagnostics::Diagnostics;

mod args;
mod backup_reader;
mod prompts;
mod run;

use args::Cli;

fn main() {
    let diagnostics = Diagnostics::init();
    let cli = Cli::parse();

    match run::run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("The recovery tool failed with the following error: {e}");
            eprintln!("You can try again; a transcript has been written to ./error_log");
            if let Err(write_err) = diagnostics.flush_to_error_log(std::path::Path::new("error_log")) {
                eprintln!("(could not write error_log: {write_err})");
            }
            std::process::exit(run::EXIT_FATAL);
        }
    }
}
