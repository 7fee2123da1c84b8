mod args;
mod config;
mod error;
mod logging;

use clap::Parser;

use crate::args::Args;
use crate::error::ExitError;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    match args.run().await {
        Ok(()) => {}
        Err(error @ ExitError::Config(_)) => {
            eprintln!("{error}");
            std::process::exit(2);
        }
        Err(error @ ExitError::Runtime(_)) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    }
}
