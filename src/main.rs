use std::process::ExitCode;

use clap::Parser;
use patent_miner_lib::cli::{self, Cli};

fn main() -> anyhow::Result<ExitCode> {
    // A missing .env file is fine; the environment and flags still apply.
    dotenvy::dotenv().ok();
    patent_miner_lib::init_tracing();

    cli::run(Cli::parse())
}
