use std::env::var;

use clap::Parser;
use miette::Result;
use storycards::Cli;

fn main() -> Result<()> {
    if var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }
    storycards::run(Cli::parse())?;
    Ok(())
}
