mod activation;
mod bg3;
mod cli;
mod config;
mod engine;
mod logging;
mod slots;
mod snapshot;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
