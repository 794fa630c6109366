//! rmux — run a command across many targets concurrently, with bounded
//! concurrency, health checks, output demultiplexing, and an interactive
//! control console.

mod analyzer;
mod cli;
mod config;
mod console;
mod engine;
mod error;
mod events;
mod exec;
mod fdlimit;
mod linebuf;
mod logging;
mod method;
mod mode;
mod outputmode;
mod ping;
mod render;
mod signal;
mod slot;
mod target;
mod verdict;

use clap::Parser;
use tracing::error;

use crate::cli::Cli;
use crate::config::EngineConfig;
use crate::engine::Engine;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match EngineConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("rmux: {e}");
            std::process::exit(2);
        }
    };

    let log_handle = logging::init(&config.logging_level);

    if config.targets.is_empty() {
        error!("no targets given");
        std::process::exit(2);
    }

    let engine = Engine::new(config, log_handle);
    let (_summary, code) = engine.run().await;
    std::process::exit(code);
}
