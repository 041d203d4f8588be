//! Welcome to Banqi Engine by Sam Nelson!
//!
//! This is the entry point into the engine. Control is immediately passed
//! to the text-protocol driver loop after CLI options are parsed and the
//! logger is initialized.

use clap::Parser;

use banqi_engine::protocol::{EngineOptions, Server};

fn main() -> anyhow::Result<()> {
    let options = EngineOptions::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&options.log_level))
        .init();

    log::info!("{} starting, tt_bits={}", options.name, options.tt_bits);
    Server::new(options).run()
}
