mod aggregator;
mod cache;
mod categorizer;
mod cli;
mod client;
mod curl;
mod error;
mod extractor;
mod fetcher;
mod fmt;
mod logging;
mod models;
mod purger;
mod reviewer;
mod settings;

use clap::Parser;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = settings::load_settings(cli.config.as_deref())?;
    logging::init(&settings.log_path(), cli.debug)?;
    tracing::debug!(command = ?std::env::args().skip(1).collect::<Vec<_>>(), "start");

    match cli.command {
        Commands::Purge { mailbox } => cli::purge::run(&settings, &mailbox, cli.debug),
        Commands::Fetch { mailbox, page_size } => {
            cli::fetch::run(&settings, &mailbox, page_size, cli.debug)
        }
        Commands::Folders { mailbox } => cli::folders::run(&settings, &mailbox, cli.debug),
        Commands::Trim { mailbox } => cli::trim::run(&settings, &mailbox),
        Commands::Extract { mailbox } => cli::extract::run(&settings, &mailbox),
        Commands::Report { mailbox } => cli::report::run(&settings, &mailbox),
        Commands::Review { mailbox } => cli::review::run(&settings, &mailbox),
        Commands::Run {
            mailbox,
            offline,
            no_purge,
        } => cli::run::run(&settings, &mailbox, offline, no_purge, cli.debug),
        Commands::Config { mailbox } => {
            let source = cli.config.unwrap_or_else(settings::settings_path);
            cli::config::run(&settings, &source, mailbox.as_deref())
        }
    }
}
