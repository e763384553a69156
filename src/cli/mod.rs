pub mod config;
pub mod extract;
pub mod fetch;
pub mod folders;
pub mod purge;
pub mod report;
pub mod review;
pub mod run;
pub mod trim;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::cache::Cache;
use crate::curl::{resolve_password, CurlClient};
use crate::error::Result;
use crate::settings::{MailboxConfig, Settings};

#[derive(Parser)]
#[command(name = "mailbot", about = "Purge old mail and summarize card alerts.")]
pub struct Cli {
    /// Settings file (default: ~/.config/mailbot/settings.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Verbose logging and transport tracing
    #[arg(short, long, global = true)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Delete messages matching the mailbox purge filters.
    Purge {
        /// Mailbox name from settings
        mailbox: String,
    },
    /// Refresh the id index and download bodies not yet cached.
    Fetch {
        mailbox: String,
        /// Ids requested per index page
        #[arg(long = "page-size", default_value = "100")]
        page_size: u64,
    },
    /// List the account's folders and save the listing to list~.txt.
    Folders { mailbox: String },
    /// Cut cached messages down to the alert text (.edited files).
    Trim { mailbox: String },
    /// Extract charges from cached messages into transactions.txt.
    Extract { mailbox: String },
    /// Aggregate transactions.txt into summary.txt and unclassified.txt.
    Report { mailbox: String },
    /// Open unclassified.txt in an editor to assign categories.
    Review { mailbox: String },
    /// Purge, fetch, extract and report in one go.
    Run {
        mailbox: String,
        /// Work on cached files only; no network access
        #[arg(long)]
        offline: bool,
        /// Skip the purge stage
        #[arg(long = "no-purge")]
        no_purge: bool,
    },
    /// Print the loaded configuration.
    Config {
        /// Only this mailbox
        mailbox: Option<String>,
    },
}

/// A mailbox resolved from settings together with its cache directory.
pub struct Session<'a> {
    pub name: &'a str,
    pub mailbox: &'a MailboxConfig,
    pub cache: Cache,
    pub verbose: bool,
}

pub fn open<'a>(settings: &'a Settings, name: &'a str, verbose: bool) -> Result<Session<'a>> {
    let mailbox = settings.mailbox(name)?;
    let cache = Cache::open(settings.cache_dir(name))?;
    Ok(Session {
        name,
        mailbox,
        cache,
        verbose,
    })
}

impl Session<'_> {
    pub fn connect(&self) -> Result<CurlClient> {
        let password = resolve_password(self.cache.dir(), &self.mailbox.password)?;
        tracing::info!(mailbox = self.name, url = %self.mailbox.url, login = %self.mailbox.login, "connecting");
        Ok(CurlClient::new(
            &self.mailbox.url,
            &self.mailbox.login,
            password,
            self.verbose,
        ))
    }
}

pub(crate) fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
