use crate::error::Result;
use crate::fetcher::PAGE_SIZE;
use crate::settings::Settings;

use super::{extract, fetch, open, purge, report};

pub fn run(settings: &Settings, name: &str, offline: bool, no_purge: bool, verbose: bool) -> Result<()> {
    let session = open(settings, name, verbose)?;
    tracing::info!(mailbox = name, offline, no_purge, "pipeline start");

    if !offline {
        let mut client = session.connect()?;
        if !no_purge {
            purge::execute(&mut client, &session)?;
        }
        fetch::execute(&mut client, &session, PAGE_SIZE)?;
    }
    extract::execute(&session)?;
    report::execute(&session)?;

    tracing::info!(mailbox = name, "pipeline done");
    Ok(())
}
