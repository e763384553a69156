use crate::error::Result;
use crate::extractor::trim_cached;
use crate::settings::Settings;

use super::open;

pub fn run(settings: &Settings, name: &str) -> Result<()> {
    let session = open(settings, name, false)?;
    let uids = session.cache.working_set()?;
    let summary = trim_cached(&session.cache, &uids)?;
    println!(
        "{} trimmed, {} already edited, {} without alert text, {} not cached",
        summary.written, summary.existing, summary.no_block, summary.missing
    );
    Ok(())
}
