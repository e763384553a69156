use crate::client::MailboxClient;
use crate::error::Result;
use crate::fetcher::{fetch_bodies, refresh_index, select_messages};
use crate::settings::Settings;

use super::{open, today, Session};

pub fn run(settings: &Settings, name: &str, page_size: u64, verbose: bool) -> Result<()> {
    let session = open(settings, name, verbose)?;
    let mut client = session.connect()?;
    execute(&mut client, &session, page_size)
}

pub(crate) fn execute(
    client: &mut dyn MailboxClient,
    session: &Session,
    page_size: u64,
) -> Result<()> {
    let refreshed = refresh_index(client, &session.cache, page_size.max(1))?;
    println!(
        "{} ids indexed ({} pages)",
        refreshed.ids.len(),
        refreshed.pages
    );

    let selected = select_messages(
        client,
        &session.cache,
        &refreshed.ids,
        &session.mailbox.summarize,
        today(),
    )?;
    let summary = fetch_bodies(client, &session.cache, &selected)?;
    println!(
        "{} fetched, {} already cached",
        summary.fetched, summary.cached
    );
    Ok(())
}
