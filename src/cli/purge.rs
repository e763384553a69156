use crate::client::MailboxClient;
use crate::error::Result;
use crate::purger::purge;
use crate::settings::Settings;

use super::{open, today, Session};

pub fn run(settings: &Settings, name: &str, verbose: bool) -> Result<()> {
    let session = open(settings, name, verbose)?;
    let mut client = session.connect()?;
    execute(&mut client, &session)
}

pub(crate) fn execute(client: &mut dyn MailboxClient, session: &Session) -> Result<()> {
    if session.mailbox.purge.is_empty() {
        println!("No purge filters for {}", session.name);
        return Ok(());
    }
    let summary = purge(client, &session.mailbox.purge, today())?;
    for outcome in &summary.outcomes {
        println!(
            "{:>6} deleted  {:>3} expunges  {}",
            outcome.deleted, outcome.expunges, outcome.query
        );
    }
    println!("{} purged in total", summary.total_deleted());
    Ok(())
}
