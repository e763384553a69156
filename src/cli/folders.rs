use crate::client::MailboxClient;
use crate::error::Result;
use crate::fetcher::save_folder_list;
use crate::settings::Settings;

use super::{open, Session};

pub fn run(settings: &Settings, name: &str, verbose: bool) -> Result<()> {
    let session = open(settings, name, verbose)?;
    let mut client = session.connect()?;
    execute(&mut client, &session)
}

pub(crate) fn execute(client: &mut dyn MailboxClient, session: &Session) -> Result<()> {
    let (path, listing) = save_folder_list(client, &session.cache)?;
    print!("{}", String::from_utf8_lossy(&listing));
    println!("Saved to {}", path.display());
    Ok(())
}
