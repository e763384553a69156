use crate::cache::UNCLASSIFIED_FILE;
use crate::error::Result;
use crate::reviewer::{editor_command, launch_editor};
use crate::settings::Settings;

use super::open;

pub fn run(settings: &Settings, name: &str) -> Result<()> {
    let session = open(settings, name, false)?;
    let path = session.cache.path(UNCLASSIFIED_FILE);
    if !path.exists() {
        println!("Nothing to review. Run `mailbot report {name}` first.");
        return Ok(());
    }
    let editor = editor_command(settings.editor.as_deref());
    launch_editor(&editor, &path)?;
    println!("Saved. Categories are picked up on the next report.");
    Ok(())
}
