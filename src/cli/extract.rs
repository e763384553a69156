use crate::error::Result;
use crate::extractor::{write_transactions, Extractor};
use crate::models::TxnRecord;
use crate::settings::Settings;

use super::{open, Session};

pub fn run(settings: &Settings, name: &str) -> Result<()> {
    let session = open(settings, name, false)?;
    execute(&session)
}

pub(crate) fn execute(session: &Session) -> Result<()> {
    let uids = session.cache.working_set()?;
    let extractor = Extractor::new()?;
    let records = extractor.extract_all(&session.cache, &uids);
    let path = write_transactions(&session.cache, &records)?;

    let charges = records
        .iter()
        .filter(|r| matches!(r, TxnRecord::Charge(_)))
        .count();
    println!(
        "{} messages: {} charges, {} placeholders -> {}",
        records.len(),
        charges,
        records.len() - charges,
        path.display()
    );
    Ok(())
}
