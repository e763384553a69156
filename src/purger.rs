use chrono::{Duration, NaiveDate};

use crate::client::{parse_search_listing, MailboxClient};
use crate::error::Result;
use crate::models::Filter;

/// Deletions between two expunges.
pub const EXPUNGE_BATCH: usize = 200;

pub fn cutoff_date(today: NaiveDate, days_before: u32) -> NaiveDate {
    today - Duration::days(i64::from(days_before))
}

/// Date token used by IMAP `BEFORE`/`SINCE`, e.g. `14-Oct-2026`.
pub fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

pub fn purge_query(filter: &Filter, today: NaiveDate) -> String {
    let cutoff = cutoff_date(today, filter.days_before);
    format!("(BEFORE {}) {}", imap_date(cutoff), filter.expression)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub query: String,
    pub deleted: usize,
    pub expunges: usize,
}

#[derive(Debug, Default)]
pub struct PurgeSummary {
    pub outcomes: Vec<FilterOutcome>,
}

impl PurgeSummary {
    pub fn total_deleted(&self) -> usize {
        self.outcomes.iter().map(|o| o.deleted).sum()
    }
}

/// Run every filter in order. The first client error aborts the run;
/// filters already processed keep their effect.
pub fn purge<C: MailboxClient + ?Sized>(
    client: &mut C,
    filters: &[Filter],
    today: NaiveDate,
) -> Result<PurgeSummary> {
    let mut summary = PurgeSummary::default();
    for filter in filters {
        let query = purge_query(filter, today);
        tracing::info!(%query, "purge for filter");
        let listing = client.search(&query)?;
        let uids = parse_search_listing(&listing)?;
        let expunges = delete_found(client, &uids)?;
        tracing::info!(%query, deleted = uids.len(), expunges, "filter done");
        summary.outcomes.push(FilterOutcome {
            query,
            deleted: uids.len(),
            expunges,
        });
    }
    tracing::info!(total = summary.total_deleted(), "purge finished");
    Ok(summary)
}

/// Flag each id deleted, expunging after every full batch and after the
/// last id. Returns the number of expunges issued.
fn delete_found<C: MailboxClient + ?Sized>(client: &mut C, uids: &[u64]) -> Result<usize> {
    let mut expunges = 0;
    for batch in uids.chunks(EXPUNGE_BATCH) {
        for uid in batch {
            client.store_deleted(*uid)?;
            tracing::debug!(uid, "deleted");
        }
        client.expunge()?;
        expunges += 1;
        tracing::info!(count = batch.len(), last = batch[batch.len() - 1], "expunged batch");
    }
    Ok(expunges)
}
