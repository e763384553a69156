use crate::error::{MailbotError, Result};

/// The remote operations the engines need. Calls are issued one at a time
/// over a single session; any error is fatal for the run.
pub trait MailboxClient {
    /// Run `UID SEARCH <query>` and return the raw listing.
    fn search(&mut self, query: &str) -> Result<Vec<u8>>;

    /// Raw `UID FETCH start:start+count-1 (UID)` listing.
    fn fetch_range(&mut self, start: u64, count: u64) -> Result<Vec<u8>>;

    /// Full raw message for a persistent id.
    fn fetch_body(&mut self, uid: u64) -> Result<Vec<u8>>;

    /// Flag a message `\Deleted`. Nothing is removed until `expunge`.
    fn store_deleted(&mut self, uid: u64) -> Result<()>;

    fn expunge(&mut self) -> Result<()>;

    /// Raw `LIST` response for every folder of the account.
    fn list_folders(&mut self) -> Result<Vec<u8>>;
}

/// Parse a `* SEARCH ...` listing into ids.
///
/// A bare `* SEARCH` is a valid empty result; anything that is not a search
/// listing is an error.
pub fn parse_search_listing(raw: &[u8]) -> Result<Vec<u64>> {
    let text = String::from_utf8_lossy(raw);
    let mut uids = Vec::new();
    let mut seen_header = false;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let rest = if line == "* SEARCH" {
            ""
        } else if let Some(rest) = line.strip_prefix("* SEARCH ") {
            rest
        } else {
            return Err(MailbotError::SearchListing(line.to_string()));
        };
        seen_header = true;
        for token in rest.split_whitespace() {
            let uid = token
                .parse()
                .map_err(|_| MailbotError::SearchListing(format!("bad id {token:?}")))?;
            uids.push(uid);
        }
    }

    if !seen_header {
        return Err(MailbotError::SearchListing("empty response".to_string()));
    }
    Ok(uids)
}
