use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::cache::{parse_index, tmp_path, Cache, FOLDER_LIST_FILE};
use crate::client::{parse_search_listing, MailboxClient};
use crate::error::Result;
use crate::models::{Filter, IdPair};
use crate::purger::{cutoff_date, imap_date};

pub const PAGE_SIZE: u64 = 100;

/// A page listing shorter than this is taken as the end of the id range.
///
/// This is a best-effort heuristic: UID ranges have gaps, so a page with
/// fewer entries than requested does not mean the range is exhausted, and
/// a server that keeps answering with noise would page forever.
pub const MIN_PAGE_BYTES: usize = 12;

#[derive(Debug)]
pub struct RefreshResult {
    pub pages: u64,
    pub ids: Vec<IdPair>,
}

/// Page through the id space from 1 and publish the listing as the new
/// index. The previous index is replaced only after every page arrived.
pub fn refresh_index<C: MailboxClient + ?Sized>(
    client: &mut C,
    cache: &Cache,
    page_size: u64,
) -> Result<RefreshResult> {
    let index = cache.index_path();
    let tmp = tmp_path(&index);
    tracing::info!(path = %index.display(), "loading uids");

    let mut listing = Vec::new();
    let mut start = 1;
    let mut pages = 0;
    {
        let mut f = std::fs::File::create(&tmp)?;
        loop {
            let page = client.fetch_range(start, page_size)?;
            f.write_all(&page)?;
            listing.extend_from_slice(&page);
            pages += 1;
            start += page_size;
            if page.len() < MIN_PAGE_BYTES {
                break;
            }
        }
        f.sync_all()?;
    }

    // Refuse to publish something later stages cannot read.
    let ids = parse_index(&String::from_utf8_lossy(&listing), &tmp.to_string_lossy())?;
    std::fs::rename(&tmp, &index)?;
    tracing::info!(pages, entries = ids.len(), "index saved");
    Ok(RefreshResult { pages, ids })
}

/// SINCE query for a summarize filter.
pub fn select_query(filter: &Filter, today: NaiveDate) -> String {
    let since = cutoff_date(today, filter.days_before);
    format!("(SINCE {}) {}", imap_date(since), filter.expression)
}

/// Narrow the index to the messages matched by any summarize filter, keep
/// index order, and publish the result. With no filters every indexed
/// message is selected.
pub fn select_messages<C: MailboxClient + ?Sized>(
    client: &mut C,
    cache: &Cache,
    ids: &[IdPair],
    filters: &[Filter],
    today: NaiveDate,
) -> Result<Vec<IdPair>> {
    let selected: Vec<IdPair> = if filters.is_empty() {
        ids.to_vec()
    } else {
        let mut matched = std::collections::HashSet::new();
        for filter in filters {
            let query = select_query(filter, today);
            let found = parse_search_listing(&client.search(&query)?)?;
            tracing::info!(%query, found = found.len(), "summarize filter");
            matched.extend(found);
        }
        ids.iter()
            .filter(|p| matched.contains(&p.uid))
            .copied()
            .collect()
    };

    let uids: Vec<u64> = selected.iter().map(|p| p.uid).collect();
    cache.save_selection(&uids)?;
    tracing::info!(selected = selected.len(), of = ids.len(), "selection saved");
    Ok(selected)
}

/// Save the account's folder listing to `list~.txt` and return it.
pub fn save_folder_list<C: MailboxClient + ?Sized>(
    client: &mut C,
    cache: &Cache,
) -> Result<(PathBuf, Vec<u8>)> {
    let listing = client.list_folders()?;
    let path = cache.path(FOLDER_LIST_FILE);
    cache.write_atomic(&path, &listing)?;
    tracing::info!(path = %path.display(), "folder list saved");
    Ok((path, listing))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub path: PathBuf,
    pub was_cached: bool,
}

/// Download one message body unless it is already cached. The file is
/// published through a rename, so an existing file is always complete.
pub fn fetch_body<C: MailboxClient + ?Sized>(
    client: &mut C,
    cache: &Cache,
    seqnum: u64,
    uid: u64,
) -> Result<Fetched> {
    let path = cache.message_path(uid);
    if path.exists() {
        tracing::info!(uid, "fetched already");
        return Ok(Fetched {
            path,
            was_cached: true,
        });
    }
    let body = client.fetch_body(uid)?;
    cache.write_atomic(&path, &body)?;
    tracing::info!(seqnum, uid, bytes = body.len(), "fetched");
    Ok(Fetched {
        path,
        was_cached: false,
    })
}

#[derive(Debug, Default, PartialEq)]
pub struct FetchSummary {
    pub fetched: usize,
    pub cached: usize,
}

pub fn fetch_bodies<C: MailboxClient + ?Sized>(
    client: &mut C,
    cache: &Cache,
    ids: &[IdPair],
) -> Result<FetchSummary> {
    let mut summary = FetchSummary::default();
    for pair in ids {
        let fetched = fetch_body(client, cache, pair.seqnum, pair.uid)?;
        if fetched.was_cached {
            tracing::debug!(path = %fetched.path.display(), "skipped");
            summary.cached += 1;
        } else {
            summary.fetched += 1;
        }
    }
    tracing::info!(fetched = summary.fetched, cached = summary.cached, "bodies fetched");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{Call, FakeClient};
    use crate::error::MailbotError;

    fn test_cache() -> (tempfile::TempDir, Cache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path().join("cards")).unwrap();
        (dir, cache)
    }

    fn page(range: std::ops::RangeInclusive<u64>) -> Vec<u8> {
        range
            .map(|uid| format!("* {uid} FETCH (UID {uid})\r\n"))
            .collect::<String>()
            .into_bytes()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_refresh_stops_after_short_page() {
        let (_dir, cache) = test_cache();
        let mut client = FakeClient {
            pages: vec![
                page(1..=100),
                page(101..=200),
                page(201..=300),
                page(301..=400),
                b"\r\n\r\n\r".to_vec(),
                page(501..=600),
            ],
            ..Default::default()
        };
        let result = refresh_index(&mut client, &cache, PAGE_SIZE).unwrap();

        assert_eq!(result.pages, 5);
        assert_eq!(result.ids.len(), 400);
        assert_eq!(client.calls.last(), Some(&Call::FetchRange(401, 100)));
        assert_eq!(client.count(|c| matches!(c, Call::FetchRange(..))), 5);
        assert_eq!(cache.load_ids().unwrap().len(), 400);
        assert!(!tmp_path(&cache.index_path()).exists());
    }

    #[test]
    fn test_failed_refresh_keeps_published_index() {
        let (_dir, cache) = test_cache();
        std::fs::write(cache.index_path(), "* 1 FETCH (UID 7)\r\n").unwrap();
        let mut client = FakeClient {
            pages: vec![b"garbage that is long enough\r\n".to_vec()],
            ..Default::default()
        };
        assert!(matches!(
            refresh_index(&mut client, &cache, PAGE_SIZE),
            Err(MailbotError::IndexLine { .. })
        ));
        assert_eq!(
            std::fs::read_to_string(cache.index_path()).unwrap(),
            "* 1 FETCH (UID 7)\r\n"
        );
    }

    #[test]
    fn test_fetch_body_is_idempotent() {
        let (_dir, cache) = test_cache();
        let mut client = FakeClient::default();
        client.bodies.insert(42, b"Subject: hi\r\n\r\nbody".to_vec());

        let first = fetch_body(&mut client, &cache, 3, 42).unwrap();
        let before = std::fs::read(&first.path).unwrap();
        let second = fetch_body(&mut client, &cache, 3, 42).unwrap();
        let after = std::fs::read(&second.path).unwrap();

        assert!(!first.was_cached);
        assert!(second.was_cached);
        assert_eq!(before, after);
        assert_eq!(client.count(|c| *c == Call::FetchBody(42)), 1);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_cached_fetch_is_logged_at_info() {
        let (_dir, cache) = test_cache();
        std::fs::write(cache.message_path(5), b"cached").unwrap();
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let mut client = FakeClient::default();
        let fetched = tracing::subscriber::with_default(subscriber, || {
            fetch_body(&mut client, &cache, 1, 5).unwrap()
        });

        assert!(fetched.was_cached);
        assert!(client.calls.is_empty());
        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("INFO"));
        assert!(text.contains("fetched already"));
    }

    #[test]
    fn test_fetch_error_leaves_no_file() {
        let (_dir, cache) = test_cache();
        let mut client = FakeClient::default();
        assert!(fetch_body(&mut client, &cache, 1, 9).is_err());
        assert!(!cache.message_path(9).exists());
    }

    #[test]
    fn test_fetch_bodies_counts() {
        let (_dir, cache) = test_cache();
        std::fs::write(cache.message_path(1), b"cached").unwrap();
        let mut client = FakeClient::default();
        client.bodies.insert(2, b"new".to_vec());
        let ids = [IdPair { seqnum: 1, uid: 1 }, IdPair { seqnum: 2, uid: 2 }];
        let summary = fetch_bodies(&mut client, &cache, &ids).unwrap();
        assert_eq!(summary, FetchSummary { fetched: 1, cached: 1 });
    }

    #[test]
    fn test_selection_keeps_index_order() {
        let (_dir, cache) = test_cache();
        let ids: Vec<IdPair> = (1..=5).map(|i| IdPair { seqnum: i, uid: i * 10 }).collect();
        let mut client = FakeClient::default()
            .with_search("* SEARCH 40 10\r\n")
            .with_search("* SEARCH 10 30\r\n");
        let filters = [
            Filter { days_before: 30, expression: "FROM \"alerts@bank.com\"".to_string() },
            Filter { days_before: 7, expression: "SUBJECT charge".to_string() },
        ];
        let selected = select_messages(&mut client, &cache, &ids, &filters, today()).unwrap();
        let uids: Vec<u64> = selected.iter().map(|p| p.uid).collect();
        assert_eq!(uids, vec![10, 30, 40]);
        assert_eq!(cache.load_selection().unwrap(), Some(vec![10, 30, 40]));
        assert_eq!(
            client.calls[0],
            Call::Search("(SINCE 16-Sep-2026) FROM \"alerts@bank.com\"".to_string())
        );
    }

    #[test]
    fn test_folder_list_is_saved() {
        let (_dir, cache) = test_cache();
        let listing = b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n\
                        * LIST (\\HasNoChildren) \"/\" \"Alerts\"\r\n";
        let mut client = FakeClient {
            folders: listing.to_vec(),
            ..Default::default()
        };
        let (path, saved) = save_folder_list(&mut client, &cache).unwrap();
        assert_eq!(client.calls, vec![Call::ListFolders]);
        assert_eq!(saved, listing.to_vec());
        assert_eq!(path, cache.path("list~.txt"));
        assert_eq!(std::fs::read(&path).unwrap(), listing.to_vec());
    }

    #[test]
    fn test_selection_without_filters_is_everything() {
        let (_dir, cache) = test_cache();
        let ids = [IdPair { seqnum: 1, uid: 5 }, IdPair { seqnum: 2, uid: 6 }];
        let mut client = FakeClient::default();
        let selected = select_messages(&mut client, &cache, &ids, &[], today()).unwrap();
        assert_eq!(selected.len(), 2);
        assert!(client.calls.is_empty());
    }
}
