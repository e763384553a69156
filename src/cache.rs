use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{MailbotError, Result};
use crate::models::IdPair;

pub const INDEX_FILE: &str = "uids.txt";
pub const SELECTION_FILE: &str = "selected.txt";
pub const TRANSACTIONS_FILE: &str = "transactions.txt";
pub const SUMMARY_FILE: &str = "summary.txt";
pub const UNCLASSIFIED_FILE: &str = "unclassified.txt";
pub const CATEGORIES_FILE: &str = "categories.txt";
pub const FOLDER_LIST_FILE: &str = "list~.txt";

/// Per-mailbox cache directory. Assumes a single writer.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn index_path(&self) -> PathBuf {
        self.path(INDEX_FILE)
    }

    pub fn message_path(&self, uid: u64) -> PathBuf {
        self.path(&format!("fetch-{uid}~.txt"))
    }

    pub fn edited_path(&self, uid: u64) -> PathBuf {
        self.path(&format!("fetch-{uid}~.txt.edited"))
    }

    /// Raw bytes of a cached message, preferring the `.edited` variant.
    /// `Ok(None)` when neither file exists.
    pub fn read_message(&self, uid: u64) -> Result<Option<Vec<u8>>> {
        for path in [self.edited_path(uid), self.message_path(uid)] {
            match std::fs::read(&path) {
                Ok(bytes) => return Ok(Some(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Write `bytes` next to `path` and rename over it, so readers never see
    /// a partial file.
    pub fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = tmp_path(path);
        {
            let mut f = std::fs::File::create(&tmp)?;
            f.write_all(bytes)?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load_ids(&self) -> Result<Vec<IdPair>> {
        let path = self.index_path();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            MailbotError::Cache(format!(
                "cannot open {}: {e} (run `mailbot fetch` first)",
                path.display()
            ))
        })?;
        parse_index(&content, &path.to_string_lossy())
    }

    /// Persistent ids chosen by the summarize filters, if a selection was
    /// ever published.
    pub fn load_selection(&self) -> Result<Option<Vec<u64>>> {
        let path = self.path(SELECTION_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut uids = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let uid = line.parse().map_err(|_| MailbotError::IndexLine {
                file: path.to_string_lossy().to_string(),
                line: i + 1,
                content: line.to_string(),
            })?;
            uids.push(uid);
        }
        Ok(Some(uids))
    }

    pub fn save_selection(&self, uids: &[u64]) -> Result<()> {
        let body: String = uids.iter().map(|u| format!("{u}\n")).collect();
        self.write_atomic(&self.path(SELECTION_FILE), body.as_bytes())
    }

    /// The ids the extraction stage works on: the selection when present,
    /// otherwise every indexed message.
    pub fn working_set(&self) -> Result<Vec<u64>> {
        match self.load_selection()? {
            Some(uids) => Ok(uids),
            None => Ok(self.load_ids()?.into_iter().map(|p| p.uid).collect()),
        }
    }
}

pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Parse index content. Every non-blank line must read
/// `* <seq> FETCH (UID <uid>)` with non-zero numbers.
pub fn parse_index(content: &str, file: &str) -> Result<Vec<IdPair>> {
    let mut pairs = Vec::new();
    for (i, raw) in content.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let pair = parse_index_line(line).ok_or_else(|| MailbotError::IndexLine {
            file: file.to_string(),
            line: i + 1,
            content: line.to_string(),
        })?;
        pairs.push(pair);
    }
    Ok(pairs)
}

fn parse_index_line(line: &str) -> Option<IdPair> {
    let rest = line.strip_prefix("* ")?;
    let (seq, rest) = rest.split_once(' ')?;
    let rest = rest.strip_prefix("FETCH (UID ")?;
    let uid = rest.strip_suffix(')')?;
    let seqnum: u64 = seq.parse().ok()?;
    let uid: u64 = uid.trim().parse().ok()?;
    if seqnum == 0 || uid == 0 {
        return None;
    }
    Some(IdPair { seqnum, uid })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cache() -> (tempfile::TempDir, Cache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path().join("cards")).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_parse_index() {
        let content = "* 1 FETCH (UID 101)\r\n* 2 FETCH (UID 105)\r\n\r\n";
        let ids = parse_index(content, "uids.txt").unwrap();
        assert_eq!(
            ids,
            vec![
                IdPair { seqnum: 1, uid: 101 },
                IdPair { seqnum: 2, uid: 105 }
            ]
        );
    }

    #[test]
    fn test_malformed_index_line_is_fatal() {
        let content = "* 1 FETCH (UID 101)\r\n* 2 FETCH (FLAGS ())\r\n";
        match parse_index(content, "uids.txt") {
            Err(MailbotError::IndexLine { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_zero_ids_are_rejected() {
        assert!(parse_index("* 0 FETCH (UID 4)\n", "uids.txt").is_err());
        assert!(parse_index("* 4 FETCH (UID 0)\n", "uids.txt").is_err());
    }

    #[test]
    fn test_read_message_prefers_edited() {
        let (_dir, cache) = test_cache();
        assert!(cache.read_message(7).unwrap().is_none());
        std::fs::write(cache.message_path(7), b"raw").unwrap();
        assert_eq!(cache.read_message(7).unwrap().unwrap(), b"raw");
        std::fs::write(cache.edited_path(7), b"edited").unwrap();
        assert_eq!(cache.read_message(7).unwrap().unwrap(), b"edited");
    }

    #[test]
    fn test_write_atomic_leaves_no_tmp() {
        let (_dir, cache) = test_cache();
        let path = cache.path("summary.txt");
        cache.write_atomic(&path, b"one").unwrap();
        cache.write_atomic(&path, b"two").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_working_set_prefers_selection() {
        let (_dir, cache) = test_cache();
        std::fs::write(
            cache.index_path(),
            "* 1 FETCH (UID 10)\r\n* 2 FETCH (UID 11)\r\n",
        )
        .unwrap();
        assert_eq!(cache.working_set().unwrap(), vec![10, 11]);
        cache.save_selection(&[11]).unwrap();
        assert_eq!(cache.working_set().unwrap(), vec![11]);
    }
}
