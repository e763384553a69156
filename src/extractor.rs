use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use regex::Regex;

use crate::cache::{Cache, TRANSACTIONS_FILE};
use crate::error::{MailbotError, Result};
use crate::fmt::next_field;
use crate::models::{Charge, Sentinel, TxnRecord};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Gas station alerts carry no amount; this stands in for it.
pub const GAS_STATION_AMOUNT: &str = "1.00";

const ALERT_TIME: &str = r"\d{1,2}/\d{1,2}/\d{4} \d{1,2}:\d{2}:\d{2} [AP]M [A-Z]{3}";

// ---------------------------------------------------------------------------
// Alert timestamps
// ---------------------------------------------------------------------------

fn zone_offset_hours(zone: &str) -> Option<i64> {
    match zone.to_ascii_uppercase().as_str() {
        "UTC" | "GMT" => Some(0),
        "EST" => Some(5),
        "EDT" => Some(4),
        "CST" => Some(6),
        "CDT" => Some(5),
        "MST" => Some(7),
        "MDT" => Some(6),
        "PST" => Some(8),
        "PDT" => Some(7),
        _ => None,
    }
}

/// `MM/DD/YYYY HH:MM:SS AM|PM ZZZ` to a UTC instant.
pub fn parse_alert_time(raw: &str) -> Option<NaiveDateTime> {
    let (local, zone) = raw.trim().rsplit_once(' ')?;
    let offset = zone_offset_hours(zone)?;
    let local = NaiveDateTime::parse_from_str(local, "%m/%d/%Y %I:%M:%S %p").ok()?;
    Some(local + Duration::hours(offset))
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Join quoted-printable soft breaks, drop quote markers, collapse
/// whitespace.
fn normalize(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.replace("=\r\n", "").replace("=\n", "");
    text.split_whitespace()
        .map(|w| w.trim_start_matches('>'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct Extractor {
    charge: Regex,
    gas_station: Regex,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        let charge = Regex::new(&format!(
            r"(?i)A charge of (?:\(\$USD\) )?\$?(?P<amount>\d[\d,]*\.\d{{2}}) at (?P<vendor>.+?) has been authorized on (?P<ts>{ALERT_TIME})"
        ))?;
        let gas_station = Regex::new(&format!(
            r"(?i)a gas station charge (?:is pending )?at (?P<vendor>.+?)(?: has been authorized)? on (?P<ts>{ALERT_TIME})"
        ))?;
        Ok(Self {
            charge,
            gas_station,
        })
    }

    /// Match a non-empty message: the generic charge alert first, then the
    /// gas station variant.
    pub fn parse_message(&self, uid: u64, raw: &[u8]) -> TxnRecord {
        let text = normalize(raw);
        let no_match = TxnRecord::Sentinel {
            uid,
            kind: Sentinel::NoMatch,
        };

        let (amount, vendor, ts) = if let Some(caps) = self.charge.captures(&text) {
            (
                caps["amount"].replace(',', ""),
                caps["vendor"].trim().to_string(),
                caps["ts"].to_string(),
            )
        } else if let Some(caps) = self.gas_station.captures(&text) {
            (
                GAS_STATION_AMOUNT.to_string(),
                caps["vendor"].trim().to_string(),
                caps["ts"].to_string(),
            )
        } else {
            return no_match;
        };

        match parse_alert_time(&ts) {
            Some(timestamp) => TxnRecord::Charge(Charge {
                uid,
                timestamp,
                amount,
                vendor,
            }),
            None => {
                tracing::warn!(uid, %ts, "unsupported alert time");
                no_match
            }
        }
    }

    pub fn extract(&self, cache: &Cache, uid: u64) -> TxnRecord {
        let sentinel = |kind| TxnRecord::Sentinel { uid, kind };
        match cache.read_message(uid) {
            Ok(None) => {
                tracing::warn!(uid, "message is not found");
                sentinel(Sentinel::NotFound)
            }
            Ok(Some(bytes)) if bytes.is_empty() => {
                tracing::warn!(uid, "message is empty");
                sentinel(Sentinel::Empty)
            }
            Ok(Some(bytes)) => {
                let record = self.parse_message(uid, &bytes);
                if matches!(record, TxnRecord::Sentinel { .. }) {
                    tracing::warn!(uid, "no transaction found");
                }
                record
            }
            Err(e) => {
                tracing::warn!(uid, error = %e, "cannot read message");
                sentinel(Sentinel::Unreadable)
            }
        }
    }

    /// One record per id, in input order.
    pub fn extract_all(&self, cache: &Cache, uids: &[u64]) -> Vec<TxnRecord> {
        uids.iter().map(|uid| self.extract(cache, *uid)).collect()
    }
}

// ---------------------------------------------------------------------------
// transactions.txt
// ---------------------------------------------------------------------------

pub fn render_line(record: &TxnRecord) -> String {
    match record {
        TxnRecord::Charge(c) => format!(
            "{:<19} {:>10} {:>10} {}",
            c.timestamp.format(TIMESTAMP_FORMAT),
            c.uid,
            c.amount,
            c.vendor
        ),
        TxnRecord::Sentinel { uid, kind } => {
            format!("{:<19} {:>10} {:>10} {}", "-", uid, "-", kind.label())
        }
    }
}

/// Parse one rendered line back into a record.
pub fn parse_line(line: &str, lineno: usize) -> Result<TxnRecord> {
    let err = |reason: String| MailbotError::TransactionLine {
        line: lineno,
        reason,
    };
    let field = |rest: &str, name: &str| -> Result<(String, String)> {
        next_field(rest)
            .map(|(f, r)| (f.to_string(), r.to_string()))
            .ok_or_else(|| err(format!("missing {name}")))
    };

    let (first, rest) = field(line, "timestamp")?;
    if first == "-" {
        let (uid, rest) = field(&rest, "id")?;
        let (amount, rest) = field(&rest, "amount")?;
        let uid = uid.parse().map_err(|_| err(format!("bad id {uid:?}")))?;
        if amount != "-" {
            return Err(err(format!("sentinel with amount {amount:?}")));
        }
        let label = rest.trim();
        let kind = Sentinel::from_label(label)
            .ok_or_else(|| err(format!("unknown placeholder {label:?}")))?;
        return Ok(TxnRecord::Sentinel { uid, kind });
    }

    let (time, rest) = field(&rest, "time")?;
    let (uid, rest) = field(&rest, "id")?;
    let (amount, rest) = field(&rest, "amount")?;
    let vendor = rest.trim();

    let stamp = format!("{first} {time}");
    let timestamp = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT)
        .map_err(|_| err(format!("bad timestamp {stamp:?}")))?;
    let uid = uid.parse().map_err(|_| err(format!("bad id {uid:?}")))?;
    if amount.parse::<f64>().is_err() {
        return Err(err(format!("bad amount {amount:?}")));
    }
    if vendor.is_empty() {
        return Err(err("missing vendor".to_string()));
    }
    Ok(TxnRecord::Charge(Charge {
        uid,
        timestamp,
        amount,
        vendor: vendor.to_string(),
    }))
}

pub fn write_transactions(cache: &Cache, records: &[TxnRecord]) -> Result<PathBuf> {
    let path = cache.path(TRANSACTIONS_FILE);
    let body: String = records
        .iter()
        .map(|r| format!("{}\n", render_line(r)))
        .collect();
    cache.write_atomic(&path, body.as_bytes())?;
    tracing::info!(path = %path.display(), records = records.len(), "transactions saved");
    Ok(path)
}

pub struct LoadedTransactions {
    pub records: Vec<TxnRecord>,
    pub skipped: usize,
}

/// Read `transactions.txt`; unparsable lines are logged and skipped.
pub fn load_transactions(path: &Path) -> Result<LoadedTransactions> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MailbotError::Cache(format!(
            "cannot open {}: {e} (run `mailbot extract` first)",
            path.display()
        ))
    })?;
    let mut records = Vec::new();
    let mut skipped = 0;
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line, i + 1) {
            Ok(r) => records.push(r),
            Err(e) => {
                tracing::warn!(error = %e, "skipping transaction line");
                skipped += 1;
            }
        }
    }
    Ok(LoadedTransactions { records, skipped })
}

// ---------------------------------------------------------------------------
// Trimming raw messages to the alert text
// ---------------------------------------------------------------------------

const BLOCK_STARTS: [&str; 2] = ["A charge ", "a gas station charge"];
const BLOCK_END: &str = "Do not reply";

/// Cut the alert paragraph out of a raw message: from the first block start
/// marker up to the "Do not reply" footer. `None` when either end is missing.
pub fn trim_notification(raw: &str) -> Option<String> {
    let mut block = String::new();
    let mut in_block = false;

    for line in raw.lines() {
        let mut line = line.trim_end_matches('\r');
        if !in_block {
            let Some(start) = BLOCK_STARTS.iter().filter_map(|m| line.find(m)).min() else {
                continue;
            };
            line = &line[start..];
            in_block = true;
        }
        let line = line.trim_matches('>');
        let (text, done) = match line.find(BLOCK_END) {
            Some(i) => (&line[..i], true),
            None => (line, false),
        };
        match text.strip_suffix('=') {
            Some(joined) => block.push_str(joined),
            None => {
                block.push_str(text);
                block.push(' ');
            }
        }
        if done {
            let block = block.trim();
            return (!block.is_empty()).then(|| block.to_string());
        }
    }
    None
}

#[derive(Debug, Default, PartialEq)]
pub struct TrimSummary {
    pub written: usize,
    pub existing: usize,
    pub no_block: usize,
    pub missing: usize,
}

/// Write `.edited` variants for cached messages that lack one.
pub fn trim_cached(cache: &Cache, uids: &[u64]) -> Result<TrimSummary> {
    let mut summary = TrimSummary::default();
    for &uid in uids {
        let edited = cache.edited_path(uid);
        if edited.exists() {
            summary.existing += 1;
            continue;
        }
        let raw = match std::fs::read(cache.message_path(uid)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                summary.missing += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        match trim_notification(&String::from_utf8_lossy(&raw)) {
            Some(block) => {
                cache.write_atomic(&edited, format!("{block}\n").as_bytes())?;
                tracing::info!(uid, "trimmed");
                summary.written += 1;
            }
            None => summary.no_block += 1,
        }
    }
    Ok(summary)
}
