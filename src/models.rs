use chrono::NaiveDateTime;
use serde::Deserialize;

/// An age threshold plus an opaque match expression handed to the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Filter {
    pub days_before: u32,
    pub expression: String,
}

/// One `* <seq> FETCH (UID <uid>)` entry of the identifier index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdPair {
    pub seqnum: u64,
    pub uid: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    NotFound,
    Empty,
    Unreadable,
    NoMatch,
}

impl Sentinel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotFound => "<not found>",
            Self::Empty => "<empty>",
            Self::Unreadable => "<unreadable>",
            Self::NoMatch => "<no match>",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [Self::NotFound, Self::Empty, Self::Unreadable, Self::NoMatch]
            .into_iter()
            .find(|s| s.label() == label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Charge {
    pub uid: u64,
    pub timestamp: NaiveDateTime,
    /// Decimal text without thousands separators, e.g. `1234.56`.
    pub amount: String,
    pub vendor: String,
}

/// One line of `transactions.txt`.
#[derive(Debug, Clone, PartialEq)]
pub enum TxnRecord {
    Charge(Charge),
    Sentinel { uid: u64, kind: Sentinel },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub name: String,
    pub sum: f64,
    pub count: usize,
    pub category: Option<char>,
    /// Built by the aggregator rather than taken from a vendor.
    pub synthesized: bool,
}
