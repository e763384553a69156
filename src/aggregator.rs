use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::cache::{Cache, CATEGORIES_FILE, SUMMARY_FILE, TRANSACTIONS_FILE, UNCLASSIFIED_FILE};
use crate::categorizer::{
    harvest_categories, load_categories, merge_harvest, render_unclassified, save_categories,
    CategoryMap, UNASSIGNED,
};
use crate::error::Result;
use crate::extractor::load_transactions;
use crate::models::{AggregateRow, Sentinel, TxnRecord};

pub const SMALL_BUCKET: &str = "*single small transactions";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SentinelCounts {
    pub not_found: usize,
    pub empty: usize,
    pub unreadable: usize,
    pub no_match: usize,
}

impl SentinelCounts {
    fn add(&mut self, kind: Sentinel) {
        match kind {
            Sentinel::NotFound => self.not_found += 1,
            Sentinel::Empty => self.empty += 1,
            Sentinel::Unreadable => self.unreadable += 1,
            Sentinel::NoMatch => self.no_match += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.not_found + self.empty + self.unreadable + self.no_match
    }
}

#[derive(Debug, Default)]
pub struct Aggregation {
    /// Ascending by sum; equal sums keep first-seen order.
    pub rows: Vec<AggregateRow>,
    pub included: usize,
    pub before_cutoff: usize,
    pub bad_amounts: usize,
    /// Sum of every included charge.
    pub total: f64,
    pub sentinels: SentinelCounts,
}

/// Synthesized rows are never sent for review or counted per category.
pub fn is_bucket(row: &AggregateRow) -> bool {
    row.synthesized
}

impl Aggregation {
    /// Rows printed in the operator summary.
    pub fn summary_rows(&self) -> impl Iterator<Item = &AggregateRow> {
        self.rows.iter().filter(|r| r.sum > 0.0)
    }

    /// Rows a human still has to categorize.
    pub fn unclassified(&self) -> impl Iterator<Item = &AggregateRow> {
        self.rows
            .iter()
            .filter(|r| !is_bucket(r) && r.sum > 0.0 && r.category.is_none())
    }

    /// Totals per category letter over vendor rows; unassigned rows are
    /// reported under `-`.
    pub fn category_totals(&self) -> Vec<(char, f64, usize)> {
        let mut totals: BTreeMap<char, (f64, usize)> = BTreeMap::new();
        for row in self.rows.iter().filter(|r| !is_bucket(r)) {
            let entry = totals.entry(row.category.unwrap_or(UNASSIGNED)).or_default();
            entry.0 += row.sum;
            entry.1 += row.count;
        }
        totals.into_iter().map(|(c, (s, n))| (c, s, n)).collect()
    }
}

/// Group charges on or after `since` by exact vendor name.
pub fn aggregate(
    records: &[TxnRecord],
    since: Option<NaiveDate>,
    categories: &CategoryMap,
    small_threshold: f64,
) -> Aggregation {
    let mut agg = Aggregation::default();
    let mut lookup: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let charge = match record {
            TxnRecord::Charge(c) => c,
            TxnRecord::Sentinel { kind, .. } => {
                agg.sentinels.add(*kind);
                continue;
            }
        };
        if since.is_some_and(|d| charge.timestamp.date() < d) {
            agg.before_cutoff += 1;
            continue;
        }
        let Ok(amount) = charge.amount.parse::<f64>() else {
            tracing::warn!(uid = charge.uid, amount = %charge.amount, "bad amount");
            agg.bad_amounts += 1;
            continue;
        };

        let idx = *lookup.entry(charge.vendor.as_str()).or_insert_with(|| {
            agg.rows.push(AggregateRow {
                name: charge.vendor.clone(),
                sum: 0.0,
                count: 0,
                category: categories.get(&charge.vendor).copied(),
                synthesized: false,
            });
            agg.rows.len() - 1
        });
        agg.rows[idx].sum += amount;
        agg.rows[idx].count += 1;
        agg.included += 1;
        agg.total += amount;
    }

    let singles: Vec<&AggregateRow> = agg
        .rows
        .iter()
        .filter(|r| r.count == 1 && r.sum > 0.0 && r.sum < small_threshold)
        .collect();
    if !singles.is_empty() {
        let bucket = AggregateRow {
            name: SMALL_BUCKET.to_string(),
            sum: singles.iter().map(|r| r.sum).sum(),
            count: singles.len(),
            category: None,
            synthesized: true,
        };
        agg.rows.push(bucket);
    }

    agg.rows.sort_by(|a, b| a.sum.total_cmp(&b.sum));
    agg
}

// ---------------------------------------------------------------------------
// summary.txt / unclassified.txt
// ---------------------------------------------------------------------------

/// `skipped` is the number of unreadable `transactions.txt` lines; a
/// non-zero count is called out in its own marked line.
pub fn render_summary(agg: &Aggregation, since: Option<NaiveDate>, skipped: usize) -> String {
    let mut out = String::new();
    match since {
        Some(d) => out.push_str(&format!("Charges since {}\n\n", d.format("%Y-%m-%d"))),
        None => out.push_str("All charges\n\n"),
    }
    out.push_str("cat        sum count vendor\n");
    for row in agg.summary_rows() {
        out.push_str(&format!(
            "{} {:>10.2} {:>5} {}\n",
            row.category.unwrap_or(' '),
            row.sum,
            row.count,
            row.name
        ));
    }

    out.push_str("\nBy category\n");
    for (cat, sum, count) in agg.category_totals() {
        out.push_str(&format!("{cat} {sum:>10.2} {count:>5}\n"));
    }

    let s = &agg.sentinels;
    out.push_str(&format!(
        "\nIncluded {} charges, total {:.2}; {} before cutoff; {} bad amounts\n",
        agg.included, agg.total, agg.before_cutoff, agg.bad_amounts
    ));
    out.push_str(&format!(
        "Placeholders: {} not found, {} empty, {} unreadable, {} no match\n",
        s.not_found, s.empty, s.unreadable, s.no_match
    ));
    if skipped > 0 {
        out.push_str(&format!("!! {skipped} malformed transaction lines skipped\n"));
    }
    out
}

pub struct Report {
    pub aggregation: Aggregation,
    pub harvested: usize,
    pub skipped_lines: usize,
}

/// Fold human edits of the previous unclassified file into the category
/// map, aggregate `transactions.txt`, and rewrite the report files.
pub fn build_report(cache: &Cache, since: Option<NaiveDate>, small_threshold: f64) -> Result<Report> {
    let categories_path = cache.path(CATEGORIES_FILE);
    let unclassified_path = cache.path(UNCLASSIFIED_FILE);

    let mut categories = load_categories(&categories_path)?;
    let harvested = match std::fs::read_to_string(&unclassified_path) {
        Ok(text) => merge_harvest(&mut categories, harvest_categories(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => return Err(e.into()),
    };
    if harvested > 0 {
        save_categories(cache, &categories_path, &categories)?;
        tracing::info!(harvested, "categories updated");
    }

    let loaded = load_transactions(&cache.path(TRANSACTIONS_FILE))?;
    let aggregation = aggregate(&loaded.records, since, &categories, small_threshold);

    cache.write_atomic(
        &cache.path(SUMMARY_FILE),
        render_summary(&aggregation, since, loaded.skipped).as_bytes(),
    )?;
    cache.write_atomic(
        &unclassified_path,
        render_unclassified(aggregation.unclassified()).as_bytes(),
    )?;
    tracing::info!(
        rows = aggregation.rows.len(),
        unclassified = aggregation.unclassified().count(),
        "report saved"
    );

    Ok(Report {
        aggregation,
        harvested,
        skipped_lines: loaded.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::write_transactions;
    use crate::models::Charge;

    fn charge(uid: u64, day: u32, amount: &str, vendor: &str) -> TxnRecord {
        TxnRecord::Charge(Charge {
            uid,
            timestamp: NaiveDate::from_ymd_opt(2024, 3, day)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            amount: amount.to_string(),
            vendor: vendor.to_string(),
        })
    }

    fn sample() -> Vec<TxnRecord> {
        vec![
            charge(1, 1, "40.00", "WHOLE FOODS"),
            charge(2, 2, "15.99", "NETFLIX.COM"),
            charge(3, 3, "4.50", "CAFE NERO"),
            charge(4, 4, "60.00", "WHOLE FOODS"),
            TxnRecord::Sentinel { uid: 5, kind: Sentinel::NoMatch },
            charge(6, 5, "3.25", "PARKING"),
            charge(7, 6, "15.99", "SPOTIFY"),
            TxnRecord::Sentinel { uid: 8, kind: Sentinel::NotFound },
        ]
    }

    fn names(agg: &Aggregation) -> Vec<&str> {
        agg.rows.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_groups_and_sorts_ascending() {
        let agg = aggregate(&sample(), None, &CategoryMap::new(), 10.0);
        assert_eq!(
            names(&agg),
            vec![
                "PARKING",
                "CAFE NERO",
                SMALL_BUCKET,
                "NETFLIX.COM",
                "SPOTIFY",
                "WHOLE FOODS"
            ]
        );
        let foods = agg.rows.iter().find(|r| r.name == "WHOLE FOODS").unwrap();
        assert_eq!(foods.count, 2);
        assert!((foods.sum - 100.0).abs() < 1e-9);
        assert_eq!(agg.included, 6);
        assert_eq!(agg.sentinels.total(), 2);
    }

    #[test]
    fn test_equal_sums_keep_first_seen_order() {
        let records = vec![
            charge(1, 1, "15.99", "SPOTIFY"),
            charge(2, 2, "15.99", "NETFLIX.COM"),
            charge(3, 3, "15.99", "HULU"),
        ];
        let agg = aggregate(&records, None, &CategoryMap::new(), 0.0);
        assert_eq!(names(&agg), vec!["SPOTIFY", "NETFLIX.COM", "HULU"]);
    }

    #[test]
    fn test_total_excludes_bucket_rows() {
        let since = NaiveDate::from_ymd_opt(2024, 3, 3);
        let agg = aggregate(&sample(), since, &CategoryMap::new(), 10.0);
        let row_total: f64 = agg.rows.iter().filter(|r| !is_bucket(r)).map(|r| r.sum).sum();
        let expected = 4.50 + 60.00 + 3.25 + 15.99;
        assert!((row_total - expected).abs() < 1e-9);
        assert!((agg.total - expected).abs() < 1e-9);
        assert_eq!(agg.before_cutoff, 2);
    }

    #[test]
    fn test_partition() {
        let mut categories = CategoryMap::new();
        categories.insert("WHOLE FOODS".to_string(), 'g');
        let mut records = sample();
        records.push(charge(9, 7, "-20.00", "REFUND CO"));
        let agg = aggregate(&records, None, &categories, 10.0);

        let unclassified: Vec<&str> = agg.unclassified().map(|r| r.name.as_str()).collect();
        assert_eq!(unclassified, vec!["PARKING", "CAFE NERO", "NETFLIX.COM", "SPOTIFY"]);

        let summary: Vec<&str> = agg.summary_rows().map(|r| r.name.as_str()).collect();
        assert!(summary.contains(&SMALL_BUCKET));
        assert!(summary.contains(&"WHOLE FOODS"));
        assert!(!summary.contains(&"REFUND CO"));

        let totals = agg.category_totals();
        assert_eq!(totals[0].0, UNASSIGNED);
        assert_eq!(totals[1], ('g', 100.0, 2));
    }

    #[test]
    fn test_bad_amount_is_skipped() {
        let records = vec![charge(1, 1, "12,00", "X"), charge(2, 1, "1.00", "Y")];
        let agg = aggregate(&records, None, &CategoryMap::new(), 0.0);
        assert_eq!(agg.bad_amounts, 1);
        assert_eq!(names(&agg), vec!["Y"]);
    }

    #[test]
    fn test_build_report_harvests_edits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path()).unwrap();
        write_transactions(&cache, &sample()).unwrap();

        let first = build_report(&cache, None, 10.0).unwrap();
        assert_eq!(first.harvested, 0);
        assert_eq!(first.aggregation.unclassified().count(), 5);

        let path = cache.path(UNCLASSIFIED_FILE);
        let text = std::fs::read_to_string(&path).unwrap();
        let edited: String = text
            .lines()
            .map(|l| {
                if l.ends_with("WHOLE FOODS") {
                    l.replacen('-', "g", 1)
                } else {
                    l.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&path, edited).unwrap();

        let second = build_report(&cache, None, 10.0).unwrap();
        assert_eq!(second.harvested, 1);
        assert_eq!(second.aggregation.unclassified().count(), 4);
        let categories = std::fs::read_to_string(cache.path(CATEGORIES_FILE)).unwrap();
        assert_eq!(categories, "g WHOLE FOODS\n");

        let summary = std::fs::read_to_string(cache.path(SUMMARY_FILE)).unwrap();
        assert!(summary.contains("g     100.00     2 WHOLE FOODS"));
        assert!(summary.contains("1 not found"));
        assert!(!summary.contains("malformed"));
    }

    #[test]
    fn test_malformed_lines_are_marked_in_summary() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path()).unwrap();
        let path = write_transactions(&cache, &sample()[..1]).unwrap();
        let mut text = std::fs::read_to_string(&path).unwrap();
        text.push_str("2024-03-02 12:00:00         43 garbage\n");
        std::fs::write(&path, text).unwrap();

        let report = build_report(&cache, None, 10.0).unwrap();
        assert_eq!(report.skipped_lines, 1);
        assert_eq!(report.aggregation.included, 1);
        let summary = std::fs::read_to_string(cache.path(SUMMARY_FILE)).unwrap();
        assert!(summary.contains("!! 1 malformed transaction lines skipped"));
    }

    #[test]
    fn test_vendor_with_star_is_a_real_vendor() {
        let records = vec![
            charge(1, 1, "50.00", "*PAYPAL EBAY"),
            charge(2, 2, "3.00", "PARKING"),
        ];
        let agg = aggregate(&records, None, &CategoryMap::new(), 10.0);

        let unclassified: Vec<&str> = agg.unclassified().map(|r| r.name.as_str()).collect();
        assert_eq!(unclassified, vec!["PARKING", "*PAYPAL EBAY"]);
        let row_total: f64 = agg.rows.iter().filter(|r| !is_bucket(r)).map(|r| r.sum).sum();
        assert!((row_total - 53.0).abs() < 1e-9);
        assert!((agg.total - 53.0).abs() < 1e-9);
        assert_eq!(agg.category_totals(), vec![(UNASSIGNED, 53.0, 2)]);
        let buckets: Vec<&str> = agg.rows.iter().filter(|r| is_bucket(r)).map(|r| r.name.as_str()).collect();
        assert_eq!(buckets, vec![SMALL_BUCKET]);
    }
}
