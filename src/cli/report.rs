use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::aggregator::{build_report, is_bucket, Report};
use crate::error::Result;
use crate::fmt::money;
use crate::settings::Settings;

use super::{open, Session};

pub fn run(settings: &Settings, name: &str) -> Result<()> {
    let session = open(settings, name, false)?;
    execute(&session)
}

pub(crate) fn execute(session: &Session) -> Result<()> {
    let since = session.mailbox.since()?;
    let report = build_report(&session.cache, since, session.mailbox.small_threshold)?;
    println!("{}", format_report(&report));
    Ok(())
}

pub fn format_report(report: &Report) -> String {
    let agg = &report.aggregation;

    let mut table = Table::new();
    table.set_header(vec!["Cat", "Vendor", "Amount", "Count"]);
    for row in agg.summary_rows() {
        let vendor = if is_bucket(row) {
            Cell::new(row.name.italic())
        } else if row.category.is_none() {
            Cell::new(row.name.yellow())
        } else {
            Cell::new(&row.name)
        };
        table.add_row(vec![
            Cell::new(row.category.map(String::from).unwrap_or_default()),
            vendor,
            Cell::new(money(row.sum)),
            Cell::new(row.count),
        ]);
    }
    table.add_row(vec![
        Cell::new(""),
        Cell::new("Total".bold()),
        Cell::new(money(agg.total)),
        Cell::new(agg.included),
    ]);
    let mut out = format!("Charges\n{table}");

    let totals = agg.category_totals();
    if !totals.is_empty() {
        let mut ctable = Table::new();
        ctable.set_header(vec!["Category", "Amount", "Count"]);
        for (cat, sum, count) in totals {
            ctable.add_row(vec![Cell::new(cat), Cell::new(money(sum)), Cell::new(count)]);
        }
        out.push_str(&format!("\n\nBy Category\n{ctable}"));
    }

    let placeholders = agg.sentinels.total();
    if placeholders > 0 {
        out.push_str(&format!(
            "\n\n{} messages without a charge",
            placeholders.to_string().yellow()
        ));
    }
    if agg.before_cutoff > 0 {
        out.push_str(&format!("\n{} charges before the cutoff", agg.before_cutoff));
    }
    if agg.bad_amounts > 0 {
        out.push_str(&format!(
            "\n{} charges with unusable amounts",
            agg.bad_amounts.to_string().red()
        ));
    }
    if report.skipped_lines > 0 {
        out.push_str(&format!(
            "\n{} malformed lines skipped",
            report.skipped_lines.to_string().red()
        ));
    }
    if report.harvested > 0 {
        out.push_str(&format!("\n{} categories learned", report.harvested));
    }
    let pending = agg.unclassified().count();
    if pending > 0 {
        out.push_str(&format!(
            "\n{} vendors to categorize (mailbot review)",
            pending.to_string().yellow().bold()
        ));
    }
    out
}
