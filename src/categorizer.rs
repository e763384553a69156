use std::collections::BTreeMap;
use std::path::Path;

use crate::cache::Cache;
use crate::error::Result;
use crate::fmt::next_field;
use crate::models::AggregateRow;

/// Vendor name to the single-letter category a human assigned it.
pub type CategoryMap = BTreeMap<String, char>;

pub const UNASSIGNED: char = '-';

fn single_char(token: &str) -> Option<char> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Read `categories.txt` (`<letter> <vendor>` per line). A missing file is
/// an empty map.
pub fn load_categories(path: &Path) -> Result<CategoryMap> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CategoryMap::new()),
        Err(e) => return Err(e.into()),
    };
    let mut map = CategoryMap::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed = next_field(line).and_then(|(cat, rest)| {
            let name = rest.trim();
            single_char(cat).filter(|_| !name.is_empty()).map(|c| (c, name))
        });
        match parsed {
            Some((cat, name)) => {
                map.insert(name.to_string(), cat);
            }
            None => tracing::warn!(line = i + 1, content = line, "bad category line"),
        }
    }
    Ok(map)
}

pub fn save_categories(cache: &Cache, path: &Path, map: &CategoryMap) -> Result<()> {
    let body: String = map
        .iter()
        .map(|(name, cat)| format!("{cat} {name}\n"))
        .collect();
    cache.write_atomic(path, body.as_bytes())
}

pub fn render_unclassified_line(row: &AggregateRow) -> String {
    format!(
        "{} {:>10.2} {:>5} {}",
        row.category.unwrap_or(UNASSIGNED),
        row.sum,
        row.count,
        row.name
    )
}

pub fn render_unclassified<'a>(rows: impl Iterator<Item = &'a AggregateRow>) -> String {
    let mut out = String::from(
        "# Replace '-' with a category letter, save, then run `mailbot report` again.\n\
         # cat        sum count vendor\n",
    );
    for row in rows {
        out.push_str(&render_unclassified_line(row));
        out.push('\n');
    }
    out
}

/// Pull the categories a human filled into an unclassified listing.
pub fn harvest_categories(text: &str) -> Vec<(String, char)> {
    let mut found = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed = next_field(line).and_then(|(cat, rest)| {
            let (sum, rest) = next_field(rest)?;
            let (count, rest) = next_field(rest)?;
            sum.parse::<f64>().ok()?;
            count.parse::<usize>().ok()?;
            let name = rest.trim();
            if name.is_empty() {
                return None;
            }
            Some((single_char(cat)?, name.to_string()))
        });
        match parsed {
            Some((UNASSIGNED, _)) => {}
            Some((cat, name)) => found.push((name, cat)),
            None => tracing::warn!(line = i + 1, content = line, "bad unclassified line"),
        }
    }
    found
}

/// Merge categories from an edited unclassified file into `map`. Returns
/// how many entries were added or changed.
pub fn merge_harvest(map: &mut CategoryMap, harvested: Vec<(String, char)>) -> usize {
    let mut changed = 0;
    for (name, cat) in harvested {
        if map.insert(name, cat) != Some(cat) {
            changed += 1;
        }
    }
    changed
}
