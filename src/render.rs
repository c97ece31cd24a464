//! Plain-text table rendering for the command line.

use std::fmt::Write;

use crate::models::RegionDirectory;
use crate::service::TableData;
use crate::utils::truncate_string;

/// Widest a column is allowed to grow.
const MAX_COLUMN_WIDTH: usize = 24;

/// Space between columns
const COLUMN_GAP: &str = "  ";

/// Render headers and rows as aligned text columns. Text columns are
/// left-aligned, everything else right-aligned.
pub fn render_table(table: &TableData) -> String {
    if table.headers.is_empty() {
        return "No data available.\n".to_string();
    }

    let keys: Vec<&str> = table.headers.iter().map(|h| h.data.as_str()).collect();
    let labels: Vec<String> = table
        .headers
        .iter()
        .map(|h| truncate_string(&h.label, MAX_COLUMN_WIDTH))
        .collect();
    let rows: Vec<Vec<String>> = table
        .data
        .cells(&keys)
        .into_iter()
        .map(|cells| {
            cells
                .iter()
                .map(|c| truncate_string(&c.to_string(), MAX_COLUMN_WIDTH))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(label.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let left_aligned: Vec<bool> = keys
        .iter()
        .map(|k| matches!(*k, "state" | "stateName" | "date" | "day" | "country"))
        .collect();

    let mut out = String::new();
    push_line(&mut out, &labels, &widths, &left_aligned);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule, &widths, &left_aligned);
    for row in &rows {
        push_line(&mut out, row, &widths, &left_aligned);
    }
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize], left_aligned: &[bool]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .zip(left_aligned)
        .map(|((cell, width), left)| {
            if *left {
                format!("{:<width$}", cell, width = width)
            } else {
                format!("{:>width$}", cell, width = width)
            }
        })
        .collect();
    let _ = writeln!(out, "{}", line.join(COLUMN_GAP).trim_end());
}

/// One `CODE  Name` line per region.
pub fn render_regions(regions: &RegionDirectory) -> String {
    let mut out = String::new();
    for (code, name) in regions {
        let _ = writeln!(out, "{}  {}", code, name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{build_headers, DisplayRows, RawRecord, TableRow, TotalRow};
    use crate::service::DataOrigin;

    fn table() -> TableData {
        let record = RawRecord {
            state: Some("CA".to_string()),
            positive: Some(50),
            death: Some(5),
            total_test_results: Some(200),
            ..Default::default()
        };
        TableData {
            headers: build_headers(
                TotalRow::field_names(),
                &["stateName", "positiveIncrease", "deathIncrease", "totalTestResultsIncrease"],
            ),
            data: DisplayRows::Total(vec![TotalRow::from_record(&record)]),
            origin: DataOrigin::Network,
            timestamp: None,
        }
    }

    #[test]
    fn test_render_table() {
        let text = render_table(&table());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("State  Positive  Deaths  Total Tested  Pos/Total (%)"));
        assert!(lines[1].starts_with("-----"));
        assert!(lines[2].starts_with("CA"));
        assert!(lines[2].contains("25.0"));
        assert!(lines[2].contains("10.0"));
    }

    #[test]
    fn test_render_empty_table() {
        assert_eq!(render_table(&TableData::empty()), "No data available.\n");
    }

    #[test]
    fn test_render_regions() {
        let text = render_regions(crate::models::regions());
        assert!(text.contains("CA  California\n"));
    }
}
