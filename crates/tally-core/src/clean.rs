//! Row-cleaning pipeline
//!
//! Records live in an arena (`RecordSet`) addressed by position; each record
//! remembers its original grid row. Records are keyed by header name, so a
//! repeated header contributes one field: the last column carrying it. Every stage takes a view (positions that
//! survived earlier stages) and returns the positions it keeps plus the set
//! of original row indices it removed. Stages run in a fixed order:
//!
//! 1. blank rows
//! 2. rows whose second column is a total label
//! 3. summary rows (a total label anywhere, or a sparse line with a number
//!    and no real bill)
//! 4. rows without a usable bill identifier

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::columns::{column_index, distinct_columns};
use crate::config::AnalysisConfig;
use crate::metrics::parse_amount;
use crate::models::{Grid, RemovedRows};

/// One data row, trimmed and aligned with the headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Row index in the original grid
    pub row_index: usize,
    values: Vec<String>,
}

impl Record {
    pub fn new(row_index: usize, values: Vec<String>) -> Self {
        Self { row_index, values }
    }

    /// Value at a header position (empty when the row was short)
    pub fn get(&self, column: usize) -> &str {
        self.values.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Arena of records built from the rows after the header row
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    headers: Vec<String>,
    /// Winning column per distinct header name
    fields: Vec<usize>,
    records: Vec<Record>,
}

impl RecordSet {
    /// Build one record per grid row strictly after `header_row`
    ///
    /// Short rows are padded with empty values and extra cells beyond the
    /// header width are ignored.
    pub fn build(grid: &Grid, header_row: usize, headers: Vec<String>) -> Self {
        let width = headers.len();
        let records = grid
            .rows()
            .iter()
            .enumerate()
            .skip(header_row + 1)
            .map(|(row_index, row)| {
                let values = (0..width)
                    .map(|j| row.get(j).map(|c| c.trim().to_string()).unwrap_or_default())
                    .collect();
                Record::new(row_index, values)
            })
            .collect();
        Self::from_records(headers, records)
    }

    pub fn from_records(headers: Vec<String>, records: Vec<Record>) -> Self {
        Self {
            fields: distinct_columns(&headers),
            headers,
            records,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// A record's fields as `(column, value)`, one per distinct header name
    pub fn fields<'a>(
        &'a self,
        record: &'a Record,
    ) -> impl Iterator<Item = (usize, &'a str)> + 'a {
        self.fields.iter().map(move |&j| (j, record.get(j)))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// View over every record
    pub fn all(&self) -> Vec<usize> {
        (0..self.records.len()).collect()
    }

    /// Records for a view, in view order
    pub fn select<'a>(&'a self, view: &'a [usize]) -> impl Iterator<Item = &'a Record> + 'a {
        view.iter().filter_map(move |&i| self.records.get(i))
    }

    /// New arena holding only the records in a view
    pub fn subset(&self, view: &[usize]) -> Self {
        Self {
            headers: self.headers.clone(),
            fields: self.fields.clone(),
            records: self.select(view).cloned().collect(),
        }
    }
}

/// Output of one cleaning stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageResult {
    /// Arena positions that survive
    pub kept: Vec<usize>,
    /// Original grid row indices removed
    pub removed: BTreeSet<usize>,
}

impl StageResult {
    fn partition(set: &RecordSet, view: &[usize], mut drop: impl FnMut(&Record) -> bool) -> Self {
        let mut result = Self::default();
        for &i in view {
            let Some(record) = set.records.get(i) else {
                continue;
            };
            if drop(record) {
                result.removed.insert(record.row_index);
            } else {
                result.kept.push(i);
            }
        }
        result
    }
}

/// Full pipeline output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningReport {
    /// Arena positions of the rows used for aggregation
    pub kept: Vec<usize>,
    pub blank: BTreeSet<usize>,
    pub totalish: BTreeSet<usize>,
    pub summary: BTreeSet<usize>,
    pub missing_bill: BTreeSet<usize>,
}

impl CleaningReport {
    pub fn removed_rows(&self) -> RemovedRows {
        RemovedRows {
            blank: self.blank.iter().copied().collect(),
            totalish: self.totalish.iter().copied().collect(),
            summary: self.summary.iter().copied().collect(),
            missing_bill: self.missing_bill.iter().copied().collect(),
        }
    }
}

/// Run all stages in order
pub fn clean(
    set: &RecordSet,
    sales_column: usize,
    bill_column: usize,
    config: &AnalysisConfig,
) -> CleaningReport {
    let all = set.all();
    let blank = drop_blank_rows(set, &all);
    let totalish = drop_totalish_second_column(set, &blank.kept);
    let summary = drop_summary_rows(set, &totalish.kept, sales_column, bill_column, config);
    let usable = keep_usable_bills(set, &summary.kept, bill_column, config);

    debug!(
        records = set.len(),
        blank = blank.removed.len(),
        totalish = totalish.removed.len(),
        summary = summary.removed.len(),
        missing_bill = usable.removed.len(),
        kept = usable.kept.len(),
        "Cleaned records"
    );

    CleaningReport {
        kept: usable.kept,
        blank: blank.removed,
        totalish: totalish.removed,
        summary: summary.removed,
        missing_bill: usable.removed,
    }
}

/// Stage 1: drop records whose every field is empty
pub fn drop_blank_rows(set: &RecordSet, view: &[usize]) -> StageResult {
    StageResult::partition(set, view, |r| {
        set.fields(r).all(|(_, v)| v.trim().is_empty())
    })
}

/// Stage 2: drop records whose second header's value holds a total label
///
/// No-op when there are fewer than two headers. The value is read from the
/// column that wins for the second header's name.
pub fn drop_totalish_second_column(set: &RecordSet, view: &[usize]) -> StageResult {
    let Some(second) = set.headers.get(1) else {
        return StageResult {
            kept: view.to_vec(),
            removed: BTreeSet::new(),
        };
    };
    let column = column_index(&set.headers, second).unwrap_or(1);
    StageResult::partition(set, view, |r| looks_like_total(r.get(column)))
}

/// Stage 3: drop summary rows
///
/// A record is a summary row when any cell looks like a total, or when its
/// bill is effectively empty, its sales value is numeric and at most
/// `sparse_summary_max_other_fields` other fields are filled in.
pub fn drop_summary_rows(
    set: &RecordSet,
    view: &[usize],
    sales_column: usize,
    bill_column: usize,
    config: &AnalysisConfig,
) -> StageResult {
    StageResult::partition(set, view, |r| {
        if set.fields(r).any(|(_, v)| looks_like_total(v)) {
            return true;
        }
        is_sparse_summary(set, r, sales_column, bill_column, config)
    })
}

fn is_sparse_summary(
    set: &RecordSet,
    record: &Record,
    sales_column: usize,
    bill_column: usize,
    config: &AnalysisConfig,
) -> bool {
    if !config.is_empty_bill(record.get(bill_column)) {
        return false;
    }
    if parse_amount(record.get(sales_column)).is_none() {
        return false;
    }
    // The bill cell counts too: a "-" or "NA" placeholder is still a filled field
    let others = set
        .fields(record)
        .filter(|(j, _)| *j != sales_column)
        .filter(|(_, v)| {
            let t = v.trim();
            !t.is_empty() && !t.eq_ignore_ascii_case("nan")
        })
        .count();
    others <= config.sparse_summary_max_other_fields
}

/// Stage 4: keep only records with a usable bill identifier
pub fn keep_usable_bills(
    set: &RecordSet,
    view: &[usize],
    bill_column: usize,
    config: &AnalysisConfig,
) -> StageResult {
    StageResult::partition(set, view, |r| config.is_empty_bill(r.get(bill_column)))
}

fn total_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:(?:grand\s*)?sub\s*|grand\s*)?totals?\b").expect("valid regex")
    })
}

/// Whether a cell reads as a subtotal/total label
///
/// Matches the word "total" (optionally "sub", "grand" or "grand sub" in
/// front, plural allowed), or anything within one edit of "total".
pub fn looks_like_total(cell: &str) -> bool {
    let t = cell.trim().to_lowercase();
    if t.is_empty() {
        return false;
    }
    total_pattern().is_match(&t) || edit_distance(&t, "total") <= 1
}

/// Levenshtein distance over chars
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(headers: &[&str], rows: Vec<Vec<&str>>) -> RecordSet {
        let mut grid_rows = vec![headers.to_vec()];
        grid_rows.extend(rows);
        let grid = Grid::from(grid_rows);
        RecordSet::build(
            &grid,
            0,
            headers.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_build_pads_and_trims() {
        let s = set(&["A", "B", "C"], vec![vec![" x ", "y"], vec!["1", "2", "3", "4"]]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.records()[0].values(), &["x", "y", ""]);
        assert_eq!(s.records()[0].row_index, 1);
        assert_eq!(s.records()[1].values().len(), 3);
    }

    #[test]
    fn test_build_after_offset_header() {
        let grid = Grid::from(vec![
            vec!["Report"],
            vec!["Bill", "Amount"],
            vec!["B1", "10"],
        ]);
        let s = RecordSet::build(&grid, 1, vec!["Bill".into(), "Amount".into()]);
        assert_eq!(s.len(), 1);
        assert_eq!(s.records()[0].row_index, 2);
    }

    #[test]
    fn test_build_header_is_last_row() {
        let grid = Grid::from(vec![vec!["Bill", "Amount"]]);
        let s = RecordSet::build(&grid, 0, vec!["Bill".into(), "Amount".into()]);
        assert!(s.is_empty());
    }

    #[test]
    fn test_looks_like_total() {
        for cell in [
            "Total",
            "TOTAL",
            " total ",
            "Sub Total",
            "subtotal",
            "Grand Total",
            "grandtotal",
            "Grand Sub Total",
            "Totals count",
            "Day total:",
            "Totl",
            "Toal",
            "Tota",
            "Totals",
        ] {
            assert!(looks_like_total(cell), "{:?} should be totalish", cell);
        }
    }

    #[test]
    fn test_not_totalish() {
        for cell in ["", "   ", "B1", "Totalitarian", "Subtotaled", "Tl", "100", "Bill No"] {
            assert!(!looks_like_total(cell), "{:?} should not be totalish", cell);
        }
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("total", "total"), 0);
        assert_eq!(edit_distance("totl", "total"), 1);
        assert_eq!(edit_distance("toal", "total"), 1);
        assert_eq!(edit_distance("totel", "total"), 1);
        assert_eq!(edit_distance("tot", "total"), 2);
        assert_eq!(edit_distance("", "total"), 5);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        // Multi-byte chars count once
        assert_eq!(edit_distance("tötal", "total"), 1);
    }

    #[test]
    fn test_drop_blank_rows() {
        let s = set(&["A", "B"], vec![vec!["", "  "], vec!["x", ""], vec![]]);
        let result = drop_blank_rows(&s, &s.all());
        assert_eq!(result.kept, vec![1]);
        assert_eq!(result.removed, BTreeSet::from([1, 3]));
    }

    #[test]
    fn test_totalish_second_column() {
        let s = set(
            &["Date", "Bill No", "Amount"],
            vec![
                vec!["1/1", "B1", "100"],
                vec!["1/2", "Total", "50"],
                vec!["1/3", "B2", "200"],
            ],
        );
        let result = drop_totalish_second_column(&s, &s.all());
        assert_eq!(result.kept, vec![0, 2]);
        assert_eq!(result.removed, BTreeSet::from([2]));
    }

    #[test]
    fn test_totalish_second_column_needs_two_headers() {
        let s = set(&["Total"], vec![vec!["Total"]]);
        let result = drop_totalish_second_column(&s, &s.all());
        assert_eq!(result.kept, vec![0]);
        assert!(result.removed.is_empty());
    }

    #[test]
    fn test_totalish_only_checks_second_column() {
        let s = set(&["Note", "Bill", "Amount"], vec![vec!["Total", "B1", "10"]]);
        let result = drop_totalish_second_column(&s, &s.all());
        assert_eq!(result.kept, vec![0]);
    }

    #[test]
    fn test_summary_any_cell() {
        let config = AnalysisConfig::default();
        let s = set(
            &["Note", "Bill", "Amount"],
            vec![vec!["Grand Total", "B9", "999"], vec!["", "B1", "10"]],
        );
        let result = drop_summary_rows(&s, &s.all(), 2, 1, &config);
        assert_eq!(result.kept, vec![1]);
        assert_eq!(result.removed, BTreeSet::from([1]));
    }

    #[test]
    fn test_summary_sparse_trigger() {
        let config = AnalysisConfig::default();
        let s = set(
            &["Date", "Bill", "Amount", "Note"],
            vec![
                // bill NA, numeric sales, nothing else
                vec!["", "NA", "500", ""],
                // bill empty, numeric sales, one other field
                vec!["1/1", "", "600", "nan"],
                // bill empty, numeric sales, two other fields
                vec!["1/2", "", "700", "walk-in"],
                // bill empty, sales not numeric
                vec!["", "-", "n/a", ""],
                // real bill
                vec!["", "B1", "100", ""],
            ],
        );
        let result = drop_summary_rows(&s, &s.all(), 2, 1, &config);
        assert_eq!(result.kept, vec![2, 3, 4]);
        assert_eq!(result.removed, BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_summary_sparse_threshold_is_tunable() {
        let mut config = AnalysisConfig::default();
        config.sparse_summary_max_other_fields = 2;
        let s = set(
            &["Date", "Bill", "Amount", "Note"],
            vec![vec!["1/2", "", "700", "walk-in"]],
        );
        let result = drop_summary_rows(&s, &s.all(), 2, 1, &config);
        assert!(result.kept.is_empty());
    }

    #[test]
    fn test_keep_usable_bills() {
        let config = AnalysisConfig::default();
        let s = set(
            &["Bill", "Amount"],
            vec![vec!["B1", "x"], vec!["0", "5"], vec!["none", "abc"], vec!["B2", ""]],
        );
        let result = keep_usable_bills(&s, &s.all(), 0, &config);
        assert_eq!(result.kept, vec![0, 3]);
        assert_eq!(result.removed, BTreeSet::from([2, 3]));
    }

    #[test]
    fn test_clean_stage_order() {
        let config = AnalysisConfig::default();
        let s = set(
            &["Date", "Bill No", "Amount"],
            vec![
                vec!["1/1", "B1", "100"],
                vec!["", "", ""],
                vec!["1/2", "Total", "50"],
                vec!["Total", "", "150"],
                vec!["", "-", "abc"],
                vec!["1/3", "B2", "200"],
            ],
        );
        let report = clean(&s, 2, 1, &config);

        assert_eq!(report.blank, BTreeSet::from([2]));
        assert_eq!(report.totalish, BTreeSet::from([3]));
        assert_eq!(report.summary, BTreeSet::from([4]));
        assert_eq!(report.missing_bill, BTreeSet::from([5]));
        assert_eq!(report.kept, vec![0, 5]);
    }

    #[test]
    fn test_clean_is_idempotent() {
        let config = AnalysisConfig::default();
        let s = set(
            &["Date", "Bill No", "Amount"],
            vec![
                vec!["1/1", "B1", "100"],
                vec!["1/2", "Subtotal", "100"],
                vec!["", "", ""],
                vec!["1/3", "B2", "₹1,234.50"],
                vec!["", "NA", "1334.50"],
            ],
        );
        let first = clean(&s, 2, 1, &config);
        let cleaned = s.subset(&first.kept);

        let second = clean(&cleaned, 2, 1, &config);
        assert_eq!(second.kept, cleaned.all());
        assert!(second.blank.is_empty());
        assert!(second.totalish.is_empty());
        assert!(second.summary.is_empty());
        assert!(second.missing_bill.is_empty());
        assert_eq!(cleaned.subset(&second.kept).records(), cleaned.records());
    }

    #[test]
    fn test_repeated_header_reads_last_column() {
        let s = set(
            &["Date", "Bill", "Amount", "Bill"],
            vec![
                // "Bill" resolves to column 3, so the label in column 1 is shadowed
                vec!["1/1", "Total", "10", "B1"],
                vec!["1/2", "B2", "20", "Total"],
            ],
        );
        let result = drop_totalish_second_column(&s, &s.all());
        assert_eq!(result.kept, vec![0]);
        assert_eq!(result.removed, BTreeSet::from([2]));
    }

    #[test]
    fn test_repeated_header_counts_once() {
        let config = AnalysisConfig::default();
        let s = set(
            &["Note", "Date", "Bill", "Amount", "Note", "Date"],
            vec![
                // Shadowed columns don't count as filled fields
                vec!["walk-in", "1/1", "", "500", "", ""],
                vec!["", "", "", "", "", ""],
            ],
        );
        let summary = drop_summary_rows(&s, &s.all(), 3, 2, &config);
        assert_eq!(summary.removed, BTreeSet::from([1]));

        let blank = drop_blank_rows(&s, &s.all());
        assert_eq!(blank.removed, BTreeSet::from([2]));
    }

    #[test]
    fn test_shadowed_column_blank_row() {
        let s = set(&["Amount", "Bill", "Amount"], vec![vec!["7", "", ""]]);
        let result = drop_blank_rows(&s, &s.all());
        assert!(result.kept.is_empty());
    }

    #[test]
    fn test_removed_rows_sorted() {
        let report = CleaningReport {
            blank: BTreeSet::from([7, 3]),
            ..Default::default()
        };
        assert_eq!(report.removed_rows().blank, vec![3, 7]);
    }
}
