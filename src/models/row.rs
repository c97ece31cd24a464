//! Display-ready rows reshaped from raw API records.
//!
//! Two row shapes exist: `TotalRow` (one row per region, aggregate as of a
//! date) and `StateRow` (one row per date for a single region). Both carry
//! the derived `posPercentage` and `deathPercentage` columns.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::header::SortDirection;
use super::record::RawRecord;
use super::region::region_name;
use crate::utils::{format_date, weekday_name};

const NOT_APPLICABLE: &str = "N/A";

// ============================================================================
// Percentage
// ============================================================================

/// A derived percentage, or `N/A` when the denominator is zero.
///
/// Serialized as a bare number or the string `"N/A"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Percentage {
    Value(f64),
    NotApplicable,
}

impl Percentage {
    /// `numerator / denominator * 100`, rounded to one decimal.
    /// A missing numerator counts as zero; a missing or non-positive
    /// denominator yields `NotApplicable`.
    pub fn of(numerator: Option<i64>, denominator: Option<i64>) -> Self {
        match denominator {
            Some(d) if d > 0 => {
                let ratio = numerator.unwrap_or(0) as f64 / d as f64 * 100.0;
                Percentage::Value(round_to_tenth(ratio))
            }
            _ => Percentage::NotApplicable,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Percentage::Value(v) => Some(*v),
            Percentage::NotApplicable => None,
        }
    }
}

/// Round the exact stored value to one decimal, ties away from zero.
///
/// `x * 10.0` is not used directly: `0.15` is stored below the tie but
/// scales to exactly `1.5`. `{:.1}` rounds the exact value with ties to
/// even, and `x` is exactly on a tie iff `4x` is an odd integer.
fn round_to_tenth(x: f64) -> f64 {
    let quarters = x * 4.0;
    if quarters.fract() == 0.0 && quarters % 2.0 != 0.0 {
        // x * 10.0 is exact here
        return (x * 10.0).round() / 10.0;
    }
    format!("{:.1}", x).parse().unwrap_or(x)
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Percentage::Value(v) => write!(f, "{:.1}", v),
            Percentage::NotApplicable => f.write_str(NOT_APPLICABLE),
        }
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Percentage::Value(v) => serializer.serialize_f64(*v),
            Percentage::NotApplicable => serializer.serialize_str(NOT_APPLICABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawPercentage {
            Number(f64),
            Text(String),
        }

        match RawPercentage::deserialize(deserializer)? {
            RawPercentage::Number(v) => Ok(Percentage::Value(v)),
            RawPercentage::Text(s) if s == NOT_APPLICABLE => Ok(Percentage::NotApplicable),
            RawPercentage::Text(s) => Err(serde::de::Error::custom(format!(
                "invalid percentage: {:?}",
                s
            ))),
        }
    }
}

// ============================================================================
// Cells
// ============================================================================

/// A single table cell value, addressed by field key.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(Option<String>),
    /// `MM/DD/YYYY`
    Date(Option<String>),
    Count(Option<i64>),
    Percent(Percentage),
}

#[derive(Debug, PartialEq, PartialOrd)]
enum SortKey<'a> {
    Number(f64),
    Text(&'a str),
}

impl Cell {
    /// `None` for missing values and `N/A`
    fn sort_key(&self) -> Option<SortKey<'_>> {
        match self {
            Cell::Text(text) => text.as_deref().map(SortKey::Text),
            Cell::Date(date) => date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%m/%d/%Y").ok())
                .map(|d| SortKey::Number(d.num_days_from_ce() as f64)),
            Cell::Count(count) => count.map(|n| SortKey::Number(n as f64)),
            Cell::Percent(pct) => pct.value().map(SortKey::Number),
        }
    }

    /// Order two cells of the same column. Missing values and `N/A` sort
    /// after every present value regardless of direction.
    pub fn compare(&self, other: &Cell, direction: SortDirection) -> Ordering {
        match (self.sort_key(), other.sort_key()) {
            (Some(a), Some(b)) => {
                let ord = match (&a, &b) {
                    (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
                    _ => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                };
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(Some(s)) | Cell::Date(Some(s)) => f.write_str(s),
            Cell::Count(Some(n)) => write!(f, "{}", n),
            Cell::Percent(pct) => write!(f, "{}", pct),
            Cell::Text(None) | Cell::Date(None) | Cell::Count(None) => f.write_str("-"),
        }
    }
}

/// A row that can be rendered as table columns.
pub trait TableRow {
    /// Field keys in serialization order.
    fn field_names() -> &'static [&'static str];

    fn cell(&self, key: &str) -> Option<Cell>;
}

/// Sort rows by a field key. Unknown keys leave the order untouched.
pub fn sort_rows<R: TableRow>(rows: &mut [R], key: &str, direction: SortDirection) {
    if !R::field_names().contains(&key) {
        return;
    }
    rows.sort_by(|a, b| match (a.cell(key), b.cell(key)) {
        (Some(x), Some(y)) => x.compare(&y, direction),
        _ => Ordering::Equal,
    });
}

// ============================================================================
// Aggregate rows
// ============================================================================

/// One region, aggregate as of a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalRow {
    pub state: Option<String>,
    pub state_name: Option<String>,
    pub positive: Option<i64>,
    pub death: Option<i64>,
    pub positive_increase: Option<i64>,
    pub death_increase: Option<i64>,
    pub total_test_results: Option<i64>,
    pub total_test_results_increase: Option<i64>,
    pub pos_percentage: Percentage,
    pub death_percentage: Percentage,
    pub hospitalized_currently: Option<i64>,
    pub in_icu_currently: Option<i64>,
    pub on_ventilator_currently: Option<i64>,
    pub pending: Option<i64>,
}

impl TotalRow {
    pub fn from_record(record: &RawRecord) -> Self {
        Self {
            state: record.state.clone(),
            state_name: record
                .state
                .as_deref()
                .and_then(region_name)
                .map(str::to_string),
            positive: record.positive,
            death: record.death,
            positive_increase: record.positive_increase,
            death_increase: record.death_increase,
            total_test_results: record.total_test_results,
            total_test_results_increase: record.total_test_results_increase,
            pos_percentage: Percentage::of(record.positive, record.total_test_results),
            death_percentage: Percentage::of(record.death, record.positive),
            hospitalized_currently: record.hospitalized_currently,
            in_icu_currently: record.in_icu_currently,
            on_ventilator_currently: record.on_ventilator_currently,
            pending: record.pending,
        }
    }
}

impl TableRow for TotalRow {
    fn field_names() -> &'static [&'static str] {
        &[
            "state",
            "stateName",
            "positive",
            "death",
            "positiveIncrease",
            "deathIncrease",
            "totalTestResults",
            "totalTestResultsIncrease",
            "posPercentage",
            "deathPercentage",
            "hospitalizedCurrently",
            "inIcuCurrently",
            "onVentilatorCurrently",
            "pending",
        ]
    }

    fn cell(&self, key: &str) -> Option<Cell> {
        let cell = match key {
            "state" => Cell::Text(self.state.clone()),
            "stateName" => Cell::Text(self.state_name.clone()),
            "positive" => Cell::Count(self.positive),
            "death" => Cell::Count(self.death),
            "positiveIncrease" => Cell::Count(self.positive_increase),
            "deathIncrease" => Cell::Count(self.death_increase),
            "totalTestResults" => Cell::Count(self.total_test_results),
            "totalTestResultsIncrease" => Cell::Count(self.total_test_results_increase),
            "posPercentage" => Cell::Percent(self.pos_percentage),
            "deathPercentage" => Cell::Percent(self.death_percentage),
            "hospitalizedCurrently" => Cell::Count(self.hospitalized_currently),
            "inIcuCurrently" => Cell::Count(self.in_icu_currently),
            "onVentilatorCurrently" => Cell::Count(self.on_ventilator_currently),
            "pending" => Cell::Count(self.pending),
            _ => return None,
        };
        Some(cell)
    }
}

// ============================================================================
// Time-series rows
// ============================================================================

/// One region on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRow {
    pub date: Option<String>,
    pub day: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub positive: Option<i64>,
    pub death: Option<i64>,
    pub positive_increase: Option<i64>,
    pub death_increase: Option<i64>,
    pub total_test_results: Option<i64>,
    pub total_test_results_increase: Option<i64>,
    pub pos_percentage: Percentage,
    pub death_percentage: Percentage,
    pub hospitalized_currently: Option<i64>,
    pub in_icu_currently: Option<i64>,
    pub on_ventilator_currently: Option<i64>,
    pub pending: Option<i64>,
}

impl StateRow {
    pub fn from_record(record: &RawRecord) -> Self {
        Self {
            date: record.timestamp.as_ref().map(format_date),
            day: record.timestamp.as_ref().map(weekday_name),
            state: record.state.clone(),
            country: record.country.clone(),
            positive: record.positive,
            death: record.death,
            positive_increase: record.positive_increase,
            death_increase: record.death_increase,
            total_test_results: record.total_test_results,
            total_test_results_increase: record.total_test_results_increase,
            pos_percentage: Percentage::of(record.positive, record.total_test_results),
            death_percentage: Percentage::of(record.death, record.positive),
            hospitalized_currently: record.hospitalized_currently,
            in_icu_currently: record.in_icu_currently,
            on_ventilator_currently: record.on_ventilator_currently,
            pending: record.pending,
        }
    }
}

impl TableRow for StateRow {
    fn field_names() -> &'static [&'static str] {
        &[
            "date",
            "day",
            "state",
            "country",
            "positive",
            "death",
            "positiveIncrease",
            "deathIncrease",
            "totalTestResults",
            "totalTestResultsIncrease",
            "posPercentage",
            "deathPercentage",
            "hospitalizedCurrently",
            "inIcuCurrently",
            "onVentilatorCurrently",
            "pending",
        ]
    }

    fn cell(&self, key: &str) -> Option<Cell> {
        let cell = match key {
            "date" => Cell::Date(self.date.clone()),
            "day" => Cell::Text(self.day.clone()),
            "state" => Cell::Text(self.state.clone()),
            "country" => Cell::Text(self.country.clone()),
            "positive" => Cell::Count(self.positive),
            "death" => Cell::Count(self.death),
            "positiveIncrease" => Cell::Count(self.positive_increase),
            "deathIncrease" => Cell::Count(self.death_increase),
            "totalTestResults" => Cell::Count(self.total_test_results),
            "totalTestResultsIncrease" => Cell::Count(self.total_test_results_increase),
            "posPercentage" => Cell::Percent(self.pos_percentage),
            "deathPercentage" => Cell::Percent(self.death_percentage),
            "hospitalizedCurrently" => Cell::Count(self.hospitalized_currently),
            "inIcuCurrently" => Cell::Count(self.in_icu_currently),
            "onVentilatorCurrently" => Cell::Count(self.on_ventilator_currently),
            "pending" => Cell::Count(self.pending),
            _ => return None,
        };
        Some(cell)
    }
}

// ============================================================================
// Row sets
// ============================================================================

/// The rows of one response, serialized as a plain array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DisplayRows {
    Total(Vec<TotalRow>),
    State(Vec<StateRow>),
}

impl DisplayRows {
    pub fn len(&self) -> usize {
        match self {
            DisplayRows::Total(rows) => rows.len(),
            DisplayRows::State(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sort_by(&mut self, key: &str, direction: SortDirection) {
        match self {
            DisplayRows::Total(rows) => sort_rows(rows, key, direction),
            DisplayRows::State(rows) => sort_rows(rows, key, direction),
        }
    }

    /// Cells for `keys`, one `Vec` per row.
    pub fn cells(&self, keys: &[&str]) -> Vec<Vec<Cell>> {
        fn collect<R: TableRow>(rows: &[R], keys: &[&str]) -> Vec<Vec<Cell>> {
            rows.iter()
                .map(|row| {
                    keys.iter()
                        .map(|key| row.cell(key).unwrap_or(Cell::Text(None)))
                        .collect()
                })
                .collect()
        }

        match self {
            DisplayRows::Total(rows) => collect(rows, keys),
            DisplayRows::State(rows) => collect(rows, keys),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(positive: Option<i64>, death: Option<i64>, total: Option<i64>) -> RawRecord {
        RawRecord {
            state: Some("CA".to_string()),
            country: Some("US".to_string()),
            timestamp: Some(Utc.with_ymd_and_hms(2020, 4, 20, 16, 0, 0).unwrap()),
            positive,
            death,
            total_test_results: total,
            ..Default::default()
        }
    }

    #[test]
    fn test_percentage_basic() {
        assert_eq!(Percentage::of(Some(50), Some(200)), Percentage::Value(25.0));
        assert_eq!(Percentage::of(Some(1), Some(3)), Percentage::Value(33.3));
        assert_eq!(Percentage::of(Some(2), Some(3)), Percentage::Value(66.7));
    }

    #[test]
    fn test_percentage_rounds_stored_value_not_scaled_value() {
        // 0.15, 0.95 and 1.15 are all stored just below the tie
        assert_eq!(Percentage::of(Some(3), Some(2000)), Percentage::Value(0.1));
        assert_eq!(Percentage::of(Some(19), Some(2000)), Percentage::Value(0.9));
        assert_eq!(Percentage::of(Some(23), Some(2000)), Percentage::Value(1.1));
    }

    #[test]
    fn test_percentage_exact_ties_round_away_from_zero() {
        assert_eq!(Percentage::of(Some(1), Some(400)), Percentage::Value(0.3));
        assert_eq!(Percentage::of(Some(3), Some(400)), Percentage::Value(0.8));
        assert_eq!(Percentage::of(Some(5), Some(400)), Percentage::Value(1.3));
        assert_eq!(Percentage::of(Some(-1), Some(400)), Percentage::Value(-0.3));
    }

    #[test]
    fn test_percentage_zero_denominator_is_not_applicable() {
        assert_eq!(Percentage::of(Some(10), Some(0)), Percentage::NotApplicable);
        assert_eq!(Percentage::of(Some(0), Some(0)), Percentage::NotApplicable);
        assert_eq!(Percentage::of(Some(10), None), Percentage::NotApplicable);
        assert_eq!(Percentage::of(None, Some(10)), Percentage::Value(0.0));
    }

    #[test]
    fn test_percentage_serialization() {
        assert_eq!(serde_json::to_string(&Percentage::Value(25.0)).unwrap(), "25.0");
        assert_eq!(serde_json::to_string(&Percentage::NotApplicable).unwrap(), "\"N/A\"");
        assert_eq!(
            serde_json::from_str::<Percentage>("\"N/A\"").unwrap(),
            Percentage::NotApplicable
        );
        assert_eq!(serde_json::from_str::<Percentage>("12.5").unwrap(), Percentage::Value(12.5));
        assert!(serde_json::from_str::<Percentage>("\"n/a\"").is_err());
    }

    #[test]
    fn test_total_row_mapping() {
        let row = TotalRow::from_record(&record(Some(50), Some(5), Some(200)));
        assert_eq!(row.state.as_deref(), Some("CA"));
        assert_eq!(row.state_name.as_deref(), Some("California"));
        assert_eq!(row.pos_percentage, Percentage::Value(25.0));
        assert_eq!(row.death_percentage, Percentage::Value(10.0));
    }

    #[test]
    fn test_total_row_unknown_region_has_no_name() {
        let mut raw = record(Some(1), Some(0), Some(1));
        raw.state = Some("XX".to_string());
        let row = TotalRow::from_record(&raw);
        assert_eq!(row.state_name, None);
    }

    #[test]
    fn test_not_applicable_when_denominators_zero() {
        let row = TotalRow::from_record(&record(Some(0), Some(0), Some(0)));
        assert_eq!(row.pos_percentage, Percentage::NotApplicable);
        assert_eq!(row.death_percentage, Percentage::NotApplicable);

        let row = StateRow::from_record(&record(Some(0), Some(0), Some(0)));
        assert_eq!(row.pos_percentage, Percentage::NotApplicable);
        assert_eq!(row.death_percentage, Percentage::NotApplicable);
    }

    #[test]
    fn test_state_row_mapping() {
        let row = StateRow::from_record(&record(Some(50), Some(1), Some(200)));
        assert_eq!(row.date.as_deref(), Some("04/20/2020"));
        assert_eq!(row.day.as_deref(), Some("Monday"));
        assert_eq!(row.country.as_deref(), Some("US"));
        assert_eq!(row.pos_percentage, Percentage::Value(25.0));
        assert_eq!(row.death_percentage, Percentage::Value(2.0));
    }

    #[test]
    fn test_field_names_match_serialized_keys() {
        let row = StateRow::from_record(&record(Some(1), Some(1), Some(1)));
        let value = serde_json::to_value(&row).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), StateRow::field_names().len());
        for key in StateRow::field_names() {
            assert!(object.contains_key(*key), "missing {}", key);
            assert!(row.cell(key).is_some());
        }

        let row = TotalRow::from_record(&record(Some(1), Some(1), Some(1)));
        let value = serde_json::to_value(&row).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), TotalRow::field_names().len());
        for key in TotalRow::field_names() {
            assert!(object.contains_key(*key), "missing {}", key);
            assert!(row.cell(key).is_some());
        }
    }

    #[test]
    fn test_sort_puts_not_applicable_last() {
        let mut rows = vec![
            TotalRow::from_record(&record(Some(10), None, Some(0))),
            TotalRow::from_record(&record(Some(10), None, Some(100))),
            TotalRow::from_record(&record(Some(50), None, Some(100))),
        ];

        sort_rows(&mut rows, "posPercentage", SortDirection::Desc);
        let pcts: Vec<String> = rows.iter().map(|r| r.pos_percentage.to_string()).collect();
        assert_eq!(pcts, vec!["50.0", "10.0", "N/A"]);

        sort_rows(&mut rows, "posPercentage", SortDirection::Asc);
        let pcts: Vec<String> = rows.iter().map(|r| r.pos_percentage.to_string()).collect();
        assert_eq!(pcts, vec!["10.0", "50.0", "N/A"]);
    }

    #[test]
    fn test_sort_by_date_is_chronological() {
        let mut early = record(Some(1), None, Some(1));
        early.timestamp = Some(Utc.with_ymd_and_hms(2019, 12, 31, 0, 0, 0).unwrap());
        let late = record(Some(1), None, Some(1));

        let mut rows = vec![StateRow::from_record(&late), StateRow::from_record(&early)];
        sort_rows(&mut rows, "date", SortDirection::Asc);
        assert_eq!(rows[0].date.as_deref(), Some("12/31/2019"));
    }

    #[test]
    fn test_sort_unknown_key_is_noop() {
        let mut rows = vec![
            TotalRow::from_record(&record(Some(1), None, Some(1))),
            TotalRow::from_record(&record(Some(2), None, Some(1))),
        ];
        let before = rows.clone();
        sort_rows(&mut rows, "bogus", SortDirection::Asc);
        assert_eq!(rows, before);
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Count(None).to_string(), "-");
        assert_eq!(Cell::Count(Some(42)).to_string(), "42");
        assert_eq!(Cell::Percent(Percentage::Value(3.0)).to_string(), "3.0");
        assert_eq!(Cell::Percent(Percentage::NotApplicable).to_string(), "N/A");
    }
}
