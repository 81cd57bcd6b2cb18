use crate::table::Table;
use anyhow::Result;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

/// A named, closed date interval. Periods are caller-defined, fixed and
/// non-overlapping; the segmenter does not enforce non-overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(label: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// The dashboard's fixed reporting periods.
pub static DEFAULT_PERIODS: Lazy<Vec<Period>> = Lazy::new(|| {
    vec![
        Period::new("2014-2016", ymd(2014, 1, 1), ymd(2016, 12, 31)),
        Period::new("2017-2019", ymd(2017, 1, 1), ymd(2019, 12, 31)),
        Period::new("2020-2021", ymd(2020, 1, 1), ymd(2021, 12, 31)),
        Period::new("2022-2024", ymd(2022, 1, 1), ymd(2024, 12, 31)),
    ]
});

/// One period's slice of the source table.
#[derive(Debug)]
pub struct PeriodSlice {
    pub period: Period,
    pub table: Table,
}

/// Slice `table` into one sub-table per period, ordered by period start. A
/// row lands in a period when its temporal value lies in `[start, end]`
/// inclusive. Rows without a usable date are excluded from every period, as
/// are rows outside all periods.
pub fn segment_by_period(
    table: &Table,
    date_col: &str,
    periods: &[Period],
) -> Result<Vec<PeriodSlice>> {
    let idx = table.require_column(date_col)?;

    let mut ordered: Vec<Period> = periods.to_vec();
    ordered.sort_by_key(|p| p.start);

    let undated = table
        .rows
        .iter()
        .filter(|row| row[idx].as_date().is_none())
        .count();
    if undated > 0 {
        warn!(
            table = %table.name,
            undated,
            "rows without a usable date are excluded from every period"
        );
    }

    let slices = ordered
        .into_iter()
        .map(|period| {
            let sub = table.filter(|row| row[idx].as_date().map_or(false, |d| period.contains(d)));
            debug!(period = %period.label, rows = sub.len(), table = %table.name, "segmented");
            PeriodSlice { period, table: sub }
        })
        .collect();
    Ok(slices)
}
