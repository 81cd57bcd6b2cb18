use crate::table::Table;
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use tracing::{instrument, warn};

/// The categorical pair a resampled series is keyed by, e.g. gender ×
/// education.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupKey {
    pub primary: String,
    pub secondary: String,
}

/// One month-end observation on the regular grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledPoint {
    pub month: NaiveDate,
    pub value: f64,
}

/// A group's measure resampled onto month-end boundaries, gap-filled by
/// linear interpolation. Never extends past the group's first or last
/// observed month.
#[derive(Debug, Clone)]
pub struct ResampledSeries {
    pub key: GroupKey,
    pub points: Vec<ResampledPoint>,
}

/// One row of the animation table. Filtering the rows by a frame label
/// yields the complete cumulative state for that animation step.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub frame: String,
    pub month: NaiveDate,
    pub primary: String,
    pub secondary: String,
    pub value: f64,
}

/// Concatenated cumulative frames, labels in strictly increasing order.
#[derive(Debug, Clone, Default)]
pub struct AnimationTable {
    pub frames: Vec<String>,
    pub rows: Vec<FrameRow>,
}

impl AnimationTable {
    pub fn rows_for<'a>(&'a self, frame: &'a str) -> impl Iterator<Item = &'a FrameRow> + 'a {
        self.rows.iter().filter(move |row| row.frame == frame)
    }
}

/// A date's position on the monthly grid.
fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

/// The last calendar day of the month at grid position `index`.
fn month_end(index: i32) -> NaiveDate {
    let next = index + 1;
    let year = next.div_euclid(12);
    let month0 = next.rem_euclid(12) as u32;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1)
        .unwrap()
        .pred_opt()
        .unwrap()
}

fn frame_label(index: i32) -> String {
    let year = index.div_euclid(12);
    let month0 = index.rem_euclid(12) as u32;
    format!("{:04}-{:02}", year, month0 + 1)
}

/// Resample `value_col` onto month-end boundaries per `(key_a, key_b)`
/// group. Observations within a month average; gaps between known months
/// fill by linear interpolation on the month index; nothing extrapolates
/// past the first or last known month. A group with a single observation
/// yields that single point.
#[instrument(level = "info", skip(table), fields(table = %table.name))]
pub fn resample_monthly(
    table: &Table,
    date_col: &str,
    key_cols: (&str, &str),
    value_col: &str,
) -> Result<Vec<ResampledSeries>> {
    let di = table.require_column(date_col)?;
    let ai = table.require_column(key_cols.0)?;
    let bi = table.require_column(key_cols.1)?;
    let vi = table.require_column(value_col)?;

    // (group, month index) -> (sum, observation count)
    let mut buckets: BTreeMap<GroupKey, BTreeMap<i32, (f64, u32)>> = BTreeMap::new();
    let mut skipped = 0usize;
    for row in &table.rows {
        let (date, primary, secondary, value) = match (
            row[di].as_date(),
            row[ai].as_str(),
            row[bi].as_str(),
            row[vi].as_f64(),
        ) {
            (Some(d), Some(a), Some(b), Some(v)) => (d, a, b, v),
            _ => {
                skipped += 1;
                continue;
            }
        };
        let key = GroupKey {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
        };
        let slot = buckets
            .entry(key)
            .or_default()
            .entry(month_index(date))
            .or_insert((0.0, 0));
        slot.0 += value;
        slot.1 += 1;
    }
    if skipped > 0 {
        warn!(
            table = %table.name,
            skipped,
            "rows with a missing date, key or measure were left out of resampling"
        );
    }

    let mut series = Vec::with_capacity(buckets.len());
    for (key, months) in buckets {
        let known: Vec<(i32, f64)> = months
            .into_iter()
            .map(|(index, (sum, count))| (index, sum / count as f64))
            .collect();

        let mut points = Vec::new();
        for (pos, &(index, value)) in known.iter().enumerate() {
            points.push(ResampledPoint {
                month: month_end(index),
                value,
            });
            if let Some(&(next_index, next_value)) = known.get(pos + 1) {
                for gap in (index + 1)..next_index {
                    let t = (gap - index) as f64 / (next_index - index) as f64;
                    points.push(ResampledPoint {
                        month: month_end(gap),
                        value: value + (next_value - value) * t,
                    });
                }
            }
        }
        series.push(ResampledSeries { key, points });
    }
    Ok(series)
}

/// Build the cumulative animation table: one `YYYY-MM` label per month
/// across the union of all resampled ranges; each frame carries every point
/// with month ≤ the frame's month. Frame N's rows are therefore a superset
/// of frame N-1's for every group, which is what drives the reveal
/// animation.
pub fn cumulative_frames(series: &[ResampledSeries]) -> AnimationTable {
    let first = series
        .iter()
        .filter_map(|s| s.points.first())
        .map(|p| month_index(p.month))
        .min();
    let last = series
        .iter()
        .filter_map(|s| s.points.last())
        .map(|p| month_index(p.month))
        .max();
    let (Some(first), Some(last)) = (first, last) else {
        return AnimationTable::default();
    };

    let mut table = AnimationTable::default();
    for index in first..=last {
        let label = frame_label(index);
        for s in series {
            for point in &s.points {
                if month_index(point.month) > index {
                    break;
                }
                table.rows.push(FrameRow {
                    frame: label.clone(),
                    month: point.month,
                    primary: s.key.primary.clone(),
                    secondary: s.key.secondary.clone(),
                    value: point.value,
                });
            }
        }
        table.frames.push(label);
    }
    table
}
