use super::periods::PeriodSlice;
use crate::table::Table;
use anyhow::{ensure, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::debug;

/// One observation on a plotted series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// The points for one (group, period) pair, sorted by date. May be empty;
/// the chart layer tolerates zero-length series.
#[derive(Debug, Clone)]
pub struct Series {
    pub period: String,
    pub points: Vec<SeriesPoint>,
}

/// One grid cell: a group and its per-period series.
#[derive(Debug, Clone)]
pub struct Panel {
    pub group: String,
    pub series: Vec<Series>,
}

/// Panels arranged row-major into a fixed-column grid. The last row may be
/// partially filled; cells past `panels.len()` are hidden by the chart layer.
#[derive(Debug, Clone)]
pub struct FacetGrid {
    pub panels: Vec<Panel>,
    pub ncols: usize,
    pub nrows: usize,
}

/// Build one panel per distinct value of `group_col` (sorted
/// lexicographically for a deterministic layout), with one series per
/// (group, period) pair.
pub fn facet_by_group(
    slices: &[PeriodSlice],
    group_col: &str,
    date_col: &str,
    value_col: &str,
    ncols: usize,
) -> Result<FacetGrid> {
    ensure!(ncols > 0, "facet grid needs at least one column");

    let mut groups: BTreeSet<String> = BTreeSet::new();
    for slice in slices {
        groups.extend(slice.table.distinct_text(group_col)?);
    }

    let mut panels = Vec::with_capacity(groups.len());
    for group in groups {
        let mut series = Vec::with_capacity(slices.len());
        for slice in slices {
            series.push(series_for(
                &slice.table,
                &group,
                group_col,
                date_col,
                value_col,
                &slice.period.label,
            )?);
        }
        panels.push(Panel { group, series });
    }

    let nrows = (panels.len() + ncols - 1) / ncols;
    debug!(panels = panels.len(), ncols, nrows, "faceted");
    Ok(FacetGrid {
        panels,
        ncols,
        nrows,
    })
}

fn series_for(
    table: &Table,
    group: &str,
    group_col: &str,
    date_col: &str,
    value_col: &str,
    period: &str,
) -> Result<Series> {
    let gi = table.require_column(group_col)?;
    let di = table.require_column(date_col)?;
    let vi = table.require_column(value_col)?;

    let mut points: Vec<SeriesPoint> = table
        .rows
        .iter()
        .filter(|row| row[gi].as_str() == Some(group))
        .filter_map(|row| {
            let date = row[di].as_date()?;
            let value = row[vi].as_f64()?;
            Some(SeriesPoint { date, value })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    Ok(Series {
        period: period.to_string(),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::periods::{segment_by_period, Period};
    use crate::table::Value;
    use anyhow::Result;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slices() -> Result<Vec<PeriodSlice>> {
        let mut table = Table::new(
            "rates_long",
            vec![
                "year".into(),
                "occupation".into(),
                "unemployed_rate".into(),
            ],
        );
        let rows = [
            (2014, "Professionals", 2.9),
            (2015, "Professionals", 3.0),
            (2015, "Cleaners", 4.8),
            (2020, "Professionals", 4.1),
        ];
        for (year, group, value) in rows {
            table.rows.push(vec![
                Value::Date(day(year, 6, 30)),
                Value::Text(group.into()),
                Value::Float(value),
            ]);
        }
        let periods = vec![
            Period::new("2014-2016", day(2014, 1, 1), day(2016, 12, 31)),
            Period::new("2020-2021", day(2020, 1, 1), day(2021, 12, 31)),
        ];
        segment_by_period(&table, "year", &periods)
    }

    #[test]
    fn groups_are_sorted_and_series_align_with_periods() -> Result<()> {
        let grid = facet_by_group(&slices()?, "occupation", "year", "unemployed_rate", 4)?;
        assert_eq!(grid.panels.len(), 2);
        assert_eq!(grid.panels[0].group, "Cleaners");
        assert_eq!(grid.panels[1].group, "Professionals");

        let cleaners = &grid.panels[0];
        assert_eq!(cleaners.series[0].points.len(), 1);
        // a period with no rows for the group yields an empty series, not an error
        assert!(cleaners.series[1].points.is_empty());

        let professionals = &grid.panels[1];
        assert_eq!(professionals.series[0].points.len(), 2);
        assert_eq!(professionals.series[1].points.len(), 1);
        Ok(())
    }

    #[test]
    fn grid_dimensions_round_up() -> Result<()> {
        // 9 groups in 4 columns, as on the occupation page
        let mut table = Table::new("t", vec!["year".into(), "g".into(), "v".into()]);
        for i in 0..9 {
            table.rows.push(vec![
                Value::Date(day(2014, 1, 1)),
                Value::Text(format!("g{}", i)),
                Value::Float(i as f64),
            ]);
        }
        let periods = vec![Period::new("2014-2016", day(2014, 1, 1), day(2016, 12, 31))];
        let slices = segment_by_period(&table, "year", &periods)?;
        let grid = facet_by_group(&slices, "g", "year", "v", 4)?;
        assert_eq!(grid.panels.len(), 9);
        assert_eq!(grid.nrows, 3);
        Ok(())
    }

    #[test]
    fn points_sort_by_date_within_a_series() -> Result<()> {
        let mut table = Table::new("t", vec!["year".into(), "g".into(), "v".into()]);
        table.rows.push(vec![
            Value::Date(day(2015, 1, 1)),
            Value::Text("a".into()),
            Value::Float(2.0),
        ]);
        table.rows.push(vec![
            Value::Date(day(2014, 1, 1)),
            Value::Text("a".into()),
            Value::Float(1.0),
        ]);
        let periods = vec![Period::new("2014-2016", day(2014, 1, 1), day(2016, 12, 31))];
        let slices = segment_by_period(&table, "year", &periods)?;
        let grid = facet_by_group(&slices, "g", "year", "v", 2)?;
        let points = &grid.panels[0].series[0].points;
        assert_eq!(points[0].value, 1.0);
        assert_eq!(points[1].value, 2.0);
        Ok(())
    }
}
