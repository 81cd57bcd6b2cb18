use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::warn;

/// A single cell. Integer widths collapse to `Int`, decimals to `Float`;
/// anything the pipeline cannot use becomes `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// A named in-memory table: column names plus row-major cells. Loaded once
/// per run. Every reshaping operation returns a new `Table` rather than
/// mutating in place, since the same source table feeds several views.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Index of `column`, or an error naming the table. Expected columns are
    /// a contract with the database schema, so a miss is fatal at startup.
    pub fn require_column(&self, column: &str) -> Result<usize> {
        match self.column_index(column) {
            Some(idx) => Ok(idx),
            None => bail!("table `{}` has no column `{}`", self.name, column),
        }
    }

    /// New table holding the rows that satisfy `keep`, same columns.
    pub fn filter(&self, keep: impl Fn(&[Value]) -> bool) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keep(row.as_slice()))
                .cloned()
                .collect(),
        }
    }

    /// Distinct text values of `column`, sorted lexicographically for a
    /// deterministic layout.
    pub fn distinct_text(&self, column: &str) -> Result<Vec<String>> {
        let idx = self.require_column(column)?;
        let set: BTreeSet<String> = self
            .rows
            .iter()
            .filter_map(|row| row[idx].as_str().map(str::to_string))
            .collect();
        Ok(set.into_iter().collect())
    }

    /// New table with `column` coerced to `Value::Date`. Values that cannot
    /// be parsed become `Null` and drop out of every time-based view; the
    /// count is logged rather than silently discarded.
    pub fn coerce_dates(&self, column: &str) -> Result<Table> {
        let idx = self.require_column(column)?;
        let mut unparseable = 0usize;
        let rows: Vec<Vec<Value>> = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row[idx] = match parse_temporal(&row[idx]) {
                    Some(date) => Value::Date(date),
                    None => {
                        if !row[idx].is_null() {
                            unparseable += 1;
                        }
                        Value::Null
                    }
                };
                row
            })
            .collect();
        if unparseable > 0 {
            warn!(
                table = %self.name,
                column,
                unparseable,
                "temporal values could not be parsed; affected rows drop out of time-based views"
            );
        }
        Ok(Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows,
        })
    }
}

/// Parse a cell into a calendar date. Bare years (the layout of the source
/// tables) resolve to January 1st, month strings to the 1st of the month.
fn parse_temporal(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::Int(y) => year_to_date(*y),
        Value::Float(f) if f.fract() == 0.0 => year_to_date(*f as i64),
        Value::Text(s) => parse_temporal_str(s),
        _ => None,
    }
}

fn year_to_date(year: i64) -> Option<NaiveDate> {
    if (1000..=9999).contains(&year) {
        NaiveDate::from_ymd_opt(year as i32, 1, 1)
    } else {
        None
    }
}

fn parse_temporal_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    // "YYYY-MM" resolves to the first of the month
    if let Some((year, month)) = s.split_once('-') {
        if let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>()) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
                return Some(date);
            }
        }
    }
    // bare "YYYY"
    s.parse::<i64>().ok().and_then(year_to_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_year_cells_in_all_layouts() {
        assert_eq!(parse_temporal(&Value::Int(2014)), Some(day(2014, 1, 1)));
        assert_eq!(parse_temporal(&Value::Float(2014.0)), Some(day(2014, 1, 1)));
        assert_eq!(
            parse_temporal(&Value::Text("2014".into())),
            Some(day(2014, 1, 1))
        );
        assert_eq!(
            parse_temporal(&Value::Text("2014-05".into())),
            Some(day(2014, 5, 1))
        );
        assert_eq!(
            parse_temporal(&Value::Text("2014-05-03".into())),
            Some(day(2014, 5, 3))
        );
        assert_eq!(
            parse_temporal(&Value::Text("2014/05/03".into())),
            Some(day(2014, 5, 3))
        );
        assert_eq!(parse_temporal(&Value::Text("not a year".into())), None);
        assert_eq!(parse_temporal(&Value::Null), None);
    }

    #[test]
    fn coerce_dates_nulls_unparseable_rows_and_keeps_the_source() -> Result<()> {
        let mut table = Table::new("t", vec!["year".into(), "v".into()]);
        table.rows.push(vec![Value::Int(2015), Value::Float(1.0)]);
        table
            .rows
            .push(vec![Value::Text("bogus".into()), Value::Float(2.0)]);
        table.rows.push(vec![Value::Null, Value::Float(3.0)]);

        let coerced = table.coerce_dates("year")?;
        assert_eq!(coerced.rows[0][0], Value::Date(day(2015, 1, 1)));
        assert_eq!(coerced.rows[1][0], Value::Null);
        assert_eq!(coerced.rows[2][0], Value::Null);
        // the source table is untouched
        assert_eq!(table.rows[1][0], Value::Text("bogus".into()));
        Ok(())
    }

    #[test]
    fn require_column_names_the_table() {
        let table = Table::new("jobs", vec!["year".into()]);
        let err = table.require_column("occupation").unwrap_err();
        assert!(err.to_string().contains("jobs"));
        assert!(err.to_string().contains("occupation"));
    }

    #[test]
    fn distinct_text_is_sorted() -> Result<()> {
        let mut table = Table::new("t", vec!["g".into()]);
        for g in ["b", "a", "b", "c"] {
            table.rows.push(vec![Value::Text(g.into())]);
        }
        assert_eq!(table.distinct_text("g")?, vec!["a", "b", "c"]);
        Ok(())
    }

    #[test]
    fn filter_returns_a_new_table() {
        let mut table = Table::new("t", vec!["v".into()]);
        table.rows.push(vec![Value::Float(1.0)]);
        table.rows.push(vec![Value::Float(2.0)]);
        let kept = table.filter(|row| row[0].as_f64().map_or(false, |v| v > 1.5));
        assert_eq!(kept.len(), 1);
        assert_eq!(table.len(), 2);
    }
}
