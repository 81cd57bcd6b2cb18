use crate::table::{Table, Value};
use chrono::{DateTime, Duration, NaiveDate};
use duckdb::types::Value as DbValue;
use duckdb::{params, Connection};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Tables the dashboard expects in the source database. These names, and the
/// column names below, are a contract with the database schema, not
/// configuration.
pub const OCCUPATION_TABLE: &str = "unemployment_rate_by_occupation_long";
pub const QUALIFICATION_TABLE: &str = "unemployed_by_qualification_sex_long";

pub const COL_YEAR: &str = "year";
pub const COL_OCCUPATION: &str = "occupation";
pub const COL_RATE: &str = "unemployed_rate";
pub const COL_GENDER: &str = "gender";
pub const COL_EDUCATION: &str = "education";
pub const COL_COUNT: &str = "unemployed_count";

const LONG_SUFFIX: &str = "long";
const WIDE_SUFFIX: &str = "wide";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database unreachable at `{path}`: {source}")]
    Connection {
        path: String,
        #[source]
        source: duckdb::Error,
    },
    #[error("table `{0}` does not exist in the database")]
    MissingTable(String),
    #[error(transparent)]
    Query(#[from] duckdb::Error),
}

/// Database table names partitioned by layout suffix: `...long` holds one
/// row per (entity, time) observation, `...wide` one row per entity.
#[derive(Debug, Default)]
pub struct TableCatalog {
    pub long: Vec<String>,
    pub wide: Vec<String>,
}

/// Open the database. The connection is acquired once at startup and held
/// for the process lifetime; there is no pooling and no retry.
pub fn connect(connection_string: &str) -> Result<Connection, DbError> {
    let result = if connection_string == ":memory:" {
        Connection::open_in_memory()
    } else {
        Connection::open(connection_string)
    };
    result.map_err(|source| DbError::Connection {
        path: connection_string.to_string(),
        source,
    })
}

/// All table names in the `main` schema, sorted.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'main' ORDER BY table_name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Partition the database's tables by the `long`/`wide` naming convention.
/// Tables following neither convention are skipped.
pub fn discover_tables(conn: &Connection) -> Result<TableCatalog, DbError> {
    let mut catalog = TableCatalog::default();
    for name in list_tables(conn)? {
        if name.ends_with(LONG_SUFFIX) {
            catalog.long.push(name);
        } else if name.ends_with(WIDE_SUFFIX) {
            catalog.wide.push(name);
        } else {
            debug!(table = %name, "table follows neither naming convention; skipped");
        }
    }
    Ok(catalog)
}

fn table_columns(conn: &Connection, name: &str) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT column_name FROM information_schema.columns \
         WHERE table_schema = 'main' AND table_name = ? ORDER BY ordinal_position",
    )?;
    let columns = stmt
        .query_map(params![name], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Materialize every row and column of `name` into an in-memory [`Table`].
/// Column order follows the schema's ordinal positions.
#[instrument(level = "info", skip_all, fields(table = %name))]
pub fn read_table(conn: &Connection, name: &str) -> Result<Table, DbError> {
    let columns = table_columns(conn, name)?;
    if columns.is_empty() {
        return Err(DbError::MissingTable(name.to_string()));
    }

    let column_list = columns
        .iter()
        .map(|c| format!("\"{}\"", c.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {} FROM \"{}\"",
        column_list,
        name.replace('"', "\"\"")
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut table = Table::new(name, columns);
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(table.columns.len());
        for idx in 0..table.columns.len() {
            let value: DbValue = row.get(idx)?;
            cells.push(convert_value(value));
        }
        table.rows.push(cells);
    }
    info!(table = %table.name, rows = table.len(), "loaded table");
    Ok(table)
}

/// Load every catalogued table, keyed by name. Long and wide tables land in
/// separate maps, mirroring their distinct layouts.
pub fn load_catalog(
    conn: &Connection,
    catalog: &TableCatalog,
) -> Result<(BTreeMap<String, Table>, BTreeMap<String, Table>), DbError> {
    let mut long = BTreeMap::new();
    for name in &catalog.long {
        long.insert(name.clone(), read_table(conn, name)?);
    }
    let mut wide = BTreeMap::new();
    for name in &catalog.wide {
        wide.insert(name.clone(), read_table(conn, name)?);
    }
    Ok((long, wide))
}

/// Collapse DuckDB's value zoo onto the pipeline's [`Value`]: integer widths
/// to `Int`, decimals to `Float`, DATE/TIMESTAMP to `Date`. Nested and other
/// exotic types are not part of the schema contract and become `Null`.
fn convert_value(value: DbValue) -> Value {
    match value {
        DbValue::Null => Value::Null,
        DbValue::Boolean(b) => Value::Int(b as i64),
        DbValue::TinyInt(v) => Value::Int(v as i64),
        DbValue::SmallInt(v) => Value::Int(v as i64),
        DbValue::Int(v) => Value::Int(v as i64),
        DbValue::BigInt(v) => Value::Int(v),
        DbValue::HugeInt(v) => Value::Int(v as i64),
        DbValue::UTinyInt(v) => Value::Int(v as i64),
        DbValue::USmallInt(v) => Value::Int(v as i64),
        DbValue::UInt(v) => Value::Int(v as i64),
        DbValue::UBigInt(v) => Value::Int(v as i64),
        DbValue::Float(v) => Value::Float(v as f64),
        DbValue::Double(v) => Value::Float(v),
        DbValue::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::Null),
        DbValue::Text(s) => Value::Text(s),
        DbValue::Enum(s) => Value::Text(s),
        DbValue::Date32(days) => Value::Date(epoch_date() + Duration::days(days as i64)),
        DbValue::Timestamp(unit, raw) => timestamp_to_date(unit, raw),
        other => {
            debug!(?other, "unsupported database value; treated as NULL");
            Value::Null
        }
    }
}

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

fn timestamp_to_date(unit: duckdb::types::TimeUnit, raw: i64) -> Value {
    use duckdb::types::TimeUnit;
    let micros = match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    match DateTime::from_timestamp_micros(micros) {
        Some(ts) => Value::Date(ts.date_naive()),
        None => Value::Null,
    }
}
