//! Labour-statistics dashboard pipeline: load tables from a DuckDB database,
//! reshape them into period-segmented, faceted and animation-ready
//! structures, and emit Plotly figure payloads for the browser.

pub mod chart;
pub mod config;
pub mod db;
pub mod process;
pub mod table;
