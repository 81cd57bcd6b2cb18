use anyhow::{Context, Result};
use labourdash::{
    chart,
    config::Config,
    db::{self, COL_COUNT, COL_EDUCATION, COL_GENDER, COL_OCCUPATION, COL_RATE, COL_YEAR},
    process::{
        cumulative_frames, facet_by_group, resample_monthly, segment_by_period, DEFAULT_PERIODS,
    },
    table::Table,
};
use std::{collections::BTreeMap, env, fs, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Occupation panels render four to a row, as on the dashboard page.
const FACET_COLUMNS: usize = 4;

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) config + output dir ──────────────────────────────────────
    let config = Config::load()?;
    let out_dir = PathBuf::from(env::var("CHARTS_DIR").unwrap_or_else(|_| "charts".into()));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory `{}`", out_dir.display()))?;

    // ─── 3) connect + discover tables ────────────────────────────────
    let conn = db::connect(&config.connection_string)?;
    let catalog = db::discover_tables(&conn)?;
    info!(
        long = catalog.long.len(),
        wide = catalog.wide.len(),
        "discovered tables"
    );

    // ─── 4) load everything up front ─────────────────────────────────
    let (long_tables, wide_tables) = db::load_catalog(&conn, &catalog)?;
    for table in wide_tables.values() {
        info!(table = %table.name, rows = table.len(), cols = table.columns.len(), "wide table ready");
    }
    // every long table carries a `year` column; coerce it once so all
    // downstream views agree on what counts as a date
    let mut dated: BTreeMap<String, Table> = BTreeMap::new();
    for (name, table) in &long_tables {
        dated.insert(name.clone(), table.coerce_dates(COL_YEAR)?);
    }

    // ─── 5) occupation view: period-segmented facet grid ─────────────
    let occupation = dated.get(db::OCCUPATION_TABLE).with_context(|| {
        format!(
            "expected table `{}` is missing from the database",
            db::OCCUPATION_TABLE
        )
    })?;
    let slices = segment_by_period(occupation, COL_YEAR, &DEFAULT_PERIODS)?;
    let grid = facet_by_group(&slices, COL_OCCUPATION, COL_YEAR, COL_RATE, FACET_COLUMNS)?;
    let figure = chart::faceted_line_figure(
        &grid,
        "Unemployment rate by occupation",
        "Unemployment rate (%)",
    );
    chart::write_json(&figure, &out_dir.join("unemployment_by_occupation.json"))?;
    chart::write_html(
        &figure,
        "Unemployment rate by occupation",
        &out_dir.join("unemployment_by_occupation.html"),
    )?;

    // ─── 6) qualification view: animated cumulative reveal ───────────
    let qualification = dated.get(db::QUALIFICATION_TABLE).with_context(|| {
        format!(
            "expected table `{}` is missing from the database",
            db::QUALIFICATION_TABLE
        )
    })?;
    let series = resample_monthly(
        qualification,
        COL_YEAR,
        (COL_GENDER, COL_EDUCATION),
        COL_COUNT,
    )?;
    let animation = cumulative_frames(&series);
    info!(
        frames = animation.frames.len(),
        rows = animation.rows.len(),
        "animation table built"
    );
    let figure = chart::animated_line_figure(
        &animation,
        "Unemployed persons by qualification and sex",
        "Unemployed persons",
    );
    chart::write_json(&figure, &out_dir.join("unemployed_by_qualification.json"))?;
    chart::write_html(
        &figure,
        "Unemployed persons by qualification and sex",
        &out_dir.join("unemployed_by_qualification.html"),
    )?;

    info!("all done");
    Ok(())
}
