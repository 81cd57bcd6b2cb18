//! Figure assembly for the browser-side renderer. The renderer itself is
//! Plotly running in the page; this module produces the figure payloads it
//! consumes.

mod html;

pub use html::{write_html, write_json};

use crate::process::facet::FacetGrid;
use crate::process::resample::AnimationTable;
use serde_json::{json, Map, Value as Json};
use std::collections::BTreeSet;

/// Figure for the period-segmented facet grid: one subplot per group, one
/// line per (group, period). Legend entries appear once, on the first panel;
/// grid cells past the last panel get their axes hidden.
pub fn faceted_line_figure(grid: &FacetGrid, title: &str, y_label: &str) -> Json {
    let mut layout = Map::new();
    layout.insert("title".into(), json!({ "text": title }));
    layout.insert(
        "grid".into(),
        json!({
            "rows": grid.nrows.max(1),
            "columns": grid.ncols,
            "pattern": "independent",
        }),
    );
    layout.insert("showlegend".into(), json!(true));
    layout.insert("legend".into(), json!({ "title": { "text": "Period" } }));

    let mut traces = Vec::new();
    let mut annotations = Vec::new();
    for (i, panel) in grid.panels.iter().enumerate() {
        let axis = i + 1;
        for series in &panel.series {
            traces.push(json!({
                "type": "scatter",
                "mode": "lines+markers",
                "name": series.period,
                "legendgroup": series.period,
                "showlegend": i == 0,
                "x": series.points.iter()
                    .map(|p| p.date.format("%Y-%m-%d").to_string())
                    .collect::<Vec<_>>(),
                "y": series.points.iter().map(|p| p.value).collect::<Vec<_>>(),
                "xaxis": format!("x{}", axis),
                "yaxis": format!("y{}", axis),
            }));
        }
        annotations.push(json!({
            "text": panel.group,
            "xref": format!("x{} domain", axis),
            "yref": format!("y{} domain", axis),
            "x": 0.5,
            "y": 1.08,
            "showarrow": false,
            "font": { "size": 12 },
        }));
        layout.insert(axis_key("xaxis", axis), json!({ "title": { "text": "Year" } }));
        layout.insert(axis_key("yaxis", axis), json!({ "title": { "text": y_label } }));
    }

    // cells in the last row with no panel stay blank
    for i in grid.panels.len()..grid.nrows * grid.ncols {
        let axis = i + 1;
        layout.insert(axis_key("xaxis", axis), json!({ "visible": false }));
        layout.insert(axis_key("yaxis", axis), json!({ "visible": false }));
    }
    layout.insert("annotations".into(), Json::Array(annotations));

    json!({ "data": traces, "layout": layout })
}

/// Plotly names the first axis pair `xaxis`/`yaxis`, not `xaxis1`/`yaxis1`.
fn axis_key(prefix: &str, axis: usize) -> String {
    if axis == 1 {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, axis)
    }
}

/// Figure for the cumulative-reveal animation. Each frame redraws every
/// (primary, secondary) trace with all points up to the frame's month; axis
/// ranges are fixed up front so the reveal plays over a stable viewport.
pub fn animated_line_figure(anim: &AnimationTable, title: &str, y_label: &str) -> Json {
    let pairs: Vec<(String, String)> = anim
        .rows
        .iter()
        .map(|row| (row.primary.clone(), row.secondary.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let frames: Vec<Json> = anim
        .frames
        .iter()
        .map(|label| json!({ "name": label, "data": frame_traces(anim, label, &pairs) }))
        .collect();

    let initial = anim
        .frames
        .first()
        .map(|label| frame_traces(anim, label, &pairs))
        .unwrap_or_default();

    let steps: Vec<Json> = anim
        .frames
        .iter()
        .map(|label| {
            json!({
                "label": label,
                "method": "animate",
                "args": [[label], {
                    "mode": "immediate",
                    "frame": { "duration": 0, "redraw": false },
                    "transition": { "duration": 0 },
                }],
            })
        })
        .collect();

    let (x_range, y_range) = axis_ranges(anim);

    json!({
        "data": initial,
        "layout": {
            "title": { "text": title },
            "xaxis": { "title": { "text": "Month" }, "range": x_range },
            "yaxis": { "title": { "text": y_label }, "range": y_range },
            "updatemenus": [{
                "type": "buttons",
                "showactive": false,
                "x": 0.05,
                "y": 1.12,
                "xanchor": "left",
                "yanchor": "top",
                "buttons": [
                    {
                        "label": "Play",
                        "method": "animate",
                        "args": [Json::Null, {
                            "fromcurrent": true,
                            "frame": { "duration": 120, "redraw": false },
                            "transition": { "duration": 0 },
                        }],
                    },
                    {
                        "label": "Pause",
                        "method": "animate",
                        "args": [[Json::Null], {
                            "mode": "immediate",
                            "frame": { "duration": 0, "redraw": false },
                        }],
                    },
                ],
            }],
            "sliders": [{
                "active": 0,
                "currentvalue": { "prefix": "Month: " },
                "steps": steps,
            }],
        },
        "frames": frames,
    })
}

fn frame_traces(anim: &AnimationTable, label: &str, pairs: &[(String, String)]) -> Vec<Json> {
    pairs
        .iter()
        .map(|(primary, secondary)| {
            let mut x = Vec::new();
            let mut y = Vec::new();
            for row in anim.rows_for(label) {
                if row.primary == *primary && row.secondary == *secondary {
                    x.push(row.month.format("%Y-%m-%d").to_string());
                    y.push(row.value);
                }
            }
            json!({
                "type": "scatter",
                "mode": "lines",
                "name": format!("{} ({})", secondary, primary),
                "x": x,
                "y": y,
            })
        })
        .collect()
}

fn axis_ranges(anim: &AnimationTable) -> (Json, Json) {
    let min = anim.rows.iter().map(|row| row.month).min();
    let max = anim.rows.iter().map(|row| row.month).max();
    let top = anim
        .rows
        .iter()
        .map(|row| row.value)
        .fold(f64::NEG_INFINITY, f64::max);
    match (min, max) {
        (Some(min), Some(max)) if top.is_finite() => (
            json!([
                min.format("%Y-%m-%d").to_string(),
                max.format("%Y-%m-%d").to_string()
            ]),
            json!([0.0, top * 1.05]),
        ),
        _ => (Json::Null, Json::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::facet::{FacetGrid, Panel, Series, SeriesPoint};
    use crate::process::resample::{cumulative_frames, GroupKey, ResampledPoint, ResampledSeries};
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn grid() -> FacetGrid {
        let point = SeriesPoint {
            date: day(2014, 6, 30),
            value: 3.0,
        };
        let panel = |group: &str| Panel {
            group: group.into(),
            series: vec![
                Series {
                    period: "2014-2016".into(),
                    points: vec![point.clone()],
                },
                Series {
                    period: "2017-2019".into(),
                    points: vec![],
                },
            ],
        };
        FacetGrid {
            panels: vec![panel("a"), panel("b"), panel("c")],
            ncols: 2,
            nrows: 2,
        }
    }

    #[test]
    fn facet_figure_hides_unused_cells_and_dedups_the_legend() {
        let fig = faceted_line_figure(&grid(), "t", "rate");
        let data = fig["data"].as_array().unwrap();
        assert_eq!(data.len(), 6); // 3 panels x 2 periods

        let shown = data
            .iter()
            .filter(|t| t["showlegend"].as_bool().unwrap())
            .count();
        assert_eq!(shown, 2); // first panel only

        assert_eq!(fig["layout"]["xaxis4"]["visible"], json!(false));
        assert_eq!(fig["layout"]["yaxis4"]["visible"], json!(false));
        assert_eq!(fig["layout"]["annotations"].as_array().unwrap().len(), 3);
        // first axis pair uses the bare plotly key
        assert!(fig["layout"]["xaxis"].is_object());
    }

    #[test]
    fn animated_figure_has_one_frame_per_label() {
        let series = vec![ResampledSeries {
            key: GroupKey {
                primary: "female".into(),
                secondary: "degree".into(),
            },
            points: vec![
                ResampledPoint {
                    month: day(2020, 1, 31),
                    value: 1.0,
                },
                ResampledPoint {
                    month: day(2020, 2, 29),
                    value: 2.0,
                },
            ],
        }];
        let anim = cumulative_frames(&series);
        let fig = animated_line_figure(&anim, "t", "count");

        let frames = fig["frames"].as_array().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["name"], "2020-01");
        assert_eq!(frames[0]["data"][0]["x"].as_array().unwrap().len(), 1);
        assert_eq!(frames[1]["data"][0]["x"].as_array().unwrap().len(), 2);

        // the slider mirrors the frames, and the viewport spans the full range
        assert_eq!(
            fig["layout"]["sliders"][0]["steps"].as_array().unwrap().len(),
            2
        );
        assert_eq!(
            fig["layout"]["xaxis"]["range"],
            json!(["2020-01-31", "2020-02-29"])
        );
    }

    #[test]
    fn empty_animation_produces_a_figure_without_frames() {
        let anim = cumulative_frames(&[]);
        let fig = animated_line_figure(&anim, "t", "count");
        assert!(fig["frames"].as_array().unwrap().is_empty());
        assert!(fig["data"].as_array().unwrap().is_empty());
    }
}
