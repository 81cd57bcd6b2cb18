use anyhow::{Context, Result};
use serde_json::Value as Json;
use std::{fs, io::BufWriter, path::Path};
use tracing::info;

/// Write the figure as pretty-printed JSON next to its HTML page, so other
/// consumers can pick up the shaped payload directly.
pub fn write_json(figure: &Json, path: &Path) -> Result<()> {
    let file =
        fs::File::create(path).with_context(|| format!("creating `{}`", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), figure)
        .with_context(|| format!("writing figure JSON to `{}`", path.display()))?;
    info!(path = %path.display(), "wrote figure JSON");
    Ok(())
}

/// A self-contained page: Plotly from CDN plus the embedded figure. Frames,
/// when present, are registered after the initial plot so the play button
/// and slider work.
pub fn write_html(figure: &Json, title: &str, path: &Path) -> Result<()> {
    let payload = serde_json::to_string(figure)?;
    let page = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="https://cdn.plot.ly/plotly-2.32.0.min.js"></script>
<style>body {{ margin: 0; font-family: sans-serif; }} #chart {{ width: 100vw; height: 100vh; }}</style>
</head>
<body>
<div id="chart"></div>
<script>
const figure = {payload};
Plotly.newPlot("chart", figure.data, figure.layout, {{ responsive: true }}).then(() => {{
  if (figure.frames && figure.frames.length) {{
    Plotly.addFrames("chart", figure.frames);
  }}
}});
</script>
</body>
</html>
"#
    );
    fs::write(path, page).with_context(|| format!("writing `{}`", path.display()))?;
    info!(path = %path.display(), "wrote chart page");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn html_page_embeds_the_figure() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let figure = json!({ "data": [], "layout": { "title": { "text": "t" } } });
        let path = dir.path().join("chart.html");
        write_html(&figure, "t", &path)?;
        let page = fs::read_to_string(&path)?;
        assert!(page.contains("Plotly.newPlot"));
        assert!(page.contains(r#""title":{"text":"t"}"#));
        Ok(())
    }

    #[test]
    fn json_artifact_round_trips() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let figure = json!({ "data": [{ "x": [1, 2] }] });
        let path = dir.path().join("chart.json");
        write_json(&figure, &path)?;
        let loaded: Json = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(loaded, figure);
        Ok(())
    }
}
