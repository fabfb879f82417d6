/// Markdown report generation for flood query results.
///
/// Builds a reader-facing report from a `QueryResult`: the question and
/// answer up top, then one section per location with county, flood
/// event, SVI and precipitation details. Sections render only for the
/// categories that survived context selection.

use std::path::PathBuf;

use chrono::Utc;

use crate::model::{FilteredLocation, FloodEvent, ForecastHour, MonthlyPrecipitation, SviData};
use crate::pipeline::QueryResult;

/// Precipitation history is shown for the most recent months only; the
/// full series is available in the JSON output.
const HISTORY_MONTHS_SHOWN: usize = 12;

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the full Markdown report for a query result.
pub fn render_markdown(result: &QueryResult) -> String {
    let mut md = String::new();

    md.push_str("# 🌊 Flood Information Report\n\n");
    md.push_str(&format!(
        "**Generated:** {}\n\n---\n\n",
        Utc::now().format("%B %d, %Y at %H:%M UTC")
    ));

    md.push_str("## 🔍 Query\n\n");
    md.push_str(&format!("> **\"{}\"**\n\n", result.query));
    md.push_str("## 💡 Answer\n\n");
    md.push_str(&result.answer);
    md.push_str("\n\n---\n\n");

    for location in &result.filtered_context.filtered_data {
        push_location_section(&mut md, location);
    }

    md.push_str("---\n\n");
    md.push_str(&format!(
        "*Report covers {} location(s). Generated by flai_service.*\n",
        result.filtered_context.filtered_data.len()
    ));

    md
}

fn push_location_section(md: &mut String, location: &FilteredLocation) {
    let input = &location.input_location;
    md.push_str(&format!("## 📍 Location: {}\n\n", input.name));
    md.push_str(&format!("**Address:** {}\n", input.formatted_address));
    md.push_str(&format!(
        "**Coordinates:** {}, {}\n\n",
        input.latitude, input.longitude
    ));

    if let Some(status) = &location.status {
        md.push_str(&format!(
            "_No county-level data available for this location ({:?})._\n\n",
            status
        ));
    }

    if let Some(county) = &location.county_data {
        md.push_str("### 🏛️ County Information\n\n");
        md.push_str("| Field | Value |\n|-------|-------|\n");
        md.push_str(&format!("| County | {} |\n", county.county_name));
        md.push_str(&format!("| State | {} |\n", county.state_name));
        md.push_str(&format!("| FIPS Code | {} |\n", county.fips_code));
        md.push_str(&format!("| Area | {:.1} sq mi |\n\n", county.area_sqmi));
    }

    if let Some(events) = &location.flood_event_history {
        push_flood_events_section(md, events);
    }

    if let Some(svi) = &location.social_vulnerability_index {
        push_svi_section(md, svi);
    }

    if let Some(forecast) = &location.precipitation_forecast {
        push_forecast_section(md, forecast);
    }

    if let Some(history) = &location.precipitation_history {
        push_history_section(md, history);
    }
}

fn push_flood_events_section(md: &mut String, events: &[FloodEvent]) {
    md.push_str(&format!(
        "### 🌧️ Flood Event History ({} event(s))\n\n",
        events.len()
    ));
    md.push_str("| Type | Date | Distance (mi) | County | Nearest Address |\n");
    md.push_str("|------|------|---------------|--------|------------------|\n");

    for event in events {
        let distance = event
            .distance_from_query_point_miles
            .map(|d| format!("{:.2}", d))
            .unwrap_or_else(|| "—".to_string());
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            event.event_type,
            event.date,
            distance,
            event.county,
            event.nearest_address.as_deref().unwrap_or("N/A")
        ));
    }
    md.push('\n');
}

fn push_svi_section(md: &mut String, svi: &SviData) {
    md.push_str(&format!(
        "### 🏘️ Social Vulnerability Index ({})\n\n",
        svi.release_year
    ));

    md.push_str(&format!(
        "**Overall Ranking:** national {}, state {}\n\n",
        percentile_text(svi.overall_ranking.national),
        percentile_text(svi.overall_ranking.state)
    ));

    if !svi.themes.is_empty() {
        md.push_str("**Themes:**\n\n");
        for (theme, value) in &svi.themes {
            md.push_str(&format!("- {}: {}\n", theme, percentile_text(*value)));
        }
        md.push('\n');
    }

    if !svi.variables.is_empty() {
        md.push_str("**Relevant Variables:**\n\n");
        for (theme, variables) in &svi.variables {
            md.push_str(&format!("- **{}**\n", theme));
            for (name, value) in variables {
                md.push_str(&format!("  - {}: {}\n", name, percentile_text(*value)));
            }
        }
        md.push('\n');
    }
}

fn push_forecast_section(md: &mut String, forecast: &[ForecastHour]) {
    md.push_str(&format!(
        "### ⛅ Precipitation Forecast ({} hour(s))\n\n",
        forecast.len()
    ));

    if forecast.is_empty() {
        md.push_str("_No forecast data available._\n\n");
        return;
    }

    md.push_str("| Time | Probability (%) | Amount (in) | Condition |\n");
    md.push_str("|------|-----------------|-------------|----------|\n");
    for hour in forecast {
        md.push_str(&format!(
            "| {} | {:.1} | {:.2} | {} |\n",
            hour.time,
            hour.precipitation_probability,
            hour.precipitation_amount_in,
            hour.weather_condition
        ));
    }
    md.push('\n');
}

fn push_history_section(md: &mut String, history: &[MonthlyPrecipitation]) {
    md.push_str("### 📊 Precipitation History\n\n");

    if history.is_empty() {
        md.push_str("_No precipitation history available._\n\n");
        return;
    }

    let shown = history.len().min(HISTORY_MONTHS_SHOWN);
    let recent = &history[history.len() - shown..];

    md.push_str(&format!(
        "Most recent {} of {} month(s) on record:\n\n",
        shown,
        history.len()
    ));
    md.push_str("| Year | Month | Precipitation (in) |\n");
    md.push_str("|------|-------|--------------------|\n");
    for month in recent {
        md.push_str(&format!(
            "| {} | {} | {:.2} |\n",
            month.year, month.month, month.precipitation_in
        ));
    }
    md.push('\n');
}

fn percentile_text(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => "n/a".to_string(),
    }
}

// ---------------------------------------------------------------------------
// File output
// ---------------------------------------------------------------------------

/// Write the Markdown report into `dir`, creating it if necessary.
/// Returns the path of the written file.
pub fn write_markdown_report(result: &QueryResult, dir: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let filename = format!("flood_report_{}.md", Utc::now().format("%Y%m%d_%H%M%S"));
    let path = PathBuf::from(dir).join(filename);
    std::fs::write(&path, render_markdown(result))?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
