//! Turning a resolved record array into table rows and HTML.
//!
//! [`build_table`] produces a structured [`Table`] that both the HTML
//! renderer and the CLI's CSV output consume. [`render_panel`] is the render
//! boundary: any error raised while building the table degrades to a generic
//! message instead of propagating to the host.

use std::fmt::Write as _;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Timelike};
use serde_json::Value;

use crate::config::PanelConfig;
use crate::error::AppError;
use crate::resolve::resolve_items_from_config;

pub const AWAITING_TEXT: &str = "Awaiting json data...";
pub const RENDER_ERROR_TEXT: &str = "Error rendering table";

/// One table cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Object key the cell was built from.
    pub key: String,
    pub text: String,
    pub classes: Vec<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    /// Raw header markup, inserted verbatim.
    pub header: Option<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Column keys in first-seen order across all rows.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for cell in self.rows.iter().flatten() {
            if !columns.contains(&cell.key.as_str()) {
                columns.push(&cell.key);
            }
        }
        columns
    }
}

/// Plain display text of a JSON value.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Parse the date/time shapes commonly found in JSON feeds, in local time.
fn parse_local_datetime(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Format a date-like string for display.
///
/// Moments on `today` with non-zero hour, minute and second are shown as
/// `HH:MM:SS`; every other parseable moment as `YYYY-MM-DD`. Returns `None`
/// when the input is not a date.
pub fn format_date_value(input: &str, today: NaiveDate) -> Option<String> {
    let moment = parse_local_datetime(input)?;
    let time_of_day =
        moment.date() == today && moment.hour() != 0 && moment.minute() != 0 && moment.second() != 0;
    let formatted = if time_of_day {
        moment.format("%H:%M:%S")
    } else {
        moment.format("%Y-%m-%d")
    };
    Some(formatted.to_string())
}

fn build_cell(key: &str, value: &Value, config: &PanelConfig, today: NaiveDate) -> Cell {
    let mut color = None;
    let cell_value = match value {
        Value::Object(map) => {
            color = map.get("color").map(value_text).filter(|c| !c.is_empty());
            map.get("value").cloned().unwrap_or(Value::String(String::new()))
        }
        other => other.clone(),
    };

    let mut cell = Cell {
        key: key.to_string(),
        text: String::new(),
        classes: Vec::new(),
        color,
    };

    if key == "icon" {
        cell.classes.push("fa".to_string());
        let icon = value_text(&cell_value);
        if !icon.is_empty() {
            cell.classes.push(icon);
        }
        return cell;
    }

    // Date formatting takes precedence over the column allow-list.
    if config.try_format_date {
        cell.text = match &cell_value {
            Value::String(s) => format_date_value(s, today).unwrap_or_else(|| s.clone()),
            other => value_text(other),
        };
        return cell;
    }

    let kept = config.keep_columns.is_empty() || config.keep_columns.iter().any(|c| c == key);
    if kept {
        cell.text = value_text(&cell_value);
    }
    cell
}

/// Build one row per record and one cell per object entry, in document order.
pub fn build_table(
    items: &[Value],
    config: &PanelConfig,
    today: NaiveDate,
) -> Result<Table, AppError> {
    let rows = items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(map
                .iter()
                .map(|(key, value)| build_cell(key, value, config, today))
                .collect()),
            other => Err(AppError::RenderError(format!(
                "row {index} is not an object: {other}"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Table {
        header: config.descriptive_row.clone(),
        rows,
    })
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Render a [`Table`] as a `<table>` element.
pub fn render_table(table: &Table, size: u8) -> String {
    let mut html = String::from("<table>");

    if let Some(header) = &table.header {
        let _ = write!(html, "<thead>{header}</thead>");
    }

    html.push_str("<tbody>");
    for row in &table.rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str("<td");
            if !cell.classes.is_empty() {
                let _ = write!(html, " class=\"{}\"", escape_html(&cell.classes.join(" ")));
            }
            if let Some(color) = &cell.color {
                let _ = write!(html, " style=\"color: {}\"", escape_html(color));
            }
            html.push('>');

            let text = escape_html(&cell.text);
            if (1..=8).contains(&size) {
                let _ = write!(html, "<h{size}>{text}</h{size}>");
            } else {
                html.push_str(&text);
            }
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// Resolve the record array of `document` and build its table.
///
/// Fails with [`AppError::NoData`] carrying the placeholder text when
/// nothing has been received yet or the array cannot be resolved.
pub fn table_for_document(
    document: Option<&Value>,
    config: &PanelConfig,
    today: NaiveDate,
) -> Result<Table, AppError> {
    let document = document.ok_or_else(|| AppError::NoData(AWAITING_TEXT.to_string()))?;
    let items = resolve_items_from_config(document, config.array_name.as_ref())
        .ok_or_else(|| AppError::NoData(config.no_data_text.clone()))?;
    build_table(items, config, today)
}

/// Render the panel body for the latest document.
///
/// `None` means nothing has been received yet. A document without a
/// resolvable array shows the configured no-data text.
pub fn render_panel(document: Option<&Value>, config: &PanelConfig, today: NaiveDate) -> String {
    let inner = match table_for_document(document, config, today) {
        Ok(table) => render_table(&table, config.size),
        Err(AppError::NoData(text)) => escape_html(&text),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to render table");
            RENDER_ERROR_TEXT.to_string()
        }
    };
    format!("<div class=\"xsmall\">{inner}</div>")
}
