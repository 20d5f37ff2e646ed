use crate::core::sensor::Unit;
use crate::core::{ObservableValue, Snapshot, SnapshotSensor};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Formats an `Option<T>` into a `Cell`. `None` is displayed as "N/A".
pub fn format_optional_cell<T>(value: Option<T>, format_fn: impl Fn(T) -> String) -> Cell {
    value.map_or(
        Cell::new("N/A")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
        |v| Cell::new(format_fn(v)).set_alignment(CellAlignment::Right),
    )
}

/// Spinner shown while the overview is fetched.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn format_metric(value: f64, unit: &Unit) -> String {
    match unit {
        Unit::Currency(code) => format!("{value:.2} {code}"),
        Unit::Count => format!("{value:.0}"),
        Unit::Percent => format!("{value:.1}%"),
    }
}

fn display_json(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// One row per metric.
pub fn sensors_table(sensors: &[SnapshotSensor]) -> Table {
    let mut table = new_styled_table();
    table.set_header(vec![header_cell("Metric"), header_cell("Value")]);

    for sensor in sensors {
        let unit = sensor.unit();
        table.add_row(vec![
            Cell::new(sensor.name()),
            format_optional_cell(sensor.current_value(), |v| format_metric(v, &unit)),
        ]);
    }
    table
}

/// Contracts as normalized by the contracts metric.
pub fn contracts_table(contracts: &[Value]) -> Table {
    let mut table = new_styled_table();
    table.set_header(vec![
        header_cell("Contract"),
        header_cell("Price"),
        header_cell("Rate"),
    ]);

    for contract in contracts {
        let price = contract["price"].as_f64();
        let currency = display_json(&contract["currency"]);
        table.add_row(vec![
            Cell::new(display_json(&contract["name"])),
            format_optional_cell(price, |p| format!("{p:.2} {currency}")),
            Cell::new(display_json(&contract["payment_rate"])),
        ]);
    }
    table
}

/// Renders the full overview for a snapshot.
pub fn render_snapshot(snapshot: &std::sync::Arc<Snapshot>, currency: &str) -> String {
    let sensors = SnapshotSensor::all(snapshot, currency);
    let mut out = format!(
        "{}\n{}\n",
        style_text("Finanzguru", StyleType::Title),
        style_text(
            &format!("Updated {}", snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")),
            StyleType::Subtle
        )
    );
    out.push_str(&sensors_table(&sensors).to_string());

    let contracts = sensors
        .iter()
        .find(|sensor| sensor.id() == "contracts_overview")
        .and_then(|sensor| sensor.attributes().get("list").and_then(Value::as_array).cloned())
        .unwrap_or_default();
    if !contracts.is_empty() {
        out.push('\n');
        out.push_str(&contracts_table(&contracts).to_string());
    }
    out
}
