//! Table formatting helpers for CLI output.

use comfy_table::{ContentArrangement, Table};

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// Display placeholder for an absent value.
pub fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}
