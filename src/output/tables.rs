use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::{ASCII_MARKDOWN, UTF8_FULL};
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use super::styling::{status_tone, Tone};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// GitHub-flavoured markdown table, never wrapped.
pub fn create_markdown_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_MARKDOWN)
        .set_content_arrangement(ContentArrangement::Disabled);
    table
}

pub fn status_cell(status: impl std::fmt::Display) -> Cell {
    let text = status.to_string();
    match status_tone(&text) {
        Tone::Good => Cell::new(text).fg(TableColor::Green),
        Tone::Bad => Cell::new(text).fg(TableColor::Red),
        Tone::Active => Cell::new(text).fg(TableColor::Yellow),
        Tone::Neutral => Cell::new(text),
    }
}

pub fn link_cell(url: &str) -> Cell {
    Cell::new(url).fg(TableColor::Cyan)
}
