//! `ries config` - show the effective global configuration

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use crate::config::Config;

pub fn show(config: &Config) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let source = match &config.source {
        Some(path) => Cell::new(path.display()),
        None => Cell::new("(built-in defaults)").fg(Color::DarkGrey),
    };
    table.add_row(vec![Cell::new("Config file"), source]);
    table.add_row(vec![
        "Store directory",
        &config.output.default_dir.display().to_string(),
    ]);
    table.add_row(vec![
        "Compression level",
        &format!("zstd {}", config.output.compression_level),
    ]);
    table.add_row(vec![
        "Workers",
        &format!("{} (max: {})", config.workers.default, config.workers.max),
    ]);
    table.add_row(vec![
        "Log filter",
        &std::env::var("RUST_LOG").unwrap_or_else(|_| "(default)".into()),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_labelled() {
        let rendered = show(&Config::default()).to_string();
        assert!(rendered.contains("built-in defaults"));
        assert!(rendered.contains("zstd 3"));
    }
}
