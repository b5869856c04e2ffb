//! Output formatting for the CLI

use clap::ValueEnum;
use serde::Serialize;

use crate::errors::DashboardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    /// Print `value` as JSON; text output is rendered by each command
    pub fn print_value<T: Serialize>(&self, value: &T) -> Result<(), DashboardError> {
        if let OutputFormat::Json = self {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// `label:` padded to a fixed column, then the value
pub fn field(label: &str, value: &str) -> String {
    format!("{:<16} {}", format!("{}:", label), value)
}

pub fn table_header(columns: &[(&str, usize)]) -> String {
    columns
        .iter()
        .map(|(name, width)| format!("{:<width$}", name, width = width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Row of fixed-width cells; long values are cut with `...`
pub fn table_row(values: &[(&str, usize)]) -> String {
    values
        .iter()
        .map(|(val, width)| {
            let cell = if val.chars().count() > *width && *width > 3 {
                let kept: String = val.chars().take(width - 3).collect();
                format!("{}...", kept)
            } else {
                val.to_string()
            };
            format!("{:<width$}", cell, width = width)
        })
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_truncates_long_cells() {
        let row = table_row(&[("Sakura Tanaka-Long", 10), ("online", 6)]);
        assert_eq!(row, "Sakura ...  online");
    }

    #[test]
    fn field_aligns_values() {
        assert_eq!(field("Events", "2"), "Events:          2");
    }
}
