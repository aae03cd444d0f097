//! Rendering of command results as tables or JSON.

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use cloudservice_core::error::AppError;

/// How command results are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Pretty-printed JSON for scripting.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Rows as a table, or as a JSON array.
pub fn print_list<T: Serialize + Tabled>(rows: &[T], format: OutputFormat) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => print_json(rows),
        OutputFormat::Table if rows.is_empty() => {
            println!("(none)");
            Ok(())
        }
        OutputFormat::Table => {
            println!("{}", Table::new(rows).with(Style::sharp()));
            Ok(())
        }
    }
}

pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Labelled detail lines under a success message.
pub fn print_details(fields: &[(&str, String)]) {
    let width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;
    for (label, value) in fields {
        println!("  {:<width$} {value}", format!("{label}:"));
    }
}
