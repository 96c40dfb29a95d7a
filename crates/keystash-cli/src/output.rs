use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_value(value: &Value, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Table => print_as_table(value),
    }
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// A numbered progress line.
pub fn print_step(n: usize, msg: &str) {
    println!("{} {}", format!("[{n}]").cyan(), msg);
}

fn print_as_table(value: &Value) {
    match value {
        Value::Array(rows) if rows.is_empty() => println!("Nothing found."),
        Value::Array(rows) => {
            let mut builder = Builder::default();
            match rows.first() {
                Some(Value::Object(first)) => {
                    let columns: Vec<&String> = first.keys().collect();
                    builder.push_record(columns.iter().map(|c| c.as_str()));
                    for row in rows {
                        builder.push_record(
                            columns
                                .iter()
                                .map(|c| cell(row.get(c.as_str()).unwrap_or(&Value::Null))),
                        );
                    }
                }
                _ => {
                    for row in rows {
                        builder.push_record([cell(row)]);
                    }
                }
            }
            let table = builder.build().with(Style::rounded()).to_string();
            println!("{table}");
            println!("Total: {}", rows.len());
        }
        Value::Object(fields) => {
            let mut builder = Builder::default();
            for (key, value) in fields {
                builder.push_record([key.clone(), cell(value)]);
            }
            println!("{}", builder.build().with(Style::rounded()));
        }
        other => println!("{}", cell(other)),
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
