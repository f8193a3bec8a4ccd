//! Output formatting shared by the client-side commands.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde_json::Value;

use beacon::Facts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

pub fn print_output<T: serde::Serialize>(format: OutputFormat, data: &T) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Table => print_value(&serde_json::to_value(data)?, 0),
    }
    Ok(())
}

/// Flat `key: value` listing, keys aligned.
pub fn print_facts(format: OutputFormat, facts: &Facts) -> Result<()> {
    if format == OutputFormat::Json {
        return print_output(format, facts);
    }
    if facts.is_empty() {
        println!("  {}", "(no facts)".dimmed());
        return Ok(());
    }
    let width = facts.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in facts {
        println!("  {}  {}", format!("{:width$}", key, width = width).cyan(), value);
    }
    Ok(())
}

fn print_value(value: &Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                match val {
                    Value::Object(inner) if inner.is_empty() => {
                        println!("{}{}: {{}}", pad, key.cyan())
                    }
                    Value::Object(_) => {
                        println!("{}{}:", pad, key.cyan());
                        print_value(val, indent + 1);
                    }
                    Value::Array(items) if items.iter().all(is_scalar) => {
                        let items: Vec<String> = items.iter().map(format_scalar).collect();
                        println!("{}{}: [{}]", pad, key.cyan(), items.join(", "));
                    }
                    Value::Array(_) => {
                        println!("{}{}:", pad, key.cyan());
                        print_value(val, indent + 1);
                    }
                    _ => println!("{}{}: {}", pad, key.cyan(), format_scalar(val)),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if is_scalar(item) {
                    println!("{}- {}", pad, format_scalar(item));
                } else {
                    println!("{}-", pad);
                    print_value(item, indent + 1);
                }
            }
        }
        _ => println!("{}{}", pad, format_scalar(value)),
    }
}

fn is_scalar(value: &Value) -> bool {
    !value.is_object() && !value.is_array()
}

fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".dimmed().to_string(),
        Value::Bool(true) => "yes".green().to_string(),
        Value::Bool(false) => "no".red().to_string(),
        other => other.to_string(),
    }
}
