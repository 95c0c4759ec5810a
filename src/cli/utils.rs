use std::collections::BTreeMap;
use std::io::{self, BufRead, Read, Write};

use anyhow::Context;
use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::error::ClientError;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(response), Some(Value::Object(data))) = (response.as_object_mut(), data) {
                response.extend(data);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a single JSON document, pretty-printed in both formats
pub fn output_value(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(
    output_format: OutputFormat,
    collection_name: &str,
    message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                collection_name: [],
                "total": 0
            }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// One line per item in text mode: id followed by the most descriptive field
pub fn output_collection(
    output_format: OutputFormat,
    collection_name: &str,
    items: &[Value],
    total: u64,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                collection_name: items,
                "total": total
            }))?);
        }
        OutputFormat::Text => {
            for item in items {
                println!("{}", summary_line(item));
            }
            println!("({} of {} {})", items.len(), total, collection_name);
        }
    }
    Ok(())
}

fn summary_line(item: &Value) -> String {
    let id = item
        .get("id")
        .or_else(|| item.get("_id"))
        .map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "-".to_string());

    let label = ["name", "title", "username", "email", "documentType"]
        .iter()
        .find_map(|field| item.get(field).and_then(Value::as_str))
        .unwrap_or("");

    format!("{:>6}  {}", id, label)
}

/// Turns a client failure into a CLI error, spelling out per-field problems
pub fn client_error(err: ClientError) -> anyhow::Error {
    match &err {
        ClientError::Validation(validation) if !validation.field_errors.is_empty() => {
            let details: Vec<String> = validation
                .field_errors
                .iter()
                .map(|(field, message)| format!("{}: {}", field, message))
                .collect();
            anyhow::anyhow!("{} ({})", validation.message, details.join("; "))
        }
        ClientError::Network(_) => anyhow::Error::new(err.clone()).context(err.user_message()),
        _ => anyhow::Error::new(err),
    }
}

/// Parses repeated `key=value` filter arguments
pub fn parse_filters(raw: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut filters = BTreeMap::new();
    for pair in raw {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Invalid filter '{}', expected key=value", pair))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Invalid filter '{}', key is empty", pair);
        }
        filters.insert(key.to_string(), value.trim().to_string());
    }
    Ok(filters)
}

/// Reads a JSON document from stdin
pub fn read_stdin_json() -> anyhow::Result<Value> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read JSON from stdin")?;
    parse_json_input(&input)
}

pub fn parse_json_input(input: &str) -> anyhow::Result<Value> {
    if input.trim().is_empty() {
        anyhow::bail!("Expected a JSON document on stdin");
    }
    serde_json::from_str(input).context("Invalid JSON on stdin")
}

/// Prompts on stderr and reads one line from stdin
pub fn prompt_line(prompt: &str) -> anyhow::Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
