//! CLI command implementations.

pub mod token;

use anyhow::{Context, Result, bail};
use sdexec_core::{ConfigValidator, Operation, SchemaRegistry, parse_annotations};
use serde_json::Value;
use std::io::Read;

pub fn annotations(input: &str) -> Result<()> {
    let value = read_json_input(input)?;
    let Some(map) = value.as_object() else {
        bail!("annotations must be a JSON object");
    };

    let hints = parse_annotations(map);
    println!("{}", serde_json::to_string_pretty(&hints)?);
    Ok(())
}

pub fn validate(operation: &str, input: &str) -> Result<()> {
    let operation: Operation = operation.parse()?;
    let config = read_json_input(input)?;

    match SchemaRegistry::builtin().validate(operation, config) {
        Ok(_) => {
            println!("Configuration is valid for {}", operation);
            Ok(())
        }
        Err(e) => {
            bail!("{}", e);
        }
    }
}

/// Read JSON given inline, as `@path`, or `-` for stdin.
fn read_json_input(input: &str) -> Result<Value> {
    let text = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else if let Some(path) = input.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))?
    } else {
        input.to_string()
    };

    serde_json::from_str(&text).context("Input is not valid JSON")
}
