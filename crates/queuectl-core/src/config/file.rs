//! Reading and editing individual keys of the TOML configuration file.
//!
//! Keys are dotted (`queue.max_retries`). Bare field names and the
//! hyphenated spellings (`max-retries`, `backoff-base`) resolve to the first
//! section that declares the field.

use std::path::Path;

use toml::{Table, Value};

use super::AppConfig;
use crate::error::AppError;
use crate::result::AppResult;

/// Section search order for bare keys.
const SECTIONS: [&str; 4] = ["queue", "worker", "database", "logging"];

/// Resolve a user-supplied key into `(section, field)`.
pub fn resolve_key(key: &str) -> AppResult<(String, String)> {
    let normalized = key.trim().to_ascii_lowercase().replace('-', "_");
    let defaults = defaults_table()?;

    if let Some((section, field)) = normalized.split_once('.') {
        let known = defaults
            .get(section)
            .and_then(Value::as_table)
            .is_some_and(|table| table.contains_key(field));
        if known {
            return Ok((section.to_string(), field.to_string()));
        }
    } else {
        for section in SECTIONS {
            let known = defaults
                .get(section)
                .and_then(Value::as_table)
                .is_some_and(|table| table.contains_key(&normalized));
            if known {
                return Ok((section.to_string(), normalized));
            }
        }
    }

    Err(AppError::validation(format!(
        "Configuration key '{key}' not found"
    )))
}

/// Look up the effective value of a key in a loaded configuration.
pub fn get_value(config: &AppConfig, key: &str) -> AppResult<String> {
    let (section, field) = resolve_key(key)?;
    let table = Value::try_from(config)?;
    let value = table
        .get(&section)
        .and_then(|s| s.get(&field))
        .ok_or_else(|| AppError::validation(format!("Configuration key '{key}' not found")))?;
    Ok(display_value(value))
}

/// Flatten a configuration into `(section.field, value)` pairs.
pub fn entries(config: &AppConfig) -> AppResult<Vec<(String, String)>> {
    let root = Value::try_from(config)?;
    let mut out = Vec::new();
    for section in SECTIONS {
        if let Some(table) = root.get(section).and_then(Value::as_table) {
            for (field, value) in table {
                out.push((format!("{section}.{field}"), display_value(value)));
            }
        }
    }
    Ok(out)
}

/// Set a key in the configuration file at `path`, creating it if needed.
///
/// The edited file is re-loaded and validated; on failure the previous
/// contents are restored. Returns the canonical `section.field` key.
pub fn set_value(path: &Path, key: &str, raw: &str) -> AppResult<String> {
    let (section, field) = resolve_key(key)?;

    let previous = match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let mut root: Table = match &previous {
        Some(content) => toml::from_str(content)?,
        None => Table::new(),
    };

    let section_table = root
        .entry(section.clone())
        .or_insert(Value::Table(Table::new()));
    let Some(section_table) = section_table.as_table_mut() else {
        return Err(AppError::configuration(format!(
            "Configuration section '{section}' is not a table"
        )));
    };
    section_table.insert(field.clone(), parse_value(raw));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(&root)?)?;

    if let Err(e) = AppConfig::load(Some(path)) {
        match &previous {
            Some(content) => std::fs::write(path, content)?,
            None => std::fs::remove_file(path)?,
        }
        return Err(e);
    }

    Ok(format!("{section}.{field}"))
}

fn defaults_table() -> AppResult<Value> {
    Ok(Value::try_from(AppConfig::default())?)
}

fn parse_value(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        Value::Integer(v)
    } else if let Ok(v) = raw.parse::<f64>() {
        Value::Float(v)
    } else if let Ok(v) = raw.parse::<bool>() {
        Value::Boolean(v)
    } else {
        Value::String(raw.to_string())
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
