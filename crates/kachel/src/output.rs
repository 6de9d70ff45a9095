use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A completed remote call, as printed by `call` and `watch`.
#[derive(Serialize)]
pub struct CallOutcome<'a> {
    pub command: &'a str,
    pub sequence: u64,
    pub generation: u64,
    #[serde(rename = "return")]
    pub value: &'a Value,
    pub timestamp: String,
}

impl<'a> CallOutcome<'a> {
    pub fn new(command: &'a str, sequence: u64, generation: u64, value: &'a Value) -> Self {
        Self {
            command,
            sequence,
            generation,
            value,
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_outcome(outcome: &CallOutcome<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(outcome).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            println!("{}", value_table(outcome.value));
        }
        OutputFormat::Pretty => {
            println!(
                "command={} seq={} generation={}",
                outcome.command, outcome.sequence, outcome.generation
            );
            println!(
                "{}",
                serde_json::to_string_pretty(outcome.value).unwrap_or_else(|_| "null".to_string())
            );
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = writeln!(out, "{}", outcome.value);
            let _ = out.flush();
        }
    }
}

/// One row per top-level key; scalars and non-objects get a single row.
fn value_table(value: &Value) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["KEY", "VALUE"]);

    match value {
        Value::Object(entries) => {
            for (key, value) in entries {
                table.add_row(vec![key.clone(), cell(value)]);
            }
        }
        other => {
            table.add_row(vec!["return".to_string(), cell(other)]);
        }
    }
    table
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn outcome_serializes_return_field() {
        let value = json!({"ok": true});
        let outcome = CallOutcome::new("click", 1, 2, &value);
        let json: Value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["command"], "click");
        assert_eq!(json["sequence"], 1);
        assert_eq!(json["generation"], 2);
        assert_eq!(json["return"], json!({"ok": true}));
    }

    #[test]
    fn table_has_row_per_key() {
        let table = value_table(&json!({"miner_ok": true, "sensors": {}}));
        assert_eq!(table.row_count(), 2);

        let table = value_table(&json!(42));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn string_cells_are_unquoted() {
        assert_eq!(cell(&json!("on")), "on");
        assert_eq!(cell(&json!({"a": 1})), "{\"a\":1}");
    }
}
