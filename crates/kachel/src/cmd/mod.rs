use std::time::Duration;

use clap::{Args, Subcommand};
use serde_json::{Map, Value};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Issue one remote call and print its return value.
    Call(CallArgs),
    /// Poll a command on every connection and print each result.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Controller WebSocket URL (e.g. ws://controller.local/ws).
    #[arg(long, short = 'u', env = "KACHEL_URL")]
    pub url: String,
    /// Remote command name.
    pub command: String,
    /// Positional arguments as a JSON array.
    #[arg(long, value_name = "JSON")]
    pub args: Option<String>,
    /// Keyword arguments as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub kwargs: Option<String>,
    /// Maximum time to wait for the connection, and again for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Controller WebSocket URL (e.g. ws://controller.local/ws).
    #[arg(long, short = 'u', env = "KACHEL_URL")]
    pub url: String,
    /// Command to poll.
    #[arg(long, default_value = "get")]
    pub command: String,
    /// Delay between polls (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub interval: String,
    /// Delay before reconnecting after the connection drops.
    #[arg(long, default_value = "1s")]
    pub reconnect_delay: String,
    /// Exit after printing N results.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))
}

/// Parse `500ms`, `5s`, `2m` or a bare number of seconds.
pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    let (number, scale) = if let Some(num) = input.strip_suffix("ms") {
        (num, 1)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, 1_000)
    } else if let Some(num) = input.strip_suffix('m') {
        (num, 60_000)
    } else {
        (input, 1_000)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input:?}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    value
        .checked_mul(scale)
        .map(Duration::from_millis)
        .ok_or_else(|| CliError::new(USAGE, format!("duration too large: {input:?}")))
}

pub(crate) fn parse_call_args(input: Option<&str>) -> CliResult<Vec<Value>> {
    match input.map(serde_json::from_str::<Value>).transpose() {
        Ok(None) => Ok(Vec::new()),
        Ok(Some(Value::Array(args))) => Ok(args),
        Ok(Some(_)) => Err(CliError::new(USAGE, "--args must be a JSON array")),
        Err(err) => Err(CliError::new(USAGE, format!("--args is not valid JSON: {err}"))),
    }
}

pub(crate) fn parse_call_kwargs(input: Option<&str>) -> CliResult<Map<String, Value>> {
    match input.map(serde_json::from_str::<Value>).transpose() {
        Ok(None) => Ok(Map::new()),
        Ok(Some(Value::Object(kwargs))) => Ok(kwargs),
        Ok(Some(_)) => Err(CliError::new(USAGE, "--kwargs must be a JSON object")),
        Err(err) => Err(CliError::new(USAGE, format!("--kwargs is not valid JSON: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
        assert_eq!(parse_duration("-1s").unwrap_err().code, USAGE);
    }

    #[test]
    fn call_args_must_be_array() {
        assert_eq!(parse_call_args(None).unwrap(), Vec::<Value>::new());
        assert_eq!(
            parse_call_args(Some(r#"["relay_fan"]"#)).unwrap(),
            vec![json!("relay_fan")]
        );
        assert_eq!(parse_call_args(Some(r#"{"a":1}"#)).unwrap_err().code, USAGE);
        assert_eq!(parse_call_args(Some("[")).unwrap_err().code, USAGE);
    }

    #[test]
    fn call_kwargs_must_be_object() {
        assert!(parse_call_kwargs(None).unwrap().is_empty());
        let kwargs = parse_call_kwargs(Some(r#"{"item":"miner_ok"}"#)).unwrap();
        assert_eq!(kwargs["item"], json!("miner_ok"));
        assert!(parse_call_kwargs(Some("[]")).is_err());
    }
}
