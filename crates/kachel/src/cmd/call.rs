use std::time::Duration;

use kachel_channel::{connect_with_config, Channel, ChannelConfig, ChannelError};

use crate::cmd::{parse_call_args, parse_call_kwargs, parse_duration, runtime, CallArgs};
use crate::exit::{channel_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_outcome, CallOutcome, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let positional = parse_call_args(args.args.as_deref())?;
    let kwargs = parse_call_kwargs(args.kwargs.as_deref())?;

    runtime()?.block_on(async {
        let channel = connect_with_config(&args.url, ChannelConfig::default());
        let result = call_once(&channel, &args, positional, kwargs, timeout, format).await;
        channel.shutdown().await;
        result
    })
}

async fn call_once(
    channel: &Channel,
    args: &CallArgs,
    positional: Vec<serde_json::Value>,
    kwargs: serde_json::Map<String, serde_json::Value>,
    timeout: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    let generation = tokio::time::timeout(timeout, channel.connected())
        .await
        .map_err(|_| {
            CliError::new(
                TIMEOUT,
                format!("connect to {} timed out after {timeout:?}", args.url),
            )
        })?
        .map_err(|err| channel_error("connect failed", err))?;

    let pending = channel
        .issue(&args.command, positional, kwargs)
        .await
        .map_err(|err| channel_error("call failed", err))?;
    let sequence = pending.sequence();

    let value = tokio::time::timeout(timeout, pending)
        .await
        .map_err(|_| channel_error("call failed", ChannelError::Timeout(timeout)))?
        .map_err(|err| channel_error("call failed", err))?;

    print_outcome(
        &CallOutcome::new(&args.command, sequence, generation, &value),
        format,
    );
    Ok(SUCCESS)
}
