use std::future::Future;
use std::time::Duration;

use kachel_channel::{connect_with_config, Channel, ChannelConfig, ChannelError};
use serde_json::Map;
use tracing::{info, warn};

use crate::cmd::{parse_duration, runtime, WatchArgs};
use crate::exit::{channel_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_outcome, CallOutcome, OutputFormat};

/// How a polling round for one connection ended.
enum Round {
    /// The connection went away; wait for the next one.
    Disconnected,
    /// Printed as many results as requested, or interrupted.
    Done,
}

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let reconnect_delay = parse_duration(&args.reconnect_delay)?;

    runtime()?.block_on(async {
        let config = ChannelConfig {
            reconnect_delay,
            ..ChannelConfig::default()
        };
        let channel = connect_with_config(&args.url, config);
        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);

        let result = watch(&channel, &args, interval, format, &mut interrupt).await;
        channel.shutdown().await;
        result
    })
}

async fn watch<F>(
    channel: &Channel,
    args: &WatchArgs,
    interval: Duration,
    format: OutputFormat,
    interrupt: &mut std::pin::Pin<&mut F>,
) -> CliResult<i32>
where
    F: Future,
{
    let mut events = channel.connect_events();
    let mut printed = 0usize;

    loop {
        let generation = tokio::select! {
            generation = events.next() => generation
                .ok_or_else(|| CliError::new(FAILURE, "channel closed unexpectedly"))?,
            _ = interrupt.as_mut() => return Ok(SUCCESS),
        };
        info!(generation, url = %args.url, "connected, polling {}", args.command);

        let round = poll(channel, args, generation, interval, format, &mut printed, interrupt);
        match round.await? {
            Round::Disconnected => warn!(generation, "connection lost, waiting to reconnect"),
            Round::Done => return Ok(SUCCESS),
        }
    }
}

async fn poll<F>(
    channel: &Channel,
    args: &WatchArgs,
    generation: u64,
    interval: Duration,
    format: OutputFormat,
    printed: &mut usize,
    interrupt: &mut std::pin::Pin<&mut F>,
) -> CliResult<Round>
where
    F: Future,
{
    loop {
        let result = tokio::select! {
            result = issue_and_wait(channel, &args.command) => result,
            _ = interrupt.as_mut() => return Ok(Round::Done),
        };

        let (sequence, value) = match result {
            Ok(outcome) => outcome,
            Err(
                ChannelError::NotConnected
                | ChannelError::ConnectionLost { .. }
                | ChannelError::Abandoned { .. },
            ) => return Ok(Round::Disconnected),
            Err(err) => return Err(channel_error("poll failed", err)),
        };

        print_outcome(
            &CallOutcome::new(&args.command, sequence, generation, &value),
            format,
        );
        *printed += 1;
        if args.count.is_some_and(|count| *printed >= count) {
            return Ok(Round::Done);
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = interrupt.as_mut() => return Ok(Round::Done),
        }
    }
}

async fn issue_and_wait(
    channel: &Channel,
    command: &str,
) -> Result<(u64, serde_json::Value), ChannelError> {
    let pending = channel.issue(command, vec![], Map::new()).await?;
    let sequence = pending.sequence();
    Ok((sequence, pending.await?))
}
