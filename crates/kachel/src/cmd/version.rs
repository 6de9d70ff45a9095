use kachel_channel::DEFAULT_RECONNECT_DELAY;
use kachel_envelope::DEFAULT_MAX_MESSAGE;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("kachel {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!(
        "target: {}",
        option_env!("KACHEL_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("KACHEL_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("transport: websocket (text frames, JSON envelopes)");
    println!("reconnect_delay: {DEFAULT_RECONNECT_DELAY:?}");
    println!("max_message_bytes: {DEFAULT_MAX_MESSAGE}");

    Ok(SUCCESS)
}
