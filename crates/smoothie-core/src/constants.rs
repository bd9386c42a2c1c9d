//! Protocol and timing constants shared across controller drivers.

use std::time::Duration;

/// Default Smoothieware/GRBL-style receive buffer size in bytes (the
/// firmware's 128-byte line buffer, minus an 8-byte safety margin).
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 120;

/// Controller loop tick interval.
pub const CONTROLLER_TICK: Duration = Duration::from_millis(250);

/// Minimum interval between unsolicited `$G` parser-state queries.
pub const PARSER_STATE_THROTTLE: Duration = Duration::from_millis(500);

/// How long to wait for a status report before considering the query stalled.
pub const STATUS_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a parser-state response before giving up.
pub const PARSER_STATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait after opening the port for the bootloader to settle before sending
/// anything (Smoothieware ignores input briefly after reset).
pub const BOOTLOADER_SETTLE: Duration = Duration::from_millis(1000);

/// Wait after receiving the firmware version line before issuing the first
/// settings query.
pub const POST_VERSION_SETTLE: Duration = Duration::from_millis(50);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_size_leaves_margin_under_128() {
        assert!(DEFAULT_RECEIVE_BUFFER_SIZE < 128);
        assert_eq!(128 - DEFAULT_RECEIVE_BUFFER_SIZE, 8);
    }
}
