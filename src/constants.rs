//! Wire and timing constants for gateway discovery, the per-port transport,
//! and the frame codec.

use std::time::Duration;

// ---------------------------------------------------------------------
// Short addresses
// ---------------------------------------------------------------------

pub const SHORT_ADDRESS_BROADCAST: u8 = 0;
pub const SHORT_ADDRESS_BEGIN: u8 = 1;
pub const SHORT_ADDRESS_END: u8 = 247;
pub const SHORT_ADDRESS_RESERVED_BEGIN: u8 = 248;
pub const SHORT_ADDRESS_RESERVED_END: u8 = 254;
pub const SHORT_ADDRESS_UNASSIGNED: u8 = 255;

// ---------------------------------------------------------------------
// Frame codec
// ---------------------------------------------------------------------

pub const HEADER_SIZE: usize = 10;
pub const CRC16_SIZE: usize = 2;

pub const LEDS_MODULE0_MASK: u8 = 0x01;
pub const LEDS_MODULE1_MASK: u8 = 0x02;
pub const USE_MASK: u8 = 0x04;
pub const USE_IRRADIANCE: u8 = 0x04;
pub const USE_PWM: u8 = 0x00;

pub const SCHEDULER_STOPPED: u8 = 0;
pub const SCHEDULER_RUNNING_NOTHING: u8 = 1;
pub const SCHEDULER_RUNNING_SCHEDULE: u8 = 2;

pub const SCHEDULE_SEARCH_BY_ID: u8 = 0;
pub const SCHEDULE_SEARCH_BY_INDEX: u8 = 1;

// ---------------------------------------------------------------------
// Gateway discovery (UDP, port 4800)
// ---------------------------------------------------------------------

pub const DISCOVERY_PORT: u16 = 4800;
pub const DISCOVERY_REQUEST: [u8; 8] = [0x01, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00];
pub const DISCOVERY_REPLY_LEN: usize = 24;
pub const DISCOVERY_REPLY_CODE_OFFSET: usize = 0;
pub const DISCOVERY_REPLY_CODE: u8 = 0x81;
pub const DISCOVERY_REPLY_LENGTH_OFFSET: usize = 3;
pub const DISCOVERY_REPLY_MODEL_VARIANT_OFFSET: usize = 13;
pub const DISCOVERY_REPLY_MODEL_VARIANT_MASK: u8 = 0x0F;
pub const DISCOVERY_REPLY_MAC_OFFSET: usize = 14;
pub const GATEWAY_OUI: [u8; 3] = [0x00, 0x90, 0xE8];

pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(10);
pub const FORGETTING_FACTOR: u32 = 5;

pub const BASE_TCP_PORT: u16 = 4001;

// ---------------------------------------------------------------------
// UDP broadcaster
// ---------------------------------------------------------------------

pub const UDP_EPHEMERAL_PORT_RANGE: std::ops::RangeInclusive<u16> = 10000..=50000;
pub const UDP_BACKOFF: Duration = Duration::from_millis(50);
pub const UDP_READ_DEADLINE: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------
// Port transport
// ---------------------------------------------------------------------

pub const TCP_READ_DEADLINE: Duration = Duration::from_secs(1);
pub const TCP_WRITE_DEADLINE: Duration = Duration::from_secs(1);
pub const SEND_PACING: Duration = Duration::from_millis(10);
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// TCP keep-alive probe period, matching `dptr1Open`'s `SetKeepAlivePeriod`.
pub const KEEPALIVE_PERIOD: Duration = Duration::from_secs(1);

/// Two discovery intervals: a transport with no successful read in this
/// long is considered dead and the connector/prober/conditioner loops
/// exit.
pub const RECONNECT_TIMEOUT: Duration = Duration::from_secs(DISCOVERY_INTERVAL.as_secs() * 2);

pub const PROBE_INTERVAL: Duration = Duration::from_secs(8);
pub const CONDITIONER_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// How long the dispatcher waits for a serial to appear in any
/// transport's lookup table.
pub const SERIAL_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Gateway port count by the discovery reply's model-variant nibble.
pub fn port_count(variant: u8) -> Option<u32> {
    match variant & DISCOVERY_REPLY_MODEL_VARIANT_MASK {
        1 => Some(1),
        2 => Some(2),
        4 => Some(4),
        7 => Some(8),
        8 => Some(16),
        _ => None,
    }
}
