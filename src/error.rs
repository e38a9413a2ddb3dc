//! Error taxonomy for the fixture control engine.
//!
//! Transport errors (connect/read/write/parse failure) are recovered
//! locally by the transport and never reach here in normal operation;
//! what's surfaced through this type is what a caller-initiated dispatch
//! or schedule import can fail with.

use thiserror::Error;

/// A single adjudicated failure reported by a fixture, keyed by the short
/// address that sent the NOK.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEntry {
    pub short_address: u8,
    pub error_code: u8,
}

fn format_entries(entries: &[ErrorEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("Short address {} replied with error code {}", e.short_address, e.error_code))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum Error {
    /// Connect/read/write/parse failure local to one transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// One or more set-family replies were NOK.
    #[error("NACK - {}", format_entries(.0))]
    Nack(Vec<ErrorEntry>),

    /// `ToggleCalibration` replied with `ack=false` from one or more
    /// short addresses.
    #[error("NACK - {0:?}")]
    ToggleCalibrationNack(Vec<u8>),

    /// `SetLEDs`/`ConfirmResetForFirmwareUpdate` are fire-and-forget; any
    /// reply claiming one of these function codes is itself an error.
    #[error("invalid reply function code - {0}")]
    UnexpectedReply(u8),

    /// A replying function code produced zero replies.
    #[error("no replies")]
    NoReplies,

    /// Unknown dispatcher command name.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Failed to decode the dispatcher's generic `{serial, payload}`
    /// argument wrapper, or the command-specific payload within it.
    #[error("failed to parse arguments: {0}")]
    ArgumentDecode(#[from] serde_json::Error),

    /// Dispatcher timed out waiting for a serial to appear in any
    /// transport's lookup table.
    #[error("timed out waiting for device with serial number {0}")]
    SerialTimeout(u32),

    /// A transport claims to own the serial but has no assigned address
    /// for it.
    #[error("could not look up device with serial number {0}")]
    SerialUnresolved(u32),

    /// Schedule level outside `[0,100]`.
    #[error("level at index {index} out of bounds (0-100): {value}")]
    LevelOutOfBounds { index: usize, value: f64 },

    /// Cumulative schedule levels exceed 300%.
    #[error("cumulative level exceeds 300% for levels {0:?}")]
    CumulativeLevelExceeded(Vec<f64>),

    /// `stop <= start` for a schedule entry.
    #[error("timespan invalid for schedule (start={start}, stop={stop})")]
    InvalidTimespan { start: u32, stop: u32 },

    /// Two day-expanded schedule intervals for the same fixture overlap.
    #[error("schedules overlap for serial {serial} ({x_start}..{x_stop} and {y_start}..{y_stop})")]
    ScheduleOverlap {
        serial: u32,
        x_start: u32,
        x_stop: u32,
        y_start: u32,
        y_stop: u32,
    },

    /// Malformed in-memory schedule line input.
    #[error("failed to parse schedule line: {0}")]
    ScheduleLineFormat(String),

    /// Frame failed to decode (bad CRC, short buffer, unknown variant).
    /// Surfaced only from direct codec calls; the stream parser itself
    /// resyncs rather than propagating this.
    #[error("frame decode error: {0}")]
    FrameDecode(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
