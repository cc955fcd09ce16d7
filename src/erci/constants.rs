//! Wire constants for the ERCI (ring-switched antenna control) protocol,
//! grounded on `r3erci/constants.py`.

use enum_primitive_derive::Primitive;
use num_traits::{FromPrimitive, ToPrimitive};

/// Reserved header byte, always zero.
pub const RESERVED_VALUE: u8 = 0x00;

/// Protocol version carried in every frame's header.
pub const PROTOCOL_VERSION: u8 = 0x03;

/// UDP port ERCI listens on.
pub const PORT: u16 = 12200;

/// Size of the fixed 4-byte header: `reserved | version | command | seq`.
pub const HEADER_SIZE: usize = 4;

/// Encoded length of a MAC address field.
pub const MAC_ADDRESS_LENGTH: usize = 6;

/// Encoded length of a serial number field (zero-padded ASCII).
pub const SERIAL_NUMBER_LENGTH: usize = 26;

/// Encoded length of one station id entry in a CSI response.
pub const STAID_LENGTH: usize = 2;

/// Number of stations a CSI response reports.
pub const CSI_STATION_COUNT: usize = 20;

/// Divisor CSI magnitude values are scaled by on the wire (`1 << 24`).
pub const CSI_SCALE: f64 = 16_777_216.0;

/// Node lifecycle state, as reported by `STATE_RESPONSE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
pub enum ErciState {
    /// Unknown/uninitialized.
    Invalid = 0,
    /// Powered on, not yet accepting configuration.
    Startup = 1,
    /// Idle, accepts `SELECT_CONFIG`.
    Ready = 2,
    /// A ring is actively running.
    Running = 3,
    /// Re-applying configuration while already running.
    Reconfiguring = 4,
    /// Faulted; requires intervention.
    Fault = 5,
    /// Under maintenance.
    Maintenance = 6,
    /// A configuration has been selected but the ring hasn't started.
    Configured = 7,
}

impl ErciState {
    /// Decode a wire byte, if it names a known state.
    pub fn from_u8(raw: u8) -> Option<Self> {
        FromPrimitive::from_u8(raw)
    }

    /// The wire byte for this state.
    pub fn to_u8(self) -> u8 {
        ToPrimitive::to_u8(&self).expect("ErciState always fits in a u8")
    }
}

/// ERCI command ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
pub enum ErciCmd {
    /// Never sent or received; an empty/unrecognized command decodes to this.
    Invalid = 0,
    /// Selects a ring configuration, ring, and antenna.
    SelectConfig = 1,
    /// Switches the active ring and antenna without reselecting a config.
    SwitchRing = 2,
    /// Starts the currently selected ring.
    Start = 3,
    /// Stops the currently running ring.
    Stop = 4,
    /// Reply to a command that doesn't have its own response type.
    CommandResult = 5,
    /// Requests the node's current state.
    StateQuery = 6,
    /// Reply to [`ErciCmd::StateQuery`].
    StateResponse = 7,
    /// Requests a free-text diagnostic description.
    DiagnosticDescriptionQuery = 8,
    /// Reply to [`ErciCmd::DiagnosticDescriptionQuery`].
    DiagnosticDescriptionResponse = 9,
    /// Switches only the active antenna.
    SwitchAntenna = 10,
    /// Sets the node's configuration-mode flag.
    SetConfigMode = 11,
    /// Queries a node's MAC address and serial number.
    PassportQuery = 12,
    /// Reply to [`ErciCmd::PassportQuery`].
    PassportQueryResponse = 13,
    /// Reboots the node.
    Reboot = 128,
    /// Requests the channel state information matrix.
    GetCsiQuery = 129,
    /// Reply to [`ErciCmd::GetCsiQuery`].
    GetCsiResponse = 130,
}

impl ErciCmd {
    /// Decode a wire command byte.
    pub fn from_u8(raw: u8) -> Option<Self> {
        FromPrimitive::from_u8(raw)
    }

    /// The wire byte for this command.
    pub fn to_u8(self) -> u8 {
        ToPrimitive::to_u8(&self).expect("ErciCmd always fits in a u8")
    }
}

impl std::fmt::Display for ErciCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErciCmd::Invalid => "INVALID",
            ErciCmd::SelectConfig => "SELECT_CONFIG",
            ErciCmd::SwitchRing => "SWITCH_RING",
            ErciCmd::Start => "START",
            ErciCmd::Stop => "STOP",
            ErciCmd::CommandResult => "COMMAND_RESULT",
            ErciCmd::StateQuery => "STATE_QUERY",
            ErciCmd::StateResponse => "STATE_RESPONSE",
            ErciCmd::DiagnosticDescriptionQuery => "DIAGNOSTIC_DESCRIPTION_QUERY",
            ErciCmd::DiagnosticDescriptionResponse => "DIAGNOSTIC_DESCRIPTION_RESPONSE",
            ErciCmd::SwitchAntenna => "SWITCH_ANTENNA",
            ErciCmd::SetConfigMode => "SET_CONFIGMODE",
            ErciCmd::PassportQuery => "PASSPORT_QUERY",
            ErciCmd::PassportQueryResponse => "PASSPORT_QUERY_RESPONSE",
            ErciCmd::Reboot => "REBOOT",
            ErciCmd::GetCsiQuery => "GET_CSI_QUERY",
            ErciCmd::GetCsiResponse => "GET_CSI_RESPONSE",
        };
        f.write_str(name)
    }
}

/// Sentinel values for an unselected config/ring/antenna, per `ErciInvalid`.
pub const INVALID_CONFIG: u8 = 0;
/// See [`INVALID_CONFIG`].
pub const INVALID_RING: u8 = 0;
/// See [`INVALID_CONFIG`].
pub const INVALID_ANTENNA: u8 = 0;

/// Result codes carried in `COMMAND_RESULT` and other response frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
pub enum ErciResultCode {
    /// Unknown/uninitialized.
    Invalid = 0,
    /// The command succeeded.
    Success = 65,
    /// An unspecified failure occurred.
    GenericError = 70,
    /// The command is not valid in the node's current state.
    WrongState = 71,
    /// The received message was malformed.
    InvalidMessageReceived = 72,
    /// The received message's data was invalid.
    InvalidDataReceived = 73,
    /// No configuration is available to act on.
    NoConfigAvailable = 74,
}

impl ErciResultCode {
    /// Decode a wire result-code byte.
    pub fn from_u8(raw: u8) -> Option<Self> {
        FromPrimitive::from_u8(raw)
    }

    /// The wire byte for this result code.
    pub fn to_u8(self) -> u8 {
        ToPrimitive::to_u8(&self).expect("ErciResultCode always fits in a u8")
    }
}

/// How a command's declared packet length constrains the frame it's carried
/// in, per `PacketLengthType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketLengthKind {
    /// The frame must be at least this many bytes.
    Minimum,
    /// The frame must be exactly this many bytes.
    Exact,
    /// The frame must be at most this many bytes.
    Maximum,
}

/// The length (in bytes) and length-kind a frame carrying `cmd` must satisfy,
/// per `GetPacketLength`. Returns `None` for [`ErciCmd::Invalid`], which
/// should never be framed.
pub fn packet_length(cmd: ErciCmd) -> Option<(usize, PacketLengthKind)> {
    use PacketLengthKind::*;
    Some(match cmd {
        ErciCmd::Invalid => return None,
        ErciCmd::SelectConfig => (7, Exact),
        ErciCmd::SwitchRing => (6, Exact),
        ErciCmd::Start | ErciCmd::Stop | ErciCmd::StateQuery | ErciCmd::DiagnosticDescriptionQuery
        | ErciCmd::Reboot => (4, Exact),
        ErciCmd::CommandResult => (6, Minimum),
        ErciCmd::StateResponse => (8, Exact),
        ErciCmd::DiagnosticDescriptionResponse => (5, Minimum),
        ErciCmd::SwitchAntenna => (5, Exact),
        ErciCmd::SetConfigMode => (5, Exact),
        ErciCmd::PassportQuery => (36, Exact),
        ErciCmd::PassportQueryResponse => (37, Exact),
        ErciCmd::GetCsiResponse => (
            4 + 1 + CSI_STATION_COUNT * STAID_LENGTH
                + (CSI_STATION_COUNT * (CSI_STATION_COUNT - 1) / 2) * 4,
            Maximum,
        ),
        ErciCmd::GetCsiQuery => (4, Minimum),
    })
}
