//! `ErciClient`: sends one ERCI command at a time and decodes its reply,
//! grounded on `r3erci/client.py`'s `ErciClient.send_command`/
//! `_handle_response`/`_create_msg`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};

use crate::erci::constants::*;
use crate::error::{QueryError, ResourceLocked, ResponseError, TimeoutError};
use crate::query;
use crate::transport::UdpTransport;

/// Default time to wait for an ERCI reply before giving up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Parameters accepted by [`ErciClient::send_command`]; which fields apply
/// depends on `command`, mirroring the source's all-optional keyword
/// arguments to `send_command`.
#[derive(Debug, Clone, Default)]
pub struct ErciCommandArgs {
    /// `SELECT_CONFIG`: configuration id, range 1..=255.
    pub config_id: Option<u8>,
    /// `SELECT_CONFIG`/`SWITCH_RING`: ring id, range 1..=255.
    pub ring_id: Option<u8>,
    /// `SELECT_CONFIG`/`SWITCH_RING`/`SWITCH_ANTENNA`: antenna id, range 1..=255.
    pub antenna_id: Option<u8>,
    /// `SET_CONFIGMODE`: 0 or 1.
    pub configmode_flag: Option<u8>,
    /// `PASSPORT_QUERY`: target MAC address, colon-separated or bare hex.
    pub mac_address: Option<String>,
    /// `PASSPORT_QUERY`: target serial number, ASCII, at most 26 bytes.
    pub serial_number: Option<String>,
}

/// A decoded ERCI reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ErciResponse {
    /// Reply to a command with no dedicated response frame.
    CommandResult {
        /// Whether the command succeeded.
        success: bool,
        /// Human-readable status text.
        status_msg: String,
    },
    /// Reply to `STATE_QUERY`.
    State {
        /// Reported lifecycle state.
        state: ErciState,
        /// Currently selected configuration id (0 if none).
        config_id: u8,
        /// Currently selected ring id (0 if none).
        ring_id: u8,
        /// Currently selected antenna id (0 if none).
        antenna_id: u8,
    },
    /// Reply to `DIAGNOSTIC_DESCRIPTION_QUERY`.
    DiagnosticDescription(String),
    /// Reply to `PASSPORT_QUERY`.
    PassportQuery {
        /// Whether the query succeeded.
        success: bool,
        /// Reported MAC address.
        mac_address: [u8; MAC_ADDRESS_LENGTH],
        /// Reported serial number (trimmed of trailing NULs).
        serial_number: String,
    },
    /// Reply to `GET_CSI_QUERY`.
    Csi {
        /// Whether the query succeeded.
        success: bool,
        /// This node's own station id.
        own_id: u16,
        /// All station ids the matrix covers.
        station_ids: Vec<u16>,
        /// Upper-triangular CSI magnitude matrix, row-major, scaled by
        /// [`CSI_SCALE`].
        matrix: Vec<f64>,
    },
}

fn parse_mac(s: &str) -> Result<[u8; MAC_ADDRESS_LENGTH], String> {
    let tokens: Vec<&str> = if s.contains(':') {
        s.split(':').collect()
    } else if s.len() == MAC_ADDRESS_LENGTH * 2 {
        (0..MAC_ADDRESS_LENGTH).map(|i| &s[i * 2..i * 2 + 2]).collect()
    } else {
        return Err(format!(
            "mac_address must be 6 hex bytes (optionally colon-separated): {s:?}"
        ));
    };
    if tokens.len() != MAC_ADDRESS_LENGTH {
        return Err(format!(
            "mac_address must be 6 hex bytes (optionally colon-separated): {s:?}"
        ));
    }
    let mut out = [0u8; MAC_ADDRESS_LENGTH];
    for (i, tok) in tokens.iter().enumerate() {
        out[i] = u8::from_str_radix(tok, 16).map_err(|_| format!("invalid hex byte {tok:?}"))?;
    }
    Ok(out)
}

fn pad_serial(s: &str) -> Result<[u8; SERIAL_NUMBER_LENGTH], String> {
    if s.len() > SERIAL_NUMBER_LENGTH {
        return Err(format!(
            "serial_number must be at most {SERIAL_NUMBER_LENGTH} bytes, got {}",
            s.len()
        ));
    }
    let mut out = [0u8; SERIAL_NUMBER_LENGTH];
    out[..s.len()].copy_from_slice(s.as_bytes());
    Ok(out)
}

/// An ERCI client bound to one transport, talking to one peer.
pub struct ErciClient {
    transport: UdpTransport,
    peer: SocketAddr,
    seq: AtomicU8,
    query_lock: Mutex<()>,
    timeout: Duration,
}

impl ErciClient {
    /// Builds a client that talks ERCI to `peer` over a fresh, locally bound
    /// transport.
    pub fn new(peer: SocketAddr) -> std::io::Result<Self> {
        let transport = UdpTransport::bind("0.0.0.0:0".parse().unwrap())?;
        Ok(Self {
            transport,
            peer,
            seq: AtomicU8::new(0),
            query_lock: Mutex::new(()),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Overrides the reply timeout (defaults to [`DEFAULT_TIMEOUT`]).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends `command` with `args`, failing immediately with
    /// [`ResourceLocked`] if another command is already in flight rather
    /// than blocking for it — the one place ERCI's client-facing contract
    /// differs from PPL's (see spec.md §7 and SPEC_FULL.md §5).
    pub fn send_command(
        &self,
        command: ErciCmd,
        args: &ErciCommandArgs,
    ) -> Result<ErciResponse, QueryError> {
        if let Some(id) = args.config_id {
            if !(1..=255).contains(&id) {
                return Err(ResponseError("config_id must be in 1..=255".into()).into());
            }
        }
        if let Some(id) = args.ring_id {
            if !(1..=255).contains(&id) {
                return Err(ResponseError("ring_id must be in 1..=255".into()).into());
            }
        }
        if let Some(id) = args.antenna_id {
            if !(1..=255).contains(&id) {
                return Err(ResponseError("antenna_id must be in 1..=255".into()).into());
            }
        }
        if let Some(flag) = args.configmode_flag {
            if flag > 1 {
                return Err(ResponseError("configmode_flag must be 0 or 1".into()).into());
            }
        }

        let mac = args
            .mac_address
            .as_deref()
            .map(parse_mac)
            .transpose()
            .map_err(ResponseError)?;
        let serial = args
            .serial_number
            .as_deref()
            .map(pad_serial)
            .transpose()
            .map_err(ResponseError)?;

        let _held = self
            .query_lock
            .try_lock()
            .map_err(|_| ResourceLocked)?;

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let frame = build_frame(command, seq, args, mac, serial);

        let datagram = query::execute(
            &self.transport,
            self.peer,
            frame,
            move |d| d.data.len() >= HEADER_SIZE && d.data[3] == seq,
            self.timeout,
        )
        .map_err(QueryError::from)?;

        decode_response(&datagram.data, seq).map_err(Into::into)
    }
}

fn build_frame(
    command: ErciCmd,
    seq: u8,
    args: &ErciCommandArgs,
    mac: Option<[u8; MAC_ADDRESS_LENGTH]>,
    serial: Option<[u8; SERIAL_NUMBER_LENGTH]>,
) -> Vec<u8> {
    let mut data = vec![RESERVED_VALUE, PROTOCOL_VERSION, command.to_u8(), seq];
    if let Some(id) = args.config_id {
        data.push(id);
    }
    if let Some(id) = args.ring_id {
        data.push(id);
    }
    if let Some(id) = args.antenna_id {
        data.push(id);
    }
    if let Some(flag) = args.configmode_flag {
        data.push(flag);
    }
    if let Some(mac) = mac {
        data.extend_from_slice(&mac);
    }
    if let Some(serial) = serial {
        data.extend_from_slice(&serial);
    }
    data
}

fn check_length(cmd: ErciCmd, data: &[u8]) -> Result<(), ResponseError> {
    let (expected, kind) = match packet_length(cmd) {
        Some(v) => v,
        None => return Ok(()),
    };
    let ok = match kind {
        PacketLengthKind::Minimum => data.len() >= expected,
        PacketLengthKind::Exact => data.len() == expected,
        PacketLengthKind::Maximum => data.len() <= expected,
    };
    if ok {
        Ok(())
    } else {
        Err(ResponseError(format!(
            "{cmd}: frame of {} bytes does not satisfy {kind:?} {expected}",
            data.len()
        )))
    }
}

fn decode_response(data: &[u8], expected_seq: u8) -> Result<ErciResponse, ResponseError> {
    if data.len() < HEADER_SIZE {
        return Err(ResponseError("short frame".into()));
    }
    if data[0] != RESERVED_VALUE {
        return Err(ResponseError(format!("reserved field not {RESERVED_VALUE}")));
    }
    if data[1] != PROTOCOL_VERSION {
        return Err(ResponseError(format!("version field not {PROTOCOL_VERSION}")));
    }
    if data[3] != expected_seq {
        return Err(ResponseError(format!(
            "mismatching sequence number: expected {expected_seq}, got {}",
            data[3]
        )));
    }

    let cmd = ErciCmd::from_u8(data[2]).ok_or_else(|| ResponseError("unknown response type".into()))?;
    if matches!(
        cmd,
        ErciCmd::Invalid
            | ErciCmd::SelectConfig
            | ErciCmd::SwitchRing
            | ErciCmd::Start
            | ErciCmd::Stop
            | ErciCmd::StateQuery
            | ErciCmd::DiagnosticDescriptionQuery
            | ErciCmd::PassportQuery
            | ErciCmd::Reboot
            | ErciCmd::GetCsiQuery
    ) {
        return Err(ResponseError(format!("response {cmd} should not have been received")));
    }

    check_length(cmd, data)?;

    match cmd {
        ErciCmd::CommandResult => {
            if *data.last().unwrap() != 0 {
                return Err(ResponseError("COMMAND_RESULT status message not NUL-terminated".into()));
            }
            let code = data[4];
            let status_msg = String::from_utf8_lossy(&data[5..data.len() - 1]).into_owned();
            Ok(ErciResponse::CommandResult {
                success: code == ErciResultCode::Success.to_u8(),
                status_msg,
            })
        }
        ErciCmd::StateResponse => {
            let state = ErciState::from_u8(data[4])
                .ok_or_else(|| ResponseError(format!("unknown state {}", data[4])))?;
            Ok(ErciResponse::State {
                state,
                config_id: data[5],
                ring_id: data[6],
                antenna_id: data[7],
            })
        }
        ErciCmd::DiagnosticDescriptionResponse => {
            if *data.last().unwrap() != 0 {
                return Err(ResponseError("diagnostic description not NUL-terminated".into()));
            }
            Ok(ErciResponse::DiagnosticDescription(
                String::from_utf8_lossy(&data[4..data.len() - 1]).into_owned(),
            ))
        }
        ErciCmd::PassportQueryResponse => {
            let code = data[4];
            let mut mac = [0u8; MAC_ADDRESS_LENGTH];
            mac.copy_from_slice(&data[5..5 + MAC_ADDRESS_LENGTH]);
            let serial_start = 5 + MAC_ADDRESS_LENGTH;
            let serial = String::from_utf8_lossy(
                &data[serial_start..serial_start + SERIAL_NUMBER_LENGTH],
            )
            .trim_end_matches('\0')
            .to_string();
            Ok(ErciResponse::PassportQuery {
                success: code == ErciResultCode::Success.to_u8(),
                mac_address: mac,
                serial_number: serial,
            })
        }
        ErciCmd::GetCsiResponse => {
            let code = data[4];
            if code != ErciResultCode::Success.to_u8() {
                return Ok(ErciResponse::Csi {
                    success: false,
                    own_id: 0,
                    station_ids: Vec::new(),
                    matrix: Vec::new(),
                });
            }
            let sta_start = 5;
            let sta_bytes = &data[sta_start..sta_start + CSI_STATION_COUNT * STAID_LENGTH];
            let station_ids: Vec<u16> = sta_bytes
                .chunks_exact(STAID_LENGTH)
                .map(BigEndian::read_u16)
                .collect();
            let own_id = station_ids[0];

            let csi_start = sta_start + CSI_STATION_COUNT * STAID_LENGTH;
            let pair_count = CSI_STATION_COUNT * (CSI_STATION_COUNT - 1) / 2;
            let matrix: Vec<f64> = data[csi_start..csi_start + pair_count * 4]
                .chunks_exact(4)
                .map(|c| BigEndian::read_u32(c) as f64 / CSI_SCALE)
                .collect();

            Ok(ErciResponse::Csi {
                success: true,
                own_id,
                station_ids,
                matrix,
            })
        }
        other => Err(ResponseError(format!("unhandled response type {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mac_accepts_both_notations() {
        assert_eq!(
            parse_mac("aa:bb:cc:dd:ee:ff").unwrap(),
            [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]
        );
        assert_eq!(
            parse_mac("aabbccddeeff").unwrap(),
            [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]
        );
        assert!(parse_mac("not-a-mac").is_err());
    }

    #[test]
    fn pad_serial_zero_fills_short_strings() {
        let padded = pad_serial("ABC").unwrap();
        assert_eq!(&padded[..3], b"ABC");
        assert!(padded[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn decode_command_result_reports_success() {
        let mut frame = vec![RESERVED_VALUE, PROTOCOL_VERSION, ErciCmd::CommandResult.to_u8(), 5];
        frame.push(ErciResultCode::Success.to_u8());
        frame.extend_from_slice(b"ok");
        frame.push(0);
        let decoded = decode_response(&frame, 5).unwrap();
        assert_eq!(
            decoded,
            ErciResponse::CommandResult {
                success: true,
                status_msg: "ok".to_string(),
            }
        );
    }

    #[test]
    fn decode_rejects_sequence_mismatch() {
        let mut frame = vec![RESERVED_VALUE, PROTOCOL_VERSION, ErciCmd::CommandResult.to_u8(), 5];
        frame.push(ErciResultCode::Success.to_u8());
        frame.push(0);
        assert!(decode_response(&frame, 9).is_err());
    }

    #[test]
    fn decode_state_response_roundtrips_fields() {
        let frame = vec![
            RESERVED_VALUE,
            PROTOCOL_VERSION,
            ErciCmd::StateResponse.to_u8(),
            1,
            ErciState::Running.to_u8(),
            3,
            2,
            1,
        ];
        let decoded = decode_response(&frame, 1).unwrap();
        assert_eq!(
            decoded,
            ErciResponse::State {
                state: ErciState::Running,
                config_id: 3,
                ring_id: 2,
                antenna_id: 1,
            }
        );
    }
}
