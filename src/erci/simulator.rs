//! `Simulator`: an in-process ERCI node used for tests and local ring rigs,
//! grounded on `r3erci/standaloneServer.py`'s `StandaloneServer`.
//!
//! The source's handler comments every state transition with `# TODO: Could
//! do some FSM check here` and never does one — any command is accepted in
//! any state. This is the one place SPEC_FULL.md calls for a redesign: this
//! simulator enforces the state machine for real and answers out-of-state
//! commands with `WRONG_STATE`, per the state diagram in spec.md §4.6:
//! STARTUP -> READY, READY <-> CONFIGURED via SELECT_CONFIG, CONFIGURED ->
//! RUNNING via START, RUNNING -> READY via STOP, RUNNING -> RUNNING via
//! SWITCH_RING/SWITCH_ANTENNA, any -> FAULT.

use std::collections::HashMap;

use crate::erci::constants::*;

/// Per-peer state the simulator tracks, the Rust analogue of the source's
/// `erebStates` dict entries.
#[derive(Debug, Clone, Copy)]
struct NodeState {
    state: ErciState,
    config_id: u8,
    ring_id: u8,
    antenna_id: u8,
    configmode_flag: u8,
    mac_address: [u8; MAC_ADDRESS_LENGTH],
    serial_number: [u8; SERIAL_NUMBER_LENGTH],
}

impl Default for NodeState {
    fn default() -> Self {
        NodeState {
            state: ErciState::Ready,
            config_id: INVALID_CONFIG,
            ring_id: INVALID_RING,
            antenna_id: INVALID_ANTENNA,
            configmode_flag: 0,
            mac_address: [0; MAC_ADDRESS_LENGTH],
            serial_number: [0; SERIAL_NUMBER_LENGTH],
        }
    }
}

/// One reply frame the simulator wants sent back to a peer, already
/// addressed by key.
#[derive(Debug, Clone)]
pub struct Outbox(pub Vec<u8>);

/// In-process ERCI node simulator. Not networked itself — callers decide how
/// request/reply bytes reach it, typically by wiring it to a
/// [`crate::transport::UdpTransport`] in a test harness.
#[derive(Debug, Default)]
pub struct Simulator {
    nodes: HashMap<String, NodeState>,
}

impl Simulator {
    /// Builds a simulator with no nodes yet known.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current reported state for `peer`, defaulting to [`ErciState::Ready`]
    /// for a peer never seen before, matching the source's `setdefault`.
    pub fn state_of(&self, peer: &str) -> ErciState {
        self.nodes.get(peer).map(|n| n.state).unwrap_or(ErciState::Ready)
    }

    /// Preconfigures the passport (MAC address and serial number) a peer
    /// reports back to `PASSPORT_QUERY`, for tests and fixture setup.
    pub fn set_passport(&mut self, peer: &str, mac: [u8; MAC_ADDRESS_LENGTH], serial: &str) {
        let node = self.nodes.entry(peer.to_string()).or_default();
        node.mac_address = mac;
        let mut serial_bytes = [0u8; SERIAL_NUMBER_LENGTH];
        let n = serial.len().min(SERIAL_NUMBER_LENGTH);
        serial_bytes[..n].copy_from_slice(&serial.as_bytes()[..n]);
        node.serial_number = serial_bytes;
    }

    /// Processes one inbound frame from `peer`, returning the reply frame to
    /// send back (if any — `REBOOT` and unrecognized commands get no reply,
    /// matching the source).
    pub fn handle(&mut self, peer: &str, data: &[u8]) -> Option<Outbox> {
        if data.len() < HEADER_SIZE {
            return Some(self.command_result(255, ErciResultCode::InvalidDataReceived, "Short frame."));
        }

        if data[0] != RESERVED_VALUE || data[1] != PROTOCOL_VERSION {
            return None;
        }

        let cmd = match ErciCmd::from_u8(data[2]) {
            Some(c) => c,
            None => return Some(self.command_result(data[3], ErciResultCode::InvalidMessageReceived, "")),
        };
        let seq = data[3];

        if matches!(cmd, ErciCmd::Invalid | ErciCmd::CommandResult | ErciCmd::StateResponse) {
            return Some(self.command_result(seq, ErciResultCode::InvalidMessageReceived, ""));
        }

        let (expected, kind) = packet_length(cmd).expect("non-INVALID command has a length entry");
        let length_ok = match kind {
            PacketLengthKind::Minimum => data.len() >= expected,
            PacketLengthKind::Exact => data.len() == expected,
            PacketLengthKind::Maximum => data.len() <= expected,
        };
        if !length_ok {
            return Some(self.command_result(seq, ErciResultCode::InvalidDataReceived, "Wrong frame length."));
        }

        let node = self.nodes.entry(peer.to_string()).or_default();
        let reply = match cmd {
            ErciCmd::SelectConfig => {
                if !matches!(node.state, ErciState::Ready | ErciState::Configured) {
                    return Some(self.wrong_state(seq));
                }
                node.state = ErciState::Configured;
                node.config_id = data[4];
                node.ring_id = data[5];
                node.antenna_id = data[6];
                self.command_result(
                    seq,
                    ErciResultCode::Success,
                    &format!(
                        "Selected config {} ring {} antenna {}",
                        node.config_id, node.ring_id, node.antenna_id
                    ),
                )
            }
            ErciCmd::SwitchRing => {
                if node.state != ErciState::Running {
                    return Some(self.wrong_state(seq));
                }
                node.ring_id = data[4];
                node.antenna_id = data[5];
                self.command_result(
                    seq,
                    ErciResultCode::Success,
                    &format!("Switched to ring {} antenna {}", node.ring_id, node.antenna_id),
                )
            }
            ErciCmd::Start => {
                if node.state != ErciState::Configured {
                    return Some(self.wrong_state(seq));
                }
                node.state = ErciState::Running;
                self.command_result(seq, ErciResultCode::Success, "Started ring.")
            }
            ErciCmd::Stop => {
                if node.state != ErciState::Running {
                    return Some(self.wrong_state(seq));
                }
                node.state = ErciState::Ready;
                self.command_result(seq, ErciResultCode::Success, "Stopped ring.")
            }
            ErciCmd::StateQuery => {
                let frame = self.frame(
                    ErciCmd::StateResponse,
                    seq,
                    &[node.state.to_u8(), node.config_id, node.ring_id, node.antenna_id],
                );
                return Some(Outbox(frame));
            }
            ErciCmd::DiagnosticDescriptionQuery => {
                let mut payload = b"r3link simulated node".to_vec();
                payload.push(0);
                return Some(Outbox(self.frame(ErciCmd::DiagnosticDescriptionResponse, seq, &payload)));
            }
            ErciCmd::SwitchAntenna => {
                if node.state != ErciState::Running {
                    return Some(self.wrong_state(seq));
                }
                node.antenna_id = data[4];
                self.command_result(seq, ErciResultCode::Success, &format!("Switched to antenna {}", node.antenna_id))
            }
            ErciCmd::SetConfigMode => {
                node.configmode_flag = data[4];
                self.command_result(seq, ErciResultCode::Success, &format!("Switched configmode flag to {}", node.configmode_flag))
            }
            ErciCmd::Reboot => {
                node.state = ErciState::Startup;
                return None;
            }
            ErciCmd::PassportQuery => {
                let mut payload = vec![ErciResultCode::Success.to_u8()];
                payload.extend_from_slice(&node.mac_address);
                payload.extend_from_slice(&node.serial_number);
                return Some(Outbox(self.frame(ErciCmd::PassportQueryResponse, seq, &payload)));
            }
            ErciCmd::GetCsiQuery => {
                if node.state != ErciState::Running {
                    return Some(self.wrong_state(seq));
                }
                return Some(Outbox(self.frame(ErciCmd::GetCsiResponse, seq, &self.synthetic_csi())));
            }
            _ => return None,
        };
        Some(reply)
    }

    /// Builds a deterministic `GET_CSI_RESPONSE` payload: station ids
    /// `1..=20` and a zeroed upper-triangular magnitude matrix, since the
    /// simulator has no real antenna hardware to sample.
    fn synthetic_csi(&self) -> Vec<u8> {
        let mut payload = vec![ErciResultCode::Success.to_u8()];
        for id in 1..=CSI_STATION_COUNT as u16 {
            payload.extend_from_slice(&id.to_be_bytes());
        }
        let pair_count = CSI_STATION_COUNT * (CSI_STATION_COUNT - 1) / 2;
        payload.extend(std::iter::repeat(0u8).take(pair_count * 4));
        payload
    }

    fn wrong_state(&self, seq: u8) -> Outbox {
        self.command_result(seq, ErciResultCode::WrongState, "Command not valid in current state.")
    }

    fn command_result(&self, seq: u8, code: ErciResultCode, status_msg: &str) -> Outbox {
        let mut payload = vec![code.to_u8()];
        payload.extend_from_slice(status_msg.as_bytes());
        payload.push(0);
        Outbox(self.frame(ErciCmd::CommandResult, seq, &payload))
    }

    fn frame(&self, cmd: ErciCmd, seq: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![RESERVED_VALUE, PROTOCOL_VERSION, cmd.to_u8(), seq];
        data.extend_from_slice(payload);
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select_config(seq: u8, config: u8, ring: u8, antenna: u8) -> Vec<u8> {
        vec![RESERVED_VALUE, PROTOCOL_VERSION, ErciCmd::SelectConfig.to_u8(), seq, config, ring, antenna]
    }

    fn fixed(cmd: ErciCmd, seq: u8) -> Vec<u8> {
        vec![RESERVED_VALUE, PROTOCOL_VERSION, cmd.to_u8(), seq]
    }

    #[test]
    fn full_select_start_stop_cycle_succeeds() {
        let mut sim = Simulator::new();
        let peer = "10.0.0.5";

        let reply = sim.handle(peer, &select_config(1, 3, 1, 1)).unwrap();
        assert_eq!(reply.0[2], ErciCmd::CommandResult.to_u8());
        assert_eq!(reply.0[4], ErciResultCode::Success.to_u8());
        assert_eq!(sim.state_of(peer), ErciState::Configured);

        let reply = sim.handle(peer, &fixed(ErciCmd::Start, 2)).unwrap();
        assert_eq!(reply.0[4], ErciResultCode::Success.to_u8());
        assert_eq!(sim.state_of(peer), ErciState::Running);

        let reply = sim.handle(peer, &fixed(ErciCmd::Stop, 3)).unwrap();
        assert_eq!(reply.0[4], ErciResultCode::Success.to_u8());
        assert_eq!(sim.state_of(peer), ErciState::Ready);
    }

    #[test]
    fn start_before_select_config_is_wrong_state() {
        let mut sim = Simulator::new();
        let reply = sim.handle("10.0.0.6", &fixed(ErciCmd::Start, 1)).unwrap();
        assert_eq!(reply.0[2], ErciCmd::CommandResult.to_u8());
        assert_eq!(reply.0[4], ErciResultCode::WrongState.to_u8());
    }

    #[test]
    fn switch_ring_requires_running_state() {
        let mut sim = Simulator::new();
        let peer = "10.0.0.7";
        sim.handle(peer, &select_config(1, 1, 1, 1));
        let switch = vec![RESERVED_VALUE, PROTOCOL_VERSION, ErciCmd::SwitchRing.to_u8(), 2, 2, 2];
        let reply = sim.handle(peer, &switch).unwrap();
        assert_eq!(reply.0[4], ErciResultCode::WrongState.to_u8());

        sim.handle(peer, &fixed(ErciCmd::Start, 3));
        let switch = vec![RESERVED_VALUE, PROTOCOL_VERSION, ErciCmd::SwitchRing.to_u8(), 4, 5, 5];
        let reply = sim.handle(peer, &switch).unwrap();
        assert_eq!(reply.0[4], ErciResultCode::Success.to_u8());
    }

    #[test]
    fn rejects_frame_with_wrong_length() {
        let mut sim = Simulator::new();
        let short = vec![RESERVED_VALUE, PROTOCOL_VERSION, ErciCmd::SelectConfig.to_u8(), 1, 1];
        let reply = sim.handle("10.0.0.8", &short).unwrap();
        assert_eq!(reply.0[4], ErciResultCode::InvalidDataReceived.to_u8());
    }

    #[test]
    fn passport_query_reports_configured_identity() {
        let mut sim = Simulator::new();
        let peer = "10.0.0.9";
        sim.set_passport(peer, [1, 2, 3, 4, 5, 6], "SN-001");

        let mut query = vec![RESERVED_VALUE, PROTOCOL_VERSION, ErciCmd::PassportQuery.to_u8(), 1];
        query.extend_from_slice(&[0; MAC_ADDRESS_LENGTH]);
        query.extend_from_slice(&[0; SERIAL_NUMBER_LENGTH]);

        let reply = sim.handle(peer, &query).unwrap();
        assert_eq!(reply.0[2], ErciCmd::PassportQueryResponse.to_u8());
        assert_eq!(reply.0[4], ErciResultCode::Success.to_u8());
        assert_eq!(&reply.0[5..11], &[1, 2, 3, 4, 5, 6]);
        assert!(reply.0[11..].starts_with(b"SN-001"));
    }

    #[test]
    fn get_csi_query_requires_running_state() {
        let mut sim = Simulator::new();
        let peer = "10.0.0.10";
        let query = fixed(ErciCmd::GetCsiQuery, 1);

        let reply = sim.handle(peer, &query).unwrap();
        assert_eq!(reply.0[4], ErciResultCode::WrongState.to_u8());

        sim.handle(peer, &select_config(2, 1, 1, 1));
        sim.handle(peer, &fixed(ErciCmd::Start, 3));
        let reply = sim.handle(peer, &fixed(ErciCmd::GetCsiQuery, 4)).unwrap();
        assert_eq!(reply.0[2], ErciCmd::GetCsiResponse.to_u8());
        assert_eq!(reply.0[4], ErciResultCode::Success.to_u8());
        assert_eq!(reply.0.len(), 4 + 1 + CSI_STATION_COUNT * STAID_LENGTH + (CSI_STATION_COUNT * (CSI_STATION_COUNT - 1) / 2) * 4);
    }
}
