//! End-to-end test driving `ConfigureOrchestrator` against a hand-rolled
//! fake PPL node over real UDP sockets — the controller-side counterpart to
//! `tests/erci.rs`'s simulated node, since PPL has no standalone node
//! simulator in this codebase (see DESIGN.md).

use std::net::Ipv4Addr;
use std::time::Duration;

use r3link::mac::MacAddress;
use r3link::ppl::client::PplClient;
use r3link::ppl::enums::{ConfigStorageMode, MacOptimization, MacReliability, SecurityMode};
use r3link::ppl::messages::*;
use r3link::ppl::orchestrator::{ConfigureOrchestrator, ConfigureRequest, LogResult, SlotConfig};
use r3link::ppl::protocol::{deserialize_message, serialize_message};
use r3link::ppl::subprotocols::{ConfigurationMessage, PairingMessage, PplPacket};
use r3link::transport::UdpTransport;

fn local(port_hint: u16) -> std::net::SocketAddr {
    format!("127.0.0.1:{port_hint}").parse().unwrap()
}

/// Always-accepts fake node: answers every request with the success reply
/// its subprotocol expects, never a `GenericError`.
fn spawn_accepting_node() -> std::net::SocketAddr {
    let server = UdpTransport::bind(local(0)).unwrap();
    let addr = server.local_addr();
    let (rx, guard) = server.subscribe_filtered(|_| true);

    std::thread::spawn(move || {
        let _guard = guard;
        while let Ok(datagram) = rx.recv_timeout(Duration::from_secs(30)) {
            let Ok((seq, request)) = deserialize_message(&datagram.data) else { continue };
            let reply = match request {
                PplPacket::Pairing(PairingMessage::PairNode(PairNode { mac })) => {
                    PplPacket::Pairing(PairingMessage::PairSuccess(PairSuccess { mac, assigned_id: 1 }))
                }
                PplPacket::Pairing(PairingMessage::UnpairNode(UnpairNode { mac })) => {
                    PplPacket::Pairing(PairingMessage::UnpairNode(UnpairNode { mac }))
                }
                PplPacket::Configuration(ConfigurationMessage::StartConfigSetTransaction(_)) => {
                    PplPacket::Configuration(ConfigurationMessage::StartConfigSetTransaction(
                        StartConfigSetTransaction { storage_mode: ConfigStorageMode::Persist },
                    ))
                }
                PplPacket::Configuration(ConfigurationMessage::SetGlobalHostConfig(cfg)) => {
                    PplPacket::Configuration(ConfigurationMessage::SetGlobalHostConfig(cfg))
                }
                PplPacket::Configuration(ConfigurationMessage::SelectConfigSlot(cfg)) => {
                    PplPacket::Configuration(ConfigurationMessage::SelectConfigSlot(cfg))
                }
                PplPacket::Configuration(ConfigurationMessage::SetMacConfig(cfg)) => {
                    PplPacket::Configuration(ConfigurationMessage::SetMacConfig(cfg))
                }
                PplPacket::Configuration(ConfigurationMessage::SetHostConfig(cfg)) => {
                    PplPacket::Configuration(ConfigurationMessage::SetHostConfig(cfg))
                }
                PplPacket::Configuration(ConfigurationMessage::FinalizeConfigSlot(_)) => {
                    PplPacket::Configuration(ConfigurationMessage::FinalizeConfigSlot(FinalizeConfigSlot {}))
                }
                PplPacket::Configuration(ConfigurationMessage::CommitConfigSet(_)) => {
                    PplPacket::Configuration(ConfigurationMessage::CommitConfigSet(CommitConfigSet {}))
                }
                PplPacket::Configuration(ConfigurationMessage::ValidateMacConfig(cfg)) => {
                    PplPacket::Configuration(ConfigurationMessage::ValidateMacConfig(cfg))
                }
                other => {
                    eprintln!("fake node: unhandled request {other:?}");
                    continue;
                }
            };
            if let Ok(frame) = serialize_message(seq, &reply) {
                let _ = server.send_to(frame, datagram.from);
            }
        }
    });

    addr
}

/// Fake node that answers pairing/transaction-setup/select/validate normally
/// but never replies to `SetMacConfig`, `SetHostConfig`, `FinalizeConfigSlot`,
/// `CommitConfigSet`, or `UnpairNode` — a link that dies partway through a
/// slot, so every step the orchestrator's best-effort compensation attempts
/// after the initial timeout times out in turn too.
fn spawn_node_dropping_mid_transaction() -> std::net::SocketAddr {
    let server = UdpTransport::bind(local(0)).unwrap();
    let addr = server.local_addr();
    let (rx, guard) = server.subscribe_filtered(|_| true);

    std::thread::spawn(move || {
        let _guard = guard;
        while let Ok(datagram) = rx.recv_timeout(Duration::from_secs(30)) {
            let Ok((seq, request)) = deserialize_message(&datagram.data) else { continue };
            let reply = match request {
                PplPacket::Pairing(PairingMessage::PairNode(PairNode { mac })) => {
                    PplPacket::Pairing(PairingMessage::PairSuccess(PairSuccess { mac, assigned_id: 1 }))
                }
                PplPacket::Configuration(ConfigurationMessage::StartConfigSetTransaction(_)) => {
                    PplPacket::Configuration(ConfigurationMessage::StartConfigSetTransaction(
                        StartConfigSetTransaction { storage_mode: ConfigStorageMode::Persist },
                    ))
                }
                PplPacket::Configuration(ConfigurationMessage::SetGlobalHostConfig(cfg)) => {
                    PplPacket::Configuration(ConfigurationMessage::SetGlobalHostConfig(cfg))
                }
                PplPacket::Configuration(ConfigurationMessage::SelectConfigSlot(cfg)) => {
                    PplPacket::Configuration(ConfigurationMessage::SelectConfigSlot(cfg))
                }
                PplPacket::Configuration(ConfigurationMessage::ValidateMacConfig(cfg)) => {
                    PplPacket::Configuration(ConfigurationMessage::ValidateMacConfig(cfg))
                }
                // SetMacConfig, SetHostConfig, FinalizeConfigSlot, CommitConfigSet,
                // and UnpairNode are all silently dropped: the link is gone.
                _ => continue,
            };
            if let Ok(frame) = serialize_message(seq, &reply) {
                let _ = server.send_to(frame, datagram.from);
            }
        }
    });

    addr
}

fn sample_request(mac: MacAddress) -> ConfigureRequest {
    ConfigureRequest {
        mac,
        clear_first: false,
        validate_first: true,
        storage_mode: ConfigStorageMode::Persist,
        global_host_config: SetGlobalHostConfig {
            dhcp_client: 1,
            dns_primary: Ipv4Addr::UNSPECIFIED,
            dns_secondary: Ipv4Addr::UNSPECIFIED,
            ntp_server: Ipv4Addr::UNSPECIFIED,
            domain: String::new(),
        },
        slots: vec![SlotConfig {
            slot: 0,
            mac_config: SetMacConfig {
                mac,
                latency: 1,
                payload_size: 10,
                reliability: MacReliability::Unspecified,
                station_count: 2,
                optimization: MacOptimization::Latency,
                total_ptts: 2,
                is_static: 1,
                security_mode: SecurityMode::None,
            },
            host_config: SetHostConfig {
                dhcp_client: 1,
                ip: Ipv4Addr::UNSPECIFIED,
                netmask: Ipv4Addr::UNSPECIFIED,
                gateway: Ipv4Addr::UNSPECIFIED,
                subnets: vec![],
            },
        }],
    }
}

#[test]
fn full_configure_transaction_succeeds_and_logs_every_step() {
    let peer = spawn_accepting_node();
    let client = PplClient::new(peer).unwrap().with_timeout(Duration::from_secs(2));
    let orchestrator = ConfigureOrchestrator::new(&client);

    let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
    let mut tick = 0u32;
    let (log, result) = orchestrator.run_configure(&sample_request(mac), || {
        tick += 1;
        format!("t{tick}")
    });

    assert!(log.iter().all(|row| row.result == LogResult::Ok), "log: {log:?}");
    assert!(result.is_ok());
    // pair, validate slot 0, start tx, global hc, select slot 0, set-mac slot 0,
    // set-host slot 0, finalize slot 0, commit, unpair.
    assert_eq!(log.len(), 10);
}

#[test]
fn unreachable_peer_times_out_and_still_unpairs_attempt() {
    let unreachable = local(1); // nothing bound here
    let client = PplClient::new(unreachable)
        .unwrap()
        .with_timeout(Duration::from_millis(150));
    let orchestrator = ConfigureOrchestrator::new(&client);

    let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
    let mut tick = 0u32;
    let (log, result) = orchestrator.run_configure(&sample_request(mac), || {
        tick += 1;
        format!("t{tick}")
    });

    assert!(result.is_err());
    assert_eq!(log.len(), 1, "only the failed pair attempt should be logged: {log:?}");
    assert_eq!(log[0].result, LogResult::Err);
}

#[test]
fn mid_transaction_failure_attempts_best_effort_finalize_commit_and_unpair() {
    let peer = spawn_node_dropping_mid_transaction();
    let client = PplClient::new(peer).unwrap().with_timeout(Duration::from_millis(150));
    let orchestrator = ConfigureOrchestrator::new(&client);

    let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
    let mut request = sample_request(mac);
    request.validate_first = false;
    let mut second_slot = request.slots[0].clone();
    second_slot.slot = 1;
    request.slots.push(second_slot);

    let mut tick = 0u32;
    let (log, result) = orchestrator.run_configure(&request, || {
        tick += 1;
        format!("t{tick}")
    });

    assert!(result.is_err());
    assert_eq!(
        log.last().unwrap().result,
        LogResult::Err,
        "compensation must end with the failed unpair attempt: {log:?}"
    );

    let messages: Vec<&str> = log
        .iter()
        .filter_map(|row| row.message.as_deref())
        .collect();
    assert!(
        messages.iter().any(|m| m.contains("clear")),
        "expected a hint recommending an explicit clear: {log:?}"
    );
    assert!(
        messages
            .iter()
            .any(|m| m.contains("finalize slot (best-effort compensation)")),
        "expected a best-effort finalize attempt: {log:?}"
    );
    assert!(
        messages
            .iter()
            .any(|m| m.contains("commit config set (best-effort compensation)")),
        "expected a best-effort commit attempt: {log:?}"
    );
    assert!(
        messages.iter().any(|m| m.contains("unpair node")),
        "expected a final unpair attempt: {log:?}"
    );
}
