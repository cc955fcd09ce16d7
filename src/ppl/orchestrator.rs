//! `ConfigureOrchestrator`: the multi-step PPL configuration transaction,
//! grounded on `client.py`'s `runCmdConfigure`/`runCmdClear`/`runCmdTest`.
//!
//! The source tracks how far it got into the transaction by checking
//! `'var' in locals()` before running its `finally`-block compensation. That
//! idiom has no Rust equivalent (and wouldn't be good Rust if it did); this
//! realizes the same compensation logic with an explicit [`Phase`] enum
//! instead, per SPEC_FULL.md §9.

use md5::{Digest, Md5};

use crate::error::QueryError;
use crate::mac::MacAddress;
use crate::ppl::client::PplClient;
use crate::ppl::enums::ConfigStorageMode;
use crate::ppl::messages::*;
use crate::ppl::subprotocols::{ConfigurationMessage, PairingMessage, PplPacket};

/// How far a configure transaction progressed before it stopped, successfully
/// or not. Drives the compensation (rollback) logic in place of the
/// source's `'var' in locals()` checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has happened yet; no pairing to undo.
    NotPaired,
    /// `PairNode` succeeded.
    Paired,
    /// `StartConfigSetTransaction` succeeded.
    TxStarted,
    /// `SetGlobalHostConfig` succeeded.
    GlobalHcApplied,
    /// At least one slot's `SELECT`/`SET_MAC`/`SET_HOST`/`FINALIZE` sequence
    /// has started.
    SlotsInProgress,
    /// `CommitConfigSet` succeeded.
    Committed,
    /// `UnpairNode` has already run; no further compensation needed.
    Unpaired,
}

/// Outcome of one step, for the external log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogResult {
    /// The step succeeded.
    Ok,
    /// The step failed.
    Err,
}

/// One row of the orchestrator's external-facing log — the Rust realization
/// of the source's parallel `response`/`timestamp`/`message` lists, kept as
/// a single `Vec<LogRow>` instead (see SPEC_FULL.md §4.5).
#[derive(Debug, Clone)]
pub struct LogRow {
    /// Outcome of this step.
    pub result: LogResult,
    /// Wall-clock timestamp, caller-supplied so tests stay deterministic
    /// (this runtime never calls a clock internally; see
    /// [`ConfigureOrchestrator::run_configure`]).
    pub timestamp: String,
    /// Optional human-readable detail.
    pub message: Option<String>,
}

/// Per-slot MAC and host configuration to apply during a transaction.
#[derive(Debug, Clone)]
pub struct SlotConfig {
    /// Slot index to select before applying this configuration.
    pub slot: u8,
    /// MAC-layer parameters for this slot.
    pub mac_config: SetMacConfig,
    /// Host-side IP configuration for this slot.
    pub host_config: SetHostConfig,
}

/// A full configure-transaction request.
#[derive(Debug, Clone)]
pub struct ConfigureRequest {
    /// Node to configure.
    pub mac: MacAddress,
    /// Whether to clear any existing configuration set before starting.
    pub clear_first: bool,
    /// Whether to validate every slot's MAC config before applying any of
    /// them. A validation failure is logged and iteration continues to the
    /// next slot (report-all); it does not abort the transaction. This
    /// mirrors the source precisely and is an intentional asymmetry with
    /// `SetMacConfig` failures, which do abort — see DESIGN.md.
    pub validate_first: bool,
    /// Where the node should persist the new configuration set.
    pub storage_mode: ConfigStorageMode,
    /// Global host configuration applied once, before any per-slot config.
    pub global_host_config: SetGlobalHostConfig,
    /// Per-slot configuration to apply, in order.
    pub slots: Vec<SlotConfig>,
}

/// Failure of a configure transaction, after compensation has already run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigureError {
    /// A required step failed; the transaction was aborted and
    /// compensation (unpair, if applicable) has already run.
    #[error("configure transaction aborted: {0}")]
    Aborted(#[source] QueryError),
}

/// Drives a configure transaction against a single [`PplClient`].
pub struct ConfigureOrchestrator<'a> {
    client: &'a PplClient,
}

impl<'a> ConfigureOrchestrator<'a> {
    /// Builds an orchestrator for `client`.
    pub fn new(client: &'a PplClient) -> Self {
        Self { client }
    }

    /// Runs a full configure transaction. `now` is called once per logged
    /// step to stamp it — injected rather than read from a clock internally
    /// so tests remain deterministic (see SPEC_FULL.md's test-tooling
    /// section).
    pub fn run_configure(
        &self,
        req: &ConfigureRequest,
        mut now: impl FnMut() -> String,
    ) -> (Vec<LogRow>, Result<u64, ConfigureError>) {
        let mut log = Vec::new();
        let mut phase = Phase::NotPaired;

        let result = self.run_steps(req, &mut phase, &mut log, &mut now);
        self.compensate(req, phase, &mut log, &mut now);

        (log, result.map_err(ConfigureError::Aborted))
    }

    fn log_step(
        log: &mut Vec<LogRow>,
        now: &mut impl FnMut() -> String,
        outcome: &Result<PplPacket, QueryError>,
        context: &str,
    ) {
        match outcome {
            Ok(_) => log.push(LogRow {
                result: LogResult::Ok,
                timestamp: now(),
                message: None,
            }),
            Err(err) => log.push(LogRow {
                result: LogResult::Err,
                timestamp: now(),
                message: Some(format!("{context}: {err}")),
            }),
        }
    }

    fn run_steps(
        &self,
        req: &ConfigureRequest,
        phase: &mut Phase,
        log: &mut Vec<LogRow>,
        now: &mut impl FnMut() -> String,
    ) -> Result<u64, QueryError> {
        let pair = self
            .client
            .send_command(PplPacket::Pairing(PairingMessage::PairNode(PairNode {
                mac: req.mac,
            })));
        Self::log_step(log, now, &pair, "pair node");
        pair?;
        *phase = Phase::Paired;

        if req.validate_first {
            for slot in &req.slots {
                let outcome = self.client.send_command(PplPacket::Configuration(
                    ConfigurationMessage::ValidateMacConfig(ValidateMacConfig {
                        mac: slot.mac_config.mac,
                        latency: slot.mac_config.latency,
                        payload_size: slot.mac_config.payload_size,
                        reliability: slot.mac_config.reliability,
                        station_count: slot.mac_config.station_count,
                        optimization: slot.mac_config.optimization,
                        total_ptts: slot.mac_config.total_ptts,
                        is_static: slot.mac_config.is_static,
                        security_mode: slot.mac_config.security_mode,
                    }),
                ));
                // Report-all: a validation failure is logged but does not
                // abort the loop, matching the source and DESIGN.md.
                Self::log_step(log, now, &outcome, &format!("validate slot {}", slot.slot));
            }
        }

        if req.clear_first {
            let cleared = self.client.send_command(PplPacket::Configuration(
                ConfigurationMessage::ClearConfigSet(ClearConfigSet {}),
            ));
            Self::log_step(log, now, &cleared, "clear config set");
            cleared?;
        }

        let started = self.client.send_command(PplPacket::Configuration(
            ConfigurationMessage::StartConfigSetTransaction(StartConfigSetTransaction {
                storage_mode: req.storage_mode,
            }),
        ));
        Self::log_step(log, now, &started, "start config set transaction");
        started?;
        *phase = Phase::TxStarted;

        let global = self.client.send_command(PplPacket::Configuration(
            ConfigurationMessage::SetGlobalHostConfig(req.global_host_config.clone()),
        ));
        Self::log_step(log, now, &global, "set global host config");
        global?;
        *phase = Phase::GlobalHcApplied;

        for slot in &req.slots {
            *phase = Phase::SlotsInProgress;

            let selected = self.client.send_command(PplPacket::Configuration(
                ConfigurationMessage::SelectConfigSlot(SelectConfigSlot { slot: slot.slot }),
            ));
            Self::log_step(log, now, &selected, &format!("select slot {}", slot.slot));
            selected?;

            // Unlike validation, a SetMacConfig failure aborts immediately:
            // the device is left with the slot selected but not configured,
            // which the final unpair step implicitly discards.
            let mac_set = self.client.send_command(PplPacket::Configuration(
                ConfigurationMessage::SetMacConfig(slot.mac_config.clone()),
            ));
            Self::log_step(log, now, &mac_set, &format!("set mac config slot {}", slot.slot));
            mac_set?;

            let host_set = self.client.send_command(PplPacket::Configuration(
                ConfigurationMessage::SetHostConfig(slot.host_config.clone()),
            ));
            Self::log_step(log, now, &host_set, &format!("set host config slot {}", slot.slot));
            host_set?;

            let finalized = self.client.send_command(PplPacket::Configuration(
                ConfigurationMessage::FinalizeConfigSlot(FinalizeConfigSlot {}),
            ));
            Self::log_step(log, now, &finalized, &format!("finalize slot {}", slot.slot));
            finalized?;
        }

        let committed = self.client.send_command(PplPacket::Configuration(
            ConfigurationMessage::CommitConfigSet(CommitConfigSet {}),
        ));
        Self::log_step(log, now, &committed, "commit config set");
        committed?;
        *phase = Phase::Committed;

        Ok(compute_uid(req))
    }

    /// Runs compensation for however far the transaction got, per spec.md
    /// §4.5 "Mid-transaction failure": a failure after `START_TX` leaves the
    /// device mid-transaction, so `FinalizeConfigSlot` and `CommitConfigSet`
    /// are attempted best-effort (ignoring their own outcome) to return the
    /// device to a closed, coherent state before unpairing. A failure before
    /// `START_TX` (validation/clear) never opened a transaction, so only
    /// `UnpairNode` is needed. This function also runs on the happy path
    /// (`phase == Committed`), where it does nothing but the final unpair.
    fn compensate(
        &self,
        req: &ConfigureRequest,
        phase: Phase,
        log: &mut Vec<LogRow>,
        now: &mut impl FnMut() -> String,
    ) {
        match phase {
            Phase::NotPaired | Phase::Unpaired => return,
            Phase::Paired | Phase::Committed => {}
            Phase::TxStarted | Phase::GlobalHcApplied | Phase::SlotsInProgress => {
                if phase == Phase::SlotsInProgress && req.slots.len() > 1 {
                    log.push(LogRow {
                        result: LogResult::Err,
                        timestamp: now(),
                        message: Some(
                            "a slot was partially configured before this failure; run an \
                             explicit `clear` to remove any half-applied configuration"
                                .to_string(),
                        ),
                    });
                }

                let finalized = self.client.send_command(PplPacket::Configuration(
                    ConfigurationMessage::FinalizeConfigSlot(FinalizeConfigSlot {}),
                ));
                Self::log_step(log, now, &finalized, "finalize slot (best-effort compensation)");

                let committed = self.client.send_command(PplPacket::Configuration(
                    ConfigurationMessage::CommitConfigSet(CommitConfigSet {}),
                ));
                Self::log_step(log, now, &committed, "commit config set (best-effort compensation)");
            }
        }

        let unpaired = self
            .client
            .send_command(PplPacket::Pairing(PairingMessage::UnpairNode(UnpairNode {
                mac: req.mac,
            })));
        Self::log_step(log, now, &unpaired, "unpair node");
    }
}

/// Computes the configuration set UID: an MD5 digest of the transaction's
/// identifying fields, truncated to 64 bits, matching the source's
/// `_getConfigUid` (`abs(int(md5_hex, 16)) & 0xFFFFFFFFFFFFFFFF`).
fn compute_uid(req: &ConfigureRequest) -> u64 {
    let mut hasher = Md5::new();
    hasher.update(req.mac.octets());
    for slot in &req.slots {
        hasher.update([slot.slot]);
        hasher.update(slot.mac_config.mac.octets());
    }
    let digest = hasher.finalize();

    let mut high = [0u8; 8];
    high.copy_from_slice(&digest[0..8]);
    u64::from_be_bytes(high)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> ConfigureRequest {
        let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        ConfigureRequest {
            mac,
            clear_first: false,
            validate_first: false,
            storage_mode: ConfigStorageMode::Persist,
            global_host_config: SetGlobalHostConfig {
                dhcp_client: 1,
                dns_primary: std::net::Ipv4Addr::UNSPECIFIED,
                dns_secondary: std::net::Ipv4Addr::UNSPECIFIED,
                ntp_server: std::net::Ipv4Addr::UNSPECIFIED,
                domain: String::new(),
            },
            slots: vec![SlotConfig {
                slot: 0,
                mac_config: SetMacConfig {
                    mac,
                    latency: 1,
                    payload_size: 10,
                    reliability: crate::ppl::enums::MacReliability::Unspecified,
                    station_count: 2,
                    optimization: crate::ppl::enums::MacOptimization::Latency,
                    total_ptts: 2,
                    is_static: 1,
                    security_mode: crate::ppl::enums::SecurityMode::None,
                },
                host_config: SetHostConfig {
                    dhcp_client: 1,
                    ip: std::net::Ipv4Addr::UNSPECIFIED,
                    netmask: std::net::Ipv4Addr::UNSPECIFIED,
                    gateway: std::net::Ipv4Addr::UNSPECIFIED,
                    subnets: vec![],
                },
            }],
        }
    }

    #[test]
    fn uid_is_deterministic_for_identical_requests() {
        let a = compute_uid(&sample_request());
        let b = compute_uid(&sample_request());
        assert_eq!(a, b);
    }

    #[test]
    fn uid_differs_when_slots_differ() {
        let mut other = sample_request();
        other.slots[0].slot = 1;
        assert_ne!(compute_uid(&sample_request()), compute_uid(&other));
    }
}
