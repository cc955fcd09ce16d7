//! Translates a validated [`ConfigDocument`] into the packet fields a
//! [`crate::ppl::orchestrator::ConfigureOrchestrator`] transaction needs,
//! grounded on `udpServer.py`'s `createPacketDataMacConfig` /
//! `createPacketDataSetGlobalHostConfig` / `createPacketDataSetHostConfig`
//! for every default value below.

use std::net::Ipv4Addr;

use crate::mac::MacAddress;
use crate::ppl::config::{ConfigDocument, NetworkConfig};
use crate::ppl::enums::{MacOptimization, MacReliability, SecurityMode};
use crate::ppl::messages::{SetHostConfig, SetMacConfig};
use crate::ppl::orchestrator::SlotConfig;

/// Error translating a document into packet fields: an unparseable address,
/// slot index, or enum name.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// `device` wasn't a valid MAC address.
    #[error("invalid device MAC address {0:?}")]
    InvalidDevice(String),
    /// A `networks` key wasn't a valid slot index.
    #[error("invalid slot index {0:?}")]
    InvalidSlot(String),
    /// An address field wasn't a valid IPv4 address.
    #[error("invalid IPv4 address {0:?} in field {1}")]
    InvalidAddress(String, &'static str),
    /// A `reliability`/`optimization` name didn't match any known variant.
    #[error("unrecognized {field} {value:?}")]
    UnrecognizedEnumName {
        /// Field name for the error message.
        field: &'static str,
        /// The unrecognized value.
        value: String,
    },
}

fn parse_ip(value: &Option<String>, field: &'static str) -> Result<Ipv4Addr, MapperError> {
    match value {
        None => Ok(Ipv4Addr::UNSPECIFIED),
        Some(s) => s
            .parse()
            .map_err(|_| MapperError::InvalidAddress(s.clone(), field)),
    }
}

fn parse_reliability(value: &Option<String>) -> Result<MacReliability, MapperError> {
    match value.as_deref() {
        None => Ok(MacReliability::None),
        Some(s) => match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(MacReliability::None),
            "LOW" => Ok(MacReliability::Low),
            "BELOW_NORMAL" => Ok(MacReliability::BelowNormal),
            "NORMAL" => Ok(MacReliability::Normal),
            "ABOVE_NORMAL" => Ok(MacReliability::AboveNormal),
            "HIGH" => Ok(MacReliability::High),
            "VERY_HIGH" => Ok(MacReliability::VeryHigh),
            "EXTREME" => Ok(MacReliability::Extreme),
            other => Err(MapperError::UnrecognizedEnumName {
                field: "reliability",
                value: other.to_string(),
            }),
        },
    }
}

fn parse_optimization(value: &Option<String>) -> Result<MacOptimization, MapperError> {
    match value.as_deref() {
        None => Ok(MacOptimization::Latency),
        Some(s) => match s.to_ascii_uppercase().as_str() {
            "NUM_STATIONS" => Ok(MacOptimization::NumStations),
            "LATENCY" => Ok(MacOptimization::Latency),
            "RELIABILITY" => Ok(MacOptimization::Reliability),
            "THROUGHPUT" => Ok(MacOptimization::Throughput),
            "PAYLOAD_SIZE" => Ok(MacOptimization::PayloadSize),
            other => Err(MapperError::UnrecognizedEnumName {
                field: "optimization",
                value: other.to_string(),
            }),
        },
    }
}

/// Builds the per-slot MAC configuration packet for one `networks` entry,
/// applying `createPacketDataMacConfig`'s defaults: latency=1,
/// payloadSize=10, reliability=NONE, stationCount=2, optimization=LATENCY,
/// totalPTTs=2, isStatic=true, securityMode=NONE.
pub fn mac_config(mac: MacAddress, net: &NetworkConfig) -> Result<SetMacConfig, MapperError> {
    Ok(SetMacConfig {
        mac,
        latency: net.latency.unwrap_or(1),
        payload_size: net.payload_size.unwrap_or(10),
        reliability: parse_reliability(&net.reliability)?,
        station_count: net.station_count.unwrap_or(2),
        optimization: parse_optimization(&net.optimization)?,
        total_ptts: net.total_ptts.unwrap_or(2),
        is_static: net.is_static.unwrap_or(true) as u8,
        security_mode: SecurityMode::None,
    })
}

/// Builds the per-slot host configuration packet for one `networks` entry,
/// applying `createPacketDataSetHostConfig`'s defaults: `useDhcp` maps to
/// `dhcp_client`, and missing addresses default to `0.0.0.0`.
pub fn host_config(net: &NetworkConfig) -> Result<SetHostConfig, MapperError> {
    Ok(SetHostConfig {
        dhcp_client: net.use_dhcp.unwrap_or(false) as u8,
        ip: parse_ip(&net.ip, "ip")?,
        netmask: parse_ip(&net.netmask, "netmask")?,
        gateway: parse_ip(&net.gateway, "gateway")?,
        subnets: Vec::new(),
    })
}

/// Translates a full document into the device MAC and ordered per-slot
/// configuration an orchestrator transaction needs.
pub fn slots_from_document(
    document: &ConfigDocument,
) -> Result<(MacAddress, Vec<SlotConfig>), MapperError> {
    let mac: MacAddress = document
        .device
        .parse()
        .map_err(|_| MapperError::InvalidDevice(document.device.clone()))?;

    let mut slots = Vec::with_capacity(document.networks.len());
    for (key, net) in &document.networks {
        let slot: u8 = key
            .parse()
            .map_err(|_| MapperError::InvalidSlot(key.clone()))?;

        slots.push(SlotConfig {
            slot,
            mac_config: mac_config(mac, net)?,
            host_config: host_config(net)?,
        });
    }
    slots.sort_by_key(|s| s.slot);

    Ok((mac, slots))
}
