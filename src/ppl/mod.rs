//! The PPL (Pairing/Provisioning/Link) protocol: discovery, pairing,
//! configuration, measurement, device control, and update subprotocols
//! multiplexed over one UDP socket.

pub mod client;
pub mod config;
pub mod enums;
pub mod mapper;
pub mod messages;
pub mod orchestrator;
pub mod protocol;
pub mod subprotocols;
