//! The JSON configuration document consumed by [`crate::ppl::mapper`],
//! grounded on `udpServer.py`'s `createPacketData*` helpers for field names
//! and defaults, and on the source's use of the `jsonschema` package (here,
//! the `jsonschema` crate) to validate shape before any defaulting happens.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::Deserialize;

/// Top-level configuration document for one node.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigDocument {
    /// MAC address of the node this document configures.
    pub device: String,
    /// Per-slot network configuration, keyed by slot index as a string
    /// (JSON object keys are always strings).
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Schema version of this document, for forward compatibility.
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

/// Per-slot network configuration. All fields are optional in the input
/// document; [`crate::ppl::mapper`] is the single source of truth for what
/// a missing field defaults to.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NetworkConfig {
    /// Use DHCP for this slot instead of the static fields below.
    #[serde(default, rename = "useDhcp")]
    pub use_dhcp: Option<bool>,
    /// Static IP address.
    pub ip: Option<Ipv4Addr>,
    /// Static netmask.
    pub netmask: Option<Ipv4Addr>,
    /// Static gateway.
    pub gateway: Option<Ipv4Addr>,
    /// MAC-layer latency class.
    pub latency: Option<u8>,
    /// MAC-layer payload size class.
    #[serde(rename = "payloadSize")]
    pub payload_size: Option<u8>,
    /// MAC-layer reliability class, by name (`"NONE"`, `"HIGH"`, ...).
    pub reliability: Option<String>,
    /// Number of stations expected on this slot.
    #[serde(rename = "stationCount")]
    pub station_count: Option<u8>,
    /// MAC-layer optimization target, by name.
    pub optimization: Option<String>,
    /// Total PTT count for this slot.
    #[serde(rename = "totalPTTs")]
    pub total_ptts: Option<u8>,
    /// Whether this slot's MAC address is statically assigned.
    #[serde(rename = "isStatic")]
    pub is_static: Option<bool>,
}

/// The embedded JSON Schema used to validate a document's shape before
/// [`crate::ppl::mapper`] applies defaults and translates it into packets.
/// This is a shape check, not a source of defaults: `default` annotations
/// here only document intent, matching the source's split between
/// `jsonschema.validate` (shape) and plain Python code (defaulting).
pub const SCHEMA: &str = include_str!("config_schema.json");

/// Validates `document` against [`SCHEMA`], the Rust equivalent of the
/// source's `jsonschema.validate(json, schema)` call in `_validateJson`.
pub fn validate_against_schema(document: &serde_json::Value) -> Result<(), String> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA).expect("embedded schema document must be valid JSON");
    let compiled = jsonschema::JSONSchema::compile(&schema)
        .expect("embedded schema document must be a valid JSON Schema");

    compiled.validate(document).map_err(|errors| {
        errors
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_document() {
        let json = r#"{
            "device": "aa:bb:cc:dd:ee:ff",
            "networks": {
                "0": { "useDhcp": true }
            }
        }"#;
        let doc: ConfigDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.device, "aa:bb:cc:dd:ee:ff");
        assert_eq!(doc.version, 1);
        assert_eq!(doc.networks["0"].use_dhcp, Some(true));
    }

    #[test]
    fn schema_accepts_well_formed_document_and_rejects_missing_device() {
        let good = serde_json::json!({
            "device": "aa:bb:cc:dd:ee:ff",
            "networks": {}
        });
        assert!(validate_against_schema(&good).is_ok());

        let bad = serde_json::json!({ "networks": {} });
        assert!(validate_against_schema(&bad).is_err());
    }
}
