//! Enumerations used by PPL packet fields.
//!
//! `MacOptimization` and `MacReliability` are given an explicit zero member
//! (`Unspecified`) that the original enumerations lacked — the codec's
//! zero-member invariant requires it, and DESIGN.md records this as a
//! deliberate resolution rather than a silent deviation.

use enum_primitive_derive::Primitive;

use crate::codec::EnumSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
pub enum MacOptimization {
    Unspecified = 0,
    NumStations = 1,
    Latency = 2,
    Reliability = 3,
    Throughput = 4,
    PayloadSize = 5,
}

impl EnumSpec for MacOptimization {
    const NAME: &'static str = "MacOptimization";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
pub enum MacReliability {
    Unspecified = 0,
    None = 1,
    Low = 2,
    BelowNormal = 3,
    Normal = 4,
    AboveNormal = 5,
    High = 6,
    VeryHigh = 7,
    Extreme = 8,
}

impl EnumSpec for MacReliability {
    const NAME: &'static str = "MacReliability";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
pub enum SecurityMode {
    None = 0,
    PayloadEncryption = 1,
    FullEncryption = 2,
}

impl EnumSpec for SecurityMode {
    const NAME: &'static str = "SecurityMode";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
pub enum ConfigStorageMode {
    Persist = 0,
    Temporary = 1,
}

impl EnumSpec for ConfigStorageMode {
    const NAME: &'static str = "ConfigStorageMode";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
pub enum FilterAction {
    Drop = 0,
    Priority1 = 1,
    Priority2 = 2,
    Priority3 = 3,
    Priority4 = 4,
    Priority5 = 5,
}

impl EnumSpec for FilterAction {
    const NAME: &'static str = "FilterAction";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
pub enum MeasType {
    None = 0,
    Rssi = 1,
    LinkQuality = 2,
    Throughput = 3,
}

impl EnumSpec for MeasType {
    const NAME: &'static str = "MeasType";
}

/// **(ADDED)** Interface selector used by `AddHostRoutes`/route-table
/// entries, supplementing spec.md from `enums.py`'s `ifaceType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
pub enum IfaceType {
    None = 0,
    Wan = 1,
    Lan = 2,
    Mac = 3,
}

impl EnumSpec for IfaceType {
    const NAME: &'static str = "IfaceType";
}

/// **(ADDED)** Node lifecycle state reported by `GetNodeState`/`NodeState`,
/// supplementing spec.md from `enums.py`'s `nodeState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
pub enum NodeState {
    /// No contact established yet.
    Unpaired = 0,
    /// Pairing handshake in progress.
    Pairing = 1,
    /// Paired and idle, awaiting configuration.
    Idle = 2,
    /// A configuration transaction is in progress.
    Configuring = 3,
    /// Configured and actively forwarding traffic.
    Active = 4,
    /// Faulted; requires a `DeviceNuke` or power cycle to recover.
    Fault = 5,
}

impl EnumSpec for NodeState {
    const NAME: &'static str = "NodeState";
}

impl NodeState {
    /// Whether traffic is actively flowing in this state.
    pub fn is_active(self) -> bool {
        matches!(self, NodeState::Active)
    }

    /// Whether the node is paired but doing nothing in particular.
    pub fn is_idle(self) -> bool {
        matches!(self, NodeState::Idle)
    }
}

/// **(ADDED)** `DeviceNuke` reset scope, supplementing spec.md from
/// `enums.py`'s `nukeAction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
pub enum NukeAction {
    None = 0,
    ResetConfig = 1,
    FactoryReset = 2,
    Reboot = 3,
}

impl EnumSpec for NukeAction {
    const NAME: &'static str = "NukeAction";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_enums_validate_zero_member() {
        MacOptimization::validate_has_zero();
        MacReliability::validate_has_zero();
        SecurityMode::validate_has_zero();
        ConfigStorageMode::validate_has_zero();
        FilterAction::validate_has_zero();
        MeasType::validate_has_zero();
        IfaceType::validate_has_zero();
        NodeState::validate_has_zero();
        NukeAction::validate_has_zero();
    }
}
