//! Subprotocol registry: one tagged-union message type per PPL subprotocol,
//! built once at compile time rather than through the source's global
//! mutable `__cmd_unpack_map` plus `protocol_class` uniqueness decorator
//! (design note, realized as an explicit, immutable registry).

use crate::error::{FrameError, SerializeError};
use crate::ppl::messages::*;

macro_rules! subprotocol_enum {
    (
        $(#[$meta:meta])*
        $enum_name:ident, id = $id:expr, version = $version:expr, {
            $($cmd_id:expr => $variant:ident($ty:ty)),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub enum $enum_name {
            $(
                #[allow(missing_docs)]
                $variant($ty)
            ),*
        }

        impl $enum_name {
            /// Wire id of this subprotocol.
            pub const SUBPROTOCOL_ID: u8 = $id;
            /// Wire version this runtime speaks for this subprotocol.
            pub const VERSION: u16 = $version;

            /// The command id this message would be framed with.
            pub fn command_id(&self) -> u8 {
                match self {
                    $(Self::$variant(_) => $cmd_id),*
                }
            }

            /// Decode a payload given its command id.
            pub fn read(command: u8, data: &[u8]) -> Result<Self, FrameError> {
                match command {
                    $($cmd_id => Ok(Self::$variant(<$ty as PplMessage>::read(data)?)),)*
                    other => Err(FrameError::UnknownCommand(Self::SUBPROTOCOL_ID, other)),
                }
            }

            /// Encode this message's payload (not including the frame header).
            pub fn write(&self, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
                match self {
                    $(Self::$variant(m) => m.write(buf)),*
                }
            }
        }
    };
}

subprotocol_enum!(
    /// Node presence and liveness queries.
    DiscoveryMessage, id = 1, version = 1, {
        1 => GenericError(GenericError),
        2 => GetNodeState(GetNodeState),
        3 => NodeState(NodeStateMsg),
    }
);

subprotocol_enum!(
    /// Pairing handshake between controller and node.
    PairingMessage, id = 2, version = 1, {
        1 => GenericError(GenericError),
        2 => PairNode(PairNode),
        3 => PairSuccess(PairSuccess),
        4 => UnpairNode(UnpairNode),
    }
);

subprotocol_enum!(
    /// MAC and host configuration transaction commands.
    ConfigurationMessage, id = 3, version = 1, {
        1 => GenericError(GenericError),
        2 => ValidateMacConfig(ValidateMacConfig),
        3 => SetMacConfig(SetMacConfig),
        4 => SetHostConfig(SetHostConfig),
        5 => AddHostRoutes(AddHostRoutes),
        6 => SetGlobalHostConfig(SetGlobalHostConfig),
        7 => ZeusSecurityConfig(ZeusSecurityConfig),
        8 => StartConfigSetTransaction(StartConfigSetTransaction),
        9 => SelectConfigSlot(SelectConfigSlot),
        10 => FinalizeConfigSlot(FinalizeConfigSlot),
        11 => ApplyConfigSet(ApplyConfigSet),
        12 => CommitConfigSet(CommitConfigSet),
        13 => ReadConfigSetUid(ReadConfigSetUid),
        14 => ClearConfigSet(ClearConfigSet),
    }
);

subprotocol_enum!(
    /// Link measurement control and reporting.
    MeasurementMessage, id = 4, version = 1, {
        1 => GenericError(GenericError),
        2 => MeasurementStart(MeasurementStart),
        3 => MeasurementStop(MeasurementStop),
        4 => DemoStatus(DemoStatus),
        5 => MeasValidateConfig(MeasValidateConfig),
        6 => MeasSetConfig(MeasSetConfig),
        7 => MeasLinkStatus(MeasLinkStatus),
    }
);

subprotocol_enum!(
    /// Out-of-band device control: logs, diagnostics, resets, bridging.
    DeviceControlMessage, id = 5, version = 1, {
        1 => GenericError(GenericError),
        2 => RequestLog(RequestLog),
        3 => ProtLogData(ProtLogData),
        4 => ProtLogHeader(ProtLogHeader),
        5 => DeviceNuke(DeviceNuke),
        6 => DeviceDevelopment(DeviceDevelopment),
        7 => DeviceDiagnostics(DeviceDiagnostics),
        8 => DeviceBridgeStart(DeviceBridgeStart),
        9 => DeviceBridgeStop(DeviceBridgeStop),
    }
);

subprotocol_enum!(
    /// Firmware update transfer.
    UpdateMessage, id = 6, version = 1, {
        1 => GenericError(GenericError),
        2 => UpdateQuery(UpdateQuery),
        3 => UpdateResponse(UpdateResponse),
        4 => UpdateStart(UpdateStart),
        5 => UpdateDownloadProgress(UpdateDownloadProgress),
        6 => UpdateDownloadFinish(UpdateDownloadFinish),
        7 => UpdateSuccess(UpdateSuccess),
    }
);

/// Any decoded PPL packet, tagged by which subprotocol it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum PplPacket {
    /// See [`DiscoveryMessage`].
    Discovery(DiscoveryMessage),
    /// See [`PairingMessage`].
    Pairing(PairingMessage),
    /// See [`ConfigurationMessage`].
    Configuration(ConfigurationMessage),
    /// See [`MeasurementMessage`].
    Measurement(MeasurementMessage),
    /// See [`DeviceControlMessage`].
    DeviceControl(DeviceControlMessage),
    /// See [`UpdateMessage`].
    Update(UpdateMessage),
}

impl PplPacket {
    /// The subprotocol id this packet belongs to.
    pub fn subprotocol_id(&self) -> u8 {
        match self {
            PplPacket::Discovery(_) => DiscoveryMessage::SUBPROTOCOL_ID,
            PplPacket::Pairing(_) => PairingMessage::SUBPROTOCOL_ID,
            PplPacket::Configuration(_) => ConfigurationMessage::SUBPROTOCOL_ID,
            PplPacket::Measurement(_) => MeasurementMessage::SUBPROTOCOL_ID,
            PplPacket::DeviceControl(_) => DeviceControlMessage::SUBPROTOCOL_ID,
            PplPacket::Update(_) => UpdateMessage::SUBPROTOCOL_ID,
        }
    }

    /// The subprotocol version carried in the frame header for this packet.
    pub fn version(&self) -> u16 {
        match self {
            PplPacket::Discovery(_) => DiscoveryMessage::VERSION,
            PplPacket::Pairing(_) => PairingMessage::VERSION,
            PplPacket::Configuration(_) => ConfigurationMessage::VERSION,
            PplPacket::Measurement(_) => MeasurementMessage::VERSION,
            PplPacket::DeviceControl(_) => DeviceControlMessage::VERSION,
            PplPacket::Update(_) => UpdateMessage::VERSION,
        }
    }

    /// The command id this packet carries.
    pub fn command_id(&self) -> u8 {
        match self {
            PplPacket::Discovery(m) => m.command_id(),
            PplPacket::Pairing(m) => m.command_id(),
            PplPacket::Configuration(m) => m.command_id(),
            PplPacket::Measurement(m) => m.command_id(),
            PplPacket::DeviceControl(m) => m.command_id(),
            PplPacket::Update(m) => m.command_id(),
        }
    }

    /// Decode a packet given its subprotocol id, command id and payload.
    pub fn read(subprotocol: u8, command: u8, data: &[u8]) -> Result<Self, FrameError> {
        match subprotocol {
            DiscoveryMessage::SUBPROTOCOL_ID => {
                Ok(PplPacket::Discovery(DiscoveryMessage::read(command, data)?))
            }
            PairingMessage::SUBPROTOCOL_ID => {
                Ok(PplPacket::Pairing(PairingMessage::read(command, data)?))
            }
            ConfigurationMessage::SUBPROTOCOL_ID => Ok(PplPacket::Configuration(
                ConfigurationMessage::read(command, data)?,
            )),
            MeasurementMessage::SUBPROTOCOL_ID => Ok(PplPacket::Measurement(
                MeasurementMessage::read(command, data)?,
            )),
            DeviceControlMessage::SUBPROTOCOL_ID => Ok(PplPacket::DeviceControl(
                DeviceControlMessage::read(command, data)?,
            )),
            UpdateMessage::SUBPROTOCOL_ID => {
                Ok(PplPacket::Update(UpdateMessage::read(command, data)?))
            }
            other => Err(FrameError::UnknownSubProtocol(other)),
        }
    }

    /// Encode this packet's payload (not including the frame header).
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        match self {
            PplPacket::Discovery(m) => m.write(buf),
            PplPacket::Pairing(m) => m.write(buf),
            PplPacket::Configuration(m) => m.write(buf),
            PplPacket::Measurement(m) => m.write(buf),
            PplPacket::DeviceControl(m) => m.write(buf),
            PplPacket::Update(m) => m.write(buf),
        }
    }

    /// True if this packet is a `GenericError` reply (command id 1 in every
    /// subprotocol, per the registry invariant).
    pub fn is_generic_error(&self) -> bool {
        self.command_id() == 1
    }

    /// Extracts the `GenericError` payload, if this is one.
    pub fn as_generic_error(&self) -> Option<&GenericError> {
        match self {
            PplPacket::Discovery(DiscoveryMessage::GenericError(e)) => Some(e),
            PplPacket::Pairing(PairingMessage::GenericError(e)) => Some(e),
            PplPacket::Configuration(ConfigurationMessage::GenericError(e)) => Some(e),
            PplPacket::Measurement(MeasurementMessage::GenericError(e)) => Some(e),
            PplPacket::DeviceControl(DeviceControlMessage::GenericError(e)) => Some(e),
            PplPacket::Update(UpdateMessage::GenericError(e)) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subprotocol_reserves_command_one_for_generic_error() {
        let err = GenericError {
            code: 1,
            message: "x".to_string(),
        };
        assert_eq!(
            DiscoveryMessage::GenericError(err.clone()).command_id(),
            1
        );
        assert_eq!(PairingMessage::GenericError(err.clone()).command_id(), 1);
        assert_eq!(
            ConfigurationMessage::GenericError(err.clone()).command_id(),
            1
        );
        assert_eq!(
            MeasurementMessage::GenericError(err.clone()).command_id(),
            1
        );
        assert_eq!(
            DeviceControlMessage::GenericError(err.clone()).command_id(),
            1
        );
        assert_eq!(UpdateMessage::GenericError(err).command_id(), 1);
    }

    #[test]
    fn subprotocol_ids_are_unique() {
        let ids = [
            DiscoveryMessage::SUBPROTOCOL_ID,
            PairingMessage::SUBPROTOCOL_ID,
            ConfigurationMessage::SUBPROTOCOL_ID,
            MeasurementMessage::SUBPROTOCOL_ID,
            DeviceControlMessage::SUBPROTOCOL_ID,
            UpdateMessage::SUBPROTOCOL_ID,
        ];
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
    }
}
