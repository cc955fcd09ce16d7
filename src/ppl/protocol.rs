//! PPL wire framing: the 7-byte header plus payload, and the serialize/
//! deserialize algorithm grounded on `protocol.py`'s `serialize_message`/
//! `deserialize_message`.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{DeserializeVersionError, FrameError};
use crate::ppl::subprotocols::PplPacket;

/// Size of the PPL frame header in bytes: `u16 length | u8 seq | u8
/// subprotocol | u16 version | u8 command`.
pub const HEADER_SIZE: usize = 7;

/// Maximum total frame size (header + payload), matching the source's UDP
/// datagram budget.
pub const MAX_FRAME_SIZE: usize = 1400;

/// Encodes `packet` into a complete PPL frame (header + payload).
pub fn serialize_message(seq: u8, packet: &PplPacket) -> Result<Vec<u8>, FrameError> {
    let mut payload = Vec::new();
    packet.write(&mut payload)?;

    let total = HEADER_SIZE + payload.len();
    if total > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(total, MAX_FRAME_SIZE));
    }

    let mut frame = Vec::with_capacity(total);
    frame.extend_from_slice(&(total as u16).to_be_bytes());
    frame.push(seq);
    frame.push(packet.subprotocol_id());
    frame.extend_from_slice(&packet.version().to_be_bytes());
    frame.push(packet.command_id());
    frame.extend_from_slice(&payload);

    Ok(frame)
}

/// Decodes a complete PPL frame, returning its sequence number and packet.
/// Rejects frames shorter than the header, frames whose declared length
/// doesn't match the buffer (too short or superfluous trailing bytes), and
/// frames whose subprotocol version this runtime doesn't speak.
pub fn deserialize_message(data: &[u8]) -> Result<(u8, PplPacket), FrameError> {
    if data.len() < HEADER_SIZE {
        return Err(crate::error::DeserializeError::UnexpectedEof {
            needed: HEADER_SIZE,
            available: data.len(),
        }
        .into());
    }

    let declared_len = BigEndian::read_u16(&data[0..2]) as usize;
    let seq = data[2];
    let subprotocol = data[3];
    let version = BigEndian::read_u16(&data[4..6]);
    let command = data[6];
    let payload = &data[HEADER_SIZE..];

    if declared_len > data.len() {
        return Err(crate::error::DeserializeError::LengthOutOfBounds {
            declared: declared_len,
            remaining: data.len(),
        }
        .into());
    }
    if declared_len < data.len() {
        return Err(crate::error::DeserializeError::TrailingBytes(data.len() - declared_len).into());
    }

    let packet = PplPacket::read(subprotocol, command, payload)?;

    if packet.version() != version {
        return Err(DeserializeVersionError {
            subprotocol,
            received_version: version,
            sequence: seq,
        }
        .into());
    }

    Ok((seq, packet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ppl::messages::PairNode;
    use crate::ppl::subprotocols::PairingMessage;
    use pretty_assertions::assert_eq;

    fn sample_packet() -> PplPacket {
        PplPacket::Pairing(PairingMessage::PairNode(PairNode {
            mac: "aa:bb:cc:dd:ee:ff".parse().unwrap(),
        }))
    }

    #[test]
    fn roundtrips_through_the_wire() {
        let packet = sample_packet();
        let frame = serialize_message(42, &packet).unwrap();
        let (seq, decoded) = deserialize_message(&frame).unwrap();
        assert_eq!(seq, 42);
        assert_eq!(decoded, packet);
    }

    #[test]
    fn rejects_truncated_frame() {
        let frame = serialize_message(1, &sample_packet()).unwrap();
        let truncated = &frame[..frame.len() - 1];
        assert!(matches!(
            deserialize_message(truncated),
            Err(FrameError::Deserialize(
                crate::error::DeserializeError::TrailingBytes(_) | crate::error::DeserializeError::UnexpectedEof { .. }
            ))
        ));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut frame = serialize_message(1, &sample_packet()).unwrap();
        frame.push(0xFF);
        assert!(matches!(
            deserialize_message(&frame),
            Err(FrameError::Deserialize(crate::error::DeserializeError::TrailingBytes(1)))
        ));
    }

    #[test]
    fn rejects_version_mismatch() {
        let mut frame = serialize_message(1, &sample_packet()).unwrap();
        // Corrupt the version field (bytes 4..6) to something unsupported.
        frame[4] = 0xFF;
        frame[5] = 0xFF;
        assert!(matches!(
            deserialize_message(&frame),
            Err(FrameError::Version(_))
        ));
    }

    #[test]
    fn rejects_unknown_subprotocol() {
        let mut frame = serialize_message(1, &sample_packet()).unwrap();
        frame[3] = 0xEE;
        assert!(matches!(
            deserialize_message(&frame),
            Err(FrameError::UnknownSubProtocol(0xEE))
        ));
    }
}
