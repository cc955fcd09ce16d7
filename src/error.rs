//! Error taxonomy shared by the PPL and ERCI protocol runtimes.

use thiserror::Error;

/// Failure to turn a value into wire bytes.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// A string field exceeded the maximum length its wire encoding allows.
    #[error("string {value:?} is too long to encode in a {max}-byte field")]
    StringTooLong {
        /// The string that was rejected.
        value: String,
        /// The maximum encodable length.
        max: usize,
    },

    /// A collection field exceeded the maximum length its wire encoding allows.
    #[error("collection of {len} elements exceeds the maximum of {max}")]
    CollectionTooLong {
        /// Number of elements supplied.
        len: usize,
        /// Maximum number of elements the encoding supports.
        max: usize,
    },

    /// An enum value has no wire representation (would violate the zero-member
    /// invariant, or is simply out of range for the underlying integer).
    #[error("value {0} has no wire representation for this enum")]
    InvalidEnumValue(i64),

    /// Underlying I/O failure while writing to the destination buffer.
    #[error("I/O error while serializing: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to interpret wire bytes as a value.
#[derive(Debug, Error)]
pub enum DeserializeError {
    /// Fewer bytes were available than the field requires.
    #[error("unexpected end of data: needed {needed} bytes, had {available}")]
    UnexpectedEof {
        /// Bytes required to decode the field.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// An integer discriminant did not match any variant of the target enum.
    #[error("{0} is not a valid value for enum {1}")]
    InvalidEnumValue(i64, &'static str),

    /// A length-prefixed field's declared length doesn't fit in the remaining buffer.
    #[error("declared length {declared} exceeds remaining buffer of {remaining} bytes")]
    LengthOutOfBounds {
        /// Length declared on the wire.
        declared: usize,
        /// Bytes actually remaining.
        remaining: usize,
    },

    /// A TLV quad count was smaller than the minimum of one (reserved byte + tag).
    #[error("TLV length quad count {0} is below the minimum of 2")]
    TlvTooShort(usize),

    /// Bytes remained after a message was fully decoded.
    #[error("{0} superfluous bytes trailed the decoded message")]
    TrailingBytes(usize),

    /// Underlying I/O failure while reading from the source buffer.
    #[error("I/O error while deserializing: {0}")]
    Io(#[from] std::io::Error),
}

/// A frame's subprotocol version didn't match the version this runtime
/// speaks for that subprotocol. Carries enough context for the caller to log
/// or route on, mirroring the source's `DeserializeVersionError`.
#[derive(Debug, Error)]
#[error(
    "subprotocol {subprotocol} sequence {sequence}: unsupported version {received_version}"
)]
pub struct DeserializeVersionError {
    /// Subprotocol id the frame claimed.
    pub subprotocol: u8,
    /// Version carried by the frame header.
    pub received_version: u16,
    /// Sequence number carried by the frame header.
    pub sequence: u8,
}

/// Top-level error returned by frame decoding, which may fail for any of the
/// above reasons plus a version mismatch.
#[derive(Debug, Error)]
pub enum FrameError {
    /// See [`DeserializeError`].
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),

    /// See [`DeserializeVersionError`].
    #[error(transparent)]
    Version(#[from] DeserializeVersionError),

    /// See [`SerializeError`].
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// A datagram exceeded the maximum frame size.
    #[error("message of {0} bytes exceeds the maximum frame size of {1} bytes")]
    TooLarge(usize, usize),

    /// The frame named a subprotocol id this runtime has no spec for.
    #[error("unknown subprotocol id {0}")]
    UnknownSubProtocol(u8),

    /// The frame named a command id unknown to the resolved subprotocol.
    #[error("subprotocol {0} has no command {1}")]
    UnknownCommand(u8, u8),
}

/// A peer answered a query with a `GenericError` reply, or with a reply that
/// otherwise didn't make sense for the request sent.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ResponseError(pub String);

/// No reply arrived before the query's deadline.
#[derive(Debug, Error)]
#[error("timed out waiting for a reply after {0:?}")]
pub struct TimeoutError(pub std::time::Duration);

/// ERCI-only: a command could not be sent because another query was already
/// in flight on the same client and the caller asked not to block for it.
#[derive(Debug, Error)]
#[error("another command is already in flight on this client")]
pub struct ResourceLocked;

/// Errors a `Query::execute` call (PPL or ERCI) can return.
#[derive(Debug, Error)]
pub enum QueryError {
    /// See [`SerializeError`].
    #[error(transparent)]
    Serialize(#[from] SerializeError),
    /// See [`FrameError`].
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// See [`ResponseError`].
    #[error(transparent)]
    Response(#[from] ResponseError),
    /// See [`TimeoutError`].
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    /// See [`ResourceLocked`].
    #[error(transparent)]
    Locked(#[from] ResourceLocked),
    /// Underlying transport I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
