//! `PplClient`: sends one PPL command at a time and matches its reply,
//! grounded on `client.py`'s `PplClient.send_command` (`queryLock` mutex)
//! and `PplQuery.execute` (subscribe, send, await with timeout,
//! `GenericError` surfaces as `ResponseError`).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{QueryError, ResponseError};
use crate::ppl::protocol::{deserialize_message, serialize_message};
use crate::ppl::subprotocols::PplPacket;
use crate::query;
use crate::transport::UdpTransport;

/// Default time to wait for a PPL reply before giving up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// A PPL client bound to one transport and one peer address.
pub struct PplClient {
    transport: UdpTransport,
    peer: SocketAddr,
    next_seq: AtomicU8,
    // Serializes `send_command` calls: the (N+1)th call only starts once
    // the Nth has resolved or failed, matching the source's single
    // outstanding query per client.
    query_lock: Mutex<()>,
    timeout: Duration,
}

impl PplClient {
    /// Builds a client that talks PPL to `peer` over a fresh, locally bound
    /// transport.
    pub fn new(peer: SocketAddr) -> std::io::Result<Self> {
        let transport = UdpTransport::bind("0.0.0.0:0".parse().unwrap())?;
        Ok(Self {
            transport,
            peer,
            next_seq: AtomicU8::new(0),
            query_lock: Mutex::new(()),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Overrides the reply timeout (defaults to [`DEFAULT_TIMEOUT`]).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The transport this client sends and receives on.
    pub fn transport(&self) -> &UdpTransport {
        &self.transport
    }

    /// The peer address this client targets.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sends `request` and waits for a matching reply: same subprotocol,
    /// same sequence number. A `GenericError` reply is surfaced as a
    /// [`ResponseError`] rather than returned to the caller as data.
    pub fn send_command(&self, request: PplPacket) -> Result<PplPacket, QueryError> {
        let _held = self.query_lock.lock().unwrap();

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let subprotocol = request.subprotocol_id();
        let frame = serialize_message(seq, &request)?;

        let datagram = query::execute(
            &self.transport,
            self.peer,
            frame,
            move |d| {
                d.data.len() >= crate::ppl::protocol::HEADER_SIZE
                    && d.data[2] == seq
                    && d.data[3] == subprotocol
            },
            self.timeout,
        )?;

        let (_, reply) = deserialize_message(&datagram.data)?;
        if let Some(err) = reply.as_generic_error() {
            return Err(ResponseError(format!("[{}] {}", err.code, err.message)).into());
        }

        Ok(reply)
    }
}
