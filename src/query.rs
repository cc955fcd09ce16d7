//! Request/response matching over [`crate::transport::UdpTransport`],
//! generalizing the source's `PplQuery`/`ErciQuery` (an `asyncio.Event` plus
//! `subscriberFilterContext` plus `wait_for` timeout) into a single blocking
//! call: subscribe once for the matching reply, send the request, wait with
//! a deadline. The reply itself travels over a `futures::channel::oneshot`,
//! the same one-shot-wakeup primitive the teacher's
//! `ReactorHandle::roundtrip_reply` awaits — `Query` just blocks the calling
//! thread on it instead of being itself `async`, since nothing else in this
//! runtime needs an executor. The subscriber guard drops when this function
//! returns — success, timeout, or error alike — so a reply that arrives
//! after the deadline finds no subscriber and is silently dropped by the
//! transport, which is exactly the "late replies are discarded" property
//! callers rely on.

use std::net::SocketAddr;
use std::time::Duration;

use futures::channel::oneshot;
use futures::executor::block_on;
use futures::future::{select, Either};

use crate::error::TimeoutError;
use crate::transport::{Datagram, UdpTransport};

/// Resolves after `duration`, on a dedicated thread — the minimal
/// `futures`-compatible deadline timer this runtime needs, since `futures`
/// itself ships no timer and pulling in an async runtime crate for one
/// would be disproportionate to a synchronous transport.
fn deadline(duration: Duration) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        std::thread::sleep(duration);
        let _ = tx.send(());
    });
    rx
}

/// Sends `frame` to `dest` and blocks for a reply for which `matches`
/// returns true, up to `timeout`.
pub fn execute(
    transport: &UdpTransport,
    dest: SocketAddr,
    frame: Vec<u8>,
    matches: impl Fn(&Datagram) -> bool + Send + 'static,
    timeout: Duration,
) -> Result<Datagram, TimeoutError> {
    let (tx, rx) = oneshot::channel();
    let _guard = transport.subscribe_once(matches, tx);

    // Errors sending are surfaced as a timeout too: there's nothing more
    // specific to report from a fire-and-forget send, and the caller
    // already distinguishes transport-level `io::Error`s earlier in the
    // call chain (construction of `frame` itself can't fail by this point).
    let _ = transport.send_to(frame, dest);

    match block_on(select(rx, deadline(timeout))) {
        Either::Left((Ok(datagram), _)) => Ok(datagram),
        Either::Left((Err(_), _)) | Either::Right(_) => Err(TimeoutError(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(port_hint: u16) -> SocketAddr {
        format!("127.0.0.1:{port_hint}").parse().unwrap()
    }

    #[test]
    fn times_out_when_nobody_answers() {
        let a = UdpTransport::bind(local(0)).unwrap();
        let dest = local(0); // nobody listening here
        let err = execute(
            &a,
            dest,
            b"ping".to_vec(),
            |_| true,
            Duration::from_millis(100),
        )
        .unwrap_err();
        assert_eq!(err.0, Duration::from_millis(100));
    }

    #[test]
    fn receives_a_matching_reply() {
        let a = UdpTransport::bind(local(0)).unwrap();
        let b = UdpTransport::bind(local(0)).unwrap();
        let b_addr = b.local_addr();

        // `b` echoes anything it gets back to the sender.
        let (rx, _guard) = b.subscribe_filtered(|_| true);
        let a_addr = a.local_addr();
        std::thread::spawn(move || {
            if let Ok(datagram) = rx.recv_timeout(Duration::from_secs(2)) {
                let _ = b.send_to(datagram.data, a_addr);
            }
        });

        let reply = execute(
            &a,
            b_addr,
            b"ping".to_vec(),
            |d| d.data == b"ping",
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(reply.data, b"ping");
    }
}
