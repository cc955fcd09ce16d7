//! Non-blocking UDP transport shared by PPL and ERCI: a dedicated reactor
//! thread drives a `mio::net::UdpSocket` and fans incoming datagrams out to
//! subscribers, mirroring the teacher's `Reactor`/`ReactorHandle` split in
//! `client/reactor.rs`, adapted from a byte-stream socket to a datagram one
//! (no partial-message continuation is needed: UDP delivers whole
//! datagrams or nothing).

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use futures::channel::oneshot;
use mio::net::UdpSocket;

const WAKER: mio::Token = mio::Token(0);
const SOCKET: mio::Token = mio::Token(1);

/// A received datagram handed to a matching subscriber.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Raw bytes received.
    pub data: Vec<u8>,
    /// Sender address.
    pub from: SocketAddr,
}

type Filter = Box<dyn Fn(&Datagram) -> bool + Send + 'static>;

/// How a matching datagram reaches its subscriber: repeatedly, through a
/// standard channel (node/simulator responder loops), or exactly once,
/// through a `oneshot` (the single-reply wakeup `query::execute` uses —
/// the same primitive the teacher's `ReactorHandle::roundtrip_reply` awaits,
/// adapted here to a directly-blocked-on receiver since this transport has
/// no async executor of its own).
enum Delivery {
    Channel(Sender<Datagram>),
    Once(Mutex<Option<oneshot::Sender<Datagram>>>),
}

struct Subscriber {
    id: u64,
    filter: Filter,
    delivery: Delivery,
}

#[derive(Default)]
struct SubscriberList(Vec<Subscriber>);

/// An RAII handle returned by [`UdpTransport::subscribe_filtered`]. Dropping
/// it unsubscribes, the Rust realization of the source's
/// `@contextmanager subscriberFilterContext` — unsubscription happens
/// automatically on scope exit, including on panic/early return, rather than
/// relying on callers to remember a matching `unsubscribe` call.
pub struct SubscriberGuard {
    id: u64,
    subscribers: Arc<Mutex<SubscriberList>>,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        let mut list = self.subscribers.lock().unwrap();
        list.0.retain(|s| s.id != self.id);
    }
}

impl std::fmt::Debug for SubscriberGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberGuard").field("id", &self.id).finish()
    }
}

/// A non-blocking UDP socket with subscriber-based dispatch.
pub struct UdpTransport {
    local_addr: SocketAddr,
    outgoing: Sender<(Vec<u8>, SocketAddr)>,
    subscribers: Arc<Mutex<SubscriberList>>,
    waker: Arc<mio::Waker>,
    next_subscriber_id: AtomicU64,
    _thread: JoinHandle<()>,
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

impl UdpTransport {
    /// Binds a UDP socket at `addr` (use `0.0.0.0:0` for an ephemeral local
    /// port, as test harnesses and short-lived clients do) and starts its
    /// reactor thread. `SO_REUSEADDR`/`SO_REUSEPORT` are requested on a
    /// best-effort basis via `socket2` and silently ignored on failure,
    /// matching the source's bare `try/except: pass`.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket2 = socket2::Socket::new(
            match addr {
                SocketAddr::V4(_) => socket2::Domain::IPV4,
                SocketAddr::V6(_) => socket2::Domain::IPV6,
            },
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;
        let _ = socket2.set_reuse_address(true);
        #[cfg(unix)]
        let _ = socket2.set_reuse_port(true);
        socket2.set_nonblocking(true)?;
        socket2.bind(&addr.into())?;

        let std_socket: std::net::UdpSocket = socket2.into();
        let mut socket = UdpSocket::from_std(std_socket);
        let local_addr = socket.local_addr()?;

        let poll = mio::Poll::new()?;
        let waker = Arc::new(mio::Waker::new(poll.registry(), WAKER)?);
        poll.registry()
            .register(&mut socket, SOCKET, mio::Interest::READABLE)?;

        let subscribers = Arc::new(Mutex::new(SubscriberList::default()));
        let (out_tx, out_rx) = std::sync::mpsc::channel();

        let mut reactor = Reactor {
            socket,
            poll,
            subscribers: subscribers.clone(),
            outgoing: out_rx,
            write_buf: Vec::new(),
        };

        let thread = std::thread::spawn(move || {
            if let Err(err) = reactor.run() {
                log::error!("udp transport reactor exited: {err}");
            }
        });

        Ok(UdpTransport {
            local_addr,
            outgoing: out_tx,
            subscribers,
            waker,
            next_subscriber_id: AtomicU64::new(0),
            _thread: thread,
        })
    }

    /// The locally bound address (useful when binding to port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queues `data` to be sent to `dest`. Returns once the datagram has
    /// been handed to the reactor thread's outgoing queue, not once it has
    /// actually hit the wire.
    pub fn send_to(&self, data: Vec<u8>, dest: SocketAddr) -> io::Result<()> {
        self.outgoing
            .send((data, dest))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "transport reactor gone"))?;
        self.waker.wake()
    }

    /// Registers a subscriber that receives every datagram for which
    /// `filter` returns true, serially, in the order the reactor thread's
    /// single dispatch lock observes them (mirroring the source's
    /// `dispatchLock`-guarded `dispatchPacket`). Returns a channel of
    /// matching datagrams and a guard that unsubscribes on drop.
    pub fn subscribe_filtered(
        &self,
        filter: impl Fn(&Datagram) -> bool + Send + 'static,
    ) -> (Receiver<Datagram>, SubscriberGuard) {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = std::sync::mpsc::channel();

        self.subscribers.lock().unwrap().0.push(Subscriber {
            id,
            filter: Box::new(filter),
            delivery: Delivery::Channel(tx),
        });

        (
            rx,
            SubscriberGuard {
                id,
                subscribers: self.subscribers.clone(),
            },
        )
    }

    /// Registers a subscriber that delivers at most one matching datagram,
    /// through `tx`, then is inert (the guard still needs dropping to remove
    /// it from the list). Used by [`crate::query::execute`] to wait for a
    /// single reply instead of a stream of them.
    pub fn subscribe_once(
        &self,
        filter: impl Fn(&Datagram) -> bool + Send + 'static,
        tx: oneshot::Sender<Datagram>,
    ) -> SubscriberGuard {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);

        self.subscribers.lock().unwrap().0.push(Subscriber {
            id,
            filter: Box::new(filter),
            delivery: Delivery::Once(Mutex::new(Some(tx))),
        });

        SubscriberGuard {
            id,
            subscribers: self.subscribers.clone(),
        }
    }
}

struct Reactor {
    socket: UdpSocket,
    poll: mio::Poll,
    subscribers: Arc<Mutex<SubscriberList>>,
    outgoing: Receiver<(Vec<u8>, SocketAddr)>,
    write_buf: Vec<u8>,
}

impl Reactor {
    fn run(&mut self) -> io::Result<()> {
        let mut events = mio::Events::with_capacity(256);
        loop {
            self.poll.poll(&mut events, None)?;
            self.recv()?;
            self.flush_outgoing()?;
        }
    }

    fn recv(&mut self) -> io::Result<()> {
        let mut buf = [0u8; 65535];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => self.dispatch(Datagram {
                    data: buf[..n].to_vec(),
                    from,
                }),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    fn dispatch(&mut self, datagram: Datagram) {
        let list = self.subscribers.lock().unwrap();
        let mut matched = false;
        for subscriber in list.0.iter() {
            if (subscriber.filter)(&datagram) {
                matched = true;
                match &subscriber.delivery {
                    Delivery::Channel(sender) => {
                        if sender.send(datagram.clone()).is_err() {
                            log::debug!("dropping datagram for a subscriber whose receiver went away");
                        }
                    }
                    Delivery::Once(slot) => {
                        if let Some(tx) = slot.lock().unwrap().take() {
                            let _ = tx.send(datagram.clone());
                        }
                    }
                }
            }
        }
        if !matched {
            log::trace!("no subscriber for datagram from {}: dropped", datagram.from);
        }
    }

    fn flush_outgoing(&mut self) -> io::Result<()> {
        loop {
            if !self.write_buf.is_empty() {
                match self.socket.send(&self.write_buf) {
                    Ok(_) => self.write_buf.clear(),
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                    Err(err) => return Err(err),
                }
            }

            match self.outgoing.try_recv() {
                Ok((data, dest)) => match self.socket.send_to(&data, dest) {
                    Ok(_) => {}
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                        self.write_buf = data;
                        return Ok(());
                    }
                    Err(err) => return Err(err),
                },
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn local(port_hint: u16) -> SocketAddr {
        format!("127.0.0.1:{port_hint}").parse().unwrap()
    }

    #[test_log::test]
    fn subscriber_receives_matching_datagrams_exactly_once() {
        let a = UdpTransport::bind(local(0)).unwrap();
        let b = UdpTransport::bind(local(0)).unwrap();

        let (rx, _guard) = a.subscribe_filtered(|d| d.data == b"hello");
        b.send_to(b"hello".to_vec(), a.local_addr()).unwrap();

        let datagram = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(datagram.data, b"hello");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn dropping_the_guard_unsubscribes() {
        let a = UdpTransport::bind(local(0)).unwrap();
        let b = UdpTransport::bind(local(0)).unwrap();

        let (rx, guard) = a.subscribe_filtered(|_| true);
        drop(guard);

        b.send_to(b"ping".to_vec(), a.local_addr()).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }
}
