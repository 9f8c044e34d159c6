//! Channel Dispatcher: receives raw multicast packets, decodes them,
//! and routes the result to one of N Booker Shard queues by symbol
//! hash. One receiver thread per configured multicast group; shard
//! queues are bounded channels so a stalled shard applies backpressure
//! to its receivers instead of ever dropping a message.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{info, warn};

use crate::wire::{self, DecodedTick};

const MAX_UDP_PAYLOAD: usize = 2048;

/// Abstraction over "a thing that yields raw UDP payloads", so the
/// dispatcher's routing logic can be exercised without a real socket.
pub trait PacketSource: Send {
    /// Reads one packet into `buf`, returning the number of bytes
    /// written. A return of `Ok(0)` or an error ends the receiver loop.
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// A real multicast UDP socket, joined on construction.
pub struct UdpMulticastSource {
    socket: UdpSocket,
}

impl UdpMulticastSource {
    pub fn bind(multicast_addr: SocketAddrV4, interface: Ipv4Addr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, multicast_addr.port()))?;
        socket.join_multicast_v4(multicast_addr.ip(), &interface)?;
        socket.set_read_timeout(Some(Duration::from_millis(500)))?;
        Ok(UdpMulticastSource { socket })
    }
}

impl PacketSource for UdpMulticastSource {
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.socket.recv(buf)
    }
}

/// Routes by `symbol_as_integer mod shard_count`, per the dispatch
/// contract.
fn shard_for(tick: &DecodedTick, shard_count: usize) -> usize {
    let key = match tick {
        DecodedTick::Order(o) => o.symbol.as_shard_key(),
        DecodedTick::Trade(t) => t.symbol.as_shard_key(),
        DecodedTick::L2Snapshot(l) => l.symbol.as_shard_key(),
    };
    (key % shard_count as u64) as usize
}

/// Owns the N per-shard queues and the cooperative shutdown flag
/// shared by every receiver thread spawned against it.
pub struct ChannelDispatcher {
    senders: Vec<Sender<DecodedTick>>,
    running: Arc<AtomicBool>,
}

impl ChannelDispatcher {
    /// Creates `shard_count` bounded queues (capacity `queue_capacity`
    /// each) and returns the dispatcher alongside their receiving
    /// ends, one per shard.
    pub fn new(shard_count: usize, queue_capacity: usize) -> (Self, Vec<Receiver<DecodedTick>>) {
        let mut senders = Vec::with_capacity(shard_count);
        let mut receivers = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            let (tx, rx) = bounded(queue_capacity);
            senders.push(tx);
            receivers.push(rx);
        }
        (
            ChannelDispatcher {
                senders,
                running: Arc::new(AtomicBool::new(true)),
            },
            receivers,
        )
    }

    /// Spawns a receiver thread pulling packets from `source` until
    /// `shutdown` is called or the source's `recv` errors out.
    pub fn spawn_receiver<S: PacketSource + 'static>(&self, mut source: S) -> JoinHandle<()> {
        let running = self.running.clone();
        let senders = self.senders.clone();
        thread::spawn(move || {
            let mut buf = [0u8; MAX_UDP_PAYLOAD];
            info!("dispatcher receiver started");
            while running.load(Ordering::Relaxed) {
                let n = match source.recv(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        warn!(error = %e, "receiver socket error, stopping");
                        break;
                    }
                };
                let tick = match wire::decode(&buf[..n]) {
                    Ok(tick) => tick,
                    Err(e) => {
                        warn!(error = ?e, "dropping malformed packet");
                        continue;
                    }
                };
                let shard = shard_for(&tick, senders.len());
                let mut pending = tick;
                loop {
                    match senders[shard].try_send(pending) {
                        Ok(()) => break,
                        Err(TrySendError::Full(back)) => {
                            warn!(shard, "shard queue full, applying backpressure");
                            pending = back;
                            thread::sleep(Duration::from_micros(200));
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            warn!(shard, "shard queue disconnected, dropping receiver");
                            return;
                        }
                    }
                }
            }
            info!("dispatcher receiver stopped");
        })
    }

    /// Signals every receiver thread spawned against this dispatcher
    /// to stop after its current packet.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderTick, OrderType, Side, Symbol};
    use std::sync::Mutex;

    struct ScriptedSource {
        packets: Vec<Vec<u8>>,
    }

    impl PacketSource for ScriptedSource {
        fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.packets.pop() {
                Some(packet) => {
                    buf[..packet.len()].copy_from_slice(&packet);
                    Ok(packet.len())
                }
                None => Ok(0),
            }
        }
    }

    #[test]
    fn shard_routing_is_stable_for_same_symbol() {
        let tick = DecodedTick::Order(OrderTick {
            unique_id: 1,
            symbol: Symbol::from_str("600875"),
            order_type: OrderType::Limit,
            side: Side::Buy,
            price_1000x: 2233,
            quantity: 100,
            exchange_time: 93000000,
        });
        let a = shard_for(&tick, 4);
        let b = shard_for(&tick, 4);
        assert_eq!(a, b);
        assert!(a < 4);
    }

    #[test]
    fn empty_source_stops_receiver_cleanly() {
        let (dispatcher, receivers) = ChannelDispatcher::new(1, 8);
        let handle = dispatcher.spawn_receiver(ScriptedSource { packets: vec![] });
        handle.join().unwrap();
        assert!(receivers[0].try_recv().is_err());
    }

    #[test]
    fn shutdown_flag_is_shared_across_receivers() {
        let (dispatcher, _receivers) = ChannelDispatcher::new(1, 8);
        let seen = Arc::new(Mutex::new(0));
        dispatcher.shutdown();
        assert!(!dispatcher.running.load(Ordering::Relaxed));
        drop(seen);
    }
}
