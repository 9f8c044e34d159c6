//! Order book reconstruction pipeline for Chinese exchange (SSE/SZSE)
//! market-data feeds.
//!
//! Raw multicast UDP payloads flow through the [`wire`] decoder, the
//! [`dispatcher`]'s symbol-hash routing, and into one of N
//! [`shard::BookerShard`]s, each running the [`matching`] core plus a
//! [`call_auction`] holder, a [`ranged`] accumulator and an
//! [`validator`] MD Validator per symbol. Results are handed to a
//! [`reporter::ReporterSink`]; concrete sinks (CSV/SQL/shared-memory,
//! the TCP subscription server) are out of scope for this crate.

pub mod book;
pub mod call_auction;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod matching;
pub mod ranged;
pub mod reporter;
pub mod shard;
pub mod types;
pub mod validator;
pub mod wire;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::info;

use crate::config::Config;
use crate::dispatcher::ChannelDispatcher;
use crate::reporter::ReporterSink;
use crate::shard::BookerShard;
use crate::wire::DecodedTick;

/// A running pipeline: `shard_count` worker threads plus however many
/// receiver threads the caller spawned against the returned
/// dispatcher. Dropping this without calling `shutdown` leaves the
/// workers running; they only stop once every sender is dropped and
/// their queues run dry.
pub struct Pipeline {
    dispatcher: ChannelDispatcher,
    shard_handles: Vec<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl Pipeline {
    /// Signals every shard worker to stop once its queue is empty and
    /// joins them. Does not touch receiver threads spawned against
    /// `dispatcher()` — call [`ChannelDispatcher::shutdown`] on those
    /// separately (or drop their `PacketSource`s) so the shard queues
    /// actually drain.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::Relaxed);
        self.dispatcher.shutdown();
        for handle in self.shard_handles.drain(..) {
            let _ = handle.join();
        }
    }

    /// The dispatcher backing this pipeline, for spawning receiver
    /// threads against configured multicast groups.
    pub fn dispatcher(&self) -> &ChannelDispatcher {
        &self.dispatcher
    }
}

/// Spawns `config.booker_concurrency` Booker Shard worker threads,
/// each draining its own dispatcher queue, and returns the running
/// pipeline. The caller is responsible for spawning receiver threads
/// against `Pipeline::dispatcher()` (e.g. via
/// [`dispatcher::UdpMulticastSource`]) once the multicast addresses in
/// `config` are resolved — that socket setup is left to the host,
/// consistent with configuration-file loading being out of scope.
pub fn run_pipeline(config: Config, reporter: Arc<dyn ReporterSink>) -> Pipeline {
    let shard_count = config.booker_concurrency.max(1);
    let (dispatcher, receivers) = ChannelDispatcher::new(shard_count, 4096);
    let running = Arc::new(AtomicBool::new(true));

    let shard_handles = receivers
        .into_iter()
        .enumerate()
        .map(|(index, rx)| {
            let reporter = reporter.clone();
            let running = running.clone();
            let enable_validation = config.enable_validation;
            let enable_advanced_calculating = config.enable_advanced_calculating;
            thread::spawn(move || {
                info!(shard = index, "booker shard worker started");
                let mut shard =
                    BookerShard::with_flags(reporter, enable_validation, enable_advanced_calculating);
                while running.load(Ordering::Relaxed) {
                    match rx.recv_timeout(std::time::Duration::from_millis(200)) {
                        Ok(DecodedTick::Order(order)) => shard.add(order),
                        Ok(DecodedTick::Trade(trade)) => shard.trade(trade),
                        Ok(DecodedTick::L2Snapshot(l2)) => shard.observe_l2_snapshot(l2),
                        Err(crossbeam::channel::RecvTimeoutError::Timeout) => continue,
                        Err(crossbeam::channel::RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!(shard = index, "booker shard worker stopped");
            })
        })
        .collect();

    Pipeline {
        dispatcher,
        shard_handles,
        running,
    }
}
