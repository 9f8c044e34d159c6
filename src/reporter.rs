//! Reporter Sink: the outbound interface the core calls on every
//! exchange/generated event. Implementations are external (CSV/SQL/
//! shared-memory sinks, the TCP subscription server, etc. are all out
//! of scope); this module defines only the trait and two trivial
//! in-tree implementations used for testing and local development.
//!
//! Shared across shards (see the concurrency model): implementations
//! must be internally thread-safe, and the core never holds an
//! internal lock while calling out to one.

use crate::types::{GeneratedL2Tick, L2Tick, OrderRejection, OrderTick, RangedTick, TradeTick};

pub trait ReporterSink: Send + Sync {
    fn exchange_order_tick_arrived(&self, tick: OrderTick);
    fn exchange_trade_tick_arrived(&self, tick: TradeTick);
    fn exchange_l2_tick_arrived(&self, tick: L2Tick);
    fn l2_tick_generated(&self, tick: GeneratedL2Tick);
    fn ranged_tick_generated(&self, tick: RangedTick);
    fn order_rejected(&self, rejection: OrderRejection);
}

/// Discards every event. Grounded on the source's `NopReporter`, used
/// the same way here: as the default sink when nothing downstream is
/// wired up yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopReporterSink;

impl ReporterSink for NopReporterSink {
    fn exchange_order_tick_arrived(&self, _tick: OrderTick) {}
    fn exchange_trade_tick_arrived(&self, _tick: TradeTick) {}
    fn exchange_l2_tick_arrived(&self, _tick: L2Tick) {}
    fn l2_tick_generated(&self, _tick: GeneratedL2Tick) {}
    fn ranged_tick_generated(&self, _tick: RangedTick) {}
    fn order_rejected(&self, _rejection: OrderRejection) {}
}

/// Logs every event at debug level via `tracing`. Useful for local
/// development; not suitable as a production sink (no buffering, no
/// backpressure handling).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporterSink;

impl ReporterSink for TracingReporterSink {
    fn exchange_order_tick_arrived(&self, tick: OrderTick) {
        tracing::debug!(?tick, "exchange order tick");
    }

    fn exchange_trade_tick_arrived(&self, tick: TradeTick) {
        tracing::debug!(?tick, "exchange trade tick");
    }

    fn exchange_l2_tick_arrived(&self, tick: L2Tick) {
        tracing::debug!(symbol = %tick.symbol, "exchange l2 tick");
    }

    fn l2_tick_generated(&self, tick: GeneratedL2Tick) {
        tracing::debug!(symbol = %tick.symbol, price = tick.price_1000x, qty = tick.quantity, "generated l2 tick");
    }

    fn ranged_tick_generated(&self, tick: RangedTick) {
        tracing::debug!(window_start = tick.window_start, "ranged tick");
    }

    fn order_rejected(&self, rejection: OrderRejection) {
        tracing::warn!(?rejection, "order rejected");
    }
}
