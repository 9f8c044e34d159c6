//! Booker Shard: applies order/trade events to per-symbol state,
//! emits generated ticks, and maintains windowed analytics. One shard
//! owns an exclusive set of symbols; within a shard everything is
//! fully serial (see the concurrency model), so no field here needs
//! internal locking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::book::Book;
use crate::call_auction::CallAuctionHolder;
use crate::matching::{self, MatchEvent};
use crate::ranged::RangedAccumulator;
use crate::reporter::ReporterSink;
use crate::types::{
    GeneratedL2Tick, L2Tick, OrderRejection, OrderTick, OrderType, RejectReason, Side, Symbol,
    TradeTick,
};
use crate::validator::MdValidator;

/// `09:25:00.000`: before this, all orders accumulate in the call
/// auction holder.
const PRE_AUCTION_CUTOFF: i64 = 92_500_000;
/// `09:30:00.000`: the monotone trigger for `switch_to_continuous_stage`.
const CONTINUOUS_START: i64 = 93_000_000;

fn hhmmss(exchange_time: i64) -> i64 {
    exchange_time / 1000
}

/// Whether `exchange_time` falls inside a continuous-trading session
/// (09:30-11:30 or 13:00-15:00), the only time the ranged accumulator
/// is fed.
fn in_continuous_session(exchange_time: i64) -> bool {
    let t = hhmmss(exchange_time);
    (93000..113000).contains(&t) || (130000..150000).contains(&t)
}

/// Whether `exchange_time` falls in the opening-call-auction overlap
/// or the closing-auction window, where trades emit a synthetic
/// empty-depth tick instead of a real one.
fn in_synthetic_auction_window(exchange_time: i64) -> bool {
    let t = hhmmss(exchange_time);
    (92500..93000).contains(&t) || (145700..=151000).contains(&t)
}

#[derive(Debug, Clone, Copy)]
struct ResidualMarketOrder {
    unique_id: i64,
    side: Side,
    remaining_qty: i64,
    last_traded_price: i64,
}

struct SymbolState {
    book: Book,
    call_auction: CallAuctionHolder,
    ranged: RangedAccumulator,
    validator: MdValidator,
    in_continuous_stage: bool,
    residual_market_order: Option<ResidualMarketOrder>,
    seen_ids: HashSet<i64>,
    /// Set by a `Fill`, consumed by the following `Trade` at the same
    /// price level.
    cached_generated: Option<GeneratedL2Tick>,
}

impl SymbolState {
    fn new(symbol: Symbol) -> Self {
        SymbolState {
            book: Book::new(),
            call_auction: CallAuctionHolder::new(symbol),
            ranged: RangedAccumulator::new(symbol.as_shard_key()),
            validator: MdValidator::new(),
            in_continuous_stage: false,
            residual_market_order: None,
            seen_ids: HashSet::new(),
            cached_generated: None,
        }
    }
}

/// A single booker shard, owning a disjoint set of symbols.
pub struct BookerShard {
    symbols: HashMap<Symbol, SymbolState>,
    reporter: Arc<dyn ReporterSink>,
    enable_validation: bool,
    enable_advanced_calculating: bool,
}

impl BookerShard {
    pub fn new(reporter: Arc<dyn ReporterSink>) -> Self {
        BookerShard {
            symbols: HashMap::new(),
            reporter,
            enable_validation: true,
            enable_advanced_calculating: true,
        }
    }

    pub fn with_flags(
        reporter: Arc<dyn ReporterSink>,
        enable_validation: bool,
        enable_advanced_calculating: bool,
    ) -> Self {
        BookerShard {
            symbols: HashMap::new(),
            reporter,
            enable_validation,
            enable_advanced_calculating,
        }
    }

    /// Applies one order-add/cancel event. See the component design
    /// for the full decision tree.
    pub fn add(&mut self, order: OrderTick) {
        self.symbols
            .entry(order.symbol)
            .or_insert_with(|| SymbolState::new(order.symbol));

        if order.exchange_time >= CONTINUOUS_START && !self.symbols[&order.symbol].in_continuous_stage {
            self.switch_to_continuous_stage(order.symbol);
        }

        let known = self.symbols[&order.symbol].seen_ids.contains(&order.unique_id);
        if known && order.order_type != OrderType::Cancel {
            warn!(unique_id = order.unique_id, symbol = %order.symbol, "duplicate order, dropping");
            return;
        }

        if order.exchange_time < PRE_AUCTION_CUTOFF {
            let state = self.symbols.get_mut(&order.symbol).unwrap();
            state.call_auction.push(order);
            return;
        }

        // Continuous phase: first drain a distinct pending residual
        // market order, feeding it straight into the matcher.
        let drained = {
            let state = self.symbols.get_mut(&order.symbol).unwrap();
            match state.residual_market_order.take() {
                Some(r) if r.unique_id != order.unique_id => Some(r),
                Some(r) => {
                    state.residual_market_order = Some(r);
                    None
                }
                None => None,
            }
        };
        if let Some(r) = drained {
            let virtual_order = OrderTick {
                unique_id: r.unique_id,
                symbol: order.symbol,
                order_type: OrderType::Limit,
                side: r.side,
                price_1000x: r.last_traded_price,
                quantity: r.remaining_qty,
                exchange_time: order.exchange_time,
            };
            self.dispatch(virtual_order);
        }

        if order.order_type == OrderType::Market {
            let state = self.symbols.get_mut(&order.symbol).unwrap();
            state.residual_market_order = Some(ResidualMarketOrder {
                unique_id: order.unique_id,
                side: order.side,
                remaining_qty: order.quantity,
                last_traded_price: order.price_1000x,
            });
            return;
        }

        {
            let state = self.symbols.get_mut(&order.symbol).unwrap();
            state.seen_ids.insert(order.unique_id);
        }
        self.dispatch(order);

        if self.enable_advanced_calculating && in_continuous_session(order.exchange_time) {
            self.feed_ranged(order);
        }
    }

    /// `auction(order_wrapper)`: routes a continuous-phase order to
    /// the matching core.
    fn dispatch(&mut self, order: OrderTick) {
        let state = self.symbols.get_mut(&order.symbol).unwrap();
        match order.order_type {
            OrderType::Limit => {
                let events = matching::match_limit(
                    &mut state.book,
                    order.unique_id,
                    order.side,
                    order.price_1000x,
                    order.quantity,
                    order.exchange_time,
                );
                self.handle_events(order, events);
            }
            OrderType::BestPrice => {
                let best = self.symbols[&order.symbol].book.best_opposite_price(order.side);
                match best {
                    Some(price) => {
                        let state = self.symbols.get_mut(&order.symbol).unwrap();
                        let events = matching::match_limit(
                            &mut state.book,
                            order.unique_id,
                            order.side,
                            price,
                            order.quantity,
                            order.exchange_time,
                        );
                        self.handle_events(order, events);
                    }
                    None => {
                        warn!(unique_id = order.unique_id, "best_price order dropped, opposite side empty");
                    }
                }
            }
            OrderType::Cancel => {
                let state = self.symbols.get_mut(&order.symbol).unwrap();
                if let Some(evt) = matching::cancel(&mut state.book, order.unique_id) {
                    self.handle_events(order, vec![evt]);
                }
            }
            OrderType::Market | OrderType::Fill => {
                warn!(unique_id = order.unique_id, order_type = ?order.order_type, "unsupported order type dropped");
                self.reporter.order_rejected(OrderRejection {
                    unique_id: order.unique_id,
                    symbol: order.symbol,
                    reason: RejectReason::BareMarketOrder,
                });
            }
        }
    }

    fn handle_events(&mut self, order: OrderTick, events: Vec<MatchEvent>) {
        for event in events {
            match event {
                MatchEvent::Fill {
                    resting_id,
                    incoming_id,
                    fill_qty,
                    fill_price,
                    resting_side,
                } => {
                    let (ask_id, bid_id) = match resting_side {
                        Side::Sell => (resting_id, incoming_id),
                        Side::Buy => (incoming_id, resting_id),
                    };
                    let state = self.symbols.get_mut(&order.symbol).unwrap();
                    state.cached_generated = Some(GeneratedL2Tick {
                        symbol: order.symbol,
                        price_1000x: fill_price,
                        quantity: fill_qty,
                        ask_unique_id: ask_id,
                        bid_unique_id: bid_id,
                        exchange_time: order.exchange_time,
                        ask_levels: Default::default(),
                        bid_levels: Default::default(),
                        result: true,
                    });
                    if self.enable_advanced_calculating {
                        state.ranged.on_fill(order.side, fill_qty, fill_price);
                    }
                }
                MatchEvent::Trade { price_1000x, quantity } => {
                    let state = self.symbols.get_mut(&order.symbol).unwrap();
                    if let Some(mut tick) = state.cached_generated.take() {
                        tick.price_1000x = price_1000x;
                        tick.quantity = quantity;
                        tick.ask_levels = state.book.depth(Side::Sell);
                        tick.bid_levels = state.book.depth(Side::Buy);
                        if self.enable_validation {
                            state.validator.observe_generated(&tick);
                            tick.result = !state.validator.is_failed();
                        }
                        self.reporter.l2_tick_generated(tick);
                    }
                }
                MatchEvent::Reject { unique_id, reason } => {
                    self.reporter.order_rejected(OrderRejection {
                        unique_id,
                        symbol: order.symbol,
                        reason,
                    });
                }
                MatchEvent::CancelReject { unique_id } => {
                    warn!(unique_id, symbol = %order.symbol, "cancel target not found");
                    self.reporter.order_rejected(OrderRejection {
                        unique_id,
                        symbol: order.symbol,
                        reason: RejectReason::UnknownCancelTarget,
                    });
                }
            }
        }
    }

    fn feed_ranged(&mut self, order: OrderTick) {
        let state = self.symbols.get_mut(&order.symbol).unwrap();
        let is_cancel = order.order_type == OrderType::Cancel;
        if let Some(flushed) = state.ranged.on_order_event(
            order.exchange_time,
            order.side,
            order.price_1000x,
            order.quantity,
            is_cancel,
            &state.book,
        ) {
            self.reporter.ranged_tick_generated(flushed);
        }
    }

    /// Applies one exchange-published trade execution.
    pub fn trade(&mut self, trade: TradeTick) {
        self.symbols
            .entry(trade.symbol)
            .or_insert_with(|| SymbolState::new(trade.symbol));

        let residual = {
            let state = self.symbols.get_mut(&trade.symbol).unwrap();
            state.residual_market_order.take()
        };
        if let Some(mut r) = residual {
            let virtual_qty = trade.exec_quantity.min(r.remaining_qty);
            let virtual_order = OrderTick {
                unique_id: r.unique_id,
                symbol: trade.symbol,
                order_type: OrderType::Limit,
                side: r.side,
                price_1000x: trade.exec_price_1000x,
                quantity: virtual_qty,
                exchange_time: trade.exchange_time,
            };
            self.add(virtual_order);
            r.remaining_qty -= virtual_qty;
            r.last_traded_price = trade.exec_price_1000x;
            let state = self.symbols.get_mut(&trade.symbol).unwrap();
            if r.remaining_qty > 0 {
                state.residual_market_order = Some(r);
            }
            return;
        }

        // Before the continuous stage, the matched orders live in the
        // call-auction holder, not the Book; apply the reduction
        // there instead of falling through to virtual-order synthesis.
        if trade.exchange_time < CONTINUOUS_START {
            self.auction_trade(trade);
            if in_synthetic_auction_window(trade.exchange_time) {
                let tick = GeneratedL2Tick {
                    symbol: trade.symbol,
                    price_1000x: trade.exec_price_1000x,
                    quantity: trade.exec_quantity,
                    ask_unique_id: trade.ask_unique_id,
                    bid_unique_id: trade.bid_unique_id,
                    exchange_time: trade.exchange_time,
                    ask_levels: Default::default(),
                    bid_levels: Default::default(),
                    result: true,
                };
                self.reporter.l2_tick_generated(tick);
            }
            return;
        }

        if in_synthetic_auction_window(trade.exchange_time) {
            // Closing-auction overlap: continuous trading has already
            // ended for the day: only the synthetic emission applies.
            let tick = GeneratedL2Tick {
                symbol: trade.symbol,
                price_1000x: trade.exec_price_1000x,
                quantity: trade.exec_quantity,
                ask_unique_id: trade.ask_unique_id,
                bid_unique_id: trade.bid_unique_id,
                exchange_time: trade.exchange_time,
                ask_levels: Default::default(),
                bid_levels: Default::default(),
                result: true,
            };
            self.reporter.l2_tick_generated(tick);
            return;
        }

        let ask_known = self.symbols[&trade.symbol].book.contains(trade.ask_unique_id);
        if !ask_known {
            let virt = OrderTick {
                unique_id: trade.ask_unique_id,
                symbol: trade.symbol,
                order_type: OrderType::Limit,
                side: Side::Sell,
                price_1000x: trade.exec_price_1000x,
                quantity: trade.exec_quantity,
                exchange_time: trade.exchange_time,
            };
            self.add(virt);
            self.symbols
                .get_mut(&trade.symbol)
                .unwrap()
                .seen_ids
                .remove(&trade.ask_unique_id);
        }

        let bid_known = self.symbols[&trade.symbol].book.contains(trade.bid_unique_id);
        if !bid_known {
            let virt = OrderTick {
                unique_id: trade.bid_unique_id,
                symbol: trade.symbol,
                order_type: OrderType::Limit,
                side: Side::Buy,
                price_1000x: trade.exec_price_1000x,
                quantity: trade.exec_quantity,
                exchange_time: trade.exchange_time,
            };
            self.add(virt);
            self.symbols
                .get_mut(&trade.symbol)
                .unwrap()
                .seen_ids
                .remove(&trade.bid_unique_id);
        }

        if self.enable_validation {
            let state = self.symbols.get_mut(&trade.symbol).unwrap();
            state.validator.validate_trade(&trade);
        }
        self.reporter.exchange_trade_tick_arrived(trade);
    }

    /// Feeds an exchange-published L2 snapshot to this symbol's MD
    /// Validator and forwards the raw snapshot to the Reporter Sink.
    /// Never reaches the matching core.
    pub fn observe_l2_snapshot(&mut self, l2: L2Tick) {
        self.symbols
            .entry(l2.symbol)
            .or_insert_with(|| SymbolState::new(l2.symbol));
        if self.enable_validation {
            let state = self.symbols.get_mut(&l2.symbol).unwrap();
            state.validator.validate_l2(&l2);
        }
        self.reporter.exchange_l2_tick_arrived(l2);
    }

    /// Applies an auction trade to a pre-open symbol's call-auction
    /// holder (not the book). Distinct from `trade()`, which handles
    /// continuous-phase and synthetic-window trades.
    pub fn auction_trade(&mut self, trade: TradeTick) {
        let state = self
            .symbols
            .entry(trade.symbol)
            .or_insert_with(|| SymbolState::new(trade.symbol));
        state.call_auction.trade(&trade);
    }

    /// Idempotent: drains the call-auction holder in insertion order,
    /// rewriting each drained order's time to 09:30:00.000 and
    /// re-feeding it through `add`. Fires at most once per symbol.
    ///
    /// The flag is set *before* the drain loop, not after (contrary
    /// to a literal reading of the add-path description): `add`
    /// re-triggers this same function for every drained order once
    /// its rewritten time is observed, so the flag has to already be
    /// set going in or the drain would recurse into itself.
    pub fn switch_to_continuous_stage(&mut self, symbol: Symbol) {
        self.symbols
            .entry(symbol)
            .or_insert_with(|| SymbolState::new(symbol));
        if self.symbols[&symbol].in_continuous_stage {
            return;
        }
        self.symbols.get_mut(&symbol).unwrap().in_continuous_stage = true;
        loop {
            let next = {
                let state = self.symbols.get_mut(&symbol).unwrap();
                state.call_auction.pop()
            };
            let Some(mut order) = next else { break };
            order.exchange_time = CONTINUOUS_START;
            self.add(order);
        }
    }

    #[cfg(test)]
    fn state(&self, symbol: Symbol) -> Option<&SymbolState> {
        self.symbols.get(&symbol)
    }
}
