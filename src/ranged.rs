//! Windowed order-flow analytics: a 3-second rolling accumulator per
//! symbol, flushed into a [`RangedTick`] whenever the buffered window
//! closes. Grounded on the source's `refresh_range` / `add_range_snap`
//! / `generate_weighted_price` / `align_time` family.

use crate::book::Book;
use crate::types::{
    BIG_ORDER_NOTIONAL_THRESHOLD, GENERATED_DEPTH, RANGE_WINDOW_SECONDS, RangedTick, Side,
    VALIDITY_DURATION_SENTINEL_MS,
};

/// Rounds an `HHMMSSmmm` exchange time down to the start of its
/// enclosing 3-second boundary (seconds component in `{0,3,...,57}`),
/// zeroing the millisecond component.
pub fn align_time(exchange_time: i64) -> i64 {
    let hhmmss = exchange_time / 1000;
    let ss = hhmmss % 100;
    let mm = (hhmmss / 100) % 100;
    let hh = hhmmss / 10000;
    let aligned_ss = (ss / RANGE_WINDOW_SECONDS) * RANGE_WINDOW_SECONDS;
    (hh * 10000 + mm * 100 + aligned_ss) * 1000
}

fn millis_between(later: i64, earlier: i64) -> i64 {
    // both are HHMMSSmmm; exact subtraction is only meaningful within
    // the same minute, which holds for anything inside one 3s window.
    let ms = |t: i64| {
        let hhmmss = t / 1000;
        let millis = t % 1000;
        let ss = hhmmss % 100;
        let mm = (hhmmss / 100) % 100;
        let hh = hhmmss / 10000;
        (((hh * 60 + mm) * 60 + ss) * 1000) + millis
    };
    ms(later) - ms(earlier)
}

/// `1 - tanh((level_price / reference_price - 1) * 100)`, matching
/// the source's weighted-price-distance formula (double precision).
fn weighted_distance(level_price_1000x: i64, reference_price_1000x: i64) -> f64 {
    if reference_price_1000x == 0 {
        return 0.0;
    }
    let ratio = level_price_1000x as f64 / reference_price_1000x as f64 - 1.0;
    1.0 - (ratio * 100.0).tanh()
}

struct BestTracker {
    initial_price: Option<i64>,
    changed_at_ms: Option<i64>,
}

impl BestTracker {
    fn new() -> Self {
        BestTracker {
            initial_price: None,
            changed_at_ms: None,
        }
    }

    fn reset(&mut self) {
        self.initial_price = None;
        self.changed_at_ms = None;
    }

    /// Observes the current best price at `offset_ms` into the
    /// window. Per the source's documented quirk, the baseline is the
    /// first *observed* price (from the first buffered event), not
    /// the book's state at the true window start.
    fn observe(&mut self, price: Option<i64>, offset_ms: i64) {
        let Some(price) = price else { return };
        match self.initial_price {
            None => self.initial_price = Some(price),
            Some(initial) if initial != price && self.changed_at_ms.is_none() => {
                self.changed_at_ms = Some(offset_ms);
            }
            _ => {}
        }
    }

    fn validity_duration_ms(&self) -> i64 {
        self.changed_at_ms.unwrap_or(VALIDITY_DURATION_SENTINEL_MS)
    }
}

/// Per-symbol rolling 3-second accumulator.
pub struct RangedAccumulator {
    symbol_shard_key: u64,
    window_start: i64,
    window_start_observed: bool,
    acc: RangedTick,
    prev_ask_levels: [i64; GENERATED_DEPTH],
    prev_bid_levels: [i64; GENERATED_DEPTH],
    ask_tracker: BestTracker,
    bid_tracker: BestTracker,
}

impl RangedAccumulator {
    pub fn new(symbol_shard_key: u64) -> Self {
        RangedAccumulator {
            symbol_shard_key,
            window_start: 0,
            window_start_observed: false,
            acc: RangedTick {
                symbol_shard_key,
                ..Default::default()
            },
            prev_ask_levels: [0; GENERATED_DEPTH],
            prev_bid_levels: [0; GENERATED_DEPTH],
            ask_tracker: BestTracker::new(),
            bid_tracker: BestTracker::new(),
        }
    }

    fn start_new_window(&mut self, aligned_time: i64) {
        self.window_start = aligned_time;
        self.window_start_observed = true;
        self.acc = RangedTick {
            symbol_shard_key: self.symbol_shard_key,
            window_start: aligned_time,
            ..Default::default()
        };
        self.ask_tracker.reset();
        self.bid_tracker.reset();
    }

    /// Feeds one order event (add or cancel). Returns the flushed
    /// `RangedTick` if this event's time closed the previous window.
    #[allow(clippy::too_many_arguments)]
    pub fn on_order_event(
        &mut self,
        event_time: i64,
        side: Side,
        price_1000x: i64,
        quantity: i64,
        is_cancel: bool,
        book: &Book,
    ) -> Option<RangedTick> {
        let aligned = align_time(event_time);
        let mut flushed = None;
        if !self.window_start_observed {
            self.start_new_window(aligned);
        } else if aligned - self.window_start >= RANGE_WINDOW_SECONDS * 1000 {
            flushed = Some(self.flush(book));
            self.start_new_window(aligned);
        }

        let offset_ms = millis_between(event_time, self.window_start);
        self.ask_tracker.observe(book.best_opposite_price(Side::Buy), offset_ms);
        self.bid_tracker.observe(book.best_opposite_price(Side::Sell), offset_ms);

        if is_cancel {
            match side {
                Side::Buy => self.acc.new_canceled_buy_1_quantity += quantity,
                Side::Sell => self.acc.new_canceled_sell_1_quantity += quantity,
            }
            return flushed;
        }

        match side {
            Side::Buy => self.acc.active_buy_number += 1,
            Side::Sell => self.acc.active_sell_number += 1,
        }

        let best_opposite = book.best_opposite_price(side);
        let crosses = match (side, best_opposite) {
            (Side::Buy, Some(best_ask)) => price_1000x >= best_ask,
            (Side::Sell, Some(best_bid)) => price_1000x <= best_bid,
            _ => false,
        };
        if crosses {
            match side {
                Side::Buy => self.acc.aggressive_buy_number += 1,
                Side::Sell => self.acc.aggressive_sell_number += 1,
            }
        }

        let own_best = book.best_opposite_price(side.opposite());
        if own_best == Some(price_1000x) {
            match side {
                Side::Buy => self.acc.new_added_buy_1_quantity += quantity,
                Side::Sell => self.acc.new_added_sell_1_quantity += quantity,
            }
        }

        if self.acc.running_high_price_1000x == 0 || price_1000x > self.acc.running_high_price_1000x {
            self.acc.running_high_price_1000x = price_1000x;
        }
        if self.acc.running_low_price_1000x == 0 || price_1000x < self.acc.running_low_price_1000x {
            self.acc.running_low_price_1000x = price_1000x;
        }

        flushed
    }

    /// Records a fill's contribution to the in-flight window.
    pub fn on_fill(&mut self, aggressor_side: Side, quantity: i64, price_1000x: i64) {
        let notional = price_1000x.saturating_mul(quantity);
        match aggressor_side {
            Side::Buy => {
                self.acc.active_traded_buy_number += 1;
                self.acc.traded_buy_quantity += quantity;
                self.acc.traded_buy_notional += notional;
                if notional >= BIG_ORDER_NOTIONAL_THRESHOLD {
                    self.acc.big_order_buy_notional += notional;
                }
            }
            Side::Sell => {
                self.acc.active_traded_sell_number += 1;
                self.acc.traded_sell_quantity += quantity;
                self.acc.traded_sell_notional += notional;
                if notional >= BIG_ORDER_NOTIONAL_THRESHOLD {
                    self.acc.big_order_sell_notional += notional;
                }
            }
        }
    }

    fn flush(&mut self, book: &Book) -> RangedTick {
        let mut out = self.acc;
        out.ask_validity_duration_ms = self.ask_tracker.validity_duration_ms();
        out.bid_validity_duration_ms = self.bid_tracker.validity_duration_ms();

        let ask_depth = book.depth(Side::Sell);
        let bid_depth = book.depth(Side::Buy);
        let ref_ask = self.ask_tracker.initial_price.unwrap_or(ask_depth[0].price_1000x);
        let ref_bid = self.bid_tracker.initial_price.unwrap_or(bid_depth[0].price_1000x);
        for i in 0..GENERATED_DEPTH {
            out.ask_weighted_distance[i] = weighted_distance(ask_depth[i].price_1000x, ref_ask);
            out.bid_weighted_distance[i] = weighted_distance(bid_depth[i].price_1000x, ref_bid);
            self.prev_ask_levels[i] = ask_depth[i].price_1000x;
            self.prev_bid_levels[i] = bid_depth[i].price_1000x;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::RestingOrder;

    #[test]
    fn align_time_rounds_down_to_3s_boundary() {
        assert_eq!(align_time(93002500), 93000000);
        assert_eq!(align_time(93005999), 93003000);
        assert_eq!(align_time(93059000), 93057000);
    }

    #[test]
    fn flush_fires_after_3s_and_resets() {
        let mut book = Book::new();
        book.insert_resting(RestingOrder { unique_id: 0, side: Side::Buy, price_1000x: 2233, open_qty: 100, exchange_time: 93000000 });
        let mut acc = RangedAccumulator::new(1);
        assert!(acc.on_order_event(93000500, Side::Buy, 2233, 10, false, &book).is_none());
        assert!(acc.on_order_event(93001000, Side::Sell, 2250, 5, false, &book).is_none());
        let flushed = acc.on_order_event(93004000, Side::Buy, 2240, 5, false, &book);
        assert!(flushed.is_some());
        let tick = flushed.unwrap();
        assert_eq!(tick.active_buy_number, 1);
        assert_eq!(tick.active_sell_number, 1);
    }

    #[test]
    fn big_order_notional_threshold() {
        let mut acc = RangedAccumulator::new(1);
        acc.on_fill(Side::Buy, 1000, 100_000);
        assert_eq!(acc.acc.big_order_buy_notional, 100_000_000);
        assert_eq!(acc.acc.traded_buy_notional, 100_000_000);
    }
}
