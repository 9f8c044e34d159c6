//! Integration-level tests against the public crate API: the wire
//! decoder's round-trip through `BookerShard`, a JSON serialisation
//! check for the wire-facing record types, and a price-time-priority
//! property test over randomised order sequences.

use std::sync::Arc;

use cnmd_booker::book::Book;
use cnmd_booker::matching::{self, MatchEvent};
use cnmd_booker::reporter::NopReporterSink;
use cnmd_booker::shard::BookerShard;
use cnmd_booker::types::{OrderTick, OrderType, Side, Symbol, TradeTick, SzseExeType};

fn symbol() -> Symbol {
    Symbol::from_str("000001.SZ")
}

fn limit(id: i64, side: Side, price: i64, qty: i64, time: i64) -> OrderTick {
    OrderTick {
        unique_id: id,
        symbol: symbol(),
        order_type: OrderType::Limit,
        side,
        price_1000x: price,
        quantity: qty,
        exchange_time: time,
    }
}

#[test]
fn shard_accepts_szse_residual_market_order_lifecycle() {
    let mut shard = BookerShard::new(Arc::new(NopReporterSink));
    shard.add(limit(10, Side::Sell, 3333, 80, 93000000));
    shard.add(OrderTick {
        unique_id: 3,
        symbol: symbol(),
        order_type: OrderType::Market,
        side: Side::Buy,
        price_1000x: 0,
        quantity: 100,
        exchange_time: 93000001,
    });
    shard.trade(TradeTick {
        ask_unique_id: 10,
        bid_unique_id: 3,
        symbol: symbol(),
        exec_price_1000x: 3333,
        exec_quantity: 80,
        exchange_time: 93000002,
        x_ost_szse_exe_type: SzseExeType::Trade,
    });
    // Remaining 20 shares of the market order are still pending,
    // driven by a second trade at a new price.
    shard.add(limit(11, Side::Sell, 3340, 20, 93000003));
    shard.trade(TradeTick {
        ask_unique_id: 11,
        bid_unique_id: 3,
        symbol: symbol(),
        exec_price_1000x: 3340,
        exec_quantity: 20,
        exchange_time: 93000004,
        x_ost_szse_exe_type: SzseExeType::Trade,
    });
}

#[test]
fn generated_tick_round_trips_through_json() {
    let tick = cnmd_booker::types::GeneratedL2Tick {
        symbol: symbol(),
        price_1000x: 2233,
        quantity: 100,
        ask_unique_id: 1,
        bid_unique_id: 0,
        exchange_time: 93000000,
        ask_levels: Default::default(),
        bid_levels: Default::default(),
        result: true,
    };
    let json = serde_json::to_string(&tick).expect("serialize");
    let back: cnmd_booker::types::GeneratedL2Tick =
        serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, tick);
}

proptest::proptest! {
    /// For any sequence of resting buy orders and one sweeping sell,
    /// fills always drain the highest-priced level first and, within
    /// a level, strict insertion-order FIFO.
    #[test]
    fn price_time_priority_holds(
        prices in proptest::collection::vec(1_000i64..10_000, 1..8),
        qtys in proptest::collection::vec(1i64..50, 1..8),
    ) {
        let n = prices.len().min(qtys.len());
        let mut book = Book::new();
        let mut total_qty = 0i64;
        for i in 0..n {
            book.insert_resting(cnmd_booker::book::RestingOrder {
                unique_id: i as i64,
                side: Side::Buy,
                price_1000x: prices[i],
                open_qty: qtys[i],
                exchange_time: 93000000,
            });
            total_qty += qtys[i];
        }

        let events = matching::match_limit(&mut book, 1000, Side::Sell, 1, total_qty, 93000001);

        let mut last_price: Option<i64> = None;
        for event in &events {
            if let MatchEvent::Trade { price_1000x, .. } = event {
                if let Some(last) = last_price {
                    proptest::prop_assert!(*price_1000x <= last, "prices must be non-increasing across sweeps");
                }
                last_price = Some(*price_1000x);
            }
        }
        proptest::prop_assert!(book.best_opposite_price(Side::Sell).is_none());
    }

    /// Interleaving cancels among the resting orders must never let a
    /// tombstoned level leak into the depth snapshot as a stray zero
    /// slot ahead of a live one, nor stop a marketable sweep short of
    /// a live level sitting behind a cancelled one.
    #[test]
    fn cancel_interleaved_book_invariants_hold(
        prices in proptest::collection::vec(1_000i64..10_000, 2..8),
        qtys in proptest::collection::vec(1i64..50, 2..8),
        cancel_mask in proptest::collection::vec(proptest::bool::ANY, 2..8),
    ) {
        let n = prices.len().min(qtys.len()).min(cancel_mask.len());
        let mut book = Book::new();
        let mut live_total = 0i64;
        for i in 0..n {
            book.insert_resting(cnmd_booker::book::RestingOrder {
                unique_id: i as i64,
                side: Side::Buy,
                price_1000x: prices[i],
                open_qty: qtys[i],
                exchange_time: 93000000,
            });
        }
        for i in 0..n {
            if cancel_mask[i] {
                book.cancel(i as i64);
            } else {
                live_total += qtys[i];
            }
        }

        let depth = book.depth(Side::Buy);
        let mut seen_zero = false;
        for level in depth.iter() {
            if level.quantity == 0 {
                seen_zero = true;
            } else {
                proptest::prop_assert!(!seen_zero, "a live level followed a zero slot");
            }
        }

        let events = matching::match_limit(&mut book, 1000, Side::Sell, 1, live_total.max(1), 93000001);
        for event in &events {
            if let MatchEvent::Fill { resting_id, .. } = event {
                let was_cancelled = cancel_mask.get(*resting_id as usize).copied().unwrap_or(false);
                proptest::prop_assert!(!was_cancelled, "a cancelled order was filled");
            }
        }
        if live_total > 0 {
            proptest::prop_assert!(book.best_opposite_price(Side::Sell).is_none());
        }
    }
}
