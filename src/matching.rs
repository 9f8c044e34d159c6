//! Matching Core: price-time-priority limit matching against a
//! [`Book`], emitting a sealed event enum in place of the
//! inheritance-based `TradeListener`/`OrderListener` callbacks the
//! source uses (see design notes).

use crate::book::{Book, RestingOrder};
use crate::types::{RejectReason, Side};

/// One event emitted by the matcher. The shard pattern-matches on
/// this instead of registering separate listener callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// One resting order absorbed `fill_qty` of the incoming order at
    /// `fill_price` (the resting order's price; price-maker wins).
    Fill {
        resting_id: i64,
        incoming_id: i64,
        fill_qty: i64,
        fill_price: i64,
        resting_side: Side,
    },
    /// Aggregates every `Fill` against the same price level, emitted
    /// once all fills at that level have been applied.
    Trade { price_1000x: i64, quantity: i64 },
    Reject { unique_id: i64, reason: RejectReason },
    CancelReject { unique_id: i64 },
}

/// Matches a limit order against `book`, resting any unfilled
/// remainder. Returns the ordered sequence of `Fill`/`Trade` events
/// (or a single `Reject` for a zero-quantity order).
pub fn match_limit(
    book: &mut Book,
    incoming_id: i64,
    incoming_side: Side,
    incoming_price: i64,
    incoming_qty: i64,
    incoming_time: i64,
) -> Vec<MatchEvent> {
    if incoming_qty <= 0 {
        return vec![MatchEvent::Reject {
            unique_id: incoming_id,
            reason: RejectReason::ZeroQuantity,
        }];
    }

    let opp_side = incoming_side.opposite();
    let mut remaining = incoming_qty;
    let mut events = Vec::new();

    while remaining > 0 {
        // Read the level price from the live resting order itself,
        // *after* `peek_front_live` has pruned any tombstoned level
        // ahead of it — a price read from `best_opposite_price`
        // beforehand can name a level that pruning just removed,
        // which would wrongly compare against the next level's price
        // below and break the sweep early.
        let Some(resting_id) = book.peek_front_live(opp_side) else {
            break;
        };
        let resting: RestingOrder = *book.order_mut(resting_id).expect("peeked id is live");
        let level_price = resting.price_1000x;

        let acceptable = match incoming_side {
            Side::Buy => level_price <= incoming_price,
            Side::Sell => level_price >= incoming_price,
        };
        if !acceptable {
            break;
        }

        let mut level_qty = 0i64;
        loop {
            if remaining == 0 {
                break;
            }
            let Some(resting_id) = book.peek_front_live(opp_side) else {
                break;
            };
            let resting: RestingOrder = *book.order_mut(resting_id).expect("peeked id is live");
            if resting.price_1000x != level_price {
                break;
            }

            let fill_qty = remaining.min(resting.open_qty);
            let remaining_open = resting.open_qty - fill_qty;
            if remaining_open == 0 {
                book.remove_filled(resting_id);
                book.consume_front(opp_side, level_price);
            } else {
                book.order_mut(resting_id).unwrap().open_qty = remaining_open;
            }
            remaining -= fill_qty;
            level_qty += fill_qty;

            events.push(MatchEvent::Fill {
                resting_id,
                incoming_id,
                fill_qty,
                fill_price: level_price,
                resting_side: opp_side,
            });
        }

        if level_qty > 0 {
            events.push(MatchEvent::Trade {
                price_1000x: level_price,
                quantity: level_qty,
            });
        } else {
            break;
        }
    }

    if remaining > 0 {
        book.insert_resting(RestingOrder {
            unique_id: incoming_id,
            side: incoming_side,
            price_1000x: incoming_price,
            open_qty: remaining,
            exchange_time: incoming_time,
        });
    }

    events
}

/// Cancels a resting order. Emits `CancelReject` if the id is
/// unknown; emits no `Trade`.
pub fn cancel(book: &mut Book, unique_id: i64) -> Option<MatchEvent> {
    if book.cancel(unique_id) {
        None
    } else {
        Some(MatchEvent::CancelReject { unique_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_price_full_match_emits_one_trade() {
        let mut book = Book::new();
        book.insert_resting(RestingOrder {
            unique_id: 0,
            side: Side::Buy,
            price_1000x: 2233,
            open_qty: 100,
            exchange_time: 93000000,
        });
        let events = match_limit(&mut book, 1, Side::Sell, 2233, 100, 93000001);
        let trades: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, MatchEvent::Trade { .. }))
            .collect();
        assert_eq!(trades.len(), 1);
        assert_eq!(
            trades[0],
            &MatchEvent::Trade {
                price_1000x: 2233,
                quantity: 100
            }
        );
        assert!(book.best_opposite_price(Side::Sell).is_none());
    }

    #[test]
    fn partial_fill_leaves_resting_order() {
        let mut book = Book::new();
        book.insert_resting(RestingOrder {
            unique_id: 0,
            side: Side::Buy,
            price_1000x: 2233,
            open_qty: 100,
            exchange_time: 93000000,
        });
        let events = match_limit(&mut book, 1, Side::Sell, 2233, 50, 93000001);
        assert!(events.iter().any(|e| matches!(e, MatchEvent::Trade { quantity: 50, .. })));
        assert_eq!(book.open_qty(0), Some(50));
    }

    #[test]
    fn step_price_sweep_two_trades() {
        let mut book = Book::new();
        book.insert_resting(RestingOrder { unique_id: 0, side: Side::Buy, price_1000x: 2233, open_qty: 20, exchange_time: 93000000 });
        book.insert_resting(RestingOrder { unique_id: 1, side: Side::Buy, price_1000x: 3322, open_qty: 40, exchange_time: 93000000 });
        book.insert_resting(RestingOrder { unique_id: 2, side: Side::Buy, price_1000x: 3333, open_qty: 80, exchange_time: 93000000 });
        let events = match_limit(&mut book, 3, Side::Sell, 3322, 100, 93000001);
        let trades: Vec<_> = events.iter().filter_map(|e| match e {
            MatchEvent::Trade { price_1000x, quantity } => Some((*price_1000x, *quantity)),
            _ => None,
        }).collect();
        assert_eq!(trades, vec![(3333, 80), (3322, 20)]);
        assert_eq!(book.open_qty(1), Some(20));
        assert_eq!(book.best_opposite_price(Side::Sell), Some(3322));
    }

    #[test]
    fn cancel_unknown_is_rejected() {
        let mut book = Book::new();
        assert_eq!(cancel(&mut book, 42), Some(MatchEvent::CancelReject { unique_id: 42 }));
    }

    #[test]
    fn sweeps_past_a_cancelled_zombie_level_to_the_true_best() {
        let mut book = Book::new();
        book.insert_resting(RestingOrder { unique_id: 0, side: Side::Sell, price_1000x: 2200, open_qty: 50, exchange_time: 93000000 });
        book.insert_resting(RestingOrder { unique_id: 1, side: Side::Sell, price_1000x: 2300, open_qty: 20, exchange_time: 93000000 });
        assert!(cancel(&mut book, 0).is_none());

        // A buy at 2300 should fully match against the live order at
        // 2300, not rest unmatched because of a price read for the
        // already-cancelled 2200 level.
        let events = match_limit(&mut book, 2, Side::Buy, 2300, 20, 93000001);
        let trades: Vec<_> = events.iter().filter_map(|e| match e {
            MatchEvent::Trade { price_1000x, quantity } => Some((*price_1000x, *quantity)),
            _ => None,
        }).collect();
        assert_eq!(trades, vec![(2300, 20)]);
        assert!(!book.contains(2));
    }
}
