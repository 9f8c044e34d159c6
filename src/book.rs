//! Per-symbol price-time-priority limit order book.
//!
//! Each `Book` is owned exclusively by one Booker Shard (see the
//! concurrency model): no internal locking is required, so the side
//! maps are plain `BTreeMap`s rather than the lock-free skip lists a
//! book shared across threads would need. Resting orders are
//! arena-allocated behind integer handles (`unique_id`) in a
//! `HashMap`; cancelling an order removes it from the map only
//! ("mark tombstone") and leaves its id in the level's queue, which
//! lazily skips ids no longer present in the map the next time it is
//! walked.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::types::{GENERATED_DEPTH, LevelSlot, Side};

/// One resting order in the arena.
#[derive(Debug, Clone, Copy)]
pub struct RestingOrder {
    pub unique_id: i64,
    pub side: Side,
    pub price_1000x: i64,
    pub open_qty: i64,
    pub exchange_time: i64,
}

/// FIFO queue of order ids at one price, insertion order preserved.
#[derive(Debug, Default)]
struct PriceLevel {
    price_1000x: i64,
    queue: VecDeque<i64>,
}

/// Bids are keyed by negated price so `BTreeMap`'s ascending iteration
/// yields descending price (best bid first); asks are keyed directly.
fn bid_key(price_1000x: i64) -> i64 {
    -price_1000x
}

/// The book for a single symbol.
#[derive(Default)]
pub struct Book {
    bids: BTreeMap<i64, PriceLevel>,
    asks: BTreeMap<i64, PriceLevel>,
    orders: HashMap<i64, RestingOrder>,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, unique_id: i64) -> bool {
        self.orders.contains_key(&unique_id)
    }

    pub fn open_qty(&self, unique_id: i64) -> Option<i64> {
        self.orders.get(&unique_id).map(|o| o.open_qty)
    }

    /// Best opposite price for `side`: best ask for a buy order, best
    /// bid for a sell order. `None` if that side is empty.
    pub fn best_opposite_price(&self, side: Side) -> Option<i64> {
        match side {
            Side::Buy => self.asks.keys().next().copied(),
            Side::Sell => self.bids.keys().next().map(|k| -k),
        }
    }

    /// Inserts a brand-new resting order at the back of its level's
    /// queue, creating the level if absent.
    pub fn insert_resting(&mut self, order: RestingOrder) {
        let map = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let key = match order.side {
            Side::Buy => bid_key(order.price_1000x),
            Side::Sell => order.price_1000x,
        };
        map.entry(key)
            .or_insert_with(|| PriceLevel {
                price_1000x: order.price_1000x,
                queue: VecDeque::new(),
            })
            .queue
            .push_back(order.unique_id);
        self.orders.insert(order.unique_id, order);
    }

    /// Removes the resting order (cancel). Returns `true` if it was
    /// found and tombstoned; `false` if unknown. The id is left in
    /// its level's queue and skipped lazily on the next walk.
    pub fn cancel(&mut self, unique_id: i64) -> bool {
        self.orders.remove(&unique_id).is_some()
    }

    /// Mutable access to a resting order's open quantity, used by the
    /// matcher.
    pub fn order_mut(&mut self, unique_id: i64) -> Option<&mut RestingOrder> {
        self.orders.get_mut(&unique_id)
    }

    /// Removes the order from the arena (used once it is fully
    /// filled) without touching the level queue; the id is dropped
    /// from the queue lazily on the next walk.
    pub fn remove_filled(&mut self, unique_id: i64) {
        self.orders.remove(&unique_id);
    }

    /// Returns the front id of the given side's best level without
    /// consuming it, pruning tombstoned (cancelled/filled) ids and
    /// empty levels as it goes. `None` once that side is exhausted.
    pub fn peek_front_live(&mut self, side: Side) -> Option<i64> {
        loop {
            let map = match side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            let key = *map.keys().next()?;
            let level = map.get_mut(&key).unwrap();
            let Some(&id) = level.queue.front() else {
                map.remove(&key);
                continue;
            };
            if self.orders.contains_key(&id) {
                return Some(id);
            }
            level.queue.pop_front();
            if level.queue.is_empty() {
                map.remove(&key);
            }
        }
    }

    /// Removes the front id of the level at `price_1000x` once it has
    /// been fully consumed by a match, dropping the level entry if it
    /// is now empty.
    pub fn consume_front(&mut self, side: Side, price_1000x: i64) {
        let key = match side {
            Side::Buy => bid_key(price_1000x),
            Side::Sell => price_1000x,
        };
        let map = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if let Some(level) = map.get_mut(&key) {
            level.queue.pop_front();
            if level.queue.is_empty() {
                map.remove(&key);
            }
        }
    }

    /// Five-level depth snapshot for `side`, summing live open
    /// quantity per exact price, zero-padded past the book's depth.
    ///
    /// A level whose every order has been tombstoned by `cancel` but
    /// never walked by `peek_front_live`/`consume_front` still has a
    /// `BTreeMap` entry; skipping over it here (rather than reporting
    /// it as a zero-quantity slot) keeps the result strictly ascending
    /// from the true best level with no gaps.
    pub fn depth(&self, side: Side) -> [LevelSlot; GENERATED_DEPTH] {
        let mut out = [LevelSlot::default(); GENERATED_DEPTH];
        let levels: Box<dyn Iterator<Item = &PriceLevel>> = match side {
            Side::Sell => Box::new(self.asks.values()),
            Side::Buy => Box::new(self.bids.values()),
        };
        let live = levels.filter_map(|level| {
            let qty: i64 = level
                .queue
                .iter()
                .filter_map(|id| self.orders.get(id))
                .map(|o| o.open_qty)
                .sum();
            (qty > 0).then_some((level.price_1000x, qty))
        });
        for (slot, (price_1000x, quantity)) in out.iter_mut().zip(live) {
            slot.price_1000x = price_1000x;
            slot.quantity = quantity;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: i64, side: Side, price: i64, qty: i64) -> RestingOrder {
        RestingOrder {
            unique_id: id,
            side,
            price_1000x: price,
            open_qty: qty,
            exchange_time: 93000000,
        }
    }

    #[test]
    fn insert_and_depth_zero_padded() {
        let mut book = Book::new();
        book.insert_resting(order(0, Side::Buy, 2233, 100));
        let depth = book.depth(Side::Buy);
        assert_eq!(depth[0].price_1000x, 2233);
        assert_eq!(depth[0].quantity, 100);
        assert_eq!(depth[1].quantity, 0);
    }

    #[test]
    fn cancel_removes_from_arena_not_queue() {
        let mut book = Book::new();
        book.insert_resting(order(0, Side::Buy, 2233, 100));
        assert!(book.cancel(0));
        assert!(!book.contains(0));
        // tombstoned id still sits at the front of the queue until
        // the next walk lazily prunes it
        assert_eq!(book.peek_front_live(Side::Buy), None);
        assert!(book.best_opposite_price(Side::Sell).is_none());
    }

    #[test]
    fn best_bid_is_highest_price() {
        let mut book = Book::new();
        book.insert_resting(order(0, Side::Buy, 2233, 20));
        book.insert_resting(order(1, Side::Buy, 3322, 40));
        book.insert_resting(order(2, Side::Buy, 3333, 80));
        assert_eq!(book.best_opposite_price(Side::Sell), Some(3333));
    }

    #[test]
    fn fifo_within_a_level() {
        let mut book = Book::new();
        book.insert_resting(order(0, Side::Sell, 2233, 20));
        book.insert_resting(order(1, Side::Sell, 2233, 40));
        assert_eq!(book.peek_front_live(Side::Sell), Some(0));
    }

    #[test]
    fn depth_skips_a_cancelled_level_never_walked() {
        let mut book = Book::new();
        book.insert_resting(order(0, Side::Sell, 2200, 50));
        book.insert_resting(order(1, Side::Sell, 2300, 50));
        assert!(book.cancel(0));
        // id 0's level is never touched by peek_front_live/consume_front,
        // so its BTreeMap entry is still present; depth() must not
        // report it as a {0,0} slot ahead of the true best level.
        let depth = book.depth(Side::Sell);
        assert_eq!(depth[0].price_1000x, 2300);
        assert_eq!(depth[0].quantity, 50);
        assert_eq!(depth[1].quantity, 0);
    }
}
