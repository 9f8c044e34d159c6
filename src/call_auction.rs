//! Pre-open order accumulation and auction-trade application, with
//! delayed release of residual orders into continuous matching.

use std::collections::{HashMap, VecDeque};

use crate::types::{OrderTick, OrderType, Side, Symbol, TradeTick};

#[derive(Debug, Clone, Copy)]
struct HeldOrder {
    unique_id: i64,
    side: Side,
    price_1000x: i64,
    open_qty: i64,
    exchange_time: i64,
}

impl HeldOrder {
    fn into_tick(self, symbol: Symbol) -> OrderTick {
        OrderTick {
            unique_id: self.unique_id,
            symbol,
            order_type: OrderType::Limit,
            side: self.side,
            price_1000x: self.price_1000x,
            quantity: self.open_qty,
            exchange_time: self.exchange_time,
        }
    }
}

/// Per-symbol pre-open holder: segregated ask/bid id-maps plus an
/// insertion-order queue, per the invariant that every live id sits
/// in exactly one side map and every queued id is either live or
/// already consumed.
pub struct CallAuctionHolder {
    symbol: Symbol,
    ask_orders: HashMap<i64, HeldOrder>,
    bid_orders: HashMap<i64, HeldOrder>,
    order_queue: VecDeque<i64>,
}

impl CallAuctionHolder {
    pub fn new(symbol: Symbol) -> Self {
        CallAuctionHolder {
            symbol,
            ask_orders: HashMap::new(),
            bid_orders: HashMap::new(),
            order_queue: VecDeque::new(),
        }
    }

    /// A cancel removes the target from its side map; everything else
    /// is inserted and queued for later release.
    pub fn push(&mut self, order: OrderTick) {
        if order.order_type == OrderType::Cancel {
            match order.side {
                Side::Buy => {
                    self.bid_orders.remove(&order.unique_id);
                }
                Side::Sell => {
                    self.ask_orders.remove(&order.unique_id);
                }
            }
            return;
        }
        let held = HeldOrder {
            unique_id: order.unique_id,
            side: order.side,
            price_1000x: order.price_1000x,
            open_qty: order.quantity,
            exchange_time: order.exchange_time,
        };
        match order.side {
            Side::Buy => self.bid_orders.insert(order.unique_id, held),
            Side::Sell => self.ask_orders.insert(order.unique_id, held),
        };
        self.order_queue.push_back(order.unique_id);
    }

    /// Applies an auction trade: reduces both matched orders' open
    /// quantity, removing either once it reaches zero.
    pub fn trade(&mut self, trade: &TradeTick) {
        if let Some(ask) = self.ask_orders.get_mut(&trade.ask_unique_id) {
            ask.open_qty -= trade.exec_quantity;
            if ask.open_qty <= 0 {
                self.ask_orders.remove(&trade.ask_unique_id);
            }
        }
        if let Some(bid) = self.bid_orders.get_mut(&trade.bid_unique_id) {
            bid.open_qty -= trade.exec_quantity;
            if bid.open_qty <= 0 {
                self.bid_orders.remove(&trade.bid_unique_id);
            }
        }
    }

    /// Pops the head of the insertion queue; if it is still live in
    /// either side map, removes and returns it as an `OrderTick`
    /// carrying the remaining quantity. Skips ids already consumed by
    /// a trade or cancel. Returns `None` once the queue is exhausted.
    pub fn pop(&mut self) -> Option<OrderTick> {
        while let Some(id) = self.order_queue.pop_front() {
            if let Some(rec) = self.ask_orders.remove(&id) {
                return Some(rec.into_tick(self.symbol));
            }
            if let Some(rec) = self.bid_orders.remove(&id) {
                return Some(rec.into_tick(self.symbol));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(id: i64, side: Side, price: i64, qty: i64) -> OrderTick {
        OrderTick {
            unique_id: id,
            symbol: Symbol::from_str("600875.SH"),
            order_type: OrderType::Limit,
            side,
            price_1000x: price,
            quantity: qty,
            exchange_time: 91500000,
        }
    }

    #[test]
    fn auction_trade_then_drain() {
        let mut holder = CallAuctionHolder::new(Symbol::from_str("600875.SH"));
        holder.push(add(0, Side::Buy, 3322, 40));
        holder.push(add(1, Side::Buy, 2233, 20));
        holder.push(add(2, Side::Sell, 3322, 40));
        holder.push(add(3, Side::Sell, 3333, 80));

        holder.trade(&TradeTick {
            ask_unique_id: 2,
            bid_unique_id: 0,
            symbol: Symbol::from_str("600875.SH"),
            exec_price_1000x: 3322,
            exec_quantity: 40,
            exchange_time: 92500000,
            x_ost_szse_exe_type: crate::types::SzseExeType::Trade,
        });

        // ids 0 and 2 were fully consumed by the auction trade and
        // must not be re-emitted by pop().
        let mut remaining_ids = Vec::new();
        while let Some(t) = holder.pop() {
            remaining_ids.push(t.unique_id);
        }
        assert_eq!(remaining_ids, vec![1, 3]);
    }

    #[test]
    fn cancel_removes_before_drain() {
        let mut holder = CallAuctionHolder::new(Symbol::from_str("600875.SH"));
        holder.push(add(0, Side::Buy, 3322, 40));
        let mut cancel_tick = add(0, Side::Buy, 0, 0);
        cancel_tick.order_type = OrderType::Cancel;
        holder.push(cancel_tick);
        assert!(holder.pop().is_none());
    }
}
