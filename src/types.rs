//! Canonical record types shared by the wire decoder, the booker shard,
//! and the reporter sink interface.
//!
//! Prices are carried as integers scaled by 1000 (`price_1000x`).
//! Exchange times are packed `HHMMSSmmm` integers, e.g. `93000000` is
//! 09:30:00.000.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A symbol as a fixed-size byte array, avoiding per-event heap
/// allocation on the hot path (see design note on string keys).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(pub [u8; 9]);

impl Symbol {
    /// Builds a `Symbol` from a byte slice, right-padding with spaces
    /// and truncating at 9 bytes.
    pub fn from_bytes(raw: &[u8]) -> Self {
        let mut buf = [b' '; 9];
        let n = raw.len().min(9);
        buf[..n].copy_from_slice(&raw[..n]);
        Symbol(buf)
    }

    pub fn from_str(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    pub fn as_str_trimmed(&self) -> &str {
        let end = self.0.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        std::str::from_utf8(&self.0[..end]).unwrap_or("")
    }

    /// Interprets the symbol as a decimal integer for shard hashing
    /// (`shard = symbol_as_integer mod N`). Falls back to a byte-sum
    /// hash when the symbol contains non-digit characters.
    pub fn as_shard_key(&self) -> u64 {
        let s = self.as_str_trimmed();
        match s.parse::<u64>() {
            Ok(n) => n,
            Err(_) => self.0.iter().fold(0u64, |acc, &b| acc.wrapping_mul(31).wrapping_add(b as u64)),
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str_trimmed())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str_trimmed())
    }
}

/// Buy or sell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// The canonical order-event kind after wire normalisation. `Fill`
/// only ever appears transiently inside the SSE decoder, which
/// upgrades it into a `TradeTick` before it reaches the booker shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
    BestPrice,
    Cancel,
    Fill,
}

/// One submitted or cancelled order, post wire-normalisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTick {
    pub unique_id: i64,
    pub symbol: Symbol,
    pub order_type: OrderType,
    pub side: Side,
    pub price_1000x: i64,
    pub quantity: i64,
    pub exchange_time: i64,
}

/// Whether an SZSE trade tick is a genuine execution or a
/// cancel-as-trade record (`exe_type == '4'`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SzseExeType {
    Trade,
    Cancel,
}

/// An exchange-published execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeTick {
    pub ask_unique_id: i64,
    pub bid_unique_id: i64,
    pub symbol: Symbol,
    pub exec_price_1000x: i64,
    pub exec_quantity: i64,
    pub exchange_time: i64,
    pub x_ost_szse_exe_type: SzseExeType,
}

/// One `{price, quantity}` slot within a depth snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSlot {
    pub price_1000x: i64,
    pub quantity: i64,
}

/// Depth to which `GeneratedL2Tick` snapshots the book.
pub const GENERATED_DEPTH: usize = 5;

/// One reconstructed post-trade snapshot, emitted after every trade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedL2Tick {
    pub symbol: Symbol,
    pub price_1000x: i64,
    pub quantity: i64,
    pub ask_unique_id: i64,
    pub bid_unique_id: i64,
    pub exchange_time: i64,
    pub ask_levels: [LevelSlot; GENERATED_DEPTH],
    pub bid_levels: [LevelSlot; GENERATED_DEPTH],
    /// `false` once the MD Validator has flagged this symbol.
    pub result: bool,
}

/// Depth to which the exchange's own published L2 snapshot is carried,
/// used only for validation against `GeneratedL2Tick`.
pub const EXCHANGE_DEPTH: usize = 10;

/// An exchange-published L2 snapshot, used only for validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct L2Tick {
    pub symbol: Symbol,
    pub exchange_time: i64,
    pub ask_levels: [LevelSlot; EXCHANGE_DEPTH],
    pub bid_levels: [LevelSlot; EXCHANGE_DEPTH],
}

/// A rolling 3-second window of order-flow analytics for one symbol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RangedTick {
    pub symbol_shard_key: u64,
    pub window_start: i64,

    pub active_buy_number: i64,
    pub active_sell_number: i64,
    pub active_traded_buy_number: i64,
    pub active_traded_sell_number: i64,

    pub traded_buy_quantity: i64,
    pub traded_sell_quantity: i64,
    pub traded_buy_notional: i64,
    pub traded_sell_notional: i64,

    pub aggressive_buy_number: i64,
    pub aggressive_sell_number: i64,

    pub new_added_buy_1_quantity: i64,
    pub new_added_sell_1_quantity: i64,
    pub new_canceled_buy_1_quantity: i64,
    pub new_canceled_sell_1_quantity: i64,

    pub big_order_buy_notional: i64,
    pub big_order_sell_notional: i64,

    pub running_high_price_1000x: i64,
    pub running_low_price_1000x: i64,

    /// Weighted price distance at each of the 5 levels, ask side then
    /// bid side (see §4.6); `1 - tanh(...)` of the relative move from
    /// the previous window's best price.
    pub ask_weighted_distance: [f64; GENERATED_DEPTH],
    pub bid_weighted_distance: [f64; GENERATED_DEPTH],

    /// Milliseconds from window start until best ask/bid first moved;
    /// `3010` (the sentinel) if it never moved within the window.
    pub ask_validity_duration_ms: i64,
    pub bid_validity_duration_ms: i64,
}

/// Sentinel `validity_duration` for a best price that never moved
/// within its window (see §9's note on the source's quirky baseline).
pub const VALIDITY_DURATION_SENTINEL_MS: i64 = 3010;

/// Window width of the ranged accumulator, in seconds.
pub const RANGE_WINDOW_SECONDS: i64 = 3;

/// Notional (scaled) threshold above which a fill counts as a
/// big order on the aggressor's side.
pub const BIG_ORDER_NOTIONAL_THRESHOLD: i64 = 50_000_000;

/// Reason an order was rejected by the matching core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    ZeroQuantity,
    UnknownCancelTarget,
    UnknownReplaceTarget,
    BareMarketOrder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRejection {
    pub unique_id: i64,
    pub symbol: Symbol,
    pub reason: RejectReason,
}
