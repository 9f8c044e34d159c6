//! Hash-based cross-validation of generated ticks against the
//! exchange's own published L2 stream. Per symbol, not shared across
//! shards.

use sha2::{Digest, Sha256};
use std::collections::VecDeque;

use crate::types::{GeneratedL2Tick, L2Tick, LevelSlot, TradeTick};

const LOOKBACK_CAPACITY: usize = 1024;

fn hash_bytes(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    u64::from_le_bytes(digest[..8].try_into().unwrap())
}

fn hash_trade(price_1000x: i64, quantity: i64) -> u64 {
    let mut buf = [0u8; 16];
    buf[..8].copy_from_slice(&price_1000x.to_le_bytes());
    buf[8..].copy_from_slice(&quantity.to_le_bytes());
    hash_bytes(&buf)
}

fn hash_levels(ask_levels: &[LevelSlot], bid_levels: &[LevelSlot]) -> u64 {
    let mut buf = Vec::with_capacity((ask_levels.len() + bid_levels.len()) * 16);
    for slot in ask_levels.iter().chain(bid_levels.iter()) {
        buf.extend_from_slice(&slot.price_1000x.to_le_bytes());
        buf.extend_from_slice(&slot.quantity.to_le_bytes());
    }
    hash_bytes(&buf)
}

struct RingBuffer {
    hashes: VecDeque<u64>,
}

impl RingBuffer {
    fn new() -> Self {
        RingBuffer {
            hashes: VecDeque::with_capacity(LOOKBACK_CAPACITY),
        }
    }

    fn push(&mut self, hash: u64) {
        if self.hashes.len() == LOOKBACK_CAPACITY {
            self.hashes.pop_front();
        }
        self.hashes.push_back(hash);
    }

    fn contains(&self, hash: u64) -> bool {
        self.hashes.contains(&hash)
    }
}

/// Per-symbol MD Validator state: two 1024-entry circular hash
/// buffers plus a one-shot failure flag.
pub struct MdValidator {
    trade_hash_buffer: RingBuffer,
    l2_hash_buffer: RingBuffer,
    failed: bool,
}

impl Default for MdValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl MdValidator {
    pub fn new() -> Self {
        MdValidator {
            trade_hash_buffer: RingBuffer::new(),
            l2_hash_buffer: RingBuffer::new(),
            failed: false,
        }
    }

    /// Records the hashes of a newly generated tick.
    pub fn observe_generated(&mut self, tick: &GeneratedL2Tick) {
        self.trade_hash_buffer.push(hash_trade(tick.price_1000x, tick.quantity));
        self.l2_hash_buffer
            .push(hash_levels(&tick.ask_levels, &tick.bid_levels));
    }

    /// Checks an incoming exchange trade tick against the lookback
    /// buffer. Sets the one-shot failure flag and logs once on the
    /// first mismatch for this symbol.
    pub fn validate_trade(&mut self, trade: &TradeTick) -> bool {
        let ok = self
            .trade_hash_buffer
            .contains(hash_trade(trade.exec_price_1000x, trade.exec_quantity));
        if !ok {
            self.flag_mismatch(trade.symbol.as_str_trimmed());
        }
        ok
    }

    /// Checks an incoming exchange L2 snapshot against the lookback
    /// buffer, hashing the first five levels per side to align with
    /// the depth generated ticks carry.
    pub fn validate_l2(&mut self, l2: &L2Tick) -> bool {
        let ok = self
            .l2_hash_buffer
            .contains(hash_levels(&l2.ask_levels[..5], &l2.bid_levels[..5]));
        if !ok {
            self.flag_mismatch(l2.symbol.as_str_trimmed());
        }
        ok
    }

    fn flag_mismatch(&mut self, symbol: &str) {
        if !self.failed {
            tracing::warn!(symbol, "MD validator hash mismatch, flagging symbol");
        }
        self.failed = true;
    }

    /// Whether this symbol has ever failed validation; taints
    /// `GeneratedL2Tick::result` once set.
    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SzseExeType, Symbol};

    fn generated(price: i64, qty: i64) -> GeneratedL2Tick {
        GeneratedL2Tick {
            symbol: Symbol::from_str("600875.SH"),
            price_1000x: price,
            quantity: qty,
            ask_unique_id: 1,
            bid_unique_id: 0,
            exchange_time: 93000000,
            ask_levels: Default::default(),
            bid_levels: Default::default(),
            result: true,
        }
    }

    #[test]
    fn matching_trade_validates() {
        let mut v = MdValidator::new();
        v.observe_generated(&generated(2233, 100));
        let trade = TradeTick {
            ask_unique_id: 1,
            bid_unique_id: 0,
            symbol: Symbol::from_str("600875.SH"),
            exec_price_1000x: 2233,
            exec_quantity: 100,
            exchange_time: 93000000,
            x_ost_szse_exe_type: SzseExeType::Trade,
        };
        assert!(v.validate_trade(&trade));
        assert!(!v.is_failed());
    }

    #[test]
    fn mismatched_trade_flags_symbol() {
        let mut v = MdValidator::new();
        v.observe_generated(&generated(2233, 100));
        let trade = TradeTick {
            ask_unique_id: 1,
            bid_unique_id: 0,
            symbol: Symbol::from_str("600875.SH"),
            exec_price_1000x: 2233,
            exec_quantity: 99,
            exchange_time: 93000000,
            x_ost_szse_exe_type: SzseExeType::Trade,
        };
        assert!(!v.validate_trade(&trade));
        assert!(v.is_failed());
    }
}
