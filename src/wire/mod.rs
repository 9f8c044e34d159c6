//! Wire Decoder: turns one raw UDP payload into a canonical
//! [`OrderTick`](crate::types::OrderTick) or
//! [`TradeTick`](crate::types::TradeTick).
//!
//! The payload length uniquely determines the record type. Each fixed
//! layout is decoded with [`zerocopy`] so the copy out of the byte
//! slice never assumes the slice is aligned.

mod sse;
mod szse;

use crate::error::DecodeError;
use crate::types::{L2Tick, OrderTick, TradeTick};

pub use sse::{SSE_L2_SNAP_LEN, SSE_TICK_LEN};
pub use szse::{SZSE_L2_SNAP_LEN, SZSE_ORDER_TICK_LEN, SZSE_TRADE_TICK_LEN};

/// One decoded wire record, already normalised to the canonical price
/// scale (thousandths), quantity scale (whole shares) and `HHMMSSmmm`
/// time representation.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedTick {
    Order(OrderTick),
    Trade(TradeTick),
    /// Only consumed by the MD Validator, never forwarded to the
    /// matching core.
    L2Snapshot(L2Tick),
}

/// Decodes exactly one UDP payload, dispatching on its length.
///
/// Returns [`DecodeError::UnknownLength`] when `payload.len()` matches
/// none of the five known fixed record sizes.
pub fn decode(payload: &[u8]) -> Result<DecodedTick, DecodeError> {
    match payload.len() {
        SSE_TICK_LEN => sse::decode_tick(payload),
        SSE_L2_SNAP_LEN => sse::decode_l2_snapshot(payload),
        SZSE_ORDER_TICK_LEN => szse::decode_order_tick(payload),
        SZSE_TRADE_TICK_LEN => szse::decode_trade_tick(payload),
        SZSE_L2_SNAP_LEN => szse::decode_l2_snapshot(payload),
        len => Err(DecodeError::UnknownLength { len }),
    }
}
