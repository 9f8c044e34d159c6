//! SSE (Shanghai) tick and L2 snapshot wire layouts.
//!
//! Raw multi-byte fields are declared as `[u8; N]` rather than native
//! integers so the `#[repr(C, packed)]` structs below have alignment
//! 1 regardless of platform and can be laid directly over an
//! unaligned byte slice; accessors convert with `from_le_bytes`.

use crate::error::DecodeError;
use crate::types::{
    EXCHANGE_DEPTH, L2Tick, LevelSlot, OrderType, OrderTick, Side, SzseExeType, Symbol, TradeTick,
};
use crate::wire::DecodedTick;

#[cfg(feature = "wire")]
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// `A` add (limit), `D` cancel, `T` fill (upgraded to a `TradeTick`).
const SSE_TYPE_ADD: u8 = b'A';
const SSE_TYPE_CANCEL: u8 = b'D';
const SSE_TYPE_FILL: u8 = b'T';

#[cfg_attr(feature = "wire", derive(FromBytes, Immutable, KnownLayout))]
#[repr(C, packed)]
struct RawSseTick {
    channel_no: [u8; 2],
    apply_seq_num: [u8; 8],
    symbol: [u8; 9],
    side: u8,
    order_type: u8,
    _pad: [u8; 2],
    order_price: [u8; 8],
    order_qty: [u8; 8],
    trade_price: [u8; 8],
    trade_qty: [u8; 8],
    ask_order_id: [u8; 8],
    bid_order_id: [u8; 8],
    transact_time: [u8; 8],
    biz_index: [u8; 8],
}

pub const SSE_TICK_LEN: usize = std::mem::size_of::<RawSseTick>();

impl RawSseTick {
    fn read(bytes: &[u8]) -> &RawSseTick {
        // SAFETY-free path: every field is a byte array, so the cast
        // is valid for any alignment and any bit pattern.
        unsafe { &*(bytes.as_ptr() as *const RawSseTick) }
    }
}

fn i64le(b: [u8; 8]) -> i64 {
    i64::from_le_bytes(b)
}

/// SSE raw price is already scaled by 1000; no conversion needed.
fn normalize_price(raw: i64) -> i64 {
    raw
}

/// SSE raw quantity is in thousandths-of-share.
fn normalize_quantity(raw: i64) -> i64 {
    raw / 1000
}

/// SSE raw time is `HHMMSSmmm * 10`; divide back down.
fn normalize_time(raw: i64) -> i64 {
    raw / 10
}

pub fn decode_tick(payload: &[u8]) -> Result<DecodedTick, DecodeError> {
    let raw = RawSseTick::read(payload);
    let symbol = Symbol::from_bytes(&raw.symbol);
    let exchange_time = normalize_time(i64le(raw.transact_time));

    match raw.order_type {
        SSE_TYPE_ADD | SSE_TYPE_CANCEL => {
            let side = match raw.side {
                b'1' => Side::Buy,
                b'2' => Side::Sell,
                _ => {
                    return Err(DecodeError::MalformedField {
                        record: "sse_tick",
                        field: "side",
                    });
                }
            };
            Ok(DecodedTick::Order(OrderTick {
                unique_id: i64le(raw.apply_seq_num),
                symbol,
                order_type: if raw.order_type == SSE_TYPE_ADD {
                    OrderType::Limit
                } else {
                    OrderType::Cancel
                },
                side,
                price_1000x: normalize_price(i64le(raw.order_price)),
                quantity: normalize_quantity(i64le(raw.order_qty)),
                exchange_time,
            }))
        }
        SSE_TYPE_FILL => {
            // Per the forwarding rule: the higher of (ask_id, bid_id)
            // becomes the ask id, the other the bid id.
            let a = i64le(raw.ask_order_id);
            let b = i64le(raw.bid_order_id);
            let (ask_id, bid_id) = if a >= b { (a, b) } else { (b, a) };
            Ok(DecodedTick::Trade(TradeTick {
                ask_unique_id: ask_id,
                bid_unique_id: bid_id,
                symbol,
                exec_price_1000x: normalize_price(i64le(raw.trade_price)),
                exec_quantity: normalize_quantity(i64le(raw.trade_qty)),
                exchange_time,
                x_ost_szse_exe_type: SzseExeType::Trade,
            }))
        }
        _ => Err(DecodeError::MalformedField {
            record: "sse_tick",
            field: "order_type",
        }),
    }
}

/// Per-level price, quantity and resting-order count, matching the
/// exchange's own full-depth snapshot layout (order count per level
/// is published alongside price/qty; it has no home in the canonical
/// [`LevelSlot`] so `levels()` decodes and discards it).
#[cfg_attr(feature = "wire", derive(FromBytes, Immutable, KnownLayout))]
#[repr(C, packed)]
struct RawSseLevel {
    price: [u8; 8],
    qty: [u8; 8],
    num_orders: [u8; 8],
}

#[cfg_attr(feature = "wire", derive(FromBytes, Immutable, KnownLayout))]
#[repr(C, packed)]
struct RawSseL2Snap {
    symbol: [u8; 9],
    _pad: [u8; 3],
    data_time: [u8; 8],
    pre_close: [u8; 8],
    open: [u8; 8],
    high: [u8; 8],
    low: [u8; 8],
    last: [u8; 8],
    total_volume: [u8; 8],
    total_turnover: [u8; 8],
    num_trades: [u8; 8],
    total_bid_qty: [u8; 8],
    weighted_avg_bid_price: [u8; 8],
    total_ask_qty: [u8; 8],
    weighted_avg_ask_price: [u8; 8],
    iopv: [u8; 8],
    trading_phase_code: [u8; 8],
    asks: [RawSseLevel; 10],
    bids: [RawSseLevel; 10],
}

pub const SSE_L2_SNAP_LEN: usize = std::mem::size_of::<RawSseL2Snap>();

fn levels(raw: &[RawSseLevel; EXCHANGE_DEPTH]) -> [LevelSlot; EXCHANGE_DEPTH] {
    let mut out = [LevelSlot::default(); EXCHANGE_DEPTH];
    for (slot, level) in out.iter_mut().zip(raw.iter()) {
        slot.price_1000x = normalize_price(i64le(level.price));
        slot.quantity = normalize_quantity(i64le(level.qty));
    }
    out
}

pub fn decode_l2_snapshot(payload: &[u8]) -> Result<DecodedTick, DecodeError> {
    let raw = unsafe { &*(payload.as_ptr() as *const RawSseL2Snap) };
    Ok(DecodedTick::L2Snapshot(L2Tick {
        symbol: Symbol::from_bytes(&raw.symbol),
        exchange_time: normalize_time(i64le(raw.data_time)),
        ask_levels: levels(&raw.asks),
        bid_levels: levels(&raw.bids),
    }))
}
