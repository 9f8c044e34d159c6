//! SZSE (Shenzhen) order/trade tick and L2 snapshot wire layouts.
//!
//! SZSE dialects share a common header (sequence, tick1/tick2,
//! message_type, security_type, sub_security_type, symbol,
//! exchange_id, quote_update_time, channel_num, sequence_num,
//! md_stream_id) ahead of the record-specific fields.

use crate::error::DecodeError;
use crate::types::{
    EXCHANGE_DEPTH, L2Tick, LevelSlot, OrderType, OrderTick, Side, SzseExeType, Symbol, TradeTick,
};
use crate::wire::DecodedTick;

#[cfg(feature = "wire")]
use zerocopy::{FromBytes, Immutable, KnownLayout};

const SZSE_TYPE_LIMIT: u8 = b'2';
const SZSE_TYPE_MARKET: u8 = b'1';
const SZSE_TYPE_BEST_PRICE: u8 = b'U';
const SZSE_TYPE_CANCEL: u8 = b'4';
const SZSE_TYPE_FILL: u8 = b'F';
const SZSE_EXE_TYPE_CANCEL: u8 = b'4';

#[cfg_attr(feature = "wire", derive(FromBytes, Immutable, KnownLayout))]
#[repr(C, packed)]
struct SzseHeader {
    sequence: [u8; 8],
    tick1: u8,
    tick2: u8,
    message_type: u8,
    security_type: u8,
    sub_security_type: u8,
    symbol: [u8; 9],
    exchange_id: u8,
    _pad0: u8,
    quote_update_time: [u8; 8],
    channel_num: [u8; 4],
    sequence_num: [u8; 8],
    md_stream_id: [u8; 4],
}

fn i64le(b: [u8; 8]) -> i64 {
    i64::from_le_bytes(b)
}

/// SZSE raw price is scaled by 10000; divide by 10 to reach the
/// canonical thousandths scale.
fn normalize_price(raw: i64) -> i64 {
    raw / 10
}

/// SZSE raw quantity is in tenths of a share.
fn normalize_quantity(raw: i64) -> i64 {
    raw / 100
}

/// SZSE raw time is the low 9 decimal digits of a
/// `yyyyMMddHHMMSSmmm` field, which is already `HHMMSSmmm`.
fn normalize_time(raw: i64) -> i64 {
    raw % 1_000_000_000
}

#[cfg_attr(feature = "wire", derive(FromBytes, Immutable, KnownLayout))]
#[repr(C, packed)]
struct RawSzseOrderTick {
    header: SzseHeader,
    order_price: [u8; 8],
    order_qty: [u8; 8],
    side: u8,
    order_type: u8,
    _pad: [u8; 2],
}

pub const SZSE_ORDER_TICK_LEN: usize = std::mem::size_of::<RawSzseOrderTick>();

pub fn decode_order_tick(payload: &[u8]) -> Result<DecodedTick, DecodeError> {
    let raw = unsafe { &*(payload.as_ptr() as *const RawSzseOrderTick) };
    let symbol = Symbol::from_bytes(&raw.header.symbol);
    let exchange_time = normalize_time(i64le(raw.header.quote_update_time));

    let order_type = match raw.order_type {
        SZSE_TYPE_LIMIT => OrderType::Limit,
        SZSE_TYPE_MARKET => OrderType::Market,
        SZSE_TYPE_BEST_PRICE => OrderType::BestPrice,
        SZSE_TYPE_CANCEL => OrderType::Cancel,
        SZSE_TYPE_FILL => OrderType::Fill,
        _ => {
            return Err(DecodeError::MalformedField {
                record: "szse_order_tick",
                field: "order_type",
            });
        }
    };
    let side = match raw.side {
        b'1' => Side::Buy,
        b'2' => Side::Sell,
        _ => {
            return Err(DecodeError::MalformedField {
                record: "szse_order_tick",
                field: "side",
            });
        }
    };

    Ok(DecodedTick::Order(OrderTick {
        unique_id: i64le(raw.header.sequence_num),
        symbol,
        order_type,
        side,
        price_1000x: normalize_price(i64le(raw.order_price)),
        quantity: normalize_quantity(i64le(raw.order_qty)),
        exchange_time,
    }))
}

#[cfg_attr(feature = "wire", derive(FromBytes, Immutable, KnownLayout))]
#[repr(C, packed)]
struct RawSzseTradeTick {
    header: SzseHeader,
    ask_order_id: [u8; 8],
    bid_order_id: [u8; 8],
    trade_price: [u8; 8],
    trade_qty: [u8; 8],
    exe_type: u8,
    _pad: [u8; 7],
}

pub const SZSE_TRADE_TICK_LEN: usize = std::mem::size_of::<RawSzseTradeTick>();

pub fn decode_trade_tick(payload: &[u8]) -> Result<DecodedTick, DecodeError> {
    let raw = unsafe { &*(payload.as_ptr() as *const RawSzseTradeTick) };
    let symbol = Symbol::from_bytes(&raw.header.symbol);
    let exchange_time = normalize_time(i64le(raw.header.quote_update_time));
    let ask_id = i64le(raw.ask_order_id);
    let bid_id = i64le(raw.bid_order_id);

    if raw.exe_type == SZSE_EXE_TYPE_CANCEL {
        // Cancel-as-trade: rewritten back into OrderTick form. Side is
        // buy if bid_id > ask_id else sell; unique_id is the larger of
        // the two (conjectured from source, see design notes).
        let unique_id = ask_id.max(bid_id);
        let side = if bid_id > ask_id { Side::Buy } else { Side::Sell };
        return Ok(DecodedTick::Order(OrderTick {
            unique_id,
            symbol,
            order_type: OrderType::Cancel,
            side,
            price_1000x: 0,
            quantity: 0,
            exchange_time,
        }));
    }

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

/// Per-level price, quantity and resting-order count; `num_orders` has
/// no home in the canonical [`LevelSlot`] so `levels()` decodes and
/// discards it, same as the SSE side.
#[cfg_attr(feature = "wire", derive(FromBytes, Immutable, KnownLayout))]
#[repr(C, packed)]
struct RawSzseLevel {
    price: [u8; 8],
    qty: [u8; 8],
    num_orders: [u8; 8],
}

#[cfg_attr(feature = "wire", derive(FromBytes, Immutable, KnownLayout))]
#[repr(C, packed)]
struct RawSzseL2Snap {
    header: SzseHeader,
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
    asks: [RawSzseLevel; 10],
    bids: [RawSzseLevel; 10],
}

pub const SZSE_L2_SNAP_LEN: usize = std::mem::size_of::<RawSzseL2Snap>();

fn levels(raw: &[RawSzseLevel; EXCHANGE_DEPTH]) -> [LevelSlot; EXCHANGE_DEPTH] {
    let mut out = [LevelSlot::default(); EXCHANGE_DEPTH];
    for (slot, level) in out.iter_mut().zip(raw.iter()) {
        slot.price_1000x = normalize_price(i64le(level.price));
        slot.quantity = normalize_quantity(i64le(level.qty));
    }
    out
}

pub fn decode_l2_snapshot(payload: &[u8]) -> Result<DecodedTick, DecodeError> {
    let raw = unsafe { &*(payload.as_ptr() as *const RawSzseL2Snap) };
    Ok(DecodedTick::L2Snapshot(L2Tick {
        symbol: Symbol::from_bytes(&raw.header.symbol),
        exchange_time: normalize_time(i64le(raw.header.quote_update_time)),
        ask_levels: levels(&raw.asks),
        bid_levels: levels(&raw.bids),
    }))
}
