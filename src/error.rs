//! Error taxonomy for wire decoding and booker-shard processing.
//!
//! `DecodeError` crosses the Wire Decoder / Channel Dispatcher
//! boundary; `BookerError` is absorbed entirely inside a shard (see
//! the propagation policy in the error handling design section).

use crate::types::{RejectReason, Symbol};
use thiserror::Error;

/// Failure to turn a raw UDP payload into a canonical tick.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload length matched none of the known fixed record sizes.
    #[error("unknown payload length {len} bytes, no matching record layout")]
    UnknownLength { len: usize },

    /// Payload matched a known length but a field failed to parse
    /// (e.g. a non-UTF8 symbol or an unrecognised type byte).
    #[error("malformed field `{field}` while decoding a {record} record")]
    MalformedField {
        record: &'static str,
        field: &'static str,
    },
}

/// Errors recoverable inside a `BookerShard`; never propagated past
/// the shard boundary. `add`/`trade` log and absorb every variant.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BookerError {
    #[error("duplicate order {unique_id} on {symbol}, dropping")]
    DuplicateOrder { unique_id: i64, symbol: Symbol },

    #[error("cancel target {unique_id} on {symbol} not found")]
    UnknownCancelTarget { unique_id: i64, symbol: Symbol },

    #[error("order {unique_id} on {symbol} rejected: {reason:?}")]
    Rejected {
        unique_id: i64,
        symbol: Symbol,
        reason: RejectReason,
    },

    #[error("MD validator mismatch on {symbol}")]
    ValidationMismatch { symbol: Symbol },
}
