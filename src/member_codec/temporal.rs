use chrono::DateTime;
use tracing::debug;

use super::scalar::{read_int, write_signed};
use super::{mismatch, out_of_range};
use crate::compound_value::{CompoundNumber, CompoundValue, TimeDuration};
use crate::error::CodecResult;
use crate::layout::MemberLayout;
use crate::types::{Endianness, TimeUnit};

// Timestamps count `unit`s since 1970-01-01T00:00:00Z. Plain numbers are
// taken as an already scaled count.

pub(super) fn encode_timestamp(
    member: &MemberLayout,
    value: &CompoundValue,
    unit: TimeUnit,
    window: &mut [u8],
    order: Endianness,
) -> CodecResult<()> {
    let count = match value {
        CompoundValue::Timestamp(t) => unit
            .convert(t.timestamp_micros(), TimeUnit::Microseconds)
            .ok_or_else(|| out_of_range(member, window.len()))?,
        CompoundValue::Number(n) => n.as_i64().ok_or_else(|| out_of_range(member, window.len()))?,
        other => return Err(mismatch(member, "timestamp", other)),
    };
    write_signed(member, order, window, count)
}

/// Counts outside the range of a point in time come back as the raw number,
/// which encodes back unchanged.
pub(super) fn decode_timestamp(
    member: &MemberLayout,
    window: &[u8],
    unit: TimeUnit,
    order: Endianness,
) -> CompoundValue {
    let count = read_int(order, window, window.len());
    match TimeUnit::Microseconds
        .convert(count, unit)
        .and_then(DateTime::from_timestamp_micros)
    {
        Some(t) => CompoundValue::Timestamp(t),
        None => {
            debug!(member = %member.name, count, %unit, "timestamp outside the representable range");
            CompoundValue::Number(CompoundNumber::I64(count))
        }
    }
}

pub(super) fn encode_duration(
    member: &MemberLayout,
    value: &CompoundValue,
    unit: TimeUnit,
    window: &mut [u8],
    order: Endianness,
) -> CodecResult<()> {
    let count = match value {
        CompoundValue::Duration(d) => {
            d.convert_to(unit)
                .ok_or_else(|| out_of_range(member, window.len()))?
                .value
        }
        CompoundValue::Number(n) => n.as_i64().ok_or_else(|| out_of_range(member, window.len()))?,
        other => return Err(mismatch(member, "duration", other)),
    };
    write_signed(member, order, window, count)
}

pub(super) fn decode_duration(window: &[u8], unit: TimeUnit, order: Endianness) -> CompoundValue {
    let count = read_int(order, window, window.len());
    CompoundValue::Duration(TimeDuration::new(count, unit))
}
