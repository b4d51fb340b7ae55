use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::{mismatch, out_of_range};
use crate::compound_value::{CompoundNumber, CompoundValue};
use crate::error::{CodecError, CodecResult};
use crate::layout::MemberLayout;
use crate::types::Endianness;

// ─── Byte-order helpers ─────────────────────────────────────────────────────
//
// `n` is the element width, 1..=8. Callers range-check values first;
// byteorder panics on values that do not fit.

#[inline]
pub(super) fn write_uint(order: Endianness, buf: &mut [u8], value: u64, n: usize) {
    match order {
        Endianness::Little => LittleEndian::write_uint(buf, value, n),
        Endianness::Big => BigEndian::write_uint(buf, value, n),
    }
}

#[inline]
pub(super) fn read_uint(order: Endianness, buf: &[u8], n: usize) -> u64 {
    match order {
        Endianness::Little => LittleEndian::read_uint(buf, n),
        Endianness::Big => BigEndian::read_uint(buf, n),
    }
}

#[inline]
pub(super) fn read_int(order: Endianness, buf: &[u8], n: usize) -> i64 {
    match order {
        Endianness::Little => LittleEndian::read_int(buf, n),
        Endianness::Big => BigEndian::read_int(buf, n),
    }
}

/// Whether `value` fits a signed integer of `n` bytes.
#[inline]
pub(super) fn fits_signed(value: i64, n: usize) -> bool {
    if n >= 8 {
        return true;
    }
    let bits = n as u32 * 8 - 1;
    value >= -(1i64 << bits) && value < (1i64 << bits)
}

#[inline]
pub(super) fn fits_unsigned(value: u64, n: usize) -> bool {
    n >= 8 || value >> (n as u32 * 8) == 0
}

/// Write a signed value as an `n`-byte two's complement integer.
pub(super) fn write_signed(
    member: &MemberLayout,
    order: Endianness,
    buf: &mut [u8],
    value: i64,
) -> CodecResult<()> {
    let n = buf.len();
    if !fits_signed(value, n) {
        return Err(out_of_range(member, n));
    }
    let mask = if n >= 8 { u64::MAX } else { (1u64 << (n * 8)) - 1 };
    write_uint(order, buf, value as u64 & mask, n);
    Ok(())
}

// ─── Boolean ────────────────────────────────────────────────────────────────

pub(super) fn encode_bool(
    member: &MemberLayout,
    value: &CompoundValue,
    window: &mut [u8],
    order: Endianness,
) -> CodecResult<()> {
    let flag = match value {
        CompoundValue::Bool(b) => *b,
        CompoundValue::Number(n) => n.as_f64() != 0.0,
        other => return Err(mismatch(member, "bool", other)),
    };
    window.fill(0);
    let n = window.len().min(8);
    write_uint(order, &mut window[..n], flag as u64, n);
    Ok(())
}

/// Any non-zero byte reads as `true`.
pub(super) fn decode_bool(window: &[u8]) -> CompoundValue {
    CompoundValue::Bool(window.iter().any(|b| *b != 0))
}

// ─── Integer ────────────────────────────────────────────────────────────────

pub(super) fn encode_integer(
    member: &MemberLayout,
    value: &CompoundValue,
    signed: bool,
    window: &mut [u8],
    order: Endianness,
) -> CodecResult<()> {
    let n = window.len();
    let number = match value {
        CompoundValue::Number(n) => *n,
        CompoundValue::Bool(b) => CompoundNumber::U64(*b as u64),
        // Raw code of an unmapped enum member.
        CompoundValue::Enum(crate::compound_value::EnumValue::Unrecognized(code)) => {
            CompoundNumber::I64(*code)
        }
        other => return Err(mismatch(member, "integer", other)),
    };
    if signed {
        let v = number.as_i64().ok_or_else(|| out_of_range(member, n))?;
        write_signed(member, order, window, v)
    } else {
        let v = number.as_u64().ok_or_else(|| out_of_range(member, n))?;
        if !fits_unsigned(v, n) {
            return Err(out_of_range(member, n));
        }
        write_uint(order, window, v, n);
        Ok(())
    }
}

pub(super) fn decode_integer(window: &[u8], signed: bool, order: Endianness) -> CompoundValue {
    let n = window.len();
    if signed {
        CompoundValue::Number(CompoundNumber::I64(read_int(order, window, n)))
    } else {
        CompoundValue::Number(CompoundNumber::U64(read_uint(order, window, n)))
    }
}

// ─── Float ──────────────────────────────────────────────────────────────────

pub(super) fn encode_float(
    member: &MemberLayout,
    value: &CompoundValue,
    window: &mut [u8],
    order: Endianness,
) -> CodecResult<()> {
    let v = value.as_f64().ok_or_else(|| mismatch(member, "float", value))?;
    match (window.len(), order) {
        (4, Endianness::Little) => LittleEndian::write_f32(window, v as f32),
        (4, Endianness::Big) => BigEndian::write_f32(window, v as f32),
        (_, Endianness::Little) => LittleEndian::write_f64(window, v),
        (_, Endianness::Big) => BigEndian::write_f64(window, v),
    }
    Ok(())
}

pub(super) fn decode_float(window: &[u8], order: Endianness) -> CompoundValue {
    let v = match (window.len(), order) {
        (4, Endianness::Little) => LittleEndian::read_f32(window) as f64,
        (4, Endianness::Big) => BigEndian::read_f32(window) as f64,
        (_, Endianness::Little) => LittleEndian::read_f64(window),
        (_, Endianness::Big) => BigEndian::read_f64(window),
    };
    CompoundValue::Number(CompoundNumber::F64(v))
}

// ─── Opaque ─────────────────────────────────────────────────────────────────

/// Raw bytes must fill the member exactly.
pub(super) fn encode_opaque(
    member: &MemberLayout,
    value: &CompoundValue,
    window: &mut [u8],
) -> CodecResult<()> {
    let bytes = value.as_bytes().ok_or_else(|| mismatch(member, "bytes", value))?;
    if bytes.len() != window.len() {
        return Err(CodecError::ShapeMismatch {
            member: member.name.clone(),
            expected: vec![window.len()],
            actual: vec![bytes.len()],
        });
    }
    window.copy_from_slice(bytes);
    Ok(())
}
