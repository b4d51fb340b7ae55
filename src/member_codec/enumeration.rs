use tracing::warn;

use super::mismatch;
use super::out_of_range;
use super::scalar::{fits_unsigned, read_int, read_uint, write_signed, write_uint};
use crate::compound_value::{CompoundValue, EnumValue};
use crate::enum_type::EnumType;
use crate::error::{CodecError, CodecResult};
use crate::layout::MemberLayout;
use crate::types::Endianness;

// ─── Enum ───────────────────────────────────────────────────────────────────

pub(super) fn encode_enum(
    member: &MemberLayout,
    ty: &EnumType,
    value: &CompoundValue,
    window: &mut [u8],
    order: Endianness,
) -> CodecResult<()> {
    let code = ty.encode(value).ok_or_else(|| match value {
        CompoundValue::Enum(_) | CompoundValue::Str(_) | CompoundValue::Number(_) => {
            CodecError::UnknownEnumValue {
                member: member.name.clone(),
                enum_type: ty.name().into(),
                value: describe(value),
            }
        }
        other => mismatch(member, "enum", other),
    })?;
    if ty.is_signed() {
        write_signed(member, order, window, code)
    } else {
        let n = window.len();
        if code < 0 || !fits_unsigned(code as u64, n) {
            return Err(out_of_range(member, n));
        }
        write_uint(order, window, code as u64, n);
        Ok(())
    }
}

/// Codes missing from the reader's table come back as
/// [`EnumValue::Unrecognized`].
pub(super) fn decode_enum(
    member: &MemberLayout,
    ty: &EnumType,
    window: &[u8],
    order: Endianness,
) -> CompoundValue {
    let n = window.len();
    let code = if ty.is_signed() {
        read_int(order, window, n)
    } else {
        read_uint(order, window, n) as i64
    };
    let value = ty.decode(code);
    if !value.is_recognized() {
        warn!(
            member = %member.name,
            enum_type = ty.name(),
            code,
            "enum code has no entry in the ordinal table"
        );
    }
    CompoundValue::Enum(value)
}

fn describe(value: &CompoundValue) -> String {
    match value {
        CompoundValue::Enum(EnumValue::Known { name, .. }) | CompoundValue::Str(name) => name.to_string(),
        CompoundValue::Enum(EnumValue::Unrecognized(code)) => code.to_string(),
        CompoundValue::Number(n) => format!("ordinal {}", n.as_f64()),
        other => other.kind_name().to_string(),
    }
}

// ─── Bit field ──────────────────────────────────────────────────────────────
//
// Words are least significant first; storage byte order applies to the
// field as a whole.

pub(super) fn encode_bitfield(
    member: &MemberLayout,
    value: &CompoundValue,
    window: &mut [u8],
    order: Endianness,
) -> CodecResult<()> {
    let words: Vec<u64> = match value {
        CompoundValue::BitField(words) => words.clone(),
        CompoundValue::Number(n) => vec![n.as_u64().ok_or_else(|| out_of_range(member, window.len()))?],
        other => return Err(mismatch(member, "bitfield", other)),
    };
    let n = window.len();
    let fits = words.iter().enumerate().all(|(i, w)| {
        let low = i * 8;
        if low >= n {
            *w == 0
        } else {
            fits_unsigned(*w, n - low)
        }
    });
    if !fits {
        return Err(out_of_range(member, n));
    }
    window.fill(0);
    for (i, byte) in window.iter_mut().enumerate() {
        if let Some(word) = words.get(i / 8) {
            *byte = (word >> ((i % 8) * 8)) as u8;
        }
    }
    if order == Endianness::Big {
        window.reverse();
    }
    Ok(())
}

pub(super) fn decode_bitfield(window: &[u8], order: Endianness) -> CompoundValue {
    let mut bytes = window.to_vec();
    if order == Endianness::Big {
        bytes.reverse();
    }
    let words = bytes
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, b)| acc | (u64::from(*b) << (i * 8)))
        })
        .collect();
    CompoundValue::BitField(words)
}
