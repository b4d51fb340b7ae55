use smol_str::SmolStr;

use super::mismatch;
use crate::compound_value::CompoundValue;
use crate::error::{CodecError, CodecResult};
use crate::layout::MemberLayout;
use crate::types::CharacterEncoding;

/// Encoded bytes of a string value, checked against the member encoding.
pub(super) fn string_bytes<'v>(
    member: &MemberLayout,
    value: &'v CompoundValue,
    encoding: CharacterEncoding,
) -> CodecResult<&'v [u8]> {
    let s = match value {
        CompoundValue::Str(s) => s.as_str(),
        CompoundValue::Enum(e) => e.name().ok_or_else(|| mismatch(member, "string", value))?,
        other => return Err(mismatch(member, "string", other)),
    };
    if encoding == CharacterEncoding::Ascii && !s.is_ascii() {
        return Err(CodecError::TypeMismatch {
            member: member.name.clone(),
            expected: "ascii string",
            actual: "utf-8 string",
        });
    }
    Ok(s.as_bytes())
}

/// Bytes, one NUL, zero padding. The terminator must fit.
pub(super) fn encode_fixed(
    member: &MemberLayout,
    value: &CompoundValue,
    encoding: CharacterEncoding,
    window: &mut [u8],
) -> CodecResult<()> {
    let bytes = string_bytes(member, value, encoding)?;
    let needed = bytes.len() + 1;
    if needed > window.len() {
        return Err(CodecError::StringTooLong {
            member: member.name.clone(),
            needed,
            width: window.len(),
        });
    }
    window[..bytes.len()].copy_from_slice(bytes);
    window[bytes.len()..].fill(0);
    Ok(())
}

/// Up to the first NUL, or the whole window when there is none.
pub(super) fn decode_fixed(window: &[u8]) -> CompoundValue {
    let end = window.iter().position(|b| *b == 0).unwrap_or(window.len());
    CompoundValue::Str(decode_text(&window[..end]))
}

pub(super) fn decode_text(bytes: &[u8]) -> SmolStr {
    match std::str::from_utf8(bytes) {
        Ok(s) => SmolStr::new(s),
        Err(_) => SmolStr::new(String::from_utf8_lossy(bytes)),
    }
}
