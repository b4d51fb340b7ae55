use super::mismatch;
use super::string::{decode_text, string_bytes};
use super::CodecContext;
use crate::compound_value::CompoundValue;
use crate::error::CodecResult;
use crate::layout::MemberLayout;
use crate::store::VarLenHandle;
use crate::types::CharacterEncoding;

// The member slot only carries a handle; content lives in the store heap.
// An all-zero handle stands for "no value".

fn store(
    member: &MemberLayout,
    bytes: &[u8],
    window: &mut [u8],
    ctx: &CodecContext<'_>,
) -> CodecResult<()> {
    let handle = ctx.heap(member)?.write_variable_length(bytes)?;
    handle.encode(ctx.byte_order, window);
    Ok(())
}

fn load(member: &MemberLayout, window: &[u8], ctx: &CodecContext<'_>) -> CodecResult<Option<Vec<u8>>> {
    let handle = VarLenHandle::decode(ctx.byte_order, window);
    if handle.is_null() {
        return Ok(None);
    }
    ctx.heap(member)?.read_variable_length(&handle).map(Some)
}

pub(super) fn encode_string(
    member: &MemberLayout,
    value: &CompoundValue,
    encoding: CharacterEncoding,
    window: &mut [u8],
    ctx: &CodecContext<'_>,
) -> CodecResult<()> {
    let bytes = string_bytes(member, value, encoding)?;
    store(member, bytes, window, ctx)
}

pub(super) fn decode_string(
    member: &MemberLayout,
    window: &[u8],
    ctx: &CodecContext<'_>,
) -> CodecResult<CompoundValue> {
    Ok(match load(member, window, ctx)? {
        Some(bytes) => CompoundValue::Str(decode_text(&bytes)),
        None => CompoundValue::Null,
    })
}

pub(super) fn encode_bytes(
    member: &MemberLayout,
    value: &CompoundValue,
    window: &mut [u8],
    ctx: &CodecContext<'_>,
) -> CodecResult<()> {
    let bytes = value.as_bytes().ok_or_else(|| mismatch(member, "bytes", value))?;
    store(member, bytes, window, ctx)
}

pub(super) fn decode_bytes(
    member: &MemberLayout,
    window: &[u8],
    ctx: &CodecContext<'_>,
) -> CodecResult<CompoundValue> {
    Ok(load(member, window, ctx)?.map_or(CompoundValue::Null, CompoundValue::Bytes))
}
