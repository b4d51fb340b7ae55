use super::{CodecContext, MemberKind, mismatch};
use crate::compound_value::{CompoundValue, MdArray};
use crate::error::{CodecError, CodecResult};
use crate::layout::MemberLayout;

/// Flatten `value` row-major into consecutive element windows. Extents must
/// match the declared dimensions exactly.
pub(super) fn encode(
    element: &MemberKind,
    member: &MemberLayout,
    value: &CompoundValue,
    window: &mut [u8],
    ctx: &CodecContext<'_>,
) -> CodecResult<()> {
    let array = value.as_array().ok_or_else(|| mismatch(member, "array", value))?;
    if array.dims() != member.dimensions.as_slice() {
        return Err(CodecError::ShapeMismatch {
            member: member.name.clone(),
            expected: member.dimensions.to_vec(),
            actual: array.dims().to_vec(),
        });
    }
    let width = member.element_size as usize;
    for (item, slot) in array.values().iter().zip(window.chunks_exact_mut(width)) {
        if item.is_null() {
            slot.fill(0);
        } else {
            element.encode_element(member, item, slot, ctx)?;
        }
    }
    Ok(())
}

pub(super) fn decode(
    element: &MemberKind,
    member: &MemberLayout,
    window: &[u8],
    ctx: &CodecContext<'_>,
) -> CodecResult<CompoundValue> {
    let width = member.element_size as usize;
    let values = window
        .chunks_exact(width)
        .map(|slot| element.decode_element(member, slot, ctx))
        .collect::<CodecResult<Vec<_>>>()?;
    let array = MdArray::new(&member.dimensions, values).ok_or_else(|| CodecError::InvalidLayout {
        member: member.name.clone(),
        reason: "raw window does not hold the declared extents".to_string(),
    })?;
    Ok(CompoundValue::Array(array))
}
