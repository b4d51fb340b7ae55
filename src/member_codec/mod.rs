//! Per-member codecs. The kind of each member is selected once while its
//! schema is built and cached on the [`MemberLayout`].

mod array;
mod enumeration;
mod scalar;
mod string;
mod temporal;
mod varlen;


use std::sync::Arc;

use crate::compound_value::CompoundValue;
use crate::enum_type::EnumType;
use crate::error::{CodecError, CodecResult};
use crate::layout::MemberLayout;
use crate::resolver::{Representation, TypeVariantResolver};
use crate::schema::CompoundSchema;
use crate::store::VarLenStore;
use crate::types::{CharacterEncoding, CodecConfig, Endianness, TimeUnit};

/// Closed set of member codecs.
#[derive(Debug, Clone)]
pub enum MemberKind {
    Bool,
    Integer { signed: bool },
    Float,
    FixedString(CharacterEncoding),
    VarString(CharacterEncoding),
    VarBytes,
    Enum(Arc<EnumType>),
    BitField,
    Timestamp(TimeUnit),
    Duration(TimeUnit),
    /// Raw bytes; also the fallback for representations nothing else handles.
    Opaque,
    Compound(Arc<CompoundSchema>),
    /// Fixed array of the element kind; extents come from the layout.
    Array(Box<MemberKind>),
}

/// Per-call state shared by every member codec.
#[derive(Clone, Copy)]
pub struct CodecContext<'a> {
    pub byte_order: Endianness,
    pub heap: Option<&'a dyn VarLenStore>,
}

impl<'a> CodecContext<'a> {
    pub fn new(byte_order: Endianness, heap: Option<&'a dyn VarLenStore>) -> Self {
        Self { byte_order, heap }
    }

    /// Context for a nested compound, which keeps its own byte order.
    pub(crate) fn nested(&self, schema: &CompoundSchema) -> CodecContext<'a> {
        CodecContext::new(schema.config().byte_order, self.heap)
    }

    pub(crate) fn heap(&self, member: &MemberLayout) -> CodecResult<&'a dyn VarLenStore> {
        self.heap
            .ok_or_else(|| CodecError::VarLenUnavailable(member.name.clone()))
    }
}

impl MemberKind {
    /// Pick the codec for `member` from its resolved representation.
    pub fn select(
        member: &MemberLayout,
        resolver: &TypeVariantResolver,
        config: &CodecConfig,
    ) -> CodecResult<Self> {
        match member.representation_with(resolver) {
            Representation::Array { element, .. } if member.is_array_type() => Ok(MemberKind::Array(
                Box::new(scalar_kind(member, *element, config)?),
            )),
            // Overrides may hand back a scalar for an array member; the
            // element is then not addressable on its own.
            repr if member.is_array_type() => match scalar_kind(member, repr, config)? {
                MemberKind::Opaque => Ok(MemberKind::Opaque),
                kind => Ok(MemberKind::Array(Box::new(kind))),
            },
            repr => scalar_kind(member, repr, config),
        }
    }

    pub fn is_variable_length(&self) -> bool {
        matches!(self, MemberKind::VarString(_) | MemberKind::VarBytes)
    }

    /// Write `value` into `window`, the member's byte range.
    pub(crate) fn encode(
        &self,
        member: &MemberLayout,
        value: &CompoundValue,
        window: &mut [u8],
        ctx: &CodecContext<'_>,
    ) -> CodecResult<()> {
        if value.is_null() {
            window.fill(0);
            return Ok(());
        }
        match self {
            MemberKind::Array(element) => array::encode(element, member, value, window, ctx),
            kind => kind.encode_element(member, value, window, ctx),
        }
    }

    pub(crate) fn decode(
        &self,
        member: &MemberLayout,
        window: &[u8],
        ctx: &CodecContext<'_>,
    ) -> CodecResult<CompoundValue> {
        match self {
            MemberKind::Array(element) => array::decode(element, member, window, ctx),
            kind => kind.decode_element(member, window, ctx),
        }
    }

    /// One scalar element; `window` is exactly one element wide (or a
    /// variable-length handle).
    fn encode_element(
        &self,
        member: &MemberLayout,
        value: &CompoundValue,
        window: &mut [u8],
        ctx: &CodecContext<'_>,
    ) -> CodecResult<()> {
        let order = ctx.byte_order;
        match self {
            MemberKind::Bool => scalar::encode_bool(member, value, window, order),
            MemberKind::Integer { signed } => {
                scalar::encode_integer(member, value, *signed, window, order)
            }
            MemberKind::Float => scalar::encode_float(member, value, window, order),
            MemberKind::FixedString(encoding) => {
                string::encode_fixed(member, value, *encoding, window)
            }
            MemberKind::VarString(encoding) => {
                varlen::encode_string(member, value, *encoding, window, ctx)
            }
            MemberKind::VarBytes => varlen::encode_bytes(member, value, window, ctx),
            MemberKind::Enum(ty) => enumeration::encode_enum(member, ty, value, window, order),
            MemberKind::BitField => enumeration::encode_bitfield(member, value, window, order),
            MemberKind::Timestamp(unit) => {
                temporal::encode_timestamp(member, value, *unit, window, order)
            }
            MemberKind::Duration(unit) => {
                temporal::encode_duration(member, value, *unit, window, order)
            }
            MemberKind::Opaque => scalar::encode_opaque(member, value, window),
            MemberKind::Compound(schema) => match value {
                CompoundValue::Compound(map) => {
                    crate::serialization::encode_record(schema, map, window, &ctx.nested(schema))
                }
                other => Err(mismatch(member, "compound", other)),
            },
            MemberKind::Array(_) => Err(CodecError::InvalidLayout {
                member: member.name.clone(),
                reason: "nested array element".to_string(),
            }),
        }
    }

    fn decode_element(
        &self,
        member: &MemberLayout,
        window: &[u8],
        ctx: &CodecContext<'_>,
    ) -> CodecResult<CompoundValue> {
        let order = ctx.byte_order;
        match self {
            MemberKind::Bool => Ok(scalar::decode_bool(window)),
            MemberKind::Integer { signed } => Ok(scalar::decode_integer(window, *signed, order)),
            MemberKind::Float => Ok(scalar::decode_float(window, order)),
            MemberKind::FixedString(_) => Ok(string::decode_fixed(window)),
            MemberKind::VarString(_) => varlen::decode_string(member, window, ctx),
            MemberKind::VarBytes => varlen::decode_bytes(member, window, ctx),
            MemberKind::Enum(ty) => Ok(enumeration::decode_enum(member, ty, window, order)),
            MemberKind::BitField => Ok(enumeration::decode_bitfield(window, order)),
            MemberKind::Timestamp(unit) => Ok(temporal::decode_timestamp(member, window, *unit, order)),
            MemberKind::Duration(unit) => Ok(temporal::decode_duration(window, *unit, order)),
            MemberKind::Opaque => Ok(CompoundValue::Bytes(window.to_vec())),
            MemberKind::Compound(schema) => {
                crate::deserialization::decode_record::<crate::compound_value::CompoundMap>(
                    schema,
                    window,
                    &ctx.nested(schema),
                )
                .map(CompoundValue::Compound)
            }
            MemberKind::Array(_) => Err(CodecError::InvalidLayout {
                member: member.name.clone(),
                reason: "nested array element".to_string(),
            }),
        }
    }
}

fn scalar_kind(
    member: &MemberLayout,
    repr: Representation,
    config: &CodecConfig,
) -> CodecResult<MemberKind> {
    let width_ok = matches!(member.element_size, 1 | 2 | 4 | 8);
    let kind = match repr {
        Representation::Bool if member.element_size > 0 => MemberKind::Bool,
        Representation::Integer { .. } if width_ok => MemberKind::Integer {
            signed: member.signed,
        },
        Representation::Float { .. } if matches!(member.element_size, 4 | 8) => MemberKind::Float,
        Representation::String if member.is_variable_length() => {
            MemberKind::VarString(member.encoding)
        }
        Representation::String => MemberKind::FixedString(member.encoding),
        Representation::Enum => match &member.enum_type {
            Some(ty) if width_ok => MemberKind::Enum(Arc::clone(ty)),
            Some(_) => {
                return Err(CodecError::InvalidLayout {
                    member: member.name.clone(),
                    reason: format!("unsupported enum width {}", member.element_size),
                });
            }
            // No ordinal table: expose the raw code.
            None if width_ok => MemberKind::Integer {
                signed: member.signed,
            },
            None => MemberKind::Opaque,
        },
        Representation::BitField => MemberKind::BitField,
        Representation::TimePoint if width_ok => MemberKind::Timestamp(
            member.time_unit().unwrap_or(config.default_time_unit),
        ),
        Representation::Duration if width_ok => {
            MemberKind::Duration(member.time_unit().unwrap_or(config.default_time_unit))
        }
        Representation::Compound => match &member.nested {
            Some(schema) => MemberKind::Compound(Arc::clone(schema)),
            None => MemberKind::Opaque,
        },
        _ if member.is_variable_length() => MemberKind::VarBytes,
        _ => MemberKind::Opaque,
    };
    if kind.is_variable_length() != member.is_variable_length() {
        return Err(CodecError::InvalidLayout {
            member: member.name.clone(),
            reason: format!("{} cannot be variable-length", member.data_class),
        });
    }
    Ok(kind)
}

pub(crate) fn mismatch(member: &MemberLayout, expected: &'static str, value: &CompoundValue) -> CodecError {
    CodecError::TypeMismatch {
        member: member.name.clone(),
        expected,
        actual: value.kind_name(),
    }
}

pub(crate) fn out_of_range(member: &MemberLayout, width: usize) -> CodecError {
    CodecError::ValueOutOfRange {
        member: member.name.clone(),
        width,
    }
}
