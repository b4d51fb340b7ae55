//! Inference of in-memory representations from raw storage types, and the
//! reverse direction used when a layout is synthesized from a record shape.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::error::{CodecError, CodecResult};
use crate::layout::MemberLayout;
use crate::shape::FieldType;
use crate::types::{CodecConfig, DataClass, MAX_RANK, TypeVariant};

/// Best-fitting in-memory representation of a member.
///
/// `Unknown` means "keep the raw bytes"; no typed access is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Representation {
    Bool,
    Integer { size: usize },
    Float { size: usize },
    String,
    Enum,
    BitField,
    TimePoint,
    Duration,
    Bytes,
    Compound,
    Array {
        element: Box<Representation>,
        rank: usize,
    },
    Unknown,
}

impl Representation {
    pub fn is_known(&self) -> bool {
        match self {
            Representation::Unknown => false,
            Representation::Array { element, .. } => element.is_known(),
            _ => true,
        }
    }
}

/// Lookup key of an explicit override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolveKey {
    pub data_class: DataClass,
    pub rank: usize,
    pub element_size: i64,
    pub variant: Option<TypeVariant>,
}

#[derive(Debug, Clone, Default)]
pub struct TypeVariantResolver {
    overrides: FxHashMap<ResolveKey, Representation>,
}

impl TypeVariantResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, key: ResolveKey, representation: Representation) -> Self {
        self.register_override(key, representation);
        self
    }

    pub fn register_override(&mut self, key: ResolveKey, representation: Representation) {
        self.overrides.insert(key, representation);
    }

    /// Representation for a raw member type. An exact override wins, then the
    /// data class default applies.
    pub fn resolve(
        &self,
        data_class: DataClass,
        element_size: i64,
        rank: usize,
        variant: Option<TypeVariant>,
    ) -> Representation {
        let key = ResolveKey {
            data_class,
            rank,
            element_size,
            variant,
        };
        if let Some(repr) = self.overrides.get(&key) {
            return repr.clone();
        }
        default_representation(data_class, element_size, rank, variant)
    }

    /// Synthesize the storage layout for a record field (offset 0; the schema
    /// builder places it).
    pub fn infer(
        &self,
        name: &str,
        field: &FieldType,
        config: &CodecConfig,
    ) -> CodecResult<MemberLayout> {
        infer_layout(SmolStr::new(name), field, config)
    }
}

/// Data class default, without overrides.
pub fn default_representation(
    data_class: DataClass,
    element_size: i64,
    rank: usize,
    variant: Option<TypeVariant>,
) -> Representation {
    let scalar = scalar_representation(data_class, element_size, variant);
    if rank == 0 || scalar == Representation::Unknown {
        return scalar;
    }
    // Variable-length elements cannot be laid out as a fixed array.
    if element_size < 0 {
        return Representation::Unknown;
    }
    Representation::Array {
        element: Box::new(scalar),
        rank,
    }
}

fn scalar_representation(
    data_class: DataClass,
    element_size: i64,
    variant: Option<TypeVariant>,
) -> Representation {
    if variant.is_some() && data_class != DataClass::Integer {
        return Representation::Unknown;
    }
    match data_class {
        DataClass::Integer => match variant {
            Some(TypeVariant::Timestamp(_)) => Representation::TimePoint,
            Some(TypeVariant::Duration(_)) => Representation::Duration,
            None => match element_size {
                1 | 2 | 4 | 8 => Representation::Integer {
                    size: element_size as usize,
                },
                _ => Representation::Unknown,
            },
        },
        DataClass::Float => match element_size {
            4 | 8 => Representation::Float {
                size: element_size as usize,
            },
            _ => Representation::Unknown,
        },
        DataClass::String => Representation::String,
        DataClass::Boolean => Representation::Bool,
        DataClass::Enum => Representation::Enum,
        DataClass::BitField if element_size > 0 => Representation::BitField,
        DataClass::Opaque => Representation::Bytes,
        DataClass::Compound if element_size > 0 => Representation::Compound,
        DataClass::BitField | DataClass::Compound | DataClass::Array => Representation::Unknown,
    }
}

/// Timestamp and duration tags are only valid on integers.
pub fn check_variant(
    member: &str,
    data_class: DataClass,
    variant: Option<TypeVariant>,
) -> CodecResult<()> {
    match variant {
        Some(variant) if data_class != DataClass::Integer => Err(CodecError::VariantConflict {
            member: SmolStr::new(member),
            variant,
            data_class,
        }),
        _ => Ok(()),
    }
}

fn infer_layout(name: SmolStr, field: &FieldType, config: &CodecConfig) -> CodecResult<MemberLayout> {
    let layout = match field {
        FieldType::Bool => MemberLayout::new(name, 0, DataClass::Boolean, 1),
        FieldType::Int { size, signed } => {
            if !matches!(size, 1 | 2 | 4 | 8) {
                return Err(invalid(&name, format!("unsupported integer width {size}")));
            }
            MemberLayout::new(name, 0, DataClass::Integer, *size as i64).signed(*signed)
        }
        FieldType::Float { size } => {
            if !matches!(size, 4 | 8) {
                return Err(invalid(&name, format!("unsupported float width {size}")));
            }
            MemberLayout::new(name, 0, DataClass::Float, *size as i64)
        }
        FieldType::String { length, encoding } => {
            let encoding = encoding.unwrap_or(config.string_encoding);
            let width = length * encoding.max_bytes_per_char() + 1;
            MemberLayout::new(name, 0, DataClass::String, width as i64).with_encoding(encoding)
        }
        FieldType::VarString { encoding } => MemberLayout::new(name, 0, DataClass::String, -1)
            .with_encoding(encoding.unwrap_or(config.string_encoding)),
        FieldType::Enum(ty) => {
            MemberLayout::new(name, 0, DataClass::Enum, ty.storage_size() as i64)
                .with_enum(Arc::clone(ty))
        }
        FieldType::BitField { bits } => {
            if *bits == 0 {
                return Err(invalid(&name, "bit field without bits".to_string()));
            }
            MemberLayout::new(name, 0, DataClass::BitField, bits.div_ceil(8) as i64)
        }
        FieldType::Timestamp(unit) => MemberLayout::new(name, 0, DataClass::Integer, 8)
            .with_variant(TypeVariant::Timestamp(unit.unwrap_or(config.default_time_unit))),
        FieldType::Duration(unit) => MemberLayout::new(name, 0, DataClass::Integer, 8)
            .with_variant(TypeVariant::Duration(*unit)),
        FieldType::Opaque { size, tag } => {
            let layout = MemberLayout::new(name, 0, DataClass::Opaque, *size as i64);
            match tag {
                Some(tag) => layout.with_opaque_tag(tag.clone()),
                None => layout,
            }
        }
        FieldType::VarBytes => MemberLayout::new(name, 0, DataClass::Opaque, -1),
        FieldType::Array { element, dims } => {
            if matches!(
                **element,
                FieldType::Array { .. } | FieldType::VarString { .. } | FieldType::VarBytes
            ) {
                return Err(invalid(&name, "array elements must be fixed-size scalars".to_string()));
            }
            if dims.is_empty() || dims.len() > MAX_RANK {
                return Err(invalid(&name, format!("unsupported array rank {}", dims.len())));
            }
            infer_layout(name, element, config)?.with_dims(dims)
        }
        FieldType::Compound(schema) => {
            MemberLayout::new(name, 0, DataClass::Compound, schema.total_size() as i64)
                .with_nested(Arc::clone(schema))
        }
    };
    Ok(layout)
}

fn invalid(name: &SmolStr, reason: String) -> CodecError {
    CodecError::InvalidLayout {
        member: name.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CharacterEncoding, TimeUnit};

    #[test]
    fn test_default_integer_and_float() {
        let r = TypeVariantResolver::new();
        assert_eq!(
            r.resolve(DataClass::Integer, 4, 0, None),
            Representation::Integer { size: 4 }
        );
        assert_eq!(
            r.resolve(DataClass::Float, 8, 1, None),
            Representation::Array {
                element: Box::new(Representation::Float { size: 8 }),
                rank: 1
            }
        );
        assert_eq!(r.resolve(DataClass::Integer, 3, 0, None), Representation::Unknown);
        assert_eq!(r.resolve(DataClass::Array, 8, 0, None), Representation::Unknown);
    }

    #[test]
    fn test_variant_selects_temporal_representation() {
        let r = TypeVariantResolver::new();
        let ts = Some(TypeVariant::Timestamp(TimeUnit::Milliseconds));
        let dur = Some(TypeVariant::Duration(TimeUnit::Seconds));
        assert_eq!(r.resolve(DataClass::Integer, 8, 0, ts), Representation::TimePoint);
        assert_eq!(r.resolve(DataClass::Integer, 8, 0, dur), Representation::Duration);
        assert_eq!(r.resolve(DataClass::Float, 8, 0, ts), Representation::Unknown);
    }

    #[test]
    fn test_override_wins_over_default() {
        let key = ResolveKey {
            data_class: DataClass::Integer,
            rank: 0,
            element_size: 1,
            variant: None,
        };
        let r = TypeVariantResolver::new().with_override(key, Representation::Bool);
        assert_eq!(r.resolve(DataClass::Integer, 1, 0, None), Representation::Bool);
        // Other widths are unaffected.
        assert_eq!(
            r.resolve(DataClass::Integer, 2, 0, None),
            Representation::Integer { size: 2 }
        );
    }

    #[test]
    fn test_variant_on_float_is_conflict() {
        let err = check_variant(
            "t",
            DataClass::Float,
            Some(TypeVariant::Timestamp(TimeUnit::Milliseconds)),
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::VariantConflict { .. }));
        assert!(check_variant("t", DataClass::Integer, None).is_ok());
    }

    #[test]
    fn test_infer_string_width_per_encoding() {
        let cfg = CodecConfig::default();
        let r = TypeVariantResolver::new();
        let ascii = r
            .infer("s", &FieldType::String { length: 7, encoding: None }, &cfg)
            .unwrap();
        assert_eq!(ascii.size(), 8);
        let utf8 = r
            .infer(
                "s",
                &FieldType::String {
                    length: 7,
                    encoding: Some(CharacterEncoding::Utf8),
                },
                &cfg,
            )
            .unwrap();
        assert_eq!(utf8.size(), 15);
        assert_eq!(utf8.usable_length(), 7);
    }

    #[test]
    fn test_infer_timestamp_uses_default_unit() {
        let cfg = CodecConfig::default();
        let layout = TypeVariantResolver::new()
            .infer("at", &FieldType::Timestamp(None), &cfg)
            .unwrap();
        assert_eq!(layout.data_class, DataClass::Integer);
        assert_eq!(layout.size(), 8);
        assert_eq!(layout.variant, Some(TypeVariant::Timestamp(TimeUnit::Milliseconds)));
    }

    #[test]
    fn test_infer_array_of_arrays_rejected() {
        let cfg = CodecConfig::default();
        let nested = FieldType::Array {
            element: Box::new(FieldType::Array {
                element: Box::new(FieldType::Int { size: 4, signed: true }),
                dims: vec![2],
            }),
            dims: vec![2],
        };
        assert!(matches!(
            TypeVariantResolver::new().infer("a", &nested, &cfg),
            Err(CodecError::InvalidLayout { .. })
        ));
    }
}
