use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::enum_type::EnumType;
use crate::member_codec::MemberKind;
use crate::resolver::{Representation, TypeVariantResolver};
use crate::schema::CompoundSchema;
use crate::types::{CharacterEncoding, DataClass, Dims, TimeUnit, TypeVariant, VL_HANDLE_SIZE};

/// How a member is tied to the in-memory record shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemberBinding {
    /// No field of the shape receives this member.
    #[default]
    Unbound,
    /// Bound to the declared field at this index of the shape.
    Field(usize),
    /// Bound to an open shape (dynamic map or positional record without
    /// declared fields), which accepts every member.
    Open,
}

impl MemberBinding {
    pub fn is_bound(self) -> bool {
        !matches!(self, MemberBinding::Unbound)
    }
}

/// One member of a compound type: where it lives in the raw buffer and what
/// kind of data it holds.
///
/// `element_size < 0` marks a variable-length member; its slot holds a
/// [`VL_HANDLE_SIZE`]-byte handle.
#[derive(Debug, Clone)]
pub struct MemberLayout {
    pub name: SmolStr,
    pub offset: usize,
    pub element_size: i64,
    pub data_class: DataClass,
    /// Integer signedness. Ignored for other classes.
    pub signed: bool,
    /// Outermost first; empty for scalars.
    pub dimensions: Dims,
    pub encoding: CharacterEncoding,
    pub variant: Option<TypeVariant>,
    pub opaque_tag: Option<SmolStr>,
    pub enum_type: Option<Arc<EnumType>>,
    pub nested: Option<Arc<CompoundSchema>>,
    pub(crate) kind: Option<MemberKind>,
    pub(crate) binding: MemberBinding,
}

impl MemberLayout {
    pub fn new(name: impl Into<SmolStr>, offset: usize, data_class: DataClass, element_size: i64) -> Self {
        Self {
            name: name.into(),
            offset,
            element_size,
            data_class,
            signed: true,
            dimensions: Dims::new(),
            encoding: CharacterEncoding::Ascii,
            variant: None,
            opaque_tag: None,
            enum_type: None,
            nested: None,
            kind: None,
            binding: MemberBinding::Unbound,
        }
    }

    pub fn integer(name: impl Into<SmolStr>, offset: usize, size: usize) -> Self {
        Self::new(name, offset, DataClass::Integer, size as i64)
    }

    pub fn float(name: impl Into<SmolStr>, offset: usize, size: usize) -> Self {
        Self::new(name, offset, DataClass::Float, size as i64)
    }

    /// Fixed-width string; `width` includes the terminator.
    pub fn string(name: impl Into<SmolStr>, offset: usize, width: usize) -> Self {
        Self::new(name, offset, DataClass::String, width as i64)
    }

    /// Signed 8-byte integer tagged as a timestamp.
    pub fn timestamp(name: impl Into<SmolStr>, offset: usize, unit: TimeUnit) -> Self {
        Self::new(name, offset, DataClass::Integer, 8).with_variant(TypeVariant::Timestamp(unit))
    }

    pub fn signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    /// Dimensions beyond [`crate::types::MAX_RANK`] are dropped; the
    /// resolver rejects such ranks before a layout is built from a shape.
    pub fn with_dims(mut self, dims: &[usize]) -> Self {
        self.dimensions = dims.iter().copied().take(crate::types::MAX_RANK).collect();
        self
    }

    pub fn with_encoding(mut self, encoding: CharacterEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_variant(mut self, variant: TypeVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn with_opaque_tag(mut self, tag: impl Into<SmolStr>) -> Self {
        self.opaque_tag = Some(tag.into());
        self
    }

    pub fn with_enum(mut self, enum_type: Arc<EnumType>) -> Self {
        self.enum_type = Some(enum_type);
        self
    }

    pub fn with_nested(mut self, schema: Arc<CompoundSchema>) -> Self {
        self.nested = Some(schema);
        self
    }

    pub fn at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    // ─── Derived queries ────────────────────────────────────────────────────

    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    pub fn number_of_elements(&self) -> usize {
        self.dimensions.iter().product()
    }

    pub fn is_array_type(&self) -> bool {
        !self.dimensions.is_empty()
    }

    pub fn is_variable_length(&self) -> bool {
        self.element_size < 0
    }

    /// `element_size * product(dimensions)`; negative for variable-length members.
    pub fn size(&self) -> i64 {
        if self.is_variable_length() {
            return self.element_size;
        }
        self.element_size * self.number_of_elements() as i64
    }

    /// Bytes this member occupies in a raw buffer.
    pub fn footprint(&self) -> usize {
        if self.is_variable_length() {
            VL_HANDLE_SIZE
        } else {
            self.size() as usize
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.footprint()
    }

    /// Characters a fixed string can hold, otherwise the element size.
    pub fn usable_length(&self) -> i64 {
        if self.data_class == DataClass::String && self.element_size > 0 {
            let chars = self.element_size - 1;
            match self.encoding {
                CharacterEncoding::Ascii => chars,
                CharacterEncoding::Utf8 => chars / 2,
            }
        } else {
            self.element_size
        }
    }

    pub fn is_timestamp(&self) -> bool {
        self.variant.is_some_and(TypeVariant::is_timestamp)
    }

    pub fn is_duration(&self) -> bool {
        self.variant.is_some_and(TypeVariant::is_duration)
    }

    pub fn time_unit(&self) -> Option<TimeUnit> {
        self.variant.map(TypeVariant::time_unit)
    }

    /// Representation under the default resolver.
    pub fn preferred_representation(&self) -> Representation {
        self.representation_with(&TypeVariantResolver::default())
    }

    pub fn representation_with(&self, resolver: &TypeVariantResolver) -> Representation {
        resolver.resolve(self.data_class, self.element_size, self.rank(), self.variant)
    }

    pub fn binding(&self) -> MemberBinding {
        self.binding
    }

    pub fn is_mapped(&self) -> bool {
        self.binding.is_bound()
    }

    pub fn kind(&self) -> Option<&MemberKind> {
        self.kind.as_ref()
    }

    /// Byte range of this member inside a raw buffer.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.end()
    }

    /// Same storage type, ignoring name, offset and binding.
    pub fn same_type(&self, other: &MemberLayout) -> bool {
        self.element_size == other.element_size
            && self.data_class == other.data_class
            && self.signed == other.signed
            && self.dimensions == other.dimensions
            && self.encoding == other.encoding
            && self.variant == other.variant
    }
}

impl fmt::Display for MemberLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.number_of_elements();
        if n == 1 {
            write!(f, "{}({})", self.data_class, self.usable_length())?;
        } else if self.rank() == 1 {
            write!(f, "{}({}, #{})", self.data_class, self.usable_length(), n)?;
        } else {
            let dims: Vec<String> = self.dimensions.iter().map(|d| d.to_string()).collect();
            write!(
                f,
                "{}({}, [{}])",
                self.data_class,
                self.usable_length(),
                dims.join(",")
            )?;
        }
        if let Some(variant) = self.variant {
            write!(f, "/{variant}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_invariant() {
        let m = MemberLayout::integer("m", 0, 4).with_dims(&[2, 3]);
        assert_eq!(m.size(), 24);
        assert_eq!(m.number_of_elements(), 6);
        assert_eq!(m.footprint(), 24);
        assert!(m.is_array_type());
    }

    #[test]
    fn test_variable_length_footprint() {
        let m = MemberLayout::new("v", 8, DataClass::String, -1);
        assert!(m.is_variable_length());
        assert!(m.size() < 0);
        assert_eq!(m.footprint(), VL_HANDLE_SIZE);
        assert_eq!(m.end(), 8 + VL_HANDLE_SIZE);
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(MemberLayout::integer("a", 0, 4).to_string(), "INTEGER(4)");
        assert_eq!(MemberLayout::string("s", 0, 8).to_string(), "STRING(7)");
        assert_eq!(
            MemberLayout::float("f", 0, 8).with_dims(&[3]).to_string(),
            "FLOAT(8, #3)"
        );
        assert_eq!(
            MemberLayout::integer("g", 0, 2).with_dims(&[2, 3]).to_string(),
            "INTEGER(2, [2,3])"
        );
        assert_eq!(
            MemberLayout::timestamp("t", 0, TimeUnit::Milliseconds).to_string(),
            "INTEGER(8)/TIMESTAMP_MILLISECONDS_SINCE_START_OF_THE_EPOCH"
        );
    }

    #[test]
    fn test_temporal_queries() {
        let t = MemberLayout::timestamp("t", 0, TimeUnit::Seconds);
        assert!(t.is_timestamp());
        assert!(!t.is_duration());
        assert_eq!(t.time_unit(), Some(TimeUnit::Seconds));
        assert_eq!(t.preferred_representation(), Representation::TimePoint);
    }
}
