//! In-memory record shapes: what fields a record has and how the codec gets
//! and sets them.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::compound_value::{CompoundMap, CompoundValue};
use crate::enum_type::EnumType;
use crate::error::{CodecError, CodecResult};
use crate::schema::CompoundSchema;
use crate::types::{CharacterEncoding, TimeUnit};

// ─── Field types ────────────────────────────────────────────────────────────

/// In-memory type of a record field. Drives layout inference when a schema
/// is built from a shape alone.
#[derive(Debug, Clone)]
pub enum FieldType {
    Bool,
    Int { size: usize, signed: bool },
    Float { size: usize },
    /// Fixed-width string holding up to `length` characters.
    String {
        length: usize,
        encoding: Option<CharacterEncoding>,
    },
    VarString { encoding: Option<CharacterEncoding> },
    Enum(Arc<EnumType>),
    BitField { bits: usize },
    /// Point in time; `None` uses the configured default unit.
    Timestamp(Option<TimeUnit>),
    Duration(TimeUnit),
    Opaque { size: usize, tag: Option<SmolStr> },
    VarBytes,
    Array {
        element: Box<FieldType>,
        dims: Vec<usize>,
    },
    Compound(Arc<CompoundSchema>),
}

impl FieldType {
    pub const fn i8() -> Self {
        FieldType::Int { size: 1, signed: true }
    }

    pub const fn i16() -> Self {
        FieldType::Int { size: 2, signed: true }
    }

    pub const fn i32() -> Self {
        FieldType::Int { size: 4, signed: true }
    }

    pub const fn i64() -> Self {
        FieldType::Int { size: 8, signed: true }
    }

    pub const fn u8() -> Self {
        FieldType::Int { size: 1, signed: false }
    }

    pub const fn u16() -> Self {
        FieldType::Int { size: 2, signed: false }
    }

    pub const fn u32() -> Self {
        FieldType::Int { size: 4, signed: false }
    }

    pub const fn u64() -> Self {
        FieldType::Int { size: 8, signed: false }
    }

    pub const fn f32() -> Self {
        FieldType::Float { size: 4 }
    }

    pub const fn f64() -> Self {
        FieldType::Float { size: 8 }
    }

    pub const fn string(length: usize) -> Self {
        FieldType::String {
            length,
            encoding: None,
        }
    }

    pub fn array(element: FieldType, dims: &[usize]) -> Self {
        FieldType::Array {
            element: Box::new(element),
            dims: dims.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: SmolStr,
    pub ty: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<SmolStr>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

// ─── Record shape ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// A typed record with a fixed set of named fields.
    Reflected,
    /// A dynamic name-to-value map.
    Map,
    /// Values addressed by member position.
    Positional,
}

/// Declared fields of an in-memory record type.
///
/// Map and positional shapes without declared fields are *open*: they accept
/// every member a disk layout offers.
#[derive(Debug, Clone)]
pub struct RecordShape {
    kind: ShapeKind,
    type_name: Option<SmolStr>,
    fields: Vec<FieldDef>,
    index: FxHashMap<SmolStr, usize>,
}

impl RecordShape {
    fn with_fields(kind: ShapeKind, type_name: Option<SmolStr>, fields: Vec<FieldDef>) -> Self {
        let mut index = FxHashMap::default();
        for (i, field) in fields.iter().enumerate() {
            // First declaration wins; duplicates are reported by the schema builder.
            index.entry(field.name.clone()).or_insert(i);
        }
        Self {
            kind,
            type_name,
            fields,
            index,
        }
    }

    pub fn reflected(type_name: &str, fields: Vec<FieldDef>) -> Self {
        Self::with_fields(ShapeKind::Reflected, Some(SmolStr::new(type_name)), fields)
    }

    pub fn map(fields: Vec<FieldDef>) -> Self {
        Self::with_fields(ShapeKind::Map, None, fields)
    }

    pub fn positional(fields: Vec<FieldDef>) -> Self {
        Self::with_fields(ShapeKind::Positional, None, fields)
    }

    pub fn open_map() -> Self {
        Self::map(Vec::new())
    }

    pub fn open_positional() -> Self {
        Self::positional(Vec::new())
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn is_open(&self) -> bool {
        self.kind != ShapeKind::Reflected && self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<(usize, &FieldDef)> {
        let i = *self.index.get(name)?;
        Some((i, &self.fields[i]))
    }

    /// Names declared more than once.
    pub(crate) fn duplicate_fields(&self) -> Vec<SmolStr> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(i, f)| self.index.get(&f.name) != Some(i))
            .map(|(_, f)| f.name.clone())
            .collect()
    }
}

// ─── Record access ──────────────────────────────────────────────────────────

/// Address of one value inside a record: its member name and its position in
/// the schema's member order.
#[derive(Debug, Clone, Copy)]
pub struct FieldSlot<'a> {
    pub name: &'a str,
    pub position: usize,
}

/// Get/set capability the codec needs from a record.
pub trait CompoundRecord: Sized {
    /// A fresh record able to receive `slots` values.
    fn with_slots(slots: usize) -> Self;

    fn get_field(&self, slot: FieldSlot<'_>) -> Option<CompoundValue>;

    fn set_field(&mut self, slot: FieldSlot<'_>, value: CompoundValue) -> CodecResult<()>;
}

impl CompoundRecord for CompoundMap {
    fn with_slots(_slots: usize) -> Self {
        CompoundMap::default()
    }

    #[inline]
    fn get_field(&self, slot: FieldSlot<'_>) -> Option<CompoundValue> {
        self.get(slot.name).cloned()
    }

    #[inline]
    fn set_field(&mut self, slot: FieldSlot<'_>, value: CompoundValue) -> CodecResult<()> {
        self.insert(SmolStr::new(slot.name), value);
        Ok(())
    }
}

impl CompoundRecord for Vec<CompoundValue> {
    fn with_slots(slots: usize) -> Self {
        vec![CompoundValue::Null; slots]
    }

    #[inline]
    fn get_field(&self, slot: FieldSlot<'_>) -> Option<CompoundValue> {
        self.get(slot.position).cloned()
    }

    fn set_field(&mut self, slot: FieldSlot<'_>, value: CompoundValue) -> CodecResult<()> {
        if slot.position >= self.len() {
            self.resize(slot.position + 1, CompoundValue::Null);
        }
        self[slot.position] = value;
        Ok(())
    }
}

// ─── Reflected records ──────────────────────────────────────────────────────

/// Accessor pair for one field of a typed record.
pub struct FieldAccessor<T> {
    pub def: FieldDef,
    pub get: fn(&T) -> CompoundValue,
    pub set: fn(&mut T, CompoundValue) -> CodecResult<()>,
}

/// Field-name to accessor table of a typed record, built once per type.
pub struct RecordDescriptor<T> {
    type_name: SmolStr,
    accessors: Vec<FieldAccessor<T>>,
    index: FxHashMap<SmolStr, usize>,
}

impl<T> RecordDescriptor<T> {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: SmolStr::new(type_name),
            accessors: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn field(
        mut self,
        name: &str,
        ty: FieldType,
        get: fn(&T) -> CompoundValue,
        set: fn(&mut T, CompoundValue) -> CodecResult<()>,
    ) -> Self {
        self.index
            .entry(SmolStr::new(name))
            .or_insert(self.accessors.len());
        self.accessors.push(FieldAccessor {
            def: FieldDef::new(name, ty),
            get,
            set,
        });
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn shape(&self) -> RecordShape {
        RecordShape::reflected(
            &self.type_name,
            self.accessors.iter().map(|a| a.def.clone()).collect(),
        )
    }

    pub fn get(&self, record: &T, name: &str) -> Option<CompoundValue> {
        let accessor = &self.accessors[*self.index.get(name)?];
        Some((accessor.get)(record))
    }

    pub fn set(&self, record: &mut T, name: &str, value: CompoundValue) -> CodecResult<()> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| CodecError::FieldNotFound(SmolStr::new(name)))?;
        (self.accessors[i].set)(record, value).map_err(|e| e.for_member(name))
    }
}

/// A typed record with a static accessor table.
///
/// Implement this and invoke [`impl_compound_record!`](crate::impl_compound_record)
/// to make the type usable with a [`crate::RecordCodec`].
pub trait Reflect: Default + Sized + 'static {
    fn descriptor() -> &'static RecordDescriptor<Self>;

    fn shape() -> RecordShape {
        Self::descriptor().shape()
    }
}

/// Implement [`CompoundRecord`] for a [`Reflect`] type.
#[macro_export]
macro_rules! impl_compound_record {
    ($ty:ty) => {
        impl $crate::shape::CompoundRecord for $ty {
            fn with_slots(_slots: usize) -> Self {
                <$ty as ::std::default::Default>::default()
            }

            fn get_field(
                &self,
                slot: $crate::shape::FieldSlot<'_>,
            ) -> Option<$crate::compound_value::CompoundValue> {
                <$ty as $crate::shape::Reflect>::descriptor().get(self, slot.name)
            }

            fn set_field(
                &mut self,
                slot: $crate::shape::FieldSlot<'_>,
                value: $crate::compound_value::CompoundValue,
            ) -> $crate::error::CodecResult<()> {
                <$ty as $crate::shape::Reflect>::descriptor().set(self, slot.name, value)
            }
        }
    };
}
