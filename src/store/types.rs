use std::num::NonZeroUsize;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::enum_type::EnumType;
use crate::error::{CodecError, CodecResult};
use crate::layout::MemberLayout;
use crate::schema::CompoundSchema;
use crate::shape::RecordShape;
use crate::types::{CharacterEncoding, CodecConfig, DataClass, Endianness, TypeVariant, VL_HANDLE_SIZE};

// ─── Collaborator traits ────────────────────────────────────────────────────

/// Heap for variable-length member content.
pub trait VarLenStore: Send + Sync {
    fn write_variable_length(&self, bytes: &[u8]) -> CodecResult<VarLenHandle>;

    fn read_variable_length(&self, handle: &VarLenHandle) -> CodecResult<Vec<u8>>;
}

/// Fixed-size raw records of allocated compound types.
pub trait BinaryStore: VarLenStore {
    /// Allocate (or reopen) storage for records of `total_size` bytes.
    fn allocate_compound_type(&self, name: &str, total_size: usize) -> CodecResult<TypeHandle>;

    /// Raw bytes of record `index`; never written records read as zeros.
    fn read_raw(&self, handle: &TypeHandle, index: u64) -> CodecResult<Vec<u8>>;

    fn write_raw(&self, handle: &TypeHandle, index: u64, bytes: &[u8]) -> CodecResult<()>;

    /// One past the highest written index.
    fn record_count(&self, handle: &TypeHandle) -> CodecResult<u64>;
}

/// Persistent compound type descriptions.
pub trait TypeCatalog {
    /// Store `description`. Re-registering an identical description is a
    /// no-op; a different one under the same name is a conflict.
    fn register_type(&self, description: &CompoundTypeDescription) -> CodecResult<()>;

    fn lookup_type(&self, name: &str) -> CodecResult<Option<CompoundTypeDescription>>;

    fn type_names(&self) -> CodecResult<Vec<SmolStr>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHandle {
    pub name: SmolStr,
    pub total_size: usize,
}

// ─── Variable-length handle ─────────────────────────────────────────────────

/// Slot content of a variable-length member. See the layout in
/// [`crate::types`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarLenHandle {
    pub length: u32,
    pub collection: u64,
    pub index: u32,
}

impl VarLenHandle {
    /// All zeros: no value stored.
    pub const NULL: VarLenHandle = VarLenHandle {
        length: 0,
        collection: 0,
        index: 0,
    };

    /// Handle for heap object `key`. Collections start at 1 so that a real
    /// handle is never all zeros.
    pub fn from_key(key: u64, length: usize) -> CodecResult<Self> {
        let length = u32::try_from(length)
            .map_err(|_| CodecError::Store(format!("variable-length value of {length} bytes")))?;
        Ok(Self {
            length,
            collection: (key >> 32) + 1,
            index: key as u32,
        })
    }

    /// Heap object key, `None` for [`VarLenHandle::NULL`].
    pub fn key(&self) -> Option<u64> {
        let collection = self.collection.checked_sub(1)?;
        Some((collection << 32) | u64::from(self.index))
    }

    pub fn is_null(&self) -> bool {
        self.collection == 0
    }

    pub fn encode(&self, order: Endianness, window: &mut [u8]) {
        debug_assert_eq!(window.len(), VL_HANDLE_SIZE);
        match order {
            Endianness::Little => {
                LittleEndian::write_u32(&mut window[0..4], self.length);
                LittleEndian::write_u64(&mut window[4..12], self.collection);
                LittleEndian::write_u32(&mut window[12..16], self.index);
            }
            Endianness::Big => {
                BigEndian::write_u32(&mut window[0..4], self.length);
                BigEndian::write_u64(&mut window[4..12], self.collection);
                BigEndian::write_u32(&mut window[12..16], self.index);
            }
        }
    }

    pub fn decode(order: Endianness, window: &[u8]) -> Self {
        match order {
            Endianness::Little => Self {
                length: LittleEndian::read_u32(&window[0..4]),
                collection: LittleEndian::read_u64(&window[4..12]),
                index: LittleEndian::read_u32(&window[12..16]),
            },
            Endianness::Big => Self {
                length: BigEndian::read_u32(&window[0..4]),
                collection: BigEndian::read_u64(&window[4..12]),
                index: BigEndian::read_u32(&window[12..16]),
            },
        }
    }
}

// ─── Configuration ──────────────────────────────────────────────────────────

/// Configuration for [`crate::store::RedbStore::open_with_config`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of raw records kept in the LRU row cache.
    ///
    /// Evicted records remain on disk and are re-read on the next access.
    ///
    /// Default: 10 000 records.
    pub cache_capacity: NonZeroUsize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: NonZeroUsize::new(10_000).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

// ─── Type descriptions ──────────────────────────────────────────────────────

/// Serializable form of a compound type, as kept by a [`TypeCatalog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundTypeDescription {
    pub name: SmolStr,
    pub total_size: usize,
    pub byte_order: Endianness,
    pub members: Vec<MemberDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDescription {
    pub name: SmolStr,
    pub offset: usize,
    pub element_size: i64,
    pub data_class: DataClass,
    pub signed: bool,
    pub dimensions: Vec<usize>,
    pub encoding: CharacterEncoding,
    pub variant: Option<TypeVariant>,
    pub opaque_tag: Option<SmolStr>,
    pub enum_type: Option<EnumType>,
    pub nested: Option<Box<CompoundTypeDescription>>,
}

impl CompoundTypeDescription {
    pub fn from_schema(schema: &CompoundSchema) -> Self {
        Self {
            name: SmolStr::new(schema.name()),
            total_size: schema.total_size(),
            byte_order: schema.config().byte_order,
            members: schema.members().iter().map(MemberDescription::from_layout).collect(),
        }
    }

    /// Disk-authoritative member layouts.
    pub fn layouts(&self) -> CodecResult<Vec<MemberLayout>> {
        self.members.iter().map(MemberDescription::to_layout).collect()
    }

    /// Schema of this type bound to `shape`.
    pub fn to_schema(&self, shape: RecordShape) -> CodecResult<CompoundSchema> {
        let config = CodecConfig {
            byte_order: self.byte_order,
            ..CodecConfig::default()
        };
        CompoundSchema::builder(shape)
            .name(&self.name)
            .config(config)
            .layouts(self.layouts()?)
            .total_size(self.total_size)
            .build()
    }
}

impl MemberDescription {
    pub fn from_layout(layout: &MemberLayout) -> Self {
        Self {
            name: layout.name.clone(),
            offset: layout.offset,
            element_size: layout.element_size,
            data_class: layout.data_class,
            signed: layout.signed,
            dimensions: layout.dimensions.to_vec(),
            encoding: layout.encoding,
            variant: layout.variant,
            opaque_tag: layout.opaque_tag.clone(),
            enum_type: layout.enum_type.as_deref().cloned(),
            nested: layout
                .nested
                .as_deref()
                .map(|schema| Box::new(CompoundTypeDescription::from_schema(schema))),
        }
    }

    pub fn to_layout(&self) -> CodecResult<MemberLayout> {
        let mut layout = MemberLayout::new(self.name.clone(), self.offset, self.data_class, self.element_size)
            .signed(self.signed)
            .with_dims(&self.dimensions)
            .with_encoding(self.encoding);
        layout.variant = self.variant;
        layout.opaque_tag = self.opaque_tag.clone();
        layout.enum_type = self.enum_type.clone().map(Arc::new);
        if let Some(nested) = &self.nested {
            layout.nested = Some(Arc::new(nested.to_schema(RecordShape::open_map())?));
        }
        Ok(layout)
    }
}
