//! Compound-record codec: maps in-memory records onto fixed-layout raw
//! buffers of a compound type and back.
//!
//! ```text
//!  RecordShape ─┐
//!               ├─ SchemaBuilder ─▶ CompoundSchema ─▶ RecordCodec ─▶ raw buffer
//!  MemberLayout ┘   (resolver)        (Arc, cached     (MemberKind
//!                                      in registry)     per member)
//! ```

pub mod compound_value;
pub mod deserialization;
pub mod enum_type;
pub mod error;
pub mod layout;
pub mod mapping;
pub mod member_codec;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod serialization;
pub mod shape;
pub mod store;
pub mod types;

pub use compound_value::{CompoundMap, CompoundNumber, CompoundValue, EnumValue, MdArray, TimeDuration};
pub use enum_type::EnumType;
pub use error::{CodecError, CodecResult};
pub use layout::{MemberBinding, MemberLayout};
pub use mapping::MappingAudit;
pub use member_codec::MemberKind;
pub use registry::TypeRegistry;
pub use resolver::{Representation, ResolveKey, TypeVariantResolver};
pub use schema::{CompoundSchema, SchemaBuilder};
pub use serialization::RecordCodec;
pub use shape::{
    CompoundRecord, FieldDef, FieldSlot, FieldType, RecordDescriptor, RecordShape, Reflect,
    ShapeKind,
};
pub use types::{CharacterEncoding, CodecConfig, DataClass, Endianness, TimeUnit, TypeVariant};
