//! Collaborators the codec reads from and writes to, plus two reference
//! implementations.

pub mod dataset;
pub mod memory;
pub mod redb_store;
pub mod types;

pub use dataset::CompoundDataset;
pub use memory::MemoryStore;
pub use redb_store::RedbStore;
pub use types::{
    BinaryStore, CompoundTypeDescription, MemberDescription, StoreConfig, TypeCatalog, TypeHandle,
    VarLenHandle, VarLenStore,
};
