use std::collections::BTreeMap;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::types::{BinaryStore, CompoundTypeDescription, TypeCatalog, TypeHandle, VarLenHandle, VarLenStore};
use crate::error::{CodecError, CodecResult};

struct MemoryTable {
    total_size: usize,
    rows: BTreeMap<u64, Vec<u8>>,
}

/// In-process store for tests and embedding.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<FxHashMap<SmolStr, MemoryTable>>,
    heap: RwLock<Vec<Vec<u8>>>,
    catalog: RwLock<FxHashMap<SmolStr, CompoundTypeDescription>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects on the variable-length heap.
    pub fn heap_len(&self) -> usize {
        self.heap.read().len()
    }
}

fn unknown_type(name: &str) -> CodecError {
    CodecError::Store(format!("compound type '{name}' is not allocated"))
}

impl VarLenStore for MemoryStore {
    fn write_variable_length(&self, bytes: &[u8]) -> CodecResult<VarLenHandle> {
        let mut heap = self.heap.write();
        let handle = VarLenHandle::from_key(heap.len() as u64, bytes.len())?;
        heap.push(bytes.to_vec());
        Ok(handle)
    }

    fn read_variable_length(&self, handle: &VarLenHandle) -> CodecResult<Vec<u8>> {
        let heap = self.heap.read();
        handle
            .key()
            .and_then(|key| heap.get(usize::try_from(key).ok()?))
            .filter(|bytes| bytes.len() == handle.length as usize)
            .cloned()
            .ok_or_else(|| CodecError::Store(format!("dangling variable-length handle {handle:?}")))
    }
}

impl BinaryStore for MemoryStore {
    fn allocate_compound_type(&self, name: &str, total_size: usize) -> CodecResult<TypeHandle> {
        let mut tables = self.tables.write();
        let table = tables.entry(SmolStr::new(name)).or_insert_with(|| MemoryTable {
            total_size,
            rows: BTreeMap::new(),
        });
        if table.total_size != total_size {
            return Err(CodecError::SchemaConflict {
                type_name: SmolStr::new(name),
                reason: format!(
                    "allocated with {} bytes per record, requested {total_size}",
                    table.total_size
                ),
            });
        }
        Ok(TypeHandle {
            name: SmolStr::new(name),
            total_size,
        })
    }

    fn read_raw(&self, handle: &TypeHandle, index: u64) -> CodecResult<Vec<u8>> {
        let tables = self.tables.read();
        let table = tables.get(&handle.name).ok_or_else(|| unknown_type(&handle.name))?;
        Ok(table
            .rows
            .get(&index)
            .cloned()
            .unwrap_or_else(|| vec![0; table.total_size]))
    }

    fn write_raw(&self, handle: &TypeHandle, index: u64, bytes: &[u8]) -> CodecResult<()> {
        let mut tables = self.tables.write();
        let table = tables.get_mut(&handle.name).ok_or_else(|| unknown_type(&handle.name))?;
        if bytes.len() != table.total_size {
            return Err(CodecError::InvalidBuffer {
                expected: table.total_size,
                actual: bytes.len(),
            });
        }
        table.rows.insert(index, bytes.to_vec());
        Ok(())
    }

    fn record_count(&self, handle: &TypeHandle) -> CodecResult<u64> {
        let tables = self.tables.read();
        let table = tables.get(&handle.name).ok_or_else(|| unknown_type(&handle.name))?;
        Ok(table.rows.keys().next_back().map_or(0, |last| last + 1))
    }
}

impl TypeCatalog for MemoryStore {
    fn register_type(&self, description: &CompoundTypeDescription) -> CodecResult<()> {
        let mut catalog = self.catalog.write();
        match catalog.get(&description.name) {
            Some(existing) if existing != description => Err(CodecError::SchemaConflict {
                type_name: description.name.clone(),
                reason: "a different description is already registered".to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                catalog.insert(description.name.clone(), description.clone());
                Ok(())
            }
        }
    }

    fn lookup_type(&self, name: &str) -> CodecResult<Option<CompoundTypeDescription>> {
        Ok(self.catalog.read().get(name).cloned())
    }

    fn type_names(&self) -> CodecResult<Vec<SmolStr>> {
        let mut names: Vec<SmolStr> = self.catalog.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritten_rows_read_as_zeros() {
        let store = MemoryStore::new();
        let handle = store.allocate_compound_type("T", 6).unwrap();
        assert_eq!(store.read_raw(&handle, 3).unwrap(), vec![0; 6]);
        assert_eq!(store.record_count(&handle).unwrap(), 0);
        store.write_raw(&handle, 3, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(store.record_count(&handle).unwrap(), 4);
    }

    #[test]
    fn test_reallocation_with_other_size_conflicts() {
        let store = MemoryStore::new();
        store.allocate_compound_type("T", 6).unwrap();
        assert!(store.allocate_compound_type("T", 6).is_ok());
        assert!(matches!(
            store.allocate_compound_type("T", 8),
            Err(CodecError::SchemaConflict { .. })
        ));
    }

    #[test]
    fn test_write_raw_checks_length() {
        let store = MemoryStore::new();
        let handle = store.allocate_compound_type("T", 4).unwrap();
        assert!(matches!(
            store.write_raw(&handle, 0, &[0; 3]),
            Err(CodecError::InvalidBuffer { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_heap_round_trip() {
        let store = MemoryStore::new();
        let a = store.write_variable_length(b"alpha").unwrap();
        let b = store.write_variable_length(b"").unwrap();
        assert_eq!(store.read_variable_length(&a).unwrap(), b"alpha");
        assert_eq!(store.read_variable_length(&b).unwrap(), b"");
        assert!(store.read_variable_length(&VarLenHandle::NULL).is_err());
        assert_eq!(store.heap_len(), 2);
    }
}
