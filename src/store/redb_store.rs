use std::path::Path;

use lru::LruCache;
use parking_lot::Mutex;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use smol_str::SmolStr;
use tracing::debug;

use super::types::{
    BinaryStore, CompoundTypeDescription, StoreConfig, TypeCatalog, TypeHandle, VarLenHandle,
    VarLenStore,
};
use crate::error::{CodecError, CodecResult};

// Table definitions
// Key: (type name, record index)
// Value: raw record bytes
const RECORDS_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("records");
// Key: type name, Value: bytes per record
const ALLOCATIONS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("allocations");
// Key: heap object key, Value: variable-length content
const HEAP_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("vl_heap");
// Key: type name, Value: CBOR-encoded CompoundTypeDescription
const TYPES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("compound_types");

type RowKey = (SmolStr, u64);

/// redb-backed reference store with an LRU cache of raw rows.
pub struct RedbStore {
    db: Database,
    rows: Mutex<LruCache<RowKey, Vec<u8>>>,
}

impl RedbStore {
    /// Open or create the database at `path` with default configuration.
    pub fn open(path: impl AsRef<Path>) -> CodecResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Open or create the database at `path`.
    /// Also ensures that the required tables exist.
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> CodecResult<Self> {
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORDS_TABLE)?;
            let _ = write_txn.open_table(ALLOCATIONS_TABLE)?;
            let _ = write_txn.open_table(HEAP_TABLE)?;
            let _ = write_txn.open_table(TYPES_TABLE)?;
        }
        write_txn.commit()?;

        debug!(cache_capacity = config.cache_capacity.get(), "opened redb store");
        Ok(Self {
            db,
            rows: Mutex::new(LruCache::new(config.cache_capacity)),
        })
    }

    fn allocation(&self, name: &str) -> CodecResult<Option<usize>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ALLOCATIONS_TABLE)?;
        Ok(table.get(name)?.map(|size| size.value() as usize))
    }
}

fn unknown_type(name: &str) -> CodecError {
    CodecError::Store(format!("compound type '{name}' is not allocated"))
}

impl VarLenStore for RedbStore {
    fn write_variable_length(&self, bytes: &[u8]) -> CodecResult<VarLenHandle> {
        let write_txn = self.db.begin_write()?;
        let handle = {
            let mut table = write_txn.open_table(HEAP_TABLE)?;
            let key = table.last()?.map_or(0, |(k, _)| k.value() + 1);
            let handle = VarLenHandle::from_key(key, bytes.len())?;
            table.insert(key, bytes)?;
            handle
        };
        write_txn.commit()?;
        Ok(handle)
    }

    fn read_variable_length(&self, handle: &VarLenHandle) -> CodecResult<Vec<u8>> {
        let dangling = || CodecError::Store(format!("dangling variable-length handle {handle:?}"));
        let key = handle.key().ok_or_else(dangling)?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HEAP_TABLE)?;
        let bytes = table.get(key)?.map(|v| v.value().to_vec()).ok_or_else(dangling)?;
        if bytes.len() != handle.length as usize {
            return Err(dangling());
        }
        Ok(bytes)
    }
}

impl BinaryStore for RedbStore {
    fn allocate_compound_type(&self, name: &str, total_size: usize) -> CodecResult<TypeHandle> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ALLOCATIONS_TABLE)?;
            let existing = table.get(name)?.map(|size| size.value());
            match existing {
                Some(size) if size != total_size as u64 => {
                    return Err(CodecError::SchemaConflict {
                        type_name: SmolStr::new(name),
                        reason: format!(
                            "allocated with {size} bytes per record, requested {total_size}"
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    table.insert(name, total_size as u64)?;
                }
            }
        }
        write_txn.commit()?;
        Ok(TypeHandle {
            name: SmolStr::new(name),
            total_size,
        })
    }

    fn read_raw(&self, handle: &TypeHandle, index: u64) -> CodecResult<Vec<u8>> {
        let key = (handle.name.clone(), index);
        if let Some(row) = self.rows.lock().get(&key) {
            return Ok(row.clone());
        }
        if self.allocation(&handle.name)?.is_none() {
            return Err(unknown_type(&handle.name));
        }
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECORDS_TABLE)?;
        match table.get((handle.name.as_str(), index))? {
            Some(access) => {
                let row = access.value().to_vec();
                self.rows.lock().put(key, row.clone());
                Ok(row)
            }
            None => Ok(vec![0; handle.total_size]),
        }
    }

    fn write_raw(&self, handle: &TypeHandle, index: u64, bytes: &[u8]) -> CodecResult<()> {
        let allocated = self
            .allocation(&handle.name)?
            .ok_or_else(|| unknown_type(&handle.name))?;
        if bytes.len() != allocated {
            return Err(CodecError::InvalidBuffer {
                expected: allocated,
                actual: bytes.len(),
            });
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RECORDS_TABLE)?;
            table.insert((handle.name.as_str(), index), bytes)?;
        }
        write_txn.commit()?;
        self.rows
            .lock()
            .put((handle.name.clone(), index), bytes.to_vec());
        Ok(())
    }

    fn record_count(&self, handle: &TypeHandle) -> CodecResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECORDS_TABLE)?;
        let name = handle.name.as_str();
        let last = table.range((name, 0)..=(name, u64::MAX))?.next_back();
        match last {
            Some(entry) => {
                let (key, _) = entry?;
                Ok(key.value().1 + 1)
            }
            None => Ok(0),
        }
    }
}

impl TypeCatalog for RedbStore {
    fn register_type(&self, description: &CompoundTypeDescription) -> CodecResult<()> {
        if let Some(existing) = self.lookup_type(&description.name)? {
            if &existing != description {
                return Err(CodecError::SchemaConflict {
                    type_name: description.name.clone(),
                    reason: "a different description is already registered".to_string(),
                });
            }
            return Ok(());
        }
        let bytes = cbor4ii::serde::to_vec(Vec::new(), description)
            .map_err(|e| CodecError::Cbor(format!("{e:?}")))?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TYPES_TABLE)?;
            table.insert(description.name.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        debug!(type_name = %description.name, "registered compound type");
        Ok(())
    }

    fn lookup_type(&self, name: &str) -> CodecResult<Option<CompoundTypeDescription>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TYPES_TABLE)?;
        let Some(access) = table.get(name)? else {
            return Ok(None);
        };
        let description = cbor4ii::serde::from_slice(access.value())
            .map_err(|e| CodecError::Cbor(format!("{e:?}")))?;
        Ok(Some(description))
    }

    fn type_names(&self) -> CodecResult<Vec<SmolStr>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TYPES_TABLE)?;
        let mut names = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            names.push(SmolStr::new(key.value()));
        }
        Ok(names)
    }
}
