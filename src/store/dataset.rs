use std::sync::Arc;

use super::types::{BinaryStore, CompoundTypeDescription, TypeCatalog, TypeHandle, VarLenStore};
use crate::error::{CodecError, CodecResult};
use crate::registry::TypeRegistry;
use crate::schema::CompoundSchema;
use crate::serialization::RecordCodec;
use crate::shape::{CompoundRecord, RecordShape};

/// Records of one compound type kept in a [`BinaryStore`].
pub struct CompoundDataset<S> {
    store: Arc<S>,
    handle: TypeHandle,
    codec: RecordCodec,
}

impl<S: BinaryStore + TypeCatalog> CompoundDataset<S> {
    /// Register the schema's type in the catalog and allocate its storage.
    pub fn create(store: Arc<S>, schema: Arc<CompoundSchema>) -> CodecResult<Self> {
        store.register_type(&CompoundTypeDescription::from_schema(&schema))?;
        let handle = store.allocate_compound_type(schema.name(), schema.total_size())?;
        Ok(Self {
            store,
            handle,
            codec: RecordCodec::new(schema),
        })
    }

    /// Open an existing type. The stored layout is authoritative; `shape`
    /// only decides which members the records receive.
    pub fn open(store: Arc<S>, name: &str, shape: RecordShape) -> CodecResult<Self> {
        let schema = Arc::new(Self::stored_schema(&store, name, shape)?);
        Self::attach(store, schema)
    }

    /// Like [`open`](Self::open), sharing the schema through `registry`.
    pub fn open_cached(
        store: Arc<S>,
        registry: &TypeRegistry,
        name: &str,
        shape: RecordShape,
    ) -> CodecResult<Self> {
        let schema = registry.get_or_build(name, || Self::stored_schema(&store, name, shape))?;
        Self::attach(store, schema)
    }

    fn stored_schema(store: &S, name: &str, shape: RecordShape) -> CodecResult<CompoundSchema> {
        store
            .lookup_type(name)?
            .ok_or_else(|| CodecError::Store(format!("compound type '{name}' is not in the catalog")))?
            .to_schema(shape)
    }

    fn attach(store: Arc<S>, schema: Arc<CompoundSchema>) -> CodecResult<Self> {
        let handle = store.allocate_compound_type(schema.name(), schema.total_size())?;
        Ok(Self {
            store,
            handle,
            codec: RecordCodec::new(schema),
        })
    }

    pub fn schema(&self) -> &Arc<CompoundSchema> {
        self.codec.schema()
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    fn heap(&self) -> &dyn VarLenStore {
        self.store.as_ref()
    }

    pub fn write<R: CompoundRecord>(&self, index: u64, record: &R) -> CodecResult<()> {
        let bytes = self.codec.serialize_with(record, self.heap())?;
        self.store.write_raw(&self.handle, index, &bytes)
    }

    pub fn read<R: CompoundRecord>(&self, index: u64) -> CodecResult<R> {
        let bytes = self.store.read_raw(&self.handle, index)?;
        self.codec.deserialize_with(&bytes, self.heap())
    }

    /// Write `records` at consecutive indices starting at `start`.
    pub fn write_all<R: CompoundRecord>(&self, start: u64, records: &[R]) -> CodecResult<()> {
        let size = self.schema().total_size();
        let bytes = self.codec.serialize_many(records, Some(self.heap()))?;
        if size == 0 {
            return Ok(());
        }
        for (index, row) in (start..).zip(bytes.chunks_exact(size)) {
            self.store.write_raw(&self.handle, index, row)?;
        }
        Ok(())
    }

    pub fn read_range<R: CompoundRecord>(&self, start: u64, count: u64) -> CodecResult<Vec<R>> {
        (start..start + count).map(|index| self.read(index)).collect()
    }

    /// One past the highest written index.
    pub fn len(&self) -> CodecResult<u64> {
        self.store.record_count(&self.handle)
    }

    pub fn is_empty(&self) -> CodecResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound_map;
    use crate::compound_value::CompoundMap;
    use crate::layout::MemberLayout;
    use crate::shape::{FieldDef, FieldType};
    use crate::store::{MemoryStore, RedbStore};
    use crate::types::TimeUnit;
    use tempfile::NamedTempFile;

    fn sensor_schema() -> Arc<CompoundSchema> {
        let schema = CompoundSchema::builder(RecordShape::open_map())
            .name("Sensor")
            .layouts(vec![
                MemberLayout::integer("id", 0, 4),
                MemberLayout::string("site", 4, 8),
                MemberLayout::timestamp("seen", 12, TimeUnit::Seconds),
                MemberLayout::new("note", 20, crate::types::DataClass::String, -1),
            ])
            .build()
            .unwrap();
        Arc::new(schema)
    }

    #[test]
    fn test_memory_dataset_write_read() {
        let store = Arc::new(MemoryStore::new());
        let dataset = CompoundDataset::create(Arc::clone(&store), sensor_schema()).unwrap();
        assert!(dataset.is_empty().unwrap());

        let record = compound_map!({ "id" => 1i32, "site" => "north", "note" => "calibrated" });
        dataset.write(0, &record).unwrap();
        let back: CompoundMap = dataset.read(0).unwrap();
        assert_eq!(back.get("site").and_then(|v| v.as_str()), Some("north"));
        assert_eq!(back.get("note").and_then(|v| v.as_str()), Some("calibrated"));
        assert_eq!(dataset.len().unwrap(), 1);
    }

    #[test]
    fn test_open_uses_stored_layout() {
        let store = Arc::new(MemoryStore::new());
        let dataset = CompoundDataset::create(Arc::clone(&store), sensor_schema()).unwrap();
        dataset
            .write(0, &compound_map!({ "id" => 9i32, "site" => "east" }))
            .unwrap();

        // The reader only declares one field; the rest stay unmapped.
        let shape = RecordShape::map(vec![FieldDef::new("id", FieldType::i32())]);
        let reader = CompoundDataset::open(Arc::clone(&store), "Sensor", shape).unwrap();
        assert!(reader.schema().is_mapping_incomplete());
        let back: CompoundMap = reader.read(0).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.get("id").and_then(|v| v.as_i64()), Some(9));

        assert!(CompoundDataset::open(store, "Missing", RecordShape::open_map()).is_err());
    }

    #[test]
    fn test_open_cached_shares_schema() {
        let store = Arc::new(MemoryStore::new());
        CompoundDataset::create(Arc::clone(&store), sensor_schema()).unwrap();
        let registry = TypeRegistry::new();
        let a = CompoundDataset::open_cached(Arc::clone(&store), &registry, "Sensor", RecordShape::open_map())
            .unwrap();
        let b = CompoundDataset::open_cached(store, &registry, "Sensor", RecordShape::open_map()).unwrap();
        assert!(Arc::ptr_eq(a.schema(), b.schema()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_redb_dataset_persists_rows() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_file = NamedTempFile::new()?;
        let records: Vec<CompoundMap> = (0..3i32)
            .map(|i| compound_map!({ "id" => i, "site" => "lab", "note" => "row" }))
            .collect();
        {
            let store = Arc::new(RedbStore::open(tmp_file.path())?);
            let dataset = CompoundDataset::create(store, sensor_schema())?;
            dataset.write_all(0, &records)?;
            assert_eq!(dataset.len()?, 3);
        }

        let store = Arc::new(RedbStore::open(tmp_file.path())?);
        let dataset = CompoundDataset::open(store, "Sensor", RecordShape::open_map())?;
        let back: Vec<CompoundMap> = dataset.read_range(0, 3)?;
        assert_eq!(back.len(), 3);
        assert_eq!(back[2].get("id").and_then(|v| v.as_i64()), Some(2));
        assert_eq!(back[1].get("note").and_then(|v| v.as_str()), Some("row"));
        Ok(())
    }
}
