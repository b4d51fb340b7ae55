//! Process-wide cache of built schemas, keyed by compound type name.

use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::error::{CodecError, CodecResult};
use crate::schema::CompoundSchema;
use crate::serialization::RecordCodec;

/// Shared schema cache.
///
/// Published schemas are read without blocking builders of other names. At
/// most one builder runs per name; concurrent callers for the same name wait
/// for it and receive the published schema.
#[derive(Default)]
pub struct TypeRegistry {
    schemas: RwLock<FxHashMap<SmolStr, Arc<CompoundSchema>>>,
    building: Mutex<FxHashMap<SmolStr, Arc<ReentrantMutex<()>>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CompoundSchema>> {
        self.schemas.read().get(name).cloned()
    }

    /// Cached schema for `name`, building it with `build` on first use.
    ///
    /// A failed build publishes nothing; the next caller builds again under
    /// the same per-name lock. A schema published for `name` while `build`
    /// ran wins: a byte-compatible result returns it, a divergent one is a
    /// [`CodecError::SchemaConflict`].
    pub fn get_or_build<F>(&self, name: &str, build: F) -> CodecResult<Arc<CompoundSchema>>
    where
        F: FnOnce() -> CodecResult<CompoundSchema>,
    {
        if let Some(schema) = self.get(name) {
            return Ok(schema);
        }

        let gate = self.gate(name);
        let result = {
            let _guard = gate.lock();
            // Another builder may have published while we waited.
            match self.get(name) {
                Some(schema) => Ok(schema),
                None => build().and_then(|schema| self.insert_checked(name, schema)),
            }
        };
        self.release(name, &gate);
        result
    }

    /// Publish an already built schema under its own name.
    ///
    /// Re-publishing a byte-compatible layout returns the cached instance;
    /// a divergent layout is a [`CodecError::SchemaConflict`].
    pub fn publish(&self, schema: CompoundSchema) -> CodecResult<Arc<CompoundSchema>> {
        let name = SmolStr::new(schema.name());
        let gate = self.gate(&name);
        let result = {
            let _guard = gate.lock();
            self.insert_checked(&name, schema)
        };
        self.release(&name, &gate);
        result
    }

    /// Per-name lock shared by builders and publishers. Reentrant so a build
    /// closure may publish dependent schemas under the same name.
    fn gate(&self, name: &str) -> Arc<ReentrantMutex<()>> {
        let mut building = self.building.lock();
        let gate = building
            .entry(SmolStr::new(name))
            .or_insert_with(|| Arc::new(ReentrantMutex::new(())));
        Arc::clone(gate)
    }

    /// Drop the gate entry once no other caller holds it. Callers clone the
    /// gate under the `building` lock, so the count cannot grow meanwhile.
    fn release(&self, name: &str, gate: &Arc<ReentrantMutex<()>>) {
        let mut building = self.building.lock();
        if Arc::strong_count(gate) == 2 {
            building.remove(name);
        }
    }

    fn insert_checked(&self, name: &str, schema: CompoundSchema) -> CodecResult<Arc<CompoundSchema>> {
        let mut schemas = self.schemas.write();
        if let Some(existing) = schemas.get(name) {
            if existing.fingerprint() == schema.fingerprint() {
                return Ok(Arc::clone(existing));
            }
            warn!(
                type_name = name,
                cached = existing.fingerprint(),
                offered = schema.fingerprint(),
                "divergent layout offered for a cached compound type"
            );
            return Err(CodecError::SchemaConflict {
                type_name: SmolStr::new(name),
                reason: "a different layout is already registered under this name".to_string(),
            });
        }
        let schema = Arc::new(schema);
        schemas.insert(SmolStr::new(name), Arc::clone(&schema));
        debug!(type_name = name, fingerprint = schema.fingerprint(), "published compound schema");
        Ok(schema)
    }

    pub fn codec(&self, name: &str) -> Option<RecordCodec> {
        self.get(name).map(RecordCodec::new)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<CompoundSchema>> {
        self.schemas.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }

    /// Drop every cached schema. Codecs already handed out keep theirs alive.
    pub fn clear(&self) {
        self.schemas.write().clear();
    }
}
