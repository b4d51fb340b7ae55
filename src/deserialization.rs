use tracing::trace;

use crate::compound_value::CompoundValue;
use crate::error::{CodecError, CodecResult};
use crate::schema::CompoundSchema;
use crate::member_codec::CodecContext;
use crate::serialization::{RecordCodec, codec_of};
use crate::shape::{CompoundRecord, FieldSlot, ShapeKind};
use crate::store::VarLenStore;

impl RecordCodec {
    /// Deserialize a record without variable-length members.
    pub fn deserialize<R: CompoundRecord>(&self, buf: &[u8]) -> CodecResult<R> {
        self.deserialize_inner(buf, None)
    }

    /// Deserialize, reading variable-length content from `heap`.
    pub fn deserialize_with<R: CompoundRecord>(
        &self,
        buf: &[u8],
        heap: &dyn VarLenStore,
    ) -> CodecResult<R> {
        self.deserialize_inner(buf, Some(heap))
    }

    fn deserialize_inner<R: CompoundRecord>(
        &self,
        buf: &[u8],
        heap: Option<&dyn VarLenStore>,
    ) -> CodecResult<R> {
        trace!(type_name = self.schema().name(), bytes = buf.len(), "deserialize record");
        decode_record(self.schema(), buf, &self.context(heap))
    }

    /// Deserialize a contiguous run of records.
    pub fn deserialize_many<R: CompoundRecord>(
        &self,
        buf: &[u8],
        heap: Option<&dyn VarLenStore>,
    ) -> CodecResult<Vec<R>> {
        let size = self.schema().total_size();
        if size == 0 {
            if buf.is_empty() {
                return Ok(Vec::new());
            }
            return Err(CodecError::InvalidBuffer {
                expected: 0,
                actual: buf.len(),
            });
        }
        if buf.len() % size != 0 {
            return Err(CodecError::InvalidBuffer {
                expected: buf.len() - buf.len() % size,
                actual: buf.len(),
            });
        }
        trace!(
            type_name = self.schema().name(),
            records = buf.len() / size,
            "deserialize record run"
        );
        let ctx = self.context(heap);
        buf.chunks_exact(size)
            .map(|window| decode_record(self.schema(), window, &ctx))
            .collect()
    }

    /// Decode a single member from a raw record.
    pub fn read_member(
        &self,
        buf: &[u8],
        name: &str,
        heap: Option<&dyn VarLenStore>,
    ) -> CodecResult<CompoundValue> {
        let schema = self.schema();
        if buf.len() != schema.total_size() {
            return Err(CodecError::InvalidBuffer {
                expected: schema.total_size(),
                actual: buf.len(),
            });
        }
        let member = schema
            .member(name)
            .ok_or_else(|| CodecError::FieldNotFound(name.into()))?;
        codec_of(member)?.decode(member, &buf[member.range()], &self.context(heap))
    }
}

/// Populate a new record from `window`. Unbound members are skipped, except
/// that positional records receive a `Null` placeholder.
pub(crate) fn decode_record<R: CompoundRecord>(
    schema: &CompoundSchema,
    window: &[u8],
    ctx: &CodecContext<'_>,
) -> CodecResult<R> {
    if window.len() != schema.total_size() {
        return Err(CodecError::InvalidBuffer {
            expected: schema.total_size(),
            actual: window.len(),
        });
    }
    let positional = schema.shape().kind() == ShapeKind::Positional;
    let mut record = R::with_slots(schema.len());
    for (position, member) in schema.members().iter().enumerate() {
        let slot = FieldSlot {
            name: &member.name,
            position,
        };
        if !member.is_mapped() {
            if positional {
                record.set_field(slot, CompoundValue::Null)?;
            }
            continue;
        }
        let value = codec_of(member)?.decode(member, &window[member.range()], ctx)?;
        record.set_field(slot, value)?;
    }
    Ok(record)
}
