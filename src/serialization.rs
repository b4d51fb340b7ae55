use std::sync::Arc;

use tracing::trace;

use crate::compound_value::CompoundValue;
use crate::error::{CodecError, CodecResult};
use crate::layout::MemberLayout;
use crate::member_codec::{CodecContext, MemberKind};
use crate::schema::CompoundSchema;
use crate::shape::{CompoundRecord, FieldSlot};
use crate::store::VarLenStore;

// ─── RecordCodec ────────────────────────────────────────────────────────────

/// Serializes records to, and from, raw buffers of one compound type.
///
/// Stateless apart from the shared schema: construct per call or keep one
/// next to the schema, both are cheap.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    schema: Arc<CompoundSchema>,
}

impl RecordCodec {
    pub fn new(schema: Arc<CompoundSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<CompoundSchema> {
        &self.schema
    }

    pub(crate) fn context<'a>(&self, heap: Option<&'a dyn VarLenStore>) -> CodecContext<'a> {
        CodecContext::new(self.schema.config().byte_order, heap)
    }

    /// Serialize a record without variable-length members.
    pub fn serialize<R: CompoundRecord>(&self, record: &R) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize_into(record, &mut buf, None)?;
        Ok(buf)
    }

    /// Serialize, writing variable-length content to `heap`.
    pub fn serialize_with<R: CompoundRecord>(
        &self,
        record: &R,
        heap: &dyn VarLenStore,
    ) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize_into(record, &mut buf, Some(heap))?;
        Ok(buf)
    }

    /// Serialize into a reusable buffer.
    ///
    /// Identical to [`serialize`](Self::serialize), but reuses the caller's
    /// Vec to avoid an allocation per record. The buffer is cleared and
    /// zero-filled to the schema size first.
    pub fn serialize_into<R: CompoundRecord>(
        &self,
        record: &R,
        buf: &mut Vec<u8>,
        heap: Option<&dyn VarLenStore>,
    ) -> CodecResult<()> {
        buf.clear();
        buf.resize(self.schema.total_size(), 0);
        trace!(type_name = self.schema.name(), bytes = buf.len(), "serialize record");
        encode_record(&self.schema, record, buf, &self.context(heap))
    }

    /// Serialize `records` back to back into one contiguous buffer.
    pub fn serialize_many<R: CompoundRecord>(
        &self,
        records: &[R],
        heap: Option<&dyn VarLenStore>,
    ) -> CodecResult<Vec<u8>> {
        let size = self.schema.total_size();
        let mut buf = vec![0u8; size * records.len()];
        let ctx = self.context(heap);
        trace!(
            type_name = self.schema.name(),
            records = records.len(),
            "serialize record run"
        );
        if size == 0 {
            return Ok(buf);
        }
        for (record, window) in records.iter().zip(buf.chunks_exact_mut(size)) {
            encode_record(&self.schema, record, window, &ctx)?;
        }
        Ok(buf)
    }
}

/// Encode every bound member of `record` into `window`, which spans exactly
/// one raw record.
pub(crate) fn encode_record<R: CompoundRecord>(
    schema: &CompoundSchema,
    record: &R,
    window: &mut [u8],
    ctx: &CodecContext<'_>,
) -> CodecResult<()> {
    if window.len() != schema.total_size() {
        return Err(CodecError::InvalidBuffer {
            expected: schema.total_size(),
            actual: window.len(),
        });
    }
    for (position, member) in schema.members().iter().enumerate() {
        if !member.is_mapped() {
            continue;
        }
        let slot = FieldSlot {
            name: &member.name,
            position,
        };
        // Absent values are written as zeros.
        let value = record.get_field(slot).unwrap_or(CompoundValue::Null);
        codec_of(member)?.encode(member, &value, &mut window[member.range()], ctx)?;
    }
    Ok(())
}

pub(crate) fn codec_of(member: &MemberLayout) -> CodecResult<&MemberKind> {
    member.kind().ok_or_else(|| CodecError::InvalidLayout {
        member: member.name.clone(),
        reason: "member was not prepared by a schema builder".to_string(),
    })
}
