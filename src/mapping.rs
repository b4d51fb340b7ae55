//! Completeness of the binding between disk members and record fields.

use std::collections::BTreeSet;

use smol_str::SmolStr;

use crate::error::{CodecError, CodecResult};
use crate::layout::{MemberBinding, MemberLayout};
use crate::schema::CompoundSchema;

/// Members and fields present on one side only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingAudit {
    /// Disk members the record shape ignores.
    pub unmapped_members: BTreeSet<SmolStr>,
    /// Record fields the disk layout does not supply.
    pub unmapped_fields: BTreeSet<SmolStr>,
}

impl MappingAudit {
    pub fn is_complete(&self) -> bool {
        self.unmapped_members.is_empty() && self.unmapped_fields.is_empty()
    }
}

/// Set difference of disk member names and record field names over the
/// schema's bindings.
pub fn audit(schema: &CompoundSchema) -> MappingAudit {
    let members: BTreeSet<&SmolStr> = schema.members().iter().map(|m| &m.name).collect();
    let bound: BTreeSet<&SmolStr> = schema
        .members()
        .iter()
        .filter(|m| m.is_mapped())
        .map(|m| &m.name)
        .collect();
    let fields: BTreeSet<&SmolStr> = schema.shape().fields().iter().map(|f| &f.name).collect();
    let bound_fields: BTreeSet<&SmolStr> = schema
        .members()
        .iter()
        .filter(|m| matches!(m.binding(), MemberBinding::Field(_)))
        .map(|m| &m.name)
        .collect();

    MappingAudit {
        unmapped_members: members.difference(&bound).map(|n| (*n).clone()).collect(),
        unmapped_fields: fields.difference(&bound_fields).map(|n| (*n).clone()).collect(),
    }
}

/// Fails with [`CodecError::IncompleteMapping`] listing both sides when
/// either is non-empty.
pub fn assert_complete(schema: &CompoundSchema) -> CodecResult<()> {
    let audit = audit(schema);
    if audit.is_complete() {
        return Ok(());
    }
    Err(CodecError::IncompleteMapping {
        type_name: SmolStr::new(schema.name()),
        unmapped_members: audit.unmapped_members.into_iter().collect(),
        unmapped_fields: audit.unmapped_fields.into_iter().collect(),
    })
}

impl CompoundSchema {
    pub fn audit(&self) -> MappingAudit {
        audit(self)
    }

    pub fn assert_complete(&self) -> CodecResult<()> {
        assert_complete(self)
    }

    pub fn is_mapping_incomplete(&self) -> bool {
        !self.audit().is_complete()
    }

    /// Disk members exist that the record shape does not receive.
    pub fn is_memory_representation_incomplete(&self) -> bool {
        self.members().iter().any(|m| !m.is_mapped())
    }

    /// Record fields exist that the disk layout does not supply.
    pub fn is_disk_representation_incomplete(&self) -> bool {
        !self.audit().unmapped_fields.is_empty()
    }

    /// Full layouts of the members no field receives, in storage order.
    pub fn unmapped_member_layouts(&self) -> Vec<&MemberLayout> {
        self.members().iter().filter(|m| !m.is_mapped()).collect()
    }
}
