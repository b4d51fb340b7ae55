use std::fmt::Write as _;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::debug;
use xxhash_rust::const_xxh64::xxh64;

use crate::error::{CodecError, CodecResult};
use crate::layout::{MemberBinding, MemberLayout};
use crate::member_codec::MemberKind;
use crate::resolver::{TypeVariantResolver, check_variant};
use crate::shape::RecordShape;
use crate::types::{CodecConfig, DataClass, MAX_RANK};

/// Name given to schemas whose shape and builder carry none.
pub const ANONYMOUS_TYPE: &str = "<anonymous>";

// ─── CompoundSchema ─────────────────────────────────────────────────────────

/// Immutable, ordered member layouts of one compound type, bound to an
/// in-memory record shape.
///
/// Built once per type and shared read-only (`Arc`) by every codec derived
/// from it.
#[derive(Debug)]
pub struct CompoundSchema {
    name: SmolStr,
    members: Vec<MemberLayout>,
    by_name: FxHashMap<SmolStr, usize>,
    shape: Arc<RecordShape>,
    total_size: usize,
    config: CodecConfig,
    fingerprint: u64,
}

impl CompoundSchema {
    pub fn builder(shape: RecordShape) -> SchemaBuilder {
        SchemaBuilder::new(shape)
    }

    /// Build with default configuration. `layouts` are disk-authoritative when
    /// given; otherwise every declared field gets a synthesized, densely
    /// packed layout.
    pub fn build(shape: RecordShape, layouts: Option<Vec<MemberLayout>>) -> CodecResult<Self> {
        let mut builder = SchemaBuilder::new(shape);
        if let Some(layouts) = layouts {
            builder = builder.layouts(layouts);
        }
        builder.build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in storage order.
    pub fn members(&self) -> &[MemberLayout] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&MemberLayout> {
        self.by_name.get(name).map(|&i| &self.members[i])
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Bytes of one raw record.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn shape(&self) -> &RecordShape {
        &self.shape
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Hash of the storage layout. Equal fingerprints mean byte-compatible
    /// records; names of the record shape do not contribute.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

// ─── SchemaBuilder ──────────────────────────────────────────────────────────

pub struct SchemaBuilder {
    shape: RecordShape,
    name: Option<SmolStr>,
    layouts: Option<Vec<MemberLayout>>,
    config: CodecConfig,
    resolver: TypeVariantResolver,
    infer_missing: bool,
    total_size: Option<usize>,
}

impl SchemaBuilder {
    pub fn new(shape: RecordShape) -> Self {
        Self {
            shape,
            name: None,
            layouts: None,
            config: CodecConfig::default(),
            resolver: TypeVariantResolver::default(),
            infer_missing: false,
            total_size: None,
        }
    }

    /// Compound type name. Defaults to the shape's type name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(SmolStr::new(name));
        self
    }

    /// Disk-authoritative member layouts, e.g. read from a type catalog.
    pub fn layouts(mut self, layouts: Vec<MemberLayout>) -> Self {
        self.layouts = Some(layouts);
        self
    }

    pub fn config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    pub fn resolver(mut self, resolver: TypeVariantResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// With explicit layouts, also synthesize members for declared fields the
    /// layouts lack. They are packed after the highest explicit end offset.
    pub fn infer_missing(mut self, enabled: bool) -> Self {
        self.infer_missing = enabled;
        self
    }

    /// Record size including trailing padding. Must cover every member.
    pub fn total_size(mut self, size: usize) -> Self {
        self.total_size = Some(size);
        self
    }

    pub fn build(self) -> CodecResult<CompoundSchema> {
        let name = self
            .name
            .clone()
            .or_else(|| self.shape.type_name().map(SmolStr::new))
            .unwrap_or_else(|| SmolStr::new_static(ANONYMOUS_TYPE));

        if let Some(dup) = self.shape.duplicate_fields().into_iter().next() {
            return Err(conflict(&name, format!("field '{dup}' is declared twice")));
        }

        let mut members = match self.layouts {
            Some(ref layouts) => {
                let mut members = layouts.clone();
                if self.infer_missing {
                    let start = members.iter().map(MemberLayout::end).max().unwrap_or(0);
                    let missing: Vec<_> = self
                        .shape
                        .fields()
                        .iter()
                        .filter(|f| !layouts.iter().any(|m| m.name == f.name))
                        .collect();
                    members.extend(self.pack(missing.into_iter(), start)?);
                }
                members
            }
            None => self.pack(self.shape.fields().iter(), 0)?,
        };

        let mut by_name = FxHashMap::default();
        for (i, member) in members.iter().enumerate() {
            if by_name.insert(member.name.clone(), i).is_some() {
                return Err(conflict(&name, format!("member '{}' is declared twice", member.name)));
            }
            validate_member(member)?;
        }
        check_overlaps(&name, &members)?;

        let end = members.iter().map(MemberLayout::end).max().unwrap_or(0);
        let total_size = match self.total_size {
            Some(size) if size < end => {
                return Err(conflict(
                    &name,
                    format!("total size {size} is smaller than the member extent {end}"),
                ));
            }
            Some(size) => size,
            None => end,
        };

        for member in &mut members {
            member.kind = Some(MemberKind::select(member, &self.resolver, &self.config)?);
            member.binding = if self.shape.is_open() {
                MemberBinding::Open
            } else {
                self.shape
                    .field(&member.name)
                    .map_or(MemberBinding::Unbound, |(i, _)| MemberBinding::Field(i))
            };
        }

        let fingerprint = fingerprint(&members, total_size, &self.config);
        debug!(
            type_name = %name,
            members = members.len(),
            total_size,
            fingerprint,
            "built compound schema"
        );

        Ok(CompoundSchema {
            name,
            members,
            by_name,
            shape: Arc::new(self.shape),
            total_size,
            config: self.config,
            fingerprint,
        })
    }

    /// Synthesize layouts for `fields`, byte-dense from `start` in
    /// declaration order.
    fn pack<'a>(
        &self,
        fields: impl Iterator<Item = &'a crate::shape::FieldDef>,
        start: usize,
    ) -> CodecResult<Vec<MemberLayout>> {
        let mut offset = start;
        let mut packed = Vec::new();
        for field in fields {
            let layout = self.resolver.infer(&field.name, &field.ty, &self.config)?.at(offset);
            offset = layout.end();
            packed.push(layout);
        }
        Ok(packed)
    }
}

fn conflict(type_name: &SmolStr, reason: String) -> CodecError {
    CodecError::SchemaConflict {
        type_name: type_name.clone(),
        reason,
    }
}

fn validate_member(member: &MemberLayout) -> CodecResult<()> {
    check_variant(&member.name, member.data_class, member.variant)?;
    let invalid = |reason: &str| CodecError::InvalidLayout {
        member: member.name.clone(),
        reason: reason.to_string(),
    };
    if member.element_size == 0 {
        return Err(invalid("element size is zero"));
    }
    if member.rank() > MAX_RANK {
        return Err(invalid("rank exceeds the supported maximum"));
    }
    if member.is_array_type() {
        if member.is_variable_length() {
            return Err(invalid("variable-length members cannot have dimensions"));
        }
        if member.number_of_elements() == 0 {
            return Err(invalid("array with a zero extent"));
        }
    }
    if member.data_class == DataClass::Enum && member.is_variable_length() {
        return Err(invalid("enum members must have a fixed width"));
    }
    if member.data_class == DataClass::Compound {
        if let Some(nested) = &member.nested {
            if nested.total_size() as i64 != member.element_size {
                return Err(invalid("element size differs from the nested compound size"));
            }
        }
    }
    Ok(())
}

fn check_overlaps(type_name: &SmolStr, members: &[MemberLayout]) -> CodecResult<()> {
    let mut ranges: Vec<(usize, usize, &str)> = members
        .iter()
        .map(|m| (m.offset, m.end(), m.name.as_str()))
        .collect();
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        let (_, prev_end, prev) = pair[0];
        let (start, _, next) = pair[1];
        if start < prev_end {
            return Err(conflict(
                type_name,
                format!("members '{prev}' and '{next}' overlap at byte {start}"),
            ));
        }
    }
    Ok(())
}

fn fingerprint(members: &[MemberLayout], total_size: usize, config: &CodecConfig) -> u64 {
    let mut canonical = String::with_capacity(members.len() * 32);
    let _ = write!(canonical, "{total_size}|{:?}", config.byte_order);
    for m in members {
        let _ = write!(
            canonical,
            "|{}@{}:{:?}/{}/{}/{:?}/{:?}/{:?}",
            m.name, m.offset, m.data_class, m.element_size, m.signed, m.dimensions, m.encoding, m.variant
        );
        if let Some(ty) = &m.enum_type {
            let _ = write!(canonical, "/enum:{}{:?}", ty.name(), ty.values());
        }
        if let Some(nested) = &m.nested {
            let _ = write!(canonical, "/nested:{}", nested.fingerprint());
        }
    }
    xxh64(canonical.as_bytes(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{FieldDef, FieldType};
    use crate::types::{TimeUnit, TypeVariant};

    fn event_layouts() -> Vec<MemberLayout> {
        vec![
            MemberLayout::integer("id", 0, 4),
            MemberLayout::string("label", 4, 8),
            MemberLayout::timestamp("createdAt", 12, TimeUnit::Milliseconds),
        ]
    }

    #[test]
    fn test_explicit_layouts_keep_offsets() {
        let schema = CompoundSchema::build(RecordShape::open_map(), Some(event_layouts())).unwrap();
        assert_eq!(schema.total_size(), 20);
        assert_eq!(schema.member("label").map(|m| m.offset), Some(4));
        assert_eq!(schema.name(), ANONYMOUS_TYPE);
        assert!(schema.members().iter().all(|m| m.binding() == MemberBinding::Open));
    }

    #[test]
    fn test_inferred_layout_is_byte_dense() {
        let shape = RecordShape::reflected(
            "Packed",
            vec![
                FieldDef::new("flag", FieldType::Bool),
                FieldDef::new("value", FieldType::f64()),
                FieldDef::new("count", FieldType::u16()),
            ],
        );
        let schema = CompoundSchema::build(shape, None).unwrap();
        let offsets: Vec<usize> = schema.members().iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 1, 9]);
        assert_eq!(schema.total_size(), 11);
        assert_eq!(schema.name(), "Packed");
    }

    #[test]
    fn test_total_size_is_sum_of_footprints() {
        let shape = RecordShape::map(vec![
            FieldDef::new("a", FieldType::i32()),
            FieldDef::new("note", FieldType::VarString { encoding: None }),
            FieldDef::new("grid", FieldType::array(FieldType::f32(), &[2, 3])),
        ]);
        let schema = CompoundSchema::build(shape, None).unwrap();
        let sum: usize = schema.members().iter().map(|m| m.footprint()).sum();
        assert_eq!(schema.total_size(), sum);
        assert_eq!(sum, 4 + crate::types::VL_HANDLE_SIZE + 24);
    }

    #[test]
    fn test_duplicate_member_is_conflict() {
        let layouts = vec![MemberLayout::integer("a", 0, 4), MemberLayout::integer("a", 4, 4)];
        let err = CompoundSchema::build(RecordShape::open_map(), Some(layouts)).unwrap_err();
        assert!(matches!(err, CodecError::SchemaConflict { .. }));
    }

    #[test]
    fn test_overlapping_members_is_conflict() {
        let layouts = vec![MemberLayout::integer("a", 0, 8), MemberLayout::integer("b", 4, 4)];
        let err = CompoundSchema::build(RecordShape::open_map(), Some(layouts)).unwrap_err();
        match err {
            CodecError::SchemaConflict { reason, .. } => assert!(reason.contains("overlap")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_variant_on_float_rejected_at_build() {
        let layouts = vec![
            MemberLayout::float("t", 0, 8).with_variant(TypeVariant::Timestamp(TimeUnit::Seconds)),
        ];
        let err = CompoundSchema::build(RecordShape::open_map(), Some(layouts)).unwrap_err();
        assert!(matches!(err, CodecError::VariantConflict { .. }));
    }

    #[test]
    fn test_infer_missing_appends_after_extent() {
        let shape = RecordShape::reflected(
            "Event",
            vec![
                FieldDef::new("id", FieldType::i32()),
                FieldDef::new("score", FieldType::f32()),
            ],
        );
        let schema = SchemaBuilder::new(shape)
            .layouts(vec![MemberLayout::integer("id", 0, 4), MemberLayout::integer("pad", 8, 4)])
            .infer_missing(true)
            .build()
            .unwrap();
        assert_eq!(schema.member("score").map(|m| m.offset), Some(12));
        assert_eq!(schema.total_size(), 16);
    }

    #[test]
    fn test_explicit_total_size_adds_padding() {
        let schema = SchemaBuilder::new(RecordShape::open_map())
            .layouts(vec![MemberLayout::integer("a", 0, 2)])
            .total_size(8)
            .build()
            .unwrap();
        assert_eq!(schema.total_size(), 8);
        assert!(
            SchemaBuilder::new(RecordShape::open_map())
                .layouts(vec![MemberLayout::integer("a", 0, 4)])
                .total_size(2)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_fingerprint_tracks_layout_only() {
        let a = CompoundSchema::build(RecordShape::open_map(), Some(event_layouts())).unwrap();
        let b = SchemaBuilder::new(RecordShape::open_positional())
            .name("Other")
            .layouts(event_layouts())
            .build()
            .unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        let mut changed = event_layouts();
        changed[0] = MemberLayout::integer("id", 0, 4).signed(false);
        let c = CompoundSchema::build(RecordShape::open_map(), Some(changed)).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
