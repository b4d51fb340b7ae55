use std::hint::black_box;
use std::sync::Arc;

use compound_codec::compound_map;
use compound_codec::store::MemoryStore;
use compound_codec::{
    CompoundMap, CompoundSchema, EnumType, FieldDef, FieldType, MdArray, RecordCodec, RecordShape,
    TimeUnit, TypeRegistry,
};
use criterion::{Criterion, criterion_group, criterion_main};

// ─── Test Data ──────────────────────────────────────────────────────────────

/// Sensor reading with one member of each common kind:
/// id i64, station string(15), taken timestamp(ms), level enum,
/// temperature f64, samples u16[4][4], valid bool.
fn reading_shape() -> RecordShape {
    let levels = Arc::new(EnumType::new("levels", &["LOW", "NORMAL", "HIGH"]).unwrap());
    RecordShape::map(vec![
        FieldDef::new("id", FieldType::i64()),
        FieldDef::new("station", FieldType::string(15)),
        FieldDef::new("taken", FieldType::Timestamp(Some(TimeUnit::Milliseconds))),
        FieldDef::new("level", FieldType::Enum(levels)),
        FieldDef::new("temperature", FieldType::f64()),
        FieldDef::new("samples", FieldType::array(FieldType::u16(), &[4, 4])),
        FieldDef::new("valid", FieldType::Bool),
    ])
}

fn reading_codec() -> RecordCodec {
    RecordCodec::new(Arc::new(CompoundSchema::build(reading_shape(), None).unwrap()))
}

fn make_reading(i: i64) -> CompoundMap {
    let samples = MdArray::new(&[4, 4], (0..16u16).map(Into::into).collect()).unwrap();
    let taken = chrono::DateTime::from_timestamp_millis(1_700_000_000_000 + i).unwrap();
    compound_map!({
        "id" => i,
        "station" => "ridge-07",
        "taken" => taken,
        "level" => "NORMAL",
        "temperature" => 21.5f64,
        "samples" => samples,
        "valid" => true,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 1: Building schemas
// ═══════════════════════════════════════════════════════════════════════════

fn bench_building_schema(c: &mut Criterion) {
    let mut group = c.benchmark_group("building_schema");

    group.bench_function("CompoundSchema::build (inferred)", |b| {
        b.iter(|| CompoundSchema::build(black_box(reading_shape()), None).unwrap())
    });

    let registry = TypeRegistry::new();
    group.bench_function("TypeRegistry::get_or_build (cached)", |b| {
        b.iter(|| {
            registry
                .get_or_build(black_box("Reading"), || CompoundSchema::build(reading_shape(), None))
                .unwrap()
        })
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 2: Single records
// ═══════════════════════════════════════════════════════════════════════════

fn bench_single_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_record");
    group.sample_size(500);

    let codec = reading_codec();
    let record = make_reading(1);
    let bytes = codec.serialize(&record).unwrap();

    group.bench_function("serialize", |b| {
        b.iter(|| codec.serialize(black_box(&record)).unwrap())
    });

    group.bench_function("serialize_into (reused buffer)", |b| {
        let mut buf = Vec::with_capacity(bytes.len());
        b.iter(|| {
            codec
                .serialize_into(black_box(&record), &mut buf, None)
                .unwrap();
            black_box(buf.len())
        })
    });

    group.bench_function("deserialize", |b| {
        b.iter(|| codec.deserialize::<CompoundMap>(black_box(&bytes)).unwrap())
    });

    group.bench_function("read_member", |b| {
        b.iter(|| codec.read_member(black_box(&bytes), black_box("temperature"), None).unwrap())
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 3: Batches and variable-length members
// ═══════════════════════════════════════════════════════════════════════════

fn bench_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("batches");

    let codec = reading_codec();
    let records: Vec<CompoundMap> = (0..1000).map(make_reading).collect();
    let bytes = codec.serialize_many(&records, None).unwrap();

    group.bench_function("serialize_many (1000)", |b| {
        b.iter(|| codec.serialize_many(black_box(&records), None).unwrap())
    });

    group.bench_function("deserialize_many (1000)", |b| {
        b.iter(|| {
            codec
                .deserialize_many::<CompoundMap>(black_box(&bytes), None)
                .unwrap()
        })
    });

    let vl_shape = RecordShape::map(vec![
        FieldDef::new("id", FieldType::i64()),
        FieldDef::new("comment", FieldType::VarString { encoding: None }),
    ]);
    let vl_codec = RecordCodec::new(Arc::new(CompoundSchema::build(vl_shape, None).unwrap()));
    let store = MemoryStore::new();
    let vl_record = compound_map!({ "id" => 1i64, "comment" => "a comment of moderate length" });
    let vl_bytes = vl_codec.serialize_with(&vl_record, &store).unwrap();

    group.bench_function("serialize_with (variable-length)", |b| {
        b.iter(|| vl_codec.serialize_with(black_box(&vl_record), &store).unwrap())
    });

    group.bench_function("deserialize_with (variable-length)", |b| {
        b.iter(|| {
            vl_codec
                .deserialize_with::<CompoundMap>(black_box(&vl_bytes), &store)
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_building_schema, bench_single_record, bench_batches);
criterion_main!(benches);
