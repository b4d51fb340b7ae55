use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, SerializeStruct, Serializer};
use smol_str::SmolStr;

use crate::error::CodecError;
use crate::types::{Dims, MAX_RANK, TimeUnit};

pub type FastMap<K, V> = BTreeMap<K, V>;

/// A dynamic record: member name to value.
pub type CompoundMap = FastMap<SmolStr, CompoundValue>;

// ─── CompoundNumber ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq)]
pub enum CompoundNumber {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl fmt::Debug for CompoundNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompoundNumber::I64(i) => write!(f, "I64({})", i),
            CompoundNumber::U64(u) => write!(f, "U64({})", u),
            CompoundNumber::F64(v) => write!(f, "F64({})", v),
        }
    }
}

impl CompoundNumber {
    pub fn as_f64(self) -> f64 {
        match self {
            CompoundNumber::I64(i) => i as f64,
            CompoundNumber::U64(u) => u as f64,
            CompoundNumber::F64(f) => f,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            CompoundNumber::I64(i) => Some(i),
            CompoundNumber::U64(u) => i64::try_from(u).ok(),
            CompoundNumber::F64(f) => {
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Some(f as i64)
                } else {
                    None
                }
            }
        }
    }

    pub fn as_u64(self) -> Option<u64> {
        match self {
            CompoundNumber::U64(u) => Some(u),
            CompoundNumber::I64(i) => u64::try_from(i).ok(),
            CompoundNumber::F64(f) => {
                if f.fract() == 0.0 && f >= 0.0 && f <= u64::MAX as f64 {
                    Some(f as u64)
                } else {
                    None
                }
            }
        }
    }
}

// ─── EnumValue ──────────────────────────────────────────────────────────────

/// Value of an enum member.
///
/// A code with no entry in the reader's ordinal table decodes to
/// `Unrecognized` so callers can tell version skew apart from a real value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumValue {
    Known { ordinal: usize, name: SmolStr },
    Unrecognized(i64),
}

impl EnumValue {
    pub fn name(&self) -> Option<&str> {
        match self {
            EnumValue::Known { name, .. } => Some(name.as_str()),
            EnumValue::Unrecognized(_) => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, EnumValue::Known { .. })
    }
}

// ─── TimeDuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeDuration {
    pub value: i64,
    pub unit: TimeUnit,
}

impl TimeDuration {
    pub fn new(value: i64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    /// Express this duration in `unit`, truncating towards zero.
    pub fn convert_to(self, unit: TimeUnit) -> Option<TimeDuration> {
        unit.convert(self.value, self.unit)
            .map(|value| TimeDuration { value, unit })
    }
}

impl fmt::Display for TimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.abbreviation())
    }
}

// ─── MdArray ────────────────────────────────────────────────────────────────

/// A (possibly multi-dimensional) array, stored flat in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct MdArray {
    dims: Dims,
    values: Vec<CompoundValue>,
}

impl MdArray {
    /// `None` if the extents do not multiply to `values.len()` or the rank
    /// exceeds [`MAX_RANK`].
    pub fn new(dims: &[usize], values: Vec<CompoundValue>) -> Option<Self> {
        if dims.len() > MAX_RANK || dims.iter().product::<usize>() != values.len() {
            return None;
        }
        let dims = dims.iter().copied().collect();
        Some(Self { dims, values })
    }

    /// Rank-1 array over `values`.
    pub fn from_flat(values: Vec<CompoundValue>) -> Self {
        let mut dims = Dims::new();
        dims.push(values.len());
        Self { dims, values }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn values(&self) -> &[CompoundValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<CompoundValue> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ─── CompoundValue ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CompoundValue {
    #[default]
    Null,
    Bool(bool),
    Number(CompoundNumber),
    Str(SmolStr),
    Enum(EnumValue),
    /// Bit set, least significant word first.
    BitField(Vec<u64>),
    Timestamp(DateTime<Utc>),
    Duration(TimeDuration),
    Bytes(Vec<u8>),
    Array(MdArray),
    Compound(CompoundMap),
}

impl CompoundValue {
    /// Short name of the value kind, used in type-mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CompoundValue::Null => "null",
            CompoundValue::Bool(_) => "bool",
            CompoundValue::Number(CompoundNumber::I64(_)) => "i64",
            CompoundValue::Number(CompoundNumber::U64(_)) => "u64",
            CompoundValue::Number(CompoundNumber::F64(_)) => "f64",
            CompoundValue::Str(_) => "string",
            CompoundValue::Enum(_) => "enum",
            CompoundValue::BitField(_) => "bitfield",
            CompoundValue::Timestamp(_) => "timestamp",
            CompoundValue::Duration(_) => "duration",
            CompoundValue::Bytes(_) => "bytes",
            CompoundValue::Array(_) => "array",
            CompoundValue::Compound(_) => "compound",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CompoundValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CompoundValue::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CompoundValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            CompoundValue::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CompoundValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            CompoundValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Milliseconds since the epoch of a timestamp value.
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.as_timestamp().map(|t| t.timestamp_millis())
    }

    pub fn as_duration(&self) -> Option<TimeDuration> {
        match self {
            CompoundValue::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            CompoundValue::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&CompoundMap> {
        match self {
            CompoundValue::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&MdArray> {
        match self {
            CompoundValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CompoundValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&CompoundValue> {
        self.as_compound()?.get(key)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CompoundValue::Null)
    }
}

// ─── Serialize ──────────────────────────────────────────────────────────────

impl Serialize for CompoundValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CompoundValue::Null => serializer.serialize_none(),
            CompoundValue::Bool(b) => serializer.serialize_bool(*b),
            CompoundValue::Number(n) => match n {
                CompoundNumber::I64(i) => serializer.serialize_i64(*i),
                CompoundNumber::U64(u) => serializer.serialize_u64(*u),
                CompoundNumber::F64(f) => serializer.serialize_f64(*f),
            },
            CompoundValue::Str(s) => serializer.serialize_str(s.as_str()),
            CompoundValue::Enum(EnumValue::Known { name, .. }) => {
                serializer.serialize_str(name.as_str())
            }
            CompoundValue::Enum(EnumValue::Unrecognized(code)) => serializer.serialize_i64(*code),
            CompoundValue::BitField(words) => {
                let mut seq = serializer.serialize_seq(Some(words.len()))?;
                for w in words {
                    seq.serialize_element(w)?;
                }
                seq.end()
            }
            CompoundValue::Timestamp(t) => serializer.serialize_str(&t.to_rfc3339()),
            CompoundValue::Duration(d) => {
                let mut s = serializer.serialize_struct("TimeDuration", 2)?;
                s.serialize_field("value", &d.value)?;
                s.serialize_field("unit", &d.unit)?;
                s.end()
            }
            CompoundValue::Bytes(b) => serializer.serialize_bytes(b),
            CompoundValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr.values() {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            CompoundValue::Compound(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k.as_str(), v)?;
                }
                m.end()
            }
        }
    }
}

// ─── From impls ─────────────────────────────────────────────────────────────

macro_rules! from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for CompoundValue {
            fn from(n: $t) -> Self {
                CompoundValue::Number(CompoundNumber::I64(n as i64))
            }
        }
    )*};
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for CompoundValue {
            fn from(n: $t) -> Self {
                CompoundValue::Number(CompoundNumber::U64(n as u64))
            }
        }
    )*};
}

from_signed!(i8, i16, i32, i64);
from_unsigned!(u8, u16, u32, u64);

impl From<f32> for CompoundValue {
    fn from(n: f32) -> Self {
        CompoundValue::Number(CompoundNumber::F64(n as f64))
    }
}

impl From<f64> for CompoundValue {
    fn from(n: f64) -> Self {
        CompoundValue::Number(CompoundNumber::F64(n))
    }
}

impl From<bool> for CompoundValue {
    fn from(b: bool) -> Self {
        CompoundValue::Bool(b)
    }
}

impl From<&str> for CompoundValue {
    fn from(s: &str) -> Self {
        CompoundValue::Str(SmolStr::from(s))
    }
}

impl From<String> for CompoundValue {
    fn from(s: String) -> Self {
        CompoundValue::Str(SmolStr::from(s))
    }
}

impl From<SmolStr> for CompoundValue {
    fn from(s: SmolStr) -> Self {
        CompoundValue::Str(s)
    }
}

impl From<DateTime<Utc>> for CompoundValue {
    fn from(t: DateTime<Utc>) -> Self {
        CompoundValue::Timestamp(t)
    }
}

impl From<TimeDuration> for CompoundValue {
    fn from(d: TimeDuration) -> Self {
        CompoundValue::Duration(d)
    }
}

impl From<EnumValue> for CompoundValue {
    fn from(e: EnumValue) -> Self {
        CompoundValue::Enum(e)
    }
}

impl From<MdArray> for CompoundValue {
    fn from(a: MdArray) -> Self {
        CompoundValue::Array(a)
    }
}

impl From<CompoundMap> for CompoundValue {
    fn from(m: CompoundMap) -> Self {
        CompoundValue::Compound(m)
    }
}

// ─── TryFrom<CompoundValue> ─────────────────────────────────────────────────
//
// Used by record accessors. The member name is filled in by the caller
// (see `CodecError::for_member`).

fn mismatch(expected: &'static str, value: &CompoundValue) -> CodecError {
    CodecError::TypeMismatch {
        member: SmolStr::default(),
        expected,
        actual: value.kind_name(),
    }
}

macro_rules! try_into_int {
    ($($t:ty => $via:ident),*) => {$(
        impl TryFrom<CompoundValue> for $t {
            type Error = CodecError;

            fn try_from(value: CompoundValue) -> Result<Self, Self::Error> {
                let wide = value.$via().ok_or_else(|| mismatch(stringify!($t), &value))?;
                <$t>::try_from(wide).map_err(|_| CodecError::ValueOutOfRange {
                    member: SmolStr::default(),
                    width: std::mem::size_of::<$t>(),
                })
            }
        }
    )*};
}

try_into_int!(
    i8 => as_i64, i16 => as_i64, i32 => as_i64, i64 => as_i64,
    u8 => as_u64, u16 => as_u64, u32 => as_u64, u64 => as_u64
);

impl TryFrom<CompoundValue> for f64 {
    type Error = CodecError;

    fn try_from(value: CompoundValue) -> Result<Self, Self::Error> {
        value.as_f64().ok_or_else(|| mismatch("f64", &value))
    }
}

impl TryFrom<CompoundValue> for f32 {
    type Error = CodecError;

    fn try_from(value: CompoundValue) -> Result<Self, Self::Error> {
        value.as_f64().map(|f| f as f32).ok_or_else(|| mismatch("f32", &value))
    }
}

impl TryFrom<CompoundValue> for bool {
    type Error = CodecError;

    fn try_from(value: CompoundValue) -> Result<Self, Self::Error> {
        value.as_bool().ok_or_else(|| mismatch("bool", &value))
    }
}

impl TryFrom<CompoundValue> for SmolStr {
    type Error = CodecError;

    fn try_from(value: CompoundValue) -> Result<Self, Self::Error> {
        match value {
            CompoundValue::Str(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl TryFrom<CompoundValue> for String {
    type Error = CodecError;

    fn try_from(value: CompoundValue) -> Result<Self, Self::Error> {
        SmolStr::try_from(value).map(|s| s.to_string())
    }
}

impl TryFrom<CompoundValue> for DateTime<Utc> {
    type Error = CodecError;

    fn try_from(value: CompoundValue) -> Result<Self, Self::Error> {
        value.as_timestamp().ok_or_else(|| mismatch("timestamp", &value))
    }
}

impl TryFrom<CompoundValue> for TimeDuration {
    type Error = CodecError;

    fn try_from(value: CompoundValue) -> Result<Self, Self::Error> {
        value.as_duration().ok_or_else(|| mismatch("duration", &value))
    }
}

impl TryFrom<CompoundValue> for EnumValue {
    type Error = CodecError;

    fn try_from(value: CompoundValue) -> Result<Self, Self::Error> {
        match value {
            CompoundValue::Enum(e) => Ok(e),
            other => Err(mismatch("enum", &other)),
        }
    }
}

impl TryFrom<CompoundValue> for MdArray {
    type Error = CodecError;

    fn try_from(value: CompoundValue) -> Result<Self, Self::Error> {
        match value {
            CompoundValue::Array(a) => Ok(a),
            other => Err(mismatch("array", &other)),
        }
    }
}

impl TryFrom<CompoundValue> for CompoundMap {
    type Error = CodecError;

    fn try_from(value: CompoundValue) -> Result<Self, Self::Error> {
        match value {
            CompoundValue::Compound(m) => Ok(m),
            other => Err(mismatch("compound", &other)),
        }
    }
}

// ─── From/Into serde_json::Value ────────────────────────────────────────────

impl From<serde_json::Value> for CompoundValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => CompoundValue::Null,
            serde_json::Value::Bool(b) => CompoundValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CompoundValue::Number(CompoundNumber::I64(i))
                } else if let Some(u) = n.as_u64() {
                    CompoundValue::Number(CompoundNumber::U64(u))
                } else {
                    CompoundValue::Number(CompoundNumber::F64(n.as_f64().unwrap_or(0.0)))
                }
            }
            serde_json::Value::String(s) => CompoundValue::Str(SmolStr::from(s)),
            serde_json::Value::Array(arr) => CompoundValue::Array(MdArray::from_flat(
                arr.into_iter().map(CompoundValue::from).collect(),
            )),
            serde_json::Value::Object(obj) => CompoundValue::Compound(
                obj.into_iter()
                    .map(|(k, v)| (SmolStr::from(k), CompoundValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<CompoundValue> for serde_json::Value {
    fn from(val: CompoundValue) -> Self {
        match val {
            CompoundValue::Null => serde_json::Value::Null,
            CompoundValue::Bool(b) => serde_json::Value::Bool(b),
            CompoundValue::Number(n) => match n {
                CompoundNumber::I64(i) => serde_json::json!(i),
                CompoundNumber::U64(u) => serde_json::json!(u),
                CompoundNumber::F64(f) => serde_json::json!(f),
            },
            CompoundValue::Str(s) => serde_json::Value::String(s.to_string()),
            CompoundValue::Enum(EnumValue::Known { name, .. }) => {
                serde_json::Value::String(name.to_string())
            }
            CompoundValue::Enum(EnumValue::Unrecognized(code)) => serde_json::json!(code),
            CompoundValue::BitField(words) => serde_json::json!(words),
            CompoundValue::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
            CompoundValue::Duration(d) => serde_json::json!({
                "value": d.value,
                "unit": d.unit,
            }),
            CompoundValue::Bytes(b) => serde_json::json!(b),
            CompoundValue::Array(arr) => serde_json::Value::Array(
                arr.into_values().into_iter().map(|v| v.into()).collect(),
            ),
            CompoundValue::Compound(obj) => serde_json::Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k.to_string(), v.into()))
                    .collect(),
            ),
        }
    }
}

/// Build a [`CompoundMap`] from `key => value` pairs; nested `{ .. }` blocks
/// become nested compounds.
#[macro_export]
macro_rules! compound_map {
    ({ $($key:expr => $val:tt),* $(,)? }) => {{
        let mut map = $crate::compound_value::CompoundMap::default();
        $(
            map.insert(
                ::smol_str::SmolStr::new($key),
                $crate::compound_value::CompoundValue::from($crate::compound_map!(@value $val)),
            );
        )*
        map
    }};

    (@value { $($inner:tt)* }) => {
        $crate::compound_map!({ $($inner)* })
    };

    (@value $val:expr) => {
        $val
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_conversions() {
        assert_eq!(CompoundNumber::F64(3.0).as_i64(), Some(3));
        assert_eq!(CompoundNumber::F64(3.5).as_i64(), None);
        assert_eq!(CompoundNumber::I64(-1).as_u64(), None);
        assert_eq!(CompoundNumber::U64(u64::MAX).as_i64(), None);
    }

    #[test]
    fn test_try_from_narrows_with_range_check() {
        assert_eq!(i16::try_from(CompoundValue::from(300i64)).unwrap(), 300);
        assert!(matches!(
            i8::try_from(CompoundValue::from(300i64)),
            Err(CodecError::ValueOutOfRange { width: 1, .. })
        ));
        assert!(matches!(
            u32::try_from(CompoundValue::from("x")),
            Err(CodecError::TypeMismatch { expected: "u32", actual: "string", .. })
        ));
    }

    #[test]
    fn test_md_array_extent_check() {
        let values: Vec<CompoundValue> = (0..6).map(CompoundValue::from).collect();
        assert!(MdArray::new(&[2, 3], values.clone()).is_some());
        assert!(MdArray::new(&[4, 2], values).is_none());
    }

    #[test]
    fn test_compound_map_macro_nests() {
        let map = compound_map!({
            "id" => 7i32,
            "pos" => { "x" => 1.5f64, "y" => 2.5f64 },
        });
        assert_eq!(map.get("id").and_then(|v| v.as_i64()), Some(7));
        let pos = map.get("pos").and_then(|v| v.as_compound()).unwrap();
        assert_eq!(pos.get("y").and_then(|v| v.as_f64()), Some(2.5));
    }

    #[test]
    fn test_json_round_trip() {
        let json = serde_json::json!({"a": 1, "b": [true, "x"], "c": {"d": 2.5}});
        let value = CompoundValue::from(json.clone());
        assert_eq!(serde_json::Value::from(value), json);
    }

    #[test]
    fn test_duration_conversion_truncates() {
        let d = TimeDuration::new(90, TimeUnit::Minutes);
        assert_eq!(d.convert_to(TimeUnit::Hours), Some(TimeDuration::new(1, TimeUnit::Hours)));
        assert_eq!(d.to_string(), "90 min");
    }
}
