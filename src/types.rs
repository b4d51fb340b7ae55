use std::fmt;

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

// ─── Limits ─────────────────────────────────────────────────────────────────

/// Highest rank an array member may have.
pub const MAX_RANK: usize = 32;

/// Width of the slot a variable-length member occupies in a raw buffer.
pub const VL_HANDLE_SIZE: usize = 16; // 4 + 8 + 4

/// Dimensions of an array member, outermost first. Empty for scalars.
pub type Dims = ArrayVec<usize, MAX_RANK>;

// ─── Variable-length handle layout ──────────────────────────────────────────
//
//  ┌──────────────────────────────────────────────┐
//  │ VarLenHandle (16 bytes, storage byte order)  │
//  │   length:     u32   content length in bytes  │
//  │   collection: u64   store-defined heap id    │
//  │   index:      u32   object within the heap   │
//  └──────────────────────────────────────────────┘

// ─── Data class ─────────────────────────────────────────────────────────────

/// Raw data class of a compound member as reported by the type catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataClass {
    Integer,
    Float,
    String,
    Boolean,
    Enum,
    BitField,
    Opaque,
    Compound,
    Array,
}

impl fmt::Display for DataClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataClass::Integer => "INTEGER",
            DataClass::Float => "FLOAT",
            DataClass::String => "STRING",
            DataClass::Boolean => "BOOLEAN",
            DataClass::Enum => "ENUM",
            DataClass::BitField => "BITFIELD",
            DataClass::Opaque => "OPAQUE",
            DataClass::Compound => "COMPOUND",
            DataClass::Array => "ARRAY",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CharacterEncoding {
    #[default]
    Ascii,
    Utf8,
}

impl CharacterEncoding {
    /// Bytes reserved per character when a width is derived from a length.
    pub fn max_bytes_per_char(self) -> usize {
        match self {
            CharacterEncoding::Ascii => 1,
            CharacterEncoding::Utf8 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

// ─── Time units ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeUnit {
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Length of one unit in microseconds.
    pub const fn micros(self) -> i64 {
        match self {
            TimeUnit::Microseconds => 1,
            TimeUnit::Milliseconds => 1_000,
            TimeUnit::Seconds => 1_000_000,
            TimeUnit::Minutes => 60_000_000,
            TimeUnit::Hours => 3_600_000_000,
            TimeUnit::Days => 86_400_000_000,
        }
    }

    /// Convert `value` given in `from` into this unit. Truncates towards zero
    /// when converting to a coarser unit; `None` on overflow.
    pub fn convert(self, value: i64, from: TimeUnit) -> Option<i64> {
        let (this, other) = (self.micros(), from.micros());
        if other >= this {
            value.checked_mul(other / this)
        } else {
            Some(value / (this / other))
        }
    }

    pub fn abbreviation(self) -> &'static str {
        match self {
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Microseconds => "MICROSECONDS",
            TimeUnit::Milliseconds => "MILLISECONDS",
            TimeUnit::Seconds => "SECONDS",
            TimeUnit::Minutes => "MINUTES",
            TimeUnit::Hours => "HOURS",
            TimeUnit::Days => "DAYS",
        };
        f.write_str(name)
    }
}

// ─── Type variant ───────────────────────────────────────────────────────────

/// Semantic tag layered on top of a raw integer member.
///
/// `Timestamp` counts `unit`s since 1970-01-01T00:00:00Z, `Duration` counts
/// `unit`s. Both require [`DataClass::Integer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeVariant {
    Timestamp(TimeUnit),
    Duration(TimeUnit),
}

impl TypeVariant {
    pub fn is_timestamp(self) -> bool {
        matches!(self, TypeVariant::Timestamp(_))
    }

    pub fn is_duration(self) -> bool {
        matches!(self, TypeVariant::Duration(_))
    }

    pub fn time_unit(self) -> TimeUnit {
        match self {
            TypeVariant::Timestamp(unit) | TypeVariant::Duration(unit) => unit,
        }
    }
}

impl fmt::Display for TypeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeVariant::Timestamp(unit) => write!(f, "TIMESTAMP_{unit}_SINCE_START_OF_THE_EPOCH"),
            TypeVariant::Duration(unit) => write!(f, "TIME_DURATION_{unit}"),
        }
    }
}

// ─── Configuration ──────────────────────────────────────────────────────────

/// Knobs shared by every codec derived from a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Byte order of numeric members in raw buffers.
    ///
    /// Default: little endian.
    pub byte_order: Endianness,
    /// Unit used for timestamp members inferred from a record shape that
    /// does not name one.
    ///
    /// Default: milliseconds.
    pub default_time_unit: TimeUnit,
    /// Encoding of string members inferred from a record shape that does not
    /// name one.
    pub string_encoding: CharacterEncoding,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            byte_order: Endianness::Little,
            default_time_unit: TimeUnit::Milliseconds,
            string_encoding: CharacterEncoding::Ascii,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_unit_conversion() {
        assert_eq!(TimeUnit::Milliseconds.convert(3, TimeUnit::Seconds), Some(3_000));
        assert_eq!(TimeUnit::Seconds.convert(3_999, TimeUnit::Milliseconds), Some(3));
        assert_eq!(TimeUnit::Seconds.convert(-3_999, TimeUnit::Milliseconds), Some(-3));
        assert_eq!(TimeUnit::Days.convert(48, TimeUnit::Hours), Some(2));
        assert_eq!(TimeUnit::Microseconds.convert(i64::MAX, TimeUnit::Days), None);
    }

    #[test]
    fn test_variant_display() {
        assert_eq!(
            TypeVariant::Timestamp(TimeUnit::Milliseconds).to_string(),
            "TIMESTAMP_MILLISECONDS_SINCE_START_OF_THE_EPOCH"
        );
        assert_eq!(
            TypeVariant::Duration(TimeUnit::Seconds).to_string(),
            "TIME_DURATION_SECONDS"
        );
    }
}
