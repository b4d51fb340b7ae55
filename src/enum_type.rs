use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::compound_value::{CompoundValue, EnumValue};
use crate::error::{CodecError, CodecResult};

/// Named ordinal table backing an enum member.
///
/// Values are stored as their integer code; by default the code is the
/// ordinal. The storage width is the narrowest of 1, 2, 4 or 8 bytes that
/// holds every code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EnumTypeDescription", into = "EnumTypeDescription")]
pub struct EnumType {
    name: SmolStr,
    values: Vec<SmolStr>,
    codes: Vec<i64>,
    by_name: FxHashMap<SmolStr, usize>,
    by_code: FxHashMap<i64, usize>,
    storage_size: usize,
    signed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnumTypeDescription {
    name: SmolStr,
    values: Vec<SmolStr>,
    codes: Vec<i64>,
    storage_size: usize,
}

impl EnumType {
    /// Enum whose codes are the ordinals of `values`.
    pub fn new(name: &str, values: &[&str]) -> CodecResult<Self> {
        let pairs: Vec<(&str, i64)> = values
            .iter()
            .enumerate()
            .map(|(ordinal, value)| (*value, ordinal as i64))
            .collect();
        Self::with_codes(name, &pairs)
    }

    /// Enum with an explicit integer code per value.
    pub fn with_codes(name: &str, pairs: &[(&str, i64)]) -> CodecResult<Self> {
        let mut by_name = FxHashMap::default();
        let mut by_code = FxHashMap::default();
        for (ordinal, (value, code)) in pairs.iter().enumerate() {
            if by_name.insert(SmolStr::new(value), ordinal).is_some() {
                return Err(CodecError::SchemaConflict {
                    type_name: SmolStr::new(name),
                    reason: format!("duplicate enum value '{value}'"),
                });
            }
            if by_code.insert(*code, ordinal).is_some() {
                return Err(CodecError::SchemaConflict {
                    type_name: SmolStr::new(name),
                    reason: format!("duplicate enum code {code}"),
                });
            }
        }
        let codes: Vec<i64> = pairs.iter().map(|(_, code)| *code).collect();
        let signed = codes.iter().any(|c| *c < 0);
        Ok(Self {
            name: SmolStr::new(name),
            values: pairs.iter().map(|(v, _)| SmolStr::new(v)).collect(),
            storage_size: required_width(&codes, signed),
            codes,
            by_name,
            by_code,
            signed,
        })
    }

    /// Override the derived storage width, e.g. to match an existing file.
    pub fn with_storage_size(mut self, size: usize) -> CodecResult<Self> {
        if !matches!(size, 1 | 2 | 4 | 8) || size < required_width(&self.codes, self.signed) {
            return Err(CodecError::InvalidLayout {
                member: self.name.clone(),
                reason: format!("enum storage size {size} cannot hold all codes"),
            });
        }
        self.storage_size = size;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[SmolStr] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn storage_size(&self) -> usize {
        self.storage_size
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn value_of(&self, name: &str) -> Option<EnumValue> {
        let ordinal = *self.by_name.get(name)?;
        self.from_ordinal(ordinal)
    }

    pub fn from_ordinal(&self, ordinal: usize) -> Option<EnumValue> {
        self.values.get(ordinal).map(|name| EnumValue::Known {
            ordinal,
            name: name.clone(),
        })
    }

    /// Map a stored code back to a value. Codes without an entry come back as
    /// [`EnumValue::Unrecognized`].
    pub fn decode(&self, code: i64) -> EnumValue {
        match self.by_code.get(&code) {
            Some(&ordinal) => EnumValue::Known {
                ordinal,
                name: self.values[ordinal].clone(),
            },
            None => EnumValue::Unrecognized(code),
        }
    }

    /// Code to store for `value`.
    ///
    /// Known values are matched by name so a value produced from another
    /// version of the table still maps correctly; unrecognized values keep
    /// their raw code. Strings are looked up by name, integers are ordinals.
    pub fn encode(&self, value: &CompoundValue) -> Option<i64> {
        match value {
            CompoundValue::Enum(EnumValue::Known { name, .. }) => {
                self.by_name.get(name).map(|&o| self.codes[o])
            }
            CompoundValue::Enum(EnumValue::Unrecognized(code)) => Some(*code),
            CompoundValue::Str(name) => self.by_name.get(name).map(|&o| self.codes[o]),
            CompoundValue::Number(n) => {
                let ordinal = usize::try_from(n.as_u64()?).ok()?;
                self.codes.get(ordinal).copied()
            }
            _ => None,
        }
    }
}

fn required_width(codes: &[i64], signed: bool) -> usize {
    let fits = |width: u32| {
        codes.iter().all(|&c| {
            if signed {
                let bits = width * 8 - 1;
                c >= -(1i64 << bits) && c < (1i64 << bits)
            } else {
                (c as u64) >> (width * 8) == 0
            }
        })
    };
    [1u32, 2, 4].into_iter().find(|w| fits(*w)).unwrap_or(8) as usize
}

impl From<EnumTypeDescription> for EnumType {
    fn from(desc: EnumTypeDescription) -> Self {
        let mut by_name = FxHashMap::default();
        let mut by_code = FxHashMap::default();
        for (ordinal, (value, code)) in desc.values.iter().zip(&desc.codes).enumerate() {
            by_name.insert(value.clone(), ordinal);
            by_code.insert(*code, ordinal);
        }
        let signed = desc.codes.iter().any(|c| *c < 0);
        Self {
            name: desc.name,
            values: desc.values,
            codes: desc.codes,
            by_name,
            by_code,
            storage_size: desc.storage_size,
            signed,
        }
    }
}

impl From<EnumType> for EnumTypeDescription {
    fn from(ty: EnumType) -> Self {
        Self {
            name: ty.name,
            values: ty.values,
            codes: ty.codes,
            storage_size: ty.storage_size,
        }
    }
}
