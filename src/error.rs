// ─── Error ──────────────────────────────────────────────────────────────────
use smol_str::SmolStr;
use thiserror::Error;

use crate::types::{DataClass, TypeVariant};

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Error)]
pub enum CodecError {
    /// Duplicate member names or overlapping byte ranges. Raised while building a schema.
    #[error("schema conflict in compound type '{type_name}': {reason}")]
    SchemaConflict { type_name: SmolStr, reason: String },
    #[error("shape mismatch for member '{member}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        member: SmolStr,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("string for member '{member}' needs {needed} bytes, member width is {width}")]
    StringTooLong {
        member: SmolStr,
        needed: usize,
        width: usize,
    },
    #[error("{}", incomplete_mapping_message(.type_name, .unmapped_members, .unmapped_fields))]
    IncompleteMapping {
        type_name: SmolStr,
        unmapped_members: Vec<SmolStr>,
        unmapped_fields: Vec<SmolStr>,
    },
    #[error("variant {variant} requires an INTEGER member, '{member}' is {data_class}")]
    VariantConflict {
        member: SmolStr,
        variant: TypeVariant,
        data_class: DataClass,
    },
    #[error("type mismatch for member '{member}': expected {expected}, got {actual}")]
    TypeMismatch {
        member: SmolStr,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("value {value} of member '{member}' has no entry in enum '{enum_type}'")]
    UnknownEnumValue {
        member: SmolStr,
        enum_type: SmolStr,
        value: String,
    },
    #[error("value for member '{member}' does not fit into {width} bytes")]
    ValueOutOfRange { member: SmolStr, width: usize },
    #[error("Invalid buffer length: expected {expected}, got {actual}")]
    InvalidBuffer { expected: usize, actual: usize },
    #[error("invalid layout for member '{member}': {reason}")]
    InvalidLayout { member: SmolStr, reason: String },
    #[error("Field not found: {0}")]
    FieldNotFound(SmolStr),
    #[error("member '{0}' is variable-length but no variable-length store was supplied")]
    VarLenUnavailable(SmolStr),
    #[error("store error: {0}")]
    Store(String),
    #[error("CBOR error: {0}")]
    Cbor(String),
}

impl CodecError {
    /// Attach a member name to an error raised by a value conversion that
    /// did not know which member it was converting.
    pub fn for_member(self, name: &str) -> Self {
        match self {
            CodecError::TypeMismatch {
                member,
                expected,
                actual,
            } if member.is_empty() => CodecError::TypeMismatch {
                member: SmolStr::new(name),
                expected,
                actual,
            },
            CodecError::ValueOutOfRange { member, width } if member.is_empty() => {
                CodecError::ValueOutOfRange {
                    member: SmolStr::new(name),
                    width,
                }
            }
            other => other,
        }
    }
}

fn incomplete_mapping_message(
    type_name: &SmolStr,
    unmapped_members: &[SmolStr],
    unmapped_fields: &[SmolStr],
) -> String {
    let mut msg = format!("Incomplete mapping for compound type '{type_name}': ");
    if !unmapped_members.is_empty() {
        msg.push_str(&format!("unmapped members: {}", name_list(unmapped_members)));
    }
    if !unmapped_members.is_empty() && !unmapped_fields.is_empty() {
        msg.push_str(", ");
    }
    if !unmapped_fields.is_empty() {
        msg.push_str(&format!("unmapped fields: {}", name_list(unmapped_fields)));
    }
    msg
}

/// Names as `{a,b}`.
fn name_list(names: &[SmolStr]) -> String {
    let names: Vec<&str> = names.iter().map(SmolStr::as_str).collect();
    format!("{{{}}}", names.join(","))
}

impl From<redb::Error> for CodecError {
    fn from(e: redb::Error) -> Self {
        CodecError::Store(e.to_string())
    }
}

impl From<redb::DatabaseError> for CodecError {
    fn from(e: redb::DatabaseError) -> Self {
        CodecError::Store(e.to_string())
    }
}

impl From<redb::TransactionError> for CodecError {
    fn from(e: redb::TransactionError) -> Self {
        CodecError::Store(e.to_string())
    }
}

impl From<redb::TableError> for CodecError {
    fn from(e: redb::TableError) -> Self {
        CodecError::Store(e.to_string())
    }
}

impl From<redb::CommitError> for CodecError {
    fn from(e: redb::CommitError) -> Self {
        CodecError::Store(e.to_string())
    }
}

impl From<redb::StorageError> for CodecError {
    fn from(e: redb::StorageError) -> Self {
        CodecError::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_mapping_lists_both_sides() {
        let err = CodecError::IncompleteMapping {
            type_name: "Event".into(),
            unmapped_members: vec!["extra".into()],
            unmapped_fields: vec!["note".into()],
        };
        assert_eq!(
            err.to_string(),
            "Incomplete mapping for compound type 'Event': unmapped members: {extra}, unmapped fields: {note}"
        );
    }

    #[test]
    fn test_for_member_fills_empty_name_only() {
        let err = CodecError::ValueOutOfRange {
            member: SmolStr::default(),
            width: 2,
        }
        .for_member("count");
        assert_eq!(err.to_string(), "value for member 'count' does not fit into 2 bytes");
        let named = CodecError::TypeMismatch {
            member: "inner".into(),
            expected: "bool",
            actual: "string",
        }
        .for_member("outer");
        assert!(named.to_string().contains("'inner'"));
    }

    #[test]
    fn test_incomplete_mapping_members_only() {
        let err = CodecError::IncompleteMapping {
            type_name: "Event".into(),
            unmapped_members: vec!["extra".into(), "spare".into()],
            unmapped_fields: vec![],
        };
        assert_eq!(
            err.to_string(),
            "Incomplete mapping for compound type 'Event': unmapped members: {extra,spare}"
        );
    }
}
