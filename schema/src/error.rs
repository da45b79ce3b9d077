use thiserror::Error;

use crate::wire::WireType;

/// Errors raised by the wire codec and the descriptor map.
///
/// Every failure is reported to the immediate caller; nothing is retried and
/// no partially decoded value is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WireError {
    #[error("Unknown type \"{0}\"")]
    UnknownType(String),

    #[error("The type \"{0}\" is defined twice")]
    DuplicateType(String),

    #[error("Missing required field \"{field}\" in message \"{message}\"")]
    MissingRequiredField { message: String, field: String },

    #[error("Buffer truncated at offset {offset}")]
    TruncatedBuffer { offset: usize },

    #[error("Read of {len} bytes at offset {offset} exceeds the {remaining} remaining bytes")]
    OutOfBounds {
        offset:    usize,
        len:       usize,
        remaining: usize,
    },

    #[error("Invalid framing: {0}")]
    InvalidFraming(String),

    #[error("Malformed varint at offset {offset}")]
    MalformedVarint { offset: usize },

    #[error("Invalid wire type {0}")]
    InvalidWireType(u8),

    #[error("Invalid field number {0}")]
    InvalidTag(u64),

    #[error("Field \"{field}\" expects wire type {expected:?} but found {found:?}")]
    UnexpectedWireType {
        field:    String,
        expected: WireType,
        found:    WireType,
    },

    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("Expected a value of type {expected} but found {found}")]
    TypeMismatch {
        expected: String,
        found:    &'static str,
    },

    #[error("Invalid enum variant \"{name}\" for enum \"{enum_name}\"")]
    UnknownEnumValue { enum_name: String, name: String },

    #[error("Message nesting exceeds the limit of {0}")]
    RecursionLimitExceeded(usize),
}
