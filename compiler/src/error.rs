use brine_pb_schema::WireError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}, column {column}: {msg}")]
    ParseError {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("Verifier error: {0}")]
    VerifierError(String),

    #[error("The type \"{0}\" is defined twice")]
    DuplicateType(String),

    #[error("The tag {tag} is used twice in message \"{message}\"")]
    DuplicateTag { message: String, tag: u32 },

    #[error("The field \"{field}\" is defined twice in message \"{message}\"")]
    DuplicateField { message: String, field: String },

    #[error("The type \"{type_}\" is not defined for field \"{field}\" in message \"{message}\"")]
    UnknownFieldType {
        message: String,
        field:   String,
        type_:   String,
    },

    #[error("Cannot extend unknown message \"{0}\"")]
    UnknownExtensionTarget(String),

    #[error("Extension field \"{field}\" uses tag {tag}, outside the extension ranges of \"{message}\"")]
    ExtensionOutOfRange {
        message: String,
        field:   String,
        tag:     u32,
    },

    #[error("Unresolved imports: {}", .0.join(", "))]
    UnresolvedImport(Vec<String>),

    #[error(transparent)]
    Wire(#[from] WireError),
}
