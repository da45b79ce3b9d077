//! brine-pb
//!
//! This crate provides runtime support for working with protobuf-encoded data
//! without generated code.
//!
//! - `compile_sources` turns `.proto` text into a flat [Schema]
//! - [Value] encodes and decodes messages against that schema
//! - `describe_to_json` dumps the compiled descriptors
//!
//! ```
//! use brine_pb::{compile_sources, CompileOptions, Value};
//!
//! let schema = compile_sources(
//!     &["syntax = \"proto3\"; package demo; message Ping { uint64 seq = 1; }"],
//!     &CompileOptions::default(),
//! ).unwrap();
//!
//! let value = Value::decode(&schema, "demo.Ping", &[0x08, 0x96, 0x01]).unwrap();
//! assert_eq!(value.get("seq"), Some(&Value::UInt64(150)));
//! ```

use serde::Deserialize;

pub use brine_pb_compiler::error::ProtoError;
pub use brine_pb_schema::{FieldMap, Schema, Field, Value, WireError};

/// Options for [compile_sources].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Accept sources with `import` statements. Imports are not resolved from
    /// disk; every referenced file must be among the supplied sources.
    pub allow_imports: bool,
}

/// Compile one or more `.proto` sources into a single schema.
pub fn compile_sources(sources: &[&str], options: &CompileOptions) -> Result<Schema, ProtoError> {
    let mut files = Vec::with_capacity(sources.len());
    for source in sources {
        files.push(brine_pb_compiler::parse_proto(source)?);
    }

    if !options.allow_imports {
        let imports: Vec<String> = files.iter().flat_map(|file| file.imports.iter().cloned()).collect();
        if !imports.is_empty() {
            return Err(ProtoError::UnresolvedImport(imports));
        }
    }

    brine_pb_compiler::compile_all(&files)
}

/// Render the compiled descriptors as pretty-printed JSON.
pub fn describe_to_json(schema: &Schema) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(schema)
}

pub mod error {
    pub use brine_pb_compiler::error::ProtoError;
    pub use brine_pb_schema::WireError;
}

pub mod schema {
    pub use brine_pb_schema::{DefKind, Field, Framing, Label, Primitive, Schema, TypeRef, Value};
}
