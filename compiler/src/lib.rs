//! brine-pb-compiler
//!
//! This crate implements:
//!  1) A tokenizer + parser for the proto2/proto3 `.proto` grammar,
//!  2) A verifier for the parsed files (tag ranges, duplicate fields, map keys, etc.),
//!  3) The schema compiler, which lowers parsed files into the flat
//!     [Schema](brine_pb_schema::Schema) used by the wire codec, and merges
//!     proto2 `extend` blocks into their target messages,
//!  4) Error types (`ProtoError`).
//!
//! ```
//! use brine_pb_compiler::compile_schema;
//! use brine_pb_schema::Value;
//!
//! let schema = compile_schema(r#"
//!     syntax = "proto3";
//!     package demo;
//!     message P { int32 id = 1; string name = 2; repeated int32 xs = 3; }
//! "#).unwrap();
//!
//! let bytes = [0x08, 5, 0x12, 2, b'h', b'i', 0x1A, 3, 1, 2, 3];
//! let value = Value::decode(&schema, "demo.P", &bytes).unwrap();
//! assert_eq!(format!("{:?}", value), "demo.P {id: 5, name: \"hi\", xs: [1, 2, 3]}");
//! assert_eq!(value.encode(&schema, "demo.P").unwrap(), bytes);
//! ```

pub mod error;
pub mod types;
pub mod utils;
pub mod tokenizer;
pub mod parser;
pub mod verifier;
pub mod compiler;

pub use compiler::compile;
pub use compiler::compile_all;
pub use compiler::compile_schema;
pub use compiler::merge_extensions;
pub use compiler::parse_proto;
pub use error::ProtoError;
