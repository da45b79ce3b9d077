//! Runtime support for the protobuf binary wire format, driven by a schema
//! built at runtime. See
//! [https://protobuf.dev/programming-guides/encoding](https://protobuf.dev/programming-guides/encoding)
//! for documentation about the format.
//!
//! A [Schema] is a flat list of message, enum and framed definitions keyed by
//! fully-qualified name. Data is represented as a dynamic [Value] and can be
//! encoded, decoded and sized against any definition in the schema.
//!
//! ```
//! use brine_pb_schema::*;
//!
//! let schema = Schema::new(vec![
//!     Def::new("geo.Point".to_owned(), DefKind::Message(MessageDef::new(vec![
//!         Field {name: "x".to_owned(), tag: 1, type_ref: TypeRef::Primitive(Primitive::SInt32), label: Label::Optional, packed: false},
//!         Field {name: "y".to_owned(), tag: 2, type_ref: TypeRef::Primitive(Primitive::SInt32), label: Label::Optional, packed: false},
//!     ]))),
//! ]);
//!
//! let value = Value::decode(&schema, "geo.Point", &[0x08, 0x01, 0x10, 0x04]).unwrap();
//! assert_eq!(format!("{:?}", value), "geo.Point {x: -1, y: 2}");
//! assert_eq!(value.encode(&schema, "geo.Point").unwrap(), [0x08, 0x01, 0x10, 0x04]);
//! ```

pub mod bb;
pub mod codec;
pub mod error;
pub mod primitive;
pub mod schema;
pub mod value;
pub mod wire;

pub use bb::*;
pub use codec::MAX_DEPTH;
pub use error::WireError;
pub use primitive::Primitive;
pub use schema::*;
pub use value::*;
pub use wire::WireType;
