//! The scalar field types of the protobuf wire format.
//!
//! Each primitive knows its wire type and how to read, write and size a single
//! bare value. Length-delimited primitives (`string`, `bytes`) read and write
//! only their payload: the caller owns the length prefix, the same way it does
//! for embedded messages.

use serde::Serialize;

use crate::bb::{varint_size, ByteBuffer, ByteBufferMut};
use crate::error::WireError;
use crate::value::Value;
use crate::wire::WireType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Bool,
    Fixed32,
    SFixed32,
    Float,
    Fixed64,
    SFixed64,
    Double,
    String,
    Bytes,
}

pub const ALL_PRIMITIVES: [Primitive; 15] = [
    Primitive::Int32,
    Primitive::Int64,
    Primitive::UInt32,
    Primitive::UInt64,
    Primitive::SInt32,
    Primitive::SInt64,
    Primitive::Bool,
    Primitive::Fixed32,
    Primitive::SFixed32,
    Primitive::Float,
    Primitive::Fixed64,
    Primitive::SFixed64,
    Primitive::Double,
    Primitive::String,
    Primitive::Bytes,
];

impl Primitive {
    /// Looks up a primitive by its `.proto` keyword.
    pub fn from_name(name: &str) -> Option<Primitive> {
        ALL_PRIMITIVES.iter().copied().find(|p| p.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::UInt32 => "uint32",
            Primitive::UInt64 => "uint64",
            Primitive::SInt32 => "sint32",
            Primitive::SInt64 => "sint64",
            Primitive::Bool => "bool",
            Primitive::Fixed32 => "fixed32",
            Primitive::SFixed32 => "sfixed32",
            Primitive::Float => "float",
            Primitive::Fixed64 => "fixed64",
            Primitive::SFixed64 => "sfixed64",
            Primitive::Double => "double",
            Primitive::String => "string",
            Primitive::Bytes => "bytes",
        }
    }

    pub fn wire_type(self) -> WireType {
        match self {
            Primitive::Int32
            | Primitive::Int64
            | Primitive::UInt32
            | Primitive::UInt64
            | Primitive::SInt32
            | Primitive::SInt64
            | Primitive::Bool => WireType::Varint,
            Primitive::Fixed32 | Primitive::SFixed32 | Primitive::Float => WireType::Fixed32,
            Primitive::Fixed64 | Primitive::SFixed64 | Primitive::Double => WireType::Fixed64,
            Primitive::String | Primitive::Bytes => WireType::LengthDelimited,
        }
    }

    /// Repeated fields of this type may use the packed encoding.
    pub fn is_packable(self) -> bool {
        self.wire_type() != WireType::LengthDelimited
    }

    /// True for the types allowed as a frame length prefix.
    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            Primitive::Bool
                | Primitive::Float
                | Primitive::Double
                | Primitive::String
                | Primitive::Bytes
        )
    }

    /// Reads one bare value. `string` and `bytes` consume the rest of `bb`,
    /// which must already be bounded to the field payload.
    pub fn read<'a>(self, bb: &mut ByteBuffer) -> Result<Value<'a>, WireError> {
        Ok(match self {
            Primitive::Int32 => Value::Int32(bb.read_var_int32()?),
            Primitive::Int64 => Value::Int64(bb.read_var_int64()?),
            Primitive::UInt32 => Value::UInt32(bb.read_var_uint32()?),
            Primitive::UInt64 => Value::UInt64(bb.read_var_uint64()?),
            Primitive::SInt32 => Value::Int32(bb.read_zigzag32()?),
            Primitive::SInt64 => Value::Int64(bb.read_zigzag64()?),
            Primitive::Bool => Value::Bool(bb.read_bool()?),
            Primitive::Fixed32 => Value::UInt32(bb.read_fixed32()?),
            Primitive::SFixed32 => Value::Int32(bb.read_sfixed32()?),
            Primitive::Float => Value::Float(bb.read_float()?),
            Primitive::Fixed64 => Value::UInt64(bb.read_fixed64()?),
            Primitive::SFixed64 => Value::Int64(bb.read_sfixed64()?),
            Primitive::Double => Value::Double(bb.read_double()?),
            Primitive::String => Value::String(bb.read_rest_as_string()?),
            Primitive::Bytes => Value::Bytes(bb.read_bytes(bb.remaining())?.to_vec()),
        })
    }

    /// Writes one bare value without a key or length prefix.
    pub fn write(self, value: &Value, bb: &mut ByteBufferMut) -> Result<(), WireError> {
        match (self, value) {
            (Primitive::Int32, Value::Int32(v)) => bb.write_var_int32(*v),
            (Primitive::Int64, Value::Int64(v)) => bb.write_var_int64(*v),
            (Primitive::UInt32, Value::UInt32(v)) => bb.write_var_uint32(*v),
            (Primitive::UInt64, Value::UInt64(v)) => bb.write_var_uint64(*v),
            (Primitive::SInt32, Value::Int32(v)) => bb.write_zigzag32(*v),
            (Primitive::SInt64, Value::Int64(v)) => bb.write_zigzag64(*v),
            (Primitive::Bool, Value::Bool(v)) => bb.write_bool(*v),
            (Primitive::Fixed32, Value::UInt32(v)) => bb.write_fixed32(*v),
            (Primitive::SFixed32, Value::Int32(v)) => bb.write_sfixed32(*v),
            (Primitive::Float, Value::Float(v)) => bb.write_float(*v),
            (Primitive::Fixed64, Value::UInt64(v)) => bb.write_fixed64(*v),
            (Primitive::SFixed64, Value::Int64(v)) => bb.write_sfixed64(*v),
            (Primitive::Double, Value::Double(v)) => bb.write_double(*v),
            (Primitive::String, Value::String(v)) => bb.write_bytes(v.as_bytes()),
            (Primitive::Bytes, Value::Bytes(v)) => bb.write_bytes(v),
            (primitive, value) => return Err(primitive.mismatch(value)),
        }
        Ok(())
    }

    /// Number of bytes [write](#method.write) produces for `value`.
    pub fn size_of(self, value: &Value) -> Result<usize, WireError> {
        Ok(match (self, value) {
            (Primitive::Int32, Value::Int32(v)) => varint_size(*v as i64 as u64),
            (Primitive::Int64, Value::Int64(v)) => varint_size(*v as u64),
            (Primitive::UInt32, Value::UInt32(v)) => varint_size(*v as u64),
            (Primitive::UInt64, Value::UInt64(v)) => varint_size(*v),
            (Primitive::SInt32, Value::Int32(v)) => varint_size(((*v << 1) ^ (*v >> 31)) as u32 as u64),
            (Primitive::SInt64, Value::Int64(v)) => varint_size(((*v << 1) ^ (*v >> 63)) as u64),
            (Primitive::Bool, Value::Bool(_)) => 1,
            (Primitive::Fixed32, Value::UInt32(_))
            | (Primitive::SFixed32, Value::Int32(_))
            | (Primitive::Float, Value::Float(_)) => 4,
            (Primitive::Fixed64, Value::UInt64(_))
            | (Primitive::SFixed64, Value::Int64(_))
            | (Primitive::Double, Value::Double(_)) => 8,
            (Primitive::String, Value::String(v)) => v.len(),
            (Primitive::Bytes, Value::Bytes(v)) => v.len(),
            (primitive, value) => return Err(primitive.mismatch(value)),
        })
    }

    fn mismatch(self, value: &Value) -> WireError {
        WireError::TypeMismatch {
            expected: self.name().to_owned(),
            found:    value.kind_name(),
        }
    }
}
