//! Field keys and wire types of the protobuf encoding.
//!
//! Every field on the wire starts with a varint key `(tag << 3) | wire_type`.
//! See <https://protobuf.dev/programming-guides/encoding> for the format.

use serde::Serialize;

use crate::bb::{varint_size, ByteBuffer, ByteBufferMut};
use crate::error::WireError;

/// Smallest legal field number.
pub const MIN_TAG: u32 = 1;
/// Largest legal field number.
pub const MAX_TAG: u32 = (1 << 29) - 1;

/// How the payload following a key is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum WireType {
    /// `int32`, `int64`, `uint32`, `uint64`, `sint32`, `sint64`, `bool`, `enum`.
    Varint = 0,
    /// `fixed64`, `sfixed64`, `double`.
    Fixed64 = 1,
    /// `string`, `bytes`, embedded messages and packed repeated fields.
    LengthDelimited = 2,
    /// `fixed32`, `sfixed32`, `float`.
    Fixed32 = 5,
}

impl WireType {
    /// Groups (3 and 4) are not supported and 6/7 are unassigned.
    pub fn from_u8(value: u8) -> Result<WireType, WireError> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(WireError::InvalidWireType(other)),
        }
    }
}

/// Packs a field number and wire type into a key.
pub fn make_key(tag: u32, wire_type: WireType) -> u64 {
    ((tag as u64) << 3) | wire_type as u64
}

pub fn write_key(bb: &mut ByteBufferMut, tag: u32, wire_type: WireType) {
    bb.write_var_uint64(make_key(tag, wire_type));
}

pub fn key_size(tag: u32, wire_type: WireType) -> usize {
    varint_size(make_key(tag, wire_type))
}

/// Reads the next key and splits it into field number and wire type.
pub fn read_key(bb: &mut ByteBuffer) -> Result<(u32, WireType), WireError> {
    let key = bb.read_var_uint64()?;
    let tag = key >> 3;
    if tag < MIN_TAG as u64 || tag > MAX_TAG as u64 {
        return Err(WireError::InvalidTag(tag));
    }
    let wire_type = WireType::from_u8((key & 7) as u8)?;
    Ok((tag as u32, wire_type))
}

/// Advances past one field payload of the given wire type.
pub fn skip_field(bb: &mut ByteBuffer, wire_type: WireType) -> Result<(), WireError> {
    match wire_type {
        WireType::Varint => {
            bb.read_var_uint64()?;
        }
        WireType::Fixed64 => {
            bb.read_bytes(8)?;
        }
        WireType::LengthDelimited => {
            bb.read_length_delimited()?;
        }
        WireType::Fixed32 => {
            bb.read_bytes(4)?;
        }
    }
    Ok(())
}
