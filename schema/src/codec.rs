//! Reading, writing and sizing [Value]s against a [Schema].
//!
//! Writing is two-pass for every length-delimited field: the payload is sized
//! first so the varint length prefix can be emitted ahead of it. `size_of`
//! follows exactly the same control flow as `write`, so the two always agree.

use tracing::{debug, trace};

use crate::bb::{varint_size, ByteBuffer, ByteBufferMut};
use crate::error::WireError;
use crate::schema::{Def, DefKind, EnumDef, Field, FramedDef, MessageDef, Schema, TypeRef};
use crate::value::{FieldMap, Value};
use crate::wire::{key_size, read_key, skip_field, write_key, WireType};

/// Deepest message nesting accepted on read.
pub const MAX_DEPTH: usize = 100;

impl<'a> Value<'a> {
    /// Decodes a value of the type named `type_name` from `bytes`.
    ///
    /// Messages consume the whole buffer. A framed type reads one frame and
    /// ignores anything after it; use [read](#method.read) to learn how many
    /// bytes that was.
    pub fn decode(schema: &'a Schema, type_name: &str, bytes: &[u8]) -> Result<Value<'a>, WireError> {
        Value::read(schema, type_name, bytes).map(|(value, _)| value)
    }

    /// Decodes a value and returns it along with the number of bytes consumed.
    pub fn read(schema: &'a Schema, type_name: &str, bytes: &[u8]) -> Result<(Value<'a>, usize), WireError> {
        let type_ref = schema.resolve(type_name)?;
        let mut bb = ByteBuffer::new(bytes);
        let value = Value::decode_bb(schema, type_ref, &mut bb)?;
        Ok((value, bb.index()))
    }

    /// Decodes one bare value (no field key) of `type_ref` from `bb`.
    /// Messages and length-delimited scalars consume the rest of `bb`, which
    /// should already be bounded to their payload.
    pub fn decode_bb(schema: &'a Schema, type_ref: TypeRef, bb: &mut ByteBuffer) -> Result<Value<'a>, WireError> {
        decode_value(schema, type_ref, bb, 0)
    }

    /// Encodes this value as the type named `type_name`.
    pub fn encode(&self, schema: &Schema, type_name: &str) -> Result<Vec<u8>, WireError> {
        let type_ref = schema.resolve(type_name)?;
        let mut bb = ByteBufferMut::with_capacity(self.size_of(schema, type_ref)?);
        self.encode_bb(schema, type_ref, &mut bb)?;
        Ok(bb.data())
    }

    /// Number of bytes [encode](#method.encode) produces for the type named
    /// `type_name`.
    pub fn encoded_len(&self, schema: &Schema, type_name: &str) -> Result<usize, WireError> {
        self.size_of(schema, schema.resolve(type_name)?)
    }

    /// Encodes this value as one bare `type_ref` (no field key) to the end of
    /// `bb`. This is mainly useful as a helper routine for
    /// [encode](#method.encode), which you probably want to use instead.
    pub fn encode_bb(&self, schema: &Schema, type_ref: TypeRef, bb: &mut ByteBufferMut) -> Result<(), WireError> {
        match type_ref {
            TypeRef::Primitive(primitive) => primitive.write(self, bb),
            TypeRef::Def(index) => {
                let def = &schema.defs[index];
                match def.kind {
                    DefKind::Enum(ref enum_def) => {
                        bb.write_var_int32(self.enum_number(def, enum_def)?);
                        Ok(())
                    }
                    DefKind::Message(ref message) => self.encode_message(schema, def, message, bb),
                    DefKind::Framed(ref framed) => {
                        let inner = TypeRef::Def(framed.inner);
                        framed.framing.write_length(self.size_of(schema, inner)?, bb)?;
                        self.encode_bb(schema, inner, bb)
                    }
                }
            }
        }
    }

    /// Number of bytes [encode_bb](#method.encode_bb) writes.
    pub fn size_of(&self, schema: &Schema, type_ref: TypeRef) -> Result<usize, WireError> {
        match type_ref {
            TypeRef::Primitive(primitive) => primitive.size_of(self),
            TypeRef::Def(index) => {
                let def = &schema.defs[index];
                match def.kind {
                    DefKind::Enum(ref enum_def) => {
                        Ok(varint_size(self.enum_number(def, enum_def)? as i64 as u64))
                    }
                    DefKind::Message(ref message) => self.message_size(schema, def, message),
                    DefKind::Framed(ref framed) => {
                        let payload = self.size_of(schema, TypeRef::Def(framed.inner))?;
                        framed.framing.check_length(payload)?;
                        Ok(framed.framing.prefix_size(payload) + payload)
                    }
                }
            }
        }
    }

    fn enum_number(&self, def: &Def, enum_def: &EnumDef) -> Result<i32, WireError> {
        match *self {
            Value::Enum(_, name) => enum_def.value_of(name).ok_or_else(|| WireError::UnknownEnumValue {
                enum_name: def.name.clone(),
                name:      name.to_owned(),
            }),
            Value::Int32(value) => Ok(value),
            _ => Err(self.mismatch(&def.name)),
        }
    }

    fn fields_for(&self, def: &Def) -> Result<&FieldMap<'a>, WireError> {
        match *self {
            Value::Object(_, ref fields) => Ok(fields),
            _ => Err(self.mismatch(&def.name)),
        }
    }

    fn encode_message(
        &self,
        schema: &Schema,
        def: &Def,
        message: &MessageDef,
        bb: &mut ByteBufferMut,
    ) -> Result<(), WireError> {
        let fields = self.fields_for(def)?;

        // Descriptor order keeps the output deterministic.
        for field in &message.fields {
            let value = match present(def, field, fields)? {
                Some(value) => value,
                None => continue,
            };
            let wire_type = schema.wire_type_of(field.type_ref);

            if !field.is_repeated() {
                value.encode_field(schema, field, wire_type, bb)?;
                continue;
            }

            let values = value.elements(schema, field)?;
            if values.is_empty() {
                continue;
            }
            if field.packed && wire_type != WireType::LengthDelimited {
                write_key(bb, field.tag, WireType::LengthDelimited);
                let mut payload = 0;
                for value in values {
                    payload += value.size_of(schema, field.type_ref)?;
                }
                bb.write_var_uint64(payload as u64);
                for value in values {
                    value.encode_bb(schema, field.type_ref, bb)?;
                }
            } else {
                for value in values {
                    value.encode_field(schema, field, wire_type, bb)?;
                }
            }
        }

        Ok(())
    }

    fn message_size(&self, schema: &Schema, def: &Def, message: &MessageDef) -> Result<usize, WireError> {
        let fields = self.fields_for(def)?;
        let mut size = 0;

        for field in &message.fields {
            let value = match present(def, field, fields)? {
                Some(value) => value,
                None => continue,
            };
            let wire_type = schema.wire_type_of(field.type_ref);

            if !field.is_repeated() {
                size += value.field_size(schema, field, wire_type)?;
                continue;
            }

            let values = value.elements(schema, field)?;
            if values.is_empty() {
                continue;
            }
            if field.packed && wire_type != WireType::LengthDelimited {
                let mut payload = 0;
                for value in values {
                    payload += value.size_of(schema, field.type_ref)?;
                }
                size += key_size(field.tag, WireType::LengthDelimited)
                    + varint_size(payload as u64)
                    + payload;
            } else {
                for value in values {
                    size += value.field_size(schema, field, wire_type)?;
                }
            }
        }

        Ok(size)
    }

    /// Writes one keyed occurrence of `field`.
    fn encode_field(
        &self,
        schema: &Schema,
        field: &Field,
        wire_type: WireType,
        bb: &mut ByteBufferMut,
    ) -> Result<(), WireError> {
        write_key(bb, field.tag, wire_type);
        if wire_type == WireType::LengthDelimited {
            bb.write_var_uint64(self.size_of(schema, field.type_ref)? as u64);
        }
        self.encode_bb(schema, field.type_ref, bb)
    }

    fn field_size(&self, schema: &Schema, field: &Field, wire_type: WireType) -> Result<usize, WireError> {
        let payload = self.size_of(schema, field.type_ref)?;
        let prefix = if wire_type == WireType::LengthDelimited {
            varint_size(payload as u64)
        } else {
            0
        };
        Ok(key_size(field.tag, wire_type) + prefix + payload)
    }

    fn elements(&self, schema: &Schema, field: &Field) -> Result<&[Value<'a>], WireError> {
        match *self {
            Value::Array(ref values) => Ok(values.as_slice()),
            _ => Err(WireError::TypeMismatch {
                expected: format!("repeated {}", schema.type_name(field.type_ref)),
                found:    self.kind_name(),
            }),
        }
    }

    fn mismatch(&self, expected: &str) -> WireError {
        WireError::TypeMismatch {
            expected: expected.to_owned(),
            found:    self.kind_name(),
        }
    }
}

/// Looks up `field` in `fields`, failing if it is required but absent.
fn present<'v, 'a>(
    def: &Def,
    field: &Field,
    fields: &'v FieldMap<'a>,
) -> Result<Option<&'v Value<'a>>, WireError> {
    match fields.get(field.name.as_str()) {
        Some(value) => Ok(Some(value)),
        None if field.is_required() => Err(WireError::MissingRequiredField {
            message: def.name.clone(),
            field:   field.name.clone(),
        }),
        None => Ok(None),
    }
}

fn decode_value<'a>(
    schema: &'a Schema,
    type_ref: TypeRef,
    bb: &mut ByteBuffer,
    depth: usize,
) -> Result<Value<'a>, WireError> {
    let index = match type_ref {
        TypeRef::Primitive(primitive) => return primitive.read(bb),
        TypeRef::Def(index) => index,
    };
    let def = &schema.defs[index];
    match def.kind {
        DefKind::Enum(ref enum_def) => {
            let number = bb.read_var_int32()?;
            Ok(match enum_def.name_of(number) {
                Some(name) => Value::Enum(def.name.as_str(), name),
                None => Value::Int32(number),
            })
        }
        DefKind::Message(ref message) => decode_message(schema, def, message, bb, depth),
        DefKind::Framed(ref framed) => decode_frame(schema, def, framed, bb, depth),
    }
}

fn decode_message<'a>(
    schema: &'a Schema,
    def: &'a Def,
    message: &'a MessageDef,
    bb: &mut ByteBuffer,
    depth: usize,
) -> Result<Value<'a>, WireError> {
    if depth > MAX_DEPTH {
        return Err(WireError::RecursionLimitExceeded(MAX_DEPTH));
    }

    let mut fields = FieldMap::new();

    while !bb.is_empty() {
        let (tag, wire_type) = read_key(bb)?;

        let field = match message.field_by_tag(tag) {
            Some(field) => field,
            None => {
                debug!(tag, ?wire_type, type_name = %def.name, "skipping unknown field");
                skip_field(bb, wire_type)?;
                continue;
            }
        };
        let name = field.name.as_str();
        let expected = schema.wire_type_of(field.type_ref);

        // Packed run. Accepted for any repeated scalar, whether or not the
        // field is declared packed.
        if field.is_repeated() && wire_type == WireType::LengthDelimited && expected != WireType::LengthDelimited {
            let mut run = ByteBuffer::new(bb.read_length_delimited()?);
            let values = fields.array_mut(name);
            while !run.is_empty() {
                values.push(decode_value(schema, field.type_ref, &mut run, depth)?);
            }
            continue;
        }

        if wire_type != expected {
            return Err(WireError::UnexpectedWireType {
                field: format!("{}.{}", def.name, name),
                expected,
                found: wire_type,
            });
        }

        let value = if wire_type == WireType::LengthDelimited {
            let mut payload = ByteBuffer::new(bb.read_length_delimited()?);
            decode_value(schema, field.type_ref, &mut payload, depth + 1)?
        } else {
            decode_value(schema, field.type_ref, bb, depth)?
        };

        if field.is_repeated() {
            fields.array_mut(name).push(value);
        } else {
            fields.insert(name, value);
        }
    }

    Ok(Value::Object(def.name.as_str(), fields))
}

fn decode_frame<'a>(
    schema: &'a Schema,
    def: &Def,
    framed: &FramedDef,
    bb: &mut ByteBuffer,
    depth: usize,
) -> Result<Value<'a>, WireError> {
    let start = bb.index();
    let length = framed.framing.read_length(bb)?;
    if length > bb.remaining() {
        return Err(WireError::InvalidFraming(format!(
            "frame of {} bytes at offset {} exceeds the {} remaining bytes",
            length,
            start,
            bb.remaining()
        )));
    }
    trace!(frame = %def.name, offset = start, length, "reading frame");
    let mut payload = ByteBuffer::new(bb.read_bytes(length)?);
    decode_value(schema, TypeRef::Def(framed.inner), &mut payload, depth)
}

impl Schema {
    /// Decodes the type named `type_name` from `bytes`, returning the value
    /// and the number of bytes consumed.
    pub fn read<'a>(&'a self, type_name: &str, bytes: &[u8]) -> Result<(Value<'a>, usize), WireError> {
        Value::read(self, type_name, bytes)
    }

    /// Encodes `value` as the type named `type_name`.
    pub fn write(&self, type_name: &str, value: &Value) -> Result<Vec<u8>, WireError> {
        value.encode(self, type_name)
    }

    /// Number of bytes [write](#method.write) produces.
    pub fn size_of(&self, type_name: &str, value: &Value) -> Result<usize, WireError> {
        value.encoded_len(self, type_name)
    }
}
