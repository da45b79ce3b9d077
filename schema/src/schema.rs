use std::collections::HashMap;

use serde::Serialize;

use crate::bb::{varint_size, ByteBuffer, ByteBufferMut};
use crate::error::WireError;
use crate::primitive::Primitive;
use crate::wire::WireType;

/// What a field's values are: a scalar, or another definition in the same
/// [Schema] addressed by index.
///
/// Indices let a message refer to itself (directly or through a cycle)
/// without nested ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    Primitive(Primitive),
    Def(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Optional,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name:     String,
    pub tag:      u32,
    pub type_ref: TypeRef,
    pub label:    Label,
    /// Only meaningful for repeated fields whose element wire type is not
    /// length-delimited.
    pub packed:   bool,
}

impl Field {
    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    pub fn is_required(&self) -> bool {
        self.label == Label::Required
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageDef {
    pub fields:           Vec<Field>,
    /// Inclusive `(start, end)` ranges reserved for extension fields.
    pub extension_ranges: Vec<(u32, u32)>,
    #[serde(skip)]
    pub field_tag_to_index: HashMap<u32, usize>,
    #[serde(skip)]
    pub field_name_to_index: HashMap<String, usize>,
}

impl MessageDef {
    pub fn new(fields: Vec<Field>) -> MessageDef {
        let mut message = MessageDef::default();
        for field in fields {
            message.add_field(field);
        }
        message
    }

    /// Appends a field. Callers are expected to have rejected duplicate tags.
    pub fn add_field(&mut self, field: Field) {
        let index = self.fields.len();
        self.field_tag_to_index.insert(field.tag, index);
        self.field_name_to_index.insert(field.name.clone(), index);
        self.fields.push(field);
    }

    pub fn field_by_tag(&self, tag: u32) -> Option<&Field> {
        self.field_tag_to_index.get(&tag).map(|i| &self.fields[*i])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.field_name_to_index.get(name).map(|i| &self.fields[*i])
    }

    pub fn in_extension_range(&self, tag: u32) -> bool {
        self.extension_ranges
            .iter()
            .any(|&(start, end)| start <= tag && tag <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumValue {
    pub name:  String,
    pub value: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnumDef {
    pub values: Vec<EnumValue>,
    #[serde(skip)]
    pub value_to_index: HashMap<i32, usize>,
    #[serde(skip)]
    pub name_to_index: HashMap<String, usize>,
}

impl EnumDef {
    pub fn new(values: Vec<EnumValue>) -> EnumDef {
        let mut value_to_index = HashMap::new();
        let mut name_to_index = HashMap::new();
        for (i, value) in values.iter().enumerate() {
            // Aliases decode to the first declared name.
            value_to_index.entry(value.value).or_insert(i);
            name_to_index.insert(value.name.clone(), i);
        }
        EnumDef {
            values,
            value_to_index,
            name_to_index,
        }
    }

    pub fn name_of(&self, value: i32) -> Option<&str> {
        self.value_to_index
            .get(&value)
            .map(|i| self.values[*i].name.as_str())
    }

    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.name_to_index.get(name).map(|i| self.values[*i].value)
    }
}

/// How a framed definition delimits its inner message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// A length prefix encoded as the given integer primitive.
    Prefixed(Primitive),
    /// Every frame holds exactly this many payload bytes.
    Fixed(usize),
}

impl Framing {
    /// Builds a framing from its configuration. Exactly one of `length_type`
    /// and `length` must be given.
    pub fn from_config(length_type: Option<&str>, length: Option<usize>) -> Result<Framing, WireError> {
        match (length_type, length) {
            (Some(name), None) => match Primitive::from_name(name) {
                Some(primitive) if primitive.is_integer() => Ok(Framing::Prefixed(primitive)),
                _ => Err(WireError::InvalidFraming(format!(
                    "\"{}\" is not an integer type",
                    name
                ))),
            },
            (None, Some(length)) => Ok(Framing::Fixed(length)),
            (Some(_), Some(_)) => Err(WireError::InvalidFraming(
                "both a length type and a fixed length are configured".to_owned(),
            )),
            (None, None) => Err(WireError::InvalidFraming(
                "neither a length type nor a fixed length is configured".to_owned(),
            )),
        }
    }

    /// Reads the payload length of the next frame.
    pub fn read_length(&self, bb: &mut ByteBuffer) -> Result<usize, WireError> {
        let primitive = match *self {
            Framing::Fixed(length) => return Ok(length),
            Framing::Prefixed(primitive) => primitive,
        };
        let length: i128 = match primitive {
            Primitive::UInt32 => bb.read_var_uint32()? as i128,
            Primitive::UInt64 => bb.read_var_uint64()? as i128,
            Primitive::Int32 => bb.read_var_int32()? as i128,
            Primitive::Int64 => bb.read_var_int64()? as i128,
            Primitive::SInt32 => bb.read_zigzag32()? as i128,
            Primitive::SInt64 => bb.read_zigzag64()? as i128,
            Primitive::Fixed32 => bb.read_fixed32()? as i128,
            Primitive::SFixed32 => bb.read_sfixed32()? as i128,
            Primitive::Fixed64 => bb.read_fixed64()? as i128,
            Primitive::SFixed64 => bb.read_sfixed64()? as i128,
            other => {
                return Err(WireError::InvalidFraming(format!(
                    "\"{}\" is not an integer type",
                    other.name()
                )))
            }
        };
        usize::try_from(length)
            .map_err(|_| WireError::InvalidFraming(format!("invalid frame length {}", length)))
    }

    /// Fails if a payload of `length` bytes cannot be framed.
    pub fn check_length(&self, length: usize) -> Result<(), WireError> {
        match *self {
            Framing::Fixed(fixed) if fixed != length => Err(WireError::InvalidFraming(format!(
                "payload of {} bytes does not fit a fixed frame of {} bytes",
                length, fixed
            ))),
            Framing::Prefixed(primitive) if length as u64 > max_length(primitive) => {
                Err(WireError::InvalidFraming(format!(
                    "frame length {} does not fit {}",
                    length,
                    primitive.name()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Writes the prefix for a payload of `length` bytes. Fixed framing has no
    /// prefix, but the payload must match the configured length.
    pub fn write_length(&self, length: usize, bb: &mut ByteBufferMut) -> Result<(), WireError> {
        self.check_length(length)?;
        if let Framing::Prefixed(primitive) = *self {
            match primitive {
                Primitive::SInt32 | Primitive::SInt64 => bb.write_zigzag64(length as i64),
                Primitive::Fixed32 | Primitive::SFixed32 => bb.write_fixed32(length as u32),
                Primitive::Fixed64 | Primitive::SFixed64 => bb.write_fixed64(length as u64),
                _ => bb.write_var_uint64(length as u64),
            }
        }
        Ok(())
    }

    /// Number of bytes the prefix for a payload of `length` bytes occupies.
    pub fn prefix_size(&self, length: usize) -> usize {
        match *self {
            Framing::Fixed(_) => 0,
            Framing::Prefixed(primitive) => match primitive.wire_type() {
                WireType::Fixed32 => 4,
                WireType::Fixed64 => 8,
                _ if matches!(primitive, Primitive::SInt32 | Primitive::SInt64) => {
                    varint_size((length as u64) << 1)
                }
                _ => varint_size(length as u64),
            },
        }
    }
}

fn max_length(primitive: Primitive) -> u64 {
    match primitive {
        Primitive::Int32 | Primitive::SInt32 | Primitive::SFixed32 => i32::MAX as u64,
        Primitive::UInt32 | Primitive::Fixed32 => u32::MAX as u64,
        Primitive::Int64 | Primitive::SInt64 | Primitive::SFixed64 => i64::MAX as u64,
        _ => u64::MAX,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FramedDef {
    /// Index of the message definition carried in each frame.
    pub inner:   usize,
    pub framing: Framing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefKind {
    Message(MessageDef),
    Enum(EnumDef),
    Framed(FramedDef),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Def {
    /// The fully-qualified name, e.g. `game.Player.Stats`.
    pub name:  String,
    pub index: usize,
    #[serde(flatten)]
    pub kind:  DefKind,
}

impl Def {
    pub fn new(name: String, kind: DefKind) -> Def {
        Def { name, index: 0, kind }
    }

    pub fn as_message(&self) -> Option<&MessageDef> {
        match self.kind {
            DefKind::Message(ref message) => Some(message),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDef> {
        match self.kind {
            DefKind::Enum(ref enum_def) => Some(enum_def),
            _ => None,
        }
    }
}

/// The flat map from fully-qualified type name to definition.
///
/// Built once by the compiler. Extension merging goes through
/// [message_def_mut](#method.message_def_mut) before the schema is shared;
/// the codec only ever borrows it immutably.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    pub defs: Vec<Def>,
    #[serde(skip)]
    pub def_name_to_index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(mut defs: Vec<Def>) -> Schema {
        let mut def_name_to_index = HashMap::new();
        for (i, def) in defs.iter_mut().enumerate() {
            def.index = i;
            def_name_to_index.insert(def.name.clone(), i);
        }
        Schema {
            defs,
            def_name_to_index,
        }
    }

    pub fn def_by_name(&self, name: &str) -> Option<&Def> {
        self.def_name_to_index.get(name).map(|i| &self.defs[*i])
    }

    /// Resolves a primitive keyword or a fully-qualified definition name.
    pub fn resolve(&self, name: &str) -> Result<TypeRef, WireError> {
        if let Some(primitive) = Primitive::from_name(name) {
            return Ok(TypeRef::Primitive(primitive));
        }
        self.def_name_to_index
            .get(name)
            .map(|i| TypeRef::Def(*i))
            .ok_or_else(|| WireError::UnknownType(name.to_owned()))
    }

    /// The wire type a single value of `type_ref` is written with.
    pub fn wire_type_of(&self, type_ref: TypeRef) -> WireType {
        match type_ref {
            TypeRef::Primitive(primitive) => primitive.wire_type(),
            TypeRef::Def(index) => match self.defs[index].kind {
                DefKind::Enum(_) => WireType::Varint,
                DefKind::Message(_) | DefKind::Framed(_) => WireType::LengthDelimited,
            },
        }
    }

    /// Display name for a type reference.
    pub fn type_name(&self, type_ref: TypeRef) -> &str {
        match type_ref {
            TypeRef::Primitive(primitive) => primitive.name(),
            TypeRef::Def(index) => self.defs[index].name.as_str(),
        }
    }

    /// Registers a new definition and returns its index.
    pub fn add_def(&mut self, name: &str, kind: DefKind) -> Result<usize, WireError> {
        if self.def_name_to_index.contains_key(name) || Primitive::from_name(name).is_some() {
            return Err(WireError::DuplicateType(name.to_owned()));
        }
        let index = self.defs.len();
        self.def_name_to_index.insert(name.to_owned(), index);
        self.defs.push(Def {
            name: name.to_owned(),
            index,
            kind,
        });
        Ok(index)
    }

    /// Registers a framed wrapper around the message `inner`, configured with
    /// exactly one of a length prefix type or a fixed frame length.
    pub fn add_framed(
        &mut self,
        name: &str,
        inner: &str,
        length_type: Option<&str>,
        length: Option<usize>,
    ) -> Result<usize, WireError> {
        let framing = Framing::from_config(length_type, length)?;
        let inner = match self.resolve(inner)? {
            TypeRef::Def(index) if self.defs[index].as_message().is_some() => index,
            _ => {
                return Err(WireError::InvalidFraming(format!(
                    "\"{}\" is not a message type",
                    inner
                )))
            }
        };
        self.add_def(name, DefKind::Framed(FramedDef { inner, framing }))
    }

    /// Mutable access to a message definition, used to merge extensions.
    pub fn message_def_mut(&mut self, name: &str) -> Option<&mut MessageDef> {
        let index = *self.def_name_to_index.get(name)?;
        match self.defs[index].kind {
            DefKind::Message(ref mut message) => Some(message),
            _ => None,
        }
    }
}
