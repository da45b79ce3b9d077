use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Syntax {
    #[default]
    Proto2,
    Proto3,
}

/// One parsed `.proto` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProtoFile {
    pub syntax:   Syntax,
    pub package:  Option<String>,
    pub imports:  Vec<String>,
    pub messages: Vec<Message>,
    pub enums:    Vec<Enum>,
    pub extends:  Vec<Extend>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub name:       String,
    pub line:       usize,
    pub column:     usize,
    pub fields:     Vec<Field>,
    pub messages:   Vec<Message>,
    pub enums:      Vec<Enum>,
    pub extends:    Vec<Extend>,
    pub extensions: Vec<ExtensionRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    /// No label: proto3 singular fields and map fields.
    None,
    Optional,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapType {
    pub key:   String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name:   String,
    pub line:   usize,
    pub column: usize,
    /// The value type for map fields.
    pub type_:  String,
    pub tag:    u32,
    pub label:  Label,
    pub map:    Option<MapType>,
    /// Explicit `[packed = ...]` option, if any.
    pub packed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enum {
    pub name:   String,
    pub line:   usize,
    pub column: usize,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumValue {
    pub name:   String,
    pub line:   usize,
    pub column: usize,
    pub value:  i32,
}

/// An inclusive `extensions start to end;` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtensionRange {
    pub start: u32,
    pub end:   u32,
}

/// An `extend Target { ... }` block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extend {
    pub name:   String,
    pub line:   usize,
    pub column: usize,
    pub fields: Vec<Field>,
}
