use std::fmt;
use std::ops::Index;

/// This type holds dynamic protobuf data.
///
/// Values can represent anything in a compiled [Schema](crate::Schema) and can
/// be converted to and from the wire format through the codec methods
/// ([Value::decode], [Value::encode], [Value::encoded_len]). Enum and field
/// names are stored using string slices from their Schema for efficiency. This
/// means that a Value can outlive the buffer it was parsed from but can't
/// outlive the schema.
///
/// Map fields have no dedicated variant: they decode as an [Array](#variant.Array)
/// of entry objects with `key` and `value` fields.
#[derive(Clone, PartialEq)]
pub enum Value<'a> {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value<'a>>),
    Enum(&'a str, &'a str),
    Object(&'a str, FieldMap<'a>),
}

impl<'a> Value<'a> {
    /// A convenience method to extract the value out of a [Bool](#variant.Bool).
    /// Returns `false` for other value kinds.
    pub fn as_bool(&self) -> bool {
        match *self {
            Value::Bool(value) => value,
            _ => false,
        }
    }

    /// A convenience method to extract the value out of an [Int32](#variant.Int32).
    /// Returns `0` for other value kinds.
    pub fn as_int32(&self) -> i32 {
        match *self {
            Value::Int32(value) => value,
            _ => 0,
        }
    }

    /// A convenience method to extract the value out of an [Int64](#variant.Int64).
    /// Returns `0` for other value kinds.
    pub fn as_int64(&self) -> i64 {
        match *self {
            Value::Int64(value) => value,
            _ => 0,
        }
    }

    /// A convenience method to extract the value out of a [UInt32](#variant.UInt32).
    /// Returns `0` for other value kinds.
    pub fn as_uint32(&self) -> u32 {
        match *self {
            Value::UInt32(value) => value,
            _ => 0,
        }
    }

    /// A convenience method to extract the value out of a [UInt64](#variant.UInt64).
    /// Returns `0` for other value kinds.
    pub fn as_uint64(&self) -> u64 {
        match *self {
            Value::UInt64(value) => value,
            _ => 0,
        }
    }

    /// A convenience method to extract the value out of a [Float](#variant.Float).
    /// Returns `0.0` for other value kinds.
    pub fn as_float(&self) -> f32 {
        match *self {
            Value::Float(value) => value,
            _ => 0.0,
        }
    }

    /// A convenience method to extract the value out of a [Double](#variant.Double).
    /// Returns `0.0` for other value kinds.
    pub fn as_double(&self) -> f64 {
        match *self {
            Value::Double(value) => value,
            _ => 0.0,
        }
    }

    /// A convenience method to extract the value out of a [String](#variant.String).
    /// Enums yield their symbolic name. Returns `""` for other value kinds.
    pub fn as_string(&self) -> &str {
        match *self {
            Value::String(ref value) => value.as_str(),
            Value::Enum(_, value) => value,
            _ => "",
        }
    }

    /// A convenience method to extract the value out of a [Bytes](#variant.Bytes).
    /// Returns an empty slice for other value kinds.
    pub fn as_bytes(&self) -> &[u8] {
        match *self {
            Value::Bytes(ref value) => value.as_slice(),
            _ => &[],
        }
    }

    /// A convenience method to get an array of values out of an [Array](#variant.Array).
    /// Returns an empty array for other value kinds.
    pub fn as_array(&self) -> &[Value<'a>] {
        match *self {
            Value::Array(ref values) => values.as_slice(),
            _ => &[],
        }
    }

    /// A convenience method to extract the value out of an [Enum](#variant.Enum).
    /// Returns `("", "")` for other value kinds.
    pub fn as_enum(&self) -> (&str, &str) {
        match *self {
            Value::Enum(name, value) => (name, value),
            _ => ("", ""),
        }
    }

    /// Views an array of map entry objects as `(key, value)` pairs. Entries
    /// missing either half are skipped.
    pub fn map_entries(&self) -> Vec<(&Value<'a>, &Value<'a>)> {
        self.as_array()
            .iter()
            .filter_map(|entry| Some((entry.get("key")?, entry.get("value")?)))
            .collect()
    }

    /// A convenience method to extract the length out of an [Array](#variant.Array).
    /// Returns `0` for other value kinds.
    pub fn len(&self) -> usize {
        match *self {
            Value::Array(ref values) => values.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A convenience method to append to an [Array](#variant.Array). Does
    /// nothing for other value kinds.
    pub fn push(&mut self, value: Value<'a>) {
        if let Value::Array(ref mut values) = *self {
            values.push(value);
        }
    }

    /// A convenience method to extract a field out of an [Object](#variant.Object).
    /// Returns `None` for other value kinds or if the field isn't present.
    pub fn get(&self, name: &str) -> Option<&Value<'a>> {
        match *self {
            Value::Object(_, ref fields) => fields.get(name),
            _ => None,
        }
    }

    /// A convenience method to update a field on an [Object](#variant.Object).
    /// Does nothing for other value kinds.
    pub fn set(&mut self, name: &'a str, value: Value<'a>) {
        if let Value::Object(_, ref mut fields) = *self {
            fields.insert(name, value);
        }
    }

    /// A convenience method to remove a field on an [Object](#variant.Object).
    /// Does nothing for other value kinds.
    pub fn remove(&mut self, name: &str) {
        if let Value::Object(_, ref mut fields) = *self {
            fields.remove(name);
        }
    }

    /// Short name of the variant, used in type mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match *self {
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::UInt32(_) => "uint32",
            Value::UInt64(_) => "uint64",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Enum(..) => "enum",
            Value::Object(..) => "object",
        }
    }
}

impl<'a> Index<usize> for Value<'a> {
    type Output = Value<'a>;

    /// A convenience method that adds support for `self[index]` expressions.
    /// It will panic if this value isn't an [Array](#variant.Array) or if the
    /// provided index is out of bounds.
    fn index(&self, index: usize) -> &Value<'a> {
        match *self {
            Value::Array(ref values) => &values[index],
            _ => panic!("cannot index into a non-array value"),
        }
    }
}

impl<'a> fmt::Debug for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match *self {
            Value::Bool(value) => value.fmt(f),
            Value::Int32(value) => value.fmt(f),
            Value::Int64(value) => value.fmt(f),
            Value::UInt32(value) => value.fmt(f),
            Value::UInt64(value) => value.fmt(f),
            Value::Float(value) => value.fmt(f),
            Value::Double(value) => value.fmt(f),
            Value::String(ref value) => value.fmt(f),
            Value::Bytes(ref value) => {
                write!(f, "<")?;
                for (i, byte) in value.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, ">")
            }
            Value::Array(ref values) => values.fmt(f),
            Value::Enum(name, ref value) => write!(f, "{}::{}", name, value),

            Value::Object(name, ref fields) => {
                let mut first = true;
                write!(f, "{} {{", name)?;

                for (key, value) in fields.iter() {
                    if first {
                        first = false;
                    } else {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {:?}", key, value)?;
                }

                write!(f, "}}")
            }
        }
    }
}

/// Field storage for [Value::Object].
///
/// Keeps fields in insertion order (the order in which they were first seen
/// on the wire when decoding) while comparing equal regardless of order.
#[derive(Clone, Default)]
pub struct FieldMap<'a> {
    entries: Vec<(&'a str, Value<'a>)>,
}

impl<'a> FieldMap<'a> {
    pub fn new() -> FieldMap<'a> {
        FieldMap { entries: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> FieldMap<'a> {
        FieldMap {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Value<'a>> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value<'a>> {
        match self.position(name) {
            Some(i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    /// Sets `name` to `value`. An existing field keeps its position and the
    /// previous value is returned.
    pub fn insert(&mut self, name: &'a str, value: Value<'a>) -> Option<Value<'a>> {
        match self.position(name) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value<'a>> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    /// Returns the array stored under `name`, creating an empty one first if
    /// the field is absent or holds a non-array value.
    pub fn array_mut(&mut self, name: &'a str) -> &mut Vec<Value<'a>> {
        let index = match self.position(name) {
            Some(i) => {
                if !matches!(self.entries[i].1, Value::Array(_)) {
                    self.entries[i].1 = Value::Array(Vec::new());
                }
                i
            }
            None => {
                self.entries.push((name, Value::Array(Vec::new())));
                self.entries.len() - 1
            }
        };
        match self.entries[index].1 {
            Value::Array(ref mut values) => values,
            _ => unreachable!("field was just set to an array"),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &Value<'a>)> + '_ {
        self.entries.iter().map(|(name, value)| (*name, value))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| *key == name)
    }
}

impl<'a> PartialEq for FieldMap<'a> {
    fn eq(&self, other: &FieldMap<'a>) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl<'a> fmt::Debug for FieldMap<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a> FromIterator<(&'a str, Value<'a>)> for FieldMap<'a> {
    fn from_iter<I: IntoIterator<Item = (&'a str, Value<'a>)>>(iter: I) -> FieldMap<'a> {
        let mut map = FieldMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object<'a>(name: &'a str, fields: Vec<(&'a str, Value<'a>)>) -> Value<'a> {
        Value::Object(name, fields.into_iter().collect())
    }

    #[test]
    fn value_basic() {
        let value = Value::Array(vec![
            Value::Bool(true),
            Value::Int32(-1),
            Value::UInt64(1),
            Value::Double(0.5),
            Value::String("abc".to_owned()),
            Value::Bytes(vec![0xde, 0xad]),
            Value::Enum("Foo", "FOO"),
            object(
                "Obj",
                vec![
                    ("key1", Value::String("value1".to_owned())),
                    ("key2", Value::String("value2".to_owned())),
                ],
            ),
        ]);

        assert_eq!(value.len(), 8);

        assert_eq!(value[0], Value::Bool(true));
        assert_eq!(value[1], Value::Int32(-1));
        assert_eq!(value[6], Value::Enum("Foo", "FOO"));

        assert!(value[0].as_bool());
        assert_eq!(value[1].as_int32(), -1);
        assert_eq!(value[2].as_uint64(), 1);
        assert_eq!(value[3].as_double(), 0.5);
        assert_eq!(value[4].as_string(), "abc");
        assert_eq!(value[5].as_bytes(), &[0xde, 0xad]);
        assert_eq!(value[6].as_string(), "FOO");
        assert_eq!(value.get("key1"), None);
        assert_eq!(
            value[7].get("key1"),
            Some(&Value::String("value1".to_owned()))
        );

        assert_eq!(
            format!("{:?}", value),
            "[true, -1, 1, 0.5, \"abc\", <de ad>, Foo::FOO, Obj {key1: \"value1\", key2: \"value2\"}]"
        );
    }

    #[test]
    fn value_push() {
        let mut value = Value::Array(vec![]);
        assert!(value.is_empty());

        value.push(Value::Int32(123));
        value.push(Value::Int32(456));
        assert_eq!(value.len(), 2);
        assert_eq!(value[0], Value::Int32(123));
        assert_eq!(value[1], Value::Int32(456));
    }

    #[test]
    fn value_set_and_remove() {
        let mut value = Value::Object("Foo", FieldMap::new());
        assert_eq!(value.get("x"), None);

        value.set("x", Value::Int32(123));
        value.set("y", Value::Int32(456));
        value.set("x", Value::Int32(789));
        assert_eq!(value.get("x"), Some(&Value::Int32(789)));
        assert_eq!(value.get("y"), Some(&Value::Int32(456)));
        assert_eq!(format!("{:?}", value), "Foo {x: 789, y: 456}");

        value.remove("x");
        assert_eq!(value.get("x"), None);
        assert_eq!(value.get("y"), Some(&Value::Int32(456)));
    }

    #[test]
    fn field_map_equality_ignores_order() {
        let a = object("P", vec![("a", Value::Int32(1)), ("b", Value::Int32(2))]);
        let b = object("P", vec![("b", Value::Int32(2)), ("a", Value::Int32(1))]);
        let c = object("P", vec![("a", Value::Int32(1))]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(c, a);
    }

    #[test]
    fn field_map_array_mut_appends() {
        let mut fields = FieldMap::new();
        fields.insert("id", Value::Int32(1));
        fields.array_mut("xs").push(Value::Int32(1));
        fields.insert("name", Value::String("n".to_owned()));
        fields.array_mut("xs").push(Value::Int32(2));

        assert_eq!(
            fields.get("xs"),
            Some(&Value::Array(vec![Value::Int32(1), Value::Int32(2)]))
        );
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["id", "xs", "name"]);
    }

    #[test]
    fn map_entries_view() {
        let stats = Value::Array(vec![
            object(
                "P_stats_entry",
                vec![("key", Value::String("a".to_owned())), ("value", Value::Int32(1))],
            ),
            object("P_stats_entry", vec![("key", Value::String("b".to_owned()))]),
        ]);
        let entries = stats.map_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0.as_string(), "a");
        assert_eq!(entries[0].1.as_int32(), 1);
    }

    // Regression guard for `get` returning `Option<&Value<'a>>` rather than a
    // reference tied to `&self` only; the latter forces `'static` borrows.
    #[test]
    fn value_get_keeps_schema_lifetime() {
        fn use_item<'a>(_: &'a Value<'static>) {}

        fn use_items(value: Value<'static>) {
            if let Some(Value::Array(items)) = value.get("items") {
                for item in items {
                    use_item(item);
                }
            }
        }

        use_items(Value::Array(vec![]));
    }
}
