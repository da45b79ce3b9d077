use brine_pb_schema::{
    DefKind, EnumDef, EnumValue as SchemaEnumValue, Field as SchemaField, Label as SchemaLabel,
    MessageDef, Primitive, Schema, TypeRef, WireType,
};
use tracing::debug;

use crate::{
    error::ProtoError,
    parser::parse_schema,
    tokenizer::tokenize_schema,
    types::{Enum, Extend, Field, Label, Message, ProtoFile, Syntax},
    utils::join_name,
    verifier::verify_file,
};

/// Tokenizes, parses and verifies one `.proto` source.
pub fn parse_proto(text: &str) -> Result<ProtoFile, ProtoError> {
    let tokens = tokenize_schema(text)?;
    let file = parse_schema(&tokens)?;
    verify_file(&file)?;
    Ok(file)
}

/// Compiles one `.proto` source into a flat [Schema].
pub fn compile_schema(text: &str) -> Result<Schema, ProtoError> {
    compile(&parse_proto(text)?)
}

/// Compiles one parsed file, extensions included.
pub fn compile(file: &ProtoFile) -> Result<Schema, ProtoError> {
    compile_all(std::slice::from_ref(file))
}

/// Compiles several parsed files into one flat [Schema].
///
/// Types are declared across all files before any field is resolved, so
/// files may refer to each other's types. Extension blocks are merged last.
pub fn compile_all(files: &[ProtoFile]) -> Result<Schema, ProtoError> {
    for file in files {
        verify_file(file)?;
    }

    let mut schema = Schema::default();
    for file in files {
        let scope = package_scope(file);
        for message in &file.messages {
            declare_message(&mut schema, &scope, message)?;
        }
        for enum_ in &file.enums {
            declare_enum(&mut schema, &scope, enum_)?;
        }
    }

    for file in files {
        let scope = package_scope(file);
        for message in &file.messages {
            define_message(&mut schema, file.syntax, &scope, message)?;
        }
    }

    for file in files {
        merge_extensions(file, &mut schema)?;
    }

    Ok(schema)
}

/// Appends the fields of every `extend` block in `file` to their target
/// messages in `schema`.
///
/// Merging the same blocks twice is a no-op. A tag already used by a
/// different field of the target is rejected, as is a tag outside the
/// target's declared extension ranges.
pub fn merge_extensions(file: &ProtoFile, schema: &mut Schema) -> Result<(), ProtoError> {
    let scope = package_scope(file);
    for extend in &file.extends {
        merge_extend(schema, file.syntax, &scope, extend)?;
    }
    for message in &file.messages {
        merge_nested_extensions(schema, file.syntax, &scope, message)?;
    }
    Ok(())
}

fn merge_nested_extensions(
    schema: &mut Schema,
    syntax: Syntax,
    scope: &str,
    message: &Message,
) -> Result<(), ProtoError> {
    let name = join_name(scope, &message.name);
    for extend in &message.extends {
        merge_extend(schema, syntax, &name, extend)?;
    }
    for nested in &message.messages {
        merge_nested_extensions(schema, syntax, &name, nested)?;
    }
    Ok(())
}

fn merge_extend(schema: &mut Schema, syntax: Syntax, scope: &str, extend: &Extend) -> Result<(), ProtoError> {
    let target = match resolve_type(schema, scope, &extend.name) {
        Some(TypeRef::Def(index)) if schema.defs[index].as_message().is_some() => {
            schema.defs[index].name.clone()
        }
        _ => return Err(ProtoError::UnknownExtensionTarget(extend.name.clone())),
    };

    for field in &extend.fields {
        let resolved = lower_field(schema, syntax, scope, &target, field)?;
        let message = schema
            .message_def_mut(&target)
            .ok_or_else(|| ProtoError::UnknownExtensionTarget(extend.name.clone()))?;

        if let Some(existing) = message.field_by_tag(resolved.tag) {
            if *existing == resolved {
                continue;
            }
            return Err(ProtoError::DuplicateTag {
                message: target,
                tag:     resolved.tag,
            });
        }
        if message.field_by_name(&resolved.name).is_some() {
            return Err(ProtoError::DuplicateField {
                message: target,
                field:   resolved.name,
            });
        }
        if !message.in_extension_range(resolved.tag) {
            return Err(ProtoError::ExtensionOutOfRange {
                message: target,
                field:   resolved.name,
                tag:     resolved.tag,
            });
        }

        debug!(extended = %target, field = %resolved.name, tag = resolved.tag, "merged extension field");
        message.add_field(resolved);
    }
    Ok(())
}

fn package_scope(file: &ProtoFile) -> String {
    file.package.clone().unwrap_or_default()
}

/// Name of the synthetic entry message for a map field.
pub fn map_entry_name(message: &str, field: &str) -> String {
    format!("{}_{}_entry", message, field)
}

fn add_def(schema: &mut Schema, name: &str, kind: DefKind) -> Result<(), ProtoError> {
    if schema.def_by_name(name).is_some() {
        return Err(ProtoError::DuplicateType(name.to_string()));
    }
    schema.add_def(name, kind)?;
    debug!(type_name = %name, "registered type");
    Ok(())
}

/// First pass: registers the message, its map entries and every nested type
/// so that fields can refer to types declared later.
fn declare_message(schema: &mut Schema, scope: &str, message: &Message) -> Result<(), ProtoError> {
    let name = join_name(scope, &message.name);

    let def = MessageDef {
        extension_ranges: message
            .extensions
            .iter()
            .map(|range| (range.start, range.end))
            .collect(),
        ..MessageDef::default()
    };
    add_def(schema, &name, DefKind::Message(def))?;

    for field in message.fields.iter().filter(|f| f.map.is_some()) {
        add_def(
            schema,
            &map_entry_name(&name, &field.name),
            DefKind::Message(MessageDef::default()),
        )?;
    }
    for nested in &message.messages {
        declare_message(schema, &name, nested)?;
    }
    for enum_ in &message.enums {
        declare_enum(schema, &name, enum_)?;
    }
    Ok(())
}

fn declare_enum(schema: &mut Schema, scope: &str, enum_: &Enum) -> Result<(), ProtoError> {
    let values = enum_
        .values
        .iter()
        .map(|v| SchemaEnumValue {
            name:  v.name.clone(),
            value: v.value,
        })
        .collect();
    add_def(schema, &join_name(scope, &enum_.name), DefKind::Enum(EnumDef::new(values)))
}

/// Second pass: resolves field types and fills in the declared messages.
fn define_message(schema: &mut Schema, syntax: Syntax, scope: &str, message: &Message) -> Result<(), ProtoError> {
    let name = join_name(scope, &message.name);

    for field in &message.fields {
        let resolved = match field.map {
            Some(ref map) => {
                let entry_name = map_entry_name(&name, &field.name);
                let key = Field {
                    name:   "key".to_string(),
                    type_:  map.key.clone(),
                    tag:    1,
                    label:  Label::Optional,
                    map:    None,
                    packed: None,
                    ..field.clone()
                };
                let value = Field {
                    name:  "value".to_string(),
                    type_: map.value.clone(),
                    tag:   2,
                    ..key.clone()
                };
                for entry_field in [key, value] {
                    let lowered = lower_field(schema, syntax, &name, &entry_name, &entry_field)?;
                    push_field(schema, &entry_name, lowered);
                }
                SchemaField {
                    name:     field.name.clone(),
                    tag:      field.tag,
                    type_ref: schema.resolve(&entry_name)?,
                    label:    SchemaLabel::Repeated,
                    packed:   false,
                }
            }
            None => lower_field(schema, syntax, &name, &name, field)?,
        };
        push_field(schema, &name, resolved);
    }

    for nested in &message.messages {
        define_message(schema, syntax, &name, nested)?;
    }
    Ok(())
}

fn push_field(schema: &mut Schema, message: &str, field: SchemaField) {
    if let Some(def) = schema.message_def_mut(message) {
        def.add_field(field);
    }
}

/// Converts an AST field into a descriptor field. Types resolve from `scope`;
/// `message` is the owning message, used in errors.
fn lower_field(
    schema: &Schema,
    syntax: Syntax,
    scope: &str,
    message: &str,
    field: &Field,
) -> Result<SchemaField, ProtoError> {
    let type_ref = resolve_type(schema, scope, &field.type_).ok_or_else(|| ProtoError::UnknownFieldType {
        message: message.to_string(),
        field:   field.name.clone(),
        type_:   field.type_.clone(),
    })?;

    if let TypeRef::Def(index) = type_ref {
        if let DefKind::Framed(_) = schema.defs[index].kind {
            return Err(ProtoError::UnknownFieldType {
                message: message.to_string(),
                field:   field.name.clone(),
                type_:   field.type_.clone(),
            });
        }
    }

    let label = match field.label {
        Label::None | Label::Optional => SchemaLabel::Optional,
        Label::Required => SchemaLabel::Required,
        Label::Repeated => SchemaLabel::Repeated,
    };

    // proto3 packs repeated scalars unless told otherwise; proto2 only when asked.
    let packed = label == SchemaLabel::Repeated
        && schema.wire_type_of(type_ref) != WireType::LengthDelimited
        && field.packed.unwrap_or(syntax == Syntax::Proto3);

    Ok(SchemaField {
        name: field.name.clone(),
        tag: field.tag,
        type_ref,
        label,
        packed,
    })
}

/// Resolves a type reference the way protobuf does: a leading `.` names a
/// fully-qualified type, otherwise the innermost enclosing scope is searched
/// first, moving outward to the package and finally the root.
pub fn resolve_type(schema: &Schema, scope: &str, name: &str) -> Option<TypeRef> {
    if let Some(absolute) = name.strip_prefix('.') {
        return schema.def_by_name(absolute).map(|def| TypeRef::Def(def.index));
    }
    if let Some(primitive) = Primitive::from_name(name) {
        return Some(TypeRef::Primitive(primitive));
    }

    let mut scope = scope;
    loop {
        if let Some(def) = schema.def_by_name(&join_name(scope, name)) {
            return Some(TypeRef::Def(def.index));
        }
        if scope.is_empty() {
            return None;
        }
        scope = match scope.rfind('.') {
            Some(i) => &scope[..i],
            None => "",
        };
    }
}
