use std::collections::HashSet;
use crate::{
    types::{Enum, Extend, Field, Label, Message, ProtoFile, Syntax},
    utils::{join_name, quote},
    error::ProtoError,
};
use brine_pb_schema::wire::{MAX_TAG, MIN_TAG};
use brine_pb_schema::Primitive;

/// Field numbers reserved for the protobuf implementation itself.
pub const RESERVED_TAGS: (u32, u32) = (19000, 19999);

pub const MAP_KEY_TYPES: [&str; 12] = [
    "int32", "int64", "uint32", "uint64", "sint32", "sint64",
    "fixed32", "fixed64", "sfixed32", "sfixed64", "bool", "string",
];

/// Checks one parsed file for errors that don't need type resolution.
/// Returns `Ok(())` if verification passed.
pub fn verify_file(file: &ProtoFile) -> Result<(), ProtoError> {
    let scope = file.package.clone().unwrap_or_default();

    for message in &file.messages {
        verify_message(file.syntax, &scope, message)?;
    }
    for enum_ in &file.enums {
        verify_enum(file.syntax, &scope, enum_)?;
    }
    for extend in &file.extends {
        verify_extend(&scope, extend)?;
    }
    Ok(())
}

fn verify_message(syntax: Syntax, scope: &str, message: &Message) -> Result<(), ProtoError> {
    let name = join_name(scope, &message.name);

    let mut tags = HashSet::new();
    let mut names = HashSet::new();
    for field in &message.fields {
        verify_field(&name, field)?;
        if !tags.insert(field.tag) {
            return Err(ProtoError::DuplicateTag {
                message: name,
                tag:     field.tag,
            });
        }
        if !names.insert(field.name.as_str()) {
            return Err(ProtoError::DuplicateField {
                message: name,
                field:   field.name.clone(),
            });
        }
        if syntax == Syntax::Proto3 && field.label == Label::Required {
            return Err(ProtoError::VerifierError(format!(
                "Required fields are not allowed in proto3 (field {} of {})",
                quote(&field.name),
                quote(&name)
            )));
        }
    }

    for range in &message.extensions {
        if range.start < MIN_TAG || range.end > MAX_TAG || range.start > range.end {
            return Err(ProtoError::VerifierError(format!(
                "Invalid extension range {} to {} in {}",
                range.start,
                range.end,
                quote(&name)
            )));
        }
        if let Some(field) = message
            .fields
            .iter()
            .find(|f| range.start <= f.tag && f.tag <= range.end)
        {
            return Err(ProtoError::VerifierError(format!(
                "The tag of field {} in {} lies inside an extension range",
                quote(&field.name),
                quote(&name)
            )));
        }
    }

    for nested in &message.messages {
        verify_message(syntax, &name, nested)?;
    }
    for enum_ in &message.enums {
        verify_enum(syntax, &name, enum_)?;
    }
    for extend in &message.extends {
        verify_extend(&name, extend)?;
    }
    Ok(())
}

fn verify_field(message: &str, field: &Field) -> Result<(), ProtoError> {
    if field.tag < MIN_TAG || field.tag > MAX_TAG {
        return Err(ProtoError::VerifierError(format!(
            "The tag of field {} in {} must be between {} and {}",
            quote(&field.name),
            quote(message),
            MIN_TAG,
            MAX_TAG
        )));
    }
    if RESERVED_TAGS.0 <= field.tag && field.tag <= RESERVED_TAGS.1 {
        return Err(ProtoError::VerifierError(format!(
            "The tag {} of field {} in {} is reserved for the protobuf implementation",
            field.tag,
            quote(&field.name),
            quote(message)
        )));
    }

    if let Some(ref map) = field.map {
        if field.label != Label::None {
            return Err(ProtoError::VerifierError(format!(
                "Map field {} in {} cannot have a label",
                quote(&field.name),
                quote(message)
            )));
        }
        if !MAP_KEY_TYPES.contains(&map.key.as_str()) {
            return Err(ProtoError::VerifierError(format!(
                "Invalid map key type {} for field {} in {}",
                quote(&map.key),
                quote(&field.name),
                quote(message)
            )));
        }
    }

    if field.packed.is_some() {
        let packable = Primitive::from_name(&field.type_).map_or(true, |p| p.is_packable());
        if field.label != Label::Repeated || field.map.is_some() || !packable {
            return Err(ProtoError::VerifierError(format!(
                "The packed option is only valid on repeated scalar fields ({} in {})",
                quote(&field.name),
                quote(message)
            )));
        }
    }
    Ok(())
}

fn verify_enum(syntax: Syntax, scope: &str, enum_: &Enum) -> Result<(), ProtoError> {
    let name = join_name(scope, &enum_.name);

    let first = match enum_.values.first() {
        Some(first) => first,
        None => {
            return Err(ProtoError::VerifierError(format!(
                "The enum {} must have at least one value",
                quote(&name)
            )))
        }
    };
    if syntax == Syntax::Proto3 && first.value != 0 {
        return Err(ProtoError::VerifierError(format!(
            "The first value of enum {} must be zero in proto3",
            quote(&name)
        )));
    }

    let mut names = HashSet::new();
    for value in &enum_.values {
        if !names.insert(value.name.as_str()) {
            return Err(ProtoError::VerifierError(format!(
                "The enum value {} is defined twice in {}",
                quote(&value.name),
                quote(&name)
            )));
        }
    }
    Ok(())
}

fn verify_extend(scope: &str, extend: &Extend) -> Result<(), ProtoError> {
    let target = join_name(scope, &extend.name);

    let mut tags = HashSet::new();
    for field in &extend.fields {
        verify_field(&target, field)?;
        if field.map.is_some() {
            return Err(ProtoError::VerifierError(format!(
                "Extension field {} cannot be a map",
                quote(&field.name)
            )));
        }
        if field.label == Label::Required {
            return Err(ProtoError::VerifierError(format!(
                "Extension field {} cannot be required",
                quote(&field.name)
            )));
        }
        if !tags.insert(field.tag) {
            return Err(ProtoError::DuplicateTag {
                message: extend.name.clone(),
                tag:     field.tag,
            });
        }
    }
    Ok(())
}
