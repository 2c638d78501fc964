//! Recursive shape check for converted output.
//!
//! Runs over the serialized JSON so it can vet output produced anywhere, not
//! only by this crate. Stops at the first violation.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::input::{EntityClass, EntityType};
use crate::schema::Output;

/// First mismatch found, with a JSON path such as
/// `$.documents[0].entities[2].children[0].type`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("schema violation at {path}: {reason}")]
pub struct SchemaViolation {
    pub path: String,
    pub reason: String,
}

impl SchemaViolation {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

type Validation<T = ()> = Result<T, SchemaViolation>;

/// Validate typed output through its JSON form.
pub fn validate_output(output: &Output) -> Validation {
    let value = serde_json::to_value(output)
        .map_err(|e| SchemaViolation::new("$", format!("not serializable: {}", e)))?;
    validate_value(&value)
}

/// Validate an arbitrary JSON value against the output shape.
pub fn validate_value(value: &Value) -> Validation {
    let root = object(value, "$")?;
    let documents = array(root, "documents", "$")?;

    for (i, document) in documents.iter().enumerate() {
        validate_document(document, &format!("$.documents[{}]", i))?;
    }
    Ok(())
}

fn validate_document(value: &Value, path: &str) -> Validation {
    let document = object(value, path)?;
    non_empty_str(document, "id", path)?;

    for (i, entity) in array(document, "entities", path)?.iter().enumerate() {
        validate_entity(entity, &format!("{}.entities[{}]", path, i))?;
    }
    for (i, annotation) in array(document, "annotations", path)?.iter().enumerate() {
        validate_annotation(annotation, &format!("{}.annotations[{}]", path, i))?;
    }
    Ok(())
}

fn validate_entity(value: &Value, path: &str) -> Validation {
    let entity = object(value, path)?;
    non_empty_str(entity, "id", path)?;
    non_empty_str(entity, "name", path)?;
    one_of(entity, "type", EntityType::NAMES, path)?;
    one_of(entity, "class", EntityClass::NAMES, path)?;

    for (i, child) in array(entity, "children", path)?.iter().enumerate() {
        validate_entity(child, &format!("{}.children[{}]", path, i))?;
    }
    Ok(())
}

fn validate_annotation(value: &Value, path: &str) -> Validation {
    let annotation = object(value, path)?;
    non_empty_str(annotation, "id", path)?;

    let entity_path = format!("{}.entity", path);
    let entity = object(field(annotation, "entity", path)?, &entity_path)?;
    non_empty_str(entity, "id", &entity_path)?;
    non_empty_str(entity, "name", &entity_path)?;

    // any JSON value, null included; only the key is required
    field(annotation, "value", path)?;
    if !field(annotation, "index", path)?.is_number() {
        return Err(SchemaViolation::new(
            &format!("{}.index", path),
            "expected a number",
        ));
    }

    for (i, child) in array(annotation, "children", path)?.iter().enumerate() {
        validate_annotation(child, &format!("{}.children[{}]", path, i))?;
    }
    Ok(())
}

fn object<'v>(value: &'v Value, path: &str) -> Validation<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| SchemaViolation::new(path, "expected an object"))
}

fn field<'v>(object: &'v Map<String, Value>, key: &str, path: &str) -> Validation<&'v Value> {
    object
        .get(key)
        .ok_or_else(|| SchemaViolation::new(&format!("{}.{}", path, key), "missing"))
}

fn array<'v>(object: &'v Map<String, Value>, key: &str, path: &str) -> Validation<&'v Vec<Value>> {
    field(object, key, path)?
        .as_array()
        .ok_or_else(|| SchemaViolation::new(&format!("{}.{}", path, key), "expected an array"))
}

fn non_empty_str<'v>(object: &'v Map<String, Value>, key: &str, path: &str) -> Validation<&'v str> {
    match field(object, key, path)?.as_str() {
        Some(s) if !s.is_empty() => Ok(s),
        Some(_) => Err(SchemaViolation::new(&format!("{}.{}", path, key), "must not be empty")),
        None => Err(SchemaViolation::new(&format!("{}.{}", path, key), "expected a string")),
    }
}

fn one_of(object: &Map<String, Value>, key: &str, allowed: &[&str], path: &str) -> Validation {
    let value = non_empty_str(object, key, path)?;
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(SchemaViolation::new(
            &format!("{}.{}", path, key),
            format!("'{}' is not one of {:?}", value, allowed),
        ))
    }
}
