//! Reftree - rebuilds nested entity and annotation trees from flat,
//! parent-referencing document records.

pub mod annotations;
pub mod config;
pub mod converter;
pub mod entities;
pub mod error;
pub mod input;
pub mod reference_index;
pub mod schema;
pub mod sort;
pub mod validate;

pub use converter::{
    convert_document, convert_input, convert_input_with, convert_json, convert_validated,
    ConvertOptions,
};
pub use error::{Error, Result};
pub use input::{Annotation, Document, Entity, EntityClass, EntityType, Input, Range};
pub use schema::{ConvertedAnnotation, ConvertedDocument, ConvertedEntity, Output};
pub use validate::{validate_output, validate_value, SchemaViolation};
