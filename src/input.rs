//! Flat input records.
//!
//! Every record points *up*: `refs` lists the identifiers of the parents the
//! record wants to be attached under. Absent `refs`/`indices` deserialize as
//! empty lists.

use serde::{Deserialize, Serialize};

/// Root of a conversion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Input {
    pub documents: Vec<Document>,
}

/// One document: a flat list of entities and a flat list of annotations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(rename = "class")]
    pub entity_class: EntityClass,
    #[serde(default)]
    pub refs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Manual,
    Regex,
    Model,
}

impl EntityType {
    /// Wire names accepted by the validator.
    pub const NAMES: &'static [&'static str] = &["MANUAL", "REGEX", "MODEL"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityClass {
    Entity,
    Relation,
    Classification,
}

impl EntityClass {
    /// Wire names accepted by the validator.
    pub const NAMES: &'static [&'static str] = &["ENTITY", "RELATION", "CLASSIFICATION"];
}

/// A value anchored to an entity and, optionally, to character ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub entity_id: String,
    #[serde(default)]
    pub refs: Vec<String>,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub indices: Vec<Range>,
}

/// Character-offset range, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: u64,
    pub end: u64,
}

/// A record that can be linked into a hierarchy through parent references.
pub trait Referencing {
    fn refs(&self) -> &[String];

    /// True roots declare no parent at all.
    fn is_root(&self) -> bool {
        self.refs().is_empty()
    }
}

impl Referencing for Entity {
    fn refs(&self) -> &[String] {
        &self.refs
    }
}

impl Referencing for Annotation {
    fn refs(&self) -> &[String] {
        &self.refs
    }
}
