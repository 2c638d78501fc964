//! Nested output types.
//!
//! Children are `Rc`-shared: a record reachable from several parents is built
//! once and every occurrence points at the same node.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::input::{EntityClass, EntityType};

/// Index given to an annotation with neither ranges nor children.
/// Larger than any real offset so such annotations sort last.
pub const UNBOUNDED_INDEX: u64 = u64::MAX;

/// Default limit on how many levels a converted tree may nest.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Smallest usable limit: a parent with leaf children.
pub const MIN_MAX_DEPTH: usize = 2;

/// Root conversion result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub documents: Vec<ConvertedDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedDocument {
    pub id: String,
    /// Every input entity, sorted; nested occurrences share these nodes.
    pub entities: Vec<Rc<ConvertedEntity>>,
    /// Root annotations only, sorted by index.
    pub annotations: Vec<Rc<ConvertedAnnotation>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedEntity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(rename = "class")]
    pub entity_class: EntityClass,
    pub children: Vec<Rc<ConvertedEntity>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedAnnotation {
    pub id: String,
    pub entity: EntitySnapshot,
    pub value: serde_json::Value,
    pub index: u64,
    pub children: Vec<Rc<ConvertedAnnotation>>,
}

impl ConvertedAnnotation {
    /// True when neither the annotation nor any descendant carries an offset.
    pub fn is_unbounded(&self) -> bool {
        self.index == UNBOUNDED_INDEX
    }
}

/// Denormalized `{id, name}` of the entity an annotation is anchored to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: String,
    pub name: String,
}

impl From<&ConvertedEntity> for EntitySnapshot {
    fn from(entity: &ConvertedEntity) -> Self {
        Self {
            id: entity.id.clone(),
            name: entity.name.clone(),
        }
    }
}
