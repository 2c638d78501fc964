//! Sibling ordering.
//!
//! Both sorts are stable: siblings that compare equal keep input order.

use std::rc::Rc;

use crate::schema::{ConvertedAnnotation, ConvertedEntity};

/// Case-insensitive name key. Case variants of one name share a key.
pub fn entity_sort_key(entity: &ConvertedEntity) -> String {
    entity.name.to_uppercase()
}

pub fn sort_entities(entities: &mut [Rc<ConvertedEntity>]) {
    entities.sort_by_cached_key(|entity| entity_sort_key(entity));
}

/// Ascending index; unbounded annotations go last.
pub fn sort_annotations(annotations: &mut [Rc<ConvertedAnnotation>]) {
    annotations.sort_by_key(|a| a.index);
}
