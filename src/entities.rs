//! Entity tree assembly.
//!
//! Every input entity becomes one shared node. An entity named as a parent by
//! several others shows up in each parent's `children` *and* at the top
//! level, always as the same `Rc`.
//!
//! Nesting is capped at a maximum depth. Both the recursion and the height
//! of every built node stay under it, so serializing or dropping the result
//! never recurses deeper than the cap either.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::input::Entity;
use crate::reference_index::ReferenceIndex;
use crate::schema::{ConvertedEntity, DEFAULT_MAX_DEPTH, MIN_MAX_DEPTH};
use crate::sort::sort_entities;

/// Converted entities keyed by source id. Annotations read it for snapshots.
pub type EntityMemo<'a> = HashMap<&'a str, Rc<ConvertedEntity>>;

/// Per-document builder. Holds the parent index, the memo (node plus its
/// height) and the set of entities whose conversion is still on the stack.
pub struct EntityTreeBuilder<'a> {
    entities: &'a [Entity],
    index: ReferenceIndex,
    memo: HashMap<&'a str, (Rc<ConvertedEntity>, usize)>,
    in_progress: HashSet<&'a str>,
    max_depth: usize,
}

impl<'a> EntityTreeBuilder<'a> {
    pub fn new(entities: &'a [Entity]) -> Self {
        Self {
            entities,
            index: ReferenceIndex::build(entities),
            memo: HashMap::with_capacity(entities.len()),
            in_progress: HashSet::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit nesting to `max_depth` levels (at least [`MIN_MAX_DEPTH`]).
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(MIN_MAX_DEPTH);
        self
    }

    /// Convert one entity and, recursively, everything that names it as a parent.
    ///
    /// Repeated calls return the memoized node. Reaching an entity that is
    /// still being converted means the references loop; the back-edge is
    /// emitted as a childless node instead of recursing. The same cut applies
    /// at the depth limit.
    pub fn convert(&mut self, entity: &'a Entity) -> Rc<ConvertedEntity> {
        self.convert_with_height(entity).0
    }

    fn convert_with_height(&mut self, entity: &'a Entity) -> (Rc<ConvertedEntity>, usize) {
        if let Some((converted, height)) = self.memo.get(entity.id.as_str()) {
            return (Rc::clone(converted), *height);
        }

        if self.in_progress.len() + 1 >= self.max_depth {
            warn!(
                "Entity '{}' reached depth limit {}, emitting without children",
                entity.id, self.max_depth
            );
            return (Rc::new(node(entity, Vec::new())), 1);
        }

        if !self.in_progress.insert(entity.id.as_str()) {
            warn!("Reference cycle through entity '{}', cutting back-edge", entity.id);
            return (Rc::new(node(entity, Vec::new())), 1);
        }

        let entities = self.entities;
        let positions = self.index.children_of(&entity.id).to_vec();
        let mut children: Vec<Rc<ConvertedEntity>> = Vec::with_capacity(positions.len());
        let mut height = 1;

        for position in positions {
            let child = &entities[position];
            let (converted, child_height) = self.convert_with_height(child);
            if child_height >= self.max_depth {
                warn!(
                    "Entity '{}' under '{}' exceeds depth limit {}, emitting without children",
                    child.id, entity.id, self.max_depth
                );
                children.push(Rc::new(node(child, Vec::new())));
                height = height.max(2);
            } else {
                children.push(converted);
                height = height.max(child_height + 1);
            }
        }
        sort_entities(&mut children);

        let converted = Rc::new(node(entity, children));
        self.in_progress.remove(entity.id.as_str());
        self.memo
            .insert(entity.id.as_str(), (Rc::clone(&converted), height));
        (converted, height)
    }

    /// Convert every entity, roots and children alike, sorted by name.
    /// Returns the top-level list together with the memo.
    pub fn convert_all(mut self) -> (Vec<Rc<ConvertedEntity>>, EntityMemo<'a>) {
        let entities = self.entities;
        let mut converted: Vec<Rc<ConvertedEntity>> =
            entities.iter().map(|entity| self.convert(entity)).collect();
        sort_entities(&mut converted);

        debug!(
            "Converted {} entities ({} distinct, {} parents)",
            converted.len(),
            self.memo.len(),
            self.index.len()
        );
        let memo = self
            .memo
            .into_iter()
            .map(|(id, (node, _))| (id, node))
            .collect();
        (converted, memo)
    }
}

fn node(entity: &Entity, children: Vec<Rc<ConvertedEntity>>) -> ConvertedEntity {
    ConvertedEntity {
        id: entity.id.clone(),
        name: entity.name.clone(),
        entity_type: entity.entity_type,
        entity_class: entity.entity_class,
        children,
    }
}
