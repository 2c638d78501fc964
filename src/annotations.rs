//! Annotation tree assembly.
//!
//! Unlike entities, only true roots (no `refs`) reach the top level; every
//! other annotation is reachable only through its parents' `children`.
//! Needs the finished entity memo to denormalize `{id, name}` onto each node.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::entities::EntityMemo;
use crate::input::{Annotation, Referencing};
use crate::reference_index::ReferenceIndex;
use crate::schema::{
    ConvertedAnnotation, EntitySnapshot, DEFAULT_MAX_DEPTH, MIN_MAX_DEPTH, UNBOUNDED_INDEX,
};
use crate::sort::sort_annotations;

pub struct AnnotationTreeBuilder<'a> {
    annotations: &'a [Annotation],
    entities: &'a EntityMemo<'a>,
    index: ReferenceIndex,
    memo: HashMap<&'a str, (Rc<ConvertedAnnotation>, usize)>,
    in_progress: HashSet<&'a str>,
    max_depth: usize,
}

impl<'a> AnnotationTreeBuilder<'a> {
    pub fn new(annotations: &'a [Annotation], entities: &'a EntityMemo<'a>) -> Self {
        Self {
            annotations,
            entities,
            index: ReferenceIndex::build(annotations),
            memo: HashMap::with_capacity(annotations.len()),
            in_progress: HashSet::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit nesting to `max_depth` levels (at least [`MIN_MAX_DEPTH`]).
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(MIN_MAX_DEPTH);
        self
    }

    /// Convert one annotation with its descendants. Memoized, cycle-safe and
    /// depth-limited the same way as entity conversion.
    pub fn convert(&mut self, annotation: &'a Annotation) -> Rc<ConvertedAnnotation> {
        self.convert_with_height(annotation).0
    }

    fn convert_with_height(&mut self, annotation: &'a Annotation) -> (Rc<ConvertedAnnotation>, usize) {
        if let Some((converted, height)) = self.memo.get(annotation.id.as_str()) {
            return (Rc::clone(converted), *height);
        }

        if self.in_progress.len() + 1 >= self.max_depth {
            warn!(
                "Annotation '{}' reached depth limit {}, emitting without children",
                annotation.id, self.max_depth
            );
            return (Rc::new(self.node(annotation, Vec::new())), 1);
        }

        if !self.in_progress.insert(annotation.id.as_str()) {
            warn!(
                "Reference cycle through annotation '{}', cutting back-edge",
                annotation.id
            );
            return (Rc::new(self.node(annotation, Vec::new())), 1);
        }

        let annotations = self.annotations;
        let positions = self.index.children_of(&annotation.id).to_vec();
        let mut children: Vec<Rc<ConvertedAnnotation>> = Vec::with_capacity(positions.len());
        let mut height = 1;

        for position in positions {
            let child = &annotations[position];
            let (converted, child_height) = self.convert_with_height(child);
            if child_height >= self.max_depth {
                warn!(
                    "Annotation '{}' under '{}' exceeds depth limit {}, emitting without children",
                    child.id, annotation.id, self.max_depth
                );
                children.push(Rc::new(self.node(child, Vec::new())));
                height = height.max(2);
            } else {
                children.push(converted);
                height = height.max(child_height + 1);
            }
        }
        sort_annotations(&mut children);

        let converted = Rc::new(self.node(annotation, children));
        self.in_progress.remove(annotation.id.as_str());
        self.memo
            .insert(annotation.id.as_str(), (Rc::clone(&converted), height));
        (converted, height)
    }

    /// Convert the root annotations, sorted by index.
    pub fn convert_roots(mut self) -> Vec<Rc<ConvertedAnnotation>> {
        let annotations = self.annotations;
        let mut roots: Vec<Rc<ConvertedAnnotation>> = annotations
            .iter()
            .filter(|annotation| annotation.is_root())
            .map(|annotation| self.convert(annotation))
            .collect();
        sort_annotations(&mut roots);

        debug!(
            "Converted {} annotations into {} roots ({} without offsets)",
            self.memo.len(),
            roots.len(),
            roots.iter().filter(|root| root.is_unbounded()).count()
        );
        roots
    }

    fn node(
        &self,
        annotation: &Annotation,
        children: Vec<Rc<ConvertedAnnotation>>,
    ) -> ConvertedAnnotation {
        ConvertedAnnotation {
            id: annotation.id.clone(),
            entity: self.snapshot(&annotation.entity_id),
            value: annotation.value.clone(),
            index: annotation_index(annotation, &children),
            children,
        }
    }

    fn snapshot(&self, entity_id: &str) -> EntitySnapshot {
        match self.entities.get(entity_id) {
            Some(entity) => EntitySnapshot::from(&**entity),
            None => {
                warn!("Annotation anchored to unknown entity '{}'", entity_id);
                EntitySnapshot {
                    id: entity_id.to_string(),
                    name: String::new(),
                }
            }
        }
    }
}

/// Start of the first range; otherwise the smallest child index; otherwise
/// [`UNBOUNDED_INDEX`]. Ranges after the first do not contribute.
pub fn annotation_index(annotation: &Annotation, children: &[Rc<ConvertedAnnotation>]) -> u64 {
    match annotation.indices.first() {
        Some(range) => range.start,
        None => children
            .iter()
            .map(|child| child.index)
            .min()
            .unwrap_or(UNBOUNDED_INDEX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityTreeBuilder;
    use crate::input::{Entity, EntityClass, EntityType, Range};

    fn entities() -> Vec<Entity> {
        vec![Entity {
            id: "e1".to_string(),
            name: "Invoice number".to_string(),
            entity_type: EntityType::Regex,
            entity_class: EntityClass::Entity,
            refs: Vec::new(),
        }]
    }

    fn annotation(id: &str, refs: &[&str], start: Option<u64>) -> Annotation {
        Annotation {
            id: id.to_string(),
            entity_id: "e1".to_string(),
            refs: refs.iter().map(|r| r.to_string()).collect(),
            value: serde_json::Value::String(format!("value {}", id)),
            indices: start
                .map(|start| vec![Range { start, end: start + 4 }])
                .unwrap_or_default(),
        }
    }

    fn ids(nodes: &[Rc<ConvertedAnnotation>]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    fn depth(node: &ConvertedAnnotation) -> usize {
        1 + node.children.iter().map(|c| depth(c)).max().unwrap_or(0)
    }

    /// `a{i}` names `a{i-1}` as its parent; only the last carries an offset.
    fn chain(len: usize) -> Vec<Annotation> {
        (0..len)
            .map(|i| {
                let id = format!("a{}", i);
                let parent = i.checked_sub(1).map(|p| format!("a{}", p));
                let refs: Vec<&str> = parent.iter().map(String::as_str).collect();
                let start = if i + 1 == len { Some(i as u64) } else { None };
                annotation(&id, &refs, start)
            })
            .collect()
    }

    #[test]
    fn test_only_roots_at_top_level() {
        let entities = entities();
        let (_, memo) = EntityTreeBuilder::new(&entities).convert_all();
        let annotations = vec![
            annotation("r1", &[], Some(10)),
            annotation("c1", &["r1"], Some(12)),
            annotation("r2", &[], Some(0)),
            annotation("c2", &["c1"], Some(14)),
        ];

        let roots = AnnotationTreeBuilder::new(&annotations, &memo).convert_roots();

        assert_eq!(ids(&roots), vec!["r2", "r1"]);
        assert_eq!(roots[1].children[0].id, "c1");
        assert_eq!(roots[1].children[0].children[0].id, "c2");
    }

    #[test]
    fn test_index_falls_back_to_min_child() {
        let entities = entities();
        let (_, memo) = EntityTreeBuilder::new(&entities).convert_all();
        let annotations = vec![
            annotation("parent", &[], None),
            annotation("five", &["parent"], Some(5)),
            annotation("two", &["parent"], Some(2)),
        ];

        let roots = AnnotationTreeBuilder::new(&annotations, &memo).convert_roots();

        assert_eq!(roots[0].index, 2);
        assert_eq!(ids(&roots[0].children), vec!["two", "five"]);
    }

    #[test]
    fn test_unbounded_sorts_last() {
        let entities = entities();
        let (_, memo) = EntityTreeBuilder::new(&entities).convert_all();
        let annotations = vec![
            annotation("empty", &[], None),
            annotation("late", &[], Some(900)),
            annotation("early", &[], Some(1)),
        ];

        let roots = AnnotationTreeBuilder::new(&annotations, &memo).convert_roots();

        assert_eq!(ids(&roots), vec!["early", "late", "empty"]);
        assert!(roots[2].is_unbounded());
        assert_eq!(roots[2].index, UNBOUNDED_INDEX);
    }

    #[test]
    fn test_first_range_wins() {
        let mut multi = annotation("multi", &[], None);
        multi.indices = vec![Range { start: 40, end: 44 }, Range { start: 3, end: 8 }];
        assert_eq!(annotation_index(&multi, &[]), 40);
    }

    #[test]
    fn test_entity_snapshot() {
        let entities = entities();
        let (_, memo) = EntityTreeBuilder::new(&entities).convert_all();
        let mut unknown = annotation("u", &[], Some(1));
        unknown.entity_id = "missing".to_string();
        let annotations = vec![annotation("k", &[], Some(0)), unknown];

        let roots = AnnotationTreeBuilder::new(&annotations, &memo).convert_roots();

        assert_eq!(roots[0].entity.name, "Invoice number");
        assert_eq!(roots[1].entity.id, "missing");
        assert!(roots[1].entity.name.is_empty());
    }

    #[test]
    fn test_shared_child_annotation() {
        let entities = entities();
        let (_, memo) = EntityTreeBuilder::new(&entities).convert_all();
        let annotations = vec![
            annotation("r1", &[], None),
            annotation("r2", &[], None),
            annotation("shared", &["r1", "r2"], Some(7)),
        ];

        let roots = AnnotationTreeBuilder::new(&annotations, &memo).convert_roots();

        assert_eq!(roots.len(), 2);
        assert!(Rc::ptr_eq(&roots[0].children[0], &roots[1].children[0]));
        assert_eq!(roots[0].index, 7);
    }

    #[test]
    fn test_cycle_below_root_is_cut() {
        let entities = entities();
        let (_, memo) = EntityTreeBuilder::new(&entities).convert_all();
        let annotations = vec![
            annotation("root", &[], None),
            annotation("a", &["root", "b"], Some(3)),
            annotation("b", &["a"], Some(4)),
        ];

        let roots = AnnotationTreeBuilder::new(&annotations, &memo).convert_roots();

        let a = &roots[0].children[0];
        assert_eq!(a.id, "a");
        assert_eq!(a.children[0].id, "b");
        assert_eq!(a.children[0].children[0].id, "a");
        assert!(a.children[0].children[0].children.is_empty());
    }

    #[test]
    fn test_deep_chain_stays_within_default_depth() {
        let entities = entities();
        let (_, memo) = EntityTreeBuilder::new(&entities).convert_all();
        let annotations = chain(20_000);

        let roots = AnnotationTreeBuilder::new(&annotations, &memo).convert_roots();

        assert_eq!(ids(&roots), vec!["a0"]);
        assert_eq!(depth(&roots[0]), DEFAULT_MAX_DEPTH);
        // the offset sits below the cut, so nothing above it has one
        assert!(roots[0].is_unbounded());
    }

    #[test]
    fn test_depth_limit_cuts_annotations() {
        let entities = entities();
        let (_, memo) = EntityTreeBuilder::new(&entities).convert_all();
        let annotations = chain(3);

        let roots = AnnotationTreeBuilder::new(&annotations, &memo)
            .with_max_depth(2)
            .convert_roots();

        let cut = &roots[0].children[0];
        assert_eq!(cut.id, "a1");
        assert!(cut.children.is_empty());
        assert_eq!(depth(&roots[0]), 2);
    }
}
