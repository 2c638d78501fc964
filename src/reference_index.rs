//! Parent → children index over a flat list of referencing records.
//!
//! Built in a single pass. Children are stored as positions into the source
//! slice, in the order they appear there, so lookups never search the list.

use std::collections::HashMap;

use tracing::debug;

use crate::input::Referencing;

/// Maps a parent identifier to the positions of the records naming it in `refs`.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    children: HashMap<String, Vec<usize>>,
}

impl ReferenceIndex {
    /// Index `records`. A record naming several parents lands in every bucket;
    /// a record with no refs creates no bucket.
    pub fn build<R: Referencing>(records: &[R]) -> Self {
        let mut children: HashMap<String, Vec<usize>> = HashMap::new();

        for (position, record) in records.iter().enumerate() {
            for parent_id in record.refs() {
                children.entry(parent_id.clone()).or_default().push(position);
            }
        }

        debug!(
            "Indexed {} records into {} parent buckets",
            records.len(),
            children.len()
        );
        Self { children }
    }

    /// Positions of the direct children of `parent_id`, empty when it has none.
    pub fn children_of(&self, parent_id: &str) -> &[usize] {
        self.children
            .get(parent_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of distinct parents that have at least one child.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}
