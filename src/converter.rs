//! Conversion pipeline: flat documents in, nested documents out.
//!
//! Per document: index and convert entities, then annotations (which read
//! the finished entity memo). All caches live and die inside one document.

use tracing::{debug, info};

use crate::annotations::AnnotationTreeBuilder;
use crate::entities::EntityTreeBuilder;
use crate::error::Result;
use crate::input::{Document, Input};
use crate::schema::{ConvertedDocument, Output, DEFAULT_MAX_DEPTH};
use crate::validate::validate_output;

/// Knobs for one conversion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Deepest nesting emitted; deeper records appear without children.
    pub max_depth: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Convert every document of `input` with default options.
pub fn convert_input(input: &Input) -> Output {
    convert_input_with(input, &ConvertOptions::default())
}

pub fn convert_input_with(input: &Input, options: &ConvertOptions) -> Output {
    info!("Converting {} documents", input.documents.len());
    Output {
        documents: input
            .documents
            .iter()
            .map(|document| convert_document(document, options))
            .collect(),
    }
}

/// Convert a single document.
pub fn convert_document(document: &Document, options: &ConvertOptions) -> ConvertedDocument {
    debug!(
        "Converting document {} ({} entities, {} annotations)",
        document.id,
        document.entities.len(),
        document.annotations.len()
    );

    let (entities, entity_memo) = EntityTreeBuilder::new(&document.entities)
        .with_max_depth(options.max_depth)
        .convert_all();
    let annotations = AnnotationTreeBuilder::new(&document.annotations, &entity_memo)
        .with_max_depth(options.max_depth)
        .convert_roots();

    info!(
        "Document {}: {} entities, {} root annotations",
        document.id,
        entities.len(),
        annotations.len()
    );

    ConvertedDocument {
        id: document.id.clone(),
        entities,
        annotations,
    }
}

/// Convert, then validate the result before handing it out.
pub fn convert_validated(input: &Input, options: &ConvertOptions) -> Result<Output> {
    let output = convert_input_with(input, options);
    validate_output(&output)?;
    Ok(output)
}

/// Parse an input JSON string and convert it.
pub fn convert_json(json: &str) -> Result<Output> {
    let input: Input = serde_json::from_str(json)?;
    Ok(convert_input(&input))
}
