//! Evaluation pipeline.
//!
//! For one set of loaded documents:
//!
//! 1. fold every document through the merge engine
//! 2. expand `$merge` / `$replace` references (phase A)
//! 3. fan documents out over a root `$repeat`
//! 4. process the remaining directives in each copy's context (phase B)
//! 5. split `$output` subtrees, validate and unescape

pub mod encode;
pub mod output;
pub mod process;
pub mod refs;
pub mod repeat;
pub mod resolve;

use crate::context::EvalContext;
use crate::document::{DocId, DocumentSet};
use crate::engine::merge_documents;
use crate::error::Result;
use crate::format::Format;
use crate::loader::Loader;
use crate::settings::Settings;
use crate::value::{Value, directive};
use output::{finalize, split_outputs, validate};
use process::Processor;
use refs::Expander;
use resolve::Resolver;
use std::path::Path;
use tracing::debug;

/// Evaluates layered configuration into its final outputs.
#[derive(Debug, Clone)]
pub struct Evaluator {
    settings: Settings,
    context: EvalContext,
    validate: bool,
}

impl Evaluator {
    /// Create an evaluator. The process environment seeds `$env:` variables
    /// unless `settings.inherit_env` is off.
    pub fn new(settings: Settings) -> Self {
        let context = if settings.inherit_env {
            EvalContext::from_process_env()
        } else {
            EvalContext::new()
        };
        Self {
            settings,
            context,
            validate: true,
        }
    }

    /// Replace the base evaluation context.
    pub fn with_context(mut self, context: EvalContext) -> Self {
        self.context = context;
        self
    }

    /// Skip the check for unresolved `$required` markers.
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Evaluate a file together with its ancestor layers.
    pub fn evaluate_file(&self, path: &Path) -> Result<Vec<Value>> {
        let mut loader = Loader::new(&self.settings);
        loader.load(path)?;
        let (docs, order) = loader.finish();
        self.evaluate_documents(docs, &order)
    }

    /// Evaluate a single in-memory source.
    pub fn evaluate_str(&self, source: &str, format: Format) -> Result<Vec<Value>> {
        self.evaluate_layers(&[source], format)
    }

    /// Evaluate an in-memory layer chain, base first.
    ///
    /// The documents of each layer are parented to those of the previous
    /// non-empty layer.
    pub fn evaluate_layers(&self, layers: &[&str], format: Format) -> Result<Vec<Value>> {
        let mut docs = DocumentSet::new();
        let mut order = Vec::new();
        let mut previous: Vec<DocId> = Vec::new();
        for (i, source) in layers.iter().enumerate() {
            let values = format.decode_stream(source)?;
            if values.is_empty() {
                continue;
            }
            let ids: Vec<DocId> = values
                .into_iter()
                .enumerate()
                .map(|(j, value)| docs.add(format!("layer{}#{}", i, j), value, previous.iter().copied()))
                .collect();
            order.extend(ids.iter().copied());
            previous = ids;
        }
        self.evaluate_documents(docs, &order)
    }

    /// Run the pipeline over loaded documents, `order` being the merge order.
    pub fn evaluate_documents(&self, mut docs: DocumentSet, order: &[DocId]) -> Result<Vec<Value>> {
        let result = merge_documents(&mut docs, order)?;
        debug!(loaded = order.len(), merged = result.len(), "merged documents");

        self.expand_references(&mut docs, &result)?;

        // Root `$repeat` specs leave the documents so references never see them.
        let specs: Vec<Option<Value>> = result
            .iter()
            .map(|&id| {
                docs.get_mut(id)
                    .data
                    .as_map_mut()
                    .and_then(|map| map.remove(directive::REPEAT))
            })
            .collect();

        let limit = self.settings.recursion_limit;
        let resolver = Resolver::new(&docs, &result);
        let mut outputs = Vec::new();
        for (&id, spec) in result.iter().zip(specs) {
            let label = docs.label(id);
            let processor = Processor::new(&resolver, limit, id);
            let data = docs.get(id).data.clone();
            for (copy_label, data, ctx) in self.fan_out(&processor, label, spec, data)? {
                let processed = processor
                    .process(data, &ctx, "")
                    .map_err(|e| e.in_document(&copy_label))?;
                let Some(processed) = processed else {
                    continue;
                };
                for out in split_outputs(processed).map_err(|e| e.in_document(&copy_label))? {
                    if self.validate {
                        validate(&out).map_err(|e| e.in_document(&copy_label))?;
                    }
                    outputs.push(finalize(out));
                }
            }
        }
        debug!(outputs = outputs.len(), "evaluation complete");
        Ok(outputs)
    }

    /// Phase A over every result document, resolving against a snapshot.
    fn expand_references(&self, docs: &mut DocumentSet, result: &[DocId]) -> Result<()> {
        let snapshot = docs.clone();
        let resolver = Resolver::new(&snapshot, result);
        let expander = Expander::new(&resolver, self.settings.recursion_limit);
        for &id in result {
            let data = std::mem::take(&mut docs.get_mut(id).data);
            let expanded = expander
                .expand(id, data, "")
                .map_err(|e| e.in_document(snapshot.label(id)))?;
            docs.get_mut(id).data = expanded;
        }
        Ok(())
    }

    /// Copies of a document root, one per binding of its root `$repeat` spec.
    fn fan_out(
        &self,
        processor: &Processor<'_>,
        label: &str,
        spec: Option<Value>,
        data: Value,
    ) -> Result<Vec<(String, Value, EvalContext)>> {
        let Some(spec) = spec else {
            return Ok(vec![(label.to_string(), data, self.context.clone())]);
        };
        let contexts = processor
            .repeat_contexts(spec, &self.context, "")
            .map_err(|e| e.in_document(label))?;
        Ok(contexts
            .into_iter()
            .enumerate()
            .map(|(i, ctx)| (format!("{}[repeat {}]", label, i), data.clone(), ctx))
            .collect())
    }
}
