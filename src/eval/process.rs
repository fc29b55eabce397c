//! Phase B: `$repeat`, `$encode`, `$decode`, `$value`, interpolation and
//! context variables.
//!
//! Processing a node yields `None` when a directive produced nothing, which
//! removes the containing key or list element. Literal `null` data is kept.

use super::encode::encode;
use super::refs::Expander;
use super::repeat::bindings;
use super::resolve::Resolver;
use crate::context::EvalContext;
use crate::document::DocId;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::merge::normalize;
use crate::value::{Map, Value, directive, join_path};
use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// `{expr}` spans inside an interpolated string.
static INTERPOLATION: LazyLock<std::result::Result<Regex, regex_lite::Error>> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}"));

/// Phase-B processor for one document.
pub struct Processor<'a> {
    resolver: &'a Resolver<'a>,
    limit: usize,
    doc: DocId,
}

impl<'a> Processor<'a> {
    pub fn new(resolver: &'a Resolver<'a>, limit: usize, doc: DocId) -> Self {
        Self {
            resolver,
            limit,
            doc,
        }
    }

    /// Process a value in `ctx`.
    pub fn process(&self, value: Value, ctx: &EvalContext, path: &str) -> Result<Option<Value>> {
        match value {
            Value::String(s) => self.process_string(s, ctx, path),
            Value::Map(map) => self.process_map(map, ctx, path),
            Value::List(items) => self.process_list(items, ctx, path).map(Some),
            scalar => Ok(Some(scalar)),
        }
    }

    /// One context per binding of a `$repeat` spec, each extending `ctx`.
    ///
    /// The spec's values are processed first, so they may use variables.
    pub fn repeat_contexts(
        &self,
        spec: Value,
        ctx: &EvalContext,
        path: &str,
    ) -> Result<Vec<EvalContext>> {
        let spec = self.repeat_spec(spec, ctx, path)?;
        let contexts: Vec<EvalContext> = bindings(&spec)
            .map_err(|e| e.with_path(path))?
            .into_iter()
            .map(|binding| {
                let mut next = ctx.clone();
                for (symbol, value) in binding {
                    next.bind(symbol, value);
                }
                next
            })
            .collect();
        debug!(path, copies = contexts.len(), "expanding $repeat");
        Ok(contexts)
    }

    /// Process the values of a repeat spec. Range and dimension keys are kept.
    fn repeat_spec(&self, spec: Value, ctx: &EvalContext, path: &str) -> Result<Value> {
        match spec {
            Value::Map(map) => {
                let mut out = Map::new();
                for (key, value) in map {
                    let child = join_path(path, &key);
                    out.insert(key, self.repeat_spec(value, ctx, &child)?);
                }
                Ok(Value::Map(out))
            }
            other => Ok(self.process(other, ctx, path)?.unwrap_or_default()),
        }
    }

    fn process_string(&self, s: String, ctx: &EvalContext, path: &str) -> Result<Option<Value>> {
        if s.starts_with("$$") {
            return Ok(Some(Value::String(s)));
        }
        if s == directive::REPEAT
            || s.starts_with(directive::REPEAT_PREFIX)
            || s.starts_with(directive::ENV_PREFIX)
        {
            return match ctx.get(&s) {
                Some(value) => Ok(Some(value.clone())),
                None => Err(Error::variable_not_found(&s).with_path(path)),
            };
        }
        if let Some(template) = s
            .strip_prefix("$\"")
            .and_then(|rest| rest.strip_suffix('"'))
        {
            return self.interpolate(template, ctx, path).map(|s| Some(Value::String(s)));
        }
        Ok(Some(Value::String(s)))
    }

    /// Splice every `{expr}` of `template` with its resolved text.
    fn interpolate(&self, template: &str, ctx: &EvalContext, path: &str) -> Result<String> {
        let pattern = INTERPOLATION
            .as_ref()
            .map_err(|e| Error::invalid_arguments(e.to_string()))?;
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in pattern.captures_iter(template) {
            let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&template[last..whole.start()]);
            let value = self
                .resolver
                .get_with_var(self.doc, expr.as_str().trim(), ctx)
                .map_err(|e| if e.path.is_none() { e.with_path(path) } else { e })?;
            out.push_str(&value.to_plain_string());
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }

    fn process_map(&self, mut map: Map, ctx: &EvalContext, path: &str) -> Result<Option<Value>> {
        if let Some(spec) = map.remove(directive::REPEAT) {
            let mut copies = Vec::new();
            for copy_ctx in self.repeat_contexts(spec, ctx, path)? {
                let copy_path = join_path(path, copies.len());
                if let Some(copy) = self.process_map(map.clone(), &copy_ctx, &copy_path)? {
                    copies.push(copy);
                }
            }
            return Ok(Some(Value::List(copies)));
        }

        if let Some(pipeline) = map.remove(directive::ENCODE) {
            let pipeline = pipeline_name(pipeline, path)?;
            let Some(input) = self.process_map(map, ctx, path)? else {
                return Ok(None);
            };
            return self.encode(input, &pipeline, path).map(Some);
        }

        if let Some(format) = map.remove(directive::DECODE) {
            return self.decode(format, map, ctx, path);
        }

        if let Some(inner) = map.remove(directive::VALUE) {
            if !map.is_empty() {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                return Err(Error::extra_keys(directive::VALUE, &keys).with_path(path));
            }
            return Ok(self.process(inner, ctx, path)?.filter(|v| !v.is_null()));
        }

        let mut out = Map::new();
        for (key, value) in map {
            let child = join_path(path, &key);
            if is_unknown_directive(&key) {
                return Err(Error::invalid_directive(&key).with_path(child));
            }
            if let Some(processed) = self.process(value, ctx, &child)? {
                out.insert(key, processed);
            }
        }
        Ok(Some(Value::Map(out)))
    }

    fn process_list(&self, mut items: Vec<Value>, ctx: &EvalContext, path: &str) -> Result<Value> {
        if let Some(pipeline) = take_marker(&mut items, directive::ENCODE) {
            let pipeline = pipeline_name(pipeline, path)?;
            let input = self.process_list(items, ctx, path)?;
            return self.encode(input, &pipeline, path);
        }

        let contexts = match take_marker(&mut items, directive::REPEAT) {
            Some(spec) => self.repeat_contexts(spec, ctx, path)?,
            None => vec![ctx.clone()],
        };

        let mut out = Vec::new();
        for copy_ctx in &contexts {
            for item in &items {
                self.process_item(item.clone(), copy_ctx, path, &mut out)?;
            }
        }
        Ok(Value::List(out))
    }

    /// Process one list element, splicing `$repeat` copies into `out`.
    fn process_item(
        &self,
        item: Value,
        ctx: &EvalContext,
        path: &str,
        out: &mut Vec<Value>,
    ) -> Result<()> {
        match item {
            Value::Map(mut map) if map.contains_key(directive::REPEAT) => {
                let spec = map.remove(directive::REPEAT).unwrap_or_default();
                for copy_ctx in self.repeat_contexts(spec, ctx, &join_path(path, out.len()))? {
                    let item_path = join_path(path, out.len());
                    if let Some(copy) = self.process_map(map.clone(), &copy_ctx, &item_path)? {
                        out.push(copy);
                    }
                }
            }
            other => {
                let item_path = join_path(path, out.len());
                if let Some(processed) = self.process(other, ctx, &item_path)? {
                    out.push(processed);
                }
            }
        }
        Ok(())
    }

    fn encode(&self, input: Value, pipeline: &str, path: &str) -> Result<Value> {
        if let Some(required) = find_required(&input, path) {
            return Err(Error::required_field(&required));
        }
        encode(input, pipeline).map_err(|e| e.with_path(path))
    }

    /// `{$decode: format, $value: text}`: decode, then run both phases on the result.
    fn decode(
        &self,
        format: Value,
        mut rest: Map,
        ctx: &EvalContext,
        path: &str,
    ) -> Result<Option<Value>> {
        let Some(format) = format.as_str().map(str::to_string) else {
            return Err(
                Error::invalid_type(directive::DECODE, "a format name", format.type_name())
                    .with_path(path),
            );
        };
        let Some(text) = rest.remove(directive::VALUE) else {
            return Err(Error::invalid_arguments(format!(
                "{} needs a {} string",
                directive::DECODE,
                directive::VALUE
            ))
            .with_path(path));
        };
        if !rest.is_empty() {
            let keys: Vec<&str> = rest.keys().map(String::as_str).collect();
            return Err(Error::extra_keys(directive::DECODE, &keys).with_path(path));
        }
        let text = match self.process(text, ctx, path)? {
            Some(Value::String(text)) => text,
            other => {
                let found = other.as_ref().map_or("nothing", Value::type_name);
                return Err(Error::invalid_type(directive::DECODE, "a string value", found)
                    .with_path(path));
            }
        };

        let decoded = Format::from_name(&format)
            .and_then(|f| f.decode(&text))
            .map_err(|e| e.with_path(path))?;
        let normalized = normalize(decoded, path)?;
        let expanded = Expander::new(self.resolver, self.limit).expand(self.doc, normalized, path)?;
        self.process(expanded, ctx, path)
    }
}

/// A `{$directive: arg}` list element, removed from `items`.
fn take_marker(items: &mut Vec<Value>, key: &str) -> Option<Value> {
    let index = items.iter().position(|item| match item {
        Value::Map(map) => map.len() == 1 && map.contains_key(key),
        _ => false,
    })?;
    match items.remove(index) {
        Value::Map(mut map) => map.remove(key),
        _ => None,
    }
}

fn pipeline_name(pipeline: Value, path: &str) -> Result<String> {
    match pipeline {
        Value::String(s) => Ok(s),
        other => Err(
            Error::invalid_type(directive::ENCODE, "a pipeline string", other.type_name())
                .with_path(path),
        ),
    }
}

/// Lowercase `$`-keys that no phase consumed. `$output` is kept for the filter.
fn is_unknown_directive(key: &str) -> bool {
    key != directive::OUTPUT
        && key
            .strip_prefix('$')
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_ascii_lowercase())
}

/// Path of the first `"$required"` marker inside `value`.
pub(crate) fn find_required(value: &Value, path: &str) -> Option<String> {
    match value {
        v if v.is_required() => Some(path.to_string()),
        Value::Map(map) => map
            .iter()
            .find_map(|(k, v)| find_required(v, &join_path(path, k))),
        Value::List(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, v)| find_required(v, &join_path(path, i))),
        _ => None,
    }
}
