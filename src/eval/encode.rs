//! The `$encode` transform pipeline.
//!
//! A pipeline is a comma-separated list of stages applied left to right.
//! Stage arguments follow the stage name after `:`.

use crate::error::{Error, Result};
use crate::format::Format;
use crate::value::{Map, Value, directive};
use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use tracing::trace;

/// Run `value` through every stage of `pipeline`.
pub fn encode(value: Value, pipeline: &str) -> Result<Value> {
    let stages: Vec<&str> = pipeline.split(',').map(str::trim_start).collect();
    if stages.iter().any(|s| s.trim().is_empty()) {
        return Err(Error::invalid_arguments(format!(
            "empty stage in {} pipeline '{}'",
            directive::ENCODE,
            pipeline
        )));
    }
    stages.into_iter().try_fold(value, |value, stage| {
        trace!(stage, "encode stage");
        apply(value, stage)
    })
}

fn apply(value: Value, stage: &str) -> Result<Value> {
    let (name, args) = match stage.split_once(':') {
        Some((name, args)) => (name.trim(), Some(args)),
        None => (stage.trim(), None),
    };
    match name {
        "base64" => Ok(Value::String(STANDARD.encode(value.to_plain_string()))),
        "sha256" => {
            let digest = Sha256::digest(value.to_plain_string().as_bytes());
            Ok(Value::String(hex::encode(digest)))
        }
        "flags" => flags(expect_map(value, stage)?),
        "tolist" => {
            let delim = required_arg(stage, args)?;
            let map = expect_map(value, stage)?;
            Ok(Value::List(
                map.into_iter()
                    .map(|(k, v)| Value::String(format!("{}{}{}", k, delim, v.to_plain_string())))
                    .collect(),
            ))
        }
        "prefix" => {
            let delim = required_arg(stage, args)?;
            let mut out = Vec::new();
            for (key, v) in expect_map(value, stage)? {
                match v {
                    Value::List(items) => {
                        for item in items {
                            out.push(Value::String(format!("{}{}{}", key, delim, item.to_plain_string())));
                        }
                    }
                    other => out.push(Value::String(format!("{}{}{}", key, delim, other.to_plain_string()))),
                }
            }
            Ok(Value::List(out))
        }
        "flatten" => {
            let mut out = Vec::new();
            for item in expect_list(value, stage)? {
                match item {
                    Value::List(inner) => out.extend(inner),
                    other => out.push(other),
                }
            }
            Ok(Value::List(out))
        }
        "join" => {
            let delim = args.unwrap_or(",");
            let parts: Vec<String> = expect_list(value, stage)?
                .iter()
                .map(Value::to_plain_string)
                .collect();
            Ok(Value::String(parts.join(delim)))
        }
        "values" => values(expect_map(value, stage)?, args),
        _ => {
            let format = Format::from_name(stage.trim())?;
            let mut text = format.encode(&value)?;
            if matches!(format, Format::Json | Format::Jsonl) && text.ends_with('\n') {
                text.pop();
            }
            Ok(Value::String(text))
        }
    }
}

/// `--key` for `true`, `--key=value` otherwise, one flag per list item.
fn flags(map: Map) -> Result<Value> {
    let mut out = Vec::new();
    for (key, v) in map {
        match v {
            Value::Null | Value::Bool(false) => {}
            Value::Bool(true) => out.push(Value::String(format!("--{}", key))),
            Value::List(items) => {
                for item in items {
                    out.push(Value::String(format!("--{}={}", key, item.to_plain_string())));
                }
            }
            other => out.push(Value::String(format!("--{}={}", key, other.to_plain_string()))),
        }
    }
    Ok(Value::List(out))
}

/// Map values in key order, optionally wrapped and tagged with their key.
fn values(map: Map, args: Option<&str>) -> Result<Value> {
    let mut parts = args.unwrap_or("").splitn(2, ':');
    let name_key = parts.next().filter(|s| !s.is_empty());
    let value_key = parts.next().filter(|s| !s.is_empty());

    let mut out = Vec::with_capacity(map.len());
    for (key, v) in map {
        let mut item = match value_key {
            Some(value_key) => {
                let mut wrapped = Map::new();
                wrapped.insert(value_key.to_string(), v);
                Value::Map(wrapped)
            }
            None => v,
        };
        if let Some(name_key) = name_key {
            insert_at(&mut item, name_key, Value::String(key))?;
        }
        out.push(item);
    }
    Ok(Value::List(out))
}

/// Insert `value` at a dotted path, creating intermediate maps.
fn insert_at(target: &mut Value, path: &str, value: Value) -> Result<()> {
    let mut current = target;
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Ok(()),
    };
    for segment in parents {
        let map = current.as_map_mut().ok_or_else(|| {
            Error::invalid_type("values name key", "map items", "a non-map value")
        })?;
        current = map.entry(segment.to_string()).or_insert_with(Value::map);
    }
    let found = current.type_name();
    let map = current
        .as_map_mut()
        .ok_or_else(|| Error::invalid_type("values name key", "map items", found))?;
    map.insert(last.to_string(), value);
    Ok(())
}

fn required_arg<'s>(stage: &str, args: Option<&'s str>) -> Result<&'s str> {
    args.ok_or_else(|| Error::invalid_arguments(format!("encode stage '{}' needs a delimiter", stage)))
}

fn expect_map(value: Value, stage: &str) -> Result<Map> {
    match value {
        Value::Map(map) => Ok(map),
        other => Err(Error::invalid_type(
            &format!("encode stage '{}'", stage),
            "a map",
            other.type_name(),
        )),
    }
}

fn expect_list(value: Value, stage: &str) -> Result<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(Error::invalid_type(
            &format!("encode stage '{}'", stage),
            "a list",
            other.type_name(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn yaml(s: &str) -> Value {
        Format::Yaml.decode(s).unwrap()
    }

    #[test]
    fn test_base64_and_sha256() {
        assert_eq!(encode(Value::from("hello"), "base64").unwrap(), Value::from("aGVsbG8="));
        assert_eq!(
            encode(Value::from("abc"), "sha256").unwrap(),
            Value::from("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn test_flags() {
        let result = encode(yaml("{verbose: true, quiet: false, level: 3, tag: [a, b], none: ~}"), "flags").unwrap();
        assert_eq!(result, yaml("['--level=3', '--tag=a', '--tag=b', '--verbose']"));
    }

    #[test]
    fn test_tolist_and_join() {
        let result = encode(yaml("{a: 1, b: x}"), "tolist:=, join:;").unwrap();
        assert_eq!(result, Value::from("a=1;b=x"));
    }

    #[test]
    fn test_join_default_delimiter() {
        assert_eq!(encode(yaml("[1, 2, 3]"), "join").unwrap(), Value::from("1,2,3"));
    }

    #[test]
    fn test_prefix() {
        let result = encode(yaml("{host: [a, b], port: 80}"), "prefix:=").unwrap();
        assert_eq!(result, yaml("['host=a', 'host=b', 'port=80']"));
    }

    #[test]
    fn test_flatten_keeps_scalars() {
        let result = encode(yaml("[[1, 2], 3, [[4]]]"), "flatten").unwrap();
        assert_eq!(result, yaml("[1, 2, 3, [4]]"));
    }

    #[test]
    fn test_values() {
        let input = yaml("{b: {port: 2}, a: {port: 1}}");
        assert_eq!(
            encode(input.clone(), "values").unwrap(),
            yaml("[{port: 1}, {port: 2}]")
        );
        assert_eq!(
            encode(input, "values:meta.name").unwrap(),
            yaml("[{port: 1, meta: {name: a}}, {port: 2, meta: {name: b}}]")
        );
        assert_eq!(
            encode(yaml("{x: 1, y: 2}"), "values:name:value").unwrap(),
            yaml("[{name: x, value: 1}, {name: y, value: 2}]")
        );
    }

    #[test]
    fn test_format_stage() {
        assert_eq!(encode(yaml("{a: [1]}"), "json").unwrap(), Value::from("{\"a\":[1]}"));
        assert_eq!(encode(yaml("{a: 1}"), "yaml").unwrap(), Value::from("a: 1\n"));
        assert_eq!(
            encode(yaml("{a: 1}"), "json, base64").unwrap(),
            Value::from("eyJhIjoxfQ==")
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(encode(yaml("{a: 1}"), "xml").unwrap_err().code, ErrorCode::UnknownFormat);
        assert_eq!(encode(yaml("[1]"), "flags").unwrap_err().code, ErrorCode::InvalidType);
        assert_eq!(encode(yaml("{a: 1}"), "tolist").unwrap_err().code, ErrorCode::InvalidArguments);
        assert_eq!(encode(yaml("{a: 1}"), "json,,").unwrap_err().code, ErrorCode::InvalidArguments);
        assert_eq!(encode(yaml("{a: 1}"), "values:n").unwrap_err().code, ErrorCode::InvalidType);
    }
}
