//! JSON element documents.
//!
//! A document is one element object:
//! `{"name": "echo", "attributes": {"message": "hi"}, "children": [ ... ]}`.
//! It is streamed into a [`ConfigCapture`] as the same attribute/child events
//! a declarative parser would emit, in document order.

use crate::capture::capture::ConfigCapture;
use crate::capture::node::ConfigNode;
use crate::config::types::{Result, TaskError};
use serde_json::{Map, Value};
use std::path::Path;

fn scalar_text(path: &str, key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(TaskError::Config(format!(
            "Attribute {}@{} must be a string, number or boolean",
            path, key
        ))),
    }
}

fn element_name<'a>(path: &str, element: &'a Map<String, Value>) -> Result<&'a str> {
    match element.get("name") {
        Some(Value::String(name)) if !name.is_empty() => Ok(name),
        _ => Err(TaskError::Config(format!(
            "Element under {} is missing a non-empty \"name\"",
            path
        ))),
    }
}

fn stream_body(
    path: &str,
    element: &Map<String, Value>,
    capture: &mut ConfigCapture,
) -> Result<()> {
    match element.get("attributes") {
        None | Some(Value::Null) => {}
        Some(Value::Object(attributes)) => {
            for (key, value) in attributes {
                capture.set_attribute(key.as_str(), scalar_text(path, key, value)?);
            }
        }
        Some(_) => {
            return Err(TaskError::Config(format!(
                "\"attributes\" of {} must be an object",
                path
            )))
        }
    }

    match element.get("children") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Array(children)) => {
            for child in children {
                let child = child.as_object().ok_or_else(|| {
                    TaskError::Config(format!("Children of {} must be objects", path))
                })?;
                let name = element_name(path, child)?;
                let child_path = format!("{}/{}", path, name);
                capture.create_child(name);
                stream_body(&child_path, child, capture)?;
                capture.end_child()?;
            }
            Ok(())
        }
        Some(_) => Err(TaskError::Config(format!(
            "\"children\" of {} must be an array",
            path
        ))),
    }
}

/// Stream a parsed document into a fresh capture and return the tree.
pub fn capture_value(document: &Value) -> Result<ConfigNode> {
    let element = document
        .as_object()
        .ok_or_else(|| TaskError::Config("Document root must be an object".to_string()))?;
    let name = element_name("", element)?;

    let mut capture = ConfigCapture::with_root_name(name);
    stream_body(name, element, &mut capture)?;
    Ok(capture.finish())
}

pub fn parse_document(text: &str) -> Result<ConfigNode> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| TaskError::Config(format!("Failed to parse document JSON: {}", e)))?;
    capture_value(&value)
}

pub fn load_document<P: AsRef<Path>>(path: P) -> Result<ConfigNode> {
    let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("Failed to read document {}: {}", path.as_ref().display(), e),
        )
    })?;
    parse_document(&text)
}

/// Render a tree back into document form.
pub fn to_value(node: &ConfigNode) -> Value {
    let mut element = Map::new();
    element.insert("name".to_string(), Value::String(node.name().to_string()));

    if node.attribute_count() > 0 {
        let attributes: Map<String, Value> = node
            .attributes()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        element.insert("attributes".to_string(), Value::Object(attributes));
    }

    if !node.children().is_empty() {
        let children = node.children().iter().map(to_value).collect();
        element.insert("children".to_string(), Value::Array(children));
    }

    Value::Object(element)
}
