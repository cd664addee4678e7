//! Field-mask types.
//!
//! A `FieldMask` mirrors the shape of the value it guards: each key maps to
//! `MaskNode::All` (the whole subtree is readable/writable) or to a nested
//! mask covering part of the subtree. Absent keys are not granted.
//!
//! On the wire a mask is a plain object whose leaves are `true`:
//!
//! ```json
//! { "title": true, "author": { "name": true } }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of a `FieldMask`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskNode {
    /// The entire subtree at this key is granted.
    All,
    /// Only the listed part of the subtree is granted.
    Nested(FieldMask),
}

/// A tree of granted fields.
///
/// Keys are kept ordered so masks compare and serialize deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct FieldMask {
    fields: BTreeMap<String, MaskNode>,
}

impl FieldMask {
    /// An empty mask (grants nothing).
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant the whole subtree at `key`.
    pub fn field(mut self, key: impl Into<String>) -> Self {
        self.fields.insert(key.into(), MaskNode::All);
        self
    }

    /// Grant part of the subtree at `key`.
    pub fn nested(mut self, key: impl Into<String>, mask: FieldMask) -> Self {
        self.fields.insert(key.into(), MaskNode::Nested(mask));
        self
    }

    /// Insert or replace the node at `key`.
    pub fn insert(&mut self, key: impl Into<String>, node: MaskNode) {
        self.fields.insert(key.into(), node);
    }

    pub fn get(&self, key: &str) -> Option<&MaskNode> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MaskNode)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Return true if the dotted `path` (e.g. `"author.name"`) is granted.
    ///
    /// A path is granted when some prefix of it maps to `MaskNode::All`.
    /// Granting a nested mask at `author` does not grant `author` itself.
    pub fn allows(&self, path: &str) -> bool {
        let mut current = self;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            match current.fields.get(segment) {
                Some(MaskNode::All) => return true,
                Some(MaskNode::Nested(inner)) if segments.peek().is_some() => current = inner,
                _ => return false,
            }
        }
        false
    }
}

impl TryFrom<Value> for FieldMask {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(map) = value else {
            return Err(format!("field mask must be an object, got {value}"));
        };
        let mut mask = FieldMask::new();
        for (key, node) in map {
            match node {
                Value::Bool(true) => mask.insert(key, MaskNode::All),
                Value::Object(_) => {
                    let inner = FieldMask::try_from(node)?;
                    mask.insert(key, MaskNode::Nested(inner));
                }
                other => {
                    return Err(format!(
                        "field mask entry '{key}' must be `true` or a nested mask, got {other}"
                    ))
                }
            }
        }
        Ok(mask)
    }
}

impl From<FieldMask> for Value {
    fn from(mask: FieldMask) -> Self {
        let map: Map<String, Value> = mask
            .fields
            .into_iter()
            .map(|(key, node)| {
                let value = match node {
                    MaskNode::All => Value::Bool(true),
                    MaskNode::Nested(inner) => Value::from(inner),
                };
                (key, value)
            })
            .collect();
        Value::Object(map)
    }
}
