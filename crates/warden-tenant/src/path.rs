//! Payload breadcrumbs.
//!
//! A `PayloadPath` renders as dotted keys with bracketed indices, rooted at
//! the model name: `Post.data.comments.create[0]`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadPath(String);

impl PayloadPath {
    pub fn root(model: &str) -> Self {
        Self(model.to_string())
    }

    /// Descend into an object key.
    pub fn key(&self, key: &str) -> Self {
        Self(format!("{}.{}", self.0, key))
    }

    /// Descend into a list element.
    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayloadPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
