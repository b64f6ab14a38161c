use std::fmt;

use crate::errors::FunnelError;

/// A possibly relation-qualified attribute, e.g. `title` or `comments.replies.body`.
///
/// Everything before the last dot is the relation path, the last segment is
/// the attribute on the related entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    segments: Vec<String>,
}

impl Attribute {
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    #[must_use]
    pub fn has_relation(&self) -> bool {
        self.relation_count() > 0
    }

    /// Number of relations traversed before reaching the attribute
    #[must_use]
    pub fn relation_count(&self) -> usize {
        self.segments.len() - 1
    }

    /// The relation path, `comments.replies` for `comments.replies.body`
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::InvalidOperation`] when the attribute has no relation.
    pub fn extract_relation(&self) -> Result<String, FunnelError> {
        if !self.has_relation() {
            return Err(FunnelError::invalid_operation(
                "Trying to extract relation from non-relation string.",
            ));
        }
        Ok(self.relation_segments().join("."))
    }

    /// The attribute on the innermost relation, `body` for `comments.replies.body`
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::InvalidOperation`] when the attribute has no relation.
    pub fn extract_attribute(&self) -> Result<&str, FunnelError> {
        if !self.has_relation() {
            return Err(FunnelError::invalid_operation(
                "Trying to extract attribute from non-relation string.",
            ));
        }
        Ok(self.leaf())
    }

    /// Leaf attribute name, the whole path when there is no relation
    #[must_use]
    pub fn name(&self) -> &str {
        self.leaf()
    }

    #[must_use]
    pub fn relation_segments(&self) -> &[String] {
        &self.segments[..self.relation_count()]
    }

    fn leaf(&self) -> &str {
        // split always yields at least one segment
        &self.segments[self.segments.len() - 1]
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<&str> for Attribute {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
