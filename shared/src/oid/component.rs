use std::fmt;

use super::error::OidError;

/// The id that marks a component as matching any instance
pub const WILDCARD: &str = "*";

/// One segment of an [`Oid`](super::Oid) path.
///
/// A component either names a plain child (`profile`) or an instance of a
/// keyed child (`profile(abc)`). An id-bearing component whose id is not yet
/// known is printed with empty parentheses (`profile()`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathComponent {
    element: String,
    id: Option<String>,
    has_id: bool,
}

impl PathComponent {
    /// Create a validated component
    pub fn new(element: &str, id: Option<&str>, has_id: bool) -> Result<Self, OidError> {
        if !is_valid_element(element) {
            return Err(OidError::InvalidElement {
                element: element.to_string(),
            });
        }
        if let Some(id) = id {
            if !is_valid_id(id) {
                return Err(OidError::InvalidId { id: id.to_string() });
            }
        }

        Ok(Self {
            element: element.to_string(),
            id: id.map(str::to_string),
            has_id: has_id || id.is_some(),
        })
    }

    /// Parse a single segment like `element`, `element()` or `element(id)`
    pub fn parse(segment: &str) -> Result<Self, OidError> {
        let (element, id, has_id) = split_segment(segment);
        Self::new(element, id, has_id)
    }

    /// Build a component from a raw segment without validating its characters.
    /// Used when the tree grows dynamic structure under a known parent.
    pub fn raw(segment: &str) -> Self {
        let (element, id, has_id) = split_segment(segment);
        Self {
            element: element.to_string(),
            id: id.map(str::to_string),
            has_id,
        }
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn has_id(&self) -> bool {
        self.has_id
    }

    /// Whether this component carries an id slot that has not been filled
    pub fn is_unresolved(&self) -> bool {
        self.has_id && self.id.is_none()
    }

    /// Whether this component matches more than one entity
    pub fn is_generic(&self) -> bool {
        self.element == WILDCARD
            || self.is_unresolved()
            || self.id.as_deref() == Some(WILDCARD)
    }

    /// Return a copy with the id slot filled
    pub fn resolve(&self, id: &str) -> Self {
        Self {
            element: self.element.clone(),
            id: Some(id.to_string()),
            has_id: true,
        }
    }

    /// Component-wise comparison where a generic side matches anything of the
    /// same shape
    pub(crate) fn matches(&self, other: &PathComponent) -> bool {
        if self.element == WILDCARD || other.element == WILDCARD {
            return true;
        }
        if self.element != other.element || self.has_id != other.has_id {
            return false;
        }
        if !self.has_id {
            return true;
        }

        let generic_id =
            |c: &PathComponent| c.id.is_none() || c.id.as_deref() == Some(WILDCARD);
        generic_id(self) || generic_id(other) || self.id == other.id
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.element)?;
        if self.has_id {
            write!(f, "({})", self.id.as_deref().unwrap_or(""))?;
        }
        Ok(())
    }
}

fn split_segment(segment: &str) -> (&str, Option<&str>, bool) {
    if let Some(element) = segment.strip_suffix("()") {
        return (element, None, true);
    }
    if segment.ends_with(')') {
        if let Some(open) = segment.find('(') {
            let id = &segment[open + 1..segment.len() - 1];
            return (&segment[..open], Some(id), true);
        }
    }
    (segment, None, false)
}

pub(crate) fn is_valid_element(element: &str) -> bool {
    !element.is_empty()
        && element
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'*'))
}

pub(crate) fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id
            .chars()
            .any(|c| matches!(c, '/' | ':' | '(' | ')' | '[' | ']'))
}
