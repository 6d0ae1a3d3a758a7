//! Hierarchical object ids.
//!
//! An [`Oid`] addresses a node in the state tree:
//!
//! ```text
//! meshnet.core:/profile(abc)/client/name[0,10]
//! ```
//!
//! The namespace is optional when parsing (the default namespace is used) and
//! the trailing selector narrows an attribute's history either by index
//! (`[a,b]`) or by timestamp (`[a-b]`).

pub(crate) mod component;
mod error;
mod selection;

use std::{fmt, str::FromStr};

pub use component::{PathComponent, WILDCARD};
pub use error::OidError;
pub use selection::{IndexSelection, Selection, TimestampSelection};

use selection::Selector;

/// Namespace assumed when a parsed string does not carry one
pub const DEFAULT_NAMESPACE: &str = "meshnet.core";

/// An immutable path into the state tree
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Oid {
    namespace: String,
    path: Vec<PathComponent>,
    selector: Option<Selector>,
}

impl Oid {
    /// Parse an Oid from its textual form
    pub fn parse(input: &str) -> Result<Self, OidError> {
        let (namespace, path) = match input.matches(':').count() {
            0 => (DEFAULT_NAMESPACE, input),
            1 => input.split_once(':').unwrap_or((DEFAULT_NAMESPACE, input)),
            _ => {
                return Err(OidError::AmbiguousNamespace {
                    input: input.to_string(),
                })
            }
        };

        if !is_valid_namespace(namespace) {
            return Err(OidError::InvalidNamespace {
                namespace: namespace.to_string(),
            });
        }

        let (path, selector) = match path.strip_suffix(']').and_then(|p| p.rfind('[')) {
            Some(open) => {
                let selector_text = &path[open..];
                let selector = Selector::parse(selector_text)?;
                let path = &path[..open];
                if path.is_empty() || path.ends_with('/') {
                    return Err(OidError::MalformedSelector {
                        selector: selector_text.to_string(),
                        reason: "a selector must follow a path segment",
                    });
                }
                (path, Some(selector))
            }
            None => (path, None),
        };

        let path = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(PathComponent::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            namespace: namespace.to_string(),
            path,
            selector,
        })
    }

    /// Parse `input` and resolve its unresolved components with `resolutions`
    pub fn of(input: &str, resolutions: &[&str]) -> Result<Self, OidError> {
        Ok(Self::parse(input)?.resolve(resolutions))
    }

    /// The root Oid of a namespace
    pub fn root(namespace: &str) -> Result<Self, OidError> {
        if !is_valid_namespace(namespace) {
            return Err(OidError::InvalidNamespace {
                namespace: namespace.to_string(),
            });
        }
        Ok(Self {
            namespace: namespace.to_string(),
            path: Vec::new(),
            selector: None,
        })
    }

    pub(crate) fn from_parts(namespace: &str, path: Vec<PathComponent>) -> Self {
        Self {
            namespace: namespace.to_string(),
            path,
            selector: None,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &[PathComponent] {
        &self.path
    }

    pub fn index_selection(&self) -> Option<IndexSelection> {
        match self.selector {
            Some(Selector::Index(selection)) => Some(selection),
            _ => None,
        }
    }

    pub fn timestamp_selection(&self) -> Option<TimestampSelection> {
        match self.selector {
            Some(Selector::Timestamp(selection)) => Some(selection),
            _ => None,
        }
    }

    /// Element of the first path component
    pub fn first(&self) -> Option<&str> {
        self.path.first().map(PathComponent::element)
    }

    /// Element of the last path component
    pub fn last(&self) -> Option<&str> {
        self.path.last().map(PathComponent::element)
    }

    /// Path portion of the canonical text, without namespace or selector
    pub fn path_string(&self) -> String {
        if self.path.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for component in &self.path {
            out.push('/');
            out.push_str(&component.to_string());
        }
        out
    }

    /// Whether every id-bearing component carries a concrete id
    pub fn is_concrete(&self) -> bool {
        !self.path.iter().any(PathComponent::is_generic)
    }

    /// Fill unresolved components from the left
    pub fn resolve(&self, resolutions: &[&str]) -> Self {
        let mut path = self.path.clone();
        let mut slots = path.iter_mut().filter(|c| c.is_unresolved());
        for resolution in resolutions {
            match slots.next() {
                Some(slot) => *slot = slot.resolve(resolution),
                None => break,
            }
        }
        self.with_path(path)
    }

    /// Fill unresolved components from the right. The last resolution lands
    /// on the last unresolved component.
    pub fn resolve_last(&self, resolutions: &[&str]) -> Self {
        let mut path = self.path.clone();
        let mut slots = path.iter_mut().rev().filter(|c| c.is_unresolved());
        for resolution in resolutions.iter().rev() {
            match slots.next() {
                Some(slot) => *slot = slot.resolve(resolution),
                None => break,
            }
        }
        self.with_path(path)
    }

    /// Append a single raw segment
    pub fn child(&self, segment: &str) -> Self {
        let mut path = self.path.clone();
        path.push(PathComponent::raw(segment));
        self.with_path(path)
    }

    /// Append a '/' separated run of raw segments
    pub fn relative(&self, relative: &str) -> Self {
        let mut path = self.path.clone();
        path.extend(
            relative
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(PathComponent::raw),
        );
        self.with_path(path)
    }

    /// Append already-built components
    pub fn extend(&self, components: &[PathComponent]) -> Self {
        let mut path = self.path.clone();
        path.extend_from_slice(components);
        self.with_path(path)
    }

    /// The Oid one level up, or `None` at the root
    pub fn parent(&self) -> Option<Self> {
        if self.path.is_empty() {
            return None;
        }
        Some(Self::from_parts(
            &self.namespace,
            self.path[..self.path.len() - 1].to_vec(),
        ))
    }

    /// Whether this Oid is equal to or above `descendant`
    pub fn is_ancestor_of(&self, descendant: &Oid) -> bool {
        self.namespace == descendant.namespace && prefix_matches(&self.path, &descendant.path)
    }

    /// Whether this Oid is equal to or below `ancestor`
    pub fn is_descendant_of(&self, ancestor: &Oid) -> bool {
        ancestor.is_ancestor_of(self)
    }

    /// Components of this Oid below `ancestor`, or `None` when `ancestor` is
    /// not an ancestor
    pub fn relative_path_from(&self, ancestor: &Oid) -> Option<Vec<PathComponent>> {
        if !self.is_descendant_of(ancestor) {
            return None;
        }
        Some(self.path[ancestor.path.len()..].to_vec())
    }

    fn with_path(&self, path: Vec<PathComponent>) -> Self {
        Self {
            namespace: self.namespace.clone(),
            path,
            selector: self.selector,
        }
    }
}

fn prefix_matches(ancestor: &[PathComponent], descendant: &[PathComponent]) -> bool {
    ancestor.len() <= descendant.len()
        && ancestor
            .iter()
            .zip(descendant.iter())
            .all(|(a, d)| a.matches(d))
}

fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty() && namespace.bytes().all(|b| b.is_ascii_lowercase() || b == b'.')
}

impl FromStr for Oid {
    type Err = OidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path_string())?;
        if let Some(selector) = &self.selector {
            write!(f, "{}", selector)?;
        }
        Ok(())
    }
}
