use std::{fmt, str::FromStr};

use super::error::OidError;

/// A closed range where either bound may be left open
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Selection<T> {
    pub start: Option<T>,
    pub end: Option<T>,
}

impl<T: PartialOrd + Copy> Selection<T> {
    pub fn all() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    pub fn closed(start: T, end: T) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, value: T) -> bool {
        self.start.map_or(true, |start| value >= start) && self.end.map_or(true, |end| value <= end)
    }
}

/// Selects entries of an attribute's history by position
pub type IndexSelection = Selection<i32>;

/// Selects entries of an attribute's history by timestamp (milliseconds)
pub type TimestampSelection = Selection<u64>;

/// The selector that may trail the last segment of an Oid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Selector {
    Index(IndexSelection),
    Timestamp(TimestampSelection),
}

impl Selector {
    /// Parse the text between (and including) the brackets
    pub(crate) fn parse(selector: &str) -> Result<Self, OidError> {
        let malformed = |reason: &'static str| OidError::MalformedSelector {
            selector: selector.to_string(),
            reason,
        };

        let inner = selector
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| malformed("expected '[' and ']'"))?;

        if inner.contains(',') {
            let (start, end) = split_bounds(inner, ',').ok_or_else(|| malformed("expected exactly one ','"))?;
            Ok(Selector::Index(Selection {
                start: parse_bound(start).map_err(|_| malformed("index bound is not an integer"))?,
                end: parse_bound(end).map_err(|_| malformed("index bound is not an integer"))?,
            }))
        } else if inner.contains('-') {
            let (start, end) = split_bounds(inner, '-').ok_or_else(|| malformed("expected exactly one '-'"))?;
            Ok(Selector::Timestamp(Selection {
                start: parse_bound(start).map_err(|_| malformed("timestamp bound is not an integer"))?,
                end: parse_bound(end).map_err(|_| malformed("timestamp bound is not an integer"))?,
            }))
        } else {
            Err(malformed("expected ',' for an index range or '-' for a timestamp range"))
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(range) => write_bounds(f, range, ','),
            Selector::Timestamp(range) => write_bounds(f, range, '-'),
        }
    }
}

fn split_bounds(inner: &str, separator: char) -> Option<(&str, &str)> {
    let mut parts = inner.split(separator);
    let start = parts.next()?;
    let end = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((start.trim(), end.trim()))
}

fn parse_bound<T: FromStr>(bound: &str) -> Result<Option<T>, T::Err> {
    if bound.is_empty() {
        return Ok(None);
    }
    bound.parse().map(Some)
}

fn write_bounds<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    range: &Selection<T>,
    separator: char,
) -> fmt::Result {
    f.write_str("[")?;
    if let Some(start) = &range.start {
        write!(f, "{}", start)?;
    }
    write!(f, "{}", separator)?;
    if let Some(end) = &range.end {
        write!(f, "{}", end)?;
    }
    f.write_str("]")
}
