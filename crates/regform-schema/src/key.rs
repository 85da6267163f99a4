//! Composite answer keys
//!
//! Provides [`KeyPath`] for addressing nodes inside a document by the chain of
//! ancestor ids, with repeated instances annotated by their position.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Joins the segments of a composite key
pub const KEY_SEPARATOR: char = '.';

/// Separates a repeated instance's id from its position
pub const INDEX_SEPARATOR: char = ':';

/// Characters a node id may never contain
pub const RESERVED_CHARS: [char; 2] = [KEY_SEPARATOR, INDEX_SEPARATOR];

/// Answer key of the registration choice
pub const REGISTRATION_CHOICE_KEY: &str = "registrationChoice";

/// Answer key of the embargo end date
pub const EMBARGO_END_DATE_KEY: &str = "embargoEndDate";

/// Document-level answer keys no top-level node may take
pub const RESERVED_KEYS: [&str; 2] = [REGISTRATION_CHOICE_KEY, EMBARGO_END_DATE_KEY];

/// One level of a composite key
///
/// `authors` addresses a plain node, `authors:2` the third repeated instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Segment {
    id: String,
    index: Option<usize>,
}

impl Segment {
    /// Segment for a plain node
    #[inline]
    #[must_use]
    pub fn plain(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            index: None,
        }
    }

    /// Segment for a repeated instance
    #[inline]
    #[must_use]
    pub fn indexed(id: impl Into<String>, index: usize) -> Self {
        Self {
            id: id.into(),
            index: Some(index),
        }
    }

    /// Node id of this segment
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Repeat position, if this segment addresses an instance
    #[inline]
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Same segment without its repeat position
    #[inline]
    #[must_use]
    pub fn unindexed(&self) -> Self {
        Self::plain(self.id.clone())
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}{}{}", self.id, INDEX_SEPARATOR, index),
            None => f.write_str(&self.id),
        }
    }
}

impl FromStr for Segment {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, index) = match s.split_once(INDEX_SEPARATOR) {
            Some((id, raw)) => {
                let index = raw
                    .parse::<usize>()
                    .map_err(|_| KeyError::InvalidIndex(s.to_string()))?;
                (id, Some(index))
            }
            None => (s, None),
        };

        if id.is_empty() {
            return Err(KeyError::EmptySegment);
        }

        Ok(Self {
            id: id.to_string(),
            index,
        })
    }
}

/// Composite key of a node
///
/// # Examples
/// - `["project", "title"]` → `project.title`
/// - `["authors:1", "name"]` → `authors:1.name`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct KeyPath(Vec<Segment>);

impl KeyPath {
    /// Create key from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Empty key (document level)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get key segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if key is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, if any
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Append a segment, returning new key
    #[inline]
    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut new = self.clone();
        new.0.push(segment);
        new
    }

    /// Append a segment in place
    #[inline]
    pub fn push(&mut self, segment: Segment) {
        self.0.push(segment);
    }

    /// Check if this key is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Get relative key from an ancestor key
    ///
    /// # Errors
    /// Returns error if `self` is not below `ancestor`
    pub fn relative_to(&self, ancestor: &Self) -> Result<Self, KeyError> {
        if !ancestor.is_prefix_of(self) {
            return Err(KeyError::NotDescendant {
                key: self.to_string(),
                ancestor: ancestor.to_string(),
            });
        }
        Ok(Self(self.0[ancestor.0.len()..].to_vec()))
    }

    /// Iterator over segments from outermost to innermost
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.0.iter()
    }
}

impl Display for KeyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{KEY_SEPARATOR}")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for KeyPath {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }

        let segments = s
            .split(KEY_SEPARATOR)
            .map(Segment::from_str)
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }
}

impl From<Vec<Segment>> for KeyPath {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

/// Errors related to composite keys
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Empty segment in key
    #[error("key contains empty segment")]
    EmptySegment,

    /// Repeat position is not a number
    #[error("invalid repeat index in segment '{0}'")]
    InvalidIndex(String),

    /// Not a descendant key
    #[error("key '{key}' is not below '{ancestor}'")]
    NotDescendant { key: String, ancestor: String },
}
