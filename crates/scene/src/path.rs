use std::fmt;
use std::str::FromStr;

use crate::SceneError;

/// One step of a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// The n-th child element.
    Index(usize),
    /// The only child with this tag.
    Tag(String),
    /// The only child (optionally of a given tag) whose `name` or `id` is `key`.
    Keyed { tag: Option<String>, key: String },
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Tag(t) => write!(f, "{t}"),
            Self::Keyed { tag, key } => write!(f, "{}[{key}]", tag.as_deref().unwrap_or("")),
        }
    }
}

/// A parsed, unresolved address of one attribute in a scene document.
///
/// Syntax: `/`-separated segments followed by `@attribute`, e.g.
/// `6/3/0@value` or `shape[box]/medium[interior]/rgb[albedo]@value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    segments: Vec<Segment>,
    attribute: String,
}

impl PropertyPath {
    pub fn new(segments: Vec<Segment>, attribute: impl Into<String>) -> Self {
        Self {
            segments,
            attribute: attribute.into(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body: Vec<String> = self.segments.iter().map(|s| s.to_string()).collect();
        write!(f, "{}@{}", body.join("/"), self.attribute)
    }
}

impl FromStr for PropertyPath {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SceneError::InvalidPath {
            path: s.to_string(),
            reason: reason.to_string(),
        };

        let (body, attribute) = s
            .rsplit_once('@')
            .ok_or_else(|| invalid("missing `@attribute` suffix"))?;
        if attribute.is_empty() || attribute.contains(['/', '[', ']']) {
            return Err(invalid("attribute name is empty or malformed"));
        }

        let body = body.trim_start_matches('/');
        let mut segments = Vec::new();
        if !body.is_empty() {
            for raw in body.split('/') {
                segments.push(parse_segment(raw).ok_or_else(|| {
                    invalid(&format!("malformed segment `{raw}`"))
                })?);
            }
        }

        Ok(Self::new(segments, attribute))
    }
}

fn parse_segment(raw: &str) -> Option<Segment> {
    if raw.is_empty() {
        return None;
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse().ok().map(Segment::Index);
    }
    match raw.split_once('[') {
        Some((tag, rest)) => {
            let key = rest.strip_suffix(']')?;
            if key.is_empty() || key.contains(['[', ']']) {
                return None;
            }
            Some(Segment::Keyed {
                tag: (!tag.is_empty()).then(|| tag.to_string()),
                key: key.to_string(),
            })
        }
        None if !raw.contains(']') => Some(Segment::Tag(raw.to_string())),
        None => None,
    }
}

/// A property path bound to concrete child positions in one template.
///
/// Valid for the template it was resolved against and for every clone of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub(crate) indices: Vec<usize>,
    pub(crate) attribute: String,
    pub(crate) arity: Option<usize>,
    pub(crate) display: String,
}

impl ResolvedPath {
    /// Child index chain from the root.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Number of numeric components in the attribute at resolution time,
    /// `None` if the attribute is not numeric.
    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    /// Structural form of the path, e.g. `6/3/0@value`.
    pub fn structural(&self) -> String {
        let body: Vec<String> = self.indices.iter().map(|i| i.to_string()).collect();
        format!("{}@{}", body.join("/"), self.attribute)
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Count whitespace/comma separated numbers; `None` if any token is not one.
pub(crate) fn numeric_arity(text: &str) -> Option<usize> {
    let mut count = 0;
    for token in text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        token.parse::<f64>().ok()?;
        count += 1;
    }
    (count > 0).then_some(count)
}
