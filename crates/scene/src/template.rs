use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::element::Element;
use crate::path::{numeric_arity, PropertyPath, ResolvedPath, Segment};
use crate::{xml, SceneError};

/// Dotted parameter keys mapped to their resolved locations.
pub type ParameterTable = BTreeMap<String, ResolvedPath>;

/// A scene description whose leaf properties can be located and overwritten.
///
/// Cloning a template yields an independent snapshot; every `ResolvedPath`
/// obtained from the original stays valid on the clone.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneTemplate {
    root: Element,
    source: Option<PathBuf>,
}

impl SceneTemplate {
    pub fn from_root(root: Element) -> Self {
        Self { root, source: None }
    }

    pub fn from_xml_str(text: &str) -> Result<Self, SceneError> {
        Ok(Self::from_root(xml::parse(text)?))
    }

    /// Load a scene document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SceneError::MissingInput(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut template = Self::from_xml_str(&text)?;
        template.source = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "loaded scene template");
        Ok(template)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// The file this template was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Bind a property path to concrete child positions.
    pub fn resolve(&self, path: &PropertyPath) -> Result<ResolvedPath, SceneError> {
        let display = path.to_string();
        let not_found = |reason: String| SceneError::PathNotFound {
            path: display.clone(),
            reason,
        };

        let mut element = &self.root;
        let mut indices = Vec::with_capacity(path.segments().len());
        for segment in path.segments() {
            let matches: Vec<usize> = match segment {
                Segment::Index(i) => {
                    if *i < element.children().len() {
                        vec![*i]
                    } else {
                        Vec::new()
                    }
                }
                Segment::Tag(tag) => positions(element, |c| c.tag() == tag),
                Segment::Keyed { tag, key } => positions(element, |c| {
                    tag.as_deref().is_none_or(|t| c.tag() == t) && c.is_keyed(key)
                }),
            };
            match matches.as_slice() {
                [index] => {
                    indices.push(*index);
                    element = &element.children()[*index];
                }
                [] => {
                    return Err(not_found(format!(
                        "no child matching `{segment}` under <{}> ({} children)",
                        element.tag(),
                        element.children().len()
                    )));
                }
                many => {
                    return Err(SceneError::AmbiguousPath {
                        path: display.clone(),
                        segment: segment.to_string(),
                        matches: many.len(),
                    });
                }
            }
        }

        let value = element.attribute(path.attribute()).ok_or_else(|| {
            not_found(format!(
                "<{}> has no attribute `{}`",
                element.tag(),
                path.attribute()
            ))
        })?;

        Ok(ResolvedPath {
            indices,
            attribute: path.attribute().to_string(),
            arity: numeric_arity(value),
            display,
        })
    }

    /// Parse and resolve a path in one step.
    pub fn resolve_str(&self, path: &str) -> Result<ResolvedPath, SceneError> {
        self.resolve(&path.parse()?)
    }

    /// Current text of a resolved attribute.
    pub fn get(&self, path: &ResolvedPath) -> Result<&str, SceneError> {
        let mut element = &self.root;
        for &i in &path.indices {
            element = element.child(i).ok_or_else(|| stale(path))?;
        }
        element.attribute(&path.attribute).ok_or_else(|| stale(path))
    }

    /// Overwrite a resolved attribute in place.
    pub fn set(&mut self, path: &ResolvedPath, value: impl Into<String>) -> Result<(), SceneError> {
        let mut element = &mut self.root;
        for &i in &path.indices {
            element = element.child_mut(i).ok_or_else(|| stale(path))?;
        }
        if element.attribute(&path.attribute).is_none() {
            return Err(stale(path));
        }
        element.set_attribute(path.attribute.clone(), value);
        Ok(())
    }

    pub fn to_xml_string(&self) -> String {
        xml::write(&self.root)
    }

    /// The whole document as UTF-8 XML bytes.
    pub fn serialize(&self) -> Vec<u8> {
        self.to_xml_string().into_bytes()
    }

    /// Every element carrying both `name` and `value`, keyed by the labels of
    /// its ancestors (root excluded) followed by its own name, e.g.
    /// `box.interior.albedo`. Keys produced by more than one element are left
    /// out.
    pub fn parameter_table(&self) -> ParameterTable {
        let mut found: BTreeMap<String, Vec<Vec<usize>>> = BTreeMap::new();
        let mut labels = Vec::new();
        let mut indices = Vec::new();
        collect_parameters(&self.root, &mut labels, &mut indices, &mut found);

        let mut table = ParameterTable::new();
        for (key, mut locations) in found {
            if locations.len() != 1 {
                tracing::debug!(%key, count = locations.len(), "ambiguous parameter key skipped");
                continue;
            }
            let indices = locations.remove(0);
            let value = self
                .element_at(&indices)
                .and_then(|e| e.attribute("value"))
                .unwrap_or_default();
            table.insert(
                key.clone(),
                ResolvedPath {
                    indices,
                    attribute: "value".into(),
                    arity: numeric_arity(value),
                    display: key,
                },
            );
        }
        table
    }

    fn element_at(&self, indices: &[usize]) -> Option<&Element> {
        indices
            .iter()
            .try_fold(&self.root, |element, &i| element.child(i))
    }
}

fn positions(element: &Element, pred: impl Fn(&Element) -> bool) -> Vec<usize> {
    element
        .children()
        .iter()
        .enumerate()
        .filter(|(_, c)| pred(c))
        .map(|(i, _)| i)
        .collect()
}

fn stale(path: &ResolvedPath) -> SceneError {
    SceneError::PathNotFound {
        path: path.display.clone(),
        reason: "template structure differs from the one the path was resolved against".into(),
    }
}

fn collect_parameters<'a>(
    element: &'a Element,
    labels: &mut Vec<&'a str>,
    indices: &mut Vec<usize>,
    found: &mut BTreeMap<String, Vec<Vec<usize>>>,
) {
    for (i, child) in element.children().iter().enumerate() {
        indices.push(i);
        if let (Some(name), Some(_)) = (child.attribute("name"), child.attribute("value")) {
            let key = labels
                .iter()
                .copied()
                .chain(std::iter::once(name))
                .collect::<Vec<_>>()
                .join(".");
            found.entry(key).or_default().push(indices.clone());
        }
        labels.push(child.label());
        collect_parameters(child, labels, indices, found);
        labels.pop();
        indices.pop();
    }
}
