use std::fmt;

use crate::element::{Element, NodeKind};
use crate::template::SceneTemplate;

/// One non-property element of a scene, addressed structurally.
#[derive(Debug, Clone)]
pub struct OutlineEntry {
    /// Child index chain from the root, e.g. `6/3`.
    pub structural: String,
    pub depth: usize,
    pub kind: NodeKind,
    pub tag: String,
    pub label: String,
    pub plugin: Option<String>,
}

/// Read-only outline of a scene template for developer tooling: the node
/// hierarchy plus the dotted parameter keys an embedded renderer would expose.
#[derive(Debug, Clone)]
pub struct SceneOutline {
    pub nodes: Vec<OutlineEntry>,
    pub parameters: Vec<(String, String, String)>,
}

impl SceneOutline {
    pub fn of(template: &SceneTemplate) -> Self {
        let mut nodes = Vec::new();
        let mut indices = Vec::new();
        walk(template.root(), &mut indices, &mut nodes);

        let parameters = template
            .parameter_table()
            .into_iter()
            .map(|(key, path)| {
                let value = template.get(&path).unwrap_or_default().to_string();
                (key, path.structural(), value)
            })
            .collect();

        Self { nodes, parameters }
    }
}

fn walk(element: &Element, indices: &mut Vec<usize>, out: &mut Vec<OutlineEntry>) {
    for (i, child) in element.children().iter().enumerate() {
        if child.kind() == NodeKind::Property {
            continue;
        }
        indices.push(i);
        out.push(OutlineEntry {
            structural: indices
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join("/"),
            depth: indices.len() - 1,
            kind: child.kind(),
            tag: child.tag().to_string(),
            label: child.label().to_string(),
            plugin: child.attribute("type").map(str::to_string),
        });
        walk(child, indices, out);
        indices.pop();
    }
}

impl fmt::Display for SceneOutline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes:")?;
        for node in &self.nodes {
            writeln!(
                f,
                "  {:indent$}[{}] {:?} <{}> {}{}",
                "",
                node.structural,
                node.kind,
                node.tag,
                node.label,
                node.plugin
                    .as_deref()
                    .map(|p| format!(" type={p}"))
                    .unwrap_or_default(),
                indent = node.depth * 2
            )?;
        }
        writeln!(f, "Parameters:")?;
        for (key, structural, value) in &self.parameters {
            writeln!(f, "  {key} ({structural}) = {value}")?;
        }
        Ok(())
    }
}
