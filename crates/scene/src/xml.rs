//! XML conversion for scene documents.
//!
//! Comments and processing instructions are dropped on load; element text
//! is kept with surrounding whitespace trimmed.

use roxmltree::{Document, Node};

use crate::element::Element;
use crate::SceneError;

pub(crate) fn parse(text: &str) -> Result<Element, SceneError> {
    let doc = Document::parse(text)?;
    Ok(convert(doc.root_element()))
}

fn convert(node: Node) -> Element {
    let mut element = Element::new(node.tag_name().name());
    for attr in node.attributes() {
        element.set_attribute(attr.name(), attr.value());
    }
    for child in node.children() {
        if child.is_element() {
            element.push_child(convert(child));
        } else if child.is_text() {
            if let Some(text) = child.text().map(str::trim).filter(|t| !t.is_empty()) {
                element.append_text(text);
            }
        }
    }
    element
}

pub(crate) fn write(root: &Element) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\n");
    write_element(&mut out, root, 0);
    out
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    let indent = "    ".repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(element.tag());
    for (name, value) in element.attributes() {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value, true));
        out.push('"');
    }

    match (element.children().is_empty(), element.text()) {
        (true, None) => out.push_str("/>\n"),
        (true, Some(text)) => {
            out.push('>');
            out.push_str(&escape(text, false));
            out.push_str("</");
            out.push_str(element.tag());
            out.push_str(">\n");
        }
        (false, text) => {
            out.push_str(">\n");
            if let Some(text) = text {
                out.push_str(&indent);
                out.push_str("    ");
                out.push_str(&escape(text, false));
                out.push('\n');
            }
            for child in element.children() {
                write_element(out, child, depth + 1);
            }
            out.push_str(&indent);
            out.push_str("</");
            out.push_str(element.tag());
            out.push_str(">\n");
        }
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' if attribute => out.push_str("&#10;"),
            '\t' if attribute => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
    out
}
