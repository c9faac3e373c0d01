/// Role of an element in a scene description, derived from its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Scene,
    Shape,
    Material,
    Light,
    Medium,
    Sensor,
    Sampler,
    Film,
    Filter,
    Integrator,
    Texture,
    /// A typed leaf value such as `<float name=".." value=".."/>`.
    Property,
    Other,
}

impl NodeKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "scene" => Self::Scene,
            "shape" | "mesh" => Self::Shape,
            "bsdf" => Self::Material,
            "emitter" => Self::Light,
            "medium" => Self::Medium,
            "sensor" | "camera" => Self::Sensor,
            "sampler" => Self::Sampler,
            "film" => Self::Film,
            "rfilter" => Self::Filter,
            "integrator" => Self::Integrator,
            "texture" => Self::Texture,
            "float" | "integer" | "boolean" | "string" | "rgb" | "color" | "spectrum"
            | "point" | "vector" | "transform" => Self::Property,
            _ => Self::Other,
        }
    }
}

/// One node of a scene document: a tag, ordered attributes and child elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: Option<String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::from_tag(&self.tag)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Replace an attribute value, or append it if absent. Order is preserved.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&Element> {
        self.children.get(index)
    }

    pub(crate) fn child_mut(&mut self, index: usize) -> Option<&mut Element> {
        self.children.get_mut(index)
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub(crate) fn append_text(&mut self, text: &str) {
        match &mut self.text {
            Some(t) => {
                t.push(' ');
                t.push_str(text);
            }
            None => self.text = Some(text.to_string()),
        }
    }

    /// Whether `key` names this element through its `id` or `name` attribute.
    pub fn is_keyed(&self, key: &str) -> bool {
        self.attribute("id") == Some(key) || self.attribute("name") == Some(key)
    }

    /// Label used in dotted parameter keys: `id`, else `name`, else the tag.
    pub fn label(&self) -> &str {
        self.attribute("id")
            .or_else(|| self.attribute("name"))
            .unwrap_or(&self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_tag() {
        assert_eq!(NodeKind::from_tag("bsdf"), NodeKind::Material);
        assert_eq!(NodeKind::from_tag("emitter"), NodeKind::Light);
        assert_eq!(NodeKind::from_tag("color"), NodeKind::Property);
        assert_eq!(NodeKind::from_tag("unknown"), NodeKind::Other);
    }

    #[test]
    fn set_attribute_replaces_in_place() {
        let mut el = Element::new("float")
            .with_attr("name", "sigma_t")
            .with_attr("value", "1");
        el.set_attribute("value", "20");
        el.set_attribute("extra", "x");
        assert_eq!(
            el.attributes(),
            &[
                ("name".to_string(), "sigma_t".to_string()),
                ("value".to_string(), "20".to_string()),
                ("extra".to_string(), "x".to_string()),
            ]
        );
    }

    #[test]
    fn label_prefers_id() {
        let el = Element::new("shape").with_attr("name", "n").with_attr("id", "box");
        assert_eq!(el.label(), "box");
        assert!(el.is_keyed("n"));
        assert_eq!(Element::new("integrator").label(), "integrator");
    }
}
