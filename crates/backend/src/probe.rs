use crossrender_common::{Image, ParamValue};
use crossrender_scene::{ParameterTable, SceneTemplate};

use crate::in_process::{EmbeddedRenderer, RendererError};

/// Debug renderer: fills the whole frame with the current value of one
/// scene parameter.
///
/// Useful for checking that a sweep reaches the renderer without linking a
/// real one.
#[derive(Debug, Clone)]
pub struct ProbeRenderer {
    probe: String,
    width: u32,
    height: u32,
}

impl ProbeRenderer {
    pub fn new(probe: impl Into<String>) -> Self {
        Self {
            probe: probe.into(),
            width: 4,
            height: 4,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn probe(&self) -> &str {
        &self.probe
    }
}

#[derive(Debug, Clone)]
pub struct ProbeScene {
    template: SceneTemplate,
    table: ParameterTable,
    dirty: bool,
}

impl ProbeScene {
    /// Current numeric value of a parameter key.
    pub fn value(&self, key: &str) -> Option<ParamValue> {
        let path = self.table.get(key)?;
        ParamValue::parse(self.template.get(path).ok()?)
    }
}

impl EmbeddedRenderer for ProbeRenderer {
    type Scene = ProbeScene;

    fn load(&self, description: &SceneTemplate) -> Result<ProbeScene, RendererError> {
        let table = description.parameter_table();
        if !table.contains_key(&self.probe) {
            return Err(format!("probe parameter `{}` not in scene", self.probe).into());
        }
        Ok(ProbeScene {
            template: description.clone(),
            table,
            dirty: false,
        })
    }

    fn traverse(&self, scene: &ProbeScene) -> Vec<String> {
        scene.table.keys().cloned().collect()
    }

    fn set_parameter(
        &self,
        scene: &mut ProbeScene,
        key: &str,
        value: &ParamValue,
    ) -> Result<(), RendererError> {
        let path = scene
            .table
            .get(key)
            .ok_or_else(|| format!("unknown parameter `{key}`"))?;
        let slot = path
            .arity()
            .ok_or_else(|| format!("parameter `{key}` is not numeric"))?;
        let text = value.encode(slot, 9)?;
        scene.template.set(path, text)?;
        scene.dirty = true;
        Ok(())
    }

    fn update(&self, scene: &mut ProbeScene) -> Result<(), RendererError> {
        scene.dirty = false;
        Ok(())
    }

    fn render(&self, scene: &ProbeScene) -> Result<Image, RendererError> {
        if scene.dirty {
            return Err("scene has parameter changes that were never committed".into());
        }
        let value = scene
            .value(&self.probe)
            .ok_or_else(|| format!("probe parameter `{}` is not numeric", self.probe))?;
        let rgb = value.to_rgb().as_vec3().to_array();
        Ok(Image::filled_rgb(self.width, self.height, rgb)?)
    }
}
