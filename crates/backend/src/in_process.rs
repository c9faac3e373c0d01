use crossrender_common::{Image, ParamValue};
use crossrender_scene::{SceneError, SceneTemplate};
use crossrender_sweep::SweepPoint;

use crate::{Backend, BackendError, ParameterBinding};

/// Error type returned by embedded renderers.
pub type RendererError = Box<dyn std::error::Error + Send + Sync>;

/// A renderer linked into this process.
///
/// The scene handle is cloned once per sweep point, so implementations must
/// make `Clone` produce an independent scene.
pub trait EmbeddedRenderer {
    type Scene: Clone;

    /// Build a scene from a structured description.
    fn load(&self, description: &SceneTemplate) -> Result<Self::Scene, RendererError>;

    /// Keys of every parameter the scene exposes for mutation.
    fn traverse(&self, scene: &Self::Scene) -> Vec<String>;

    fn set_parameter(
        &self,
        scene: &mut Self::Scene,
        key: &str,
        value: &ParamValue,
    ) -> Result<(), RendererError>;

    /// Commit pending parameter changes.
    fn update(&self, scene: &mut Self::Scene) -> Result<(), RendererError>;

    fn render(&self, scene: &Self::Scene) -> Result<Image, RendererError>;
}

/// Adapter for an [`EmbeddedRenderer`]: parameters are assigned directly on
/// a loaded scene handle.
pub struct InProcessBackend<R: EmbeddedRenderer> {
    id: String,
    renderer: R,
    base: R::Scene,
    bindings: Vec<ParameterBinding>,
}

impl<R: EmbeddedRenderer> InProcessBackend<R> {
    /// Load `description` once and check every binding key against the
    /// renderer's parameter table.
    pub fn new(
        id: impl Into<String>,
        renderer: R,
        description: &SceneTemplate,
        bindings: Vec<ParameterBinding>,
    ) -> Result<Self, BackendError> {
        let id = id.into();
        let base = renderer.load(description).map_err(embedded)?;
        let keys = renderer.traverse(&base);
        for binding in &bindings {
            if !keys.iter().any(|k| *k == binding.target) {
                return Err(SceneError::PathNotFound {
                    path: binding.target.clone(),
                    reason: format!("not among the {} parameters exposed to `{id}`", keys.len()),
                }
                .into());
            }
        }
        tracing::debug!(backend = %id, bindings = bindings.len(), "in-process backend ready");
        Ok(Self {
            id,
            renderer,
            base,
            bindings,
        })
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

fn embedded(e: RendererError) -> BackendError {
    BackendError::Embedded(e.to_string())
}

impl<R: EmbeddedRenderer> Backend for InProcessBackend<R> {
    type Prepared = R::Scene;

    fn id(&self) -> &str {
        &self.id
    }

    fn bindings(&self) -> &[ParameterBinding] {
        &self.bindings
    }

    fn prepare(&self, point: &SweepPoint) -> Result<R::Scene, BackendError> {
        let mut scene = self.base.clone();
        for binding in &self.bindings {
            let value = binding.encoding.evaluate(point)?;
            self.renderer
                .set_parameter(&mut scene, &binding.target, &value)
                .map_err(embedded)?;
        }
        self.renderer.update(&mut scene).map_err(embedded)?;
        Ok(scene)
    }

    fn render(&self, scene: R::Scene) -> Result<Image, BackendError> {
        self.renderer.render(&scene).map_err(embedded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DynBackend, Encoding, ProbeRenderer};

    const MEDIUM: &str = r#"
        <scene version="3.0.0">
            <integrator type="volpath"/>
            <shape type="cube" id="box">
                <medium type="homogeneous" name="interior">
                    <rgb name="albedo" value="0.5 0.5 0.5"/>
                    <float name="sigma_t" value="1"/>
                    <float name="scale" value="1"/>
                </medium>
            </shape>
        </scene>"#;

    fn description() -> SceneTemplate {
        SceneTemplate::from_xml_str(MEDIUM).unwrap()
    }

    fn bindings() -> Vec<ParameterBinding> {
        vec![
            ParameterBinding::new("box.interior.albedo", Encoding::direct("albedo")),
            ParameterBinding::new("box.interior.sigma_t", Encoding::direct("sigma_t")),
        ]
    }

    fn point(index: usize, albedo: f64, sigma_t: f64) -> SweepPoint {
        SweepPoint::new(
            index,
            [
                ("albedo", "albedo", ParamValue::rgb(albedo, albedo, albedo)),
                ("sigma_t", "t", ParamValue::Scalar(sigma_t)),
            ],
        )
    }

    #[test]
    fn unknown_key_fails_at_construction() {
        let err = InProcessBackend::new(
            "mitsuba",
            ProbeRenderer::new("box.interior.albedo"),
            &description(),
            vec![ParameterBinding::new(
                "box.interior.albedo.value.value",
                Encoding::direct("albedo"),
            )],
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            BackendError::Scene(SceneError::PathNotFound { .. })
        ));
    }

    #[test]
    fn prepare_applies_bindings_to_a_copy() {
        let backend = InProcessBackend::new(
            "mitsuba",
            ProbeRenderer::new("box.interior.albedo"),
            &description(),
            bindings(),
        )
        .unwrap();

        let scene = backend.prepare(&point(0, 0.75, 20.0)).unwrap();
        assert_eq!(scene.value("box.interior.albedo"), Some(ParamValue::rgb(0.75, 0.75, 0.75)));
        assert_eq!(scene.value("box.interior.sigma_t"), Some(ParamValue::Scalar(20.0)));
        assert_eq!(scene.value("box.interior.scale"), Some(ParamValue::Scalar(1.0)));

        // the base scene is untouched
        assert_eq!(
            backend.base.value("box.interior.albedo"),
            Some(ParamValue::rgb(0.5, 0.5, 0.5))
        );
    }

    #[test]
    fn points_do_not_leak_into_each_other() {
        let backend = InProcessBackend::new(
            "mitsuba",
            ProbeRenderer::new("box.interior.albedo"),
            &description(),
            vec![ParameterBinding::new(
                "box.interior.albedo",
                Encoding::direct("albedo"),
            )],
        )
        .unwrap();

        let first = backend.invoke(&point(0, 1.0, 20.0)).unwrap();
        let second = backend.invoke(&point(1, 0.25, 1.0)).unwrap();
        assert_eq!(first.pixel(0, 0), &[1.0, 1.0, 1.0]);
        assert_eq!(second.pixel(0, 0), &[0.25, 0.25, 0.25]);
        let scene = backend.prepare(&point(2, 0.0, 1.0)).unwrap();
        assert_eq!(scene.value("box.interior.sigma_t"), Some(ParamValue::Scalar(1.0)));
    }
}
