use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crossrender_artifacts::ArtifactManager;
use crossrender_backend::DynBackend;
use crossrender_sweep::{Sweep, SweepConfigError};

use crate::report::{ArtifactRecord, FailureRecord, RunReport};
use crate::HarnessError;

/// One artifact a run will try to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedArtifact {
    pub backend: String,
    pub point: usize,
    pub name: String,
}

/// Runs a set of backends over a sweep.
pub struct Harness {
    artifacts: ArtifactManager,
    backends: Vec<Box<dyn DynBackend>>,
    only: Vec<String>,
}

impl Harness {
    pub fn new(artifacts: ArtifactManager) -> Self {
        Self {
            artifacts,
            backends: Vec::new(),
            only: Vec::new(),
        }
    }

    pub fn with_backend(self, backend: impl DynBackend + 'static) -> Self {
        self.with_boxed_backend(Box::new(backend))
    }

    pub fn with_boxed_backend(mut self, backend: Box<dyn DynBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Restrict the run to the given backend ids. An empty list runs all.
    pub fn only<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn artifacts(&self) -> &ArtifactManager {
        &self.artifacts
    }

    pub fn backend_ids(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    /// Where the JSON run report goes: `<output>/<prefix>_report.json`.
    pub fn report_path(&self) -> PathBuf {
        let file = match self.artifacts.prefix() {
            "" => "report.json".to_string(),
            prefix => format!("{prefix}_report.json"),
        };
        self.artifacts.output_dir().join(file)
    }

    fn active(&self) -> Vec<&dyn DynBackend> {
        self.backends
            .iter()
            .filter(|b| self.only.is_empty() || self.only.iter().any(|id| id == b.id()))
            .map(|b| b.as_ref())
            .collect()
    }

    /// Validate the run and list the artifacts it would produce, in
    /// execution order. Renders nothing.
    pub fn plan(&self, sweep: &Sweep) -> Result<Vec<PlannedArtifact>, HarnessError> {
        let mut ids = HashSet::new();
        for backend in &self.backends {
            if !ids.insert(backend.id()) {
                return Err(HarnessError::DuplicateBackend(backend.id().to_string()));
            }
        }
        if let Some(id) = self.only.iter().find(|id| !ids.contains(id.as_str())) {
            return Err(HarnessError::UnknownBackend(id.clone()));
        }

        let active = self.active();
        for backend in &active {
            if let Some(parameter) = backend.parameters().into_iter().find(|p| !sweep.contains(p)) {
                return Err(HarnessError::UnboundParameter {
                    backend: backend.id().to_string(),
                    parameter,
                });
            }
        }

        let mut planned = Vec::with_capacity(sweep.len() * active.len());
        let mut seen: HashMap<String, usize> = HashMap::new();
        for point in sweep.points() {
            for backend in &active {
                let name = self.artifacts.name_for(backend.id(), &point);
                if let Some(&first) = seen.get(&name) {
                    return Err(SweepConfigError::DuplicatePoint {
                        first,
                        second: point.index(),
                        name,
                    }
                    .into());
                }
                seen.insert(name.clone(), point.index());
                planned.push(PlannedArtifact {
                    backend: backend.id().to_string(),
                    point: point.index(),
                    name,
                });
            }
        }
        Ok(planned)
    }

    /// Render every active backend at every sweep point.
    ///
    /// Returns `Err` only for setup problems; per-point failures are in the
    /// report.
    pub fn run(&self, sweep: &Sweep) -> Result<RunReport, HarnessError> {
        let planned = self.plan(sweep)?;
        let active = self.active();
        tracing::info!(
            points = sweep.len(),
            backends = active.len(),
            artifacts = planned.len(),
            "starting sweep"
        );

        let mut report = RunReport::default();
        for point in sweep.points() {
            let _span = tracing::info_span!("point", index = point.index()).entered();
            for backend in &active {
                let id = backend.id();
                let name = self.artifacts.name_for(id, &point);
                let outcome = backend
                    .invoke(&point)
                    .map_err(|failure| (failure.stage(), failure.error.to_string()))
                    .and_then(|image| {
                        self.artifacts
                            .write_named(&image, &name)
                            .map_err(|e| ("write", e.to_string()))
                    });
                match outcome {
                    Ok(paths) => {
                        tracing::info!(backend = id, %point, file = %paths.exr.display(), "artifact written");
                        report.artifacts.push(ArtifactRecord {
                            backend: id.to_string(),
                            point: point.index(),
                            name,
                            paths,
                        });
                    }
                    Err((stage, error)) => {
                        tracing::warn!(backend = id, %point, stage, %error, "render failed");
                        report.failures.push(FailureRecord {
                            backend: id.to_string(),
                            point: point.clone(),
                            stage: stage.to_string(),
                            error,
                            artifact: name,
                        });
                    }
                }
            }
        }

        tracing::info!(
            written = report.artifacts.len(),
            failed = report.failures.len(),
            "sweep finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossrender_backend::{
        Encoding, InProcessBackend, ParameterBinding, ProbeRenderer,
    };
    use crossrender_common::ParamValue;
    use crossrender_scene::SceneTemplate;
    use crossrender_sweep::Parameter;

    const MEDIUM: &str = r#"
        <scene version="3.0.0">
            <shape type="cube" id="box">
                <medium type="homogeneous" name="interior">
                    <rgb name="albedo" value="0.5 0.5 0.5"/>
                    <float name="sigma_t" value="1"/>
                </medium>
            </shape>
        </scene>"#;

    fn probe_backend(id: &str, bindings: Vec<ParameterBinding>) -> InProcessBackend<ProbeRenderer> {
        let scene = SceneTemplate::from_xml_str(MEDIUM).unwrap();
        InProcessBackend::new(id, ProbeRenderer::new("box.interior.albedo"), &scene, bindings).unwrap()
    }

    fn albedo_binding() -> Vec<ParameterBinding> {
        vec![ParameterBinding::new(
            "box.interior.albedo",
            Encoding::direct("albedo"),
        )]
    }

    fn albedo_sweep() -> Sweep {
        Sweep::zip(vec![
            Parameter::new(
                "albedo",
                vec![
                    ParamValue::rgb(0.0, 0.0, 0.0),
                    ParamValue::rgb(1.0, 1.0, 1.0),
                ],
            ),
            Parameter::new("sigma_t", vec![1.0.into(), 20.0.into()]).with_label("t"),
        ])
        .unwrap()
    }

    fn file_count(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn run_writes_one_artifact_per_backend_and_point() {
        let tmp = tempfile::tempdir().unwrap();
        let harness = Harness::new(ArtifactManager::new(tmp.path(), "cbox").with_tonemapped(false))
            .with_backend(probe_backend("mitsuba", albedo_binding()))
            .with_backend(probe_backend("preview", albedo_binding()));

        let report = harness.run(&albedo_sweep()).unwrap();
        assert!(report.is_success());
        let names: Vec<&str> = report.artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "cbox_mitsuba_albedo=0.0_t=1.0",
                "cbox_preview_albedo=0.0_t=1.0",
                "cbox_mitsuba_albedo=1.0_t=20.0",
                "cbox_preview_albedo=1.0_t=20.0",
            ]
        );
        assert_eq!(file_count(tmp.path()), 4);
        let image = crossrender_artifacts::read_exr(&report.artifacts[2].paths.exr).unwrap();
        assert_eq!(image.pixel(0, 0), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn duplicate_backend_ids_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let harness = Harness::new(ArtifactManager::new(tmp.path(), "cbox"))
            .with_backend(probe_backend("mitsuba", albedo_binding()))
            .with_backend(probe_backend("mitsuba", albedo_binding()));
        assert!(matches!(
            harness.run(&albedo_sweep()),
            Err(HarnessError::DuplicateBackend(id)) if id == "mitsuba"
        ));
        assert_eq!(file_count(tmp.path()), 0);
    }

    #[test]
    fn unbound_parameter_fails_before_rendering() {
        let tmp = tempfile::tempdir().unwrap();
        let bindings = vec![ParameterBinding::new(
            "box.interior.albedo",
            Encoding::direct("roughness"),
        )];
        let harness = Harness::new(ArtifactManager::new(tmp.path(), "cbox"))
            .with_backend(probe_backend("mitsuba", albedo_binding()))
            .with_backend(probe_backend("broken", bindings));
        match harness.run(&albedo_sweep()) {
            Err(HarnessError::UnboundParameter { backend, parameter }) => {
                assert_eq!(backend, "broken");
                assert_eq!(parameter, "roughness");
            }
            other => panic!("expected UnboundParameter, got {other:?}"),
        }
        assert_eq!(file_count(tmp.path()), 0);
    }

    #[test]
    fn colliding_names_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let sweep = Sweep::zip(vec![
            Parameter::new("albedo", vec![0.5.into(), 0.5.into()]),
            Parameter::new("sigma_t", vec![1.0.into(), 1.0.into()]),
        ])
        .unwrap();
        let harness = Harness::new(ArtifactManager::new(tmp.path(), "cbox"))
            .with_backend(probe_backend("mitsuba", albedo_binding()));
        assert!(matches!(
            harness.run(&sweep),
            Err(HarnessError::Sweep(SweepConfigError::DuplicatePoint {
                first: 0,
                second: 1,
                ..
            }))
        ));
        assert_eq!(file_count(tmp.path()), 0);
    }

    #[test]
    fn only_filters_backends_without_renaming() {
        let tmp = tempfile::tempdir().unwrap();
        let harness = Harness::new(ArtifactManager::new(tmp.path(), "cbox").with_tonemapped(false))
            .with_backend(probe_backend("mitsuba", albedo_binding()))
            .with_backend(probe_backend("preview", albedo_binding()))
            .only(["preview"]);
        let report = harness.run(&albedo_sweep()).unwrap();
        assert_eq!(report.artifacts.len(), 2);
        assert!(report.artifacts.iter().all(|a| a.backend == "preview"));
        assert_eq!(report.artifacts[0].name, "cbox_preview_albedo=0.0_t=1.0");

        let unknown = Harness::new(ArtifactManager::new(tmp.path(), "cbox"))
            .with_backend(probe_backend("mitsuba", albedo_binding()))
            .only(["nori"]);
        assert!(matches!(
            unknown.plan(&albedo_sweep()),
            Err(HarnessError::UnknownBackend(_))
        ));
    }

    #[test]
    fn rerun_produces_identical_names() {
        let tmp = tempfile::tempdir().unwrap();
        let harness = Harness::new(ArtifactManager::new(tmp.path(), "cbox"))
            .with_backend(probe_backend("mitsuba", albedo_binding()));
        let first = harness.run(&albedo_sweep()).unwrap();
        let second = harness.run(&albedo_sweep()).unwrap();
        assert_eq!(first, second);
        assert_eq!(file_count(tmp.path()), 4);
    }

    #[test]
    fn report_path_uses_prefix() {
        let harness = Harness::new(ArtifactManager::new("renders", "cbox"));
        assert_eq!(harness.report_path(), PathBuf::from("renders/cbox_report.json"));
        let harness = Harness::new(ArtifactManager::new("renders", ""));
        assert_eq!(harness.report_path(), PathBuf::from("renders/report.json"));
    }

    #[cfg(unix)]
    mod external {
        use super::*;
        use crossrender_backend::{ExternalCommand, ExternalProcessBackend};
        use crossrender_common::Image;

        const CBOX: &str = r#"<scene>
    <integrator type="path_mis"/>
    <medium type="homogeneous">
        <color name="sigma_a" value="0.5 0.5 0.5"/>
        <color name="sigma_s" value="0.5 0.5 0.5"/>
    </medium>
</scene>"#;

        /// Writes a constant image unless sigma_s is 20.
        fn nori(dir: &std::path::Path) -> ExternalProcessBackend {
            std::fs::write(dir.join("cbox.xml"), CBOX).unwrap();
            let fixture = dir.join("fixture.exr");
            crossrender_artifacts::write_exr(
                &fixture,
                &Image::filled_rgb(1, 1, [0.5, 0.5, 0.5]).unwrap(),
            )
            .unwrap();
            let script = format!(
                "if grep -q 20.000000 \"$1\"; then echo diverged >&2; exit 1; fi\ncp '{}' \"$2\"",
                fixture.display()
            );
            let command = ExternalCommand::new("sh").unwrap().with_args(vec![
                "-c".into(),
                script,
                "sh".into(),
                "{scene}".into(),
                "{output}".into(),
            ]);
            let base = SceneTemplate::load(dir.join("cbox.xml")).unwrap();
            ExternalProcessBackend::new(
                "nori",
                command,
                base,
                vec![
                    ParameterBinding::new(
                        "1/1@value",
                        Encoding::Scattering {
                            albedo: "albedo".into(),
                            sigma_t: "sigma_t".into(),
                        },
                    ),
                    ParameterBinding::new(
                        "1/0@value",
                        Encoding::Absorption {
                            albedo: "albedo".into(),
                            sigma_t: "sigma_t".into(),
                        },
                    ),
                ],
            )
            .unwrap()
        }

        #[test]
        fn failing_point_does_not_stop_the_run() {
            let scenes = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let sweep = Sweep::zip(vec![
                Parameter::new("albedo", vec![0.5.into(), 1.0.into(), 0.25.into()]),
                Parameter::new("sigma_t", vec![1.0.into(), 20.0.into(), 4.0.into()])
                    .with_label("t"),
            ])
            .unwrap();
            let harness = Harness::new(ArtifactManager::new(out.path(), "cbox").with_tonemapped(false))
                .with_backend(probe_backend("mitsuba", albedo_binding()))
                .with_backend(nori(scenes.path()));

            let report = harness.run(&sweep).unwrap();
            assert!(!report.is_success());
            assert_eq!(report.artifacts.len(), 5);
            assert_eq!(report.failures.len(), 1);

            let failure = &report.failures[0];
            assert_eq!(failure.backend, "nori");
            assert_eq!(failure.point.index(), 1);
            assert_eq!(failure.stage, "render");
            assert_eq!(failure.artifact, "cbox_nori_albedo=1.0_t=20.0");
            assert!(failure.error.contains("diverged"), "{}", failure.error);

            assert!(out.path().join("cbox_nori_albedo=0.5_t=1.0.exr").is_file());
            assert!(out.path().join("cbox_nori_albedo=0.25_t=4.0.exr").is_file());
            assert!(!out.path().join("cbox_nori_albedo=1.0_t=20.0.exr").exists());
            assert!(out.path().join("cbox_mitsuba_albedo=1.0_t=20.0.exr").is_file());

            // only the source scene and the fixture remain next to it
            assert_eq!(file_count(scenes.path()), 2);
        }
    }
}
