use std::path::{Path, PathBuf};

use crossrender_artifacts::ArtifactManager;
use crossrender_backend::{
    BackendError, DynBackend, EmbeddedRenderer, ExternalCommand, ExternalProcessBackend,
    InProcessBackend, ParameterBinding, ProbeRenderer,
};
use crossrender_common::Image;
use crossrender_scene::{SceneError, SceneTemplate};
use crossrender_sweep::{Parameter, Sweep, SweepConfigError, SweepPolicy};
use serde::Deserialize;

use crate::{Harness, HarnessError};

/// Errors from reading a run configuration or building what it describes.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} does not exist")]
    MissingInput(PathBuf),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid run configuration {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Sweep(#[from] SweepConfigError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("no backend with id `{0}` in the configuration")]
    UnknownBackend(String),
}

/// A sweep run described in YAML.
///
/// ```yaml
/// output_dir: renders
/// prefix: cbox
/// sweep:
///   policy: zip
///   parameters:
///     - name: albedo
///       values: [[0, 0, 0], [1, 1, 1]]
///     - name: sigma_t
///       label: t
///       values: [1, 20]
/// backends:
///   - id: nori
///     kind: external
///     executable: nori
///     args: ["-b", "{scene}"]
///     scene: scenes/cbox_mis.xml
///     bindings:
///       - target: "6/3/0@value"
///         encoding: absorption
///         albedo: albedo
///         sigma_t: sigma_t
/// ```
///
/// Relative paths are taken relative to the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_tonemapped")]
    pub tonemapped: bool,
    pub sweep: SweepConfig,
    pub backends: Vec<BackendConfig>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub policy: SweepPolicy,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub id: String,
    #[serde(flatten)]
    pub kind: BackendKind,
    #[serde(default)]
    pub bindings: Vec<ParameterBinding>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendKind {
    /// A renderer executable run once per sweep point.
    External {
        executable: PathBuf,
        #[serde(default = "default_args")]
        args: Vec<String>,
        scene: PathBuf,
        #[serde(default = "default_output_extension")]
        output_extension: String,
        #[serde(default = "default_precision")]
        precision: usize,
    },
    /// The built-in probe renderer.
    Probe {
        scene: PathBuf,
        probe: String,
        #[serde(default = "default_resolution")]
        width: u32,
        #[serde(default = "default_resolution")]
        height: u32,
    },
}

fn default_tonemapped() -> bool {
    true
}

fn default_args() -> Vec<String> {
    vec!["{scene}".into()]
}

fn default_output_extension() -> String {
    "exr".into()
}

fn default_precision() -> usize {
    6
}

fn default_resolution() -> u32 {
    4
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::MissingInput(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&text).map_err(|e| match e {
            ConfigError::Yaml { source, .. } => ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        tracing::debug!(path = %path.display(), backends = config.backends.len(), "loaded run configuration");
        Ok(config)
    }

    /// Parse a configuration whose relative paths are relative to the
    /// working directory.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: PathBuf::new(),
            source,
        })
    }

    /// Directory relative paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    pub fn sweep(&self) -> Result<Sweep, ConfigError> {
        Ok(Sweep::new(
            self.sweep.parameters.clone(),
            self.sweep.policy,
        )?)
    }

    pub fn artifact_manager(&self) -> ArtifactManager {
        ArtifactManager::new(self.resolve(&self.output_dir), self.prefix.clone())
            .with_tonemapped(self.tonemapped)
    }

    pub fn backend(&self, id: &str) -> Result<&BackendConfig, ConfigError> {
        self.backends
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| ConfigError::UnknownBackend(id.to_string()))
    }

    /// Construct one backend. Relative executables are looked up in
    /// `build_dir` when given.
    pub fn build_backend(
        &self,
        backend: &BackendConfig,
        build_dir: Option<&Path>,
    ) -> Result<Box<dyn DynBackend>, ConfigError> {
        let built: Box<dyn DynBackend> = match &backend.kind {
            BackendKind::External { .. } => Box::new(self.external_backend(backend, build_dir)?),
            BackendKind::Probe {
                scene,
                probe,
                width,
                height,
            } => {
                let template = SceneTemplate::load(self.resolve(scene))?;
                Box::new(InProcessBackend::new(
                    backend.id.clone(),
                    ProbeRenderer::new(probe.clone()).with_resolution(*width, *height),
                    &template,
                    backend.bindings.clone(),
                )?)
            }
        };
        tracing::debug!(backend = %backend.id, "backend ready");
        Ok(built)
    }

    fn external_backend(
        &self,
        backend: &BackendConfig,
        build_dir: Option<&Path>,
    ) -> Result<ExternalProcessBackend, ConfigError> {
        let BackendKind::External {
            executable,
            args,
            scene,
            output_extension,
            precision,
        } = &backend.kind
        else {
            return Err(ConfigError::UnknownBackend(backend.id.clone()));
        };
        let command = ExternalCommand::new(self.executable_path(executable, build_dir))?
            .with_args(args.clone());
        let template = SceneTemplate::load(self.resolve(scene))?;
        Ok(ExternalProcessBackend::new(
            backend.id.clone(),
            command,
            template,
            backend.bindings.clone(),
        )?
        .with_output_extension(output_extension.clone())
        .with_precision(*precision))
    }

    fn executable_path(&self, executable: &Path, build_dir: Option<&Path>) -> PathBuf {
        match build_dir {
            Some(dir) if executable.is_relative() => dir.join(executable),
            _ if executable.components().count() > 1 => self.resolve(executable),
            _ => executable.to_path_buf(),
        }
    }

    /// A harness with every configured backend registered in file order.
    pub fn harness(&self, build_dir: Option<&Path>) -> Result<Harness, HarnessError> {
        if let Some(dir) = build_dir {
            check_build_dir(dir)?;
        }
        let mut harness = Harness::new(self.artifact_manager());
        for backend in &self.backends {
            harness = harness.with_boxed_backend(self.build_backend(backend, build_dir)?);
        }
        Ok(harness)
    }

    /// Render an unmodified scene file with one configured backend.
    pub fn render_single(
        &self,
        id: &str,
        scene: &Path,
        build_dir: Option<&Path>,
    ) -> Result<Image, HarnessError> {
        if let Some(dir) = build_dir {
            check_build_dir(dir)?;
        }
        let backend = self.backend(id)?;
        match &backend.kind {
            BackendKind::External { .. } => {
                Ok(self.external_backend(backend, build_dir)?.render_file(scene)?)
            }
            BackendKind::Probe {
                probe,
                width,
                height,
                ..
            } => {
                let renderer = ProbeRenderer::new(probe.clone()).with_resolution(*width, *height);
                let template = SceneTemplate::load(scene).map_err(ConfigError::from)?;
                let loaded = renderer
                    .load(&template)
                    .map_err(|e| BackendError::Embedded(e.to_string()))?;
                Ok(renderer
                    .render(&loaded)
                    .map_err(|e| BackendError::Embedded(e.to_string()))?)
            }
        }
    }
}

fn check_build_dir(dir: &Path) -> Result<(), ConfigError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::MissingInput(dir.to_path_buf()))
    }
}
