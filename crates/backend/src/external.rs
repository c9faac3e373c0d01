use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crossrender_artifacts::{read_exr, ArtifactError};
use crossrender_common::Image;
use crossrender_scene::{ResolvedPath, SceneTemplate};
use crossrender_sweep::SweepPoint;
use tempfile::NamedTempFile;

use crate::{Backend, BackendError, BindingError, ParameterBinding};

/// An executable plus its argument template.
///
/// `{scene}` and `{output}` in an argument are replaced by the scene file
/// and the expected output path of each invocation.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    executable: PathBuf,
    args: Vec<String>,
}

impl ExternalCommand {
    /// Locate `executable`. Bare names are looked up on `PATH`; the platform
    /// executable suffix is tried when the name has none.
    ///
    /// The stored path is absolute, since the child runs in the scene's
    /// directory rather than the caller's.
    pub fn new(executable: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let executable = executable.into();
        let found = locate(&executable).ok_or(BackendError::MissingExecutable(executable))?;
        let found = std::path::absolute(&found).map_err(|source| BackendError::Io {
            path: found.clone(),
            source,
        })?;
        Ok(Self {
            executable: found,
            args: vec!["{scene}".into()],
        })
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run to completion with the scene's directory as working directory.
    pub fn run(&self, scene: &Path, output: &Path) -> Result<(), BackendError> {
        let scene_arg = scene.to_string_lossy();
        let output_arg = output.to_string_lossy();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{scene}", &scene_arg).replace("{output}", &output_arg))
            .collect();

        let mut command = Command::new(&self.executable);
        command.args(&args);
        if let Some(dir) = scene.parent().filter(|d| !d.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        tracing::debug!(executable = %self.executable.display(), ?args, "spawning renderer");
        let out = command.output().map_err(|source| BackendError::Io {
            path: self.executable.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&out.stdout);
        let stderr = String::from_utf8_lossy(&out.stderr);
        if !stdout.trim().is_empty() {
            tracing::debug!(stdout = %stdout.trim_end(), "renderer stdout");
        }
        if !stderr.trim().is_empty() {
            tracing::debug!(stderr = %stderr.trim_end(), "renderer stderr");
        }

        if !out.status.success() {
            return Err(BackendError::ExternalRender {
                executable: self.executable.clone(),
                exit_code: out.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

fn locate(executable: &Path) -> Option<PathBuf> {
    let candidates = |base: &Path| {
        let mut c = vec![base.to_path_buf()];
        let suffix = std::env::consts::EXE_SUFFIX;
        if !suffix.is_empty() && base.extension().is_none() {
            let mut with_suffix = base.as_os_str().to_owned();
            with_suffix.push(suffix);
            c.push(PathBuf::from(with_suffix));
        }
        c
    };

    if executable.is_absolute() || executable.components().count() > 1 {
        return candidates(executable).into_iter().find(|p| p.is_file());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .flat_map(|dir| candidates(&dir.join(executable)))
        .find(|p| p.is_file())
}

/// A scene file written for one invocation. Deleted on drop.
#[derive(Debug)]
pub struct TransientScene {
    file: NamedTempFile,
}

impl TransientScene {
    /// Write `template` to a uniquely named `<prefix><random>.xml` in `dir`.
    pub fn write(template: &SceneTemplate, dir: &Path, prefix: &str) -> Result<Self, BackendError> {
        let io_err = |source| BackendError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".xml")
            .tempfile_in(dir)
            .map_err(io_err)?;
        file.write_all(&template.serialize()).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        tracing::debug!(path = %file.path().display(), "wrote transient scene");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Where a renderer following the `<scene stem>.<ext>` convention writes
    /// its image.
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.path().with_extension(extension)
    }
}

/// Removes a renderer output file when dropped, unless the file was already
/// there before the renderer ran.
struct OutputGuard {
    path: PathBuf,
    preexisting: bool,
}

impl OutputGuard {
    fn new(path: PathBuf) -> Self {
        let preexisting = path.exists();
        if preexisting {
            tracing::debug!(file = %path.display(), "renderer output already exists, keeping it");
        }
        Self { path, preexisting }
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if !self.preexisting && self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(file = %self.path.display(), error = %e, "could not remove renderer output");
            }
        }
    }
}

/// Adapter for a renderer run as a child process on a patched copy of the
/// scene file.
#[derive(Debug)]
pub struct ExternalProcessBackend {
    id: String,
    command: ExternalCommand,
    base: SceneTemplate,
    bindings: Vec<ParameterBinding>,
    resolved: Vec<(ResolvedPath, usize)>,
    scratch_dir: PathBuf,
    scene_stem: String,
    output_extension: String,
    precision: usize,
}

impl ExternalProcessBackend {
    /// Resolve every binding target against `base`.
    ///
    /// Transient scenes are written next to `base`'s source file so relative
    /// asset references keep working.
    pub fn new(
        id: impl Into<String>,
        command: ExternalCommand,
        base: SceneTemplate,
        bindings: Vec<ParameterBinding>,
    ) -> Result<Self, BackendError> {
        let id = id.into();
        let mut resolved = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            let path = base.resolve_str(&binding.target)?;
            let slot = path
                .arity()
                .ok_or_else(|| BindingError::NonNumericSlot(binding.target.clone()))?;
            tracing::debug!(backend = %id, target = %binding.target, structural = %path.structural(), "resolved binding");
            resolved.push((path, slot));
        }

        let origin = base.source();
        let scratch_dir = match origin.and_then(Path::parent) {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            Some(_) => PathBuf::from("."),
            None => std::env::temp_dir(),
        };
        let scratch_dir = std::path::absolute(&scratch_dir).map_err(|source| BackendError::Io {
            path: scratch_dir.clone(),
            source,
        })?;
        let scene_stem = origin
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scene".to_string());

        Ok(Self {
            id,
            command,
            base,
            bindings,
            resolved,
            scratch_dir,
            scene_stem,
            output_extension: "exr".into(),
            precision: 6,
        })
    }

    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = extension.into();
        self
    }

    /// Decimal places used when writing values into the scene file.
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn command(&self) -> &ExternalCommand {
        &self.command
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// The scene for `point` without writing it.
    pub fn patched(&self, point: &SweepPoint) -> Result<SceneTemplate, BackendError> {
        let mut scene = self.base.clone();
        for (binding, (path, slot)) in self.bindings.iter().zip(&self.resolved) {
            let value = binding.encoding.evaluate(point)?;
            let text = value
                .encode(*slot, self.precision)
                .map_err(|source| BindingError::Arity {
                    target: binding.target.clone(),
                    source,
                })?;
            scene.set(path, text)?;
        }
        Ok(scene)
    }

    /// Render an existing scene file as is.
    pub fn render_file(&self, scene: &Path) -> Result<Image, BackendError> {
        if !scene.is_file() {
            return Err(crossrender_scene::SceneError::MissingInput(scene.to_path_buf()).into());
        }
        let scene = std::path::absolute(scene).map_err(|source| BackendError::Io {
            path: scene.to_path_buf(),
            source,
        })?;
        self.run_and_read(&scene, scene.with_extension(&self.output_extension))
    }

    fn run_and_read(&self, scene: &Path, output: PathBuf) -> Result<Image, BackendError> {
        let guard = OutputGuard::new(output);
        self.command.run(scene, &guard.path)?;
        read_exr(&guard.path).map_err(|e| match e {
            ArtifactError::MissingFile(path) => BackendError::MissingOutput(path),
            other => other.into(),
        })
    }
}

impl Backend for ExternalProcessBackend {
    type Prepared = TransientScene;

    fn id(&self) -> &str {
        &self.id
    }

    fn bindings(&self) -> &[ParameterBinding] {
        &self.bindings
    }

    fn prepare(&self, point: &SweepPoint) -> Result<TransientScene, BackendError> {
        let scene = self.patched(point)?;
        let prefix = format!("{}_{}.", self.scene_stem, point.label());
        TransientScene::write(&scene, &self.scratch_dir, &prefix)
    }

    fn render(&self, scene: TransientScene) -> Result<Image, BackendError> {
        let output = scene.output_path(&self.output_extension);
        self.run_and_read(scene.path(), output)
    }
}
