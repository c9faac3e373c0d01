use crossrender_common::Image;
use crossrender_sweep::SweepPoint;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::{exr_io, tonemap};

/// Errors from persisting or loading artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("EXR error on {path}: {source}")]
    Exr {
        path: PathBuf,
        #[source]
        source: exr::error::Error,
    },
    #[error("PNG error on {path}: {source}")]
    Png {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid image: {0}")]
    Image(#[from] crossrender_common::ImageError),
    #[error("channel name `{0}` cannot be stored in EXR")]
    InvalidChannelName(String),
    #[error("no R/G/B channels to tone-map among {0:?}")]
    MissingColorChannels(Vec<String>),
    #[error("image file {0} does not exist")]
    MissingFile(PathBuf),
}

/// Files written for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub exr: PathBuf,
    pub png: Option<PathBuf>,
}

/// Names and writes rendered images under one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    output_dir: PathBuf,
    prefix: String,
    tonemapped: bool,
}

impl ArtifactManager {
    /// A manager writing `<prefix>_<backend>_<point label>.exr` (and `.png`
    /// when tone-mapped output is enabled, the default) into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            tonemapped: true,
        }
    }

    pub fn with_tonemapped(mut self, tonemapped: bool) -> Self {
        self.tonemapped = tonemapped;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn tonemapped(&self) -> bool {
        self.tonemapped
    }

    /// Deterministic artifact stem for a backend and sweep point.
    pub fn name_for(&self, backend: &str, point: &SweepPoint) -> String {
        let label = point.label();
        [self.prefix.as_str(), backend, label.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Paths an artifact with the given stem is written to.
    pub fn paths_for(&self, stem: &str) -> ArtifactPaths {
        ArtifactPaths {
            exr: self.output_dir.join(format!("{stem}.exr")),
            png: self
                .tonemapped
                .then(|| self.output_dir.join(format!("{stem}.png"))),
        }
    }

    /// Persist the image rendered by `backend` for `point`.
    pub fn write(
        &self,
        image: &Image,
        backend: &str,
        point: &SweepPoint,
    ) -> Result<ArtifactPaths, ArtifactError> {
        self.write_named(image, &self.name_for(backend, point))
    }

    /// Persist an image under an explicit stem.
    pub fn write_named(&self, image: &Image, stem: &str) -> Result<ArtifactPaths, ArtifactError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| ArtifactError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let paths = self.paths_for(stem);
        // An image that cannot be tone-mapped must leave no files behind.
        let srgb = match paths.png {
            Some(_) => Some(tonemap::tonemap_srgb8(image)?),
            None => None,
        };
        exr_io::write_exr(&paths.exr, image)?;
        tracing::info!(file = %paths.exr.display(), "writing to file");
        if let (Some(png), Some(bytes)) = (&paths.png, &srgb) {
            tonemap::save_srgb8(png, bytes, image.width(), image.height())?;
            tracing::info!(file = %png.display(), "writing to file");
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossrender_common::ParamValue;

    fn point(albedo: f64, sigma_t: f64) -> SweepPoint {
        SweepPoint::new(
            0,
            [
                ("albedo", "albedo", ParamValue::rgb(albedo, albedo, albedo)),
                ("sigma_t", "t", ParamValue::Scalar(sigma_t)),
            ],
        )
    }

    #[test]
    fn names_embed_literal_values() {
        let manager = ArtifactManager::new("out", "cbox");
        assert_eq!(
            manager.name_for("mitsuba", &point(0.75, 20.0)),
            "cbox_mitsuba_albedo=0.75_t=20.0"
        );
        assert_eq!(
            manager.name_for("nori", &point(0.0, 1.0)),
            "cbox_nori_albedo=0.0_t=1.0"
        );
    }

    #[test]
    fn names_are_pure() {
        let a = ArtifactManager::new("x", "p");
        let b = ArtifactManager::new("y", "p");
        let pt = point(0.5, 1.0);
        assert_eq!(a.name_for("nori", &pt), b.name_for("nori", &pt));
        assert_eq!(a.name_for("nori", &pt), a.name_for("nori", &pt.clone()));
    }

    #[test]
    fn empty_prefix_is_skipped() {
        let manager = ArtifactManager::new("out", "");
        assert_eq!(manager.name_for("nori", &point(1.0, 1.0)), "nori_albedo=1.0_t=1.0");
    }

    #[test]
    fn write_produces_exr_and_png() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(tmp.path().join("renders"), "cbox");
        let image = Image::filled_rgb(2, 2, [0.25, 0.5, 2.0]).unwrap();

        let paths = manager.write(&image, "nori", &point(0.75, 20.0)).unwrap();
        assert_eq!(
            paths.exr,
            tmp.path().join("renders/cbox_nori_albedo=0.75_t=20.0.exr")
        );
        assert!(paths.exr.is_file());
        assert!(paths.png.as_ref().unwrap().is_file());
        assert_eq!(crate::read_exr(&paths.exr).unwrap(), image);
    }

    #[test]
    fn write_without_tonemapping_skips_png() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(tmp.path(), "cbox").with_tonemapped(false);
        let paths = manager
            .write_named(&Image::filled_rgb(1, 1, [1.0, 1.0, 1.0]).unwrap(), "single")
            .unwrap();
        assert!(paths.png.is_none());
        assert!(!tmp.path().join("single.png").exists());
        assert!(tmp.path().join("single.exr").is_file());
    }

    #[test]
    fn unmappable_image_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(tmp.path(), "cbox");
        let image = Image::new(1, 1, vec!["X".into(), "Y".into()], vec![0.0, 1.0]).unwrap();
        let err = manager.write_named(&image, "xy").unwrap_err();
        assert!(matches!(err, ArtifactError::MissingColorChannels(_)), "{err}");
        assert!(!tmp.path().join("xy.exr").exists());
        assert!(!tmp.path().join("xy.png").exists());

        let paths = manager
            .with_tonemapped(false)
            .write_named(&image, "xy")
            .unwrap();
        assert!(paths.exr.is_file());
    }

    #[test]
    fn rewriting_overwrites_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(tmp.path(), "cbox");
        let pt = point(1.0, 20.0);
        manager
            .write(&Image::filled_rgb(1, 1, [0.0, 0.0, 0.0]).unwrap(), "nori", &pt)
            .unwrap();
        manager
            .write(&Image::filled_rgb(1, 1, [1.0, 1.0, 1.0]).unwrap(), "nori", &pt)
            .unwrap();
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 2);
    }
}
