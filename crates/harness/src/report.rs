use crossrender_artifacts::ArtifactPaths;
use crossrender_sweep::SweepPoint;
use serde::Serialize;
use std::path::Path;

use crate::HarnessError;

/// An artifact written during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactRecord {
    pub backend: String,
    pub point: usize,
    pub name: String,
    pub paths: ArtifactPaths,
}

/// A (backend, point) pair that produced no artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub backend: String,
    pub point: SweepPoint,
    /// `prepare`, `render` or `write`.
    pub stage: String,
    pub error: String,
    /// Name the artifact would have had.
    pub artifact: String,
}

/// Outcome of a sweep run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub artifacts: Vec<ArtifactRecord>,
    pub failures: Vec<FailureRecord>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), HarnessError> {
        let io_err = |source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let file = std::fs::File::create(path).map_err(io_err)?;
        serde_json::to_writer_pretty(file, self)?;
        tracing::info!(file = %path.display(), "writing to file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossrender_common::ParamValue;

    #[test]
    fn report_serializes_failures_with_point_values() {
        let report = RunReport {
            artifacts: vec![],
            failures: vec![FailureRecord {
                backend: "nori".into(),
                point: SweepPoint::new(1, [("sigma_t", "t", ParamValue::Scalar(20.0))]),
                stage: "render".into(),
                error: "nori exited with code 1: diverged".into(),
                artifact: "cbox_nori_t=20.0".into(),
            }],
        };
        assert!(!report.is_success());

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out/report.json");
        report.write_json(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let failure = &json["failures"][0];
        assert_eq!(failure["backend"], "nori");
        assert_eq!(failure["stage"], "render");
        assert_eq!(failure["point"]["index"], 1);
        assert_eq!(failure["point"]["values"][0]["name"], "sigma_t");
        assert_eq!(failure["point"]["values"][0]["value"], 20.0);
    }
}
