use crossrender_common::{ParamValue, ValueArityError};
use crossrender_sweep::SweepPoint;
use serde::{Deserialize, Serialize};

/// Errors from evaluating or applying a parameter binding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error("binding reads parameter `{0}` which the sweep point does not define")]
    UnknownParameter(String),
    #[error("cannot write to `{target}`: {source}")]
    Arity {
        target: String,
        #[source]
        source: ValueArityError,
    },
    #[error("binding target `{0}` does not hold a numeric value")]
    NonNumericSlot(String),
}

/// How a backend's property value is derived from the conceptual sweep
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "snake_case")]
pub enum Encoding {
    /// The parameter value unchanged.
    Direct { param: String },
    /// The parameter value multiplied by a constant (unit conversion).
    Scale { param: String, factor: f64 },
    /// Scattering coefficient `albedo * sigma_t`.
    Scattering { albedo: String, sigma_t: String },
    /// Absorption coefficient as the signed difference `sigma_t - albedo * sigma_t`.
    Absorption { albedo: String, sigma_t: String },
}

impl Encoding {
    pub fn direct(param: impl Into<String>) -> Self {
        Self::Direct {
            param: param.into(),
        }
    }

    /// Sweep parameters this encoding reads.
    pub fn parameters(&self) -> Vec<&str> {
        match self {
            Self::Direct { param } | Self::Scale { param, .. } => vec![param.as_str()],
            Self::Scattering { albedo, sigma_t } | Self::Absorption { albedo, sigma_t } => {
                vec![albedo.as_str(), sigma_t.as_str()]
            }
        }
    }

    /// Compute the backend value for one sweep point.
    pub fn evaluate(&self, point: &SweepPoint) -> Result<ParamValue, BindingError> {
        let get = |name: &str| {
            point
                .get(name)
                .ok_or_else(|| BindingError::UnknownParameter(name.to_string()))
        };
        Ok(match self {
            Self::Direct { param } => get(param)?,
            Self::Scale { param, factor } => get(param)?.map(|v| v * factor),
            Self::Scattering { albedo, sigma_t } => get(albedo)? * get(sigma_t)?,
            Self::Absorption { albedo, sigma_t } => {
                let sigma_t = get(sigma_t)?;
                let sigma_s = get(albedo)? * sigma_t;
                (sigma_s - sigma_t).map(|v| -v)
            }
        })
    }
}

/// A backend property target plus the encoding that fills it.
///
/// `target` is a property path for document-driven backends and a parameter
/// key for embedded renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBinding {
    pub target: String,
    #[serde(flatten)]
    pub encoding: Encoding,
}

impl ParameterBinding {
    pub fn new(target: impl Into<String>, encoding: Encoding) -> Self {
        Self {
            target: target.into(),
            encoding,
        }
    }
}

/// Recover `(albedo, sigma_t)` from scattering and absorption coefficients.
///
/// Returns `None` when any extinction component is zero, where albedo is
/// undefined.
pub fn decode_medium(sigma_s: ParamValue, sigma_a: ParamValue) -> Option<(ParamValue, ParamValue)> {
    let sigma_t = sigma_s + sigma_a;
    if sigma_t.to_rgb().to_array().contains(&0.0) {
        return None;
    }
    Some((sigma_s / sigma_t, sigma_t))
}
