use crossrender_common::ParamValue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::point::SweepPoint;

/// Errors that make a sweep unusable. Always raised before any rendering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepConfigError {
    #[error("sweep has no parameters")]
    NoParameters,
    #[error("parameter `{0}` has no values")]
    EmptyParameter(String),
    #[error("parameter `{0}` is declared more than once")]
    DuplicateParameter(String),
    #[error(
        "zipped sweep requires equal value counts: `{first}` has {first_len} values but `{name}` has {len}"
    )]
    LengthMismatch {
        first: String,
        first_len: usize,
        name: String,
        len: usize,
    },
    #[error("cross-product sweep is too large to enumerate")]
    TooLarge,
    #[error("sweep points {first} and {second} produce the same artifact name `{name}`")]
    DuplicatePoint {
        first: usize,
        second: usize,
        name: String,
    },
}

/// How parameter value lists are combined into sweep points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepPolicy {
    /// The i-th value of every list forms the i-th point. Lists must have
    /// equal length.
    #[default]
    Zip,
    /// Every combination; the first parameter varies slowest.
    Product,
}

/// A named parameter and its ordered candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Short name used in artifact file names; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub values: Vec<ParamValue>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        Self {
            name: name.into(),
            label: None,
            values,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// A validated sweep definition. Points are generated on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    parameters: Vec<Parameter>,
    policy: SweepPolicy,
    len: usize,
}

impl Sweep {
    pub fn new(parameters: Vec<Parameter>, policy: SweepPolicy) -> Result<Self, SweepConfigError> {
        let first = parameters.first().ok_or(SweepConfigError::NoParameters)?;

        let mut seen = HashSet::new();
        for p in &parameters {
            if p.values.is_empty() {
                return Err(SweepConfigError::EmptyParameter(p.name.clone()));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(SweepConfigError::DuplicateParameter(p.name.clone()));
            }
        }

        let len = match policy {
            SweepPolicy::Zip => {
                if let Some(p) = parameters.iter().find(|p| p.values.len() != first.values.len()) {
                    return Err(SweepConfigError::LengthMismatch {
                        first: first.name.clone(),
                        first_len: first.values.len(),
                        name: p.name.clone(),
                        len: p.values.len(),
                    });
                }
                first.values.len()
            }
            SweepPolicy::Product => parameters
                .iter()
                .try_fold(1usize, |acc, p| acc.checked_mul(p.values.len()))
                .ok_or(SweepConfigError::TooLarge)?,
        };

        tracing::debug!(?policy, parameters = parameters.len(), points = len, "sweep configured");
        Ok(Self {
            parameters,
            policy,
            len,
        })
    }

    /// Zipped sweep over the given parameters.
    pub fn zip(parameters: Vec<Parameter>) -> Result<Self, SweepConfigError> {
        Self::new(parameters, SweepPolicy::Zip)
    }

    /// Cross-product sweep over the given parameters.
    pub fn product(parameters: Vec<Parameter>) -> Result<Self, SweepConfigError> {
        Self::new(parameters, SweepPolicy::Product)
    }

    /// Number of sweep points.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: construction rejects empty sweeps.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn policy(&self) -> SweepPolicy {
        self.policy
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.name == name)
    }

    /// The point at `index`, if within the sweep.
    pub fn point(&self, index: usize) -> Option<SweepPoint> {
        if index >= self.len {
            return None;
        }
        let choices: Vec<usize> = match self.policy {
            SweepPolicy::Zip => vec![index; self.parameters.len()],
            SweepPolicy::Product => {
                let mut rest = index;
                let mut picks = vec![0; self.parameters.len()];
                for (slot, p) in picks.iter_mut().zip(&self.parameters).rev() {
                    *slot = rest % p.values.len();
                    rest /= p.values.len();
                }
                picks
            }
        };
        Some(SweepPoint::new(
            index,
            self.parameters
                .iter()
                .zip(choices)
                .map(|(p, i)| (p.name.as_str(), p.label(), p.values[i])),
        ))
    }

    /// Lazily enumerate all points in order. Call again to restart.
    pub fn points(&self) -> SweepPoints<'_> {
        SweepPoints {
            sweep: self,
            next: 0,
        }
    }
}

/// Iterator over the points of a [`Sweep`].
#[derive(Debug, Clone)]
pub struct SweepPoints<'a> {
    sweep: &'a Sweep,
    next: usize,
}

impl Iterator for SweepPoints<'_> {
    type Item = SweepPoint;

    fn next(&mut self) -> Option<SweepPoint> {
        let point = self.sweep.point(self.next)?;
        self.next += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.sweep.len.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SweepPoints<'_> {}
