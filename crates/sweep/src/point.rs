use crossrender_common::ParamValue;
use serde::Serialize;
use std::fmt;

/// One parameter assignment of a sweep point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub name: String,
    /// Short name used in artifact file names.
    #[serde(skip)]
    pub label: String,
    pub value: ParamValue,
}

/// One concrete assignment of values to every swept parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint {
    index: usize,
    values: Vec<Assignment>,
}

impl SweepPoint {
    /// Build a point from `(name, label, value)` triples in sweep order.
    pub fn new<I, N, L>(index: usize, values: I) -> Self
    where
        I: IntoIterator<Item = (N, L, ParamValue)>,
        N: Into<String>,
        L: Into<String>,
    {
        Self {
            index,
            values: values
                .into_iter()
                .map(|(name, label, value)| Assignment {
                    name: name.into(),
                    label: label.into(),
                    value,
                })
                .collect(),
        }
    }

    /// Position of this point in its sweep, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|a| (a.name.as_str(), &a.value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|a| a.name.as_str())
    }

    /// File-name fragment built from literal values, e.g. `albedo=0.75_t=20.0`.
    pub fn label(&self) -> String {
        self.values
            .iter()
            .map(|a| format!("{}={}", a.label, a.value.label()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl fmt::Display for SweepPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {{", self.index)?;
        for (i, a) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}={}", a.name, a.value)?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> SweepPoint {
        SweepPoint::new(
            3,
            [
                ("albedo", "albedo", ParamValue::rgb(0.75, 0.75, 0.75)),
                ("sigma_t", "t", ParamValue::Scalar(20.0)),
            ],
        )
    }

    #[test]
    fn label_uses_parameter_labels_and_literals() {
        assert_eq!(point().label(), "albedo=0.75_t=20.0");
    }

    #[test]
    fn lookup_by_name() {
        let p = point();
        assert_eq!(p.get("sigma_t"), Some(ParamValue::Scalar(20.0)));
        assert_eq!(p.get("t"), None);
        assert_eq!(p.names().collect::<Vec<_>>(), vec!["albedo", "sigma_t"]);
    }

    #[test]
    fn display_shows_full_values() {
        assert_eq!(
            point().to_string(),
            "#3 { albedo=[0.75, 0.75, 0.75], sigma_t=20 }"
        );
    }
}
