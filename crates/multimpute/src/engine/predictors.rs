//! Resolution of predictor specs into concrete column lists.

use indexmap::IndexMap;

use crate::error::{ImputeError, Result};

use super::config::{PredictorSpec, PredictorsConfig};

/// Column → ordered predictor columns.
pub type PredictorGraph = IndexMap<String, Vec<String>>;

/// Turns a [`PredictorsConfig`] into predictor lists for a table's columns.
#[derive(Debug, Clone)]
pub struct PredictorResolver<'a> {
    columns: Vec<&'a str>,
}

impl<'a> PredictorResolver<'a> {
    /// Create a resolver over the table's columns in table order.
    pub fn new(columns: Vec<&'a str>) -> Self {
        Self { columns }
    }

    /// Resolve predictors for each column in `targets`.
    ///
    /// Unknown names and a column listing itself are configuration errors.
    /// A single list shared by every column silently skips the column itself.
    pub fn resolve(&self, config: &PredictorsConfig, targets: &[String]) -> Result<PredictorGraph> {
        if let PredictorsConfig::PerColumn(map) = config {
            if let Some(unknown) = map.keys().find(|k| !self.columns.contains(&k.as_str())) {
                return Err(ImputeError::Configuration(format!(
                    "predictors given for unknown column '{}'",
                    unknown
                )));
            }
        }

        let mut graph = PredictorGraph::new();
        for target in targets {
            let predictors = match config {
                PredictorsConfig::All(spec) => self.resolve_spec(target, spec, true)?,
                PredictorsConfig::PerColumn(map) => match map.get(target) {
                    Some(spec) => self.resolve_spec(target, spec, false)?,
                    None => self.resolve_spec(target, &PredictorSpec::All, false)?,
                },
            };
            graph.insert(target.clone(), predictors);
        }
        Ok(graph)
    }

    fn resolve_spec(&self, target: &str, spec: &PredictorSpec, shared: bool) -> Result<Vec<String>> {
        match spec {
            PredictorSpec::All => Ok(self
                .columns
                .iter()
                .filter(|c| **c != target)
                .map(|c| c.to_string())
                .collect()),
            PredictorSpec::None => Ok(Vec::new()),
            PredictorSpec::Columns(names) => {
                let mut out: Vec<String> = Vec::with_capacity(names.len());
                for name in names {
                    if !self.columns.contains(&name.as_str()) {
                        return Err(ImputeError::Configuration(format!(
                            "unknown predictor '{}' for column '{}'",
                            name, target
                        )));
                    }
                    if name == target {
                        if shared {
                            continue;
                        }
                        return Err(ImputeError::Configuration(format!(
                            "column '{}' cannot predict itself",
                            target
                        )));
                    }
                    if !out.contains(name) {
                        out.push(name.clone());
                    }
                }
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PredictorResolver<'static> {
        PredictorResolver::new(vec!["age", "income", "gender"])
    }

    fn targets() -> Vec<String> {
        vec!["age".to_string(), "income".to_string()]
    }

    #[test]
    fn test_all_is_every_other_column() {
        let graph = resolver()
            .resolve(&PredictorsConfig::All(PredictorSpec::All), &targets())
            .unwrap();
        assert_eq!(graph["age"], vec!["income", "gender"]);
        assert_eq!(graph["income"], vec!["age", "gender"]);
    }

    #[test]
    fn test_per_column_with_defaults() {
        let mut map = IndexMap::new();
        map.insert("age".to_string(), PredictorSpec::None);
        let graph = resolver()
            .resolve(&PredictorsConfig::PerColumn(map), &targets())
            .unwrap();
        assert!(graph["age"].is_empty());
        assert_eq!(graph["income"], vec!["age", "gender"]);
    }

    #[test]
    fn test_list_keeps_order_and_dedups() {
        let mut map = IndexMap::new();
        map.insert(
            "income".to_string(),
            PredictorSpec::Columns(vec!["gender".into(), "age".into(), "gender".into()]),
        );
        let graph = resolver()
            .resolve(&PredictorsConfig::PerColumn(map), &targets())
            .unwrap();
        assert_eq!(graph["income"], vec!["gender", "age"]);
    }

    #[test]
    fn test_unknown_predictor_rejected() {
        let spec = PredictorSpec::Columns(vec!["height".into()]);
        let err = resolver()
            .resolve(&PredictorsConfig::All(spec), &targets())
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut map = IndexMap::new();
        map.insert("age".to_string(), PredictorSpec::Columns(vec!["age".into()]));
        assert!(resolver()
            .resolve(&PredictorsConfig::PerColumn(map), &targets())
            .is_err());
    }

    #[test]
    fn test_shared_list_skips_self() {
        let spec = PredictorSpec::Columns(vec!["age".into(), "gender".into()]);
        let graph = resolver()
            .resolve(&PredictorsConfig::All(spec), &targets())
            .unwrap();
        assert_eq!(graph["age"], vec!["gender"]);
        assert_eq!(graph["income"], vec!["age", "gender"]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut map = IndexMap::new();
        map.insert("height".to_string(), PredictorSpec::All);
        assert!(resolver()
            .resolve(&PredictorsConfig::PerColumn(map), &targets())
            .is_err());
    }
}
