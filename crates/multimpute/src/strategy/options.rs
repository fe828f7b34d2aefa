//! Extra keyword options for strategies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::table::Value;

use super::StrategyError;

/// A JSON object of strategy options, e.g. `{"neighbors": 3}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyOptions(Map<String, Json>);

impl StrategyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    /// Combine two option sets; entries in `overrides` win.
    pub fn merged(&self, overrides: &StrategyOptions) -> StrategyOptions {
        let mut out = self.0.clone();
        for (k, v) in &overrides.0 {
            out.insert(k.clone(), v.clone());
        }
        StrategyOptions(out)
    }

    /// Reject keys the strategy does not understand.
    pub fn check_keys(&self, strategy: &str, allowed: &[&str]) -> Result<(), StrategyError> {
        match self.keys().find(|k| !allowed.contains(k)) {
            Some(key) => Err(StrategyError::InvalidOption {
                strategy: strategy.to_string(),
                key: key.to_string(),
                message: if allowed.is_empty() {
                    "strategy takes no options".to_string()
                } else {
                    format!("expected one of: {}", allowed.join(", "))
                },
            }),
            None => Ok(()),
        }
    }

    fn invalid(strategy: &str, key: &str, message: impl Into<String>) -> StrategyError {
        StrategyError::InvalidOption {
            strategy: strategy.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// A positive integer option.
    pub fn positive_usize(&self, strategy: &str, key: &str) -> Result<Option<usize>, StrategyError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(v) => match v.as_u64() {
                Some(n) if n > 0 => Ok(Some(n as usize)),
                _ => Err(Self::invalid(strategy, key, format!("expected a positive integer, got {}", v))),
            },
        }
    }

    /// A non-negative finite number option.
    pub fn non_negative_f64(&self, strategy: &str, key: &str) -> Result<Option<f64>, StrategyError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(v) => match v.as_f64() {
                Some(x) if x.is_finite() && x >= 0.0 => Ok(Some(x)),
                _ => Err(Self::invalid(strategy, key, format!("expected a non-negative number, got {}", v))),
            },
        }
    }

    /// A string option restricted to `choices` (case-insensitive).
    pub fn choice(
        &self,
        strategy: &str,
        key: &str,
        choices: &[&str],
    ) -> Result<Option<String>, StrategyError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Json::String(s)) => {
                let lower = s.trim().to_lowercase();
                if choices.contains(&lower.as_str()) {
                    Ok(Some(lower))
                } else {
                    Err(Self::invalid(
                        strategy,
                        key,
                        format!("'{}' is not one of: {}", s, choices.join(", ")),
                    ))
                }
            }
            Some(v) => Err(Self::invalid(strategy, key, format!("expected a string, got {}", v))),
        }
    }

    /// A free-form string option.
    pub fn string(&self, strategy: &str, key: &str) -> Result<Option<String>, StrategyError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Json::String(s)) => Ok(Some(s.clone())),
            Some(v) => Err(Self::invalid(strategy, key, format!("expected a string, got {}", v))),
        }
    }

    /// A cell value option: a JSON number or string.
    pub fn cell_value(&self, strategy: &str, key: &str) -> Result<Option<Value>, StrategyError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Json::String(s)) => Ok(Some(Value::Text(s.clone()))),
            Some(Json::Number(n)) => n
                .as_f64()
                .map(|x| Some(Value::Number(x)))
                .ok_or_else(|| Self::invalid(strategy, key, "number out of range")),
            Some(v) => Err(Self::invalid(
                strategy,
                key,
                format!("expected a number or string, got {}", v),
            )),
        }
    }
}

impl From<Map<String, Json>> for StrategyOptions {
    fn from(map: Map<String, Json>) -> Self {
        StrategyOptions(map)
    }
}
