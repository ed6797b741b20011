//! Field selectors addressing one GRIB2 message in a model inventory.
//!
//! A selector is written `PARAM:level`, e.g. `TMP:2 m above ground`. Both
//! parts are compared exactly against the inventory, so two fields sharing a
//! substring can never be confused.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldSelector {
    /// GRIB2 short name (`TMP`, `UGRD`, `REFC`)
    pub parameter: String,
    /// Level description (`2 m above ground`, `entire atmosphere`)
    pub level: String,
}

impl FieldSelector {
    pub fn new(parameter: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            level: level.into(),
        }
    }

    pub fn matches(&self, parameter: &str, level: &str) -> bool {
        self.parameter == parameter && self.level == level
    }
}

/// Selector string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid field selector '{0}': expected PARAM:level")]
pub struct SelectorParseError(pub String);

impl FromStr for FieldSelector {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (parameter, level) = s
            .split_once(':')
            .ok_or_else(|| SelectorParseError(s.to_string()))?;
        let parameter = parameter.trim();
        let level = level.trim();
        if parameter.is_empty() || level.is_empty() || level.contains(':') {
            return Err(SelectorParseError(s.to_string()));
        }
        Ok(Self::new(parameter, level))
    }
}

impl TryFrom<String> for FieldSelector {
    type Error = SelectorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldSelector> for String {
    fn from(selector: FieldSelector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.parameter, self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selector() {
        let sel: FieldSelector = "TMP:2 m above ground".parse().unwrap();
        assert_eq!(sel.parameter, "TMP");
        assert_eq!(sel.level, "2 m above ground");
        assert_eq!(sel.to_string(), "TMP:2 m above ground");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("TMP".parse::<FieldSelector>().is_err());
        assert!(":surface".parse::<FieldSelector>().is_err());
        assert!("TMP:2 m:anl".parse::<FieldSelector>().is_err());
    }

    #[test]
    fn test_exact_match_only() {
        let sel = FieldSelector::new("TMP", "2 m above ground");
        assert!(sel.matches("TMP", "2 m above ground"));
        assert!(!sel.matches("TMP", "surface"));
        assert!(!sel.matches("DPT", "2 m above ground"));
    }
}
