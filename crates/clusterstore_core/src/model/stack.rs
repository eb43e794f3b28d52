//! Stack identity used to scope configuration queries.

use super::{require_non_empty, ModelValidationError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Storage-assigned stack identifier (`stack.stack_id`).
pub type StackPk = i64;

/// Stack name/version pair, written as `NAME-VERSION` (for example `HDP-2.2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StackId {
    pub name: String,
    pub version: String,
}

impl StackId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_non_empty("stack_name", &self.name)?;
        require_non_empty("stack_version", &self.version)
    }
}

impl Display for StackId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

impl FromStr for StackId {
    type Err = ModelValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (name, version) = value
            .trim()
            .split_once('-')
            .ok_or_else(|| ModelValidationError::InvalidStackId(value.to_string()))?;
        if name.is_empty() || version.is_empty() {
            return Err(ModelValidationError::InvalidStackId(value.to_string()));
        }
        Ok(Self::new(name, version))
    }
}

/// Persisted stack row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub pk: StackPk,
    pub name: String,
    pub version: String,
}

impl Stack {
    pub fn stack_id(&self) -> StackId {
        StackId::new(self.name.clone(), self.version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::StackId;

    #[test]
    fn parses_and_renders_name_version_pairs() {
        let stack: StackId = "HDP-2.2".parse().unwrap();
        assert_eq!(stack, StackId::new("HDP", "2.2"));
        assert_eq!(stack.to_string(), "HDP-2.2");

        let dashed: StackId = "HDP-2.2-preview".parse().unwrap();
        assert_eq!(dashed.version, "2.2-preview");
    }

    #[test]
    fn rejects_values_without_both_parts() {
        assert!("HDP".parse::<StackId>().is_err());
        assert!("-2.2".parse::<StackId>().is_err());
        assert!("HDP-".parse::<StackId>().is_err());
    }
}
