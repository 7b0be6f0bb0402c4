//! Dotted version numbers used to gate implementations against the host.

use crate::config::types::{Result, TaskError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const WILDCARD: i32 = 1000;
const EARLY_ACCESS: i32 = -1000;

/// A version like `1.0.2`.
///
/// `*` sorts above any released component and `ea`/`eaNNN` sorts below, so
/// `2.ea3 < 2.0 < 2.*`. A version that is a strict prefix of another is older.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionNumber {
    digits: Vec<i32>,
}

impl VersionNumber {
    pub fn is_older_than(&self, rhs: &VersionNumber) -> bool {
        self < rhs
    }

    pub fn is_newer_than(&self, rhs: &VersionNumber) -> bool {
        self > rhs
    }

    pub fn components(&self) -> &[i32] {
        &self.digits
    }
}

fn parse_component(token: &str, input: &str) -> Result<i32> {
    let token = token.to_lowercase();
    let invalid = || TaskError::Config(format!("Invalid version number: {}", input));

    if token == "*" {
        return Ok(WILDCARD);
    }
    if let Some(rest) = token.strip_prefix("ea") {
        if rest.is_empty() {
            return Ok(EARLY_ACCESS);
        }
        let n: i32 = rest.parse().map_err(|_| invalid())?;
        return EARLY_ACCESS.checked_add(n).ok_or_else(invalid);
    }
    token.parse().map_err(|_| invalid())
}

impl FromStr for VersionNumber {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .split('.')
            .filter(|t| !t.is_empty())
            .map(|t| parse_component(t.trim(), s))
            .collect::<Result<Vec<_>>>()?;

        if digits.len() < 2 {
            return Err(TaskError::Config(format!(
                "Version number needs at least two components: {}",
                s
            )));
        }

        Ok(Self { digits })
    }
}

impl TryFrom<String> for VersionNumber {
    type Error = TaskError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<VersionNumber> for String {
    fn from(value: VersionNumber) -> Self {
        value.to_string()
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.digits.iter().map(|d| d.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> VersionNumber {
        s.parse().unwrap()
    }

    #[test]
    fn test_ordering() {
        assert!(v("1.0").is_older_than(&v("1.0.1")));
        assert!(v("2.1").is_newer_than(&v("2.0.9")));
        assert!(v("1.10").is_newer_than(&v("1.9")));
        assert_eq!(v("2.0"), v("2.0"));
    }

    #[test]
    fn test_special_components() {
        assert!(v("2.ea").is_older_than(&v("2.ea3")));
        assert!(v("2.ea3").is_older_than(&v("2.0")));
        assert!(v("2.*").is_newer_than(&v("2.999")));
        assert_eq!(v("2.EA").components(), &[2, -1000]);
    }

    #[test]
    fn test_early_access_overflow_is_rejected() {
        assert!("1.ea-2147483648".parse::<VersionNumber>().is_err());
        assert!("1.ea2147483647".parse::<VersionNumber>().is_ok());
        assert_eq!(v("1.ea-5").components(), &[1, -1005]);
    }

    #[test]
    fn test_rejects_single_component_and_garbage() {
        assert!("1".parse::<VersionNumber>().is_err());
        assert!("1.x".parse::<VersionNumber>().is_err());
        assert!("".parse::<VersionNumber>().is_err());
    }

    #[test]
    fn test_display_normalises() {
        assert_eq!(v("1.0.2").to_string(), "1.0.2");
        assert_eq!(v("1.*").to_string(), "1.1000");
    }

    #[test]
    fn test_serde_as_string() {
        let parsed: VersionNumber = serde_json::from_str("\"2.1\"").unwrap();
        assert_eq!(parsed, v("2.1"));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"2.1\"");
        assert!(serde_json::from_str::<VersionNumber>("\"2\"").is_err());
    }
}
