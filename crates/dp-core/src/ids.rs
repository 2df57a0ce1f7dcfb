//! Reference identifier of an archival object.
//!
//! A [`RefId`] names the job, the staged directory, the bag root inside the
//! archive, and the archive file itself, so it must be usable as a single
//! path component.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// External reference identifier of an archival object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefId(String);

impl RefId {
    /// Validate and wrap a reference identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the value is empty, contains a path
    /// separator, or is a relative path component (`.` / `..`).
    pub fn new(value: impl Into<String>) -> crate::Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::Config("refid must not be empty".into()));
        }
        if trimmed.contains(&['/', '\\'][..]) || trimmed == "." || trimmed == ".." {
            return Err(Error::Config(format!(
                "refid {trimmed:?} is not a valid path component"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RefId {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RefId {
    type Error = Error;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RefId> for String {
    fn from(id: RefId) -> Self {
        id.0
    }
}

impl AsRef<str> for RefId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hex_refid() {
        let id = RefId::new("b90862f3baceaae3b7418c78f9d50d52").unwrap();
        assert_eq!(id.as_str(), "b90862f3baceaae3b7418c78f9d50d52");
        assert_eq!(id.to_string(), "b90862f3baceaae3b7418c78f9d50d52");
    }

    #[test]
    fn trims_whitespace() {
        let id: RefId = "  abc123 ".parse().unwrap();
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn rejects_empty_and_separators() {
        assert!(RefId::new("").is_err());
        assert!(RefId::new("   ").is_err());
        assert!(RefId::new("a/b").is_err());
        assert!(RefId::new("a\\b").is_err());
        assert!(RefId::new("..").is_err());
    }

    #[test]
    fn serde_roundtrip_validates() {
        let id = RefId::new("abc").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: RefId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<RefId>("\"a/b\"").is_err());
    }
}
