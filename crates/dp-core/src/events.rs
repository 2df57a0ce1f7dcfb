//! Outcome events published at the end of a packaging run.
//!
//! A [`JobEvent`] is rendered into a human-readable message plus a flat map of
//! string attributes that downstream consumers filter on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::job::PackageFormat;

/// Attribute carrying the job's reference id.
pub const ATTR_REFID: &str = "refid";
/// Attribute carrying the service name.
pub const ATTR_SERVICE: &str = "service";
/// Attribute carrying the outcome tag.
pub const ATTR_OUTCOME: &str = "outcome";
/// Attribute carrying the package format.
pub const ATTR_FORMAT: &str = "format";
/// Attribute carrying the failure diagnostic.
pub const ATTR_MESSAGE: &str = "message";

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Success,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Structured description of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    pub refid: String,
    pub service: String,
    pub outcome: Outcome,
    pub format: PackageFormat,
    /// Failure diagnostic: error message followed by the trace block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl JobEvent {
    /// Event for a successful run.
    pub fn success(refid: impl Into<String>, service: impl Into<String>, format: PackageFormat) -> Self {
        Self {
            refid: refid.into(),
            service: service.into(),
            outcome: Outcome::Success,
            format,
            diagnostic: None,
        }
    }

    /// Event for a failed run.
    pub fn failure(
        refid: impl Into<String>,
        service: impl Into<String>,
        format: PackageFormat,
        error_message: &str,
        trace: &str,
    ) -> Self {
        Self {
            refid: refid.into(),
            service: service.into(),
            outcome: Outcome::Failure,
            format,
            diagnostic: Some(format!("{error_message}\n\n<pre>{trace}</pre>")),
        }
    }

    /// Human-readable message body.
    pub fn message(&self) -> String {
        match self.outcome {
            Outcome::Success => format!("Package {} successfully packaged.", self.refid),
            Outcome::Failure => format!("Package {} failed packaging.", self.refid),
        }
    }

    /// Flat attribute map used for downstream filtering.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        attrs.insert(ATTR_REFID.to_string(), self.refid.clone());
        attrs.insert(ATTR_SERVICE.to_string(), self.service.clone());
        attrs.insert(ATTR_OUTCOME.to_string(), self.outcome.to_string());
        attrs.insert(ATTR_FORMAT.to_string(), self.format.to_string());
        if let Some(ref diagnostic) = self.diagnostic {
            attrs.insert(ATTR_MESSAGE.to_string(), diagnostic.clone());
        }
        attrs
    }
}
