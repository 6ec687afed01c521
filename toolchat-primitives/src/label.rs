//! Backend label type.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_LABEL_LEN: usize = 64;

/// Name under which a tool backend is registered (e.g. `qr`, `git`).
///
/// Labels are trimmed on construction and compared case-sensitively.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendLabel(String);

impl BackendLabel {
    /// Creates a label after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLabel`] if the label is empty, too long, or
    /// contains whitespace or control characters.
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidLabel {
                label,
                reason: "label cannot be empty".into(),
            });
        }
        if trimmed.len() > MAX_LABEL_LEN {
            return Err(Error::InvalidLabel {
                label: trimmed.into(),
                reason: format!("label length must be <= {MAX_LABEL_LEN}"),
            });
        }
        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(Error::InvalidLabel {
                label: trimmed.into(),
                reason: "label cannot contain whitespace".into(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BackendLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for BackendLabel {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BackendLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for BackendLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl From<BackendLabel> for String {
    fn from(value: BackendLabel) -> Self {
        value.0
    }
}
