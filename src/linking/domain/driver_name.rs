//! Validated driver name type.

use super::LinkDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of the namespace identifier segment of a URN.
const MAX_NID_LENGTH: usize = 32;

/// Punctuation accepted in the namespace-specific segment of a URN.
const NSS_PUNCTUATION: &str = "()+,-.:=@;$_!*'%/?#";

/// URN-shaped driver identifier, e.g. `urn:agentlink:driver:simulator`.
///
/// Protocol configurations name their driver with this value. The input is
/// trimmed and the `urn:` scheme and namespace identifier are lowercased; the
/// namespace-specific segment is kept as written, so `urn:x:Foo` and
/// `urn:x:foo` name different drivers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DriverName(String);

impl DriverName {
    /// Creates a validated driver name.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDomainError::EmptyDriverName`] when the value is empty
    /// after trimming, or [`LinkDomainError::InvalidDriverName`] when it is
    /// not of the form `urn:<nid>:<nss>`.
    pub fn new(value: impl Into<String>) -> Result<Self, LinkDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(LinkDomainError::EmptyDriverName);
        }

        let Some(normalized) = normalize_urn(trimmed) else {
            return Err(LinkDomainError::InvalidDriverName(raw));
        };

        Ok(Self(normalized))
    }

    /// Returns the driver name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validates `urn:<nid>:<nss>` and lowercases everything but the NSS.
fn normalize_urn(value: &str) -> Option<String> {
    let (scheme, rest) = value.split_once(':')?;
    if !scheme.eq_ignore_ascii_case("urn") {
        return None;
    }
    let (nid, nss) = rest.split_once(':')?;

    let nid_valid = !nid.is_empty()
        && nid.len() <= MAX_NID_LENGTH
        && !nid.starts_with('-')
        && nid
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || character == '-');

    let nss_valid = !nss.is_empty()
        && nss.chars().all(|character| {
            character.is_ascii_alphanumeric() || NSS_PUNCTUATION.contains(character)
        });

    (nid_valid && nss_valid).then(|| format!("urn:{}:{nss}", nid.to_ascii_lowercase()))
}

impl TryFrom<String> for DriverName {
    type Error = LinkDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DriverName> for String {
    fn from(value: DriverName) -> Self {
        value.0
    }
}

impl AsRef<str> for DriverName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for DriverName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
