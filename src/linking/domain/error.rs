//! Error types for linking domain validation and parsing.

use super::AssetId;
use thiserror::Error;

/// Errors returned while constructing linking domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkDomainError {
    /// The driver name is empty after trimming.
    #[error("driver name must not be empty")]
    EmptyDriverName,

    /// The driver name is not a URN of the form `urn:<nid>:<nss>`.
    #[error("driver name '{0}' is not a valid URN")]
    InvalidDriverName(String),

    /// The asset identifier is empty after trimming.
    #[error("asset identifier must not be empty")]
    EmptyAssetId,

    /// The owner identifier is empty after trimming.
    #[error("owner identifier must not be empty")]
    EmptyOwnerId,

    /// The attribute name is empty after trimming.
    #[error("attribute name must not be empty")]
    EmptyAttributeName,

    /// The asset type is empty after trimming.
    #[error("asset type must not be empty")]
    EmptyAssetType,

    /// An attribute flagged as a protocol configuration carries no string value.
    #[error("protocol configuration '{0}' has no driver name value")]
    MissingDriverValue(String),

    /// Driver-supplied assets must carry a parent identifier.
    #[error("asset {0} has no parent identifier")]
    MissingParentId(AssetId),
}

/// Error returned while parsing connection status from its string form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown connection status: {0}")]
pub struct ParseConnectionStatusError(pub String);
