use crate::key::AssetKey;

/// Errors surfaced by the asset cache. Variants are `Clone` because a single
/// provider completion fans out to every caller waiting on the same key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    /// The key or label resolved to no resource locations.
    #[error("no resource locations found for '{0}'")]
    ResolutionFailed(AssetKey),

    /// The provider reported a failed status for a typed load.
    #[error("failed to load asset '{key}': {reason}")]
    LoadFailed { key: AssetKey, reason: String },

    /// The provider reported a failed status for an instantiation.
    #[error("failed to instantiate '{key}': {reason}")]
    InstantiationFailed { key: AssetKey, reason: String },

    /// The asset loaded, but is not of the requested type.
    #[error("asset '{key}' is not a {expected}")]
    TypeMismatch {
        key: AssetKey,
        expected: &'static str,
    },
}
