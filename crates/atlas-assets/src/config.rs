use serde::{Deserialize, Serialize};

/// How a batch operation treats a single failed load or instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFailurePolicy {
    /// Log the failure and keep processing the remaining locations.
    SkipAndContinue,
    /// Log the failure, stop processing, and discard the batch result.
    /// Assets that already made it into the cache stay cached.
    AbortOnFailure,
}

/// Behavior knobs for the asset cache. Maps to the `AssetSettings` section
/// of the game's settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Policy applied by `load_by_label` and `instantiate_by_label`.
    pub batch_failure: BatchFailurePolicy,
    /// Log a warning when `release` is called for a key that is not cached.
    pub warn_on_unknown_release: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            batch_failure: BatchFailurePolicy::SkipAndContinue,
            warn_on_unknown_release: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_skips_and_continues() {
        let config = CacheConfig::default();
        assert_eq!(config.batch_failure, BatchFailurePolicy::SkipAndContinue);
        assert!(!config.warn_on_unknown_release);
    }
}
