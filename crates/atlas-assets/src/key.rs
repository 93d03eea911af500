use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Runtime identifier for an addressable asset: either a key naming a single
/// asset or a label naming a group of assets. The provider decides what the
/// string resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    /// Create a key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for AssetKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// A typed reference to an addressable asset. The type parameter records what
/// the key is expected to resolve to, so call sites can hold references to
/// prefabs, textures, or audio clips without losing the asset type.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRef<T> {
    key: AssetKey,
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

impl<T> AssetRef<T> {
    /// Create a typed reference from a key.
    pub fn new(key: impl Into<AssetKey>) -> Self {
        Self {
            key: key.into(),
            _marker: PhantomData,
        }
    }

    /// The key this reference resolves through.
    pub fn key(&self) -> &AssetKey {
        &self.key
    }
}

impl<T> fmt::Debug for AssetRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AssetRef").field(&self.key).finish()
    }
}

impl<T> Clone for AssetRef<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for AssetRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for AssetRef<T> {}

impl<T> std::hash::Hash for AssetRef<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Prefab;

    #[test]
    fn key_display_matches_input() {
        let key = AssetKey::new("Env_Forest");
        assert_eq!(key.to_string(), "Env_Forest");
        assert_eq!(key.as_str(), "Env_Forest");
    }

    #[test]
    fn keys_from_str_and_string_are_equal() {
        assert_eq!(AssetKey::from("FX"), AssetKey::from(String::from("FX")));
    }

    #[test]
    fn refs_compare_by_key() {
        let a: AssetRef<Prefab> = AssetRef::new("Env_Forest");
        let b: AssetRef<Prefab> = AssetRef::new("Env_Forest");
        let c: AssetRef<Prefab> = AssetRef::new("Env_Desert");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.clone().key().as_str(), "Env_Forest");
    }
}
