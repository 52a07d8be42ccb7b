//! Entity trait: identity + continuity across state changes.

use serde::{Serialize, de::DeserializeOwned};

/// A persisted record with a stable identity.
///
/// Stores keep entities as JSON documents; the identifier doubles as the
/// document key.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Strongly-typed entity identifier.
    type Id: Copy
        + Eq
        + core::hash::Hash
        + core::fmt::Debug
        + core::fmt::Display
        + Into<uuid::Uuid>
        + Send
        + Sync;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
