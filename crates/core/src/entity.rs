//! Entity traits: identity plus the optimistic-locking lifecycle every
//! persisted aggregate shares.

use chrono::{DateTime, Utc};

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Shared lifecycle of a versioned, soft-deletable record.
///
/// Invariants enforced by the store, not here:
/// - `version` increases by exactly 1 per successful write.
/// - `deleted_at` transitions only from `None` to `Some`, never back.
pub trait Versioned {
    fn version(&self) -> i32;

    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    /// Bump the version counter and refresh `updated_at` ahead of a
    /// version-gated update. The store's conditional write matches on
    /// `version - 1`.
    fn touch(&mut self);

    /// Mark the record soft-deleted. No undelete exists.
    fn soft_delete(&mut self);

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}
