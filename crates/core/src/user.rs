//! User entity: the account principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, Versioned};
use crate::id::UserId;

/// A registered user.
///
/// `phone_number` is the natural key: unique among active (non-deleted) rows.
/// A soft-deleted user may share a phone number with a later active one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub phone_number: String,
    pub image: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(full_name: impl Into<String>, phone_number: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            full_name: full_name.into(),
            phone_number: phone_number.into(),
            image: None,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn rename(&mut self, full_name: impl Into<String>) {
        self.full_name = full_name.into();
        self.updated_at = Utc::now();
    }

    pub fn set_image(&mut self, image: Option<String>) {
        self.image = image;
        self.updated_at = Utc::now();
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.id
    }
}

impl Versioned for User {
    fn version(&self) -> i32 {
        self.version
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    fn soft_delete(&mut self) {
        let now = Utc::now();
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_starts_at_version_zero_and_active() {
        let user = User::new("Ayu Lestari", "+6281234567890");
        assert_eq!(user.version, 0);
        assert!(!user.is_deleted());
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn touch_bumps_version_by_exactly_one() {
        let mut user = User::new("Ayu Lestari", "+6281234567890");
        user.touch();
        assert_eq!(user.version, 1);
        user.touch();
        assert_eq!(user.version, 2);
    }

    #[test]
    fn soft_delete_sets_deleted_at_without_bumping_version() {
        let mut user = User::new("Ayu Lestari", "+6281234567890");
        user.soft_delete();
        assert!(user.is_deleted());
        assert_eq!(user.version, 0);
        assert_eq!(user.deleted_at, Some(user.updated_at));
    }

    #[test]
    fn rename_refreshes_updated_at_only() {
        let mut user = User::new("Ayu Lestari", "+6281234567890");
        user.rename("Ayu L.");
        assert_eq!(user.full_name, "Ayu L.");
        assert_eq!(user.version, 0);
        assert!(user.updated_at >= user.created_at);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: after N touches, version == N, regardless of
            /// interleaved field mutations.
            #[test]
            fn version_counts_touches_exactly(n in 0usize..64, renames in 0usize..8) {
                let mut user = User::new("X", "+1");
                for i in 0..renames {
                    user.rename(format!("X{i}"));
                }
                for _ in 0..n {
                    user.touch();
                }
                prop_assert_eq!(user.version as usize, n);
            }
        }
    }
}
