//! Authentication provider and credential-link entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, Versioned};
use crate::id::{AuthProviderId, UserAuthId, UserId};

/// A configured authentication provider (e.g. the built-in
/// email/password provider, or an OAuth client).
///
/// `name` is the natural key among active rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthProvider {
    pub id: AuthProviderId,
    pub display_name: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AuthProvider {
    pub fn new(display_name: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AuthProviderId::new(),
            display_name: display_name.into(),
            name: Some(name.into()),
            image: None,
            client_id: None,
            client_secret: None,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

impl Entity for AuthProvider {
    type Id = AuthProviderId;

    fn id(&self) -> &AuthProviderId {
        &self.id
    }
}

impl Versioned for AuthProvider {
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

/// Links a user to a provider with a credential pair.
///
/// For the email/password provider, `credential_id` is the email address and
/// `credential_secret` the bcrypt hash. `(credential_id, auth_provider_id)`
/// is the natural key among active rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAuth {
    pub id: UserAuthId,
    pub user_id: UserId,
    pub auth_provider_id: AuthProviderId,
    pub credential_id: String,
    pub credential_secret: String,
    pub credential_refresh: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserAuth {
    pub fn new(
        user_id: UserId,
        auth_provider_id: AuthProviderId,
        credential_id: impl Into<String>,
        credential_secret: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserAuthId::new(),
            user_id,
            auth_provider_id,
            credential_id: credential_id.into(),
            credential_secret: credential_secret.into(),
            credential_refresh: None,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

impl Entity for UserAuth {
    type Id = UserAuthId;

    fn id(&self) -> &UserAuthId {
        &self.id
    }
}

impl Versioned for UserAuth {
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
