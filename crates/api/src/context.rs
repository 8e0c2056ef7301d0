use cashnote_core::UserId;

/// Authenticated caller for a request.
///
/// Inserted by the auth middleware; must be present on all money-flow
/// routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    user_id: UserId,
    email: String,
}

impl CurrentUser {
    pub fn new(user_id: UserId, email: String) -> Self {
        Self { user_id, email }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}
