//! Registration and login orchestration.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use cashnote_auth::{JwtManager, PasswordHasher};
use cashnote_core::{AuthProvider, StoreError, User, UserAuth};
use cashnote_infra::{
    AuthProviderRepository, OpContext, TxManager, UserAuthRepository, UserRepository,
};

use crate::services::error::ServiceError;

/// Natural key of the built-in credential provider.
pub const EMAIL_PASSWORD_PROVIDER: &str = "email-password";

/// Access/refresh token pair issued on register and login.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Registration/login orchestrator.
///
/// The user row and its credential link are created inside one unit of
/// work: a failure on the second write leaves no half-registered account.
/// Token issuance happens outside the transaction.
pub struct AuthService<TM> {
    users: Arc<dyn UserRepository>,
    user_auths: Arc<dyn UserAuthRepository>,
    providers: Arc<dyn AuthProviderRepository>,
    hasher: PasswordHasher,
    jwt: JwtManager,
    tx: TM,
}

impl<TM: TxManager> AuthService<TM> {
    pub fn new(
        users: Arc<dyn UserRepository>,
        user_auths: Arc<dyn UserAuthRepository>,
        providers: Arc<dyn AuthProviderRepository>,
        hasher: PasswordHasher,
        jwt: JwtManager,
        tx: TM,
    ) -> Self {
        Self {
            users,
            user_auths,
            providers,
            hasher,
            jwt,
            tx,
        }
    }

    /// Seed the email/password provider row if missing. Called at boot; a
    /// concurrent boot losing the insert race is fine.
    pub async fn ensure_email_password_provider(&self, ctx: &OpContext) -> Result<(), ServiceError> {
        match self.providers.find_by_name(ctx, EMAIL_PASSWORD_PROVIDER).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => {
                let mut provider = AuthProvider::new("Email & Password", EMAIL_PASSWORD_PROVIDER);
                match self.providers.create(ctx, &mut provider).await {
                    Ok(()) | Err(StoreError::Duplicate) => Ok(()),
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip(self, ctx, password), fields(email = %email), err)]
    pub async fn register(
        &self,
        ctx: &OpContext,
        full_name: &str,
        email: &str,
        phone_number: &str,
        password: &str,
    ) -> Result<(User, TokenPair), ServiceError> {
        validate_registration(full_name, email, phone_number, password)?;

        let provider = self
            .providers
            .find_by_name(ctx, EMAIL_PASSWORD_PROVIDER)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => {
                    ServiceError::Internal("email-password provider not configured".to_string())
                }
                other => other.into(),
            })?;

        match self.user_auths.find_by_credential(ctx, email, provider.id).await {
            Ok(_) => return Err(ServiceError::Duplicate("email")),
            Err(StoreError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        let secret = self
            .hasher
            .hash(password)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let users = self.users.clone();
        let user_auths = self.user_auths.clone();
        let provider_id = provider.id;
        let full_name = full_name.to_string();
        let phone_number = phone_number.to_string();
        let email_owned = email.to_string();

        let user = self
            .tx
            .run_in_transaction(
                ctx.clone(),
                Box::new(move |tx_ctx| {
                    Box::pin(async move {
                        let mut user = User::new(full_name, phone_number);
                        users.create(&tx_ctx, &mut user).await?;

                        let mut link = UserAuth::new(user.id, provider_id, email_owned, secret);
                        user_auths.create(&tx_ctx, &mut link).await?;

                        Ok(user)
                    })
                }),
            )
            .await
            .map_err(|err| match err {
                // Unique indexes close the race between the pre-check and
                // the insert; the phone number is also gated here.
                StoreError::Duplicate => ServiceError::Duplicate("email or phone number"),
                other => other.into(),
            })?;

        let tokens = self.issue_tokens(&user, email)?;
        Ok((user, tokens))
    }

    #[instrument(skip(self, ctx, password), fields(email = %email), err)]
    pub async fn login(
        &self,
        ctx: &OpContext,
        email: &str,
        password: &str,
    ) -> Result<(User, TokenPair), ServiceError> {
        let provider = self
            .providers
            .find_by_name(ctx, EMAIL_PASSWORD_PROVIDER)
            .await
            .map_err(ServiceError::from)?;

        let link = self
            .user_auths
            .find_by_credential(ctx, email, provider.id)
            .await
            .map_err(collapse_to_invalid_credentials)?;

        let valid = self
            .hasher
            .verify(password, &link.credential_secret)
            .unwrap_or(false);
        if !valid {
            return Err(ServiceError::InvalidCredentials);
        }

        let user = self
            .users
            .find_by_id(ctx, link.user_id)
            .await
            .map_err(collapse_to_invalid_credentials)?;

        let tokens = self.issue_tokens(&user, email)?;
        Ok((user, tokens))
    }

    fn issue_tokens(&self, user: &User, email: &str) -> Result<TokenPair, ServiceError> {
        let (access_token, expires_in) = self
            .jwt
            .issue_access_token(user.id, email, &user.full_name)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let (refresh_token, _) = self
            .jwt
            .issue_refresh_token(user.id, email, &user.full_name)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in,
        })
    }
}

fn collapse_to_invalid_credentials(err: StoreError) -> ServiceError {
    match err {
        StoreError::NotFound => ServiceError::InvalidCredentials,
        other => other.into(),
    }
}

fn validate_registration(
    full_name: &str,
    email: &str,
    phone_number: &str,
    password: &str,
) -> Result<(), ServiceError> {
    if full_name.trim().is_empty() {
        return Err(ServiceError::Validation("full_name must not be empty".into()));
    }
    if !email.contains('@') {
        return Err(ServiceError::Validation("email is not valid".into()));
    }
    if phone_number.trim().is_empty() {
        return Err(ServiceError::Validation("phone_number must not be empty".into()));
    }
    if password.len() < 8 {
        return Err(ServiceError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

impl<TM> core::fmt::Debug for AuthService<TM> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("AuthService")
    }
}
