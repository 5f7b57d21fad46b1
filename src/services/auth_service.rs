use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::{hash_token, PasswordError, PasswordHasher, ResetTicket, TokenError, TokenIssuer};
use crate::config::SecurityConfig;
use crate::database::models::schema::{parse_timestamp, timestamp_string};
use crate::database::models::user::{self, check_credentials, password_changed_now};
use crate::database::{document, document_id, Document, Store, StoreError};
use crate::filter::Condition;
use crate::services::email::{Email, MailError, Mailer};

/// Fields accepted from the public signup form.
const SIGNUP_FIELDS: &[&str] = &["name", "email", "password", "passwordConfirm", "photo"];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please provide email and password!")]
    MissingCredentials,

    #[error("Incorrect email or password")]
    IncorrectCredentials,

    #[error("You are not logged in! Please log in to get access.")]
    NotLoggedIn,

    #[error("The user belonging to this token no longer exists.")]
    UserGone,

    #[error("User recently changed password! Please log in again.")]
    PasswordChanged,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("There is no user with email address.")]
    UnknownEmail,

    #[error("There was an error sending the email. Try again later!")]
    ResetMailFailed(#[source] MailError),

    #[error("Token is invalid or has expired")]
    ResetTokenInvalid,

    #[error("Your current password is wrong.")]
    WrongCurrentPassword,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// A user document together with a freshly issued session token.
#[derive(Debug)]
pub struct Session {
    pub user: Document,
    pub token: String,
}

/// Credential and session flows over the users collection.
pub struct AuthService {
    store: Arc<dyn Store>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<TokenIssuer>,
    mailer: Arc<dyn Mailer>,
    security: SecurityConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<TokenIssuer>,
        mailer: Arc<dyn Mailer>,
        security: SecurityConfig,
    ) -> Self {
        Self { store, hasher, tokens, mailer, security }
    }

    fn session(&self, user: Document) -> Result<Session, AuthError> {
        let id = document_id(&user).unwrap_or_default();
        let token = self.tokens.issue(id)?;
        Ok(Session { user, token })
    }

    /// Validates a candidate carrying a plaintext password, then swaps in the hash.
    fn hash_candidate(&self, mut candidate: Document, is_new: bool) -> Result<Document, AuthError> {
        check_credentials(&candidate, is_new)?;
        let plain = candidate.get("password").and_then(Value::as_str).unwrap_or_default();
        let hash = self.hasher.hash(plain)?;
        candidate.insert("password".to_string(), Value::String(hash));
        candidate.remove("passwordConfirm");
        Ok(candidate)
    }

    /// Public registration. The role is never taken from the request.
    pub async fn signup(&self, mut attrs: Document) -> Result<Session, AuthError> {
        attrs.retain(|key, _| SIGNUP_FIELDS.contains(&key.as_str()));
        let candidate = self.hash_candidate(attrs, true)?;
        let user = self.store.create(user::collection(), candidate).await?;
        tracing::info!(user = document_id(&user), "user signed up");
        self.session(user)
    }

    /// Admin creation: same credential handling as signup, role allowed, no session.
    pub async fn create_user(&self, attrs: Document) -> Result<Document, AuthError> {
        let candidate = self.hash_candidate(attrs, true)?;
        Ok(self.store.create(user::collection(), candidate).await?)
    }

    pub async fn login(&self, email: Option<&str>, password: Option<&str>) -> Result<Session, AuthError> {
        let (Some(email), Some(password)) = (email.filter(|s| !s.is_empty()), password.filter(|s| !s.is_empty())) else {
            return Err(AuthError::MissingCredentials);
        };

        let email = email.trim().to_lowercase();
        let user = self
            .store
            .find_one(user::collection(), &[Condition::eq("email", email)])
            .await?;

        let Some(user) = user else {
            return Err(AuthError::IncorrectCredentials);
        };
        let hash = user.get("password").and_then(Value::as_str).unwrap_or_default();
        if !self.hasher.verify(password, hash)? {
            return Err(AuthError::IncorrectCredentials);
        }

        self.session(user)
    }

    /// Resolves the subject of a presented token.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Document, AuthError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::NotLoggedIn)?;
        let claims = self.tokens.verify(token)?;

        let user = match self.store.find_by_id(user::collection(), &claims.id).await {
            Ok(Some(user)) => user,
            Ok(None) | Err(StoreError::Cast { .. }) => return Err(AuthError::UserGone),
            Err(other) => return Err(other.into()),
        };

        if user::changed_password_after(&user, claims.iat) {
            return Err(AuthError::PasswordChanged);
        }
        Ok(user)
    }

    /// Issues a reset ticket and mails its URL. `origin` is `{scheme}://{host}`.
    pub async fn forgot_password(&self, email: Option<&str>, origin: &str) -> Result<(), AuthError> {
        let email = email.unwrap_or_default().trim().to_lowercase();
        let user = self
            .store
            .find_one(user::collection(), &[Condition::eq("email", email.clone())])
            .await?
            .ok_or(AuthError::UnknownEmail)?;
        let id = document_id(&user).unwrap_or_default().to_string();

        let ticket = ResetTicket::generate(self.security.reset_token_ttl_minutes);
        self.store
            .update_by_id(
                user::collection(),
                &id,
                document(json!({
                    "passwordResetToken": ticket.hash,
                    "passwordResetExpires": timestamp_string(ticket.expires_at),
                })),
            )
            .await?;

        let url = format!("{}/api/v1/users/resetPassword/{}", origin, ticket.token);
        let email = Email {
            to: email,
            subject: format!("Your password reset token (valid for {} min)", self.security.reset_token_ttl_minutes),
            body: format!(
                "Forgot your password? Submit a PATCH request with your new password and passwordConfirm to: {}.\n\
                 If you didn't forget your password, please ignore this email!",
                url
            ),
        };

        if let Err(err) = self.mailer.send(email).await {
            tracing::error!(user = %id, error = %err, "reset mail failed, clearing ticket");
            self.store
                .update_by_id(
                    user::collection(),
                    &id,
                    document(json!({ "passwordResetToken": null, "passwordResetExpires": null })),
                )
                .await?;
            return Err(AuthError::ResetMailFailed(err));
        }

        Ok(())
    }

    /// Redeems a reset token: sets the new password, clears the ticket, starts a session.
    pub async fn reset_password(&self, token: &str, attrs: Document) -> Result<Session, AuthError> {
        let user = self
            .store
            .find_one(user::collection(), &[Condition::eq("passwordResetToken", hash_token(token))])
            .await?
            .ok_or(AuthError::ResetTokenInvalid)?;

        let still_valid = user
            .get("passwordResetExpires")
            .and_then(parse_timestamp)
            .map(|expires| expires > Utc::now())
            .unwrap_or(false);
        if !still_valid {
            return Err(AuthError::ResetTokenInvalid);
        }

        let mut extra = Document::new();
        extra.insert("passwordResetToken".to_string(), Value::Null);
        extra.insert("passwordResetExpires".to_string(), Value::Null);
        let user = self.change_password(&user, attrs, extra).await?;
        self.session(user)
    }

    /// Changes the password of an authenticated user after checking the current one.
    pub async fn update_password(&self, user: &Document, attrs: Document) -> Result<Session, AuthError> {
        let current = attrs.get("passwordCurrent").and_then(Value::as_str).unwrap_or_default();
        let hash = user.get("password").and_then(Value::as_str).unwrap_or_default();
        if !self.hasher.verify(current, hash)? {
            return Err(AuthError::WrongCurrentPassword);
        }

        let user = self.change_password(user, attrs, Document::new()).await?;
        self.session(user)
    }

    async fn change_password(&self, user: &Document, attrs: Document, extra: Document) -> Result<Document, AuthError> {
        let mut candidate = user.clone();
        for key in ["password", "passwordConfirm"] {
            candidate.insert(key.to_string(), attrs.get(key).cloned().unwrap_or(Value::Null));
        }
        let candidate = self.hash_candidate(candidate, false)?;

        let mut patch = extra;
        patch.insert("password".to_string(), candidate["password"].clone());
        patch.insert(
            "passwordChangedAt".to_string(),
            password_changed_now(self.security.password_changed_skew_secs),
        );

        let id = document_id(user).unwrap_or_default();
        let updated = self
            .store
            .update_by_id(user::collection(), id, patch)
            .await?
            .ok_or(AuthError::UserGone)?;

        tracing::info!(user = id, "password changed");
        Ok(updated)
    }
}
