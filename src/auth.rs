use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use ulid::Ulid;

use crate::types::User;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Failure from the auth provider. The message is shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthError {
    message: String,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_user(&self) -> Option<User>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<User, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Checks done on the registration form before calling the provider.
pub fn validate_registration(password: &str, confirm: &str) -> Result<(), AuthError> {
    if password != confirm {
        return Err(AuthError::new("Passwords do not match"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::new(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

struct Account {
    password: String,
    user: User,
}

/// Accounts kept in process memory, for a single local profile or tests.
#[derive(Default)]
pub struct LocalAuth {
    accounts: Mutex<HashMap<String, Account>>,
    session: Mutex<Option<User>>,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider with `user` already signed in.
    pub fn signed_in(user: User) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            session: Mutex::new(Some(user)),
        }
    }

    fn set_session(&self, user: Option<User>) -> Result<(), AuthError> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| AuthError::new("Session unavailable"))?;
        *session = user;
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn current_user(&self) -> Option<User> {
        self.session.lock().ok().and_then(|s| s.clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = email.trim().to_ascii_lowercase();
        let user = {
            let accounts = self
                .accounts
                .lock()
                .map_err(|_| AuthError::new("Accounts unavailable"))?;
            match accounts.get(&email) {
                Some(account) if account.password == password => account.user.clone(),
                _ => {
                    tracing::warn!(email = %email, "sign-in rejected");
                    return Err(AuthError::new("Invalid login credentials"));
                }
            }
        };
        self.set_session(Some(user.clone()))?;
        tracing::info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let email = email.trim().to_ascii_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::new("Unable to validate email address: invalid format"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::new(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let user = User {
            id: Ulid::new().to_string(),
            email: email.clone(),
            full_name: full_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        };
        {
            let mut accounts = self
                .accounts
                .lock()
                .map_err(|_| AuthError::new("Accounts unavailable"))?;
            if accounts.contains_key(&email) {
                return Err(AuthError::new("User already registered"));
            }
            accounts.insert(
                email,
                Account {
                    password: password.to_string(),
                    user: user.clone(),
                },
            );
        }
        self.set_session(Some(user.clone()))?;
        tracing::info!(user_id = %user.id, "registered");
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.set_session(None)
    }
}
