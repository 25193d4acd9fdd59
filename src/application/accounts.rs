//! Registration and password handling.

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::users::{is_valid_username, normalize_email};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("invalid registration: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error("email is already registered")]
    EmailTaken,
    #[error("username is already taken")]
    UsernameTaken,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for AccountError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { constraint } if constraint.contains("email") => {
                Self::EmailTaken
            }
            RepoError::Duplicate { constraint } if constraint.contains("username") => {
                Self::UsernameTaken
            }
            other => Self::Repo(other),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 50, message = "must be between 1 and 50 characters"))]
    pub name: String,
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "must be between 6 and 128 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub password: String,
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if is_valid_username(username) {
        Ok(())
    } else {
        Err(ValidationError::new("username")
            .with_message("must be 3-30 lowercase letters, digits or underscores".into()))
    }
}

/// Flatten validation errors into `field: message` pairs, sorted by field.
pub fn describe_validation(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                format!("{field}: {message}")
            })
        })
        .collect();
    parts.sort();
    parts.join("; ")
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self { users }
    }

    pub async fn register(&self, input: RegisterInput) -> Result<UserRecord, AccountError> {
        let input = RegisterInput {
            name: input.name.trim().to_string(),
            username: input.username.trim().to_string(),
            email: normalize_email(&input.email),
            ..input
        };
        input.validate()?;

        let password_hash = hash_password(input.password).await?;
        let user = self
            .users
            .create_user(CreateUserParams {
                name: input.name,
                username: input.username,
                email: input.email,
                password_hash,
            })
            .await?;

        info!(
            target = "postboard::accounts",
            user_id = %user.id,
            username = %user.username,
            "registered user"
        );
        Ok(user)
    }
}

pub(crate) async fn hash_password(password: String) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AccountError::Hashing(err.to_string()))
    })
    .await
    .map_err(|err| AccountError::Hashing(err.to_string()))?
}

/// Returns `false` for a wrong password and for an unparsable stored hash.
pub(crate) async fn verify_password(password: String, stored_hash: String) -> bool {
    let outcome = tokio::task::spawn_blocking(move || {
        PasswordHash::new(&stored_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    })
    .await;
    outcome.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> RegisterInput {
        RegisterInput {
            name: "Ada Lovelace".into(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn mismatched_confirmation_is_reported() {
        let input = RegisterInput {
            confirm_password: "other".into(),
            ..valid_input()
        };
        let errors = input.validate().expect_err("mismatch");
        let summary = describe_validation(&errors);
        assert!(summary.contains("passwords do not match"));
    }

    #[test]
    fn bad_username_and_email_are_reported_together() {
        let input = RegisterInput {
            username: "Not Valid".into(),
            email: "nope".into(),
            ..valid_input()
        };
        let errors = input.validate().expect_err("invalid");
        let summary = describe_validation(&errors);
        assert!(summary.contains("must be a valid email address"));
        assert!(summary.contains("lowercase letters"));
    }

    #[test]
    fn duplicate_constraints_map_to_specific_errors() {
        let err = AccountError::from(RepoError::Duplicate {
            constraint: "users_email_key".into(),
        });
        assert!(matches!(err, AccountError::EmailTaken));

        let err = AccountError::from(RepoError::Duplicate {
            constraint: "users_username_key".into(),
        });
        assert!(matches!(err, AccountError::UsernameTaken));
    }

    #[tokio::test]
    async fn password_hash_round_trip() {
        let hash = hash_password("secret1".into()).await.expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret1".into(), hash.clone()).await);
        assert!(!verify_password("wrong".into(), hash).await);
        assert!(!verify_password("secret1".into(), "not-a-hash".into()).await);
    }
}
