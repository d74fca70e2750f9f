//! Registration, login and identity resolution.
//!
//! # Invariants
//! - Unknown email and wrong password produce the same `Unauthenticated`.
//! - Plaintext passwords, hashes and tokens never reach the log.

use crate::auth::{bearer_token, hash_password, verify_password, Identity, TokenService};
use crate::error::{CoreError, CoreResult};
use crate::model::{NewUser, Page, PageRequest, ProfilePatch, Role, User};
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoError;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Token plus the account it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Account use cases over a [`UserRepository`].
pub struct AuthService<R: UserRepository> {
    repo: R,
    tokens: Arc<TokenService>,
    bcrypt_cost: u32,
}

impl<R: UserRepository> AuthService<R> {
    pub fn new(repo: R, tokens: Arc<TokenService>, bcrypt_cost: u32) -> Self {
        Self {
            repo,
            tokens,
            bcrypt_cost,
        }
    }

    /// Creates a `user` account and signs it in.
    pub fn register(&self, email: &str, name: &str, password: &str) -> CoreResult<AuthSession> {
        self.register_with_role(email, name, password, Role::User)
    }

    /// Creates an account with an explicit role. Operator tooling only.
    pub fn register_with_role(
        &self,
        email: &str,
        name: &str,
        password: &str,
        role: Role,
    ) -> CoreResult<AuthSession> {
        let email = normalize_email(email);
        if !EMAIL_RE.is_match(&email) {
            return Err(CoreError::validation("a valid email is required"));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("name is required"));
        }
        validate_password(password)?;

        let password_hash = hash_password(password, self.bcrypt_cost)?;
        let user = self.repo.create_user(&NewUser {
            email,
            name: name.to_string(),
            password_hash,
            role,
        })?;
        info!(
            "event=register module=service status=ok user_id={} role={}",
            user.id,
            user.role.as_str()
        );
        self.session_for(user)
    }

    pub fn login(&self, email: &str, password: &str) -> CoreResult<AuthSession> {
        let credentials = match self.repo.get_credentials_by_email(&normalize_email(email)) {
            Ok(credentials) => credentials,
            Err(RepoError::NotFound { .. }) => {
                warn!("event=login module=service status=rejected");
                return Err(CoreError::Unauthenticated);
            }
            Err(err) => return Err(err.into()),
        };
        if !verify_password(password, &credentials.password_hash) {
            warn!("event=login module=service status=rejected");
            return Err(CoreError::Unauthenticated);
        }
        info!(
            "event=login module=service status=ok user_id={}",
            credentials.user.id
        );
        self.session_for(credentials.user)
    }

    /// Resolves an `Authorization` header value to the caller identity.
    pub fn authenticate(&self, authorization: Option<&str>) -> CoreResult<Identity> {
        let token = authorization
            .and_then(bearer_token)
            .ok_or(CoreError::Unauthenticated)?;
        self.tokens.validate_token(token).map_err(|err| {
            warn!("event=authenticate module=service status=rejected reason={err}");
            CoreError::from(err)
        })
    }

    pub fn current_user(&self, identity: &Identity) -> CoreResult<User> {
        Ok(self.repo.get_user(&identity.user_id)?)
    }

    /// Absent fields are left untouched.
    pub fn update_profile(&self, identity: &Identity, patch: &ProfilePatch) -> CoreResult<User> {
        if let Some(name) = patch.name.as_deref() {
            if name.trim().is_empty() {
                return Err(CoreError::validation("name must not be empty"));
            }
        }
        self.repo.update_profile(&identity.user_id, patch)?;
        self.current_user(identity)
    }

    /// A wrong current password is a validation failure, not an
    /// authentication failure: the caller is already signed in.
    pub fn change_password(
        &self,
        identity: &Identity,
        current_password: &str,
        new_password: &str,
    ) -> CoreResult<()> {
        validate_password(new_password)?;
        let credentials = self.repo.get_credentials(&identity.user_id)?;
        if !verify_password(current_password, &credentials.password_hash) {
            return Err(CoreError::validation("current password is incorrect"));
        }
        let password_hash = hash_password(new_password, self.bcrypt_cost)?;
        self.repo.update_password(&identity.user_id, &password_hash)?;
        info!(
            "event=change_password module=service status=ok user_id={}",
            identity.user_id
        );
        Ok(())
    }

    pub fn list_users(
        &self,
        identity: &Identity,
        query: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> CoreResult<Page<User>> {
        identity.require_admin()?;
        Ok(self
            .repo
            .list_users(query, PageRequest::new(page, page_size))?)
    }

    pub fn update_user_role(&self, identity: &Identity, user_id: &str, role: Role) -> CoreResult<()> {
        identity.require_admin()?;
        self.repo.update_role(user_id, role)?;
        info!(
            "event=update_role module=service status=ok user_id={user_id} role={}",
            role.as_str()
        );
        Ok(())
    }

    /// Admins cannot delete their own account.
    pub fn delete_user(&self, identity: &Identity, user_id: &str) -> CoreResult<()> {
        identity.require_admin()?;
        if identity.user_id == user_id {
            return Err(CoreError::validation("cannot delete your own account"));
        }
        self.repo.delete_user(user_id)?;
        info!("event=delete_user module=service status=ok user_id={user_id}");
        Ok(())
    }

    fn session_for(&self, user: User) -> CoreResult<AuthSession> {
        let token = self.tokens.issue_token(&user.id, user.role)?;
        Ok(AuthSession { token, user })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_password(password: &str) -> CoreResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
