use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use metrics::counter;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::forms::{
    self, FormErrors, INVALID_LOGIN, LoginForm, ProfileForm, SignupForm, USERNAME_TAKEN,
};
use crate::application::outcome::Submission;
use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UpdateProfileParams,
    UsersRepo, UsersWriteRepo,
};
use crate::domain::entities::UserRecord;

pub const METRIC_LOGIN_FAILURES: &str = "blogicum_login_failures_total";

const TOKEN_SEPARATOR: char = '_';
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// Who is making the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Viewer {
    #[default]
    Anonymous,
    User(UserRecord),
}

impl Viewer {
    pub fn id(&self) -> Option<Uuid> {
        self.user().map(|user| user.id)
    }

    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(user) => Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::User(_))
    }
}

/// A freshly opened session. `token` is only ever handed to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

struct ParsedToken<'a> {
    session_id: Uuid,
    secret: &'a str,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    users_writer: Arc<dyn UsersWriteRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        users_writer: Arc<dyn UsersWriteRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            users_writer,
            sessions,
            session_ttl,
        }
    }

    pub async fn register(&self, form: &SignupForm) -> Result<Submission<UserRecord>, AccountError> {
        let draft = match forms::validate_signup(form) {
            Ok(draft) => draft,
            Err(errors) => return Ok(Err(errors)),
        };

        if self
            .users
            .find_by_username(&draft.profile.username)
            .await?
            .is_some()
        {
            return Ok(Err(FormErrors::single("username", USERNAME_TAKEN)));
        }

        let password_hash = hash_password(&draft.password)?;
        let created = self
            .users_writer
            .create_user(CreateUserParams {
                username: draft.profile.username,
                email: draft.profile.email,
                first_name: draft.profile.first_name,
                last_name: draft.profile.last_name,
                password_hash,
            })
            .await;

        match created {
            Ok(user) => {
                info!(
                    target = "blogicum::accounts",
                    user_id = %user.id,
                    username = %user.username,
                    "user registered"
                );
                Ok(Ok(user))
            }
            Err(RepoError::Duplicate { .. }) => {
                Ok(Err(FormErrors::single("username", USERNAME_TAKEN)))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Check credentials. A wrong username and a wrong password are indistinguishable.
    pub async fn login(&self, form: &LoginForm) -> Result<Submission<UserRecord>, AccountError> {
        let (username, password) = match forms::validate_login(form) {
            Ok(credentials) => credentials,
            Err(errors) => return Ok(Err(errors)),
        };

        let user = self.users.find_by_username(&username).await?;
        let verified = user
            .as_ref()
            .is_some_and(|user| verify_password(&password, &user.password_hash));

        match user {
            Some(user) if verified => {
                info!(target = "blogicum::accounts", user_id = %user.id, "login succeeded");
                Ok(Ok(user))
            }
            _ => {
                counter!(METRIC_LOGIN_FAILURES).increment(1);
                warn!(target = "blogicum::accounts", username = %username, "login failed");
                let mut errors = FormErrors::default();
                errors.add_non_field(INVALID_LOGIN);
                Ok(Err(errors))
            }
        }
    }

    pub async fn start_session(&self, user_id: Uuid) -> Result<IssuedSession, AccountError> {
        let session_id = Uuid::new_v4();
        let secret = generate_secret();
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                id: session_id,
                user_id,
                token_hash: hash_secret(&secret),
                expires_at,
            })
            .await?;

        Ok(IssuedSession {
            token: format!("{}{TOKEN_SEPARATOR}{secret}", session_id.simple()),
            expires_at,
        })
    }

    /// Resolve a session cookie value. Malformed, unknown and expired tokens are anonymous.
    pub async fn resolve(&self, token: &str) -> Result<Viewer, AccountError> {
        let Some(parsed) = parse_token(token) else {
            return Ok(Viewer::Anonymous);
        };
        let Some(session) = self.sessions.find_session(parsed.session_id).await? else {
            return Ok(Viewer::Anonymous);
        };

        if session.expires_at <= OffsetDateTime::now_utc() {
            return Ok(Viewer::Anonymous);
        }
        let hashed_input = hash_secret(parsed.secret);
        if session.token_hash.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Ok(Viewer::Anonymous);
        }

        Ok(self
            .users
            .find_user(session.user_id)
            .await?
            .map_or(Viewer::Anonymous, Viewer::User))
    }

    pub async fn logout(&self, token: &str) -> Result<(), AccountError> {
        if let Some(parsed) = parse_token(token) {
            self.sessions.delete_session(parsed.session_id).await?;
        }
        Ok(())
    }

    pub async fn update_profile(
        &self,
        user: &UserRecord,
        form: &ProfileForm,
    ) -> Result<Submission<UserRecord>, AccountError> {
        let draft = match forms::validate_profile(form) {
            Ok(draft) => draft,
            Err(errors) => return Ok(Err(errors)),
        };

        if draft.username != user.username {
            let taken = self
                .users
                .find_by_username(&draft.username)
                .await?
                .is_some_and(|other| other.id != user.id);
            if taken {
                return Ok(Err(FormErrors::single("username", USERNAME_TAKEN)));
            }
        }

        let updated = self
            .users_writer
            .update_profile(UpdateProfileParams {
                id: user.id,
                username: draft.username,
                email: draft.email,
                first_name: draft.first_name,
                last_name: draft.last_name,
            })
            .await;

        match updated {
            Ok(updated) => {
                info!(target = "blogicum::accounts", user_id = %updated.id, "profile updated");
                Ok(Ok(updated))
            }
            Err(RepoError::Duplicate { .. }) => {
                Ok(Err(FormErrors::single("username", USERNAME_TAKEN)))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn purge_expired(&self) -> Result<u64, AccountError> {
        let removed = self
            .sessions
            .delete_expired(OffsetDateTime::now_utc())
            .await?;
        if removed > 0 {
            info!(target = "blogicum::accounts", removed, "expired sessions purged");
        }
        Ok(removed)
    }
}

pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::PasswordHash(err.to_string()))
}

fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn parse_token(token: &str) -> Option<ParsedToken<'_>> {
    let (id, secret) = token.split_once(TOKEN_SEPARATOR)?;
    if secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        session_id: Uuid::try_parse(id).ok()?,
        secret,
    })
}
