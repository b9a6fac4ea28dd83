//! Accounts: registration, password login, cookie sessions, profile edits.
//!
//! Session tokens are opaque and stored hashed; the cookie value never
//! touches the database directly. Passwords are stored as
//! `salt$sha256(salt ‖ password)`.

use std::fmt::Write as FmtWrite;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::application::repos::{
    CreateUserParams, RepoError, SessionsRepo, UpdateProfileParams, UsersRepo,
};
use crate::domain::entities::{SessionRecord, UserRecord, MAX_TEXT_FIELD_LEN};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("username is already taken")]
    UsernameTaken,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for AccountError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { ref constraint } if constraint.contains("username") => {
                AccountError::UsernameTaken
            }
            other => AccountError::Repo(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct UpdateProfileCommand {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// A freshly-issued session: the raw token goes into the cookie, nothing
/// else leaves this module.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub async fn register(&self, command: RegisterCommand) -> Result<UserRecord, AccountError> {
        let username = valid_username(&command.username)?;
        if command.password.len() < 8 {
            return Err(AccountError::Validation {
                field: "password",
                message: "password must be at least 8 characters",
            });
        }

        let salt = Uuid::new_v4().simple().to_string();
        let password_hash = encode_password(&salt, &command.password);

        let user = self
            .users
            .create_user(CreateUserParams {
                username,
                first_name: command.first_name.trim().to_string(),
                last_name: command.last_name.trim().to_string(),
                email: command.email.trim().to_string(),
                password_hash,
            })
            .await?;
        Ok(user)
    }

    /// Verify credentials and issue a session. Unknown usernames and wrong
    /// passwords are indistinguishable to the caller.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(UserRecord, IssuedSession), AccountError> {
        let user = self
            .users
            .find_by_username(username.trim())
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        if !verify_password(&user.password_hash, password) {
            return Err(AccountError::InvalidCredentials);
        }

        let token = generate_token();
        let now = OffsetDateTime::now_utc();
        let expires_at = now + self.session_ttl;

        self.sessions
            .insert_session(SessionRecord {
                token_hash: hash_token(&token),
                user_id: user.id,
                created_at: now,
                expires_at,
            })
            .await?;

        Ok((user, IssuedSession { token, expires_at }))
    }

    /// Resolve a session cookie to its user. Expired or unknown tokens
    /// resolve to `None` (anonymous), never to an error.
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserRecord>, AccountError> {
        let user = self
            .sessions
            .find_user_by_token_hash(&hash_token(token), OffsetDateTime::now_utc())
            .await?;
        Ok(user)
    }

    pub async fn logout(&self, token: &str) -> Result<(), AccountError> {
        self.sessions.delete_session(&hash_token(token)).await?;
        Ok(())
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        command: UpdateProfileCommand,
    ) -> Result<UserRecord, AccountError> {
        let username = valid_username(&command.username)?;
        let user = self
            .users
            .update_profile(UpdateProfileParams {
                id: user_id,
                username,
                first_name: command.first_name.trim().to_string(),
                last_name: command.last_name.trim().to_string(),
                email: command.email.trim().to_string(),
            })
            .await?;
        Ok(user)
    }
}

/// Anti-forgery token bound to a session: authenticated forms embed it and
/// mutating handlers verify it before the ownership guard runs. Domain
/// separation keeps it distinct from the stored token hash.
pub fn csrf_token(session_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"csrf:");
    hasher.update(session_token.as_bytes());
    hex_digest(hasher)
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex_digest(hasher)
}

fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn encode_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{salt}${}", hex_digest(hasher))
}

fn verify_password(stored: &str, candidate: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, _)) => encode_password(salt, candidate) == stored,
        None => false,
    }
}

fn valid_username(raw: &str) -> Result<String, AccountError> {
    let username = raw.trim().to_string();
    if username.is_empty() {
        return Err(AccountError::Validation {
            field: "username",
            message: "username must not be empty",
        });
    }
    if username.chars().count() > MAX_TEXT_FIELD_LEN {
        return Err(AccountError::Validation {
            field: "username",
            message: "username is too long",
        });
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | '+'))
    {
        return Err(AccountError::Validation {
            field: "username",
            message: "username contains unsupported characters",
        });
    }
    Ok(username)
}

fn hex_digest(hasher: Sha256) -> String {
    let digest = hasher.finalize();
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = FmtWrite::write_fmt(&mut output, format_args!("{byte:02x}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct InMemoryUsers {
        users: Mutex<Vec<UserRecord>>,
    }

    #[async_trait]
    impl UsersRepo for InMemoryUsers {
        async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.username == params.username) {
                return Err(RepoError::Duplicate {
                    constraint: "users_username_key".to_string(),
                });
            }
            let user = UserRecord {
                id: Uuid::new_v4(),
                username: params.username,
                first_name: params.first_name,
                last_name: params.last_name,
                email: params.email,
                password_hash: params.password_hash,
                created_at: OffsetDateTime::now_utc(),
            };
            users.push(user.clone());
            Ok(user)
        }

        async fn find_by_username(
            &self,
            username: &str,
        ) -> Result<Option<UserRecord>, RepoError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.username == username)
                .cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id)
                .cloned())
        }

        async fn update_profile(
            &self,
            params: UpdateProfileParams,
        ) -> Result<UserRecord, RepoError> {
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| u.id == params.id)
                .ok_or(RepoError::NotFound)?;
            user.username = params.username;
            user.first_name = params.first_name;
            user.last_name = params.last_name;
            user.email = params.email;
            Ok(user.clone())
        }
    }

    #[derive(Default)]
    struct InMemorySessions {
        sessions: Mutex<HashMap<String, SessionRecord>>,
        users: Mutex<HashMap<Uuid, UserRecord>>,
    }

    impl InMemorySessions {
        fn seed_user(&self, user: &UserRecord) {
            self.users.lock().unwrap().insert(user.id, user.clone());
        }
    }

    #[async_trait]
    impl SessionsRepo for InMemorySessions {
        async fn insert_session(&self, session: SessionRecord) -> Result<(), RepoError> {
            self.sessions
                .lock()
                .unwrap()
                .insert(session.token_hash.clone(), session);
            Ok(())
        }

        async fn find_user_by_token_hash(
            &self,
            token_hash: &str,
            now: OffsetDateTime,
        ) -> Result<Option<UserRecord>, RepoError> {
            let sessions = self.sessions.lock().unwrap();
            let Some(session) = sessions.get(token_hash) else {
                return Ok(None);
            };
            if session.expires_at <= now {
                return Ok(None);
            }
            Ok(self.users.lock().unwrap().get(&session.user_id).cloned())
        }

        async fn delete_session(&self, token_hash: &str) -> Result<(), RepoError> {
            self.sessions.lock().unwrap().remove(token_hash);
            Ok(())
        }
    }

    fn service() -> (AccountService, Arc<InMemoryUsers>, Arc<InMemorySessions>) {
        let users = Arc::new(InMemoryUsers::default());
        let sessions = Arc::new(InMemorySessions::default());
        let svc = AccountService::new(users.clone(), sessions.clone(), Duration::days(14));
        (svc, users, sessions)
    }

    fn register_command(username: &str) -> RegisterCommand {
        RegisterCommand {
            username: username.to_string(),
            password: "correct-horse".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn session_round_trip_resolves_the_same_user() {
        let (svc, _, sessions) = service();
        let user = svc
            .register(register_command("alice"))
            .await
            .expect("registered");
        sessions.seed_user(&user);

        let (login_user, issued) = svc
            .login("alice", "correct-horse")
            .await
            .expect("logged in");
        assert_eq!(login_user.id, user.id);

        let resolved = svc
            .authenticate(&issued.token)
            .await
            .expect("authenticate")
            .expect("session resolves");
        assert_eq!(resolved.id, user.id);

        svc.logout(&issued.token).await.expect("logout");
        assert!(
            svc.authenticate(&issued.token)
                .await
                .expect("authenticate")
                .is_none()
        );
    }

    #[tokio::test]
    async fn expired_session_is_anonymous() {
        let (_, _, sessions) = service();
        let users = Arc::new(InMemoryUsers::default());
        let svc = AccountService::new(users, sessions.clone(), Duration::seconds(-1));

        let user = svc
            .register(register_command("bob"))
            .await
            .expect("registered");
        sessions.seed_user(&user);

        let (_, issued) = svc.login("bob", "correct-horse").await.expect("logged in");
        assert!(
            svc.authenticate(&issued.token)
                .await
                .expect("authenticate")
                .is_none()
        );
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let (svc, _, _) = service();
        svc.register(register_command("carol"))
            .await
            .expect("registered");

        assert!(matches!(
            svc.login("carol", "wrong").await,
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.login("nobody", "correct-horse").await,
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let (svc, _, _) = service();
        svc.register(register_command("dave"))
            .await
            .expect("registered");

        assert!(matches!(
            svc.register(register_command("dave")).await,
            Err(AccountError::UsernameTaken)
        ));
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let (svc, _, _) = service();
        let mut command = register_command("erin");
        command.password = "short".to_string();

        assert!(matches!(
            svc.register(command).await,
            Err(AccountError::Validation {
                field: "password",
                ..
            })
        ));
    }

    #[test]
    fn csrf_token_differs_from_stored_hash() {
        let token = generate_token();
        assert_ne!(csrf_token(&token), hash_token(&token));
        assert_eq!(csrf_token(&token), csrf_token(&token));
    }
}
