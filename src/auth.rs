//! User accounts and API tokens.
//!
//! Users live in a single `users.json` file under the data directory.
//! Passwords are stored as salted PBKDF2-SHA256 hashes and tokens as
//! SHA-256 digests, so the file never holds a usable credential.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Username and password are required")]
    MissingCredentials,

    #[error("Username already exists")]
    UsernameTaken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Public view of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    id: u64,
    username: String,
    email: String,
    salt: String,
    password_hash: String,
    /// SHA-256 of the current token, base64
    token_hash: Option<String>,
    created_at: DateTime<Utc>,
}

impl UserRecord {
    fn public(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// A user together with the token issued to them
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Account store backed by `users.json`
#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
    iterations: u32,
    users: Arc<RwLock<Vec<UserRecord>>>,
}

impl UserStore {
    pub async fn new(data_dir: &Path, iterations: u32) -> Result<Self, AuthError> {
        fs::create_dir_all(data_dir).await?;
        let path = data_dir.join("users.json");

        let users = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            serde_json::from_str(&content)?
        } else {
            Vec::new()
        };

        info!("👤 User store initialized with {} accounts", users.len());
        Ok(Self {
            path,
            iterations,
            users: Arc::new(RwLock::new(users)),
        })
    }

    async fn persist(&self, users: &[UserRecord]) -> Result<(), AuthError> {
        let content = serde_json::to_string_pretty(users)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }

    /// Create an account and issue its first token
    pub async fn register(&self, username: &str, password: &str, email: &str) -> Result<Session, AuthError> {
        let (username, password) = require_credentials(username, password)?;

        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == username) {
            return Err(AuthError::UsernameTaken);
        }

        let salt = random_bytes::<SALT_LENGTH>();
        let token = generate_token();
        let record = UserRecord {
            id: users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
            username: username.to_string(),
            email: email.trim().to_string(),
            salt: STANDARD.encode(salt),
            password_hash: STANDARD.encode(hash_password(password, &salt, self.iterations)),
            token_hash: Some(hash_token(&token)),
            created_at: Utc::now(),
        };

        let user = record.public();
        let mut updated = users.clone();
        updated.push(record);
        self.persist(&updated).await?;
        *users = updated;

        info!("Registered user {}", user.username);
        Ok(Session { user, token })
    }

    /// Verify credentials and issue a fresh token
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let (username, password) = require_credentials(username, password)?;

        let mut users = self.users.write().await;
        let mut updated = users.clone();
        let record = updated
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(record, password, self.iterations) {
            debug!("Password mismatch for {}", username);
            return Err(AuthError::InvalidCredentials);
        }

        // Only the digest is stored, so an earlier token cannot be handed back out
        let token = generate_token();
        record.token_hash = Some(hash_token(&token));
        let user = record.public();
        self.persist(&updated).await?;
        *users = updated;

        Ok(Session { user, token })
    }

    /// Revoke a token. Returns whether it belonged to anyone.
    pub async fn logout(&self, token: &str) -> Result<bool, AuthError> {
        let digest = hash_token(token);
        let mut users = self.users.write().await;
        let mut updated = users.clone();

        let Some(record) = updated
            .iter_mut()
            .find(|u| u.token_hash.as_deref() == Some(digest.as_str()))
        else {
            return Ok(false);
        };

        record.token_hash = None;
        self.persist(&updated).await?;
        *users = updated;
        Ok(true)
    }

    /// Resolve a token to its user
    pub async fn authenticate(&self, token: &str) -> Option<User> {
        let digest = hash_token(token);
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.token_hash.as_deref() == Some(digest.as_str()))
            .map(UserRecord::public)
    }
}

fn require_credentials<'a>(username: &'a str, password: &'a str) -> Result<(&'a str, &'a str), AuthError> {
    let (username, password) = (username.trim(), password.trim());
    if username.is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok((username, password))
}

fn hash_password(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

fn verify_password(record: &UserRecord, password: &str, iterations: u32) -> bool {
    let (Ok(salt), Ok(expected)) = (STANDARD.decode(&record.salt), STANDARD.decode(&record.password_hash)) else {
        return false;
    };
    let actual = hash_password(password, &salt, iterations);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Random API token (URL-safe base64, 32 bytes of entropy)
pub fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes::<32>())
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Pull the token out of an `Authorization: Token <key>` or `Bearer <key>` header value
pub fn parse_authorization(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    let known = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    (known && !token.is_empty()).then_some(token)
}
