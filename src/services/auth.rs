use std::sync::LazyLock;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

use crate::config::Config;
use crate::crypto::token::generate_session_token;
use crate::error::{AppError, Result};
use crate::models::{session::Session, user::User};
use crate::store::CredentialStore;
use crate::validation::auth::{validate_password, validate_username};

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 3;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 1;

/// Verified against when the username is unknown, so both failure paths cost the same.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("zapbot-timing-equaliser").ok());

/// Builds the unknown-user hash up front so the first failed login does not
/// pay for it.
pub fn warm_up_dummy_hash() -> bool {
    let ready = LazyLock::force(&DUMMY_HASH).is_some();
    if !ready {
        tracing::warn!("⚠️ Could not prepare the dummy password hash");
    }
    ready
}

/// Hashes a password using Argon2id.
///
/// # Arguments
///
/// * `password` - The password to hash.
///
/// # Returns
///
/// A `Result` containing the PHC-formatted hash.
pub fn hash_password(password: &str) -> Result<String> {
    let mut password_bytes = password.as_bytes().to_vec();

    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Hashing(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ParamsBuilder::new()
            .m_cost(ARGON2_MEMORY_MB * 1024)
            .t_cost(ARGON2_ITERATIONS)
            .p_cost(ARGON2_PARALLELISM)
            .build()
            .map_err(|e| AppError::Hashing(format!("Argon2 params: {}", e)))?,
    );

    let password_hash = argon2
        .hash_password(&password_bytes, &salt)
        .map_err(|e| AppError::Hashing(format!("Argon2 hash error: {}", e)))?
        .to_string();

    password_bytes.zeroize();
    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

/// Verifies a password against a hash.
///
/// The digest comparison inside `argon2` is constant-time.
///
/// # Arguments
///
/// * `password` - The password to verify.
/// * `hash` - The hash to verify against.
///
/// # Returns
///
/// A `Result` containing `true` if the password is valid, `false` otherwise.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let mut password_bytes = password.as_bytes().to_vec();
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Hashing(format!("Hash parse error: {}", e)))?;
    let result = Argon2::default()
        .verify_password(&password_bytes, &parsed_hash)
        .is_ok();

    password_bytes.zeroize();
    tracing::debug!("Password verification completed");
    Ok(result)
}

/// Authenticates a user.
///
/// Returns `Ok(None)` for an unknown username and for a wrong password alike;
/// callers must not be able to tell the two apart.
pub async fn authenticate_user(
    store: &dyn CredentialStore,
    username: &str,
    password: &str,
) -> Result<Option<User>> {
    tracing::debug!("🔐 Authenticating user: {}", username);

    let Some(user) = store.find_user_by_username(username).await? else {
        if let Some(dummy) = DUMMY_HASH.as_deref() {
            let _ = verify_password(password, dummy);
        }
        tracing::warn!("❌ Login failed for {}", username);
        return Ok(None);
    };

    match verify_password(password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("❌ Login failed for {}", username);
            return Ok(None);
        }
        Err(e) => {
            tracing::error!("❌ Stored password hash for {} is unusable: {}", username, e);
            return Ok(None);
        }
    }

    tracing::info!("✅ User authenticated: {}", user.id);
    Ok(Some(user))
}

/// Issues a fresh session for `user`.
pub async fn start_session(
    store: &dyn CredentialStore,
    user: &User,
    lifetime_hours: i64,
) -> Result<Session> {
    let token = generate_session_token();
    let session = store.create_session(user.id, &token, lifetime_hours).await?;
    tracing::info!("✅ Session created for user: {}", user.id);
    Ok(session)
}

/// Deletes the session for `token`, if there is one.
pub async fn end_session(store: &dyn CredentialStore, token: Option<&str>) {
    let Some(token) = token else {
        return;
    };

    if let Err(e) = store.delete_session_by_token(token).await {
        tracing::error!("❌ Failed to delete session: {}", e);
    }
}

/// Creates the bootstrap admin on first boot.
///
/// Does nothing when the credentials are not configured or the user already
/// exists. Invalid credentials are reported and skipped.
pub async fn ensure_admin_user(store: &dyn CredentialStore, config: &Config) -> Result<()> {
    warm_up_dummy_hash();

    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        tracing::info!("ADMIN_USERNAME or ADMIN_PASSWORD not set, skipping admin bootstrap");
        return Ok(());
    };

    if let Err(e) = validate_username(username).and_then(|_| validate_password(password)) {
        tracing::warn!("⚠️ Admin bootstrap skipped: {}", e);
        return Ok(());
    }

    if store.find_user_by_username(username).await?.is_some() {
        tracing::debug!("Admin user {} already exists", username);
        return Ok(());
    }

    let password_hash = hash_password(password)?;
    let user = store.create_user(username, &password_hash).await?;

    tracing::info!("✅ Admin user '{}' created with ID: {}", user.username, user.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use zeroize::Zeroizing;

    fn config_with_admin(username: &str, password: &str) -> Config {
        Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/zapbot".to_string()),
            "ADMIN_USERNAME" => Some(username.to_string()),
            "ADMIN_PASSWORD" => Some(password.to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn hashes_verify_and_are_salted() {
        let first = hash_password("correct horse").unwrap();
        let second = hash_password("correct horse").unwrap();

        assert_ne!(first, second);
        assert!(verify_password("correct horse", &first).unwrap());
        assert!(!verify_password("battery staple", &first).unwrap());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let store = MemoryCredentialStore::new();
        store
            .create_user("admin", &hash_password("correct horse").unwrap())
            .await
            .unwrap();

        assert!(authenticate_user(&store, "admin", "nope").await.unwrap().is_none());
        assert!(authenticate_user(&store, "ghost", "nope").await.unwrap().is_none());
        assert!(authenticate_user(&store, "admin", "correct horse").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unusable_stored_hash_fails_like_unknown_user() {
        let store = MemoryCredentialStore::new();
        store.create_user("legacy", "not-a-phc-string").await.unwrap();
        store
            .create_user("bcrypt", "$2a$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy")
            .await
            .unwrap();

        assert!(authenticate_user(&store, "legacy", "whatever").await.unwrap().is_none());
        assert!(authenticate_user(&store, "bcrypt", "whatever").await.unwrap().is_none());
        assert!(authenticate_user(&store, "ghost", "whatever").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bootstrap_prepares_dummy_hash() {
        let store = MemoryCredentialStore::new();
        let mut config = config_with_admin("admin", "correct horse");
        config.admin_username = None;

        ensure_admin_user(&store, &config).await.unwrap();

        let dummy = LazyLock::force(&DUMMY_HASH).as_deref().unwrap();
        assert!(!verify_password("zapbot", dummy).unwrap());
        assert!(warm_up_dummy_hash());
    }

    #[tokio::test]
    async fn admin_is_created_once() {
        let store = MemoryCredentialStore::new();
        let config = config_with_admin("admin", "correct horse");

        ensure_admin_user(&store, &config).await.unwrap();
        let first = store.find_user_by_username("admin").await.unwrap().unwrap();

        ensure_admin_user(&store, &config).await.unwrap();
        let second = store.find_user_by_username("admin").await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert!(verify_password("correct horse", &first.password_hash).unwrap());
    }

    #[tokio::test]
    async fn admin_bootstrap_skips_weak_credentials() {
        let store = MemoryCredentialStore::new();
        let mut config = config_with_admin("admin", "short");
        ensure_admin_user(&store, &config).await.unwrap();
        assert!(store.find_user_by_username("admin").await.unwrap().is_none());

        config.admin_password = None;
        ensure_admin_user(&store, &config).await.unwrap();
        assert!(store.find_user_by_username("admin").await.unwrap().is_none());

        config.admin_password = Some(Zeroizing::new("long enough".to_string()));
        ensure_admin_user(&store, &config).await.unwrap();
        assert!(store.find_user_by_username("admin").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sessions_carry_fresh_tokens() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user("admin", "hash").await.unwrap();

        let a = start_session(&store, &user, 24).await.unwrap();
        let b = start_session(&store, &user, 24).await.unwrap();
        assert_ne!(a.token, b.token);

        end_session(&store, Some(&a.token)).await;
        end_session(&store, Some(&a.token)).await;
        end_session(&store, None).await;
        assert!(store.find_session_by_token(&a.token).await.unwrap().is_none());
        assert!(store.find_session_by_token(&b.token).await.unwrap().is_some());
    }
}
