//! Identity: signup, credential verification and bearer tokens.
//!
//! Passwords are stored as Argon2id PHC strings. Tokens are
//! `base64url(claims JSON).base64url(ECDSA P-256 signature over the first part)` with claims
//! `{sub, iat, exp}`. Tokens expire after a fixed TTL; replacing the signing key revokes every
//! outstanding token.

use crate::config::CoreConfig;
use crate::ids::UserId;
use crate::models::{User, UsernameEntry};
use crate::records::RecordStore;
use crate::validation::{username_key, validate_password, validate_username};
use crate::{VaultError, VaultResult};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use imgvault_types::EmailAddress;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Signs and verifies bearer tokens with an ECDSA P-256 key.
pub struct TokenSigner {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Generates a fresh key. Tokens signed with it do not survive a restart.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::thread_rng()))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = *signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Loads a PKCS#8 PEM private key.
    ///
    /// `source` may be the PEM itself, a path to a PEM file, or base64-encoded PEM.
    pub fn load(source: &str) -> VaultResult<Self> {
        let pem = load_private_key_pem(source.trim())?;
        let signing_key = SigningKey::from_pkcs8_pem(&pem)
            .map_err(|e| VaultError::EcdsaPrivateKeyParse(e.to_string().into()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// The private key as PKCS#8 PEM, for writing a key file.
    pub fn to_pkcs8_pem(&self) -> VaultResult<String> {
        self.signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| VaultError::EcdsaPrivateKeyEncode(e.to_string()))
    }

    fn sign(&self, claims: &TokenClaims) -> VaultResult<String> {
        let payload = serde_json::to_vec(claims).map_err(VaultError::Serialization)?;
        let encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload);
        let signature: Signature = self.signing_key.sign(encoded.as_bytes());

        Ok(format!(
            "{}.{}",
            encoded,
            general_purpose::URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    /// Checks the signature and decodes the claims. Expiry is not checked here.
    fn verify(&self, token: &str) -> Result<TokenClaims, &'static str> {
        let (payload, signature) = token.split_once('.').ok_or("missing separator")?;

        let signature_bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| "signature is not base64url")?;
        let signature =
            Signature::from_slice(&signature_bytes).map_err(|_| "malformed signature")?;

        self.verifying_key
            .verify(payload.as_bytes(), &signature)
            .map_err(|_| "bad signature")?;

        let claims = general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| "payload is not base64url")?;
        serde_json::from_slice(&claims).map_err(|_| "malformed claims")
    }
}

fn load_private_key_pem(source: &str) -> VaultResult<String> {
    if source.contains("-----BEGIN") {
        Ok(source.to_string())
    } else if Path::new(source).exists() {
        fs::read_to_string(source).map_err(|e| VaultError::EcdsaPrivateKeyParse(Box::new(e)))
    } else {
        let decoded = general_purpose::STANDARD
            .decode(source)
            .map_err(|e| VaultError::EcdsaPrivateKeyParse(Box::new(e)))?;
        String::from_utf8(decoded).map_err(|e| VaultError::EcdsaPrivateKeyParse(Box::new(e)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: UserId,
    iat: i64,
    exp: i64,
}

/// A freshly issued bearer token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

/// Account and token operations.
#[derive(Clone, Debug)]
pub struct IdentityService {
    store: Arc<RecordStore>,
    signer: Arc<TokenSigner>,
    token_ttl: Duration,
    // Verified against on unknown usernames so both rejection paths cost one Argon2 run.
    dummy_hash: String,
}

impl IdentityService {
    pub fn new(
        cfg: &CoreConfig,
        store: Arc<RecordStore>,
        signer: Arc<TokenSigner>,
    ) -> VaultResult<Self> {
        let token_ttl = Duration::from_std(cfg.token_ttl())
            .map_err(|_| VaultError::InvalidInput("token TTL is out of range".into()))?;

        Ok(Self {
            store,
            signer,
            token_ttl,
            dummy_hash: hash_password(DUMMY_PASSWORD)?,
        })
    }

    /// Registers a new user.
    ///
    /// # Errors
    ///
    /// - `VaultError::InvalidInput` / `VaultError::Text` for a malformed username, password or
    ///   email.
    /// - `VaultError::UsernameTaken` if the username exists, compared case-insensitively.
    pub fn signup(&self, username: &str, password: &str, email: &str) -> VaultResult<User> {
        let username = validate_username(username.trim())?;
        validate_password(password)?;
        let email = EmailAddress::parse(email)?;

        let user = User {
            id: UserId::new(),
            username: username.to_string(),
            password_hash: hash_password(password)?,
            email,
            created_at: Utc::now(),
        };

        let key = username_key(username);
        let entry = UsernameEntry {
            user_id: user.id.clone(),
            username: user.username.clone(),
        };

        if let Err(e) = self.store.reserve_username(&key, &entry) {
            tracing::warn!(username = %user.username, "signup rejected: {}", e);
            return Err(e);
        }

        if let Err(e) = self.store.write_user(&user) {
            tracing::error!(username = %user.username, "failed to write user record: {}", e);
            if let Err(release) = self.store.release_username(&key) {
                tracing::error!(
                    username = %user.username,
                    "failed to release username: {}",
                    release
                );
            }
            return Err(e);
        }

        tracing::info!(user_id = %user.id, username = %user.username, "user signed up");
        Ok(user)
    }

    /// Checks a username and password.
    ///
    /// An unknown username and a wrong password both fail with `VaultError::InvalidCredentials`.
    pub fn verify_credentials(&self, username: &str, password: &str) -> VaultResult<UserId> {
        let user = match self.find_user(username) {
            Ok(user) => user,
            Err(VaultError::NotFound) => {
                if let Ok(parsed) = PasswordHash::new(&self.dummy_hash) {
                    let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
                }
                tracing::warn!("login rejected: unknown username");
                return Err(VaultError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        let parsed = PasswordHash::new(&user.password_hash).map_err(|e| {
            VaultError::PasswordHash(format!("stored hash for user {} is unreadable: {e}", user.id))
        })?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            tracing::warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(VaultError::InvalidCredentials);
        }

        Ok(user.id)
    }

    /// Looks a user up by username, case-insensitively.
    pub fn find_user(&self, username: &str) -> VaultResult<User> {
        let username = validate_username(username.trim()).map_err(|_| VaultError::NotFound)?;
        let user_id = self
            .store
            .lookup_username(&username_key(username))?
            .ok_or(VaultError::NotFound)?;

        self.store.read_user(&user_id)?.ok_or_else(|| {
            tracing::error!(%user_id, "username index points at a missing user record");
            VaultError::NotFound
        })
    }

    /// Verifies credentials and issues a token.
    pub fn login(&self, username: &str, password: &str) -> VaultResult<IssuedToken> {
        let user_id = self.verify_credentials(username, password)?;
        self.issue_token(&user_id)
    }

    pub fn issue_token(&self, user_id: &UserId) -> VaultResult<IssuedToken> {
        self.issue_token_at(user_id, Utc::now())
    }

    fn issue_token_at(&self, user_id: &UserId, now: DateTime<Utc>) -> VaultResult<IssuedToken> {
        let expires_at = now.checked_add_signed(self.token_ttl).ok_or_else(|| {
            VaultError::InvalidInput("token expiry is out of range".into())
        })?;
        let claims = TokenClaims {
            sub: user_id.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        Ok(IssuedToken {
            token: self.signer.sign(&claims)?,
            user_id: user_id.clone(),
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .unwrap_or(expires_at),
        })
    }

    /// Resolves a token to its user.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidToken` for a malformed, tampered, foreign-signed or expired
    /// token, or one whose user no longer exists.
    pub fn validate_token(&self, token: &str) -> VaultResult<UserId> {
        self.validate_token_at(token, Utc::now())
    }

    fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> VaultResult<UserId> {
        let claims = self.signer.verify(token.trim()).map_err(|reason| {
            tracing::debug!("token rejected: {}", reason);
            VaultError::InvalidToken
        })?;

        if claims.exp <= now.timestamp() {
            tracing::debug!(user_id = %claims.sub, "token rejected: expired");
            return Err(VaultError::InvalidToken);
        }

        if self.store.read_user(&claims.sub)?.is_none() {
            tracing::warn!(user_id = %claims.sub, "token rejected: unknown user");
            return Err(VaultError::InvalidToken);
        }

        Ok(claims.sub)
    }
}

const DUMMY_PASSWORD: &str = "imgvault-unknown-user";

fn hash_password(password: &str) -> VaultResult<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| VaultError::PasswordHash(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| VaultError::PasswordHash(e.to_string()))
}
