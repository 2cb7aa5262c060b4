//! Authentication service.
//!
//! Simulates the OAuth provider round trip and issues HMAC-SHA256 signed
//! session tokens.
//!
//! ## Flow
//!
//! 1. `authorize` stands in for the provider's consent screen and returns a
//!    single-use authorization code
//! 2. The callback route exchanges the code for a [`Session`]
//! 3. Requests carry the session's access token as a bearer credential
//!
//! ## Token Format
//!
//! Tokens are composed of:
//! - 16 bytes: user_id
//! - 16 bytes: session_id
//! - 8 bytes: issued-at timestamp (Unix millis, big-endian)
//! - 32 bytes: HMAC-SHA256 signature
//!
//! Total: 72 bytes, base64url-encoded (no padding) for transport.

use crate::config::AuthConfig;
use crate::error::{PlatformError, PlatformResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use marks_protocol::{Identity, UserId};
use parking_lot::RwLock;
use sha2::Sha256;
use std::collections::{HashMap, HashSet};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_LEN: usize = 72;
const SIGNED_LEN: usize = 40;

/// An established session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The signed-in user.
    pub identity: Identity,
    /// Bearer token for requests.
    pub access_token: String,
    /// Expiry time (Unix millis).
    pub expires_at: u64,
}

struct PendingCode {
    user_id: UserId,
    issued: Instant,
}

struct TokenClaims {
    user_id: UserId,
    session_id: [u8; 16],
    issued_at: u64,
}

/// Issues and validates sessions.
pub struct AuthService {
    config: AuthConfig,
    users: RwLock<HashMap<UserId, Identity>>,
    subjects: RwLock<HashMap<(String, String), UserId>>,
    codes: RwLock<HashMap<String, PendingCode>>,
    revoked: RwLock<HashSet<[u8; 16]>>,
}

impl AuthService {
    /// Creates a service.
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            users: RwLock::new(HashMap::new()),
            subjects: RwLock::new(HashMap::new()),
            codes: RwLock::new(HashMap::new()),
            revoked: RwLock::new(HashSet::new()),
        }
    }

    /// Records provider consent for `subject` and returns an authorization code.
    ///
    /// The first consent for a `(provider, subject)` pair creates the user.
    pub fn authorize(&self, provider: &str, subject: &str, email: Option<&str>) -> String {
        let key = (provider.to_string(), subject.to_string());
        let user_id = *self.subjects.write().entry(key).or_insert_with(UserId::new);

        let mut identity = Identity::new(user_id, provider);
        if let Some(email) = email {
            identity = identity.with_email(email);
        }
        self.users.write().insert(user_id, identity);

        let code = Uuid::new_v4().simple().to_string();
        self.codes.write().insert(
            code.clone(),
            PendingCode {
                user_id,
                issued: Instant::now(),
            },
        );
        debug!(%user_id, provider, "authorization code issued");
        code
    }

    /// Exchanges an authorization code for a session. Codes are single-use.
    pub fn exchange_code(&self, code: &str) -> PlatformResult<Session> {
        let pending = self
            .codes
            .write()
            .remove(code)
            .ok_or_else(|| PlatformError::AuthenticationFailed("unknown or used code".into()))?;
        if pending.issued.elapsed() > self.config.code_ttl {
            return Err(PlatformError::AuthenticationFailed("code expired".into()));
        }
        let session = self.issue(pending.user_id)?;
        info!(user = %pending.user_id, "session established");
        Ok(session)
    }

    /// Validates a bearer token and returns its identity.
    pub fn validate(&self, token: &str) -> PlatformResult<Identity> {
        let claims = self.verify(token)?;

        if self.revoked.read().contains(&claims.session_id) {
            return Err(PlatformError::AuthenticationFailed("session revoked".into()));
        }
        let expiry_millis = self.config.token_expiry.as_millis() as u64;
        if now_millis() > claims.issued_at + expiry_millis {
            return Err(PlatformError::AuthenticationFailed("token expired".into()));
        }

        self.identity(claims.user_id)
            .ok_or_else(|| PlatformError::AuthenticationFailed("unknown user".into()))
    }

    /// Replaces a valid session with a fresh one and revokes the old token.
    pub fn refresh(&self, token: &str) -> PlatformResult<Session> {
        let identity = self.validate(token)?;
        self.revoke(token)?;
        self.issue(identity.user_id)
    }

    /// Revokes the session behind a token. Revoking twice is not an error.
    pub fn revoke(&self, token: &str) -> PlatformResult<()> {
        let claims = self.verify(token)?;
        if self.revoked.write().insert(claims.session_id) {
            info!(user = %claims.user_id, "session revoked");
        }
        Ok(())
    }

    /// Returns the identity of a known user.
    pub fn identity(&self, user_id: UserId) -> Option<Identity> {
        self.users.read().get(&user_id).cloned()
    }

    fn issue(&self, user_id: UserId) -> PlatformResult<Session> {
        let identity = self
            .identity(user_id)
            .ok_or_else(|| PlatformError::Internal(format!("no identity for {user_id}")))?;
        let issued_at = now_millis();

        let mut data = Vec::with_capacity(TOKEN_LEN);
        data.extend_from_slice(user_id.as_bytes());
        data.extend_from_slice(Uuid::new_v4().as_bytes());
        data.extend_from_slice(&issued_at.to_be_bytes());
        let signature = self.mac(&data)?.finalize().into_bytes();
        data.extend_from_slice(&signature);

        Ok(Session {
            identity,
            access_token: URL_SAFE_NO_PAD.encode(&data),
            expires_at: issued_at + self.config.token_expiry.as_millis() as u64,
        })
    }

    /// Decodes a token and checks its signature.
    fn verify(&self, token: &str) -> PlatformResult<TokenClaims> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| PlatformError::AuthenticationFailed("malformed token".into()))?;
        if bytes.len() != TOKEN_LEN {
            return Err(PlatformError::AuthenticationFailed(
                "invalid token length".into(),
            ));
        }

        let (data, signature) = bytes.split_at(SIGNED_LEN);
        self.mac(data)?
            .verify_slice(signature)
            .map_err(|_| PlatformError::AuthenticationFailed("invalid signature".into()))?;

        let mut user_id = [0u8; 16];
        let mut session_id = [0u8; 16];
        let mut issued_at = [0u8; 8];
        user_id.copy_from_slice(&data[0..16]);
        session_id.copy_from_slice(&data[16..32]);
        issued_at.copy_from_slice(&data[32..40]);

        Ok(TokenClaims {
            user_id: UserId::from_bytes(user_id),
            session_id,
            issued_at: u64::from_be_bytes(issued_at),
        })
    }

    fn mac(&self, data: &[u8]) -> PlatformResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .map_err(|e| PlatformError::Internal(format!("hmac key: {e}")))?;
        mac.update(data);
        Ok(mac)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
