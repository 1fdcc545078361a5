//! Issuing and checking player credentials.
//!
//! A credential binds a stable identity to a token the client presents on
//! every connection. The coordinator trusts an authenticated identity
//! completely, so connections are checked before they are admitted.

use log::{debug, info};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub identity: String,
    pub token: String,
}

pub trait Authenticator: Send + Sync {
    /// Creates a credential for a freshly generated identity.
    fn issue(&self) -> Credential;

    /// Returns the identity a token was issued for, or `None` if the token is
    /// malformed or was not issued by this authenticator.
    fn authenticate(&self, token: &str) -> Option<String>;
}

/// Tokens of the form `<identity>.<hex sha256(secret || identity)>`.
pub struct SignedTokenAuthenticator {
    secret: String,
}

impl SignedTokenAuthenticator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Uses a random secret, so tokens do not survive a restart.
    pub fn random() -> Self {
        let secret: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        Self::new(secret)
    }

    fn sign(&self, identity: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(identity.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl Authenticator for SignedTokenAuthenticator {
    fn issue(&self) -> Credential {
        let identity = Uuid::new_v4().to_string();
        let token = format!("{}.{}", identity, self.sign(&identity));
        info!("Issued identity {}", identity);
        Credential { identity, token }
    }

    fn authenticate(&self, token: &str) -> Option<String> {
        let (identity, signature) = token.split_once('.')?;
        if Uuid::parse_str(identity).is_err() {
            debug!("Rejected token with malformed identity");
            return None;
        }
        if self.sign(identity) != signature {
            debug!("Rejected token with bad signature for {}", identity);
            return None;
        }
        Some(identity.to_string())
    }
}
