//! Per-installation actor token.
//!
//! The token is an opaque string that lets the server tell our saves apart
//! from everyone else's. It is created once, persisted through a
//! [`TokenStore`], and never changes afterwards. It is not a credential.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::{FALLBACK_TOKEN_LEN, FALLBACK_TOKEN_PREFIX, USER_KEY_NAME};

/// Opaque per-installation identity. Only ever compared for equality.
#[derive(Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorToken(String);

impl ActorToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ActorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorToken({})", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON write error: {0}")]
    RonWrite(#[from] ron::Error),
}

/// Key-value persistence for the actor token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<ActorToken>, IdentityError>;
    fn store(&self, token: &ActorToken) -> Result<(), IdentityError>;
}

/// Stores `{ "userKey": "<token>" }` in a RON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<ActorToken>, IdentityError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entries: HashMap<String, String> = ron::from_str(&text)?;
        Ok(entries
            .get(USER_KEY_NAME)
            .filter(|t| !t.is_empty())
            .map(ActorToken::new))
    }

    fn store(&self, token: &ActorToken) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entries = HashMap::from([(USER_KEY_NAME.to_string(), token.as_str().to_string())]);
        std::fs::write(&self.path, ron::to_string(&entries)?)?;
        Ok(())
    }
}

/// Process-local store, for tests and for running without a data dir.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<ActorToken>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<ActorToken>, IdentityError> {
        Ok(self.token.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn store(&self, token: &ActorToken) -> Result<(), IdentityError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        Ok(())
    }
}

/// Hands out the actor token, creating and persisting it on first use.
pub struct IdentityProvider {
    store: Box<dyn TokenStore>,
    token: OnceLock<ActorToken>,
}

impl IdentityProvider {
    pub fn new(store: impl TokenStore + 'static) -> Self {
        Self { store: Box::new(store), token: OnceLock::new() }
    }

    /// The actor token. Never fails: a store that can't be read or written
    /// degrades to a token that lives only as long as this provider.
    pub fn actor_token(&self) -> ActorToken {
        self.token.get_or_init(|| self.load_or_create()).clone()
    }

    fn load_or_create(&self) -> ActorToken {
        match self.store.load() {
            Ok(Some(token)) => {
                debug!(token = %token, "loaded actor token");
                return token;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to read actor token, generating a new one"),
        }

        let token = generate_token();
        match self.store.store(&token) {
            Ok(()) => info!(token = %token, "created actor token"),
            Err(e) => warn!(error = %e, token = %token, "failed to persist actor token, using it for this run only"),
        }
        token
    }
}

/// New token: a UUIDv4 from the OS CSPRNG, or a `user_xxxxxx` fallback when
/// no secure source is available.
pub fn generate_token() -> ActorToken {
    let mut bytes = [0u8; 16];
    match getrandom::fill(&mut bytes) {
        Ok(()) => token_from_random_bytes(bytes),
        Err(e) => {
            warn!(error = %e, "secure random source unavailable, using fallback token");
            let seed = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default();
            fallback_token(seed)
        }
    }
}

fn token_from_random_bytes(bytes: [u8; 16]) -> ActorToken {
    ActorToken(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
}

/// Low-quality pseudo-random token: `user_` followed by base-36 characters.
fn fallback_token(seed: u64) -> ActorToken {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let suffix: String = (0..FALLBACK_TOKEN_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    ActorToken(format!("{FALLBACK_TOKEN_PREFIX}{suffix}"))
}
