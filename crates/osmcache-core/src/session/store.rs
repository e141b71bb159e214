//! Encrypted on-disk snapshot of a connection.
//!
//! The snapshot holds user credentials and personal data, so it is sealed
//! with ChaCha20-Poly1305 under a key derived (Argon2) from the application
//! token. A file that is expired, belongs to another application, or fails
//! to decrypt is discarded and the caller gets a fresh connection.

use std::path::{Path, PathBuf};

use argon2::Argon2;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{OsmError, Result, Transport};
use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionState};

/// Session file name in the cache directory
const SESSION_FILE: &str = "session.json";

const FORMAT_VERSION: u32 = 1;

/// Remote sessions lapse after about half an hour of inactivity.
pub const DEFAULT_TTL_MINUTES: i64 = 30;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    app_id: String,
    saved_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    salt: Vec<u8>,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl Envelope {
    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

fn persistence(context: &str, err: impl std::fmt::Display) -> OsmError {
    OsmError::Persistence(format!("{}: {}", context, err))
}

fn derive_key(app_token: &str, salt: &[u8]) -> Result<[u8; 32]> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(app_token.as_bytes(), salt, &mut key)
        .map_err(|e| persistence("key derivation", e))?;
    Ok(key)
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

pub struct SessionStore {
    dir: PathBuf,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
        }
    }

    /// Store in the configured cache directory.
    pub fn for_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(config.cache_dir()?))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    /// Write the connection's state. A logged-out connection has nothing
    /// worth keeping, so its file is removed instead.
    pub fn save(&self, connection: &Connection) -> Result<()> {
        if !connection.is_authenticated() {
            return self.clear();
        }
        let state = connection.state();
        let plaintext = serde_json::to_vec(state).map_err(|e| persistence("serialize", e))?;

        let salt: [u8; SALT_LEN] = random_bytes();
        let nonce: [u8; NONCE_LEN] = random_bytes();
        let key = derive_key(&state.app_token, &salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| persistence("encrypt", e))?;

        let saved_at = Utc::now();
        let envelope = Envelope {
            version: FORMAT_VERSION,
            app_id: state.app_id.clone(),
            saved_at,
            expires_at: saved_at + self.ttl,
            salt: salt.to_vec(),
            nonce: nonce.to_vec(),
            ciphertext,
        };
        let contents = serde_json::to_vec(&envelope).map_err(|e| persistence("serialize", e))?;
        self.write_file(&contents)?;
        debug!(path = %self.path().display(), "Saved session");
        Ok(())
    }

    fn write_file(&self, contents: &[u8]) -> Result<()> {
        let path = self.path();
        std::fs::create_dir_all(&self.dir).map_err(|e| persistence("create directory", e))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(|e| persistence("write", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| persistence("set permissions", e))?;
        }
        std::fs::rename(&tmp, &path).map_err(|e| persistence("rename", e))
    }

    /// Read the saved state for this application. `Ok(None)` when there is
    /// no usable snapshot; expired and foreign files are removed.
    pub fn load(&self, app_id: &str, app_token: &str) -> Result<Option<ConnectionState>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read(&path).map_err(|e| persistence("read", e))?;
        let envelope: Envelope =
            serde_json::from_slice(&contents).map_err(|e| persistence("parse", e))?;

        if envelope.version != FORMAT_VERSION {
            info!(version = envelope.version, "Discarding session in an old format");
            self.clear()?;
            return Ok(None);
        }
        if envelope.app_id != app_id {
            info!("Discarding session saved by another application");
            self.clear()?;
            return Ok(None);
        }
        if envelope.is_expired() {
            info!(saved_at = %envelope.saved_at, "Discarding expired session");
            self.clear()?;
            return Ok(None);
        }
        if envelope.salt.len() != SALT_LEN || envelope.nonce.len() != NONCE_LEN {
            return Err(persistence("parse", "bad salt or nonce length"));
        }

        let key = derive_key(app_token, &envelope.salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
            .map_err(|_| persistence("decrypt", "wrong application token or damaged file"))?;
        let state: ConnectionState =
            serde_json::from_slice(&plaintext).map_err(|e| persistence("parse state", e))?;

        if state.app_id != app_id || state.app_token != app_token {
            return Err(persistence("restore", "application credentials do not match"));
        }
        Ok(Some(state))
    }

    /// A connection for this application, resumed from disk when possible.
    /// Never fails: an unusable snapshot is logged and replaced by a fresh,
    /// logged-out connection.
    pub fn restore(
        &self,
        app_id: &str,
        app_token: &str,
        transport: Box<dyn Transport>,
    ) -> Connection {
        let state = match self.load(app_id, app_token) {
            Ok(Some(state)) => {
                let email = state.credentials.as_ref().map(|c| c.email.as_str());
                info!(email = ?email, "Resumed session");
                state
            }
            Ok(None) => ConnectionState::new(app_id, app_token),
            Err(e) => {
                warn!(error = %e, "Could not resume session");
                if let Err(e) = self.clear() {
                    warn!(error = %e, "Could not remove session file");
                }
                ConnectionState::new(app_id, app_token)
            }
        };
        Connection::from_state(state, transport)
    }

    pub fn clear(&self) -> Result<()> {
        remove_if_exists(&self.path())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(persistence("remove", e)),
    }
}
