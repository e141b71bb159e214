//! Login passwords in the OS keychain, one entry per email address.
//!
//! Only the CLI touches the keychain. The core library never sees a
//! password after the credential exchange.

use anyhow::{Context, Result};
use keyring::{Entry, Error as KeyringError};

const SERVICE_NAME: &str = "osmcache";

fn entry(email: &str) -> Result<Entry> {
    Entry::new(SERVICE_NAME, email.trim())
        .with_context(|| format!("No keychain entry available for {}", email))
}

/// The saved password for `email`, or `None` when nothing is stored.
pub fn password(email: &str) -> Result<Option<String>> {
    match entry(email)?.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(e).context("Keychain lookup failed"),
    }
}

/// Remember a password the remote system has just accepted.
pub fn remember(email: &str, password: &str) -> Result<()> {
    entry(email)?
        .set_password(password)
        .context("Keychain write failed")
}

/// Drop a password the remote system refused. Nothing stored is fine.
pub fn forget(email: &str) -> Result<()> {
    match entry(email)?.delete_credential() {
        Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
        Err(e) => Err(e).context("Keychain delete failed"),
    }
}
