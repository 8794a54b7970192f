//! Per-machine credential derivation.
//!
//! The credential is a stable token for this host, not a secret: the SHA-256 of
//! the host name followed by every network interface hardware address, in
//! lowercase hex. The server maps it to a machine registration, so it must be
//! identical across runs on the same host.

use std::fmt;

use sha2::{Digest, Sha256};
use sysinfo::{MacAddr, Networks};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::AuthOrder;

/// Errors that prevent deriving the host credential. Fatal at startup.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The operating system did not report a host name.
    #[error("failed to read host name: {0}")]
    Hostname(#[source] std::io::Error),

    /// The host name is not valid UTF-8.
    #[error("host name is not valid UTF-8")]
    NonUtf8Hostname,

    /// The operating system reported no network interfaces at all.
    #[error("no network interfaces reported, cannot derive a stable host identity")]
    NoInterfaces,
}

/// Opaque per-machine credential (lowercase hex digest).
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Derives the credential from a host name and interface hardware addresses.
    ///
    /// Addresses are concatenated in the order given.
    #[must_use]
    pub fn from_host_identity<S: AsRef<str>>(host_name: &str, hardware_addrs: &[S]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(host_name.as_bytes());
        for addr in hardware_addrs {
            hasher.update(addr.as_ref().as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Derives the credential of the current host.
///
/// # Errors
///
/// Returns [`CredentialError`] if the host name cannot be read or no network
/// interface is listed.
#[instrument(level = "debug")]
pub fn derive_credential() -> Result<Credential, CredentialError> {
    let host_name = hostname::get()
        .map_err(CredentialError::Hostname)?
        .into_string()
        .map_err(|_| CredentialError::NonUtf8Hostname)?;

    let networks = Networks::new_with_refreshed_list();
    let interfaces: Vec<(&str, MacAddr)> = networks
        .iter()
        .map(|(name, data)| (name.as_str(), data.mac_address()))
        .collect();

    credential_from_interfaces(&host_name, interfaces)
}

/// Derives the credential from a host name and its `(name, hardware address)`
/// interface listing.
///
/// Interfaces are ordered by name because the OS listing order is not stable.
/// Interfaces without a hardware address (loopback, tunnels) contribute nothing,
/// but the listing itself must not be empty: a working host lists at least
/// loopback, so an empty one means the interfaces could not be read.
///
/// # Errors
///
/// Returns [`CredentialError::NoInterfaces`] for an empty listing.
pub fn credential_from_interfaces(
    host_name: &str,
    mut interfaces: Vec<(&str, MacAddr)>,
) -> Result<Credential, CredentialError> {
    if interfaces.is_empty() {
        return Err(CredentialError::NoInterfaces);
    }

    interfaces.retain(|(_, mac)| !mac.is_unspecified());
    interfaces.sort_by(|a, b| a.0.cmp(b.0));

    debug!(
        host_name = %host_name,
        interfaces = interfaces.len(),
        "deriving host credential"
    );

    let addrs: Vec<String> = interfaces
        .into_iter()
        .map(|(_, mac)| mac.to_string().to_lowercase())
        .collect();
    Ok(Credential::from_host_identity(host_name, &addrs))
}

/// Basic-auth pairing of the account name and the machine credential.
#[derive(Clone)]
pub struct BasicAuth {
    account: String,
    credential: Credential,
    order: AuthOrder,
}

impl BasicAuth {
    /// Creates the pairing used on every request.
    #[must_use]
    pub fn new(account: impl Into<String>, credential: Credential, order: AuthOrder) -> Self {
        Self {
            account: account.into(),
            credential,
            order,
        }
    }

    /// Returns `(username, password)` in the configured order.
    #[must_use]
    pub fn pair(&self) -> (&str, &str) {
        match self.order {
            AuthOrder::CredentialFirst => (self.credential.as_str(), self.account.as_str()),
            AuthOrder::AccountFirst => (self.account.as_str(), self.credential.as_str()),
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("account", &self.account)
            .field("credential", &self.credential)
            .field("order", &self.order)
            .finish()
    }
}
