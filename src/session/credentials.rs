//! Credential passphrase substitution

use crate::config::CredentialsConfig;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

/// Swaps a shared access passphrase for the host's own provider key.
///
/// Neither the supplied value nor the substitute is ever logged.
#[derive(Debug, Default)]
pub struct CredentialResolver {
    passphrase: Option<SecretString>,
    server_key: Option<SecretString>,
}

impl CredentialResolver {
    pub fn new(passphrase: Option<SecretString>, server_key: Option<SecretString>) -> Self {
        Self {
            passphrase,
            server_key,
        }
    }

    pub fn resolve(&self, supplied: SecretString) -> SecretString {
        match (&self.passphrase, &self.server_key) {
            (Some(passphrase), Some(server_key))
                if passphrase.expose_secret() == supplied.expose_secret() =>
            {
                debug!("Access passphrase supplied, using server-side key");
                SecretString::new(server_key.expose_secret().clone())
            }
            _ => supplied,
        }
    }
}

impl From<CredentialsConfig> for CredentialResolver {
    fn from(config: CredentialsConfig) -> Self {
        Self::new(config.access_passphrase, config.server_api_key)
    }
}
