use std::path::{Path, PathBuf};

use crate::Error;

/// Secret used when no password file is given
pub const DEFAULT_SECRET: &str = "guest";

/// Options controlling TLS connections
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct TlsArgs {
    /// P12 formatted client key and certificate
    #[cfg_attr(feature = "clap", arg(short, long))]
    pub key: Option<String>,

    /// PEM formatted CA certificate chain
    #[cfg_attr(feature = "clap", arg(long))]
    pub ca_cert: Option<String>,

    /// Password for the key, if encrypted
    #[cfg_attr(feature = "clap", arg(long))]
    pub key_password: Option<String>,
}

impl TlsArgs {
    /// True if any TLS material was given
    pub fn is_set(&self) -> bool {
        self.key.is_some() || self.ca_cert.is_some()
    }
}

/// Username/secret pair for AMQP PLAIN authentication
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name on the broker
    user: String,
    /// Password for `user`
    secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Credentials from a username and plain text secret
    pub fn new(user: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            secret: secret.into(),
        }
    }

    /// Credentials whose secret is read from `passwd_file`. Trailing
    /// line endings are removed. If no file is given the secret is
    /// [`DEFAULT_SECRET`].
    pub fn from_passwd_file(user: &str, passwd_file: Option<&Path>) -> Result<Self, Error> {
        let secret = match passwd_file {
            Some(path) => read_secret(path)?,
            None => DEFAULT_SECRET.to_string(),
        };
        Ok(Self::new(user, secret))
    }

    /// The login name
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The secret
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl From<&Credentials> for lapin::uri::AMQPUserInfo {
    fn from(val: &Credentials) -> Self {
        lapin::uri::AMQPUserInfo {
            username: val.user.clone(),
            password: val.secret.clone(),
        }
    }
}

/// Read a password file, dropping any trailing `\r` and `\n`
fn read_secret(path: &Path) -> Result<String, Error> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: PathBuf::from(path),
        source,
    })?;
    Ok(contents.trim_end_matches(['\r', '\n']).to_string())
}
