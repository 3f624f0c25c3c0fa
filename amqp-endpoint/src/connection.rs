//! Functions for opening plain or TLS AMQP connections
use std::path::PathBuf;
use std::sync::Arc;

use lapin::{tcp::AMQPUriTcpExt, uri::AMQPUri, Connection, ConnectionProperties};
use native_tls::TlsConnector;
use tracing::{debug, error, info, warn};

use crate::options::{Credentials, TlsArgs};

/// Errors building an [`Opener`]
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    /// The endpoint URL failed to parse
    #[error("Failed to parse endpoint {0}")]
    ParseError(String),

    /// Failed to read a password from the user
    #[error("Failed to read password")]
    PasswordError,

    /// A password, key or certificate file couldn't be read
    #[error("Unable to read {}", path.display())]
    Io {
        /// The file being read
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// TLS configuration was rejected
    #[error("Error in forming TLS connection")]
    TlsError(#[from] native_tls::Error),
}

/// Factory to open AMQP connections to a fixed server
pub struct Opener {
    /// URL (host, port, vhost and query) to open connections to
    uri: AMQPUri,
    /// Properties of the opened connections
    properties: ConnectionProperties,
    #[doc(hidden)]
    /// TLS connection wrapper
    connector: Option<Arc<TlsConnector>>,
}

impl std::fmt::Debug for Opener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Opener")
            .field("host", &self.uri.authority.host)
            .field("port", &self.uri.authority.port)
            .field("vhost", &self.uri.vhost)
            .field("tls", &self.connector.is_some())
            .finish()
    }
}

impl Opener {
    /// Create a new opener to the given server
    pub fn new(
        uri: AMQPUri,
        connector: Option<Arc<TlsConnector>>,
        properties: ConnectionProperties,
    ) -> Self {
        Self {
            uri,
            properties,
            connector,
        }
    }

    /// Create an opener for `endpoint`, wrapping the stream in TLS if
    /// any TLS material is given
    pub(crate) fn from_parts(
        endpoint: &str,
        tls_options: Option<&TlsArgs>,
        prompt: bool,
        properties: ConnectionProperties,
    ) -> Result<Self, Error> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            error!(url = endpoint, "Unable to parse endpoint URL");
            Error::ParseError(format!("{endpoint}: {e}"))
        })?;
        let uri: AMQPUri = url.as_str().parse().map_err(|s: String| {
            error!(url = endpoint, "Endpoint is not an AMQP URL");
            Error::ParseError(s)
        })?;

        let connector = match tls_options {
            Some(tls) => Some(Arc::new(tls_connector(tls, prompt)?)),
            None => None,
        };
        Ok(Self::new(uri, connector, properties))
    }

    /// The server URI connections are made to
    pub fn uri(&self) -> &AMQPUri {
        &self.uri
    }

    /// Connect and log in to `vhost` as `credentials`. Credentials
    /// and vhost in the endpoint URL are replaced by these.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        vhost: &str,
    ) -> lapin::Result<Connection> {
        debug!(user = credentials.user(), vhost, "Authenticating");
        self.connect(self.login_uri(credentials, vhost)).await
    }

    /// The endpoint URI with its userinfo and vhost replaced
    pub fn login_uri(&self, credentials: &Credentials, vhost: &str) -> AMQPUri {
        let mut uri = self.uri.clone();
        uri.authority.userinfo = credentials.into();
        uri.vhost = vhost.to_string();
        uri
    }

    /// Open the connection. If there is a TLS connector given, that
    /// will be used to establish the connection, otherwise it will be
    /// whatever the URI scheme asks for
    async fn connect(&self, uri: AMQPUri) -> lapin::Result<Connection> {
        if let Some(connector) = self.connector.clone() {
            let connect = move |uri: &AMQPUri| {
                info!(host = %uri.authority.host, port = uri.authority.port, "Connecting with TLS");
                uri.clone()
                    .connect()
                    .and_then(|stream| stream.into_native_tls(&connector, &uri.authority.host))
            };
            Connection::connector(uri, Box::new(connect), self.properties.clone()).await
        } else {
            info!(host = %uri.authority.host, port = uri.authority.port, "Connecting");
            Connection::connect_uri(uri, self.properties.clone()).await
        }
    }
}

/// Build the TLS connector from the CA chain and client key
fn tls_connector(tls: &TlsArgs, prompt: bool) -> Result<TlsConnector, Error> {
    let mut tls_builder = native_tls::TlsConnector::builder();
    if let Some(key) = &tls.key {
        tls_builder.identity(identity_from_file(key, tls.key_password.as_deref(), prompt)?);
    }
    if let Some(cert) = &tls.ca_cert {
        tls_builder.add_root_certificate(ca_chain_from_file(cert)?);
        tls_builder.danger_accept_invalid_hostnames(true);
    }
    Ok(tls_builder.build()?)
}

/// Read a whole key or certificate file
fn read_file(path: &str) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|source| Error::Io {
        path: PathBuf::from(path),
        source,
    })
}

/// Load a TLS identity from p12 formatted file path
fn identity_from_file(
    p12_file: &str,
    password: Option<&str>,
    prompt: bool,
) -> Result<native_tls::Identity, Error> {
    let key_cert = read_file(p12_file)?;
    match native_tls::Identity::from_pkcs12(&key_cert, password.unwrap_or_default()) {
        Ok(ident) => Ok(ident),
        Err(e) if prompt => {
            warn!(error=?e, p12_file=p12_file, "Failed to open key with password");
            let password =
                rpassword::prompt_password("Key password: ").map_err(|_| Error::PasswordError)?;
            Ok(native_tls::Identity::from_pkcs12(&key_cert, &password)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Load a certificate authority from a PEM formatted file path
fn ca_chain_from_file(pem_file: &str) -> Result<native_tls::Certificate, Error> {
    let ca_chain = read_file(pem_file)?;
    Ok(native_tls::Certificate::from_pem(&ca_chain)?)
}
